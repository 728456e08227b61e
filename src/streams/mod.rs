//! Change and mutation streams.
//!
//! A stream is created by a store with a fixed filter and accepts exactly one
//! handler. Subscribing registers it in the store's active set; unsubscribing
//! or resetting the store removes it again.
//!
//! - Change streams follow one item or all items, optionally restricted to a
//!   set of state labels, and are fed asynchronously.
//! - Mutation streams follow a set of request types and are fed synchronously
//!   by `Store::mutate`.
//!
//! # Example
//!
//! ```ignore
//! let stream = store.on_change("id1", ["created", "updated"]);
//! stream.subscribe(|change| println!("{} -> {}", change.id, change.value))?;
//!
//! let requests = store.on_mutation_request(["UPDATE"]);
//! requests.subscribe(|request| {
//!     request.succeed(json!("applied"));
//! })?;
//! ```

mod change;
mod filter;
mod mutation;
mod set;

pub use change::{ChangeHandler, ChangeStream};
pub use filter::{ChangeFilter, ItemScope, LabelFilter};
pub use mutation::{MutationHandler, MutationRequest, MutationStream, ResponseHandler};

pub(crate) use change::ChangeSink;
pub(crate) use mutation::MutationSink;
pub(crate) use set::StreamSet;
