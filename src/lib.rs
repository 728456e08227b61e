//! # Fabric Store
//!
//! A process-wide, versioned, in-memory object store with reactive change
//! notification and request/response style mutation routing.
//!
//! ## Core Concepts
//!
//! - **Stores**: named key/value maps with a monotonic version counter
//! - **Change streams**: filtered, asynchronous subscriptions to puts and removes
//! - **Mutation streams**: filtered, synchronous routing of mutation requests
//! - **Readiness gate**: signal that a store has been initialized, re-armed by reset
//! - **Registry**: creates, finds and destroys stores by name
//!
//! ## Example
//!
//! ```ignore
//! use fabric_store::{MutationRequest, StoreRegistry};
//! use serde_json::json;
//!
//! let registry = StoreRegistry::new();
//! let store = registry.create_store("orders")?;
//!
//! // React to changes of one item
//! store.on_change("o1", ["updated"]).subscribe(|change| {
//!     println!("o1 is now {}", change.value);
//! })?;
//!
//! store.put("o1", json!({"qty": 2}), "updated");
//!
//! // Route a mutation request to whoever handles "UPDATE"
//! store.mutate(
//!     MutationRequest::new(json!({"qty": 3}), "UPDATE")
//!         .on_success(|response| println!("applied: {}", response)),
//! );
//! ```

mod dispatch;
pub mod error;
mod gate;
pub mod registry;
pub mod store;
pub mod streams;
pub mod types;

// Re-exports
pub use error::{Result, StoreError};
pub use gate::ReadyCallback;
pub use registry::StoreRegistry;
pub use store::{Store, StoreConfig};
pub use streams::{
    ChangeFilter, ChangeHandler, ChangeStream, ItemScope, LabelFilter, MutationHandler,
    MutationRequest, MutationStream, ResponseHandler,
};
pub use types::*;
