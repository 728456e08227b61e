//! Core types for the store engine.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Payload type for stored values, change states and request types.
///
/// Values are caller-defined and never inspected by the store. States and
/// request types are only ever compared for equality.
pub type Value = serde_json::Value;

/// Monotonic store version. Starts at [`Version::INITIAL`] and is bumped by
/// every successful put or remove.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Version(pub i64);

impl Version {
    pub const INITIAL: Version = Version(1);

    /// The following version. Saturates at `i64::MAX`, which no store
    /// reaches in practice.
    pub fn next(self) -> Self {
        Version(self.0.saturating_add(1))
    }
}

impl Default for Version {
    fn default() -> Self {
        Version::INITIAL
    }
}

impl fmt::Debug for Version {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Version({})", self.0)
    }
}

impl fmt::Display for Version {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Identifier of a change or mutation stream, unique within its store.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct StreamId(pub u64);

impl fmt::Debug for StreamId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "StreamId({})", self.0)
    }
}

impl fmt::Display for StreamId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Immutable description of one put or remove.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ChangeRecord {
    /// Key of the mutated item.
    pub id: String,
    /// New value, or the last known value for a delete.
    pub value: Value,
    /// Caller-supplied label describing the change.
    pub state: Value,
    pub is_delete: bool,
    /// Store version produced by this mutation.
    pub version: Version,
}

/// Lifecycle of a stream's single subscriber slot.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SubscriberState {
    /// Created, no handler attached yet.
    Created,
    /// Handler attached and registered with the store.
    Subscribed,
    /// Detached by `unsubscribe` or by a store reset. Terminal.
    Unsubscribed,
}
