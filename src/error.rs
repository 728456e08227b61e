//! Error types for the store engine.

use crate::types::StreamId;
use thiserror::Error;

/// Main error type for store and stream operations.
///
/// None of these corrupt store state; they report a caller mistake and leave
/// the store exactly as it was.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Store already initialized: {0}")]
    AlreadyInitialized(String),

    #[error("Stream already subscribed: {0}")]
    AlreadySubscribed(StreamId),

    #[error("Invalid handler for stream {0}")]
    InvalidHandler(StreamId),

    #[error("Stream not subscribed: {0}")]
    NotSubscribed(StreamId),

    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error("Deserialization error: {0}")]
    Deserialization(String),
}

impl From<serde_json::Error> for StoreError {
    fn from(e: serde_json::Error) -> Self {
        StoreError::Serialization(e.to_string())
    }
}

/// Result type for store operations.
pub type Result<T> = std::result::Result<T, StoreError>;
