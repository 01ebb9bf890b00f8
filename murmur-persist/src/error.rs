//! Error types for the persistence layer.
//!
//! Durable-layer failures stop at this boundary: persisters log them and
//! return a `PersistError`; the in-memory store is never left half-written.

use thiserror::Error;

/// Result type for persister operations.
pub type PersistResult<T> = Result<T, PersistError>;

/// Errors that can occur while loading or saving a store.
#[derive(Debug, Error)]
pub enum PersistError {
    /// Serialization/deserialization error.
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// IO error (file system).
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// The durable medium rejected an operation.
    #[error("medium error: {0}")]
    Medium(String),

    /// The durable document is not in a shape we can decode.
    #[error("invalid data: {0}")]
    InvalidData(String),
}
