//! Error types for the synchronizer.

use thiserror::Error;

/// Result type for synchronizer operations.
pub type SyncResult<T> = Result<T, SyncError>;

/// Errors that can occur while synchronizing stores.
#[derive(Debug, Error)]
pub enum SyncError {
    /// A delta could not be serialized for broadcast.
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// The broadcast channel has no subscribers left.
    #[error("broadcast channel closed")]
    ChannelClosed,
}
