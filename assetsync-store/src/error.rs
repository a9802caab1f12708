//! Error types for assetsync-store.

use thiserror::Error;

/// All errors that can arise from store operations.
#[derive(Debug, Error)]
pub enum StoreError {
    /// The Redis server rejected a command or the connection failed mid-call.
    #[error("redis error: {0}")]
    Redis(#[from] redis::RedisError),

    /// JSON encoding of a nested field or index entry failed.
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// A key holds data that cannot be decoded into the expected shape.
    #[error("corrupt data at {key}: {reason}")]
    Corrupt { key: String, reason: String },

    /// The backend could not be reached or its handle is unusable.
    #[error("connection error: {0}")]
    Connection(String),
}

/// Convenience constructor for [`StoreError::Corrupt`].
pub(crate) fn corrupt(key: impl Into<String>, reason: impl Into<String>) -> StoreError {
    StoreError::Corrupt {
        key: key.into(),
        reason: reason.into(),
    }
}
