//! Error types for assetsync-engine.

use thiserror::Error;

use assetsync_core::SchemaViolation;
use assetsync_repo::RepositoryError;
use assetsync_store::StoreError;

/// All errors that can arise from engine operations.
#[derive(Debug, Error)]
pub enum EngineError {
    /// Repository unreachable, API failure, or a rejected write.
    #[error("repository error: {0}")]
    Repository(#[from] RepositoryError),

    #[error("store error: {0}")]
    Store(#[from] StoreError),

    #[error(transparent)]
    Schema(#[from] SchemaViolation),

    #[error("asset {id} not found")]
    NotFound { id: String },

    #[error("asset {id} already exists")]
    AlreadyExists { id: String },

    #[error("asset ID is required")]
    MissingId,

    /// An update payload names a different asset than the one addressed.
    #[error("manifest id '{found}' does not match asset '{expected}'")]
    IdMismatch { expected: String, found: String },

    /// A write would lower the asset's version.
    #[error("version {proposed} of asset {id} is lower than the current {current}")]
    VersionRegression {
        id: String,
        current: String,
        proposed: String,
    },

    #[error("cannot bump version {version} of asset {id}")]
    VersionExhausted { id: String, version: String },

    /// Another pass holds the sync lease.
    #[error("a sync is already in progress{}", holder_suffix(.holder))]
    SyncInProgress { holder: Option<String> },
}

fn holder_suffix(holder: &Option<String>) -> String {
    holder
        .as_deref()
        .map(|h| format!(" (held by {h})"))
        .unwrap_or_default()
}

impl EngineError {
    /// True for a write rejected because the repository moved underneath it.
    pub fn is_conflict(&self) -> bool {
        matches!(self, EngineError::Repository(e) if e.is_conflict())
    }
}
