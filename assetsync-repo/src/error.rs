//! Error types for assetsync-repo.

use std::path::PathBuf;

use thiserror::Error;

/// All errors that can arise from repository access.
#[derive(Debug, Error)]
pub enum RepositoryError {
    /// An I/O error, with annotated path for context.
    #[error("I/O error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The remote API failed or answered with an unexpected status.
    #[error("repository API error{}: {message}", status_suffix(.status))]
    Api {
        status: Option<u16>,
        message: String,
    },

    /// A write was rejected because the file moved past the given revision.
    #[error("conflict writing {path}: {message}")]
    Conflict { path: String, message: String },

    #[error("not found in repository: {path}")]
    NotFound { path: String },

    /// File content could not be decoded (base64, UTF-8).
    #[error("cannot decode {path}: {reason}")]
    Decode { path: String, reason: String },

    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl RepositoryError {
    pub fn is_conflict(&self) -> bool {
        matches!(self, RepositoryError::Conflict { .. })
    }
}

fn status_suffix(status: &Option<u16>) -> String {
    status.map(|s| format!(" ({s})")).unwrap_or_default()
}

/// Convenience constructor for [`RepositoryError::Io`].
pub(crate) fn io_err(path: impl Into<PathBuf>, source: std::io::Error) -> RepositoryError {
    RepositoryError::Io {
        path: path.into(),
        source,
    }
}
