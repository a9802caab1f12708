use thiserror::Error;

use assetsync_engine::EngineError;

/// Error surface for the polling runtime.
#[derive(Debug, Error)]
pub enum DaemonError {
    #[error("I/O error in {context}: {source}")]
    Io {
        context: String,
        #[source]
        source: std::io::Error,
    },

    #[error("sync pass failed: {0}")]
    Engine(#[from] EngineError),

    #[error("{task} task join failure: {message}")]
    Join { task: String, message: String },

    #[error("signal handler failed: {0}")]
    Signal(String),
}

pub(crate) fn io_err(context: impl Into<String>, source: std::io::Error) -> DaemonError {
    DaemonError::Io {
        context: context.into(),
        source,
    }
}
