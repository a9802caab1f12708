//! # assetsync-engine
//!
//! Reconciles the asset store with the manifest repository.
//!
//! Build an [`Engine`] over a [`assetsync_repo::ManifestRepository`] and an
//! [`assetsync_store::AssetStore`], then call
//! [`Engine::sync_from_repository`] or [`Engine::incremental_sync`]. The
//! write-back operations ([`Engine::create_asset`] and friends) change the
//! repository first and mirror the result into the store.

pub mod engine;
pub mod error;
pub mod stats;
pub mod version;
pub mod write_back;

pub use engine::{Engine, EngineOptions, HealthReport};
pub use error::EngineError;
pub use stats::{SyncProgress, SyncStats, SyncSummary, MAX_REPORTED_ERRORS};
pub use version::{bump_patch, compare_versions, is_regression};
pub use write_back::{commit_message, WriteAction, WriteOutcome};
