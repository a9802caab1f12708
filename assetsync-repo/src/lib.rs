//! assetsync repository access: the source of truth for manifests.
//!
//! - [`client`]: [`ManifestRepository`] trait, [`FileRecord`]
//! - [`local`]: directory-on-disk backend
//! - [`github`]: GitHub contents API backend
//! - [`manifests`]: scan/parse/write helpers shared by both

pub mod client;
pub mod error;
pub mod github;
pub mod local;
pub mod manifests;

use std::sync::Arc;

use assetsync_core::config::{RepositoryBackendKind, RepositoryConfig};

pub use client::{is_manifest_name, ChangeDescriptor, FileRecord, ManifestRepository};
pub use error::RepositoryError;
pub use github::GitHubRepository;
pub use local::LocalRepository;
pub use manifests::{
    default_manifest_path, delete_manifest, fetch_and_parse_all, find_asset, parse_manifest,
    render_manifest, write_manifest, ScanOutcome, SkippedManifest,
};

/// Build the repository backend selected by `config`.
pub fn open_repository(
    config: &RepositoryConfig,
) -> Result<Arc<dyn ManifestRepository>, RepositoryError> {
    match config.backend {
        RepositoryBackendKind::Github => Ok(Arc::new(GitHubRepository::new(config))),
        RepositoryBackendKind::Local => {
            let Some(root) = config.local_root.as_ref() else {
                return Err(RepositoryError::NotFound {
                    path: "repository.local_root (not configured)".to_string(),
                });
            };
            tracing::debug!(root = %root.display(), "using local repository");
            Ok(Arc::new(LocalRepository::new(root.clone())))
        }
    }
}
