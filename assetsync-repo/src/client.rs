//! The repository seam the engine talks to.

use crate::error::RepositoryError;

/// One file read from the repository. Lives only for the duration of a pass.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileRecord {
    /// Repository-relative path with `/` separators.
    pub path: String,
    pub content: String,
    /// Opaque token identifying this exact file content.
    pub revision: String,
    pub download_url: Option<String>,
}

/// A change observed in the repository since some point in time.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChangeDescriptor {
    pub revision: String,
    /// Unix seconds, when known.
    pub timestamp: Option<i64>,
    pub summary: Option<String>,
}

/// True for `manifest.yaml` / `manifest.yml` in any letter case.
pub fn is_manifest_name(name: &str) -> bool {
    let lower = name.to_ascii_lowercase();
    lower == "manifest.yaml" || lower == "manifest.yml"
}

/// Source of truth for asset manifests.
///
/// Writes take the revision the caller last read; a stale revision is a
/// [`RepositoryError::Conflict`].
pub trait ManifestRepository: Send + Sync {
    /// Every manifest file under `base_path` (empty = root), recursively.
    fn scan_manifests(&self, base_path: &str) -> Result<Vec<FileRecord>, RepositoryError>;

    /// `Ok(None)` when `path` does not exist.
    fn get_file(&self, path: &str) -> Result<Option<FileRecord>, RepositoryError>;

    fn create_file(&self, path: &str, content: &str, message: &str) -> Result<(), RepositoryError>;

    fn update_file(
        &self,
        path: &str,
        content: &str,
        message: &str,
        revision: &str,
    ) -> Result<(), RepositoryError>;

    fn delete_file(&self, path: &str, message: &str, revision: &str) -> Result<(), RepositoryError>;

    /// Identifier of the newest repository state, if one can be determined.
    fn latest_revision(&self) -> Result<Option<String>, RepositoryError>;

    fn changes_since(&self, since: i64) -> Result<Vec<ChangeDescriptor>, RepositoryError>;

    /// True when the repository is reachable.
    fn ping(&self) -> bool;

    /// Human-facing location of `path` (URL or filesystem path).
    fn location(&self, path: &str) -> String;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn manifest_names_match_case_insensitively() {
        assert!(is_manifest_name("manifest.yaml"));
        assert!(is_manifest_name("Manifest.YML"));
        assert!(!is_manifest_name("manifest.json"));
        assert!(!is_manifest_name("my_manifest.yaml"));
    }
}
