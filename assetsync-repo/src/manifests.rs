//! Manifest-level helpers over any [`ManifestRepository`].

use assetsync_core::validate::{parse_yaml, validate};
use assetsync_core::{Asset, Category, Manifest, SchemaViolation};

use crate::client::{FileRecord, ManifestRepository};
use crate::error::RepositoryError;

/// A manifest file that was found but could not be turned into an asset.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SkippedManifest {
    pub path: String,
    pub reason: String,
}

/// Result of scanning and parsing every manifest under a base path.
#[derive(Debug, Clone, Default)]
pub struct ScanOutcome {
    /// Valid assets in scan order.
    pub assets: Vec<Asset>,
    pub skipped: Vec<SkippedManifest>,
}

/// Parse and validate a single fetched file.
pub fn parse_manifest(file: &FileRecord) -> Result<Asset, SchemaViolation> {
    let raw = parse_yaml(&file.content)?;
    let manifest = validate(&raw)?;
    Ok(Asset {
        manifest,
        github_path: file.path.clone(),
        github_sha: file.revision.clone(),
        github_url: file.download_url.clone(),
    })
}

/// Fetch every manifest under `base_path` and keep the ones that validate.
///
/// Repository failures abort; per-file parse or validation failures are
/// logged and reported in [`ScanOutcome::skipped`].
pub fn fetch_and_parse_all(
    repo: &dyn ManifestRepository,
    base_path: &str,
) -> Result<ScanOutcome, RepositoryError> {
    let files = repo.scan_manifests(base_path)?;
    let mut outcome = ScanOutcome::default();
    for file in &files {
        match parse_manifest(file) {
            Ok(asset) => outcome.assets.push(asset),
            Err(violation) => {
                tracing::warn!(path = %file.path, error = %violation, "skipping invalid manifest");
                outcome.skipped.push(SkippedManifest {
                    path: file.path.clone(),
                    reason: violation.to_string(),
                });
            }
        }
    }
    tracing::info!(
        found = files.len(),
        parsed = outcome.assets.len(),
        skipped = outcome.skipped.len(),
        "scanned manifests"
    );
    Ok(outcome)
}

/// Locate the asset with `id`. When several files declare it, the last one
/// in scan order wins, matching full sync.
pub fn find_asset(
    repo: &dyn ManifestRepository,
    base_path: &str,
    id: &str,
) -> Result<Option<Asset>, RepositoryError> {
    let outcome = fetch_and_parse_all(repo, base_path)?;
    Ok(outcome.assets.into_iter().rev().find(|a| a.id() == id))
}

/// `{base}/{category}s/{id}/manifest.yaml`, without a leading slash.
pub fn default_manifest_path(base_path: &str, category: Category, id: &str) -> String {
    let relative = format!("{category}s/{id}/manifest.yaml");
    join_repo_path(base_path, &relative)
}

pub(crate) fn join_repo_path(base: &str, relative: &str) -> String {
    let base = base.trim_matches('/');
    if base.is_empty() {
        relative.to_string()
    } else {
        format!("{base}/{relative}")
    }
}

/// YAML text written back to the repository. Field order follows
/// [`Manifest`], so equal manifests always render identically.
pub fn render_manifest(manifest: &Manifest) -> Result<String, RepositoryError> {
    Ok(serde_yaml::to_string(manifest)?)
}

/// Write `manifest` to `target_path` (or its default path), updating the
/// file in place when it exists. Returns the file's location.
pub fn write_manifest(
    repo: &dyn ManifestRepository,
    base_path: &str,
    manifest: &Manifest,
    message: &str,
    target_path: Option<&str>,
) -> Result<String, RepositoryError> {
    let path = match target_path {
        Some(path) => path.to_string(),
        None => default_manifest_path(base_path, manifest.category, &manifest.id),
    };
    let content = render_manifest(manifest)?;
    match repo.get_file(&path)? {
        Some(existing) => {
            repo.update_file(&path, &content, message, &existing.revision)?;
            tracing::info!(path = %path, id = %manifest.id, "updated manifest");
        }
        None => {
            repo.create_file(&path, &content, message)?;
            tracing::info!(path = %path, id = %manifest.id, "created manifest");
        }
    }
    Ok(repo.location(&path))
}

/// Delete the manifest at `path` at its current revision.
pub fn delete_manifest(
    repo: &dyn ManifestRepository,
    path: &str,
    message: &str,
) -> Result<(), RepositoryError> {
    let Some(existing) = repo.get_file(path)? else {
        return Err(RepositoryError::NotFound {
            path: path.to_string(),
        });
    };
    repo.delete_file(path, message, &existing.revision)?;
    tracing::info!(path = %path, "deleted manifest");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn file(path: &str, content: &str) -> FileRecord {
        FileRecord {
            path: path.to_string(),
            content: content.to_string(),
            revision: "rev".to_string(),
            download_url: None,
        }
    }

    #[test]
    fn default_path_respects_base() {
        assert_eq!(
            default_manifest_path("", Category::Tool, "web_search"),
            "tools/web_search/manifest.yaml"
        );
        assert_eq!(
            default_manifest_path("/assets/", Category::Prompt, "greeting"),
            "assets/prompts/greeting/manifest.yaml"
        );
    }

    #[test]
    fn parse_manifest_carries_provenance() {
        let asset = parse_manifest(&file(
            "tools/x/manifest.yaml",
            "id: x\nversion: 1.0.0\ncategory: tool\nname: X\ndescription: d\n",
        ))
        .expect("valid");
        assert_eq!(asset.github_path, "tools/x/manifest.yaml");
        assert_eq!(asset.github_sha, "rev");
    }

    #[test]
    fn non_mapping_manifest_is_rejected() {
        let err = parse_manifest(&file("m.yaml", "- a\n- b\n")).unwrap_err();
        assert_eq!(err.errors[0].path, "root");
    }
}
