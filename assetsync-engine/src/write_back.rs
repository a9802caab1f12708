//! Single-asset writes to the repository, mirrored into the store.
//!
//! The repository write is authoritative. The store is refreshed right after
//! it; when that refresh fails the asset converges at the next full sync.

use std::fmt;

use serde_json::Value;

use assetsync_core::{unix_now, validate, Asset};
use assetsync_repo::{
    default_manifest_path, delete_manifest, find_asset, parse_manifest, write_manifest,
};

use crate::engine::Engine;
use crate::error::EngineError;
use crate::version::{bump_patch, is_regression};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WriteAction {
    Create,
    Update,
    Delete,
}

impl fmt::Display for WriteAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            WriteAction::Create => "Create",
            WriteAction::Update => "Update",
            WriteAction::Delete => "Delete",
        })
    }
}

/// `"{Action} asset: {id}\n\nAuthor: {author}"`, or `custom` when given.
pub fn commit_message(action: WriteAction, id: &str, author: &str, custom: Option<&str>) -> String {
    match custom {
        Some(message) => message.to_string(),
        None => format!("{action} asset: {id}\n\nAuthor: {author}"),
    }
}

/// Result of a successful write-back.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WriteOutcome {
    pub id: String,
    /// Repository path of the manifest.
    pub path: String,
    /// Browsable location of the manifest.
    pub location: String,
    pub version: String,
    /// False when the repository write succeeded but the store was not updated.
    pub store_synced: bool,
}

impl Engine<'_> {
    /// Add a new asset at its default path.
    pub fn create_asset(
        &self,
        manifest: &Value,
        author: &str,
        message: Option<&str>,
    ) -> Result<WriteOutcome, EngineError> {
        let id = manifest
            .get("id")
            .and_then(Value::as_str)
            .filter(|id| !id.is_empty())
            .ok_or(EngineError::MissingId)?
            .to_string();
        let manifest = validate(manifest)?;

        if find_asset(self.repo, &self.options.base_path, &id)?.is_some() {
            return Err(EngineError::AlreadyExists { id });
        }

        let path = default_manifest_path(&self.options.base_path, manifest.category, &id);
        let message = commit_message(WriteAction::Create, &id, author, message);
        let location = write_manifest(self.repo, &self.options.base_path, &manifest, &message, Some(&path))?;
        tracing::info!(id = %id, path = %path, author = %author, "created asset");

        Ok(WriteOutcome {
            store_synced: self.refresh_store(&id, &path),
            id,
            path,
            location,
            version: manifest.version,
        })
    }

    /// Replace an existing asset's manifest at its current path.
    ///
    /// With `auto_version` on, the stored version is the patch bump of the
    /// repository's current version whatever the payload says. Otherwise the
    /// payload version is kept but may not sort below the current one. A
    /// payload without an id is taken to address `id`.
    pub fn update_asset(
        &self,
        id: &str,
        manifest: &Value,
        author: &str,
        message: Option<&str>,
    ) -> Result<WriteOutcome, EngineError> {
        let existing = self.resolve(id)?;

        let mut raw = manifest.clone();
        if let Some(fields) = raw.as_object_mut() {
            match fields.get("id").and_then(Value::as_str) {
                Some(found) if found != id => {
                    return Err(EngineError::IdMismatch {
                        expected: id.to_string(),
                        found: found.to_string(),
                    })
                }
                Some(_) => {}
                None => {
                    fields.insert("id".to_string(), Value::String(id.to_string()));
                }
            }
            if self.options.auto_version {
                let next = bump_patch(existing.version()).ok_or_else(|| EngineError::VersionExhausted {
                    id: id.to_string(),
                    version: existing.version().to_string(),
                })?;
                fields.insert("version".to_string(), Value::String(next));
            }
        }
        let manifest = validate(&raw)?;
        if is_regression(existing.version(), &manifest.version) {
            return Err(EngineError::VersionRegression {
                id: id.to_string(),
                current: existing.version().to_string(),
                proposed: manifest.version,
            });
        }

        let path = existing.github_path.clone();
        let message = commit_message(WriteAction::Update, id, author, message);
        let location = write_manifest(self.repo, &self.options.base_path, &manifest, &message, Some(&path))?;
        tracing::info!(
            id = %id,
            from = %existing.version(),
            to = %manifest.version,
            author = %author,
            "updated asset"
        );

        Ok(WriteOutcome {
            id: id.to_string(),
            store_synced: self.refresh_store(id, &path),
            path,
            location,
            version: manifest.version,
        })
    }

    /// Remove an asset from the repository, then from the store.
    pub fn delete_asset(
        &self,
        id: &str,
        author: &str,
        message: Option<&str>,
    ) -> Result<WriteOutcome, EngineError> {
        let existing = self.resolve(id)?;
        let path = existing.github_path.clone();
        let message = commit_message(WriteAction::Delete, id, author, message);
        delete_manifest(self.repo, &path, &message)?;
        tracing::info!(id = %id, path = %path, author = %author, "deleted asset");

        let store_synced = match self.store.delete_asset_with_indexes(id) {
            Ok(_) => true,
            Err(e) => {
                tracing::warn!(id = %id, error = %e, "store not updated after delete; next sync will reconcile");
                false
            }
        };

        Ok(WriteOutcome {
            id: id.to_string(),
            location: self.repo.location(&path),
            path,
            version: existing.manifest.version,
            store_synced,
        })
    }

    fn resolve(&self, id: &str) -> Result<Asset, EngineError> {
        find_asset(self.repo, &self.options.base_path, id)?.ok_or_else(|| EngineError::NotFound {
            id: id.to_string(),
        })
    }

    /// Re-read the manifest at `path` and save it. Failures are logged only.
    fn refresh_store(&self, id: &str, path: &str) -> bool {
        match self.try_refresh_store(id, path) {
            Ok(()) => true,
            Err(e) => {
                tracing::warn!(id = %id, path = %path, error = %e, "store not updated; next sync will reconcile");
                false
            }
        }
    }

    fn try_refresh_store(&self, id: &str, path: &str) -> Result<(), EngineError> {
        let file = self.repo.get_file(path)?.ok_or_else(|| EngineError::NotFound {
            id: id.to_string(),
        })?;
        let asset = parse_manifest(&file)?;
        let existing = self.store.get_asset(asset.id())?;
        let record = asset.to_stored(unix_now(), existing.as_ref().map(|e| e.created_at));
        self.store
            .save_asset_with_indexes(&record, existing.map(|e| e.category))?;
        self.store.push_changed(asset.id())?;
        self.store.trim_changed(self.options.changed_queue_limit)?;
        Ok(())
    }
}
