//! Repository backed by a directory on disk, typically a git checkout.
//!
//! Revisions are SHA-256 digests of file bytes, so an update or delete with a
//! revision read earlier fails once the file has been rewritten. Writes go
//! through `<path>.assetsync.tmp` and an atomic rename.

use std::fs;
use std::io::ErrorKind;
use std::path::{Component, Path, PathBuf};

use chrono::{DateTime, Utc};
use sha2::{Digest, Sha256};

use crate::client::{is_manifest_name, ChangeDescriptor, FileRecord, ManifestRepository};
use crate::error::{io_err, RepositoryError};

#[derive(Debug, Clone)]
pub struct LocalRepository {
    root: PathBuf,
}

impl LocalRepository {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Map a repository path to a filesystem path under the root.
    fn resolve(&self, path: &str) -> Result<PathBuf, RepositoryError> {
        let relative = Path::new(path.trim_start_matches('/'));
        let escapes = relative
            .components()
            .any(|c| !matches!(c, Component::Normal(_) | Component::CurDir));
        if escapes {
            return Err(io_err(
                relative,
                std::io::Error::new(ErrorKind::InvalidInput, "path escapes repository root"),
            ));
        }
        Ok(self.root.join(relative))
    }

    fn repo_path(&self, full: &Path) -> String {
        let relative = full.strip_prefix(&self.root).unwrap_or(full);
        relative
            .components()
            .map(|c| c.as_os_str().to_string_lossy())
            .collect::<Vec<_>>()
            .join("/")
    }

    fn read_record(&self, full: &Path) -> Result<Option<FileRecord>, RepositoryError> {
        let bytes = match fs::read(full) {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(io_err(full, e)),
        };
        let path = self.repo_path(full);
        let revision = revision_of(&bytes);
        let content = String::from_utf8(bytes).map_err(|e| RepositoryError::Decode {
            path: path.clone(),
            reason: e.to_string(),
        })?;
        Ok(Some(FileRecord {
            path,
            content,
            revision,
            download_url: None,
        }))
    }

    /// Every manifest file under `dir`, sorted by path.
    fn manifest_files(&self, dir: &Path) -> Result<Vec<PathBuf>, RepositoryError> {
        let mut files = Vec::new();
        for current in collect_dirs(dir)? {
            let entries = match fs::read_dir(&current) {
                Ok(entries) => entries,
                Err(e) if e.kind() == ErrorKind::NotFound => continue,
                Err(e) => return Err(io_err(&current, e)),
            };
            for entry in entries {
                let entry = entry.map_err(|e| io_err(&current, e))?;
                let ty = entry.file_type().map_err(|e| io_err(entry.path(), e))?;
                if ty.is_file() && is_manifest_name(&entry.file_name().to_string_lossy()) {
                    files.push(entry.path());
                }
            }
        }
        files.sort();
        Ok(files)
    }

    fn current_revision(&self, full: &Path, path: &str) -> Result<String, RepositoryError> {
        match fs::read(full) {
            Ok(bytes) => Ok(revision_of(&bytes)),
            Err(e) if e.kind() == ErrorKind::NotFound => Err(RepositoryError::NotFound {
                path: path.to_string(),
            }),
            Err(e) => Err(io_err(full, e)),
        }
    }

    fn check_revision(&self, full: &Path, path: &str, expected: &str) -> Result<(), RepositoryError> {
        let current = self.current_revision(full, path)?;
        if current != expected {
            return Err(RepositoryError::Conflict {
                path: path.to_string(),
                message: format!("file is at revision {current}, not {expected}"),
            });
        }
        Ok(())
    }

    /// Remove directories left empty by a delete, stopping at the root.
    fn prune_empty_dirs(&self, from: &Path) {
        let mut dir = from.parent();
        while let Some(current) = dir {
            if current == self.root || !current.starts_with(&self.root) {
                break;
            }
            // Fails (and stops) on the first non-empty directory.
            if fs::remove_dir(current).is_err() {
                break;
            }
            dir = current.parent();
        }
    }
}

/// SHA-256 hex digest of file bytes.
pub fn revision_of(bytes: &[u8]) -> String {
    let mut h = Sha256::new();
    h.update(bytes);
    hex::encode(h.finalize())
}

fn atomic_write(path: &Path, content: &str) -> Result<(), RepositoryError> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).map_err(|e| io_err(parent, e))?;
    }
    let tmp = PathBuf::from(format!("{}.assetsync.tmp", path.display()));
    fs::write(&tmp, content).map_err(|e| io_err(&tmp, e))?;
    if let Err(e) = fs::rename(&tmp, path) {
        let _ = fs::remove_file(&tmp);
        return Err(io_err(path, e));
    }
    Ok(())
}

/// Breadth-first list of `root` and every directory below it, skipping
/// hidden directories such as `.git`.
fn collect_dirs(root: &Path) -> Result<Vec<PathBuf>, RepositoryError> {
    let mut dirs = vec![root.to_path_buf()];
    let mut cursor = 0;
    while cursor < dirs.len() {
        let current = dirs[cursor].clone();
        cursor += 1;
        let entries = match fs::read_dir(&current) {
            Ok(entries) => entries,
            Err(err) if err.kind() == ErrorKind::NotFound => continue,
            Err(err) => return Err(io_err(&current, err)),
        };
        for entry in entries {
            let entry = entry.map_err(|e| io_err(&current, e))?;
            let ty = entry.file_type().map_err(|e| io_err(entry.path(), e))?;
            let hidden = entry.file_name().to_string_lossy().starts_with('.');
            if ty.is_dir() && !hidden {
                dirs.push(entry.path());
            }
        }
    }
    Ok(dirs)
}

impl ManifestRepository for LocalRepository {
    fn scan_manifests(&self, base_path: &str) -> Result<Vec<FileRecord>, RepositoryError> {
        if !self.root.is_dir() {
            return Err(RepositoryError::NotFound {
                path: self.root.display().to_string(),
            });
        }
        let dir = self.resolve(base_path)?;
        let mut records = Vec::new();
        for full in self.manifest_files(&dir)? {
            // A file removed mid-scan is simply absent; any other read
            // failure aborts the scan.
            if let Some(record) = self.read_record(&full)? {
                records.push(record);
            }
        }
        tracing::debug!(root = %self.root.display(), base = %base_path, found = records.len(), "scanned directory");
        Ok(records)
    }

    fn get_file(&self, path: &str) -> Result<Option<FileRecord>, RepositoryError> {
        let full = self.resolve(path)?;
        self.read_record(&full)
    }

    fn create_file(&self, path: &str, content: &str, message: &str) -> Result<(), RepositoryError> {
        let full = self.resolve(path)?;
        if full.exists() {
            return Err(RepositoryError::Conflict {
                path: path.to_string(),
                message: "file already exists".to_string(),
            });
        }
        atomic_write(&full, content)?;
        tracing::debug!(path = %path, message = %first_line(message), "created file");
        Ok(())
    }

    fn update_file(
        &self,
        path: &str,
        content: &str,
        message: &str,
        revision: &str,
    ) -> Result<(), RepositoryError> {
        let full = self.resolve(path)?;
        self.check_revision(&full, path, revision)?;
        atomic_write(&full, content)?;
        tracing::debug!(path = %path, message = %first_line(message), "updated file");
        Ok(())
    }

    fn delete_file(&self, path: &str, message: &str, revision: &str) -> Result<(), RepositoryError> {
        let full = self.resolve(path)?;
        self.check_revision(&full, path, revision)?;
        fs::remove_file(&full).map_err(|e| io_err(&full, e))?;
        self.prune_empty_dirs(&full);
        tracing::debug!(path = %path, message = %first_line(message), "deleted file");
        Ok(())
    }

    /// Digest over every manifest's `path:revision`, sorted by path.
    fn latest_revision(&self) -> Result<Option<String>, RepositoryError> {
        let records = self.scan_manifests("")?;
        if records.is_empty() {
            return Ok(None);
        }
        let mut h = Sha256::new();
        for record in &records {
            h.update(record.path.as_bytes());
            h.update(b":");
            h.update(record.revision.as_bytes());
            h.update(b"\n");
        }
        Ok(Some(hex::encode(h.finalize())))
    }

    /// Manifests modified at or after `since`. Deletions are not observable.
    fn changes_since(&self, since: i64) -> Result<Vec<ChangeDescriptor>, RepositoryError> {
        let mut changes = Vec::new();
        for full in self.manifest_files(&self.root)? {
            let meta = fs::metadata(&full).map_err(|e| io_err(&full, e))?;
            let modified = meta.modified().map_err(|e| io_err(&full, e))?;
            let timestamp = DateTime::<Utc>::from(modified).timestamp();
            if timestamp < since {
                continue;
            }
            let bytes = fs::read(&full).map_err(|e| io_err(&full, e))?;
            changes.push(ChangeDescriptor {
                revision: revision_of(&bytes),
                timestamp: Some(timestamp),
                summary: Some(self.repo_path(&full)),
            });
        }
        Ok(changes)
    }

    fn ping(&self) -> bool {
        self.root.is_dir()
    }

    fn location(&self, path: &str) -> String {
        self.root.join(path.trim_start_matches('/')).display().to_string()
    }
}

fn first_line(message: &str) -> &str {
    message.lines().next().unwrap_or("")
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn resolve_rejects_parent_components() {
        let tmp = TempDir::new().unwrap();
        let repo = LocalRepository::new(tmp.path());
        assert!(repo.resolve("../outside/manifest.yaml").is_err());
        assert!(repo.resolve("tools/x/manifest.yaml").is_ok());
    }

    #[test]
    fn tmp_file_cleaned_up_after_write() {
        let tmp = TempDir::new().unwrap();
        let repo = LocalRepository::new(tmp.path());
        repo.create_file("tools/x/manifest.yaml", "id: x\n", "Create").unwrap();
        let tmp_path = tmp.path().join("tools/x/manifest.yaml.assetsync.tmp");
        assert!(!tmp_path.exists(), "tmp file should be removed after atomic rename");
    }

    #[test]
    fn delete_prunes_empty_directories() {
        let tmp = TempDir::new().unwrap();
        let repo = LocalRepository::new(tmp.path());
        repo.create_file("skills/pdf/manifest.yaml", "id: pdf\n", "Create").unwrap();
        let rev = repo.get_file("skills/pdf/manifest.yaml").unwrap().unwrap().revision;
        repo.delete_file("skills/pdf/manifest.yaml", "Delete", &rev).unwrap();
        assert!(!tmp.path().join("skills").exists());
        assert!(tmp.path().exists());
    }

    #[test]
    fn hidden_directories_are_not_scanned() {
        let tmp = TempDir::new().unwrap();
        fs::create_dir_all(tmp.path().join(".git/x")).unwrap();
        fs::write(tmp.path().join(".git/x/manifest.yaml"), "id: x\n").unwrap();
        let repo = LocalRepository::new(tmp.path());
        assert!(repo.scan_manifests("").unwrap().is_empty());
    }
}
