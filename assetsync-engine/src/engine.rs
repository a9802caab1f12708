//! Reconciliation engine: converges the store onto the repository.
//!
//! One pass:
//!
//! 1. Take the sync lease and mark the state `syncing`.
//! 2. Fetch and validate every manifest; invalid ones are skipped.
//! 3. Load the stored id set and the (de-duplicated) incoming assets.
//! 4. Write each asset whose revision, version or content hash changed.
//! 5. Delete stored ids that no longer appear in the repository.
//! 6. Record completion time, count and revision; trim the changed queue.
//! 7. Mark `idle`, or `failed` when any per-asset operation failed.

use std::collections::{BTreeSet, HashMap};
use std::time::Duration;

use chrono::Utc;

use assetsync_core::config::Config;
use assetsync_core::{unix_now, Asset, Category, StoredAsset, SummaryEntry, SyncState, SyncStatus};
use assetsync_repo::{fetch_and_parse_all, ManifestRepository};
use assetsync_store::{AssetStore, StoreError};

use crate::error::EngineError;
use crate::stats::{SyncProgress, SyncStats};

/// Tunables taken from [`Config`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EngineOptions {
    /// Repository directory scanned for manifests.
    pub base_path: String,
    /// Maximum length of the changed-assets queue.
    pub changed_queue_limit: usize,
    pub lease_ttl: Duration,
    /// Patch-bump the version on every write-back update.
    pub auto_version: bool,
    /// Emit a progress tick every this many assets.
    pub progress_every: usize,
}

impl Default for EngineOptions {
    fn default() -> Self {
        Self {
            base_path: String::new(),
            changed_queue_limit: 1000,
            lease_ttl: Duration::from_secs(900),
            auto_version: true,
            progress_every: 100,
        }
    }
}

impl EngineOptions {
    pub fn from_config(config: &Config) -> Self {
        Self {
            base_path: config.repository.base_path.clone(),
            changed_queue_limit: config.sync.changed_queue_limit,
            lease_ttl: Duration::from_secs(config.sync.lease_ttl_seconds),
            auto_version: config.sync.auto_version,
            progress_every: config.sync.batch_size.max(1),
        }
    }
}

/// Independent reachability of the two collaborators.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize)]
pub struct HealthReport {
    pub store: bool,
    pub repository: bool,
}

impl HealthReport {
    pub fn healthy(&self) -> bool {
        self.store && self.repository
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum WriteKind {
    Created,
    Updated,
}

/// Held for the duration of a pass; releases the store lease on drop.
struct LeaseGuard<'s> {
    store: &'s AssetStore,
    owner: &'s str,
}

impl Drop for LeaseGuard<'_> {
    fn drop(&mut self) {
        match self.store.release_lease(self.owner) {
            Ok(true) => tracing::debug!(owner = %self.owner, "released sync lease"),
            Ok(false) => tracing::warn!(owner = %self.owner, "sync lease expired before release"),
            Err(e) => tracing::warn!(owner = %self.owner, error = %e, "cannot release sync lease"),
        }
    }
}

/// Borrowing handle over a repository and a store.
pub struct Engine<'a> {
    pub(crate) repo: &'a dyn ManifestRepository,
    pub(crate) store: &'a AssetStore,
    pub(crate) options: EngineOptions,
    owner: String,
}

impl<'a> Engine<'a> {
    pub fn new(
        repo: &'a dyn ManifestRepository,
        store: &'a AssetStore,
        options: EngineOptions,
    ) -> Self {
        let nanos = Utc::now().timestamp_nanos_opt().unwrap_or_default();
        Self {
            repo,
            store,
            options,
            owner: format!("{}-{nanos}", std::process::id()),
        }
    }

    pub fn options(&self) -> &EngineOptions {
        &self.options
    }

    /// Token this engine writes into the sync lease.
    pub fn owner(&self) -> &str {
        &self.owner
    }

    // -----------------------------------------------------------------------
    // Full sync
    // -----------------------------------------------------------------------

    pub fn sync_from_repository(&self) -> Result<SyncStats, EngineError> {
        self.sync_from_repository_with_progress(&mut |_| {})
    }

    /// Full pass, reporting progress through `progress`.
    ///
    /// Per-asset store failures are counted in the returned stats. Errors
    /// that abort the pass mark the state `failed` and are returned.
    pub fn sync_from_repository_with_progress(
        &self,
        progress: &mut dyn FnMut(&SyncProgress),
    ) -> Result<SyncStats, EngineError> {
        let _lease = self.acquire_lease()?;
        let mut stats = SyncStats::new(Utc::now());
        tracing::info!(base = %self.options.base_path, "starting full sync");

        self.store.set_sync_status(SyncStatus::Syncing)?;
        if let Err(err) = self.reconcile(&mut stats, progress) {
            tracing::error!(error = %err, "sync aborted");
            if let Err(e) = self.store.set_sync_status(SyncStatus::Failed) {
                tracing::warn!(error = %e, "cannot mark sync state failed");
            }
            return Err(err);
        }

        let status = if stats.has_failures() {
            SyncStatus::Failed
        } else {
            SyncStatus::Idle
        };
        self.store.set_sync_status(status)?;
        stats.finish();

        tracing::info!(
            processed = stats.total_processed,
            created = stats.created,
            updated = stats.updated,
            deleted = stats.deleted,
            failed = stats.failed,
            skipped = stats.skipped,
            duration_ms = stats.duration().as_millis() as u64,
            "sync finished"
        );
        Ok(stats)
    }

    fn acquire_lease(&self) -> Result<LeaseGuard<'_>, EngineError> {
        if self.store.acquire_lease(&self.owner, self.options.lease_ttl)? {
            return Ok(LeaseGuard {
                store: self.store,
                owner: &self.owner,
            });
        }
        let holder = self.store.lease_holder().unwrap_or_default();
        tracing::warn!(holder = ?holder, "sync refused: lease held");
        Err(EngineError::SyncInProgress { holder })
    }

    fn reconcile(
        &self,
        stats: &mut SyncStats,
        progress: &mut dyn FnMut(&SyncProgress),
    ) -> Result<(), EngineError> {
        let revision = match self.repo.latest_revision() {
            Ok(revision) => revision,
            Err(e) => {
                tracing::warn!(error = %e, "cannot read repository revision");
                None
            }
        };

        let outcome = fetch_and_parse_all(self.repo, &self.options.base_path)?;
        stats.skipped = outcome.skipped.len();
        stats
            .errors
            .extend(outcome.skipped.iter().map(|s| format!("{}: {}", s.path, s.reason)));

        let incoming = last_wins(outcome.assets);
        let existing_ids = self.store.all_asset_ids()?;
        stats.total_processed = incoming.len();
        progress(&SyncProgress::new("fetched manifests", 0, incoming.len()));

        let now = unix_now();
        let every = self.options.progress_every.max(1);
        for (i, asset) in incoming.iter().enumerate() {
            match self.reconcile_asset(asset, now) {
                Ok(Some(WriteKind::Created)) => stats.created += 1,
                Ok(Some(WriteKind::Updated)) => stats.updated += 1,
                Ok(None) => {}
                Err(e) => {
                    tracing::warn!(id = %asset.id(), error = %e, "cannot save asset");
                    stats.failed += 1;
                    stats.errors.push(format!("{}: {e}", asset.id()));
                }
            }
            let done = i + 1;
            if done % every == 0 || done == incoming.len() {
                tracing::debug!(done, total = incoming.len(), "reconciled assets");
                progress(&SyncProgress::new("reconciled assets", done, incoming.len()));
            }
        }

        let incoming_ids: BTreeSet<&str> = incoming.iter().map(Asset::id).collect();
        for id in existing_ids.iter().filter(|id| !incoming_ids.contains(id.as_str())) {
            match self.store.delete_asset_with_indexes(id) {
                Ok(true) => {
                    tracing::info!(id = %id, "deleted asset missing from repository");
                    stats.deleted += 1;
                }
                Ok(false) => {}
                Err(e) => {
                    tracing::warn!(id = %id, error = %e, "cannot delete asset");
                    stats.failed += 1;
                    stats.errors.push(format!("delete {id}: {e}"));
                }
            }
        }

        self.store
            .record_sync_completion(unix_now(), incoming.len() as u64)?;
        if let Some(sha) = revision {
            self.store.set_last_commit_sha(&sha)?;
        }
        self.store.trim_changed(self.options.changed_queue_limit)?;
        Ok(())
    }

    fn reconcile_asset(&self, asset: &Asset, now: i64) -> Result<Option<WriteKind>, StoreError> {
        let existing = self.store.get_asset(asset.id())?;
        if let Some(stored) = &existing {
            if !needs_write(stored, asset) {
                return Ok(None);
            }
        }
        let record = asset.to_stored(now, existing.as_ref().map(|e| e.created_at));
        self.store
            .save_asset_with_indexes(&record, existing.as_ref().map(|e| e.category))?;
        self.store.push_changed(asset.id())?;

        let kind = if existing.is_some() {
            WriteKind::Updated
        } else {
            WriteKind::Created
        };
        tracing::debug!(id = %asset.id(), version = %asset.version(), kind = ?kind, "wrote asset");
        Ok(Some(kind))
    }

    // -----------------------------------------------------------------------
    // Incremental sync
    // -----------------------------------------------------------------------

    pub fn incremental_sync(&self) -> Result<SyncStats, EngineError> {
        self.incremental_sync_with_progress(&mut |_| {})
    }

    /// Full sync when the repository changed since the last pass, otherwise
    /// a zero-effect result that leaves the store untouched.
    pub fn incremental_sync_with_progress(
        &self,
        progress: &mut dyn FnMut(&SyncProgress),
    ) -> Result<SyncStats, EngineError> {
        let state = self.store.sync_state()?;
        let Some(since) = state.last_sync_time else {
            tracing::info!("no previous sync recorded; running full sync");
            return self.sync_from_repository_with_progress(progress);
        };

        let changes = self.repo.changes_since(since)?;
        if changes.is_empty() {
            tracing::info!(since, "repository unchanged; nothing to sync");
            let mut stats = SyncStats::new(Utc::now());
            stats.finish();
            return Ok(stats);
        }

        tracing::info!(changes = changes.len(), since, "repository changed; running full sync");
        self.sync_from_repository_with_progress(progress)
    }

    // -----------------------------------------------------------------------
    // Queries
    // -----------------------------------------------------------------------

    pub fn get_asset(&self, id: &str) -> Result<Option<StoredAsset>, EngineError> {
        Ok(self.store.get_asset(id)?)
    }

    /// Records in `category`, sorted by id.
    pub fn assets_by_category(&self, category: Category) -> Result<Vec<StoredAsset>, EngineError> {
        let mut ids = self.store.asset_ids_by_category(category)?;
        ids.sort();
        let mut assets = Vec::with_capacity(ids.len());
        for id in ids {
            match self.store.get_asset(&id)? {
                Some(asset) => assets.push(asset),
                None => tracing::warn!(id = %id, category = %category, "category index names a missing record"),
            }
        }
        Ok(assets)
    }

    /// Every global index entry, sorted by id.
    pub fn list_assets(&self) -> Result<Vec<SummaryEntry>, EngineError> {
        Ok(self.store.global_index()?.into_values().collect())
    }

    /// Each category with the number of assets indexed under it.
    pub fn list_categories(&self) -> Result<Vec<(Category, usize)>, EngineError> {
        Category::ALL
            .iter()
            .map(|c| Ok((*c, self.store.asset_ids_by_category(*c)?.len())))
            .collect()
    }

    /// Up to `count` recently written ids, newest first.
    pub fn recent_changes(&self, count: usize) -> Result<Vec<String>, EngineError> {
        Ok(self.store.recent_changed(count)?)
    }

    pub fn sync_state(&self) -> Result<SyncState, EngineError> {
        Ok(self.store.sync_state()?)
    }

    pub fn health_check(&self) -> HealthReport {
        let store = match self.store.ping() {
            Ok(()) => true,
            Err(e) => {
                tracing::warn!(error = %e, "store health check failed");
                false
            }
        };
        HealthReport {
            store,
            repository: self.repo.ping(),
        }
    }
}

/// True when the stored record is behind `asset`.
fn needs_write(stored: &StoredAsset, asset: &Asset) -> bool {
    stored.github_sha != asset.github_sha
        || stored.version != asset.version()
        || stored.content_hash != asset.manifest.content_hash()
}

/// Collapse duplicate ids: the last asset in scan order replaces earlier ones
/// at the earlier one's position.
fn last_wins(assets: Vec<Asset>) -> Vec<Asset> {
    let mut position: HashMap<String, usize> = HashMap::new();
    let mut unique: Vec<Asset> = Vec::with_capacity(assets.len());
    for asset in assets {
        match position.get(asset.id()) {
            Some(&i) => {
                tracing::warn!(
                    id = %asset.id(),
                    kept = %asset.github_path,
                    dropped = %unique[i].github_path,
                    "duplicate asset id; last manifest wins"
                );
                unique[i] = asset;
            }
            None => {
                position.insert(asset.id().to_string(), unique.len());
                unique.push(asset);
            }
        }
    }
    unique
}
