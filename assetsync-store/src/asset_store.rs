//! Asset store: the record families over a [`KvBackend`].
//!
//! [`AssetStore::save_asset_with_indexes`] and
//! [`AssetStore::delete_asset_with_indexes`] are the only paths that touch
//! the category and summary indexes, and each submits one batch.

use std::collections::{BTreeMap, BTreeSet};
use std::time::Duration;

use assetsync_core::config::{StoreBackendKind, StoreConfig};
use assetsync_core::{Category, StoredAsset, SummaryEntry, SyncState, SyncStatus};

use crate::backend::{Batch, KvBackend};
use crate::error::{corrupt, StoreError};
use crate::keys::KeySpace;
use crate::memory::MemoryBackend;
use crate::record;
use crate::redis_backend::RedisBackend;

pub struct AssetStore {
    backend: Box<dyn KvBackend>,
    keys: KeySpace,
}

impl std::fmt::Debug for AssetStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AssetStore").field("keys", &self.keys).finish_non_exhaustive()
    }
}

impl AssetStore {
    pub fn new(backend: impl KvBackend + 'static, keys: KeySpace) -> Self {
        Self {
            backend: Box::new(backend),
            keys,
        }
    }

    /// Store over a fresh [`MemoryBackend`] with default keys.
    pub fn in_memory() -> Self {
        Self::new(MemoryBackend::new(), KeySpace::default())
    }

    /// Build the backend selected by `config`. Does not connect.
    pub fn from_config(config: &StoreConfig) -> Result<Self, StoreError> {
        let keys = KeySpace::new(config.key_prefix.clone());
        Ok(match config.backend {
            StoreBackendKind::Redis => Self::new(RedisBackend::new(config)?, keys),
            StoreBackendKind::Memory => Self::new(MemoryBackend::new(), keys),
        })
    }

    pub fn keys(&self) -> &KeySpace {
        &self.keys
    }

    /// Establish the backend connection. Safe to call repeatedly.
    pub fn connect(&self) -> Result<(), StoreError> {
        self.backend.connect()
    }

    pub fn ping(&self) -> Result<(), StoreError> {
        self.backend.ping()
    }

    /// Submit `batch` as one unit.
    pub fn atomic_batch(&self, batch: Batch) -> Result<(), StoreError> {
        self.backend.execute(batch)
    }

    // -----------------------------------------------------------------------
    // Records + indexes
    // -----------------------------------------------------------------------

    /// Write `asset` together with its category and summary index entries.
    ///
    /// When `previous_category` differs from the asset's category the id is
    /// moved out of the old category index in the same batch.
    pub fn save_asset_with_indexes(
        &self,
        asset: &StoredAsset,
        previous_category: Option<Category>,
    ) -> Result<(), StoreError> {
        let record_key = self.keys.metadata(&asset.id);
        let summary = serde_json::to_string(&SummaryEntry::from_asset(asset))?;

        let mut batch = Batch::new();
        // Replace the whole hash so optional fields dropped from the manifest
        // do not linger.
        batch.del(&record_key).hset_all(&record_key, record::encode_asset(asset));
        if let Some(old) = previous_category.filter(|old| *old != asset.category) {
            batch.srem(self.keys.category(old), &asset.id);
        }
        batch
            .sadd(self.keys.category(asset.category), &asset.id)
            .hset_all(self.keys.index(), vec![(asset.id.clone(), summary)]);

        self.atomic_batch(batch)?;
        tracing::debug!(id = %asset.id, category = %asset.category, "saved asset");
        Ok(())
    }

    /// Remove the record for `id` and its index entries.
    ///
    /// Returns `Ok(false)` when no record exists.
    pub fn delete_asset_with_indexes(&self, id: &str) -> Result<bool, StoreError> {
        let Some(existing) = self.get_asset(id)? else {
            tracing::debug!(id = %id, "delete skipped: no record");
            return Ok(false);
        };
        let mut batch = Batch::new();
        batch
            .srem(self.keys.category(existing.category), id)
            .del(self.keys.metadata(id))
            .hdel(self.keys.index(), id);
        self.atomic_batch(batch)?;
        tracing::debug!(id = %id, category = %existing.category, "deleted asset");
        Ok(true)
    }

    // -----------------------------------------------------------------------
    // Queries
    // -----------------------------------------------------------------------

    pub fn get_asset(&self, id: &str) -> Result<Option<StoredAsset>, StoreError> {
        let key = self.keys.metadata(id);
        let fields = self.backend.hget_all(&key)?;
        if fields.is_empty() {
            return Ok(None);
        }
        record::decode_asset(&key, fields).map(Some)
    }

    /// Every record, ordered by id.
    pub fn all_assets(&self) -> Result<Vec<StoredAsset>, StoreError> {
        let mut assets = Vec::new();
        for id in self.all_asset_ids()? {
            // A record may vanish between scan and read.
            if let Some(asset) = self.get_asset(&id)? {
                assets.push(asset);
            }
        }
        Ok(assets)
    }

    /// Ids of every stored record, derived from the record keys.
    pub fn all_asset_ids(&self) -> Result<BTreeSet<String>, StoreError> {
        let keys = self.backend.scan_prefix(&self.keys.metadata_prefix())?;
        Ok(keys
            .iter()
            .filter_map(|k| self.keys.id_from_metadata(k))
            .map(str::to_string)
            .collect())
    }

    pub fn asset_ids_by_category(&self, category: Category) -> Result<Vec<String>, StoreError> {
        let mut ids = self.backend.smembers(&self.keys.category(category))?;
        ids.sort();
        Ok(ids)
    }

    pub fn global_index(&self) -> Result<BTreeMap<String, SummaryEntry>, StoreError> {
        let key = self.keys.index();
        self.backend
            .hget_all(&key)?
            .into_iter()
            .map(|(id, raw)| {
                serde_json::from_str::<SummaryEntry>(&raw)
                    .map(|entry| (id.clone(), entry))
                    .map_err(|e| corrupt(&key, format!("entry '{id}': {e}")))
            })
            .collect()
    }

    // -----------------------------------------------------------------------
    // Sync state
    // -----------------------------------------------------------------------

    pub fn sync_state(&self) -> Result<SyncState, StoreError> {
        let fields = self.backend.hget_all(&self.keys.sync_state())?;
        Ok(record::decode_sync_state(&fields))
    }

    pub fn set_sync_status(&self, status: SyncStatus) -> Result<(), StoreError> {
        self.backend.hset_all(
            &self.keys.sync_state(),
            vec![("sync_status".to_string(), status.to_string())],
        )
    }

    pub fn record_sync_completion(&self, time: i64, synced_count: u64) -> Result<(), StoreError> {
        self.backend.hset_all(
            &self.keys.sync_state(),
            vec![
                ("last_sync_time".to_string(), time.to_string()),
                ("synced_count".to_string(), synced_count.to_string()),
            ],
        )
    }

    pub fn set_last_commit_sha(&self, sha: &str) -> Result<(), StoreError> {
        self.backend.hset_all(
            &self.keys.sync_state(),
            vec![("last_commit_sha".to_string(), sha.to_string())],
        )
    }

    /// Overwrite the whole sync-state record.
    pub fn put_sync_state(&self, state: &SyncState) -> Result<(), StoreError> {
        let key = self.keys.sync_state();
        let mut batch = Batch::new();
        batch.del(&key).hset_all(&key, record::encode_sync_state(state));
        self.atomic_batch(batch)
    }

    // -----------------------------------------------------------------------
    // Changed queue
    // -----------------------------------------------------------------------

    pub fn push_changed(&self, id: &str) -> Result<(), StoreError> {
        self.backend.rpush(&self.keys.changed(), id)
    }

    /// Up to `count` most recently changed ids, newest first.
    pub fn recent_changed(&self, count: usize) -> Result<Vec<String>, StoreError> {
        if count == 0 {
            return Ok(Vec::new());
        }
        let count = isize::try_from(count).unwrap_or(isize::MAX);
        let mut ids = self.backend.lrange(&self.keys.changed(), -count, -1)?;
        ids.reverse();
        Ok(ids)
    }

    /// Drop all but the newest `keep` queue entries.
    pub fn trim_changed(&self, keep: usize) -> Result<(), StoreError> {
        self.backend.keep_tail(&self.keys.changed(), keep)
    }

    // -----------------------------------------------------------------------
    // Lease
    // -----------------------------------------------------------------------

    /// Take the sync lease for `owner` unless someone else holds it.
    pub fn acquire_lease(&self, owner: &str, ttl: Duration) -> Result<bool, StoreError> {
        self.backend.set_nx_ex(&self.keys.lease(), owner, ttl)
    }

    /// Release the lease if `owner` still holds it.
    pub fn release_lease(&self, owner: &str) -> Result<bool, StoreError> {
        self.backend.del_if_eq(&self.keys.lease(), owner)
    }

    pub fn lease_holder(&self) -> Result<Option<String>, StoreError> {
        self.backend.get(&self.keys.lease())
    }
}
