//! Index maintenance tests for `AssetStore` over the memory backend.

use assetsync_core::{Category, StoredAsset, SyncStatus};
use assetsync_store::{AssetStore, KeySpace, MemoryBackend};

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

fn record(id: &str, category: Category) -> StoredAsset {
    StoredAsset {
        id: id.to_string(),
        version: "1.0.0".to_string(),
        category,
        name: format!("{id} name"),
        description: "x".repeat(150),
        author: None,
        config_schema: "[]".to_string(),
        agent_specs: None,
        runtime: Some(r#"{"language":"python","entry":"main.py","handler":"run"}"#.to_string()),
        permissions: "{}".to_string(),
        github_path: format!("{category}s/{id}/manifest.yaml"),
        github_sha: "sha-1".to_string(),
        content_hash: "hash-1".to_string(),
        created_at: 100,
        updated_at: 100,
    }
}

// ---------------------------------------------------------------------------
// 1. Save / delete with indexes
// ---------------------------------------------------------------------------

#[test]
fn save_writes_record_category_and_summary() {
    let store = AssetStore::in_memory();
    store
        .save_asset_with_indexes(&record("web_search", Category::Tool), None)
        .expect("save");

    let stored = store.get_asset("web_search").expect("get").expect("present");
    assert_eq!(stored.category, Category::Tool);
    assert_eq!(store.asset_ids_by_category(Category::Tool).unwrap(), vec!["web_search"]);

    let index = store.global_index().expect("index");
    let entry = &index["web_search"];
    assert_eq!(entry.description.len(), 100);
    assert_eq!(entry.version, "1.0.0");
}

#[test]
fn category_change_moves_membership() {
    let store = AssetStore::in_memory();
    store
        .save_asset_with_indexes(&record("helper", Category::Tool), None)
        .unwrap();
    store
        .save_asset_with_indexes(&record("helper", Category::Skill), Some(Category::Tool))
        .unwrap();

    assert!(store.asset_ids_by_category(Category::Tool).unwrap().is_empty());
    assert_eq!(store.asset_ids_by_category(Category::Skill).unwrap(), vec!["helper"]);
}

#[test]
fn resave_drops_fields_no_longer_present() {
    let store = AssetStore::in_memory();
    store
        .save_asset_with_indexes(&record("pdf", Category::Skill), None)
        .unwrap();
    let mut without_runtime = record("pdf", Category::Skill);
    without_runtime.runtime = None;
    store
        .save_asset_with_indexes(&without_runtime, Some(Category::Skill))
        .unwrap();

    assert_eq!(store.get_asset("pdf").unwrap().unwrap().runtime, None);
}

#[test]
fn delete_removes_every_trace() {
    let store = AssetStore::in_memory();
    store
        .save_asset_with_indexes(&record("gone", Category::Prompt), None)
        .unwrap();

    assert!(store.delete_asset_with_indexes("gone").expect("delete"));

    assert!(store.get_asset("gone").unwrap().is_none());
    assert!(store.global_index().unwrap().is_empty());
    assert!(store.asset_ids_by_category(Category::Prompt).unwrap().is_empty());
    assert!(store.all_asset_ids().unwrap().is_empty());
}

#[test]
fn delete_of_unknown_id_reports_not_found() {
    let store = AssetStore::in_memory();
    assert!(!store.delete_asset_with_indexes("never-existed").expect("delete"));
}

#[test]
fn all_assets_are_ordered_by_id() {
    let store = AssetStore::in_memory();
    for (id, cat) in [("b", Category::Tool), ("a", Category::Skill), ("c", Category::Prompt)] {
        store.save_asset_with_indexes(&record(id, cat), None).unwrap();
    }
    let ids: Vec<String> = store.all_assets().unwrap().into_iter().map(|a| a.id).collect();
    assert_eq!(ids, vec!["a", "b", "c"]);
}

#[test]
fn key_prefix_isolates_stores() {
    let store = AssetStore::new(MemoryBackend::new(), KeySpace::new("staging"));
    store
        .save_asset_with_indexes(&record("x", Category::Tool), None)
        .unwrap();
    assert_eq!(store.keys().metadata("x"), "staging:metadata:x");
    assert_eq!(store.all_asset_ids().unwrap().len(), 1);
}

// ---------------------------------------------------------------------------
// 2. Sync state and changed queue
// ---------------------------------------------------------------------------

#[test]
fn sync_state_fields_update_independently() {
    let store = AssetStore::in_memory();
    assert_eq!(store.sync_state().unwrap().sync_status, SyncStatus::Idle);

    store.set_sync_status(SyncStatus::Syncing).unwrap();
    store.record_sync_completion(1_700_000_000, 7).unwrap();
    store.set_last_commit_sha("deadbeef").unwrap();

    let state = store.sync_state().unwrap();
    assert_eq!(state.sync_status, SyncStatus::Syncing);
    assert_eq!(state.last_sync_time, Some(1_700_000_000));
    assert_eq!(state.synced_count, 7);
    assert_eq!(state.last_commit_sha.as_deref(), Some("deadbeef"));
}

#[test]
fn changed_queue_is_bounded_and_newest_first() {
    let store = AssetStore::in_memory();
    for i in 0..5 {
        store.push_changed(&format!("a{i}")).unwrap();
    }
    store.trim_changed(3).unwrap();

    assert_eq!(store.recent_changed(10).unwrap(), vec!["a4", "a3", "a2"]);
    assert_eq!(store.recent_changed(1).unwrap(), vec!["a4"]);
    assert!(store.recent_changed(0).unwrap().is_empty());
}

// ---------------------------------------------------------------------------
// 3. Lease
// ---------------------------------------------------------------------------

#[test]
fn lease_is_exclusive_per_owner() {
    let store = AssetStore::in_memory();
    let ttl = std::time::Duration::from_secs(30);

    assert!(store.acquire_lease("worker-a", ttl).unwrap());
    assert!(!store.acquire_lease("worker-b", ttl).unwrap());
    assert_eq!(store.lease_holder().unwrap().as_deref(), Some("worker-a"));

    assert!(!store.release_lease("worker-b").unwrap(), "non-owner cannot release");
    assert!(store.release_lease("worker-a").unwrap());
    assert!(store.acquire_lease("worker-b", ttl).unwrap());
}
