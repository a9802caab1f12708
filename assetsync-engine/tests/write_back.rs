//! Create / update / delete through the engine against a scratch directory.

use std::fs;

use assetsync_core::Category;
use assetsync_engine::{Engine, EngineError, EngineOptions};
use assetsync_repo::LocalRepository;
use assetsync_store::AssetStore;
use serde_json::json;
use tempfile::TempDir;

fn setup() -> (TempDir, LocalRepository, AssetStore) {
    let dir = TempDir::new().expect("tempdir");
    let repo = LocalRepository::new(dir.path());
    (dir, repo, AssetStore::in_memory())
}

fn seed(dir: &TempDir, path: &str, id: &str, category: &str, version: &str) {
    let full = dir.path().join(path);
    fs::create_dir_all(full.parent().unwrap()).unwrap();
    fs::write(
        full,
        format!("id: {id}\nversion: {version}\ncategory: {category}\nname: {id}\ndescription: first\n"),
    )
    .unwrap();
}

#[test]
fn create_writes_default_path_and_store() {
    let (dir, repo, store) = setup();
    let engine = Engine::new(&repo, &store, EngineOptions::default());

    let outcome = engine
        .create_asset(
            &json!({
                "id": "new_tool",
                "version": "0.1.0",
                "category": "tool",
                "name": "New tool",
                "description": "does new things"
            }),
            "ana",
            None,
        )
        .expect("create");

    assert_eq!(outcome.path, "tools/new_tool/manifest.yaml");
    assert!(outcome.store_synced);
    assert!(dir.path().join("tools/new_tool/manifest.yaml").is_file());
    assert_eq!(store.get_asset("new_tool").unwrap().unwrap().version, "0.1.0");
    assert_eq!(store.asset_ids_by_category(Category::Tool).unwrap(), vec!["new_tool"]);
    assert_eq!(engine.recent_changes(1).unwrap(), vec!["new_tool"]);

    let again = engine
        .create_asset(
            &json!({"id": "new_tool", "version": "0.1.0", "category": "tool", "name": "n", "description": "d"}),
            "ana",
            None,
        )
        .unwrap_err();
    assert!(matches!(again, EngineError::AlreadyExists { ref id } if id == "new_tool"));
}

#[test]
fn create_rejects_missing_id_and_invalid_manifest() {
    let (_dir, repo, store) = setup();
    let engine = Engine::new(&repo, &store, EngineOptions::default());

    let err = engine
        .create_asset(&json!({"version": "1.0.0", "category": "tool"}), "ana", None)
        .unwrap_err();
    assert!(matches!(err, EngineError::MissingId));

    let err = engine
        .create_asset(
            &json!({
                "id": "picky",
                "version": "1.0.0",
                "category": "tool",
                "name": "p",
                "description": "d",
                "config_schema": [{"name": "mode", "label": "Mode", "type": "select"}]
            }),
            "ana",
            None,
        )
        .unwrap_err();
    match err {
        EngineError::Schema(violation) => assert!(violation.mentions("options")),
        other => panic!("unexpected error: {other}"),
    }
    assert!(store.all_assets().unwrap().is_empty());
}

#[test]
fn update_bumps_patch_whatever_the_payload_says() {
    let (dir, repo, store) = setup();
    seed(&dir, "tools/web_search/manifest.yaml", "web_search", "tool", "1.2.3");
    let engine = Engine::new(&repo, &store, EngineOptions::default());
    engine.sync_from_repository().unwrap();
    let created_at = store.get_asset("web_search").unwrap().unwrap().created_at;

    let outcome = engine
        .update_asset(
            "web_search",
            &json!({
                "version": "9.9.9",
                "category": "tool",
                "name": "Web search",
                "description": "second"
            }),
            "ana",
            None,
        )
        .expect("update");

    assert_eq!(outcome.version, "1.2.4");
    assert_eq!(outcome.path, "tools/web_search/manifest.yaml");
    let stored = store.get_asset("web_search").unwrap().unwrap();
    assert_eq!(stored.version, "1.2.4");
    assert_eq!(stored.description, "second");
    assert_eq!(stored.created_at, created_at);

    let text = fs::read_to_string(dir.path().join("tools/web_search/manifest.yaml")).unwrap();
    assert!(text.contains("version: 1.2.4"), "{text}");
}

#[test]
fn update_keeps_caller_version_when_auto_version_is_off() {
    let (dir, repo, store) = setup();
    seed(&dir, "tools/t/manifest.yaml", "t", "tool", "1.0.0");
    let options = EngineOptions {
        auto_version: false,
        ..EngineOptions::default()
    };
    let engine = Engine::new(&repo, &store, options);

    let outcome = engine
        .update_asset(
            "t",
            &json!({"id": "t", "version": "3.0.0", "category": "tool", "name": "t", "description": "d"}),
            "ana",
            None,
        )
        .unwrap();
    assert_eq!(outcome.version, "3.0.0");
}

#[test]
fn update_refuses_to_lower_the_version() {
    let (dir, repo, store) = setup();
    seed(&dir, "tools/t/manifest.yaml", "t", "tool", "2.0.0");
    let options = EngineOptions {
        auto_version: false,
        ..EngineOptions::default()
    };
    let engine = Engine::new(&repo, &store, options);

    let err = engine
        .update_asset(
            "t",
            &json!({"version": "0.0.1", "category": "tool", "name": "t", "description": "d"}),
            "ana",
            None,
        )
        .unwrap_err();
    assert!(
        matches!(&err, EngineError::VersionRegression { current, proposed, .. }
            if current == "2.0.0" && proposed == "0.0.1"),
        "{err}"
    );
    let text = fs::read_to_string(dir.path().join("tools/t/manifest.yaml")).unwrap();
    assert!(text.contains("version: 2.0.0"), "{text}");
}

#[test]
fn update_fails_when_patch_cannot_be_bumped() {
    let (dir, repo, store) = setup();
    seed(&dir, "tools/t/manifest.yaml", "t", "tool", "1.2.18446744073709551615");
    let engine = Engine::new(&repo, &store, EngineOptions::default());

    let err = engine
        .update_asset(
            "t",
            &json!({"version": "1.0.0", "category": "tool", "name": "t", "description": "d"}),
            "ana",
            None,
        )
        .unwrap_err();
    assert!(matches!(err, EngineError::VersionExhausted { .. }), "{err}");
    let text = fs::read_to_string(dir.path().join("tools/t/manifest.yaml")).unwrap();
    assert!(text.contains("1.2.18446744073709551615"), "{text}");
}

#[test]
fn update_moving_category_migrates_index() {
    let (dir, repo, store) = setup();
    seed(&dir, "tools/x/manifest.yaml", "x", "tool", "1.0.0");
    let engine = Engine::new(&repo, &store, EngineOptions::default());
    engine.sync_from_repository().unwrap();

    engine
        .update_asset(
            "x",
            &json!({"category": "skill", "version": "1.0.0", "name": "x", "description": "d"}),
            "ana",
            Some("Recategorize x"),
        )
        .unwrap();

    assert!(store.asset_ids_by_category(Category::Tool).unwrap().is_empty());
    assert_eq!(store.asset_ids_by_category(Category::Skill).unwrap(), vec!["x"]);
    assert_eq!(store.get_asset("x").unwrap().unwrap().github_path, "tools/x/manifest.yaml");
}

#[test]
fn update_rejects_unknown_and_mismatched_ids() {
    let (dir, repo, store) = setup();
    seed(&dir, "tools/x/manifest.yaml", "x", "tool", "1.0.0");
    let engine = Engine::new(&repo, &store, EngineOptions::default());

    let err = engine
        .update_asset("ghost", &json!({"version": "1.0.0"}), "ana", None)
        .unwrap_err();
    assert!(matches!(err, EngineError::NotFound { .. }));

    let err = engine
        .update_asset("x", &json!({"id": "y", "version": "1.0.0"}), "ana", None)
        .unwrap_err();
    assert!(matches!(err, EngineError::IdMismatch { .. }));
}

#[test]
fn delete_removes_file_and_record() {
    let (dir, repo, store) = setup();
    seed(&dir, "prompts/p/manifest.yaml", "p", "prompt", "1.0.0");
    let engine = Engine::new(&repo, &store, EngineOptions::default());
    engine.sync_from_repository().unwrap();

    let outcome = engine.delete_asset("p", "ana", None).expect("delete");
    assert!(outcome.store_synced);
    assert!(!dir.path().join("prompts/p/manifest.yaml").exists());
    assert!(store.get_asset("p").unwrap().is_none());
    assert!(store.global_index().unwrap().is_empty());

    let err = engine.delete_asset("p", "ana", None).unwrap_err();
    assert!(matches!(err, EngineError::NotFound { .. }));
}
