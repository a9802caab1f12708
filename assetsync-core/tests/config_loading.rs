//! Configuration file loading tests.

use assert_fs::prelude::*;
use assetsync_core::config::{
    resolve_config_path, Config, RepositoryBackendKind, StoreBackendKind,
};
use assetsync_core::ConfigError;
use predicates::prelude::predicate;

#[test]
fn full_file_is_read() {
    let dir = assert_fs::TempDir::new().expect("tempdir");
    let file = dir.child("settings.yaml");
    file.write_str(
        r#"
store:
  backend: memory
  key_prefix: catalog
repository:
  backend: local
  local_root: /srv/assets
  base_path: assets
sync:
  interval_seconds: 60
  enable_incremental: false
logging:
  level: debug
  json: true
"#,
    )
    .expect("write");
    file.assert(predicate::path::exists());

    let config = Config::from_yaml_file(file.path()).expect("load");
    assert_eq!(config.store.backend, StoreBackendKind::Memory);
    assert_eq!(config.store.key_prefix, "catalog");
    assert_eq!(config.repository.backend, RepositoryBackendKind::Local);
    assert_eq!(config.repository.base_path, "assets");
    assert_eq!(config.sync.interval_seconds, 60);
    assert!(!config.sync.enable_incremental);
    assert!(config.logging.json);
    config.validate().expect("valid");
}

#[test]
fn empty_file_is_all_defaults() {
    let dir = assert_fs::TempDir::new().expect("tempdir");
    let file = dir.child("settings.yaml");
    file.touch().expect("touch");
    let config = Config::from_yaml_file(file.path()).expect("load");
    assert_eq!(config, Config::default());
}

#[test]
fn malformed_file_reports_its_path() {
    let dir = assert_fs::TempDir::new().expect("tempdir");
    let file = dir.child("broken.yaml");
    file.write_str("store: [unclosed").expect("write");

    let err = Config::from_yaml_file(file.path()).unwrap_err();
    assert!(matches!(err, ConfigError::Parse { .. }), "got: {err}");
    assert!(err.to_string().contains("broken.yaml"));
}

#[test]
fn unknown_backend_is_a_parse_error() {
    let err = Config::from_yaml_str("store:\n  backend: etcd\n").unwrap_err();
    assert!(err.to_string().contains("etcd") || err.to_string().contains("unknown variant"));
}

#[test]
fn env_local_root_switches_backend() {
    let mut config = Config::default();
    config.apply_env(|key| (key == "ASSETSYNC_LOCAL_ROOT").then(|| "/tmp/assets".to_string()));
    assert_eq!(config.repository.backend, RepositoryBackendKind::Local);
    config.validate().expect("local root satisfies validation");
}

#[test]
fn explicit_config_path_wins() {
    let dir = assert_fs::TempDir::new().expect("tempdir");
    let path = dir.path().join("custom.yaml");
    assert_eq!(resolve_config_path(Some(&path)), Some(path));
}
