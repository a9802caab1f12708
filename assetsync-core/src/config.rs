//! Service configuration.
//!
//! Loaded from a YAML file (every section optional), then overridden by
//! environment variables. A missing file yields an environment-only config.
//!
//! ```yaml
//! store:
//!   backend: redis        # redis | memory
//!   host: localhost
//!   port: 6379
//! repository:
//!   backend: github       # github | local
//!   repo: owner/assets
//!   branch: main
//! sync:
//!   interval_seconds: 300
//! ```

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

pub const DEFAULT_CONFIG_FILE: &str = "settings.yaml";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum StoreBackendKind {
    #[default]
    Redis,
    Memory,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum RepositoryBackendKind {
    #[default]
    Github,
    Local,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct StoreConfig {
    pub backend: StoreBackendKind,
    pub host: String,
    pub port: u16,
    pub password: Option<String>,
    pub db: i64,
    /// Prefix of every key family (`{prefix}:metadata:{id}`, ...).
    pub key_prefix: String,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            backend: StoreBackendKind::Redis,
            host: "localhost".to_string(),
            port: 6379,
            password: None,
            db: 0,
            key_prefix: "asset".to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RepositoryConfig {
    pub backend: RepositoryBackendKind,
    pub token: Option<String>,
    /// `owner/repo`.
    pub repo: String,
    pub branch: String,
    /// Subtree scanned for manifests. Empty means the repository root.
    pub base_path: String,
    pub api_url: String,
    /// Checkout directory for the `local` backend.
    pub local_root: Option<PathBuf>,
    pub max_retries: u32,
    pub retry_delay_seconds: u64,
}

impl Default for RepositoryConfig {
    fn default() -> Self {
        Self {
            backend: RepositoryBackendKind::Github,
            token: None,
            repo: String::new(),
            branch: "main".to_string(),
            base_path: String::new(),
            api_url: "https://api.github.com".to_string(),
            local_root: None,
            max_retries: 3,
            retry_delay_seconds: 5,
        }
    }
}

impl RepositoryConfig {
    pub fn owner(&self) -> Option<&str> {
        self.repo.split_once('/').map(|(owner, _)| owner)
    }

    pub fn repo_name(&self) -> Option<&str> {
        self.repo.split_once('/').map(|(_, name)| name)
    }

    pub fn retry_delay(&self) -> Duration {
        Duration::from_secs(self.retry_delay_seconds)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SyncConfig {
    pub interval_seconds: u64,
    pub batch_size: usize,
    pub enable_incremental: bool,
    /// Upper bound of the changed-assets queue.
    pub changed_queue_limit: usize,
    /// Lifetime of the lease guarding a sync pass.
    pub lease_ttl_seconds: u64,
    /// Bump the patch version on every update instead of trusting the caller.
    pub auto_version: bool,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            interval_seconds: 300,
            batch_size: 100,
            enable_incremental: true,
            changed_queue_limit: 1000,
            lease_ttl_seconds: 900,
            auto_version: true,
        }
    }
}

impl SyncConfig {
    pub fn interval(&self) -> Duration {
        Duration::from_secs(self.interval_seconds)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Default `EnvFilter` directive when `RUST_LOG` is unset.
    pub level: String,
    pub json: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            json: false,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct Config {
    pub store: StoreConfig,
    pub repository: RepositoryConfig,
    pub sync: SyncConfig,
    pub logging: LoggingConfig,
}

impl Config {
    /// Load `path` if it exists, apply process environment, validate.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let mut config = match path {
            Some(path) if path.exists() => Self::from_yaml_file(path)?,
            _ => Self::default(),
        };
        config.apply_env(|key| std::env::var(key).ok());
        config.validate()?;
        Ok(config)
    }

    pub fn from_yaml_file(path: &Path) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_yaml_str(&contents).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }

    pub fn from_yaml_str(contents: &str) -> Result<Self, serde_yaml::Error> {
        if contents.trim().is_empty() {
            return Ok(Self::default());
        }
        serde_yaml::from_str(contents)
    }

    /// Overlay environment variables read through `lookup`.
    ///
    /// Unparseable numeric values are ignored and the file value is kept.
    pub fn apply_env(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        if let Some(v) = lookup("REDIS_HOST") {
            self.store.host = v;
        }
        if let Some(v) = lookup("REDIS_PORT").and_then(|v| v.parse().ok()) {
            self.store.port = v;
        }
        if let Some(v) = lookup("REDIS_PASSWORD") {
            self.store.password = Some(v);
        }
        if let Some(v) = lookup("REDIS_DB").and_then(|v| v.parse().ok()) {
            self.store.db = v;
        }
        if let Some(v) = lookup("GITHUB_TOKEN") {
            self.repository.token = Some(v);
        }
        if let Some(v) = lookup("GITHUB_REPO") {
            self.repository.repo = v;
        }
        if let Some(v) = lookup("GITHUB_BRANCH") {
            self.repository.branch = v;
        }
        if let Some(v) = lookup("ASSETSYNC_LOCAL_ROOT") {
            self.repository.local_root = Some(PathBuf::from(v));
            self.repository.backend = RepositoryBackendKind::Local;
        }
        if let Some(v) = lookup("SYNC_INTERVAL").and_then(|v| v.parse().ok()) {
            self.sync.interval_seconds = v;
        }
        if let Some(v) = lookup("SYNC_BATCH_SIZE").and_then(|v| v.parse().ok()) {
            self.sync.batch_size = v;
        }
        if let Some(v) = lookup("LOG_LEVEL") {
            self.logging.level = v.to_ascii_lowercase();
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        match self.repository.backend {
            RepositoryBackendKind::Github => {
                if self.repository.token.as_deref().unwrap_or("").is_empty() {
                    return Err(ConfigError::Invalid(
                        "GitHub token is required; set GITHUB_TOKEN or repository.token".into(),
                    ));
                }
                if self.repository.repo.is_empty() {
                    return Err(ConfigError::Invalid(
                        "GitHub repo is required; set GITHUB_REPO or repository.repo".into(),
                    ));
                }
                let well_formed = matches!(
                    (self.repository.owner(), self.repository.repo_name()),
                    (Some(o), Some(n)) if !o.is_empty() && !n.is_empty() && !n.contains('/')
                );
                if !well_formed {
                    return Err(ConfigError::Invalid(format!(
                        "invalid repo format '{}'; expected 'owner/repo'",
                        self.repository.repo
                    )));
                }
            }
            RepositoryBackendKind::Local => {
                if self.repository.local_root.is_none() {
                    return Err(ConfigError::Invalid(
                        "local repository backend requires repository.local_root".into(),
                    ));
                }
            }
        }
        if self.sync.interval_seconds == 0 {
            return Err(ConfigError::Invalid(
                "sync.interval_seconds must be at least 1".into(),
            ));
        }
        if self.sync.changed_queue_limit == 0 {
            return Err(ConfigError::Invalid(
                "sync.changed_queue_limit must be at least 1".into(),
            ));
        }
        Ok(())
    }
}

/// Resolve the configuration file to read.
///
/// An explicit path always wins; otherwise `./settings.yaml`, then
/// `<config_dir>/assetsync/settings.yaml`.
pub fn resolve_config_path(explicit: Option<&Path>) -> Option<PathBuf> {
    if let Some(path) = explicit {
        return Some(path.to_path_buf());
    }
    let local = PathBuf::from(DEFAULT_CONFIG_FILE);
    if local.exists() {
        return Some(local);
    }
    dirs::config_dir()
        .map(|dir| dir.join("assetsync").join(DEFAULT_CONFIG_FILE))
        .filter(|path| path.exists())
}
