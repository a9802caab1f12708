pub mod get;
pub mod health;
pub mod list;
pub mod status;
pub mod sync;
pub mod validate;
pub mod write;

use std::path::Path;
use std::sync::Arc;

use anyhow::{Context, Result};
use chrono::DateTime;

use assetsync_core::config::{resolve_config_path, Config, LoggingConfig};
use assetsync_engine::{Engine, EngineOptions};
use assetsync_repo::{open_repository, ManifestRepository};
use assetsync_store::AssetStore;

use crate::GlobalArgs;

/// Configuration plus the handles every store-facing command needs.
pub struct Services {
    pub config: Config,
    pub repo: Arc<dyn ManifestRepository>,
    pub store: Arc<AssetStore>,
}

impl Services {
    /// Load settings, start logging and build both clients. Nothing is
    /// contacted yet.
    pub fn open(global: &GlobalArgs) -> Result<Self> {
        let path = resolve_config_path(global.config.as_deref());
        let config = Config::load(path.as_deref()).with_context(|| match &path {
            Some(p) => format!("failed to load configuration from {}", p.display()),
            None => "failed to load configuration from the environment".to_string(),
        })?;
        init_logging(global.verbose, &config.logging);
        tracing::debug!(config = ?path, "configuration loaded");

        let store = AssetStore::from_config(&config.store).context("failed to open asset store")?;
        let repo = open_repository(&config.repository).context("failed to open repository")?;
        Ok(Self {
            config,
            repo,
            store: Arc::new(store),
        })
    }

    /// Connect to the store; commands that read or write it call this first.
    pub fn connect(&self) -> Result<()> {
        self.store.connect().context("cannot connect to the asset store")
    }

    pub fn engine(&self) -> Engine<'_> {
        Engine::new(self.repo.as_ref(), &self.store, EngineOptions::from_config(&self.config))
    }

    pub fn daemon_services(&self) -> assetsync_daemon::Services {
        assetsync_daemon::Services {
            repo: self.repo.clone(),
            store: self.store.clone(),
            options: EngineOptions::from_config(&self.config),
        }
    }
}

pub fn init_logging(verbose: bool, logging: &LoggingConfig) {
    let level = if verbose { "debug" } else { logging.level.as_str() };
    assetsync_daemon::init_tracing(level, logging.json);
}

/// Read a YAML manifest from disk into a JSON value.
pub fn read_manifest_file(path: &Path) -> Result<serde_json::Value> {
    let text = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read {}", path.display()))?;
    assetsync_core::validate::parse_yaml(&text)
        .with_context(|| format!("{} is not valid YAML", path.display()))
}

/// Unix seconds as RFC 3339, or `never`.
pub fn format_time(secs: Option<i64>) -> String {
    secs.and_then(|s| DateTime::from_timestamp(s, 0))
        .map(|t| t.to_rfc3339())
        .unwrap_or_else(|| "never".to_string())
}

pub fn print_json<T: serde::Serialize>(value: &T) -> Result<()> {
    println!(
        "{}",
        serde_json::to_string_pretty(value).context("failed to render JSON")?
    );
    Ok(())
}
