use std::sync::Arc;
use std::time::Duration;

use tokio::sync::broadcast;
use tokio::time::MissedTickBehavior;

use assetsync_core::config::Config;
use assetsync_engine::{Engine, EngineOptions, SyncStats, SyncSummary};
use assetsync_repo::ManifestRepository;
use assetsync_store::AssetStore;

use crate::error::{io_err, DaemonError};

/// Shared handles a pass is built from.
#[derive(Clone)]
pub struct Services {
    pub repo: Arc<dyn ManifestRepository>,
    pub store: Arc<AssetStore>,
    pub options: EngineOptions,
}

/// Shortest period the poller will tick at.
pub const MIN_INTERVAL: Duration = Duration::from_secs(1);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PassKind {
    Full,
    Incremental,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PollSettings {
    pub interval: Duration,
    pub kind: PassKind,
    /// Stop after this many passes; `None` runs until shutdown.
    pub max_passes: Option<usize>,
}

impl PollSettings {
    pub fn from_config(config: &Config) -> Self {
        Self {
            interval: config.sync.interval(),
            kind: if config.sync.enable_incremental {
                PassKind::Incremental
            } else {
                PassKind::Full
            },
            max_passes: None,
        }
    }
}

/// What the loop did before it stopped.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PollReport {
    pub passes: usize,
    pub failed_passes: usize,
    /// Summary of the most recent successful pass.
    pub last: Option<SyncSummary>,
}

/// Build a runtime and poll until ctrl-c.
pub fn start_blocking(services: Services, settings: PollSettings) -> Result<PollReport, DaemonError> {
    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .map_err(|e| io_err("tokio-runtime", e))?;
    runtime.block_on(run(services, settings))
}

/// Poll until ctrl-c, or until `max_passes` is reached.
pub async fn run(services: Services, settings: PollSettings) -> Result<PollReport, DaemonError> {
    let (shutdown_tx, _) = broadcast::channel::<()>(4);

    let poll_handle = {
        let shutdown = shutdown_tx.clone();
        let rx = shutdown.subscribe();
        tokio::spawn(async move {
            let result = poll(services, settings, rx).await;
            let _ = shutdown.send(());
            result
        })
    };

    let signal_handle = {
        let shutdown = shutdown_tx.clone();
        tokio::spawn(async move {
            let mut shutdown_rx = shutdown.subscribe();
            tokio::select! {
                _ = shutdown_rx.recv() => Ok(()),
                signal = tokio::signal::ctrl_c() => match signal {
                    Ok(()) => {
                        tracing::info!("received ctrl-c, stopping after the current pass");
                        let _ = shutdown.send(());
                        Ok(())
                    }
                    Err(err) => Err(DaemonError::Signal(err.to_string())),
                },
            }
        })
    };

    let (poll_result, signal_result) = tokio::join!(poll_handle, signal_handle);
    let report = handle_join("poller", poll_result)?;
    handle_join("signal_handler", signal_result)?;
    Ok(report)
}

/// The polling loop. The first pass starts immediately; shutdown is only
/// observed between passes.
pub async fn poll(
    services: Services,
    settings: PollSettings,
    mut shutdown_rx: broadcast::Receiver<()>,
) -> Result<PollReport, DaemonError> {
    let mut report = PollReport::default();
    let period = settings.interval.max(MIN_INTERVAL);
    let mut interval = tokio::time::interval(period);
    interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
    tracing::info!(
        interval_secs = period.as_secs(),
        kind = ?settings.kind,
        "starting continuous sync"
    );

    loop {
        tokio::select! {
            biased;
            _ = shutdown_rx.recv() => break,
            _ = interval.tick() => {
                report.passes += 1;
                match run_pass(services.clone(), settings.kind).await {
                    Ok(stats) => {
                        tracing::info!(
                            pass = report.passes,
                            created = stats.created,
                            updated = stats.updated,
                            deleted = stats.deleted,
                            failed = stats.failed,
                            "pass finished"
                        );
                        report.last = Some(stats.summary());
                    }
                    Err(DaemonError::Engine(err)) => {
                        report.failed_passes += 1;
                        tracing::error!(pass = report.passes, error = %err, "pass failed; retrying next interval");
                    }
                    Err(err) => return Err(err),
                }
                if settings.max_passes.is_some_and(|max| report.passes >= max) {
                    break;
                }
            }
        }
    }

    tracing::info!(passes = report.passes, failed = report.failed_passes, "continuous sync stopped");
    Ok(report)
}

async fn run_pass(services: Services, kind: PassKind) -> Result<SyncStats, DaemonError> {
    let result = tokio::task::spawn_blocking(move || {
        let engine = Engine::new(services.repo.as_ref(), &services.store, services.options.clone());
        match kind {
            PassKind::Full => engine.sync_from_repository(),
            PassKind::Incremental => engine.incremental_sync(),
        }
    })
    .await
    .map_err(|err| DaemonError::Join {
        task: "sync_pass".to_string(),
        message: err.to_string(),
    })?;
    Ok(result?)
}

fn handle_join<T>(
    task: &str,
    result: Result<Result<T, DaemonError>, tokio::task::JoinError>,
) -> Result<T, DaemonError> {
    match result {
        Ok(inner) => inner,
        Err(err) => Err(DaemonError::Join {
            task: task.to_string(),
            message: err.to_string(),
        }),
    }
}

/// Install the global stderr subscriber. `RUST_LOG` wins over `default_level`.
pub fn init_tracing(default_level: &str, json: bool) {
    use tracing_subscriber::{fmt, EnvFilter};

    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    let builder = fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(filter)
        .with_target(false);
    let _ = if json {
        builder.json().try_init()
    } else {
        builder.try_init()
    };
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    use assetsync_repo::LocalRepository;
    use tempfile::TempDir;
    use tokio::time::advance;

    fn services(root: &std::path::Path) -> Services {
        Services {
            repo: Arc::new(LocalRepository::new(root)),
            store: Arc::new(AssetStore::in_memory()),
            options: EngineOptions::default(),
        }
    }

    fn seed(root: &std::path::Path, id: &str) {
        let dir = root.join("tools").join(id);
        fs::create_dir_all(&dir).unwrap();
        fs::write(
            dir.join("manifest.yaml"),
            format!("id: {id}\nversion: 1.0.0\ncategory: tool\nname: {id}\ndescription: d\n"),
        )
        .unwrap();
    }

    fn settings(kind: PassKind, max_passes: Option<usize>) -> PollSettings {
        PollSettings {
            interval: Duration::from_secs(300),
            kind,
            max_passes,
        }
    }

    #[tokio::test(start_paused = true)]
    async fn first_pass_runs_immediately_then_on_interval() {
        let dir = TempDir::new().unwrap();
        seed(dir.path(), "a");
        let svc = services(dir.path());
        let store = svc.store.clone();
        let (_tx, rx) = broadcast::channel(1);

        let report = poll(svc, settings(PassKind::Full, Some(2)), rx).await.unwrap();
        assert_eq!(report.passes, 2);
        assert_eq!(report.failed_passes, 0);
        assert!(store.get_asset("a").unwrap().is_some());
        let last = report.last.expect("summary");
        assert_eq!(last.created, 0, "second pass is a no-op");
    }

    #[tokio::test(start_paused = true)]
    async fn shutdown_stops_between_passes() {
        let dir = TempDir::new().unwrap();
        seed(dir.path(), "a");
        let svc = services(dir.path());
        let store = svc.store.clone();
        let (tx, rx) = broadcast::channel(1);
        let handle = tokio::spawn(poll(svc, settings(PassKind::Full, None), rx));

        while store.get_asset("a").unwrap().is_none() {
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        tx.send(()).unwrap();
        advance(Duration::from_secs(1)).await;

        let report = handle.await.unwrap().unwrap();
        assert_eq!(report.passes, 1);
        assert_eq!(report.failed_passes, 0);
    }

    #[tokio::test(start_paused = true)]
    async fn failing_passes_do_not_stop_the_loop() {
        let dir = TempDir::new().unwrap();
        let svc = services(&dir.path().join("missing"));
        let store = svc.store.clone();
        let (_tx, rx) = broadcast::channel(1);

        let report = poll(svc, settings(PassKind::Full, Some(3)), rx).await.unwrap();
        assert_eq!(report.passes, 3);
        assert_eq!(report.failed_passes, 3);
        assert!(report.last.is_none());
        assert!(store.lease_holder().unwrap().is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn zero_interval_is_raised_to_minimum() {
        let dir = TempDir::new().unwrap();
        seed(dir.path(), "a");
        let (_tx, rx) = broadcast::channel(1);
        let mut s = settings(PassKind::Full, Some(2));
        s.interval = Duration::ZERO;

        let report = poll(services(dir.path()), s, rx).await.unwrap();
        assert_eq!(report.passes, 2);
        assert_eq!(report.failed_passes, 0);
    }

    #[tokio::test(start_paused = true)]
    async fn incremental_passes_fall_back_to_full_sync_first() {
        let dir = TempDir::new().unwrap();
        seed(dir.path(), "a");
        seed(dir.path(), "b");
        let svc = services(dir.path());
        let store = svc.store.clone();
        let (_tx, rx) = broadcast::channel(1);

        let report = poll(svc, settings(PassKind::Incremental, Some(1)), rx).await.unwrap();
        assert_eq!(report.last.expect("summary").created, 2);
        assert_eq!(store.sync_state().unwrap().synced_count, 2);
    }

    #[test]
    fn settings_follow_config() {
        let mut config = Config::default();
        config.sync.interval_seconds = 60;
        config.sync.enable_incremental = false;
        let s = PollSettings::from_config(&config);
        assert_eq!(s.interval, Duration::from_secs(60));
        assert_eq!(s.kind, PassKind::Full);
        assert_eq!(s.max_passes, None);
    }
}
