//! Lifecycle of the background pool tasks.
//!
//! [`PoolManager::start`] rebuilds the pool from the storage directory, then
//! spawns three tasks sharing one [`CancellationToken`]:
//!
//! - a [`DirectoryWatcher`] polling the directory and emitting [`PoolEvent`]s,
//! - an [`Intake`] validating and admitting whatever the watcher reports,
//! - a [`Replenisher`] generating files for classes below the minimum.
//!
//! The watcher is seeded with the scan results, so files present at startup
//! are not reported a second time.

use crate::server::config::ServerConfig;
use dhpool::{
    CancellationToken, DirectoryWatcher, Generator, Intake, ParamTool, PoolEvent, PoolStore,
    Replenisher, Retrieval, Validator,
};
use std::sync::Arc;
use tokio::{sync::mpsc, task::JoinHandle};

/// Capacity of the watcher to intake queue.
const EVENT_QUEUE: usize = 64;

pub struct PoolManager {
    store: Arc<PoolStore>,
    config: ServerConfig,
    shutdown_token: CancellationToken,
    tasks: Vec<(&'static str, JoinHandle<()>)>,
}

impl PoolManager {
    /// Scans the storage directory and spawns the background tasks.
    ///
    /// # Errors
    ///
    /// Fails if the storage directory cannot be listed.
    pub async fn start<T>(config: &ServerConfig, tool: Arc<T>) -> anyhow::Result<Self>
    where
        T: ParamTool + 'static,
    {
        let dir = &config.storage_dir;
        let store = Arc::new(PoolStore::new(config.size_classes.iter().copied()));
        let shutdown_token = CancellationToken::new();

        let intake = Intake::new(
            Arc::clone(&store),
            Validator::new(Arc::clone(&tool)),
            dir.clone(),
        )
        .with_reaping(config.reap_orphans);
        let seen = intake.scan().await?;

        let watcher = DirectoryWatcher::new(dir.clone())
            .with_interval(config.watch_interval)
            .with_baseline(seen);
        let replenisher = Replenisher::new(Arc::clone(&store), Generator::new(tool, dir.clone()))
            .with_minimum(config.min_available)
            .with_tick(config.tick);

        let (tx, rx) = mpsc::channel::<PoolEvent>(EVENT_QUEUE);
        let tasks = vec![
            ("watcher", tokio::spawn(watcher.run(tx, shutdown_token.clone()))),
            ("intake", tokio::spawn(intake.run(rx, shutdown_token.clone()))),
            (
                "replenisher",
                tokio::spawn(replenisher.run(shutdown_token.clone())),
            ),
        ];

        Ok(Self {
            store,
            config: config.clone(),
            shutdown_token,
            tasks,
        })
    }

    /// Read-only handle for the HTTP surface.
    pub fn retrieval(&self) -> Retrieval {
        Retrieval::new(
            Arc::clone(&self.store),
            self.config.storage_dir.clone(),
            self.config.min_available,
        )
    }

    /// Signals every task to stop and waits for them.
    ///
    /// A generation already running is allowed to finish, so this can take
    /// as long as one call to the external tool.
    pub async fn shutdown(self) {
        tracing::info!("Stopping pool tasks");
        self.shutdown_token.cancel();

        let waits = self.tasks.into_iter().map(|(name, handle)| async move {
            match handle.await {
                Ok(()) => tracing::debug!("Task {name} stopped"),
                Err(e) => tracing::error!("Task {name} failed: {e}"),
            }
        });
        futures::future::join_all(waits).await;

        tracing::info!("Pool tasks stopped");
    }
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;
    use crate::server::config::CliArgs;
    use clap::Parser;
    use dhpool::{OpensslTool, SizeClass};
    use std::time::{Duration, Instant};
    use tempfile::TempDir;

    fn config(dir: &TempDir) -> ServerConfig {
        let args = CliArgs::try_parse_from([
            "dhpool-server",
            "--storage-dir",
            dir.path().to_str().unwrap(),
            "--size-classes",
            "2048",
            "--min-available",
            "0",
            "--watch-interval-ms",
            "10",
        ])
        .unwrap();
        ServerConfig::try_from(args).unwrap()
    }

    // `true` accepts every file, which is all these tests need.
    fn accept_all() -> Arc<OpensslTool> {
        Arc::new(OpensslTool::new("true"))
    }

    #[tokio::test]
    async fn start_admits_existing_files() {
        let dir = TempDir::new().unwrap();
        std::fs::write(dir.path().join("2048_aaaaaaaa.key"), b"x").unwrap();
        std::fs::write(dir.path().join("4096_aaaaaaaa.key"), b"x").unwrap();

        let manager = PoolManager::start(&config(&dir), accept_all()).await.unwrap();
        let status = manager.retrieval().status();
        assert_eq!(status.minimum, 0);
        assert_eq!(status.classes.len(), 1);
        assert_eq!(status.classes[0].class, SizeClass::new(2048));
        assert_eq!(status.classes[0].available, 1);

        manager.shutdown().await;
    }

    #[tokio::test]
    async fn picks_up_files_created_later() {
        let dir = TempDir::new().unwrap();
        let manager = PoolManager::start(&config(&dir), accept_all()).await.unwrap();
        let retrieval = manager.retrieval();
        assert!(retrieval.pick("2048").is_err());

        std::fs::write(dir.path().join("2048_bbbbbbbb.key"), b"x").unwrap();

        let deadline = Instant::now() + Duration::from_secs(5);
        while retrieval.status().classes[0].available == 0 {
            assert!(Instant::now() < deadline, "file was never admitted");
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        assert_eq!(
            retrieval.pick("2048").unwrap(),
            dir.path().join("2048_bbbbbbbb.key")
        );

        manager.shutdown().await;
    }

    #[tokio::test]
    async fn start_fails_without_directory() {
        let dir = TempDir::new().unwrap();
        let mut config = config(&dir);
        config.storage_dir = dir.path().join("missing");
        assert!(PoolManager::start(&config, accept_all()).await.is_err());
    }
}
