//! # Directory watching
//!
//! Admission and eviction are driven by filesystem notifications. They are
//! carried as [`PoolEvent`]s over a bounded [`mpsc`] queue, so the consumer
//! ([`Intake`](crate::Intake)) does not care where they come from: the
//! polling [`DirectoryWatcher`] in production, or synthetic events in tests.
//!
//! The watcher keeps the set of candidate names it saw last and, on each
//! poll, reports the difference against a fresh listing. Only names that
//! follow the artifact naming convention are considered; staging files and
//! foreign files are invisible to it.

use crate::ArtifactName;
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tokio::{fs, sync::mpsc, time::MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// Default delay between two directory listings.
pub const DEFAULT_WATCH_INTERVAL: Duration = Duration::from_secs(1);

/// Shortest period accepted by the polling loops; `tokio::time::interval`
/// rejects a zero period.
pub(crate) const MIN_PERIOD: Duration = Duration::from_millis(1);

/// A create or delete notification for a file in the storage directory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PoolEvent {
    Created(PathBuf),
    Removed(PathBuf),
}

/// Polling watcher over the storage directory.
#[derive(Debug)]
pub struct DirectoryWatcher {
    dir: PathBuf,
    interval: Duration,
    known: HashSet<String>,
}

impl DirectoryWatcher {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self {
            dir: dir.into(),
            interval: DEFAULT_WATCH_INTERVAL,
            known: HashSet::new(),
        }
    }

    /// Sets the polling period, clamped to at least one millisecond.
    pub fn with_interval(mut self, interval: Duration) -> Self {
        self.interval = interval.max(MIN_PERIOD);
        self
    }

    /// Seeds the set of names considered already seen.
    ///
    /// Pass the names returned by [`Intake::scan`](crate::Intake::scan): the
    /// first poll then reports exactly what changed since the scan, leaving
    /// no window in which a file could slip by unnoticed.
    pub fn with_baseline(mut self, names: impl IntoIterator<Item = String>) -> Self {
        self.known = names.into_iter().collect();
        self
    }

    /// Lists the directory once and returns what changed since the last call.
    ///
    /// Removals are reported before creations. On error the known set is left
    /// untouched, so nothing is lost; the next successful poll catches up.
    pub async fn poll(&mut self) -> std::io::Result<Vec<PoolEvent>> {
        let current = list_candidates(&self.dir).await?;

        let mut events: Vec<_> = self
            .known
            .difference(&current)
            .map(|name| PoolEvent::Removed(self.dir.join(name)))
            .collect();
        events.extend(
            current
                .difference(&self.known)
                .map(|name| PoolEvent::Created(self.dir.join(name))),
        );

        self.known = current;
        Ok(events)
    }

    /// Polls until `shutdown` fires or the receiving side goes away.
    pub async fn run(mut self, tx: mpsc::Sender<PoolEvent>, shutdown: CancellationToken) {
        info!(
            dir = %self.dir.display(),
            interval_ms = self.interval.as_millis() as u64,
            "Directory watcher starting"
        );

        let mut interval = tokio::time::interval(self.interval);
        interval.set_missed_tick_behavior(MissedTickBehavior::Delay);

        'outer: loop {
            tokio::select! {
                biased;

                () = shutdown.cancelled() => break,

                _ = interval.tick() => {
                    let events = match self.poll().await {
                        Ok(events) => events,
                        Err(e) => {
                            warn!(dir = %self.dir.display(), "Could not list storage directory: {e}");
                            continue;
                        }
                    };
                    for event in events {
                        debug!(?event, "Directory change");
                        if tx.send(event).await.is_err() {
                            debug!("Event queue closed");
                            break 'outer;
                        }
                    }
                }
            }
        }

        info!("Directory watcher stopped");
    }
}

/// Names in `dir` that follow the artifact naming convention.
pub(crate) async fn list_candidates(dir: &Path) -> std::io::Result<HashSet<String>> {
    let mut names = HashSet::new();
    let mut entries = fs::read_dir(dir).await?;
    while let Some(entry) = entries.next_entry().await? {
        let Ok(name) = entry.file_name().into_string() else {
            continue;
        };
        if ArtifactName::parse(&name).is_some() {
            names.insert(name);
        }
    }
    Ok(names)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn touch(dir: &TempDir, name: &str) {
        std::fs::write(dir.path().join(name), b"x").unwrap();
    }

    #[tokio::test]
    async fn reports_creations_and_removals() {
        let dir = TempDir::new().unwrap();
        let mut watcher = DirectoryWatcher::new(dir.path());
        assert!(watcher.poll().await.unwrap().is_empty());

        touch(&dir, "2048_aaaaaaaa.key");
        touch(&dir, "notes.txt");
        touch(&dir, ".2048_bbbbbbbb.key.partial");
        assert_eq!(
            watcher.poll().await.unwrap(),
            vec![PoolEvent::Created(dir.path().join("2048_aaaaaaaa.key"))]
        );
        assert!(watcher.poll().await.unwrap().is_empty());

        std::fs::remove_file(dir.path().join("2048_aaaaaaaa.key")).unwrap();
        touch(&dir, "4096_cccccccc.key");
        assert_eq!(
            watcher.poll().await.unwrap(),
            vec![
                PoolEvent::Removed(dir.path().join("2048_aaaaaaaa.key")),
                PoolEvent::Created(dir.path().join("4096_cccccccc.key")),
            ]
        );
    }

    #[tokio::test]
    async fn baseline_suppresses_known_names() {
        let dir = TempDir::new().unwrap();
        touch(&dir, "2048_aaaaaaaa.key");
        touch(&dir, "2048_bbbbbbbb.key");

        let mut watcher = DirectoryWatcher::new(dir.path())
            .with_baseline(["2048_aaaaaaaa.key".to_string()]);
        assert_eq!(
            watcher.poll().await.unwrap(),
            vec![PoolEvent::Created(dir.path().join("2048_bbbbbbbb.key"))]
        );
    }

    #[tokio::test]
    async fn listing_error_keeps_state() {
        let dir = TempDir::new().unwrap();
        let storage = dir.path().join("storage");
        std::fs::create_dir(&storage).unwrap();
        std::fs::write(storage.join("2048_aaaaaaaa.key"), b"x").unwrap();

        let mut watcher = DirectoryWatcher::new(&storage);
        assert_eq!(watcher.poll().await.unwrap().len(), 1);

        std::fs::rename(&storage, dir.path().join("elsewhere")).unwrap();
        assert!(watcher.poll().await.is_err());

        std::fs::rename(dir.path().join("elsewhere"), &storage).unwrap();
        assert!(watcher.poll().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn run_delivers_events_until_cancelled() {
        let dir = TempDir::new().unwrap();
        let (tx, mut rx) = mpsc::channel(8);
        let shutdown = CancellationToken::new();
        let watcher = DirectoryWatcher::new(dir.path()).with_interval(Duration::from_millis(10));
        let handle = tokio::spawn(watcher.run(tx, shutdown.clone()));

        touch(&dir, "2048_aaaaaaaa.key");
        let event = tokio::time::timeout(Duration::from_secs(5), rx.recv())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(event, PoolEvent::Created(dir.path().join("2048_aaaaaaaa.key")));

        shutdown.cancel();
        handle.await.unwrap();
        assert!(rx.recv().await.is_none());
    }

    #[tokio::test]
    async fn zero_interval_is_clamped() {
        let dir = TempDir::new().unwrap();
        let (tx, _rx) = mpsc::channel(8);
        let shutdown = CancellationToken::new();
        let watcher = DirectoryWatcher::new(dir.path()).with_interval(Duration::ZERO);
        assert_eq!(watcher.interval, MIN_PERIOD);

        let handle = tokio::spawn(watcher.run(tx, shutdown.clone()));
        tokio::time::sleep(Duration::from_millis(10)).await;
        shutdown.cancel();
        tokio::time::timeout(Duration::from_secs(5), handle)
            .await
            .unwrap()
            .unwrap();
    }
}
