use crate::{ArtifactName, ParamTool, PoolEvent, PoolStore, Result, Validator, watch};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::{fs, sync::mpsc};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, instrument, warn};

/// Single entry point for admissions and evictions.
///
/// Whatever produced a file, it reaches the pool only through here: the
/// cold-start [`Intake::scan`] and create events both parse the name, drop
/// unserved size classes, validate, and only then admit. Delete events evict.
///
/// Files that fail validation are left on disk untracked, unless orphan
/// reaping is enabled with [`Intake::with_reaping`].
#[derive(Debug)]
pub struct Intake<T> {
    store: Arc<PoolStore>,
    validator: Validator<T>,
    dir: PathBuf,
    reap_orphans: bool,
}

impl<T: ParamTool> Intake<T> {
    pub fn new(store: Arc<PoolStore>, validator: Validator<T>, dir: impl Into<PathBuf>) -> Self {
        Self {
            store,
            validator,
            dir: dir.into(),
            reap_orphans: false,
        }
    }

    /// Deletes candidates that fail validation instead of leaving them.
    pub fn with_reaping(mut self, reap_orphans: bool) -> Self {
        self.reap_orphans = reap_orphans;
        self
    }

    pub fn store(&self) -> &Arc<PoolStore> {
        &self.store
    }

    /// Rebuilds the pool from the storage directory.
    ///
    /// Returns every candidate name seen, admitted or not, to seed
    /// [`DirectoryWatcher::with_baseline`](crate::DirectoryWatcher::with_baseline).
    ///
    /// Staging files left by a generation that never finished are deleted
    /// first. Call this before any generator runs on the same directory.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Io`](crate::Error::Io) if the directory cannot be
    /// listed. Per-file validation failures are not errors.
    #[instrument(skip_all, fields(dir = %self.dir.display()))]
    pub async fn scan(&self) -> Result<Vec<String>> {
        self.remove_stale_staging().await?;

        let mut names: Vec<_> = watch::list_candidates(&self.dir).await?.into_iter().collect();
        names.sort();

        for name in &names {
            self.admit_candidate(&self.dir.join(name)).await;
        }

        for class in self.store.classes() {
            info!(
                "Found {} usable {class}-bit parameter files",
                self.store.count(class)
            );
        }
        Ok(names)
    }

    /// Applies one directory event to the pool.
    pub async fn handle(&self, event: PoolEvent) {
        match event {
            PoolEvent::Created(path) => self.admit_candidate(&path).await,
            PoolEvent::Removed(path) => {
                let Some(name) = self.recognized(&path) else {
                    return;
                };
                if self.store.evict(&name.id, name.class) {
                    info!(
                        id = %name.id,
                        available = self.store.count(name.class),
                        "Evicted {}-bit parameters",
                        name.class
                    );
                }
            }
        }
    }

    /// Drains `rx` until `shutdown` fires or every sender is gone.
    pub async fn run(self, mut rx: mpsc::Receiver<PoolEvent>, shutdown: CancellationToken) {
        loop {
            let event = tokio::select! {
                biased;

                () = shutdown.cancelled() => break,

                event = rx.recv() => match event {
                    Some(event) => event,
                    None => break,
                },
            };
            // Not raced against shutdown: an in-flight validation finishes.
            self.handle(event).await;
        }
        debug!("Intake stopped");
    }

    async fn remove_stale_staging(&self) -> Result<()> {
        let mut entries = fs::read_dir(&self.dir).await?;
        while let Some(entry) = entries.next_entry().await? {
            let Ok(name) = entry.file_name().into_string() else {
                continue;
            };
            if ArtifactName::parse_staging(&name).is_none() {
                continue;
            }
            let path = entry.path();
            match fs::remove_file(&path).await {
                Ok(()) => info!(path = %path.display(), "Removed interrupted generation"),
                Err(e) => warn!(path = %path.display(), "Could not remove staging file: {e}"),
            }
        }
        Ok(())
    }

    async fn admit_candidate(&self, path: &Path) {
        let Some(name) = self.recognized(path) else {
            return;
        };

        if !self.validator.validate(path).await {
            warn!(path = %path.display(), "Ignoring invalid parameter file");
            if self.reap_orphans {
                match fs::remove_file(path).await {
                    Ok(()) => info!(path = %path.display(), "Removed invalid parameter file"),
                    Err(e) => warn!(path = %path.display(), "Could not remove invalid file: {e}"),
                }
            }
            return;
        }

        if self.store.admit(name.id.clone(), name.class) {
            info!(
                id = %name.id,
                available = self.store.count(name.class),
                "Admitted {}-bit parameters",
                name.class
            );
        }
    }

    /// Parses the file name and keeps it only if its class is served.
    fn recognized(&self, path: &Path) -> Option<ArtifactName> {
        let name = ArtifactName::parse(path.file_name()?.to_str()?)?;
        if !self.store.recognizes(name.class) {
            debug!(path = %path.display(), "Ignoring unserved size class {}", name.class);
            return None;
        }
        Some(name)
    }
}
