use crate::{ArtifactName, Error, ParamTool, Result, SizeClass};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::fs;
use tracing::{debug, error, info, instrument, warn};

/// Upper bound on random name draws before giving up on a generation.
pub const MAX_NAME_ATTEMPTS: usize = 16;

/// Produces new artifact files in the storage directory.
///
/// The generator never touches the pool. A finished file only becomes
/// available once the directory watcher reports it and it passes validation,
/// which keeps admission in one place regardless of what produced the file.
///
/// The tool writes to a hidden staging file (`.<name>.partial`) that does not
/// match the artifact naming convention; on success it is renamed into place,
/// so observers never see a half-written artifact.
#[derive(Debug)]
pub struct Generator<T> {
    tool: Arc<T>,
    dir: PathBuf,
    max_attempts: usize,
}

impl<T: ParamTool> Generator<T> {
    pub fn new(tool: Arc<T>, dir: impl Into<PathBuf>) -> Self {
        Self {
            tool,
            dir: dir.into(),
            max_attempts: MAX_NAME_ATTEMPTS,
        }
    }

    /// Overrides [`MAX_NAME_ATTEMPTS`].
    pub fn with_max_attempts(mut self, max_attempts: usize) -> Self {
        self.max_attempts = max_attempts;
        self
    }

    /// Draws a random name for `class` that does not exist on disk yet.
    ///
    /// # Errors
    ///
    /// - [`Error::NameExhausted`] if every attempt collided.
    /// - [`Error::Io`] if the storage directory cannot be inspected.
    pub async fn fresh_name(&self, class: SizeClass) -> Result<ArtifactName> {
        for _ in 0..self.max_attempts {
            let name = ArtifactName::random(class);
            let taken = fs::try_exists(self.dir.join(&name.id)).await?
                || fs::try_exists(self.staging_path(&name)).await?;
            if !taken {
                return Ok(name);
            }
            debug!(id = %name.id, "Name collision, drawing again");
        }
        Err(Error::NameExhausted {
            class,
            attempts: self.max_attempts,
        })
    }

    /// Generates one artifact of `class`.
    ///
    /// Failures are logged and swallowed: the replenish loop simply tries
    /// again on a later tick. Success is not reported either, as the pool
    /// learns about the new file through the watcher.
    #[instrument(skip_all, fields(class = %class))]
    pub async fn generate(&self, class: SizeClass) {
        match self.try_generate(class).await {
            Ok(name) => info!(id = %name.id, "Generated {class}-bit parameters"),
            Err(e) => error!("{e}"),
        }
    }

    async fn try_generate(&self, class: SizeClass) -> Result<ArtifactName> {
        let name = self.fresh_name(class).await?;
        let staging = self.staging_path(&name);

        let outcome = match self.tool.generate(class, &staging).await {
            Ok(outcome) => outcome,
            Err(e) => {
                discard(&staging).await;
                return Err(e);
            }
        };
        if !outcome.success {
            discard(&staging).await;
            return Err(Error::GenerationFailed {
                class,
                reason: outcome.diagnostics,
            });
        }

        if let Err(e) = fs::rename(&staging, self.dir.join(&name.id)).await {
            discard(&staging).await;
            return Err(e.into());
        }
        Ok(name)
    }

    fn staging_path(&self, name: &ArtifactName) -> PathBuf {
        self.dir.join(name.staging_name())
    }
}

async fn discard(path: &Path) {
    match fs::remove_file(path).await {
        Ok(()) => {}
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
        Err(e) => warn!(path = %path.display(), "Could not remove staging file: {e}"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::FakeTool;
    use tempfile::TempDir;

    const C2048: SizeClass = SizeClass::new(2048);

    fn entries(dir: &TempDir) -> Vec<String> {
        let mut names: Vec<_> = std::fs::read_dir(dir.path())
            .unwrap()
            .map(|e| e.unwrap().file_name().into_string().unwrap())
            .collect();
        names.sort();
        names
    }

    #[tokio::test]
    async fn generates_named_artifact() {
        let dir = TempDir::new().unwrap();
        let tool = Arc::new(FakeTool::default());
        let generator = Generator::new(Arc::clone(&tool), dir.path());

        generator.generate(C2048).await;

        let names = entries(&dir);
        assert_eq!(names.len(), 1);
        let parsed = ArtifactName::parse(&names[0]).unwrap();
        assert_eq!(parsed.class, C2048);
        assert_eq!(tool.generated(), 1);
        assert!(
            tool.check(&dir.path().join(&names[0]))
                .await
                .unwrap()
                .success
        );
    }

    #[tokio::test]
    async fn failed_generation_leaves_nothing_behind() {
        let dir = TempDir::new().unwrap();
        let tool = Arc::new(FakeTool::default());
        tool.fail_generation(true);
        let generator = Generator::new(Arc::clone(&tool), dir.path());

        let err = generator.try_generate(C2048).await.unwrap_err();
        assert!(matches!(err, Error::GenerationFailed { class, .. } if class == C2048));

        // `generate` swallows the failure.
        generator.generate(C2048).await;
        assert_eq!(tool.generated(), 2);
        assert!(entries(&dir).is_empty());
    }

    #[tokio::test]
    async fn fresh_name_is_free() {
        let dir = TempDir::new().unwrap();
        let generator = Generator::new(Arc::new(FakeTool::default()), dir.path());

        let name = generator.fresh_name(C2048).await.unwrap();
        assert_eq!(name.class, C2048);
        assert!(!dir.path().join(&name.id).exists());
    }

    #[tokio::test]
    async fn name_attempts_are_bounded() {
        let dir = TempDir::new().unwrap();
        let tool = Arc::new(FakeTool::default());
        let generator = Generator::new(Arc::clone(&tool), dir.path()).with_max_attempts(0);

        let err = generator.fresh_name(C2048).await.unwrap_err();
        assert!(matches!(
            err,
            Error::NameExhausted {
                attempts: 0,
                ..
            }
        ));

        generator.generate(C2048).await;
        assert_eq!(tool.generated(), 0);
    }

    #[tokio::test]
    async fn missing_directory_is_contained() {
        let dir = TempDir::new().unwrap();
        let missing = dir.path().join("gone");
        let tool = Arc::new(FakeTool::default());
        let generator = Generator::new(Arc::clone(&tool), &missing);

        // Must neither panic nor create the directory.
        generator.generate(C2048).await;
        assert!(!missing.exists());
    }
}
