use crate::{Error, ParamTool, Result};
use std::path::Path;
use std::sync::Arc;
use tracing::{debug, warn};

/// Guards admission: only files the external tool accepts may enter the
/// pool. Used both for the cold-start scan and for every create event.
#[derive(Debug)]
pub struct Validator<T> {
    tool: Arc<T>,
}

impl<T: ParamTool> Validator<T> {
    pub fn new(tool: Arc<T>) -> Self {
        Self { tool }
    }

    /// Runs the external check against `path`.
    ///
    /// # Errors
    ///
    /// - [`Error::ValidationFailed`] if the tool rejects the file.
    /// - [`Error::Io`] if the tool could not be started.
    pub async fn verify(&self, path: &Path) -> Result<()> {
        let outcome = self.tool.check(path).await?;
        if outcome.success {
            return Ok(());
        }
        if !outcome.diagnostics.is_empty() {
            debug!(path = %path.display(), "{}", outcome.diagnostics);
        }
        Err(Error::ValidationFailed {
            path: path.to_path_buf(),
        })
    }

    /// Pass/fail form of [`Self::verify`]; tool start-up failures count as a
    /// failed validation.
    pub async fn validate(&self, path: &Path) -> bool {
        match self.verify(path).await {
            Ok(()) => true,
            Err(e @ Error::ValidationFailed { .. }) => {
                debug!("{e}");
                false
            }
            Err(e) => {
                warn!(path = %path.display(), "Could not run validation: {e}");
                false
            }
        }
    }
}
