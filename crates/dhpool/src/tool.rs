//! # External parameter tool
//!
//! Generation and well-formedness checks are delegated to an external
//! command-line tool, treated as a black box that reports success through its
//! exit status. [`ParamTool`] is the seam; [`OpensslTool`] is the production
//! implementation and tests substitute their own.

use crate::{Result, SizeClass};
use core::future::Future;
use std::ffi::OsStr;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use tokio::process::Command;

/// What the tool reported for one invocation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ToolOutcome {
    /// `true` when the tool exited with status 0.
    pub success: bool,
    /// Captured diagnostic output, kept for logs.
    pub diagnostics: String,
}

impl ToolOutcome {
    pub fn ok() -> Self {
        Self {
            success: true,
            diagnostics: String::new(),
        }
    }

    pub fn failed(diagnostics: impl Into<String>) -> Self {
        Self {
            success: false,
            diagnostics: diagnostics.into(),
        }
    }
}

/// Contract of the external tool.
///
/// Both calls may block for a long time (4096-bit generation takes minutes),
/// so callers must never hold a pool lock across them. Returned futures are
/// `Send` so they can run on spawned tasks.
pub trait ParamTool: Send + Sync {
    /// Writes a fresh artifact of `class` to `output`.
    ///
    /// On success `output` holds a well-formed artifact.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Io`](crate::Error::Io) if the tool could not be
    /// started at all. A tool that runs and fails is reported through
    /// [`ToolOutcome::success`].
    fn generate(
        &self,
        class: SizeClass,
        output: &Path,
    ) -> impl Future<Output = Result<ToolOutcome>> + Send;

    /// Checks whether the file at `path` is a well-formed artifact.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Io`](crate::Error::Io) if the tool could not be
    /// started.
    fn check(&self, path: &Path) -> impl Future<Output = Result<ToolOutcome>> + Send;
}

/// [`ParamTool`] backed by `openssl dhparam`.
///
/// Standard output is discarded; standard error is captured for logging.
/// Children are not killed when their future is dropped, so an in-flight
/// generation always runs to completion.
#[derive(Debug, Clone)]
pub struct OpensslTool {
    program: PathBuf,
}

impl OpensslTool {
    pub fn new(program: impl Into<PathBuf>) -> Self {
        Self {
            program: program.into(),
        }
    }

    async fn run(&self, args: &[&OsStr]) -> Result<ToolOutcome> {
        let output = Command::new(&self.program)
            .args(args)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .kill_on_drop(false)
            .output()
            .await?;

        Ok(ToolOutcome {
            success: output.status.success(),
            diagnostics: String::from_utf8_lossy(&output.stderr).trim().to_string(),
        })
    }
}

impl Default for OpensslTool {
    fn default() -> Self {
        Self::new("openssl")
    }
}

impl ParamTool for OpensslTool {
    async fn generate(&self, class: SizeClass, output: &Path) -> Result<ToolOutcome> {
        let bits = class.to_string();
        self.run(&[
            OsStr::new("dhparam"),
            OsStr::new("-out"),
            output.as_os_str(),
            OsStr::new(&bits),
        ])
        .await
    }

    async fn check(&self, path: &Path) -> Result<ToolOutcome> {
        self.run(&[
            OsStr::new("dhparam"),
            OsStr::new("-in"),
            path.as_os_str(),
            OsStr::new("-noout"),
        ])
        .await
    }
}
