//! Test doubles shared across module tests.

use crate::{ParamTool, Result, SizeClass, ToolOutcome};
use std::path::Path;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::time::Duration;

const MARKER: &[u8] = b"-----BEGIN DH PARAMETERS-----\n";

/// Stand-in for the external tool: "generates" marker files and accepts only
/// files that start with the marker.
#[derive(Debug, Default)]
pub struct FakeTool {
    generated: AtomicUsize,
    checked: AtomicUsize,
    fail_generation: AtomicBool,
    delay: Duration,
}

impl FakeTool {
    /// A tool whose generation takes `delay` before writing anything.
    pub fn slow(delay: Duration) -> Self {
        Self {
            delay,
            ..Self::default()
        }
    }

    pub fn write_valid(path: &Path) {
        std::fs::write(path, MARKER).unwrap();
    }

    pub fn fail_generation(&self, fail: bool) {
        self.fail_generation.store(fail, Ordering::SeqCst);
    }

    /// Number of generation attempts, failed ones included.
    pub fn generated(&self) -> usize {
        self.generated.load(Ordering::SeqCst)
    }

    pub fn checked(&self) -> usize {
        self.checked.load(Ordering::SeqCst)
    }
}

impl ParamTool for FakeTool {
    async fn generate(&self, _class: SizeClass, output: &Path) -> Result<ToolOutcome> {
        self.generated.fetch_add(1, Ordering::SeqCst);
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
        if self.fail_generation.load(Ordering::SeqCst) {
            // Mimic a tool that dies halfway through writing.
            tokio::fs::write(output, b"partial").await?;
            return Ok(ToolOutcome::failed("simulated failure"));
        }
        tokio::fs::write(output, MARKER).await?;
        Ok(ToolOutcome::ok())
    }

    async fn check(&self, path: &Path) -> Result<ToolOutcome> {
        self.checked.fetch_add(1, Ordering::SeqCst);
        Ok(match tokio::fs::read(path).await {
            Ok(bytes) if bytes.starts_with(MARKER) => ToolOutcome::ok(),
            Ok(_) => ToolOutcome::failed("unable to load DH parameters"),
            Err(e) => ToolOutcome::failed(e.to_string()),
        })
    }
}
