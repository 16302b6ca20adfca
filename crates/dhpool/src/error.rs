//! Error types for the parameter pool.
//!
//! Every failure inside the pool degrades to a logged, locally contained
//! outcome. Only [`Error::UnrecognizedClass`] and [`Error::PoolEmpty`] are
//! meant to reach a consumer; the retrieval surface maps them to a client
//! error and a retryable "unavailable" response respectively.
//!
//! ## Error Cases
//! - `UnrecognizedClass`: a size class that is not served by this pool.
//! - `PoolEmpty`: the class is recognized but has nothing admitted right now.
//! - `GenerationFailed`: the external tool exited non-zero while generating.
//! - `ValidationFailed`: a candidate file did not pass the external check.
//! - `NameExhausted`: no collision-free file name was found.
//! - `Io`: filesystem or process-spawn failure.

use crate::SizeClass;
use std::path::PathBuf;

/// A result type defaulting to the pool [`enum@Error`].
pub type Result<T, E = Error> = core::result::Result<T, E>;

/// All errors the pool can produce.
#[derive(thiserror::Error, Debug)]
#[non_exhaustive]
pub enum Error {
    /// The requested size class is not one this pool serves.
    #[error("Invalid bits {class}")]
    UnrecognizedClass { class: String },

    /// The size class is served, but no artifact is admitted at the moment.
    #[error("No {class}-bit parameters available")]
    PoolEmpty { class: SizeClass },

    /// The external tool exited with a failure while generating.
    #[error("Could not generate {class}-bit parameters: {reason}")]
    GenerationFailed { class: SizeClass, reason: String },

    /// The external tool rejected a candidate file.
    #[error("Validation failed for {}", path.display())]
    ValidationFailed { path: PathBuf },

    /// Every drawn file name already existed on disk.
    #[error("No free {class}-bit file name after {attempts} attempts")]
    NameExhausted { class: SizeClass, attempts: usize },

    /// Filesystem or process-spawn failure.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl Error {
    /// Returns `true` when the caller may simply try again later.
    pub const fn is_retryable(&self) -> bool {
        matches!(self, Self::PoolEmpty { .. })
    }
}
