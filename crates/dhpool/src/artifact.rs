//! # Artifact naming
//!
//! Artifacts live in a flat storage directory as
//! `<size-class>_<suffix>.key`. The file name is the artifact's identity; the
//! size class is recovered from its prefix. Generator, startup scan and
//! directory watcher all go through [`ArtifactName::parse`] so the
//! convention is recognized the same way everywhere.

use crate::Error;
use core::{fmt, str::FromStr};
use rand::{Rng, distr::Alphanumeric};

/// File extension shared by every artifact.
pub const ARTIFACT_EXTENSION: &str = "key";

/// Extension of the hidden file a generation writes before it is renamed
/// into place.
pub const STAGING_EXTENSION: &str = "partial";

/// Length of the random suffix in generated names.
pub const SUFFIX_LEN: usize = 8;

/// Filename presented to consumers on download, hiding the internal naming
/// scheme.
pub const PUBLIC_FILENAME: &str = "dhparams.key";

/// A parameter bit length, e.g. 2048 or 4096.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(transparent))]
pub struct SizeClass(u32);

impl SizeClass {
    pub const fn new(bits: u32) -> Self {
        Self(bits)
    }

    pub const fn bits(self) -> u32 {
        self.0
    }
}

impl fmt::Display for SizeClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Parses the canonical decimal form only: signs, whitespace, leading zeros
/// and empty input are rejected, so `02048` never aliases `2048`.
impl FromStr for SizeClass {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let unrecognized = || Error::UnrecognizedClass {
            class: s.to_string(),
        };
        if !s.bytes().all(|b| b.is_ascii_digit()) || (s.len() > 1 && s.starts_with('0')) {
            return Err(unrecognized());
        }
        s.parse::<u32>().map(Self).map_err(|_| unrecognized())
    }
}

/// The on-disk file name of an artifact.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(transparent))]
pub struct ArtifactId(String);

impl ArtifactId {
    pub fn new(file_name: impl Into<String>) -> Self {
        Self(file_name.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ArtifactId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<std::path::Path> for ArtifactId {
    fn as_ref(&self) -> &std::path::Path {
        std::path::Path::new(&self.0)
    }
}

/// A file name that follows the artifact naming convention, split into its
/// size class and identity.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArtifactName {
    pub class: SizeClass,
    pub id: ArtifactId,
}

impl ArtifactName {
    /// Parses `<digits>_<suffix>.key`.
    ///
    /// Returns `None` for anything that is not an artifact candidate. Whether
    /// the size class is actually served is decided by the pool, not here.
    pub fn parse(file_name: &str) -> Option<Self> {
        let stem = file_name.strip_suffix(ARTIFACT_EXTENSION)?.strip_suffix('.')?;
        let (prefix, suffix) = stem.split_once('_')?;
        if prefix.is_empty() || suffix.is_empty() {
            return None;
        }
        let class = prefix.parse().ok()?;
        Some(Self {
            class,
            id: ArtifactId::new(file_name),
        })
    }

    /// Parses the staging form `.<name>.partial` of an artifact name.
    pub fn parse_staging(file_name: &str) -> Option<Self> {
        let name = file_name
            .strip_prefix('.')?
            .strip_suffix(STAGING_EXTENSION)?
            .strip_suffix('.')?;
        Self::parse(name)
    }

    /// Hidden file name the artifact is written under until it is complete.
    /// It never parses as an artifact, so watchers ignore it.
    pub fn staging_name(&self) -> String {
        format!(".{}.{STAGING_EXTENSION}", self.id)
    }

    /// Draws a fresh name with a random alphanumeric suffix.
    ///
    /// The name is not checked against the filesystem; see
    /// [`Generator::fresh_name`](crate::Generator::fresh_name).
    pub fn random(class: SizeClass) -> Self {
        let suffix: String = rand::rng()
            .sample_iter(&Alphanumeric)
            .take(SUFFIX_LEN)
            .map(char::from)
            .collect();
        Self {
            class,
            id: ArtifactId::new(format!("{class}_{suffix}.{ARTIFACT_EXTENSION}")),
        }
    }
}
