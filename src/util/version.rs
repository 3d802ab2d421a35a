//! Four-part format versions (`major.minor.build.revision`).
//!
//! Persisted documents carry the format version of the toolset that wrote
//! them. Versions compare field by field, so `PartialOrd` gives the usual
//! ordering, but loaders only accept an exact match.

use std::cmp::Ordering;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// A `major.minor.build.revision` version.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(try_from = "String", into = "String")]
pub struct FormatVersion {
    pub major: u32,
    pub minor: u32,
    pub build: u32,
    pub revision: u32,
}

/// Error parsing a version string.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("`{0}` is not a version of the form major.minor.build.revision")]
pub struct VersionParseError(pub String);

impl FormatVersion {
    /// The version written by this toolset.
    pub const CURRENT: FormatVersion = FormatVersion::new(4, 0, 0, 0);

    pub const fn new(major: u32, minor: u32, build: u32, revision: u32) -> Self {
        FormatVersion {
            major,
            minor,
            build,
            revision,
        }
    }

    /// Whether a document of this version can be read without suppressing
    /// the version check.
    ///
    /// Older and newer versions are both rejected.
    pub fn is_compatible(&self) -> bool {
        matches!(self.partial_cmp(&Self::CURRENT), Some(Ordering::Equal))
    }
}

impl fmt::Display for FormatVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}.{}.{}.{}",
            self.major, self.minor, self.build, self.revision
        )
    }
}

impl FromStr for FormatVersion {
    type Err = VersionParseError;

    /// Parses exactly four dot-separated non-negative integers.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let err = || VersionParseError(s.to_string());
        let parts: Vec<&str> = s.trim().split('.').collect();
        if parts.len() != 4 {
            return Err(err());
        }

        let mut fields = [0u32; 4];
        for (slot, part) in fields.iter_mut().zip(&parts) {
            if part.is_empty() || !part.bytes().all(|b| b.is_ascii_digit()) {
                return Err(err());
            }
            *slot = part.parse().map_err(|_| err())?;
        }

        Ok(FormatVersion::new(fields[0], fields[1], fields[2], fields[3]))
    }
}

impl TryFrom<String> for FormatVersion {
    type Error = VersionParseError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<FormatVersion> for String {
    fn from(value: FormatVersion) -> Self {
        value.to_string()
    }
}
