//! Platform version identifiers and the lenient runtime version-string parser.
//!
//! Runtimes report their version as free-form text such as
//! `"OpenCL 3.0 CUDA 12.2.140"`. [`parse_version_string`] extracts the first
//! `major.minor` pair from such text and degrades to [`VersionIdentifier::ZERO`]
//! when none can be found.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// A two-component `(major, minor)` version, ordered lexicographically.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default, Serialize, Deserialize,
)]
#[serde(try_from = "String", into = "String")]
pub struct VersionIdentifier {
    /// Major version.
    pub major: u16,
    /// Minor version.
    pub minor: u16,
}

impl VersionIdentifier {
    /// The degenerate version produced for unparseable strings.
    pub const ZERO: Self = Self::new(0, 0);

    /// Create a version identifier.
    #[must_use]
    pub const fn new(major: u16, minor: u16) -> Self {
        Self { major, minor }
    }

    /// Whether this version satisfies `minimum`.
    #[must_use]
    pub fn satisfies(&self, minimum: &Self) -> bool {
        self >= minimum
    }
}

impl fmt::Display for VersionIdentifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.major, self.minor)
    }
}

/// Error returned when a strict `major.minor` string cannot be parsed.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("invalid version '{input}': expected <major>.<minor>")]
pub struct ParseVersionError {
    input: String,
}

impl FromStr for VersionIdentifier {
    type Err = ParseVersionError;

    /// Strict parse of `"<major>.<minor>"`, used for user-supplied minimums.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let err = || ParseVersionError {
            input: s.to_string(),
        };
        let (major, minor) = s.trim().split_once('.').ok_or_else(err)?;
        let major = major.parse::<u16>().map_err(|_| err())?;
        let minor = minor.parse::<u16>().map_err(|_| err())?;
        Ok(Self::new(major, minor))
    }
}

impl TryFrom<String> for VersionIdentifier {
    type Error = ParseVersionError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<VersionIdentifier> for String {
    fn from(version: VersionIdentifier) -> Self {
        version.to_string()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ScanState {
    SkipPrefix,
    Major,
    SkipToDot,
    MinorWhitespace,
    Minor,
}

const fn is_space(byte: u8) -> bool {
    matches!(byte, b' ' | b'\t' | b'\n' | b'\r' | b'\x0b' | b'\x0c')
}

const fn digit(byte: u8) -> u32 {
    (byte - b'0') as u32
}

/// Extract a version from a runtime-supplied version string.
///
/// Never fails: malformed input yields [`VersionIdentifier::ZERO`].
#[must_use]
pub fn parse_version_string(input: &str) -> VersionIdentifier {
    parse_version_bytes(input.as_bytes())
}

/// Byte-level form of [`parse_version_string`]. Scanning stops at the first NUL.
#[must_use]
pub fn parse_version_bytes(bytes: &[u8]) -> VersionIdentifier {
    const LIMIT: u32 = u16::MAX as u32;

    let mut state = ScanState::SkipPrefix;
    let mut major: u32 = 0;
    let mut minor: u32 = 0;
    let mut i = 0;

    while i < bytes.len() {
        let byte = bytes[i];
        if byte == 0 {
            break;
        }

        match state {
            ScanState::SkipPrefix => {
                if byte.is_ascii_digit() {
                    major = digit(byte);
                    state = ScanState::Major;
                }
            }
            ScanState::Major => {
                if byte.is_ascii_digit() {
                    major = major * 10 + digit(byte);
                    if major > LIMIT {
                        // The run cannot be a major version; drop it entirely.
                        while i + 1 < bytes.len() && bytes[i + 1].is_ascii_digit() {
                            i += 1;
                        }
                        state = ScanState::SkipPrefix;
                    }
                } else if byte == b'.' {
                    state = ScanState::MinorWhitespace;
                } else if is_space(byte) {
                    state = ScanState::SkipToDot;
                } else {
                    state = ScanState::SkipPrefix;
                }
            }
            ScanState::SkipToDot => {
                if byte == b'.' {
                    state = ScanState::MinorWhitespace;
                } else if byte.is_ascii_digit() {
                    major = digit(byte);
                    state = ScanState::Major;
                } else if !is_space(byte) {
                    state = ScanState::SkipPrefix;
                }
            }
            ScanState::MinorWhitespace => {
                if byte.is_ascii_digit() {
                    minor = digit(byte);
                    state = ScanState::Minor;
                } else if !is_space(byte) {
                    state = ScanState::SkipPrefix;
                }
            }
            ScanState::Minor => {
                if !byte.is_ascii_digit() {
                    break;
                }
                minor = minor * 10 + digit(byte);
                if minor > LIMIT {
                    return VersionIdentifier::ZERO;
                }
            }
        }
        i += 1;
    }

    if state == ScanState::Minor {
        VersionIdentifier::new(major as u16, minor as u16)
    } else {
        VersionIdentifier::ZERO
    }
}
