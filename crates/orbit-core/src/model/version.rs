// ── Manager software version ──

use std::fmt;
use std::str::FromStr;

use serde::{Serialize, Serializer};

/// `major.minor.patch`, ordered numerically.
///
/// Parsing tolerates the Manager's decorated strings (`20.12.1.1`,
/// `20.9.3-li`): trailing components and non-numeric suffixes are ignored.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ManagerVersion {
    pub major: u32,
    pub minor: u32,
    pub patch: u32,
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("invalid Manager version: {0:?}")]
pub struct VersionParseError(pub String);

impl ManagerVersion {
    pub const fn new(major: u32, minor: u32, patch: u32) -> Self {
        Self {
            major,
            minor,
            patch,
        }
    }
}

fn leading_number(part: &str) -> Option<u32> {
    let digits: String = part.chars().take_while(char::is_ascii_digit).collect();
    digits.parse().ok()
}

impl FromStr for ManagerVersion {
    type Err = VersionParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = || VersionParseError(s.to_owned());
        let mut parts = s.trim().split('.');

        let major = parts.next().and_then(leading_number).ok_or_else(invalid)?;
        let minor = match parts.next() {
            Some(p) => leading_number(p).ok_or_else(invalid)?,
            None => 0,
        };
        let patch = parts.next().and_then(leading_number).unwrap_or(0);

        Ok(Self::new(major, minor, patch))
    }
}

impl fmt::Display for ManagerVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}.{}", self.major, self.minor, self.patch)
    }
}

impl Serialize for ManagerVersion {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}
