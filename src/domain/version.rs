//! Comparable version identifiers.
//!
//! Channels either publish a monotonically increasing cursor or semantic
//! versions. The two schemes are never comparable with each other: every
//! comparison goes through [`VersionOrdinal::compare`], which returns
//! [`VersionError::Incomparable`] instead of guessing.

use std::cmp::Ordering;
use std::fmt;
use std::str::FromStr;

use semver::Version;

use super::error::VersionError;

/// A parsed update cursor or semantic version.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum VersionOrdinal {
    /// Monotonic cursor used by channels without semantic versions.
    Cursor(u64),
    /// Semantic version; build metadata is ignored for ordering.
    Semver(Version),
}

impl VersionOrdinal {
    /// Parse a version string.
    ///
    /// The integer cursor form is tried first, so a purely numeric string is
    /// always a cursor. Semver parsing is tolerant of a leading `v` and of a
    /// missing minor or patch component.
    pub fn parse(input: &str) -> Result<Self, VersionError> {
        let trimmed = input.trim();
        let invalid = || VersionError::InvalidFormat {
            input: input.to_string(),
        };

        if trimmed.is_empty() {
            return Err(invalid());
        }

        if let Ok(cursor) = trimmed.parse::<u64>() {
            return Ok(Self::Cursor(cursor));
        }

        let normalized = normalize_semver(trimmed).ok_or_else(invalid)?;
        Version::parse(&normalized)
            .map(Self::Semver)
            .map_err(|_| invalid())
    }

    /// True when both ordinals are of the same kind.
    #[must_use]
    pub fn is_comparable(&self, other: &Self) -> bool {
        matches!(
            (self, other),
            (Self::Cursor(_), Self::Cursor(_)) | (Self::Semver(_), Self::Semver(_))
        )
    }

    /// Compare two ordinals of the same kind.
    pub fn compare(&self, other: &Self) -> Result<Ordering, VersionError> {
        match (self, other) {
            (Self::Cursor(a), Self::Cursor(b)) => Ok(a.cmp(b)),
            (Self::Semver(a), Self::Semver(b)) => Ok(semver_precedence(a, b)),
            _ => Err(VersionError::Incomparable {
                left: self.describe(),
                right: other.describe(),
            }),
        }
    }

    /// True when `self` orders strictly before `other`.
    pub fn before(&self, other: &Self) -> Result<bool, VersionError> {
        Ok(self.compare(other)? == Ordering::Less)
    }

    /// True when `self` orders strictly after `other`.
    pub fn after(&self, other: &Self) -> Result<bool, VersionError> {
        Ok(self.compare(other)? == Ordering::Greater)
    }

    /// True when both ordinals have equal precedence.
    pub fn equals(&self, other: &Self) -> Result<bool, VersionError> {
        Ok(self.compare(other)? == Ordering::Equal)
    }

    /// The semantic version, if this is a semver ordinal.
    #[must_use]
    pub fn as_semver(&self) -> Option<&Version> {
        match self {
            Self::Semver(version) => Some(version),
            Self::Cursor(_) => None,
        }
    }

    fn describe(&self) -> String {
        match self {
            Self::Cursor(c) => format!("cursor {c}"),
            Self::Semver(v) => format!("semver {v}"),
        }
    }
}

impl FromStr for VersionOrdinal {
    type Err = VersionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl fmt::Display for VersionOrdinal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Cursor(c) => write!(f, "{c}"),
            Self::Semver(v) => write!(f, "{v}"),
        }
    }
}

/// Standard semver precedence: build metadata does not participate.
fn semver_precedence(a: &Version, b: &Version) -> Ordering {
    (a.major, a.minor, a.patch)
        .cmp(&(b.major, b.minor, b.patch))
        .then_with(|| a.pre.cmp(&b.pre))
}

/// Strip a leading `v` and pad `1` / `1.2` cores out to `major.minor.patch`.
fn normalize_semver(input: &str) -> Option<String> {
    let body = input
        .strip_prefix('v')
        .or_else(|| input.strip_prefix('V'))
        .unwrap_or(input);

    let split_at = body.find(['-', '+']).unwrap_or(body.len());
    let (core, suffix) = body.split_at(split_at);

    let parts: Vec<&str> = core.split('.').collect();
    if parts.is_empty() || parts.len() > 3 {
        return None;
    }
    if parts
        .iter()
        .any(|p| p.is_empty() || !p.bytes().all(|b| b.is_ascii_digit()))
    {
        return None;
    }

    let mut padded = parts.join(".");
    for _ in parts.len()..3 {
        padded.push_str(".0");
    }
    padded.push_str(suffix);
    Some(padded)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ord(s: &str) -> VersionOrdinal {
        VersionOrdinal::parse(s).unwrap()
    }

    #[test]
    fn numeric_strings_are_cursors() {
        assert_eq!(ord("100"), VersionOrdinal::Cursor(100));
        assert_eq!(ord(" 7 "), VersionOrdinal::Cursor(7));
    }

    #[test]
    fn cursor_ordering_is_numeric_not_lexical() {
        assert!(ord("9").before(&ord("10")).unwrap());
        assert!(ord("102").after(&ord("101")).unwrap());
        assert!(ord("5").equals(&ord("05")).unwrap());
    }

    #[test]
    fn tolerant_semver_forms() {
        assert_eq!(ord("v1.2.3"), ord("1.2.3"));
        assert_eq!(ord("1.2"), ord("1.2.0"));
        assert_eq!(ord("V2"), ord("2.0.0"));
        assert_eq!(ord("1.2-beta.1").to_string(), "1.2.0-beta.1");
    }

    #[test]
    fn prerelease_orders_before_release() {
        assert!(ord("1.0.0-alpha").before(&ord("1.0.0-alpha.1")).unwrap());
        assert!(ord("1.0.0-alpha.1").before(&ord("1.0.0-beta")).unwrap());
        assert!(ord("1.0.0-rc.1").before(&ord("1.0.0")).unwrap());
        assert!(ord("1.0.0").before(&ord("1.0.1")).unwrap());
    }

    #[test]
    fn build_metadata_is_ignored() {
        assert!(ord("1.0.0+build.1").equals(&ord("1.0.0+build.2")).unwrap());
    }

    #[test]
    fn cross_kind_comparison_fails() {
        let cursor = ord("100");
        let semver = ord("1.0.0");
        assert!(!cursor.is_comparable(&semver));
        assert!(matches!(
            cursor.before(&semver),
            Err(VersionError::Incomparable { .. })
        ));
        assert!(semver.after(&cursor).is_err());
        assert!(semver.equals(&cursor).is_err());
    }

    #[test]
    fn rejects_garbage() {
        for input in ["", "  ", "-1", "abc", "1.2.3.4", "1..2", "v"] {
            assert!(
                matches!(
                    VersionOrdinal::parse(input),
                    Err(VersionError::InvalidFormat { .. })
                ),
                "{input:?} should be rejected"
            );
        }
    }
}
