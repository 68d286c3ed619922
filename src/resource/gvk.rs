//! Type identifiers (group, version, kind) and wildcard matching.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::ConfigError;

/// The (group, version, kind) triple identifying a resource's schema.
///
/// Used both as an exact identifier and, in skip lists, as a pattern where
/// an empty component matches any value.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct GroupVersionKind {
    /// API group; empty for the core group.
    #[serde(default)]
    pub group: String,
    /// API version.
    #[serde(default)]
    pub version: String,
    /// Kind.
    #[serde(default)]
    pub kind: String,
}

impl GroupVersionKind {
    /// Creates a type identifier from its components.
    #[must_use]
    pub fn new(group: impl Into<String>, version: impl Into<String>, kind: impl Into<String>) -> Self {
        Self {
            group: group.into(),
            version: version.into(),
            kind: kind.into(),
        }
    }

    /// Builds a type identifier from an `apiVersion` string and a kind.
    #[must_use]
    pub fn from_api_version(api_version: &str, kind: &str) -> Self {
        let (group, version) = api_version
            .rsplit_once('/')
            .unwrap_or(("", api_version));
        Self::new(group, version, kind)
    }

    /// Returns the `apiVersion` string (`group/version`, or `version` for the core group).
    #[must_use]
    pub fn api_version(&self) -> String {
        if self.group.is_empty() {
            self.version.clone()
        } else {
            format!("{}/{}", self.group, self.version)
        }
    }

    /// Returns true if every component is empty.
    #[must_use]
    pub const fn is_zero(&self) -> bool {
        self.group.is_empty() && self.version.is_empty() && self.kind.is_empty()
    }

    /// Returns true if every component is set, except the group which may be empty.
    #[must_use]
    pub const fn is_complete(&self) -> bool {
        !self.version.is_empty() && !self.kind.is_empty()
    }

    /// Matches `gvk` against this pattern.
    ///
    /// An empty component in the pattern matches any value, so exact
    /// matching of the empty core group is not possible.
    #[must_use]
    pub fn matches(&self, gvk: &Self) -> bool {
        (self.group.is_empty() || self.group == gvk.group)
            && (self.version.is_empty() || self.version == gvk.version)
            && (self.kind.is_empty() || self.kind == gvk.kind)
    }
}

impl fmt::Display for GroupVersionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}, Kind={}", self.group, self.version, self.kind)
    }
}

impl FromStr for GroupVersionKind {
    type Err = ConfigError;

    /// Parses `group/version/kind`; any component may be left empty.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let parts: Vec<&str> = s.split('/').collect();
        let [group, version, kind] = parts.as_slice() else {
            return Err(ConfigError::InvalidGvk {
                value: s.to_string(),
            });
        };
        Ok(Self::new(*group, *version, *kind))
    }
}

/// Returns true if any pattern in `patterns` matches `gvk`.
#[must_use]
pub fn any_matches(patterns: &[GroupVersionKind], gvk: &GroupVersionKind) -> bool {
    patterns.iter().any(|p| p.matches(gvk))
}
