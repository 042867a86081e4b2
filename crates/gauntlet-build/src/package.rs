//! Package identities and package feeds

use serde::Serialize;
use std::fmt;
use std::str::FromStr;

/// A NuGet package id paired with a version
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct PackageIdAndVersion {
    /// Package id, e.g. `System.Reactive`
    pub id: String,
    /// Version string, e.g. `6.0.1`
    pub version: String,
}

impl PackageIdAndVersion {
    /// Create from id and version
    #[inline]
    #[must_use]
    pub fn new(id: impl Into<String>, version: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            version: version.into(),
        }
    }
}

impl fmt::Display for PackageIdAndVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{},{}", self.id, self.version)
    }
}

/// Malformed `id,version` text
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("Invalid package specification: {0}. Must be <PackageId>,<Version>")]
pub struct ParsePackageError(pub String);

impl FromStr for PackageIdAndVersion {
    type Err = ParsePackageError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let mut parts = s.split(',');
        match (parts.next(), parts.next(), parts.next()) {
            (Some(id), Some(version), None)
                if !id.trim().is_empty() && !version.trim().is_empty() =>
            {
                Ok(Self::new(id.trim(), version.trim()))
            }
            _ => Err(ParsePackageError(s.to_string())),
        }
    }
}

/// A named package feed written into a workspace's `NuGet.config`
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub struct PackageSource {
    /// Key used in the `<add>` element
    pub name: String,
    /// Feed URL or local folder path
    pub location: String,
}

impl PackageSource {
    /// Create a named package source
    #[inline]
    #[must_use]
    pub fn new(name: impl Into<String>, location: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            location: location.into(),
        }
    }

    /// Source supplied on the command line
    #[inline]
    #[must_use]
    pub fn custom(location: impl Into<String>) -> Self {
        Self::new("loc", location)
    }
}
