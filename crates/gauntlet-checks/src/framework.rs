//! Target framework monikers and nearest-framework selection
//!
//! Covers the monikers the plug-in check considers: .NET Framework
//! (`net11` to `net481`), .NET Standard, `netcoreapp` and `net5.0+` with an
//! optional OS suffix such as `-windows10.0.19041`.

use crate::error::CheckError;
use std::cmp::Ordering;
use std::fmt;
use std::str::FromStr;

/// Framework family
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum FrameworkFamily {
    /// .NET Framework, `netNNN`
    NetFramework,
    /// .NET Standard
    NetStandard,
    /// .NET Core and .NET 5+
    NetCoreApp,
}

/// Dotted version padded to four parts
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct FrameworkVersion([u32; 4]);

impl FrameworkVersion {
    /// Parse `a.b.c.d`, missing parts are zero
    fn parse_dotted(text: &str) -> Option<Self> {
        let mut parts = [0u32; 4];
        for (slot, part) in text.split('.').enumerate() {
            *parts.get_mut(slot)? = part.parse().ok()?;
        }
        Some(Self(parts))
    }

    /// .NET Framework digits: `462` is 4.6.2
    fn parse_digits(text: &str) -> Option<Self> {
        if !(2..=3).contains(&text.len()) {
            return None;
        }
        let mut parts = [0u32; 4];
        for (slot, c) in text.chars().enumerate() {
            parts[slot] = c.to_digit(10)?;
        }
        Some(Self(parts))
    }

    /// Major version
    #[must_use]
    pub fn major(self) -> u32 {
        self.0[0]
    }

    /// Version from its parts
    #[must_use]
    pub fn new(major: u32, minor: u32, patch: u32) -> Self {
        Self([major, minor, patch, 0])
    }
}

/// OS qualifier of a `net5.0+` moniker
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Platform {
    /// e.g. `windows`
    pub name: String,
    /// e.g. 10.0.19041
    pub version: FrameworkVersion,
}

/// A parsed target framework moniker
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Framework {
    moniker: String,
    family: FrameworkFamily,
    version: FrameworkVersion,
    platform: Option<Platform>,
}

/// Moniker not in the supported set
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unrecognized target framework '{0}'")]
pub struct ParseFrameworkError(pub String);

impl From<ParseFrameworkError> for CheckError {
    fn from(err: ParseFrameworkError) -> Self {
        CheckError::Catalog(err.to_string())
    }
}

impl FromStr for Framework {
    type Err = ParseFrameworkError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let moniker = s.trim().to_ascii_lowercase();
        let err = || ParseFrameworkError(s.to_string());

        let (core, platform) = match moniker.split_once('-') {
            Some((core, os)) => (core, Some(parse_platform(os).ok_or_else(err)?)),
            None => (moniker.as_str(), None),
        };

        let (family, version) = if let Some(v) = core.strip_prefix("netstandard") {
            (FrameworkFamily::NetStandard, FrameworkVersion::parse_dotted(v))
        } else if let Some(v) = core.strip_prefix("netcoreapp") {
            (FrameworkFamily::NetCoreApp, FrameworkVersion::parse_dotted(v))
        } else if let Some(v) = core.strip_prefix("net") {
            if v.contains('.') {
                let version = FrameworkVersion::parse_dotted(v).filter(|v| v.major() >= 5);
                (FrameworkFamily::NetCoreApp, version)
            } else {
                (FrameworkFamily::NetFramework, FrameworkVersion::parse_digits(v))
            }
        } else {
            return Err(err());
        };
        let version = version.ok_or_else(err)?;

        if platform.is_some() && !(family == FrameworkFamily::NetCoreApp && version.major() >= 5) {
            return Err(err());
        }

        Ok(Self {
            moniker,
            family,
            version,
            platform,
        })
    }
}

fn parse_platform(os: &str) -> Option<Platform> {
    let split = os.find(|c: char| c.is_ascii_digit()).unwrap_or(os.len());
    let (name, version) = os.split_at(split);
    if name.is_empty() || !name.chars().all(|c| c.is_ascii_alphabetic()) {
        return None;
    }
    let version = if version.is_empty() {
        FrameworkVersion::default()
    } else {
        FrameworkVersion::parse_dotted(version)?
    };
    Some(Platform {
        name: name.to_string(),
        version,
    })
}

impl fmt::Display for Framework {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.moniker)
    }
}

impl Framework {
    /// Lower-cased moniker, as used for `lib/` folder names
    #[must_use]
    pub fn moniker(&self) -> &str {
        &self.moniker
    }

    /// Framework family
    #[must_use]
    pub fn family(&self) -> FrameworkFamily {
        self.family
    }

    /// Framework version
    #[must_use]
    pub fn version(&self) -> FrameworkVersion {
        self.version
    }

    /// OS platform, for OS-specific targets
    #[must_use]
    pub fn platform(&self) -> Option<&Platform> {
        self.platform.as_ref()
    }

    /// Whether this is a .NET Framework moniker
    #[must_use]
    pub fn is_net_framework(&self) -> bool {
        self.family == FrameworkFamily::NetFramework
    }

    /// Whether a project targeting `self` can consume assets built for `candidate`
    #[must_use]
    pub fn can_consume(&self, candidate: &Framework) -> bool {
        use FrameworkFamily::{NetCoreApp, NetFramework, NetStandard};
        match (self.family, candidate.family) {
            (NetFramework, NetFramework) | (NetStandard, NetStandard) => candidate.version <= self.version,
            (NetFramework, NetStandard) => {
                net_framework_for_standard(candidate.version).is_some_and(|min| min <= self.version)
            }
            (NetCoreApp, NetStandard) => candidate.version <= standard_for_core(self.version),
            (NetCoreApp, NetCoreApp) => {
                candidate.version <= self.version
                    && match (&candidate.platform, &self.platform) {
                        (None, _) => true,
                        (Some(wanted), Some(have)) => wanted.name == have.name && wanted.version <= have.version,
                        (Some(_), None) => false,
                    }
            }
            _ => false,
        }
    }
}

/// Oldest .NET Framework implementing a .NET Standard version
fn net_framework_for_standard(standard: FrameworkVersion) -> Option<FrameworkVersion> {
    let [major, minor, ..] = standard.0;
    match (major, minor) {
        (1, 0 | 1) => Some(FrameworkVersion::new(4, 5, 0)),
        (1, 2) => Some(FrameworkVersion::new(4, 5, 1)),
        (1, 3) => Some(FrameworkVersion::new(4, 6, 0)),
        (1, 4..=6) | (2, 0) => Some(FrameworkVersion::new(4, 6, 1)),
        _ => None,
    }
}

/// Highest .NET Standard implemented by a .NET Core version
fn standard_for_core(core: FrameworkVersion) -> FrameworkVersion {
    match core.major() {
        0 | 1 => FrameworkVersion::new(1, 6, 0),
        2 => FrameworkVersion::new(2, 0, 0),
        _ => FrameworkVersion::new(2, 1, 0),
    }
}

/// Picks the asset group a consumer framework would use
pub trait FrameworkReducer: Send + Sync {
    /// Nearest compatible candidate for `consumer`, if any
    fn get_nearest<'a>(&self, consumer: &Framework, candidates: &'a [Framework]) -> Option<&'a Framework>;
}

/// Nearest-match rules in the style of the NuGet client.
///
/// Among compatible candidates, the consumer's own family wins, then the
/// highest version, then an OS-specific target over a portable one.
#[derive(Debug, Clone, Copy, Default)]
pub struct NuGetStyleReducer;

impl FrameworkReducer for NuGetStyleReducer {
    fn get_nearest<'a>(&self, consumer: &Framework, candidates: &'a [Framework]) -> Option<&'a Framework> {
        candidates
            .iter()
            .filter(|candidate| consumer.can_consume(candidate))
            .max_by(|a, b| preference(consumer, a, b))
    }
}

fn preference(consumer: &Framework, a: &Framework, b: &Framework) -> Ordering {
    let rank = |f: &Framework| {
        (
            f.family == consumer.family,
            f.version,
            f.platform.as_ref().map(|p| p.version),
        )
    };
    rank(a).cmp(&rank(b)).then_with(|| b.moniker.cmp(&a.moniker))
}
