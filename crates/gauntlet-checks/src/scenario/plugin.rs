//! Plug-in target framework pairings
//!
//! For each host runtime, find the plug-in TFMs that make the package
//! resolver pick different `lib/` targets of the Rx package, keeping the
//! oldest TFM per selected target. Every ordered pair of distinct kept TFMs
//! is a scenario.

use crate::error::CheckResult;
use crate::framework::{Framework, FrameworkReducer};
use crate::packages::RxPackageSet;
use gauntlet_build::PackageIdAndVersion;
use indexmap::IndexMap;
use serde::Serialize;
use tracing::{debug, info};

/// Host runtimes the plug-ins are loaded into
pub const HOST_RUNTIMES: [&str; 4] = ["net462", "net472", "net481", "net8.0"];

/// OS suffix assumed for .NET hosts, a supported Windows 11 build
pub const DOTNET_HOST_PLATFORM: &str = "windows10.0.22631";

/// Every plug-in TFM considered
pub const CANDIDATE_TFMS: [&str; 26] = [
    "net11",
    "net20",
    "net35",
    "net40",
    "net403",
    "net45",
    "net451",
    "net452",
    "net46",
    "net462",
    "net47",
    "net472",
    "net48",
    "net481",
    "netcoreapp3.0",
    "netcoreapp3.1",
    "net5.0",
    "net6.0",
    "net7.0",
    "net8.0",
    "net9.0",
    "net5.0-windows10.0.19041",
    "net6.0-windows10.0.19041",
    "net7.0-windows10.0.19041",
    "net8.0-windows10.0.19041",
    "net9.0-windows10.0.19041",
];

/// A plug-in build: target framework plus the Rx packages it references
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PlugInDescriptor {
    /// Target framework to build for
    pub tfm: String,
    /// Rx packages to reference
    pub packages: Vec<PackageIdAndVersion>,
    /// Extra feed for those packages
    #[serde(skip_serializing_if = "Option::is_none")]
    pub package_source: Option<String>,
}

impl PlugInDescriptor {
    /// Main Rx package of the plug-in
    #[must_use]
    pub fn main_package(&self) -> Option<&PackageIdAndVersion> {
        self.packages.first()
    }
}

/// Two plug-ins loaded side by side into one host
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PlugInScenario {
    /// Target framework of the host
    pub host_tfm: String,
    /// Plug-in loaded first
    pub first: PlugInDescriptor,
    /// Plug-in loaded second
    pub second: PlugInDescriptor,
}

/// The moniker a host is treated as when resolving plug-in compatibility.
///
/// .NET Framework hosts are used as-is. .NET hosts gain the Windows 11
/// platform so that OS-specific plug-ins compare as compatible.
#[must_use]
pub fn effective_host_tfm(host_tfm: &str) -> String {
    if host_tfm.contains('.') {
        format!("{host_tfm}-{DOTNET_HOST_PLATFORM}")
    } else {
        host_tfm.to_string()
    }
}

/// Plug-in TFMs worth testing in `host_tfm`, one per distinct selected target.
///
/// Groups keep the order in which targets are first selected. Within a group
/// the oldest TFM wins, ties broken by moniker.
pub fn select_plug_in_tfms(
    host_tfm: &str,
    candidates: &[&str],
    lib_targets: &[Framework],
    reducer: &dyn FrameworkReducer,
) -> CheckResult<Vec<String>> {
    let host: Framework = effective_host_tfm(host_tfm).parse()?;

    let mut by_target: IndexMap<String, Vec<Framework>> = IndexMap::new();
    for candidate in candidates {
        let plug_in: Framework = candidate.parse()?;
        if reducer.get_nearest(&host, std::slice::from_ref(&plug_in)).is_none() {
            continue;
        }
        if let Some(selected) = reducer.get_nearest(&plug_in, lib_targets) {
            by_target
                .entry(selected.moniker().to_string())
                .or_default()
                .push(plug_in);
        }
    }

    debug!(host = host_tfm, groups = ?by_target.keys().collect::<Vec<_>>(), "plug-in TFMs by selected target");
    Ok(by_target
        .into_values()
        .filter_map(|group| {
            group
                .into_iter()
                .min_by(|a, b| a.version().cmp(&b.version()).then_with(|| a.moniker().cmp(b.moniker())))
                .map(|f| f.moniker().to_string())
        })
        .collect())
}

/// Ordered pairs of distinct TFMs
#[must_use]
pub fn ordered_pairs(tfms: &[String]) -> Vec<(String, String)> {
    let mut pairs = Vec::new();
    for first in tfms {
        for second in tfms {
            if first != second {
                pairs.push((first.clone(), second.clone()));
            }
        }
    }
    pairs
}

/// Every host and plug-in pairing for `packages`
pub fn generate(
    packages: &RxPackageSet,
    lib_targets: &[Framework],
    reducer: &dyn FrameworkReducer,
) -> CheckResult<Vec<PlugInScenario>> {
    let descriptor = |tfm: String| PlugInDescriptor {
        tfm,
        packages: packages.all_packages(),
        package_source: packages.source.clone(),
    };

    let mut scenarios = Vec::new();
    for host in HOST_RUNTIMES {
        let tfms = select_plug_in_tfms(host, &CANDIDATE_TFMS, lib_targets, reducer)?;
        info!(host, plug_in_tfms = ?tfms, "selected plug-in TFMs");
        for (first, second) in ordered_pairs(&tfms) {
            scenarios.push(PlugInScenario {
                host_tfm: host.to_string(),
                first: descriptor(first),
                second: descriptor(second),
            });
        }
    }
    Ok(scenarios)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::framework::NuGetStyleReducer;
    use pretty_assertions::assert_eq;

    fn targets(monikers: &[&str]) -> Vec<Framework> {
        monikers.iter().map(|m| m.parse().unwrap()).collect()
    }

    #[test]
    fn dotnet_hosts_get_windows_platform() {
        assert_eq!(effective_host_tfm("net8.0"), "net8.0-windows10.0.22631");
        assert_eq!(effective_host_tfm("net472"), "net472");
    }

    #[test]
    fn rx30_in_net472_host_pairs_net45_and_net46() {
        let lib = targets(&["net45", "net46", "netstandard1.0", "netstandard1.1", "netstandard1.3"]);
        let tfms = select_plug_in_tfms("net472", &CANDIDATE_TFMS, &lib, &NuGetStyleReducer).unwrap();
        assert_eq!(tfms, vec!["net45".to_string(), "net46".to_string()]);
        assert_eq!(
            ordered_pairs(&tfms),
            vec![
                ("net45".to_string(), "net46".to_string()),
                ("net46".to_string(), "net45".to_string())
            ]
        );
    }

    #[test]
    fn rx30_in_dotnet_host_has_no_pairs() {
        let lib = targets(&["net45", "net46", "netstandard1.0", "netstandard1.1", "netstandard1.3"]);
        let tfms = select_plug_in_tfms("net8.0", &CANDIDATE_TFMS, &lib, &NuGetStyleReducer).unwrap();
        assert_eq!(tfms, vec!["netcoreapp3.0".to_string()]);
        assert!(ordered_pairs(&tfms).is_empty());
    }

    #[test]
    fn oldest_candidate_represents_each_target() {
        let lib = targets(&["net472", "netstandard2.0", "net6.0", "net6.0-windows10.0.19041"]);
        let tfms = select_plug_in_tfms("net481", &CANDIDATE_TFMS, &lib, &NuGetStyleReducer).unwrap();
        assert_eq!(tfms, vec!["net462".to_string(), "net472".to_string()]);

        let tfms = select_plug_in_tfms("net8.0", &CANDIDATE_TFMS, &lib, &NuGetStyleReducer).unwrap();
        assert_eq!(
            tfms,
            vec![
                "netcoreapp3.0".to_string(),
                "net6.0".to_string(),
                "net6.0-windows10.0.19041".to_string()
            ]
        );
    }

    #[test]
    fn scenarios_carry_all_packages() {
        let packages = RxPackageSet::from_packages(
            vec![
                PackageIdAndVersion::new("System.Reactive", "6.0.1"),
                PackageIdAndVersion::new("System.Reactive.For.Wpf", "6.0.1"),
            ],
            None,
            Some("/feed".into()),
        )
        .unwrap();
        let lib = targets(&["net45", "net46"]);
        let scenarios = generate(&packages, &lib, &NuGetStyleReducer).unwrap();
        assert!(!scenarios.is_empty());
        assert!(scenarios.iter().all(|s| s.first.packages.len() == 2 && s.first.tfm != s.second.tfm));
        assert!(scenarios.iter().all(|s| s.first.package_source.as_deref() == Some("/feed")));
    }
}
