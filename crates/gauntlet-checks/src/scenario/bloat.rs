//! Deployment bloat scenarios

use super::{target_framework, OPTIONAL_BOOLS};
use serde::Serialize;

/// Base .NET target frameworks
pub const BASE_NET_TFMS: [&str; 2] = ["net8.0", "net9.0"];

/// Windows versions appended to the base target framework
pub const WINDOWS_VERSIONS: [&str; 3] = [
    "windows10.0.18362.0",
    "windows10.0.19041.0",
    "windows10.0.22000.0",
];

/// One self-contained publish configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BloatScenario {
    /// .NET version part of the target framework
    pub base_net_tfm: String,
    /// Windows version part of the target framework
    pub windows_version: String,
    pub use_wpf: Option<bool>,
    pub use_windows_forms: Option<bool>,
    /// Set `DisableTransitiveFrameworkReferences`
    pub emit_disable_transitive_framework_references: bool,
}

impl BloatScenario {
    /// Full target framework moniker
    #[must_use]
    pub fn tfm(&self) -> String {
        target_framework(&self.base_net_tfm, Some(&self.windows_version))
    }
}

/// Every combination of TFM, Windows version, UI flags and workaround
#[must_use]
pub fn generate() -> Vec<BloatScenario> {
    let mut scenarios = Vec::new();
    for base in BASE_NET_TFMS {
        for windows_version in WINDOWS_VERSIONS {
            for use_wpf in OPTIONAL_BOOLS {
                for use_windows_forms in OPTIONAL_BOOLS {
                    for emit in [true, false] {
                        scenarios.push(BloatScenario {
                            base_net_tfm: base.to_string(),
                            windows_version: windows_version.to_string(),
                            use_wpf,
                            use_windows_forms,
                            emit_disable_transitive_framework_references: emit,
                        });
                    }
                }
            }
        }
    }
    scenarios
}
