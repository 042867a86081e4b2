//! Scenarios for the `DisableTransitiveFrameworkReferences` extension method
//! failure. Build failures are the expected outcome for some of them.

use super::{target_framework, OPTIONAL_BOOLS};
use serde::Serialize;

/// Base .NET target framework
pub const BASE_NET_TFM: &str = "net8.0";

/// Windows version of the OS-specific variant
pub const WINDOWS_VERSION: &str = "windows10.0.19041.0";

/// One build configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ExtensionMethodScenario {
    /// .NET version part of the target framework
    pub base_net_tfm: String,
    /// Windows version part, if the target is OS-specific
    #[serde(skip_serializing_if = "Option::is_none")]
    pub windows_version: Option<String>,
    pub use_wpf: Option<bool>,
    pub use_windows_forms: Option<bool>,
    /// Set `DisableTransitiveFrameworkReferences`
    pub emit_disable_transitive_framework_references: bool,
}

impl ExtensionMethodScenario {
    /// Full target framework moniker
    #[must_use]
    pub fn tfm(&self) -> String {
        target_framework(&self.base_net_tfm, self.windows_version.as_deref())
    }
}

/// UI flags only vary when there is a Windows-specific target
#[must_use]
pub fn generate() -> Vec<ExtensionMethodScenario> {
    let mut scenarios = Vec::new();
    for windows_version in [None, Some(WINDOWS_VERSION)] {
        let ui_choices: &[Option<bool>] = if windows_version.is_some() {
            &OPTIONAL_BOOLS
        } else {
            &[Some(false)]
        };
        for &use_wpf in ui_choices {
            for &use_windows_forms in ui_choices {
                for emit in [true, false] {
                    scenarios.push(ExtensionMethodScenario {
                        base_net_tfm: BASE_NET_TFM.to_string(),
                        windows_version: windows_version.map(str::to_string),
                        use_wpf,
                        use_windows_forms,
                        emit_disable_transitive_framework_references: emit,
                    });
                }
            }
        }
    }
    scenarios
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn twenty_scenarios() {
        let scenarios = generate();
        assert_eq!(scenarios.len(), 20);
        let plain: Vec<_> = scenarios.iter().filter(|s| s.windows_version.is_none()).collect();
        assert_eq!(plain.len(), 2);
        assert!(plain
            .iter()
            .all(|s| s.use_wpf == Some(false) && s.use_windows_forms == Some(false) && s.tfm() == "net8.0"));
    }
}
