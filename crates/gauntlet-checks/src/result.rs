//! Result records written to the output JSON array
//!
//! Each record echoes the configuration that produced it next to the
//! observed outcome. Field names are camelCase in the output.

use crate::packages::RxPackageSet;
use crate::reference::{DirectReference, ReferenceChoice, TfmList};
use crate::scenario::{BloatScenario, ExtensionMethodScenario, PlugInDescriptor, TransitiveScenario};
use gauntlet_build::{BuildOutput, PackageIdAndVersion, ProcessOutput, UiFrameworkComponents};
use serde::{Deserialize, Serialize};

/// Identifies the run a record belongs to
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TestDetails {
    /// Id shared by every record of one gauntlet run
    pub test_run_id: String,
    /// When the run started
    pub test_run_date_time: String,
}

// Deployment bloat

/// Echo of one bloat scenario
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BloatConfig {
    /// Project options that were varied
    #[serde(flatten)]
    pub scenario: BloatScenario,
    /// Candidate packages under test
    pub rx_version: RxPackageSet,
}

/// Outcome of one self-contained publish
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BloatRecord {
    /// Run the record belongs to
    #[serde(flatten)]
    pub details: TestDetails,
    /// Scenario that produced the record
    pub config: BloatConfig,
    /// `PresentationFramework.dll` was found in the output
    pub deployed_wpf: bool,
    /// `System.Windows.Forms.dll` was found in the output
    pub deployed_windows_forms: bool,
}

// Extension method workaround

/// Echo of one extension method scenario
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ExtensionMethodConfig {
    /// Project options that were varied
    #[serde(flatten)]
    pub scenario: ExtensionMethodScenario,
    /// Candidate packages under test
    pub rx_version: RxPackageSet,
}

/// Whether the workaround build compiled, and what it deployed
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ExtensionMethodRecord {
    /// Run the record belongs to
    #[serde(flatten)]
    pub details: TestDetails,
    /// Scenario that produced the record
    pub config: ExtensionMethodConfig,
    /// The build exited with code 0
    pub build_succeeded: bool,
    /// `PresentationFramework.dll` was found in the output
    pub deployed_wpf: bool,
    /// `System.Windows.Forms.dll` was found in the output
    pub deployed_windows_forms: bool,
}

// Transitive framework reference

/// Echo of one side (before or after) of a transitive scenario
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PartConfig {
    /// App references `System.Reactive` before the split
    pub direct_ref_to_old_rx: bool,
    /// App references the new main package
    pub direct_ref_to_new_rx_main: bool,
    /// App references the new legacy facade
    pub direct_ref_to_new_rx_legacy_facade: bool,
    /// App references the new UI packages
    pub direct_ref_to_new_rx_ui_packages: bool,
    /// A library brings in old Rx
    pub transitive_ref_to_old_rx: bool,
    /// A library brings in the new main package
    pub transitive_ref_to_new_rx_main: bool,
    /// A library brings in the new legacy facade
    pub transitive_ref_to_new_rx_legacy_facade: bool,
    /// A library brings in the new UI packages
    pub transitive_ref_to_new_rx_ui_packages: bool,
    /// A library exposes UI-specific Rx features
    pub transitive_ref_uses_rx_ui_features: bool,
    /// The workaround property was set
    pub disable_transitive_framework_references: bool,
    /// Target frameworks of the first referenced library
    #[serde(skip_serializing_if = "Option::is_none")]
    pub transitive_library_tfms: Option<TfmList>,
}

impl PartConfig {
    /// Summarize a dependency list.
    ///
    /// `has_legacy_facade` says whether the candidate ships a legacy facade,
    /// which libraries on the new family then reference too.
    #[must_use]
    pub fn from_references(
        references: &[ReferenceChoice],
        disable_transitive_framework_references: bool,
        has_legacy_facade: bool,
    ) -> Self {
        let mut config = Self {
            disable_transitive_framework_references,
            ..Self::default()
        };
        for reference in references {
            match reference {
                ReferenceChoice::Direct(DirectReference::Old) => config.direct_ref_to_old_rx = true,
                ReferenceChoice::Direct(DirectReference::New(new)) => {
                    config.direct_ref_to_new_rx_main |= new.legacy_inclusion.includes_main();
                    config.direct_ref_to_new_rx_legacy_facade |= new.legacy_inclusion.includes_legacy();
                    config.direct_ref_to_new_rx_ui_packages |= new.include_ui_packages;
                }
                ReferenceChoice::TransitiveViaLibrary(library) => {
                    if library.references_new_version {
                        config.transitive_ref_to_new_rx_main = true;
                        config.transitive_ref_to_new_rx_legacy_facade |= has_legacy_facade;
                        config.transitive_ref_to_new_rx_ui_packages |= library.library_exposes_ui_feature;
                    } else {
                        config.transitive_ref_to_old_rx = true;
                    }
                    config.transitive_ref_uses_rx_ui_features |= library.provides_ui_feature();
                    if config.transitive_library_tfms.is_none() {
                        config.transitive_library_tfms = Some(library.tfms.clone());
                    }
                }
            }
        }
        config
    }
}

/// Echo of a whole transitive scenario
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TransitiveConfig {
    /// Candidate packages under test
    pub rx_version: RxPackageSet,
    /// Target framework of the app
    pub app_tfm: String,
    /// App code calls non-UI Rx
    pub app_uses_rx_non_ui_directly: bool,
    /// App code calls UI-specific Rx
    pub app_uses_rx_ui_directly: bool,
    /// App calls the library's non-UI Rx API
    pub app_uses_rx_non_ui_via_library: bool,
    /// App calls the library's UI Rx API
    pub app_uses_rx_ui_via_library: bool,
    /// Dependencies before the upgrade
    pub before: PartConfig,
    /// Dependencies after the upgrade
    pub after: PartConfig,
}

impl TransitiveConfig {
    /// Echo `scenario` as tested against `packages`
    #[must_use]
    pub fn new(scenario: &TransitiveScenario, packages: &RxPackageSet) -> Self {
        let has_legacy = packages.legacy.is_some();
        Self {
            rx_version: packages.clone(),
            app_tfm: scenario.app_tfm.clone(),
            app_uses_rx_non_ui_directly: scenario.usage.app_uses_non_ui_directly,
            app_uses_rx_ui_directly: scenario.usage.app_uses_ui_directly,
            app_uses_rx_non_ui_via_library: scenario.usage.app_invokes_library_non_ui,
            app_uses_rx_ui_via_library: scenario.usage.app_invokes_library_ui,
            before: PartConfig::from_references(&scenario.before, false, has_legacy),
            after: PartConfig::from_references(
                &scenario.after,
                scenario.disable_transitive_framework_references_after,
                has_legacy,
            ),
        }
    }
}

/// What happened when a built app was launched
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AppExecution {
    /// The app ran to completion
    Exited(ProcessOutput),
    /// The app could not be started or its output was lost
    Failed(String),
}

impl AppExecution {
    /// Exit code of an app that ran to completion
    #[must_use]
    pub fn exit_code(&self) -> Option<i32> {
        match self {
            Self::Exited(output) => Some(output.exit_code),
            Self::Failed(_) => None,
        }
    }
}

/// Observed outcome of one app build
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PartResult {
    /// The build exited with code 0
    pub build_succeeded: bool,
    /// Exit code of the app, when it ran to completion
    #[serde(skip_serializing_if = "Option::is_none")]
    pub execution_exit_code: Option<i32>,
    /// Why the app produced no exit code although its build succeeded
    #[serde(skip_serializing_if = "Option::is_none")]
    pub execution_error: Option<String>,
    /// `PresentationFramework.dll` was found in the output
    pub deployed_wpf: bool,
    /// `System.Windows.Forms.dll` was found in the output
    pub deployed_windows_forms: bool,
    /// Build output, kept for failed builds
    #[serde(skip_serializing_if = "Option::is_none")]
    pub build_std_out: Option<String>,
    /// App stdout, kept for non-zero exits
    #[serde(skip_serializing_if = "Option::is_none")]
    pub execution_std_out: Option<String>,
    /// App stderr, kept for non-zero exits
    #[serde(skip_serializing_if = "Option::is_none")]
    pub execution_std_err: Option<String>,
}

impl PartResult {
    /// Map raw outputs to the recorded fields.
    ///
    /// Build output is kept only for failed builds, execution output only
    /// for non-zero exits.
    #[must_use]
    pub fn from_outputs(
        build: &BuildOutput,
        execution: Option<&AppExecution>,
        deployed: UiFrameworkComponents,
    ) -> Self {
        let failed_exit = match execution {
            Some(AppExecution::Exited(output)) if !output.success() => Some(output),
            _ => None,
        };
        let execution_error = match execution {
            Some(AppExecution::Failed(message)) => Some(message.clone()),
            _ => None,
        };
        Self {
            build_succeeded: build.succeeded(),
            execution_exit_code: execution.and_then(AppExecution::exit_code),
            execution_error,
            deployed_wpf: deployed.wpf,
            deployed_windows_forms: deployed.windows_forms,
            build_std_out: (!build.succeeded()).then(|| build.stdout.clone()),
            execution_std_out: failed_exit.map(|e| e.stdout.clone()),
            execution_std_err: failed_exit.map(|e| e.stderr.clone()),
        }
    }
}

/// Before and after outcome of one transitive scenario
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TransitiveRecord {
    /// Run the record belongs to
    #[serde(flatten)]
    pub details: TestDetails,
    /// Scenario that produced the record
    pub config: TransitiveConfig,
    /// Outcome before the upgrade
    pub results_before: PartResult,
    /// Outcome after the upgrade
    pub results_after: PartResult,
}

// Plug-in conflict

/// Rx packages one plug-in was built against
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PlugInRxVersion {
    /// The Rx package that defines the core types
    pub main_rx_package: Option<PackageIdAndVersion>,
    /// Every Rx package referenced
    pub all_packages: Vec<PackageIdAndVersion>,
}

/// Echo of one plug-in
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PlugInConfig {
    /// Target framework the plug-in was built for
    pub tfm: String,
    /// Rx packages the plug-in references
    pub rx_version: PlugInRxVersion,
}

impl From<&PlugInDescriptor> for PlugInConfig {
    fn from(descriptor: &PlugInDescriptor) -> Self {
        Self {
            tfm: descriptor.tfm.clone(),
            rx_version: PlugInRxVersion {
                main_rx_package: descriptor.main_package().cloned(),
                all_packages: descriptor.packages.clone(),
            },
        }
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PlugInTestConfig {
    /// Target framework of the host
    pub host_tfm: String,
    /// Plug-in loaded first
    #[serde(rename = "plugIn1")]
    pub plug_in1: PlugInConfig,
    /// Plug-in loaded second
    #[serde(rename = "plugIn2")]
    pub plug_in2: PlugInConfig,
    /// Candidate packages under test
    pub rx_version: RxPackageSet,
}

/// What the host learned about one loaded plug-in
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct PlugInReport {
    /// Where the plug-in assembly was loaded from
    pub plug_in_location: String,
    /// Full name of the Rx assembly the plug-in got
    pub rx_full_assembly_name: String,
    /// Where that Rx assembly was loaded from
    pub rx_location: String,
    /// Target framework that Rx assembly was built for
    pub rx_target_framework: String,
    /// Cancellation reaches `OperationCanceledException`
    pub flows_cancellation_token_to_operation_cancelled_exception: bool,
    /// Windows Forms schedulers are available
    pub supports_windows_forms: bool,
}

/// The host process's JSON report
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct HostOutput {
    /// Report for the first plug-in
    pub first_plug_in: PlugInReport,
    /// Report for the second plug-in
    pub second_plug_in: PlugInReport,
}

/// Side-by-side loading outcome
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PlugInRecord {
    /// Run the record belongs to
    #[serde(flatten)]
    pub details: TestDetails,
    /// Scenario that produced the record
    pub config: PlugInTestConfig,
    /// What the first plug-in saw
    #[serde(rename = "plugIn1")]
    pub plug_in1: PlugInReport,
    /// What the second plug-in saw
    #[serde(rename = "plugIn2")]
    pub plug_in2: PlugInReport,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::reference::{LegacyInclusion, TransitiveViaLibrary};
    use pretty_assertions::assert_eq;
    use std::path::PathBuf;

    fn build(exit_code: i32) -> BuildOutput {
        BuildOutput {
            exit_code,
            output_dir: PathBuf::from("bin/Release"),
            stdout: "build log".into(),
        }
    }

    #[test]
    fn failed_build_keeps_build_output_only() {
        let part = PartResult::from_outputs(&build(1), None, UiFrameworkComponents::default());
        assert!(!part.build_succeeded);
        assert_eq!(part.build_std_out.as_deref(), Some("build log"));
        assert_eq!(part.execution_exit_code, None);

        let json = serde_json::to_value(&part).unwrap();
        assert!(json.get("executionStdOut").is_none());
        assert_eq!(json["buildStdOut"], "build log");
    }

    #[test]
    fn failed_execution_keeps_streams_apart() {
        let run = AppExecution::Exited(ProcessOutput {
            exit_code: 3,
            stdout: "out".into(),
            stderr: "err".into(),
        });
        let part = PartResult::from_outputs(&build(0), Some(&run), UiFrameworkComponents { wpf: true, windows_forms: false });
        assert_eq!(part.execution_exit_code, Some(3));
        assert_eq!(part.execution_std_out.as_deref(), Some("out"));
        assert_eq!(part.execution_std_err.as_deref(), Some("err"));
        assert!(part.build_std_out.is_none());
        assert!(part.deployed_wpf);
    }

    #[test]
    fn successful_execution_drops_streams() {
        let run = AppExecution::Exited(ProcessOutput::default());
        let part = PartResult::from_outputs(&build(0), Some(&run), UiFrameworkComponents::default());
        assert_eq!(part.execution_exit_code, Some(0));
        assert!(part.execution_std_out.is_none() && part.execution_std_err.is_none());
        assert!(part.execution_error.is_none());
    }

    #[test]
    fn launch_failure_is_recorded_without_exit_code() {
        let run = AppExecution::Failed("Did not get output from program Transitive.App.exe".into());
        let part = PartResult::from_outputs(&build(0), Some(&run), UiFrameworkComponents::default());
        assert!(part.build_succeeded);
        assert_eq!(part.execution_exit_code, None);

        let json = serde_json::to_value(&part).unwrap();
        assert_eq!(json["executionError"], "Did not get output from program Transitive.App.exe");
        assert!(json.get("executionExitCode").is_none());
    }

    #[test]
    fn part_config_summarizes_references() {
        let library = TransitiveViaLibrary::new(TfmList::parse("net8.0;net8.0-windows10.0.19041"), true, true);
        let refs = vec![
            ReferenceChoice::new_direct(LegacyInclusion::JustLegacy, true),
            ReferenceChoice::TransitiveViaLibrary(library),
        ];
        let config = PartConfig::from_references(&refs, true, true);
        assert!(!config.direct_ref_to_new_rx_main);
        assert!(config.direct_ref_to_new_rx_legacy_facade);
        assert!(config.direct_ref_to_new_rx_ui_packages);
        assert!(config.transitive_ref_to_new_rx_main);
        assert!(config.transitive_ref_to_new_rx_legacy_facade);
        assert!(config.transitive_ref_uses_rx_ui_features);
        assert!(!config.transitive_ref_to_old_rx);
        assert!(config.disable_transitive_framework_references);

        let json = serde_json::to_value(&config).unwrap();
        assert_eq!(json["transitiveLibraryTfms"], "net8.0;net8.0-windows10.0.19041");
    }

    #[test]
    fn host_output_parses_pascal_case() {
        let report = r#"{
            "PlugInLocation": "a.dll",
            "RxFullAssemblyName": "System.Reactive, Version=6.0.0.0",
            "RxLocation": "b.dll",
            "RxTargetFramework": ".NETFramework,Version=v4.7.2",
            "FlowsCancellationTokenToOperationCancelledException": true,
            "SupportsWindowsForms": false
        }"#;
        let text = format!(r#"{{"FirstPlugIn": {report}, "SecondPlugIn": {report}}}"#);
        let output: HostOutput = serde_json::from_str(&text).unwrap();
        assert!(output.first_plug_in.flows_cancellation_token_to_operation_cancelled_exception);
        assert_eq!(output.second_plug_in.rx_location, "b.dll");
    }
}
