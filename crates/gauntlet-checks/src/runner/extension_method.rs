//! Does `DisableTransitiveFrameworkReferences` break extension method
//! resolution? A failed build is a valid outcome here.

use super::ScenarioRunner;
use crate::error::CheckResult;
use crate::packages::{RxPackageSet, OLD_RX_ID};
use crate::result::{ExtensionMethodConfig, ExtensionMethodRecord, TestDetails};
use crate::scenario::ExtensionMethodScenario;
use gauntlet_build::{check_for_ui_components, BuildEnvironment, ProjectEdits, Workspace};
use std::path::PathBuf;
use tracing::info;

/// Folder under the temp root that workspaces are created in
pub const WORKSPACE_PARENT: &str = "CheckDisableTransitiveFailingExtensionMethod";

/// Project file in the template folder
pub const TEMPLATE_PROJECT: &str = "ExtensionMethods.DisableTransitiveWorkaroundFail.csproj";

/// Builds each extension method scenario and records whether it compiled
pub struct ExtensionMethodRunner {
    env: BuildEnvironment,
    template_dir: PathBuf,
    packages: RxPackageSet,
    details: TestDetails,
}

impl ExtensionMethodRunner {
    /// Runner building from `template_dir`
    #[must_use]
    pub fn new(env: BuildEnvironment, template_dir: PathBuf, packages: RxPackageSet, details: TestDetails) -> Self {
        Self {
            env,
            template_dir,
            packages,
            details,
        }
    }
}

#[async_trait::async_trait]
impl ScenarioRunner for ExtensionMethodRunner {
    type Scenario = ExtensionMethodScenario;
    type Record = ExtensionMethodRecord;

    fn name(&self) -> &'static str {
        "extension-method"
    }

    async fn run_scenario(&mut self, scenario: &ExtensionMethodScenario) -> CheckResult<ExtensionMethodRecord> {
        // Only the main package replaces the template's reference
        let edits = ProjectEdits::new()
            .with_target_framework(scenario.tfm())
            .replace_package(OLD_RX_ID, vec![self.packages.main.clone()])
            .with_ui_frameworks(scenario.use_wpf, scenario.use_windows_forms)
            .with_disable_transitive_framework_references(scenario.emit_disable_transitive_framework_references);

        let workspace = Workspace::create(
            &self.env,
            &self.template_dir,
            WORKSPACE_PARENT,
            &edits,
            &self.packages.package_sources(),
        )?;
        let output = workspace.run_build(TEMPLATE_PROJECT).await?;
        let deployed = check_for_ui_components(&output.output_dir);
        info!(
            tfm = %scenario.tfm(),
            build_succeeded = output.succeeded(),
            wpf = deployed.wpf,
            windows_forms = deployed.windows_forms,
            "workaround build finished"
        );
        workspace.close()?;

        Ok(ExtensionMethodRecord {
            details: self.details.clone(),
            config: ExtensionMethodConfig {
                scenario: scenario.clone(),
                rx_version: self.packages.clone(),
            },
            build_succeeded: output.succeeded(),
            deployed_wpf: deployed.wpf,
            deployed_windows_forms: deployed.windows_forms,
        })
    }
}
