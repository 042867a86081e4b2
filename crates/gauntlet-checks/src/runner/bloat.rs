//! Deployment bloat: does a self-contained publish drag in WPF or Windows Forms?

use super::ScenarioRunner;
use crate::error::CheckResult;
use crate::packages::{RxPackageSet, OLD_RX_ID};
use crate::result::{BloatConfig, BloatRecord, TestDetails};
use crate::scenario::BloatScenario;
use gauntlet_build::{check_for_ui_components, BuildEnvironment, ProjectEdits, Workspace};
use std::path::PathBuf;
use tracing::{info, warn};

/// Folder under the temp root that bloat workspaces are created in
pub const WORKSPACE_PARENT: &str = "CheckIssue1745";

/// Template project published for every scenario
pub const TEMPLATE_PROJECT: &str = "Bloat.ConsoleWinRtTemplate.csproj";

/// Publishes each bloat scenario and scans what it deployed
pub struct BloatRunner {
    env: BuildEnvironment,
    template_dir: PathBuf,
    packages: RxPackageSet,
    details: TestDetails,
}

impl BloatRunner {
    /// `template_dir` holds [`TEMPLATE_PROJECT`]
    #[must_use]
    pub fn new(env: BuildEnvironment, template_dir: PathBuf, packages: RxPackageSet, details: TestDetails) -> Self {
        Self {
            env,
            template_dir,
            packages,
            details,
        }
    }

    fn edits(&self, scenario: &BloatScenario) -> ProjectEdits {
        ProjectEdits::new()
            .with_target_framework(scenario.tfm())
            .replace_package(OLD_RX_ID, self.packages.all_packages())
            .with_ui_frameworks(scenario.use_wpf, scenario.use_windows_forms)
            .with_disable_transitive_framework_references(scenario.emit_disable_transitive_framework_references)
    }
}

#[async_trait::async_trait]
impl ScenarioRunner for BloatRunner {
    type Scenario = BloatScenario;
    type Record = BloatRecord;

    fn name(&self) -> &'static str {
        "bloat"
    }

    async fn run_scenario(&mut self, scenario: &BloatScenario) -> CheckResult<BloatRecord> {
        let workspace = Workspace::create(
            &self.env,
            &self.template_dir,
            WORKSPACE_PARENT,
            &self.edits(scenario),
            &self.packages.package_sources(),
        )?;

        let output = workspace.run_publish(TEMPLATE_PROJECT).await?;
        if !output.succeeded() {
            warn!(tfm = %scenario.tfm(), exit_code = output.exit_code, "publish failed");
        }
        let deployed = check_for_ui_components(&output.output_dir);
        info!(wpf = deployed.wpf, windows_forms = deployed.windows_forms, "deployed UI frameworks");
        workspace.close()?;

        Ok(BloatRecord {
            details: self.details.clone(),
            config: BloatConfig {
                scenario: scenario.clone(),
                rx_version: self.packages.clone(),
            },
            deployed_wpf: deployed.wpf,
            deployed_windows_forms: deployed.windows_forms,
        })
    }
}
