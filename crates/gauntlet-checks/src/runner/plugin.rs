//! Plug-in conflict: two plug-ins built for different target frameworks are
//! loaded side by side into one host, which reports the Rx assembly each one
//! bound to.

use super::ScenarioRunner;
use crate::catalog::PackageCatalog;
use crate::error::{CheckError, CheckResult};
use crate::framework::FrameworkReducer;
use crate::packages::{RxPackageSet, OLD_RX_ID};
use crate::result::{HostOutput, PlugInConfig, PlugInRecord, PlugInTestConfig, TestDetails};
use crate::scenario::plugin::{self, PlugInDescriptor, PlugInScenario};
use gauntlet_build::{BuildEnvironment, Invocation, ProjectEdits, Workspace};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use tracing::{info, warn};

/// Folder under the temp root that plug-in workspaces are created in
pub const WORKSPACE_PARENT: &str = "PlugInHost";

/// Template folder name under the plug-ins root
pub const PLUG_IN_TEMPLATE: &str = "PlugIn";

const PLUG_IN_PROJECT: &str = "PlugIn.csproj";

/// Target framework used when restoring the candidate into the package cache
const RESTORE_TFM: &str = "net8.0";

/// `PlugIn.{tfm}.Rx{first two version digits}`.
///
/// The .NET Framework host loads only the first assembly with a given name,
/// so every framework and Rx version pair needs its own.
#[must_use]
pub fn plug_in_assembly_name(descriptor: &PlugInDescriptor) -> String {
    let digits: String = descriptor
        .main_package()
        .map(|p| p.version.chars().filter(|c| *c != '.').take(2).collect())
        .unwrap_or_default();
    format!("PlugIn.{}.Rx{digits}", descriptor.tfm)
}

/// A built host executable
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlugInHost {
    /// Host executable
    pub executable: PathBuf,
    /// Folder the host runs in
    pub folder: PathBuf,
}

impl PlugInHost {
    /// Launcher project for `host_tfm`: `PlugIn.HostDotnet` for .NET, `PlugIn.HostNetFx` for .NET Framework
    pub fn launcher(host_tfm: &str) -> CheckResult<&'static str> {
        if !host_tfm.starts_with("net") {
            return Err(CheckError::orchestration(format!("Unsupported host runtime TFM: {host_tfm}")));
        }
        Ok(if host_tfm.contains('.') {
            "PlugIn.HostDotnet"
        } else {
            "PlugIn.HostNetFx"
        })
    }

    /// Find the prebuilt host under `{plugins_root}/{launcher}/bin/Release/{host_tfm}/`
    pub fn locate(plugins_root: &Path, host_tfm: &str) -> CheckResult<Self> {
        let launcher = Self::launcher(host_tfm)?;
        if !plugins_root.is_dir() {
            return Err(CheckError::orchestration(format!(
                "PlugIns folder not found: {}",
                plugins_root.display()
            )));
        }
        let project_folder = plugins_root.join(launcher);
        if !project_folder.is_dir() {
            return Err(CheckError::orchestration(format!(
                "PlugIn host project folder not found at {}",
                project_folder.display()
            )));
        }
        let folder = project_folder.join("bin").join("Release").join(host_tfm);
        if !folder.is_dir() {
            return Err(CheckError::orchestration(format!(
                "PlugIn host build output folder not found at {}",
                folder.display()
            )));
        }
        let executable = folder.join(format!("{launcher}.exe"));
        if !executable.is_file() {
            return Err(CheckError::orchestration(format!(
                "PlugIn host executable not found at {}",
                executable.display()
            )));
        }
        Ok(Self { executable, folder })
    }
}

struct BuiltPlugIn {
    workspace: Workspace,
    assembly_name: String,
}

/// Builds each distinct plug-in once and keeps its output until closed
pub struct PlugInBuilder {
    env: BuildEnvironment,
    template_dir: PathBuf,
    built: HashMap<PlugInDescriptor, BuiltPlugIn>,
}

impl PlugInBuilder {
    /// Builder for plug-ins from `template_dir`
    #[must_use]
    pub fn new(env: BuildEnvironment, template_dir: PathBuf) -> Self {
        Self {
            env,
            template_dir,
            built: HashMap::new(),
        }
    }

    /// Path of the plug-in assembly, building it on first request
    pub async fn dll_path(&mut self, descriptor: &PlugInDescriptor) -> CheckResult<PathBuf> {
        if !self.built.contains_key(descriptor) {
            let built = self.build(descriptor).await?;
            self.built.insert(descriptor.clone(), built);
        }
        let built = self
            .built
            .get(descriptor)
            .ok_or_else(|| CheckError::orchestration("plug-in build was not recorded"))?;
        Ok(built
            .workspace
            .output_dir()
            .join(&descriptor.tfm)
            .join(format!("{}.dll", built.assembly_name)))
    }

    /// Number of distinct plug-ins built
    #[must_use]
    pub fn built_count(&self) -> usize {
        self.built.len()
    }

    async fn build(&self, descriptor: &PlugInDescriptor) -> CheckResult<BuiltPlugIn> {
        let assembly_name = plug_in_assembly_name(descriptor);
        info!(%assembly_name, tfm = %descriptor.tfm, "building plug-in");
        let edits = ProjectEdits::new()
            .with_target_framework(&descriptor.tfm)
            .with_assembly_name(&assembly_name)
            .replace_package(OLD_RX_ID, descriptor.packages.clone())
            .with_project_references_from(&self.template_dir);
        let sources: Vec<_> = descriptor
            .package_source
            .iter()
            .map(gauntlet_build::PackageSource::custom)
            .collect();
        let workspace = Workspace::create(&self.env, &self.template_dir, WORKSPACE_PARENT, &edits, &sources)?;
        let output = workspace.run_build(PLUG_IN_PROJECT).await?;
        if !output.succeeded() {
            warn!(%assembly_name, exit_code = output.exit_code, "plug-in build failed");
        }
        Ok(BuiltPlugIn {
            workspace,
            assembly_name,
        })
    }

    /// Delete every plug-in workspace
    pub fn close(self) -> CheckResult<()> {
        for (_, built) in self.built {
            built.workspace.close()?;
        }
        Ok(())
    }
}

/// Runs plug-in pairs in prebuilt hosts
pub struct PlugInConflictRunner {
    plug_ins: PlugInBuilder,
    plugins_root: PathBuf,
    packages: RxPackageSet,
    details: TestDetails,
}

impl PlugInConflictRunner {
    /// `plugins_root` holds the plug-in template and the built hosts
    #[must_use]
    pub fn new(env: BuildEnvironment, plugins_root: PathBuf, packages: RxPackageSet, details: TestDetails) -> Self {
        let template_dir = plugins_root.join(PLUG_IN_TEMPLATE);
        Self {
            plug_ins: PlugInBuilder::new(env, template_dir),
            plugins_root,
            packages,
            details,
        }
    }

    /// Restore the candidate so its extracted package lands in the global
    /// packages folder that the catalog reads.
    pub async fn prime_package_cache(&self) -> CheckResult<()> {
        let edits = ProjectEdits::new()
            .with_target_framework(RESTORE_TFM)
            .replace_package(OLD_RX_ID, self.packages.all_packages())
            .with_project_references_from(&self.plug_ins.template_dir);
        let workspace = Workspace::create(
            &self.plug_ins.env,
            &self.plug_ins.template_dir,
            WORKSPACE_PARENT,
            &edits,
            &self.packages.package_sources(),
        )?;
        let output = workspace.run_restore(PLUG_IN_PROJECT).await?;
        if !output.succeeded() {
            warn!(exit_code = output.exit_code, "restore of candidate packages failed");
        }
        workspace.close()?;
        Ok(())
    }

    /// Scenarios for the candidate, from the main package's lib targets
    pub async fn plan(
        &self,
        catalog: &dyn PackageCatalog,
        reducer: &dyn FrameworkReducer,
    ) -> CheckResult<Vec<PlugInScenario>> {
        self.prime_package_cache().await?;
        let lib_targets = catalog.lib_frameworks(&self.packages.main).await?;
        info!(
            package = %self.packages.main,
            targets = ?lib_targets.iter().map(|f| f.moniker()).collect::<Vec<_>>(),
            "package lib targets"
        );
        plugin::generate(&self.packages, &lib_targets, reducer)
    }

    /// Plug-in builder, for inspecting what was built
    #[must_use]
    pub fn plug_ins(&self) -> &PlugInBuilder {
        &self.plug_ins
    }

    /// Delete every plug-in workspace
    pub fn close(self) -> CheckResult<()> {
        self.plug_ins.close()
    }
}

#[async_trait::async_trait]
impl ScenarioRunner for PlugInConflictRunner {
    type Scenario = PlugInScenario;
    type Record = PlugInRecord;

    fn name(&self) -> &'static str {
        "plugin-conflict"
    }

    async fn run_scenario(&mut self, scenario: &PlugInScenario) -> CheckResult<PlugInRecord> {
        let host = PlugInHost::locate(&self.plugins_root, &scenario.host_tfm)?;
        let first = self.plug_ins.dll_path(&scenario.first).await?;
        let second = self.plug_ins.dll_path(&scenario.second).await?;

        let invocation = Invocation::new(&host.executable)
            .args([first.to_string_lossy().into_owned(), second.to_string_lossy().into_owned()])
            .in_dir(&host.folder);
        let output = self.plug_ins.env.toolchain().runner().run(&invocation).await?;
        if !output.success() {
            warn!(
                host = %host.executable.display(),
                exit_code = output.exit_code,
                args = ?invocation.args,
                "plug-in host exited with non-zero code"
            );
        }

        let report: HostOutput = serde_json::from_str(&output.stdout).map_err(|err| CheckError::HostOutput {
            message: err.to_string(),
            stdout: output.stdout.clone(),
        })?;

        Ok(PlugInRecord {
            details: self.details.clone(),
            config: PlugInTestConfig {
                host_tfm: scenario.host_tfm.clone(),
                plug_in1: PlugInConfig::from(&scenario.first),
                plug_in2: PlugInConfig::from(&scenario.second),
                rx_version: self.packages.clone(),
            },
            plug_in1: report.first_plug_in,
            plug_in2: report.second_plug_in,
        })
    }
}
