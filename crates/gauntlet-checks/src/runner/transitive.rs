//! Transitive framework reference: does upgrading Rx change what an app
//! deploys or how it behaves?
//!
//! Each intermediate library is packed once into the runner's local feed.
//! The app is then built before and after the upgrade, each built app is
//! run, and both output trees are scanned.

use super::phase::{Phase, PhaseTracker};
use super::ScenarioRunner;
use crate::error::{CheckError, CheckResult};
use crate::packages::{RxPackageSet, OLD_RX_ID};
use crate::reference::{ReferenceChoice, TransitiveViaLibrary};
use crate::result::{AppExecution, PartResult, TestDetails, TransitiveConfig, TransitiveRecord};
use crate::scenario::TransitiveScenario;
use crate::symbols::{
    app_define_constants, library_define_constants, DEFINE_CONSTANTS_PROPERTY, WINDOWS_DEFINE_CONSTANTS_PROPERTY,
};
use chrono::{DateTime, Timelike, Utc};
use gauntlet_build::{
    check_for_ui_components, BuildEnvironment, BuildError, BuildOutput, BuiltComponent, ComponentBuilder,
    Invocation, PackageIdAndVersion, ProjectEdits,
};
use moka::future::Cache;
use std::collections::HashMap;
use std::future::Future;
use std::path::PathBuf;
use tracing::{debug, info, warn};

/// Folder under the temp root that app workspaces are created in
pub const WORKSPACE_PARENT: &str = "TransitiveFrameworkReference";

/// Project reference in the app template that resolved packages replace
pub const LIBRARY_PROJECT_FILE: &str = "Transitive.Lib.UsesRx.csproj";

/// Executable produced by the app template
pub const APP_EXECUTABLE: &str = "Transitive.App.exe";

const RUNTIME_IDENTIFIER: &str = "win-x64";

/// Packed library packages, keyed by the library they were built for
#[derive(Debug, Clone)]
pub struct LibraryPackageCache {
    inner: Cache<TransitiveViaLibrary, PackageIdAndVersion>,
}

impl Default for LibraryPackageCache {
    fn default() -> Self {
        Self::new(256)
    }
}

impl LibraryPackageCache {
    /// Cache holding up to `max_capacity` packages
    #[must_use]
    pub fn new(max_capacity: u64) -> Self {
        Self {
            inner: Cache::new(max_capacity),
        }
    }

    /// Package previously built for `library`
    pub async fn get(&self, library: &TransitiveViaLibrary) -> Option<PackageIdAndVersion> {
        self.inner.get(library).await
    }

    /// Cached package, or build it with `build` and remember the result.
    ///
    /// A failed build is not cached.
    pub async fn try_get_or_build<F, Fut>(
        &self,
        library: &TransitiveViaLibrary,
        build: F,
    ) -> CheckResult<PackageIdAndVersion>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = CheckResult<PackageIdAndVersion>>,
    {
        if let Some(cached) = self.get(library).await {
            return Ok(cached);
        }
        let package = build().await?;
        self.inner.insert(library.clone(), package.clone()).await;
        Ok(package)
    }
}

/// `Transitive.Lib.UsesRx.{Old|New}{.Ui|.NoUi}.{tfms}`
///
/// The UI part only appears when the library has a Windows target.
#[must_use]
pub fn library_assembly_name(library: &TransitiveViaLibrary) -> String {
    let version_part = if library.references_new_version { "New" } else { "Old" };
    let ui_part = match (library.tfms.has_windows_target(), library.library_exposes_ui_feature) {
        (true, true) => ".Ui",
        (true, false) => ".NoUi",
        (false, _) => "",
    };
    let tfms_part = library.tfms.joined().replace(';', ".");
    format!("Transitive.Lib.UsesRx.{version_part}{ui_part}.{tfms_part}")
}

/// `1.0.0-preview{yyyyddMMHHmmssff}` in UTC.
///
/// The global package cache never overwrites an id and version it has seen,
/// so every build needs a fresh version.
#[must_use]
pub fn library_package_version(now: DateTime<Utc>) -> String {
    let hundredths = now.nanosecond() % 1_000_000_000 / 10_000_000;
    format!("1.0.0-preview{}{hundredths:02}", now.format("%Y%d%m%H%M%S"))
}

/// Edits that turn the library template into `library`
#[must_use]
pub fn library_edits(
    library: &TransitiveViaLibrary,
    packages: &RxPackageSet,
    assembly_name: &str,
    version: &str,
) -> ProjectEdits {
    let constants = library_define_constants(library.library_exposes_ui_feature);
    let mut edits = ProjectEdits::new()
        .with_target_frameworks(library.tfms.joined())
        .with_property(WINDOWS_DEFINE_CONSTANTS_PROPERTY, constants.windows_targets_value())
        .with_assembly_name(assembly_name)
        .with_property_group(vec![("Version".to_string(), version.to_string())]);
    if library.references_new_version {
        edits = edits.replace_package(OLD_RX_ID, packages.library_packages(library));
    }
    edits
}

/// Edits that turn the app template into one side of `scenario`
#[must_use]
pub fn app_edits(scenario: &TransitiveScenario, references: Vec<PackageIdAndVersion>, is_after: bool) -> ProjectEdits {
    let constants = app_define_constants(&scenario.usage);
    ProjectEdits::new()
        .with_target_framework(&scenario.app_tfm)
        .with_property(DEFINE_CONSTANTS_PROPERTY, constants.all_targets_value())
        .with_property(WINDOWS_DEFINE_CONSTANTS_PROPERTY, constants.windows_targets_value())
        .replace_project_reference(LIBRARY_PROJECT_FILE, references)
        .with_disable_transitive_framework_references(
            is_after && scenario.disable_transitive_framework_references_after,
        )
}

/// Packs libraries, builds and runs apps, and records before and after
pub struct TransitiveReferenceRunner {
    builder: ComponentBuilder,
    app_project: PathBuf,
    library_project: PathBuf,
    packages: RxPackageSet,
    details: TestDetails,
    libraries: LibraryPackageCache,
}

impl TransitiveReferenceRunner {
    /// Create a runner with its own local feed
    pub fn new(
        env: BuildEnvironment,
        app_project: PathBuf,
        library_project: PathBuf,
        packages: RxPackageSet,
        details: TestDetails,
    ) -> CheckResult<Self> {
        let builder = ComponentBuilder::new(env, WORKSPACE_PARENT, packages.package_sources())?;
        Ok(Self {
            builder,
            app_project,
            library_project,
            packages,
            details,
            libraries: LibraryPackageCache::default(),
        })
    }

    /// Packages built so far, shared with callers that want to inspect them
    #[must_use]
    pub fn library_cache(&self) -> &LibraryPackageCache {
        &self.libraries
    }

    /// Delete the local feed
    pub fn close(self) -> CheckResult<()> {
        Ok(self.builder.close()?)
    }

    async fn ensure_library(&self, library: &TransitiveViaLibrary) -> CheckResult<PackageIdAndVersion> {
        self.libraries
            .try_get_or_build(library, || self.build_library(library))
            .await
    }

    async fn build_library(&self, library: &TransitiveViaLibrary) -> CheckResult<PackageIdAndVersion> {
        let assembly_name = library_assembly_name(library);
        let version = library_package_version(Utc::now());
        info!(%assembly_name, %version, "packing library");

        let edits = library_edits(library, &self.packages, &assembly_name, &version);
        let output = self.builder.build_local_package(&self.library_project, &edits).await?;
        if !output.succeeded() {
            return Err(CheckError::AuxiliaryPackageFailed {
                assembly_name,
                stdout: output.stdout,
            });
        }
        Ok(PackageIdAndVersion::new(assembly_name, version))
    }

    async fn build_app(
        &self,
        scenario: &TransitiveScenario,
        references: &[ReferenceChoice],
        built: &HashMap<TransitiveViaLibrary, PackageIdAndVersion>,
        is_after: bool,
    ) -> CheckResult<BuiltComponent> {
        let packages = self
            .packages
            .resolve_all(references, |library| built.get(library).cloned())?;
        debug!(is_after, ?packages, "building app");
        let edits = app_edits(scenario, packages, is_after);
        Ok(self.builder.build_app(&self.app_project, &edits).await?)
    }

    /// Launch a built app.
    ///
    /// An app that cannot be started or whose output is lost is part of the
    /// observed outcome, not a harness failure.
    async fn run_app(&self, scenario: &TransitiveScenario, output: &BuildOutput) -> CheckResult<AppExecution> {
        let exe = output
            .output_dir
            .join(&scenario.app_tfm)
            .join(RUNTIME_IDENTIFIER)
            .join(APP_EXECUTABLE);
        let invocation = Invocation::new(exe);
        match self.builder.environment().toolchain().runner().run(&invocation).await {
            Ok(result) => {
                if !result.success() {
                    warn!(exit_code = result.exit_code, "app exited with non-zero code");
                }
                Ok(AppExecution::Exited(result))
            }
            Err(err @ (BuildError::Spawn { .. } | BuildError::OutputNotDrained { .. })) => {
                warn!(error = %err, "app did not run to completion");
                Ok(AppExecution::Failed(err.to_string()))
            }
            Err(err) => Err(err.into()),
        }
    }
}

#[async_trait::async_trait]
impl ScenarioRunner for TransitiveReferenceRunner {
    type Scenario = TransitiveScenario;
    type Record = TransitiveRecord;

    fn name(&self) -> &'static str {
        "transitive-framework-reference"
    }

    async fn run_scenario(&mut self, scenario: &TransitiveScenario) -> CheckResult<TransitiveRecord> {
        let mut phase = PhaseTracker::new();

        let mut built = HashMap::new();
        for library in scenario.libraries() {
            if built.contains_key(library) {
                continue;
            }
            phase.advance(Phase::BuildingAuxiliaryPackages)?;
            let package = self.ensure_library(library).await?;
            built.insert(library.clone(), package);
        }

        phase.advance(Phase::BuildingBefore)?;
        let before = self.build_app(scenario, &scenario.before, &built, false).await?;
        let before_run = if before.output.succeeded() {
            phase.advance(Phase::RunningBefore)?;
            Some(self.run_app(scenario, &before.output).await?)
        } else {
            warn!("before build failed");
            None
        };

        phase.advance(Phase::BuildingAfter)?;
        let after = self.build_app(scenario, &scenario.after, &built, true).await?;
        let after_run = if after.output.succeeded() {
            phase.advance(Phase::RunningAfter)?;
            Some(self.run_app(scenario, &after.output).await?)
        } else {
            warn!("after build failed");
            None
        };

        phase.advance(Phase::Scanning)?;
        let results_before = PartResult::from_outputs(
            &before.output,
            before_run.as_ref(),
            check_for_ui_components(&before.output.output_dir),
        );
        let results_after = PartResult::from_outputs(
            &after.output,
            after_run.as_ref(),
            check_for_ui_components(&after.output.output_dir),
        );
        before.close()?;
        after.close()?;

        phase.advance(Phase::Aggregating)?;
        let record = TransitiveRecord {
            details: self.details.clone(),
            config: TransitiveConfig::new(scenario, &self.packages),
            results_before,
            results_after,
        };
        phase.advance(Phase::Done)?;
        Ok(record)
    }
}
