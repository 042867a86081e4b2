//! Fans every check out over every package selection as `gauntlet-check`
//! child processes.

use chrono::{DateTime, Utc};
use futures::stream::{self, StreamExt};
use gauntlet_build::{Invocation, PackageIdAndVersion, ProcessRunner};
use gauntlet_checks::error::{CheckError, CheckResult};
use gauntlet_checks::settings::{resolve_test_details, TIMESTAMP_FORMAT};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{error, info, warn};

/// One check: the `gauntlet-check` subcommand and the base name of its results file
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TestType {
    /// Human readable name
    pub name: &'static str,
    /// `gauntlet-check` subcommand
    pub check: &'static str,
    /// Results file name without extension
    pub output_base: &'static str,
}

/// Every check, in launch order
pub const TEST_TYPES: [TestType; 4] = [
    TestType {
        name: "Bloat (Issue 1745)",
        check: "bloat",
        output_base: "CheckIssue1745",
    },
    TestType {
        name: "Extension method fails with DisableTransitiveFrameworkReferences",
        check: "extension-method",
        output_base: "CheckDisableTransitiveFailingExtensionMethod",
    },
    TestType {
        name: "Plug-in gets wrong Rx (Issue 97)",
        check: "plugin-conflict",
        output_base: "CheckIssue97",
    },
    TestType {
        name: "Transitive references",
        check: "transitive-framework-reference",
        output_base: "CheckTransitiveFrameworkReference",
    },
];

/// Rx packages to test in one pass over every check
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PackageSelection {
    /// Main package
    pub main: PackageIdAndVersion,
    /// UI-framework companion packages
    pub ui: Vec<PackageIdAndVersion>,
    /// Legacy facade package
    pub legacy: Option<PackageIdAndVersion>,
    /// Feed holding unpublished packages
    pub package_source: Option<String>,
}

impl PackageSelection {
    /// A published package on its own
    #[must_use]
    pub fn published(id: &str, version: &str) -> Self {
        Self {
            main: PackageIdAndVersion::new(id, version),
            ui: Vec::new(),
            legacy: None,
            package_source: None,
        }
    }

    /// `--rx-package` values in order, main package first
    #[must_use]
    pub fn rx_package_args(&self) -> Vec<String> {
        std::iter::once(&self.main)
            .chain(&self.ui)
            .map(ToString::to_string)
            .collect()
    }
}

/// Every stable Rx release line worth comparing against
#[must_use]
pub fn published_rx() -> Vec<PackageSelection> {
    [
        ("System.Reactive.Linq", "3.0.0"),
        ("System.Reactive.Linq", "3.1.0"),
        ("System.Reactive", "4.4.1"),
        ("System.Reactive", "5.0.0"),
        ("System.Reactive", "6.0.1"),
    ]
    .into_iter()
    .map(|(id, version)| PackageSelection::published(id, version))
    .collect()
}

/// Id and timestamp shared by every child of one gauntlet run
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunIdentity {
    /// `--test-run-id` passed to every child
    pub test_run_id: String,
    /// `--test-timestamp` passed to every child
    pub timestamp: String,
}

impl RunIdentity {
    /// Use `test_id` when given, otherwise generate one from `now`
    pub fn new(test_id: Option<String>, now: DateTime<Utc>) -> CheckResult<Self> {
        let timestamp = now.format(TIMESTAMP_FORMAT).to_string();
        let details = resolve_test_details(test_id, Some(&timestamp), now)?;
        Ok(Self {
            test_run_id: details.test_run_id,
            timestamp,
        })
    }
}

/// A planned child process
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Launch {
    /// Check being run
    pub test_type: TestType,
    /// Results file the child writes
    pub output: PathBuf,
    /// Command line of the child
    pub invocation: Invocation,
}

/// How a launch ended
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LaunchOutcome {
    /// Child ran to completion with this exit code
    Exited(i32),
    /// Child could not be started or drained
    Failed(String),
}

impl LaunchOutcome {
    /// The child exited with code 0
    #[must_use]
    pub fn succeeded(&self) -> bool {
        matches!(self, Self::Exited(0))
    }
}

/// Outcome of every launch in a run
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct GauntletSummary {
    /// Launch and how it ended, in completion order
    pub outcomes: Vec<(Launch, LaunchOutcome)>,
}

impl GauntletSummary {
    /// Launches that did not exit with code 0
    #[must_use]
    pub fn failures(&self) -> usize {
        self.outcomes.iter().filter(|(_, o)| !o.succeeded()).count()
    }

    /// Every launch succeeded
    #[must_use]
    pub fn succeeded(&self) -> bool {
        self.failures() == 0
    }
}

/// `{dir}/{base}-{mainId}-{mainVersion}.json`
#[must_use]
pub fn output_path(dir: &Path, test_type: &TestType, selection: &PackageSelection) -> PathBuf {
    dir.join(format!(
        "{}-{}-{}.json",
        test_type.output_base, selection.main.id, selection.main.version
    ))
}

/// Create `dir`, refusing to reuse the folder of an earlier run
pub fn prepare_output_dir(dir: &Path) -> CheckResult<()> {
    if dir.exists() {
        return Err(CheckError::orchestration(format!(
            "Output folder {} already exists. Each test run should create a new output folder.",
            dir.display()
        )));
    }
    fs::create_dir_all(dir)?;
    Ok(())
}

/// Launches checks for a run
pub struct Coordinator {
    runner: Arc<dyn ProcessRunner>,
    check_executable: PathBuf,
    output_dir: PathBuf,
    identity: RunIdentity,
    max_parallel: usize,
}

impl Coordinator {
    /// Results land in `output_dir`, which must not exist yet
    #[must_use]
    pub fn new(
        runner: Arc<dyn ProcessRunner>,
        check_executable: PathBuf,
        output_dir: PathBuf,
        identity: RunIdentity,
    ) -> Self {
        Self {
            runner,
            check_executable,
            output_dir,
            identity,
            max_parallel: 1,
        }
    }

    /// Children allowed to run at once
    #[must_use]
    pub fn with_max_parallel(mut self, max_parallel: usize) -> Self {
        self.max_parallel = max_parallel.max(1);
        self
    }

    /// Every (test type, package selection) pair, test types outermost
    #[must_use]
    pub fn plan(&self, test_types: &[TestType], selections: &[PackageSelection]) -> Vec<Launch> {
        test_types
            .iter()
            .flat_map(|test_type| selections.iter().map(move |selection| self.launch(*test_type, selection)))
            .collect()
    }

    fn launch(&self, test_type: TestType, selection: &PackageSelection) -> Launch {
        let output = output_path(&self.output_dir, &test_type, selection);
        let mut invocation = Invocation::new(&self.check_executable)
            .arg(test_type.check)
            .inheriting_output();
        for package in selection.rx_package_args() {
            invocation = invocation.args(["--rx-package".to_string(), package]);
        }
        if let Some(legacy) = &selection.legacy {
            invocation = invocation.args(["--rx-legacy-package".to_string(), legacy.to_string()]);
        }
        if let Some(source) = &selection.package_source {
            invocation = invocation.args(["--package-source", source.as_str()]);
        }
        invocation = invocation
            .args(["--test-run-id", self.identity.test_run_id.as_str()])
            .args(["--test-timestamp", self.identity.timestamp.as_str()])
            .arg("--output")
            .arg(output.to_string_lossy());
        Launch {
            test_type,
            output,
            invocation,
        }
    }

    /// Create the output folder and run every launch.
    ///
    /// Failures of individual children are collected in the summary. Only a
    /// reused output folder is an error.
    pub async fn run(&self, test_types: &[TestType], selections: &[PackageSelection]) -> CheckResult<GauntletSummary> {
        prepare_output_dir(&self.output_dir)?;
        let launches = self.plan(test_types, selections);
        info!(
            launches = launches.len(),
            max_parallel = self.max_parallel,
            test_run_id = %self.identity.test_run_id,
            output = %self.output_dir.display(),
            "starting gauntlet"
        );

        let outcomes = stream::iter(launches)
            .map(|launch| self.execute(launch))
            .buffer_unordered(self.max_parallel)
            .collect::<Vec<_>>()
            .await;
        Ok(GauntletSummary { outcomes })
    }

    async fn execute(&self, launch: Launch) -> (Launch, LaunchOutcome) {
        info!(check = launch.test_type.check, output = %launch.output.display(), "launching {}", launch.test_type.name);
        let outcome = match self.runner.run(&launch.invocation).await {
            Ok(output) if output.success() => {
                info!(check = launch.test_type.check, "check finished");
                LaunchOutcome::Exited(0)
            }
            Ok(output) => {
                warn!(
                    check = launch.test_type.check,
                    exit_code = output.exit_code,
                    "check exited with non-zero code"
                );
                LaunchOutcome::Exited(output.exit_code)
            }
            Err(err) => {
                error!(check = launch.test_type.check, %err, "could not run check");
                LaunchOutcome::Failed(err.to_string())
            }
        };
        (launch, outcome)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use pretty_assertions::assert_eq;

    fn identity() -> RunIdentity {
        RunIdentity {
            test_run_id: "run-9".into(),
            timestamp: "2025-04-01_10-00-00".into(),
        }
    }

    #[test]
    fn output_paths_are_distinct_per_selection() {
        let dir = Path::new("/out");
        let paths: Vec<_> = published_rx()
            .iter()
            .map(|s| output_path(dir, &TEST_TYPES[2], s))
            .collect();
        assert_eq!(paths[0], PathBuf::from("/out/CheckIssue97-System.Reactive.Linq-3.0.0.json"));
        let unique: std::collections::HashSet<_> = paths.iter().collect();
        assert_eq!(unique.len(), paths.len());
    }

    #[test]
    fn generated_identity_shares_timestamp() {
        let now = Utc.with_ymd_and_hms(2025, 4, 1, 10, 0, 0).unwrap();
        let id = RunIdentity::new(None, now).unwrap();
        assert_eq!(id.timestamp, "2025-04-01_10-00-00");
        assert!(id.test_run_id.starts_with("2025-04-01_10-00-00-"));

        let id = RunIdentity::new(Some("mine".into()), now).unwrap();
        assert_eq!(id.test_run_id, "mine");
    }

    #[test]
    fn refuses_existing_output_folder() {
        let dir = tempfile::tempdir().unwrap();
        let err = prepare_output_dir(dir.path()).unwrap_err();
        assert!(matches!(err, CheckError::Orchestration(_)));

        let fresh = dir.path().join("run");
        prepare_output_dir(&fresh).unwrap();
        assert!(fresh.is_dir());
    }

    #[test]
    fn launch_arguments() {
        let coordinator = Coordinator::new(
            gauntlet_test_utils::FakeProcessRunner::new(),
            PathBuf::from("gauntlet-check"),
            PathBuf::from("out"),
            identity(),
        );
        let selection = PackageSelection {
            main: PackageIdAndVersion::new("System.Reactive.Net", "7.0.0"),
            ui: vec![PackageIdAndVersion::new("System.Reactive.For.Wpf", "7.0.0")],
            legacy: Some(PackageIdAndVersion::new("System.Reactive", "7.0.0")),
            package_source: Some("/feed".into()),
        };
        let launches = coordinator.plan(&TEST_TYPES[..1], &[selection]);
        assert_eq!(launches.len(), 1);
        assert_eq!(
            launches[0].invocation.args,
            vec![
                "bloat",
                "--rx-package",
                "System.Reactive.Net,7.0.0",
                "--rx-package",
                "System.Reactive.For.Wpf,7.0.0",
                "--rx-legacy-package",
                "System.Reactive,7.0.0",
                "--package-source",
                "/feed",
                "--test-run-id",
                "run-9",
                "--test-timestamp",
                "2025-04-01_10-00-00",
                "--output",
                "out/CheckIssue1745-System.Reactive.Net-7.0.0.json",
            ]
        );
        // Progress lines of the check go straight to the console
        assert!(launches[0].invocation.inherit_output);
    }
}
