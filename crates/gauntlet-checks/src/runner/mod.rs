//! Scenario runners
//!
//! Every check implements [`ScenarioRunner`] and is driven over its scenario
//! list by [`run_matrix`], which streams one record per scenario into a
//! [`JsonArrayWriter`].

pub mod bloat;
pub mod extension_method;
pub mod phase;
pub mod plugin;
pub mod transitive;

pub use bloat::BloatRunner;
pub use extension_method::ExtensionMethodRunner;
pub use plugin::{PlugInConflictRunner, PlugInHost};
pub use transitive::{LibraryPackageCache, TransitiveReferenceRunner};

use crate::error::CheckResult;
use crate::writer::JsonArrayWriter;
use serde::Serialize;
use std::fmt::Debug;
use std::io::Write;
use tracing::{error, info, warn};

/// Builds, runs and inspects one scenario at a time
#[async_trait::async_trait]
pub trait ScenarioRunner: Send {
    /// Input describing one test case
    type Scenario: Debug + Sync;
    /// Output record appended to the results file
    type Record: Serialize + Send;

    /// Short name used in log lines
    fn name(&self) -> &'static str;

    /// Run one scenario.
    ///
    /// Build and execution failures of the code under test belong in the
    /// record. An `Err` means no meaningful record could be produced.
    async fn run_scenario(&mut self, scenario: &Self::Scenario) -> CheckResult<Self::Record>;
}

/// Counts from one matrix run
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MatrixSummary {
    /// Records written
    pub completed: usize,
    /// Scenarios that produced no record
    pub skipped: usize,
    /// Skipped scenarios whose error was not data-level
    pub errors: usize,
}

/// Drive `runner` over `scenarios`, appending each record to `writer`.
///
/// Scenario-level errors are logged and skipped. Errors after which no
/// further scenario can succeed end the run.
pub async fn run_matrix<R, W>(
    runner: &mut R,
    scenarios: &[R::Scenario],
    writer: &mut JsonArrayWriter<W>,
) -> CheckResult<MatrixSummary>
where
    R: ScenarioRunner,
    W: Write,
{
    let total = scenarios.len();
    let mut summary = MatrixSummary::default();
    info!(check = runner.name(), total, "starting scenario matrix");

    for (index, scenario) in scenarios.iter().enumerate() {
        info!(check = runner.name(), "scenario {}/{total}: {scenario:?}", index + 1);
        match runner.run_scenario(scenario).await {
            Ok(record) => {
                writer.append(&record)?;
                summary.completed += 1;
            }
            Err(err) if err.is_fatal() => {
                error!(check = runner.name(), %err, "aborting scenario matrix");
                return Err(err);
            }
            Err(err) => {
                if err.is_data_level() {
                    warn!(check = runner.name(), scenario = index + 1, %err, "scenario produced no record");
                } else {
                    error!(check = runner.name(), scenario = index + 1, %err, "scenario failed");
                    summary.errors += 1;
                }
                summary.skipped += 1;
            }
        }
    }

    info!(
        check = runner.name(),
        completed = summary.completed,
        skipped = summary.skipped,
        errors = summary.errors,
        "scenario matrix finished"
    );
    Ok(summary)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::CheckError;
    use serde_json::Value;

    /// Fails odd scenarios with a recoverable error and 99 fatally
    struct Scripted;

    #[async_trait::async_trait]
    impl ScenarioRunner for Scripted {
        type Scenario = u32;
        type Record = u32;

        fn name(&self) -> &'static str {
            "scripted"
        }

        async fn run_scenario(&mut self, scenario: &u32) -> CheckResult<u32> {
            match scenario {
                99 => Err(CheckError::Catalog("gone".into())),
                n if n % 2 == 1 => Err(CheckError::orchestration("odd")),
                n => Ok(n * 10),
            }
        }
    }

    #[tokio::test]
    async fn skips_scenario_errors() {
        let mut writer = JsonArrayWriter::new(Vec::new()).unwrap();
        let summary = run_matrix(&mut Scripted, &[2, 3, 4], &mut writer).await.unwrap();
        assert_eq!(summary, MatrixSummary {
                completed: 2,
                skipped: 1,
                errors: 1
            });

        let parsed: Value = serde_json::from_slice(&writer.finish().unwrap()).unwrap();
        assert_eq!(parsed, serde_json::json!([20, 40]));
    }

    #[tokio::test]
    async fn fatal_error_stops_matrix() {
        let mut writer = JsonArrayWriter::new(Vec::new()).unwrap();
        let err = run_matrix(&mut Scripted, &[2, 99, 4], &mut writer).await.unwrap_err();
        assert!(err.is_fatal());
        assert_eq!(writer.count(), 1);
    }
}
