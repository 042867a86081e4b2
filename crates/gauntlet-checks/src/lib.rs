//! Rx packaging checks
//!
//! Generates the scenario matrix for each check, builds and runs the
//! generated projects through `gauntlet-build`, and streams one JSON record
//! per scenario.
//!
//! # Checks
//!
//! - **Bloat**: does a self-contained publish deploy WPF or Windows Forms?
//! - **Extension method**: does `DisableTransitiveFrameworkReferences` break the build?
//! - **Transitive reference**: does upgrading Rx behind a library change the app's behavior?
//! - **Plug-in conflict**: which Rx does each of two plug-ins in one host bind to?
//!
//! # Architecture
//!
//! ```text
//! RxPackageSet ─┐
//!               ├→ scenario::*::generate → ScenarioRunner → JsonArrayWriter
//! templates ────┘                              ↑
//!                                 gauntlet_build::Workspace
//! ```
//!
//! # Example
//!
//! ```rust,ignore
//! use gauntlet_checks::runner::{run_matrix, BloatRunner};
//! use gauntlet_checks::writer::JsonArrayWriter;
//!
//! let mut runner = BloatRunner::new(env, template_dir, packages, details);
//! let mut writer = JsonArrayWriter::create(Path::new("CheckIssue1745.json"))?;
//! run_matrix(&mut runner, &scenario::bloat::generate(), &mut writer).await?;
//! writer.finish()?;
//! ```

pub mod catalog;
pub mod error;
pub mod framework;
pub mod packages;
pub mod reference;
pub mod result;
pub mod runner;
pub mod scenario;
pub mod settings;
pub mod symbols;
pub mod writer;

pub use error::{CheckError, CheckResult};
pub use packages::RxPackageSet;
pub use runner::{run_matrix, MatrixSummary, ScenarioRunner};
pub use settings::HarnessConfig;
pub use writer::JsonArrayWriter;
