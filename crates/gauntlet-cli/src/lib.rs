//! Rx gauntlet coordinator
//!
//! Runs every check in `gauntlet-checks` against each requested Rx package
//! selection, one `gauntlet-check` child process per pair, and collects the
//! results files into a fresh output folder.

pub mod coordinator;

pub use coordinator::{
    output_path, prepare_output_dir, published_rx, Coordinator, GauntletSummary, Launch, LaunchOutcome,
    PackageSelection, RunIdentity, TestType, TEST_TYPES,
};
