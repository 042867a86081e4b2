//! Phases of one transitive-reference scenario
//!
//! `Init → BuildingAuxiliaryPackages* → BuildingBefore → [RunningBefore] →
//! BuildingAfter → [RunningAfter] → Scanning → Aggregating → Done`
//!
//! A failed app build skips its running phase. The after build is attempted
//! even when the before build failed.

use crate::error::CheckError;
use std::fmt;
use tracing::debug;

/// Where a scenario run currently is
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Phase {
    /// Nothing started yet
    Init,
    /// Packing intermediate library packages
    BuildingAuxiliaryPackages,
    /// Building the app before the upgrade
    BuildingBefore,
    /// Running the app built before the upgrade
    RunningBefore,
    /// Building the app after the upgrade
    BuildingAfter,
    /// Running the app built after the upgrade
    RunningAfter,
    /// Looking for UI framework assemblies in both outputs
    Scanning,
    /// Assembling the record
    Aggregating,
    /// Record produced
    Done,
}

impl Phase {
    /// Every phase, in order
    pub const ALL: [Phase; 9] = [
        Phase::Init,
        Phase::BuildingAuxiliaryPackages,
        Phase::BuildingBefore,
        Phase::RunningBefore,
        Phase::BuildingAfter,
        Phase::RunningAfter,
        Phase::Scanning,
        Phase::Aggregating,
        Phase::Done,
    ];
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{self:?}")
    }
}

/// Attempted move between phases that the table does not allow
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
#[error("illegal phase transition {from} -> {to}")]
pub struct IllegalTransition {
    /// Phase the tracker was in
    pub from: Phase,
    /// Phase it was asked to move to
    pub to: Phase,
}

impl From<IllegalTransition> for CheckError {
    fn from(err: IllegalTransition) -> Self {
        CheckError::Orchestration(err.to_string())
    }
}

/// Check a single move
pub fn validate_transition(from: Phase, to: Phase) -> Result<(), IllegalTransition> {
    if allowed_transitions(from).contains(&to) {
        Ok(())
    } else {
        Err(IllegalTransition { from, to })
    }
}

/// Phases reachable in one step from `from`
#[must_use]
pub fn allowed_transitions(from: Phase) -> Vec<Phase> {
    use Phase::{
        Aggregating, BuildingAfter, BuildingAuxiliaryPackages, BuildingBefore, Done, Init, RunningAfter,
        RunningBefore, Scanning,
    };
    match from {
        Init => vec![BuildingAuxiliaryPackages, BuildingBefore],
        BuildingAuxiliaryPackages => vec![BuildingAuxiliaryPackages, BuildingBefore],
        BuildingBefore => vec![RunningBefore, BuildingAfter],
        RunningBefore => vec![BuildingAfter],
        BuildingAfter => vec![RunningAfter, Scanning, Aggregating],
        RunningAfter => vec![Scanning],
        Scanning => vec![Aggregating],
        Aggregating => vec![Done],
        Done => vec![],
    }
}

/// Tracks the current phase and rejects illegal moves
#[derive(Debug)]
pub struct PhaseTracker {
    current: Phase,
}

impl Default for PhaseTracker {
    fn default() -> Self {
        Self { current: Phase::Init }
    }
}

impl PhaseTracker {
    /// Tracker at [`Phase::Init`]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Current phase
    #[inline]
    #[must_use]
    pub fn current(&self) -> Phase {
        self.current
    }

    /// Move to `to`
    pub fn advance(&mut self, to: Phase) -> Result<(), IllegalTransition> {
        validate_transition(self.current, to)?;
        debug!(from = %self.current, %to, "phase transition");
        self.current = to;
        Ok(())
    }
}
