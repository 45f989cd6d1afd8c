// src/engine/mod.rs

//! Build orchestration.
//!
//! This module ties together:
//! - the output queue between the per-run background task and the UI loop
//!   ([`queue`]),
//! - the cooperative UI loop that delivers queued output to the panel
//!   ([`ui`]),
//! - the orchestrator owning the single active run ([`orchestrator`]).

use std::time::Duration;

use crate::exec::RunId;

/// Lifecycle phase of the orchestrator.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Idle,
    Starting,
    Running,
    Finishing,
    Cancelling,
}

/// Completion bookkeeping of a finished run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BuildSummary {
    pub run_id: RunId,
    pub elapsed: Duration,
    /// Number of results matched in the panel text.
    pub errors: usize,
}

/// Observable status of the most recent run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RunStatus {
    Idle,
    Running(RunId),
    /// Published once the summary line has been delivered to the panel.
    Finished(BuildSummary),
    Cancelled(RunId),
    /// The run could not be started; the message is shown in the panel.
    Failed(String),
}

impl RunStatus {
    /// Whether this status ends the wait for `run`: it finished, was
    /// cancelled, or a newer run took over.
    pub fn settles(&self, run: RunId) -> bool {
        match self {
            RunStatus::Finished(summary) => summary.run_id == run,
            RunStatus::Cancelled(id) => *id == run,
            RunStatus::Running(id) => *id != run,
            RunStatus::Failed(_) => true,
            RunStatus::Idle => false,
        }
    }
}

pub mod orchestrator;
pub mod queue;
pub mod ui;

pub use orchestrator::{BuildOrchestrator, OrchestratorState, ViewContext};
pub use queue::{AppendOutcome, BLOCK_SIZE, OutputQueue};
pub use ui::{UiHandle, UiTask};
