//! Provisioning state models

use crate::core::Credential;
use crate::execution::FanOutTracker;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Overall run status, as recorded in history
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RunStatus {
    /// Stages are still being dispatched
    Running,
    /// Every stage completed
    Completed,
    /// Stopped on an error the operator did not recover from
    Halted,
    /// Cancelled by the operator
    Aborted,
}

impl fmt::Display for RunStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            RunStatus::Running => "Running",
            RunStatus::Completed => "Completed",
            RunStatus::Halted => "Halted",
            RunStatus::Aborted => "Aborted",
        };
        f.write_str(s)
    }
}

impl RunStatus {
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "Running" => Some(RunStatus::Running),
            "Completed" => Some(RunStatus::Completed),
            "Halted" => Some(RunStatus::Halted),
            "Aborted" => Some(RunStatus::Aborted),
            _ => None,
        }
    }
}

/// Controller state machine position
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "phase", content = "stage", rename_all = "snake_case")]
pub enum PipelinePhase {
    /// No credential yet
    Idle,
    /// Some work items of the stage are scheduled but not yet sent
    Dispatching(usize),
    /// All work items sent; waiting for completions or the settle delay
    Awaiting(usize),
    /// An error is set; nothing advances until it is cleared
    Halted(usize),
    /// Every stage finished
    Complete,
    /// Run cancelled by the operator
    Aborted,
}

impl PipelinePhase {
    /// Whether the controller will make no further progress on its own
    pub fn is_settled(&self) -> bool {
        matches!(
            self,
            PipelinePhase::Halted(_) | PipelinePhase::Complete | PipelinePhase::Aborted
        )
    }
}

/// State of one provisioning run
///
/// Owned and mutated only by the pipeline controller. While `last_error` is
/// set the stage index does not move; successes of calls already in flight
/// still count.
#[derive(Debug, Clone)]
pub struct PipelineState {
    credential: Credential,
    stage_index: usize,
    total_stages: usize,
    fan_out: Option<FanOutTracker>,
    last_error: Option<String>,
}

impl PipelineState {
    /// Create the state for a run positioned at stage 0
    pub fn new(credential: Credential, total_stages: usize) -> Self {
        Self {
            credential,
            stage_index: 0,
            total_stages,
            fan_out: None,
            last_error: None,
        }
    }

    pub fn credential(&self) -> &Credential {
        &self.credential
    }

    pub fn stage_index(&self) -> usize {
        self.stage_index
    }

    pub fn total_stages(&self) -> usize {
        self.total_stages
    }

    /// Successes recorded for the current fan-out stage (0 for single-call stages)
    pub fn stage_subtask_completed(&self) -> usize {
        self.fan_out.as_ref().map_or(0, |t| t.completed())
    }

    /// Cardinality of the current fan-out stage
    pub fn stage_subtask_target(&self) -> Option<usize> {
        self.fan_out.as_ref().map(|t| t.target())
    }

    pub fn last_error(&self) -> Option<&str> {
        self.last_error.as_deref()
    }

    pub fn is_halted(&self) -> bool {
        self.last_error.is_some()
    }

    pub fn is_complete(&self) -> bool {
        self.stage_index >= self.total_stages
    }

    /// Arm the counter for a fan-out stage of `target` items
    pub fn begin_fan_out(&mut self, target: usize) {
        self.fan_out = Some(FanOutTracker::new(target));
    }

    /// Whether every call of the current fan-out stage has succeeded
    pub fn subtasks_complete(&self) -> bool {
        self.fan_out.as_ref().is_some_and(|t| t.is_complete())
    }

    /// Count one fan-out success; returns whether the stage is now complete
    ///
    /// Counts while halted too. Has no effect outside a fan-out stage.
    pub fn record_subtask_success(&mut self) -> bool {
        match self.fan_out.as_mut() {
            Some(tracker) => tracker.record_success(),
            None => false,
        }
    }

    /// Move to the next stage; returns false (and changes nothing) while
    /// halted or already complete
    pub fn advance(&mut self) -> bool {
        if self.is_halted() || self.is_complete() {
            return false;
        }
        self.stage_index += 1;
        self.fan_out = None;
        true
    }

    /// Record a failure, halting the run
    pub fn report_error(&mut self, error: impl Into<String>) {
        self.last_error = Some(error.into());
    }

    /// Dismiss the current error; returns whether one was set
    pub fn clear_error(&mut self) -> bool {
        self.last_error.take().is_some()
    }
}
