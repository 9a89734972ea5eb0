//! Read-only progress view published to the operator UI

use crate::core::stage::stage_at;
use crate::core::state::{PipelinePhase, PipelineState};
use serde::Serialize;
use uuid::Uuid;

/// Bias added to the completion fraction so the bar visibly moves while the
/// first stage is in flight
pub const LOOKAHEAD_BIAS: f64 = 0.1;

/// Snapshot of a run, safe to hand to any number of readers
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ProgressSnapshot {
    pub run_id: Option<Uuid>,
    pub phase: PipelinePhase,
    pub stage_index: usize,
    pub total_stages: usize,
    /// Title of the stage in progress, `None` once past the last stage
    pub stage_title: Option<String>,
    pub subtasks_completed: usize,
    pub subtasks_total: Option<usize>,
    /// `min(1, stage_index / total_stages + LOOKAHEAD_BIAS)`
    pub fraction: f64,
    /// True once the last stage has been reached
    pub complete: bool,
    pub error: Option<String>,
}

impl ProgressSnapshot {
    /// Snapshot before any credential was supplied
    pub fn idle(total_stages: usize) -> Self {
        Self {
            run_id: None,
            phase: PipelinePhase::Idle,
            stage_index: 0,
            total_stages,
            stage_title: stage_at(0).map(|s| s.title.to_string()),
            subtasks_completed: 0,
            subtasks_total: None,
            fraction: 0.0,
            complete: false,
            error: None,
        }
    }

    /// Project the controller state into a snapshot
    pub fn from_state(run_id: Uuid, phase: PipelinePhase, state: &PipelineState) -> Self {
        let stage_index = state.stage_index();
        let total_stages = state.total_stages();
        Self {
            run_id: Some(run_id),
            phase,
            stage_index,
            total_stages,
            stage_title: stage_at(stage_index).map(|s| s.title.to_string()),
            subtasks_completed: state.stage_subtask_completed(),
            subtasks_total: state.stage_subtask_target(),
            fraction: completion_fraction(stage_index, total_stages),
            complete: total_stages > 0 && stage_index + 1 >= total_stages,
            error: state.last_error().map(str::to_string),
        }
    }
}

/// Completion fraction shown by the progress bar
pub fn completion_fraction(stage_index: usize, total_stages: usize) -> f64 {
    if total_stages == 0 {
        return 1.0;
    }
    (stage_index as f64 / total_stages as f64 + LOOKAHEAD_BIAS).min(1.0)
}
