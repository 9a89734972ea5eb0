//! Persistence layer for provisioning run history

#[cfg(feature = "sqlite")]
pub mod store;

#[cfg(feature = "sqlite")]
pub use store::SqliteHistoryStore;

pub use crate::core::RunStatus;
use crate::core::{PipelinePhase, ProgressSnapshot};
use anyhow::Result;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Summary of a provisioning run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunSummary {
    /// Unique run ID
    pub run_id: Uuid,

    /// Title that was provisioned
    pub title_id: String,

    pub status: RunStatus,

    pub started_at: DateTime<Utc>,

    /// When the run settled (if it did)
    pub finished_at: Option<DateTime<Utc>>,

    /// Number of stages that completed
    pub stages_completed: usize,

    pub total_stages: usize,

    /// Error the run stopped on
    pub last_error: Option<String>,
}

/// Trait for history backends
#[async_trait::async_trait]
pub trait HistoryBackend: Send + Sync {
    /// Save (or replace) a run summary
    async fn save_run(&self, run: &RunSummary) -> Result<()>;

    /// Load a run by ID
    async fn load_run(&self, run_id: Uuid) -> Result<Option<RunSummary>>;

    /// List runs, newest first, optionally for a single title
    async fn list_runs(&self, title_id: Option<&str>, limit: usize) -> Result<Vec<RunSummary>>;
}

/// In-memory history (for testing or `--no-history` runs)
pub struct InMemoryHistory {
    runs: tokio::sync::RwLock<std::collections::HashMap<Uuid, RunSummary>>,
}

impl InMemoryHistory {
    pub fn new() -> Self {
        Self {
            runs: tokio::sync::RwLock::new(std::collections::HashMap::new()),
        }
    }
}

impl Default for InMemoryHistory {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait::async_trait]
impl HistoryBackend for InMemoryHistory {
    async fn save_run(&self, run: &RunSummary) -> Result<()> {
        let mut runs = self.runs.write().await;
        runs.insert(run.run_id, run.clone());
        Ok(())
    }

    async fn load_run(&self, run_id: Uuid) -> Result<Option<RunSummary>> {
        let runs = self.runs.read().await;
        Ok(runs.get(&run_id).cloned())
    }

    async fn list_runs(&self, title_id: Option<&str>, limit: usize) -> Result<Vec<RunSummary>> {
        let runs = self.runs.read().await;
        let mut result: Vec<RunSummary> = runs
            .values()
            .filter(|run| title_id.map_or(true, |id| run.title_id == id))
            .cloned()
            .collect();
        result.sort_by(|a, b| b.started_at.cmp(&a.started_at));
        result.truncate(limit);
        Ok(result)
    }
}

/// Create a summary from the last snapshot of a run
pub fn create_summary(
    title_id: &str,
    started_at: DateTime<Utc>,
    snapshot: &ProgressSnapshot,
) -> RunSummary {
    let status = match snapshot.phase {
        PipelinePhase::Complete => RunStatus::Completed,
        PipelinePhase::Aborted => RunStatus::Aborted,
        PipelinePhase::Halted(_) => RunStatus::Halted,
        _ => RunStatus::Running,
    };
    let finished_at = match status {
        RunStatus::Running => None,
        _ => Some(Utc::now()),
    };

    RunSummary {
        run_id: snapshot.run_id.unwrap_or_else(Uuid::nil),
        title_id: title_id.to_string(),
        status,
        started_at,
        finished_at,
        stages_completed: snapshot.stage_index.min(snapshot.total_stages),
        total_stages: snapshot.total_stages,
        last_error: snapshot.error.clone(),
    }
}
