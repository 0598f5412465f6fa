//! Execution state models

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Overall pipeline execution status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ExecutionStatus {
    /// Pipeline has not started
    Pending,
    /// Pipeline is currently running
    Running,
    /// Every stage passed
    Completed,
    /// Finished, but at least one non-fatal stage failed
    Unstable,
    /// A fatal stage failed and the run was aborted
    Failed,
}

/// State of a single stage
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum StageState {
    /// Stage has not run yet
    Pending,
    /// Stage is currently running
    Running {
        started_at: DateTime<Utc>,
    },
    /// Stage passed
    Passed {
        output: String,
        started_at: DateTime<Utc>,
        completed_at: DateTime<Utc>,
    },
    /// Stage failed but its failure mode let the run continue
    Unstable {
        reason: String,
        started_at: DateTime<Utc>,
        completed_at: DateTime<Utc>,
    },
    /// Stage failed and aborted the run
    Failed {
        error: String,
        started_at: DateTime<Utc>,
        failed_at: DateTime<Utc>,
    },
    /// Stage never ran because an earlier stage aborted the run
    Skipped {
        reason: String,
    },
}

impl StageState {
    /// Check if stage is in a terminal state
    pub fn is_terminal(&self) -> bool {
        !matches!(self, StageState::Pending | StageState::Running { .. })
    }
}

/// Overall pipeline state
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineState {
    /// Unique execution ID
    pub execution_id: Uuid,

    /// Current execution status
    pub status: ExecutionStatus,

    /// When execution started
    pub started_at: Option<DateTime<Utc>>,

    /// When execution finished
    pub completed_at: Option<DateTime<Utc>>,

    pub total_stages: usize,
    pub passed_stages: usize,
    pub unstable_stages: usize,
    pub failed_stages: usize,
    pub skipped_stages: usize,
}

impl PipelineState {
    /// Create a new pipeline state
    pub fn new() -> Self {
        Self {
            execution_id: Uuid::new_v4(),
            status: ExecutionStatus::Pending,
            started_at: None,
            completed_at: None,
            total_stages: 0,
            passed_stages: 0,
            unstable_stages: 0,
            failed_stages: 0,
            skipped_stages: 0,
        }
    }

    /// Mark pipeline as started
    pub fn start(&mut self, total_stages: usize) {
        self.status = ExecutionStatus::Running;
        self.started_at = Some(Utc::now());
        self.total_stages = total_stages;
    }

    /// Mark pipeline as finished with the given status
    pub fn finish(&mut self, status: ExecutionStatus) {
        self.status = status;
        self.completed_at = Some(Utc::now());
    }

    /// Calculate progress (0.0 to 1.0)
    pub fn progress(&self) -> f64 {
        if self.total_stages == 0 {
            return 0.0;
        }
        let done = self.passed_stages + self.unstable_stages + self.failed_stages + self.skipped_stages;
        done as f64 / self.total_stages as f64
    }
}

impl Default for PipelineState {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stage_state_is_terminal() {
        assert!(!StageState::Pending.is_terminal());
        assert!(!StageState::Running { started_at: Utc::now() }.is_terminal());
        assert!(StageState::Passed {
            output: "ok".to_string(),
            started_at: Utc::now(),
            completed_at: Utc::now(),
        }
        .is_terminal());
        assert!(StageState::Unstable {
            reason: "scan found HIGH".to_string(),
            started_at: Utc::now(),
            completed_at: Utc::now(),
        }
        .is_terminal());
        assert!(StageState::Skipped { reason: "aborted".to_string() }.is_terminal());
    }

    #[test]
    fn test_pipeline_progress() {
        let mut state = PipelineState::new();
        state.start(4);
        assert_eq!(state.progress(), 0.0);

        state.passed_stages = 2;
        assert_eq!(state.progress(), 0.5);

        state.failed_stages = 1;
        state.skipped_stages = 1;
        assert_eq!(state.progress(), 1.0);
    }

    #[test]
    fn test_finish_sets_completion_time() {
        let mut state = PipelineState::new();
        state.start(1);
        state.finish(ExecutionStatus::Unstable);
        assert_eq!(state.status, ExecutionStatus::Unstable);
        assert!(state.completed_at.is_some());
    }
}
