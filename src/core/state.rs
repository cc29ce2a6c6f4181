//! Execution state models

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Overall status of a workflow run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RunStatus {
    /// Run has not started
    Pending,
    /// Run is currently executing steps
    Running,
    /// Every step exited zero
    Completed,
    /// A step exited non-zero and the run was halted
    Failed,
    /// Run was cancelled by the host (e.g. superseded by a newer run)
    Cancelled,
}

/// State of a single step
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum StepState {
    /// Step has not executed yet
    Pending,
    /// Step is currently running
    Running { started_at: DateTime<Utc> },
    /// Step exited zero
    Completed {
        exit_code: i32,
        output: String,
        started_at: DateTime<Utc>,
        completed_at: DateTime<Utc>,
    },
    /// Step exited non-zero or could not be started
    Failed {
        error: String,
        exit_code: Option<i32>,
        started_at: DateTime<Utc>,
        failed_at: DateTime<Utc>,
    },
    /// Step never executed because an earlier step failed
    Skipped { reason: String },
}

impl StepState {
    /// Check if the step is in a terminal state
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            StepState::Completed { .. } | StepState::Failed { .. } | StepState::Skipped { .. }
        )
    }
}

/// Overall state of one workflow run
///
/// A run is instantiated per trigger event and discarded when it reaches a
/// terminal status; nothing here carries over to the next run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunState {
    /// Unique run ID
    pub run_id: Uuid,

    /// Current run status
    pub status: RunStatus,

    /// When the run started
    pub started_at: Option<DateTime<Utc>>,

    /// When the run completed or failed
    pub completed_at: Option<DateTime<Utc>>,

    /// Total number of steps in the job
    pub total_steps: usize,

    /// Number of completed steps
    pub completed_steps: usize,

    /// Number of failed steps (0 or 1 under fail-fast)
    pub failed_steps: usize,

    /// Number of steps skipped after the first failure
    pub skipped_steps: usize,
}

impl RunState {
    /// Create a new run state
    pub fn new() -> Self {
        Self {
            run_id: Uuid::new_v4(),
            status: RunStatus::Pending,
            started_at: None,
            completed_at: None,
            total_steps: 0,
            completed_steps: 0,
            failed_steps: 0,
            skipped_steps: 0,
        }
    }

    /// Mark the run as started
    pub fn start(&mut self, total_steps: usize) {
        self.status = RunStatus::Running;
        self.started_at = Some(Utc::now());
        self.total_steps = total_steps;
    }

    /// Mark the run as completed
    pub fn complete(&mut self) {
        self.status = RunStatus::Completed;
        self.completed_at = Some(Utc::now());
    }

    /// Mark the run as failed
    pub fn fail(&mut self) {
        self.status = RunStatus::Failed;
        self.completed_at = Some(Utc::now());
    }

    /// Update step counts
    pub fn update_counts(&mut self, completed: usize, failed: usize, skipped: usize) {
        self.completed_steps = completed;
        self.failed_steps = failed;
        self.skipped_steps = skipped;
    }

    /// Calculate progress percentage (0.0 to 1.0)
    pub fn progress(&self) -> f64 {
        if self.total_steps == 0 {
            return 0.0;
        }
        (self.completed_steps + self.failed_steps + self.skipped_steps) as f64
            / self.total_steps as f64
    }
}

impl Default for RunState {
    fn default() -> Self {
        Self::new()
    }
}
