//! Persistence layer for run history
//!
//! History is observability only: a run never reads state written by a
//! previous run.

#[cfg(feature = "sqlite")]
pub mod store;

#[cfg(feature = "sqlite")]
pub use store::SqliteRunStore;

use crate::core::{RunStatus, TriggerEvent, Workflow};
use anyhow::Result;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Summary of one workflow run
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunSummary {
    /// Unique run ID
    pub run_id: Uuid,

    /// Workflow name
    pub workflow_name: String,

    /// Event that triggered the run
    pub event: TriggerEvent,

    /// Final (or current) status
    pub status: RunStatus,

    /// When the run started
    pub started_at: DateTime<Utc>,

    /// When the run completed (if complete)
    pub completed_at: Option<DateTime<Utc>>,

    /// Progress (0.0 to 1.0)
    pub progress: f64,

    /// Number of completed steps
    pub completed_steps: usize,

    /// Total number of steps
    pub total_steps: usize,
}

/// Trait for persistence backends
#[async_trait::async_trait]
pub trait PersistenceBackend: Send + Sync {
    /// Save a run
    async fn save_run(&self, run: &RunSummary) -> Result<()>;

    /// Load a run by ID
    async fn load_run(&self, run_id: Uuid) -> Result<Option<RunSummary>>;

    /// List all runs of a workflow
    async fn list_runs(&self, workflow_name: &str) -> Result<Vec<RunSummary>>;

    /// List all workflow names
    async fn list_workflows(&self) -> Result<Vec<String>>;
}

/// In-memory persistence (for testing or ephemeral use)
pub struct InMemoryPersistence {
    runs: tokio::sync::RwLock<std::collections::HashMap<Uuid, RunSummary>>,
    by_workflow: tokio::sync::RwLock<std::collections::HashMap<String, Vec<Uuid>>>,
}

impl InMemoryPersistence {
    pub fn new() -> Self {
        Self {
            runs: tokio::sync::RwLock::new(std::collections::HashMap::new()),
            by_workflow: tokio::sync::RwLock::new(std::collections::HashMap::new()),
        }
    }
}

impl Default for InMemoryPersistence {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait::async_trait]
impl PersistenceBackend for InMemoryPersistence {
    async fn save_run(&self, run: &RunSummary) -> Result<()> {
        let mut runs = self.runs.write().await;
        runs.insert(run.run_id, run.clone());

        let mut by_workflow = self.by_workflow.write().await;
        by_workflow
            .entry(run.workflow_name.clone())
            .or_default()
            .push(run.run_id);

        Ok(())
    }

    async fn load_run(&self, run_id: Uuid) -> Result<Option<RunSummary>> {
        let runs = self.runs.read().await;
        Ok(runs.get(&run_id).cloned())
    }

    async fn list_runs(&self, workflow_name: &str) -> Result<Vec<RunSummary>> {
        let runs = self.runs.read().await;
        let by_workflow = self.by_workflow.read().await;

        if let Some(ids) = by_workflow.get(workflow_name) {
            let mut result = Vec::new();
            for id in ids {
                if let Some(run) = runs.get(id) {
                    result.push(run.clone());
                }
            }
            Ok(result)
        } else {
            Ok(Vec::new())
        }
    }

    async fn list_workflows(&self) -> Result<Vec<String>> {
        let by_workflow = self.by_workflow.read().await;
        Ok(by_workflow.keys().cloned().collect())
    }
}

/// Create a summary from a finished (or running) workflow
pub fn create_summary(workflow: &Workflow, event: TriggerEvent) -> RunSummary {
    RunSummary {
        run_id: workflow.state.run_id,
        workflow_name: workflow.name.clone(),
        event,
        status: workflow.state.status,
        started_at: workflow.state.started_at.unwrap_or_else(Utc::now),
        completed_at: workflow.state.completed_at,
        progress: workflow.state.progress(),
        completed_steps: workflow.state.completed_steps,
        total_steps: workflow.state.total_steps,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn summary(name: &str) -> RunSummary {
        RunSummary {
            run_id: Uuid::new_v4(),
            workflow_name: name.to_string(),
            event: TriggerEvent::Push,
            status: RunStatus::Completed,
            started_at: Utc::now(),
            completed_at: Some(Utc::now()),
            progress: 1.0,
            completed_steps: 7,
            total_steps: 7,
        }
    }

    #[tokio::test]
    async fn test_in_memory_round_trip() {
        let store = InMemoryPersistence::new();
        let run = summary("CI");

        store.save_run(&run).await.unwrap();

        let loaded = store.load_run(run.run_id).await.unwrap().unwrap();
        assert_eq!(loaded.workflow_name, "CI");
        assert_eq!(loaded.event, TriggerEvent::Push);

        let runs = store.list_runs("CI").await.unwrap();
        assert_eq!(runs.len(), 1);

        let workflows = store.list_workflows().await.unwrap();
        assert_eq!(workflows, vec!["CI".to_string()]);
    }

    #[tokio::test]
    async fn test_unknown_workflow_lists_empty() {
        let store = InMemoryPersistence::new();
        assert!(store.list_runs("missing").await.unwrap().is_empty());
        assert!(store.load_run(Uuid::new_v4()).await.unwrap().is_none());
    }
}
