//! Workflow domain model

use crate::core::{
    config::{TriggerEvent, WorkflowConfig},
    state::{RunState, RunStatus, StepState},
    step::{Step, StepDefaults},
};
use anyhow::Result;
use std::collections::HashMap;

/// The single job of a workflow
#[derive(Debug, Clone)]
pub struct Job {
    /// Job id from the configuration
    pub id: String,

    /// OS image label the job is bound to
    pub runs_on: String,

    /// Environment visible to every step
    pub env: HashMap<String, String>,

    /// Steps in declaration order
    pub steps: Vec<Step>,
}

/// A workflow definition plus the state of its current run
#[derive(Debug, Clone)]
pub struct Workflow {
    /// Workflow name
    pub name: String,

    /// Events this workflow responds to
    pub triggers: Vec<TriggerEvent>,

    /// The job executed per run
    pub job: Job,

    /// State of the current run
    pub state: RunState,
}

impl Workflow {
    /// Create a workflow from a validated configuration
    pub fn from_config(config: &WorkflowConfig) -> Result<Self> {
        let triggers = config.triggers()?;

        let (job_id, job_config) = config
            .jobs
            .iter()
            .next()
            .ok_or_else(|| anyhow::anyhow!("workflow '{}' has no job", config.name))?;

        let defaults = StepDefaults::default();
        let steps = job_config
            .steps
            .iter()
            .enumerate()
            .map(|(index, step_config)| Step::from_config(index, step_config, &defaults))
            .collect();

        Ok(Workflow {
            name: config.name.clone(),
            triggers,
            job: Job {
                id: job_id.clone(),
                runs_on: job_config.runs_on.clone(),
                env: job_config.env.clone(),
                steps,
            },
            state: RunState::new(),
        })
    }

    /// Whether this workflow responds to the given event
    pub fn triggered_by(&self, event: TriggerEvent) -> bool {
        self.triggers.contains(&event)
    }

    /// Get a step by id
    pub fn step(&self, id: &str) -> Option<&Step> {
        self.job.steps.iter().find(|s| s.id == id)
    }

    /// Get a mutable step by id
    pub fn step_mut(&mut self, id: &str) -> Option<&mut Step> {
        self.job.steps.iter_mut().find(|s| s.id == id)
    }

    /// Check if every step reached a terminal state
    pub fn is_complete(&self) -> bool {
        self.job.steps.iter().all(|s| s.state.is_terminal())
    }

    /// Check if the run has failed
    pub fn has_failed(&self) -> bool {
        self.state.status == RunStatus::Failed
    }

    /// Ids of completed steps, in declaration order
    pub fn completed_step_ids(&self) -> Vec<String> {
        self.job
            .steps
            .iter()
            .filter(|s| matches!(s.state, StepState::Completed { .. }))
            .map(|s| s.id.clone())
            .collect()
    }

    /// Ids of skipped steps, in declaration order
    pub fn skipped_step_ids(&self) -> Vec<String> {
        self.job
            .steps
            .iter()
            .filter(|s| matches!(s.state, StepState::Skipped { .. }))
            .map(|s| s.id.clone())
            .collect()
    }

    /// The first failed step, if any
    pub fn failed_step(&self) -> Option<&Step> {
        self.job
            .steps
            .iter()
            .find(|s| matches!(s.state, StepState::Failed { .. }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::config::WorkflowConfig;
    use crate::core::step::StepKind;

    const YAML: &str = r#"
name: CI
on: [push, pull_request]
jobs:
  default:
    runs-on: ubuntu-latest
    env:
      CARGO_TERM_COLOR: always
    steps:
      - name: Checkout
        uses: checkout@v2
      - name: Build
        run: cargo build
        env:
          RUSTFLAGS: "-D warnings"
"#;

    fn workflow() -> Workflow {
        WorkflowConfig::from_yaml(YAML).unwrap().to_workflow().unwrap()
    }

    #[test]
    fn test_from_config() {
        let wf = workflow();
        assert_eq!(wf.name, "CI");
        assert_eq!(wf.job.id, "default");
        assert_eq!(wf.job.runs_on, "ubuntu-latest");
        assert_eq!(wf.job.steps.len(), 2);
        assert_eq!(wf.job.steps[0].id, "checkout");
        assert!(matches!(wf.job.steps[0].kind, StepKind::Action { .. }));
        assert_eq!(
            wf.job.steps[1].env.get("RUSTFLAGS"),
            Some(&"-D warnings".to_string())
        );
    }

    #[test]
    fn test_triggered_by() {
        let wf = workflow();
        assert!(wf.triggered_by(TriggerEvent::Push));
        assert!(wf.triggered_by(TriggerEvent::PullRequest));
    }

    #[test]
    fn test_step_lookup() {
        let mut wf = workflow();
        assert!(wf.step("build").is_some());
        assert!(wf.step("missing").is_none());

        wf.step_mut("build").unwrap().state = StepState::Skipped {
            reason: "earlier step failed".to_string(),
        };
        assert_eq!(wf.skipped_step_ids(), vec!["build".to_string()]);
    }

    #[test]
    fn test_is_complete() {
        let mut wf = workflow();
        assert!(!wf.is_complete());

        for step in &mut wf.job.steps {
            step.state = StepState::Skipped {
                reason: "test".to_string(),
            };
        }
        assert!(wf.is_complete());
    }
}
