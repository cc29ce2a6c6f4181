//! Test utility functions for conveyor

#![allow(dead_code)]

use async_trait::async_trait;
use conveyor::core::{RunContext, RunStatus, StepState, TriggerEvent, Workflow, WorkflowConfig};
use conveyor::runner::{CommandInvocation, CommandOutput, CommandRunner, RunnerError};
use conveyor::RunEngine;
use std::path::PathBuf;
use std::sync::{Arc, Mutex};

/// Mock runner that records every invocation and fails commands whose
/// rendered command line contains a configured marker
pub struct MockRunner {
    fail_on: Option<String>,
    log: Arc<Mutex<Vec<CommandInvocation>>>,
}

impl MockRunner {
    /// Runner where every command exits zero
    pub fn ok() -> Self {
        Self {
            fail_on: None,
            log: Arc::new(Mutex::new(Vec::new())),
        }
    }

    /// Runner that fails any command line containing `marker`
    pub fn failing_on(marker: &str) -> Self {
        Self {
            fail_on: Some(marker.to_string()),
            log: Arc::new(Mutex::new(Vec::new())),
        }
    }

    /// Handle on the invocation log, usable after the runner moves into an
    /// engine
    pub fn log_handle(&self) -> Arc<Mutex<Vec<CommandInvocation>>> {
        self.log.clone()
    }
}

#[async_trait]
impl CommandRunner for MockRunner {
    async fn run(&self, invocation: &CommandInvocation) -> Result<CommandOutput, RunnerError> {
        self.log.lock().unwrap().push(invocation.clone());

        let failing = self
            .fail_on
            .as_ref()
            .is_some_and(|marker| invocation.display().contains(marker));

        if failing {
            Ok(CommandOutput {
                exit_code: 101,
                stdout: String::new(),
                stderr: "test failed".to_string(),
            })
        } else {
            Ok(CommandOutput {
                exit_code: 0,
                stdout: "ok\n".to_string(),
                stderr: String::new(),
            })
        }
    }
}

/// Result from running a workflow in a test
pub struct WorkflowTestResult {
    pub workflow: Workflow,
    pub invocations: Vec<CommandInvocation>,
}

impl WorkflowTestResult {
    /// Whether every step exited zero
    pub fn is_passed(&self) -> bool {
        self.workflow.state.status == RunStatus::Completed
    }

    /// Whether the run was halted by a failing step
    pub fn is_failed(&self) -> bool {
        self.workflow.state.status == RunStatus::Failed
    }

    /// Ids of completed steps, in declaration order
    pub fn completed_steps(&self) -> Vec<String> {
        self.workflow.completed_step_ids()
    }

    /// Ids of skipped steps, in declaration order
    pub fn skipped_steps(&self) -> Vec<String> {
        self.workflow.skipped_step_ids()
    }

    /// State of a specific step
    pub fn step_state(&self, step_id: &str) -> Option<&StepState> {
        self.workflow.step(step_id).map(|s| &s.state)
    }

    /// Error message of a failed step
    pub fn step_error(&self, step_id: &str) -> Option<String> {
        self.workflow.step(step_id).and_then(|s| match &s.state {
            StepState::Failed { error, .. } => Some(error.clone()),
            _ => None,
        })
    }

    /// Rendered command lines, in execution order
    pub fn command_lines(&self) -> Vec<String> {
        self.invocations.iter().map(|i| i.display()).collect()
    }

    /// The first recorded invocation whose command line contains `marker`
    pub fn invocation_containing(&self, marker: &str) -> Option<&CommandInvocation> {
        self.invocations
            .iter()
            .find(|i| i.display().contains(marker))
    }
}

/// Run a workflow defined in YAML against a mock runner
pub async fn run_workflow_yaml(
    yaml: &str,
    event: TriggerEvent,
    runner: MockRunner,
    secrets: &[(&str, &str)],
) -> WorkflowTestResult {
    let config = WorkflowConfig::from_yaml(yaml).expect("workflow YAML should parse");
    let mut workflow = config.to_workflow().expect("workflow should build");

    let mut ctx = RunContext::new(event, PathBuf::from("/tmp/conveyor-test-ws"));
    for (key, value) in &workflow.job.env {
        ctx.set_env(key.clone(), value.clone());
    }
    for (key, value) in secrets {
        ctx.add_secret(key.to_string(), value.to_string());
    }

    let log = runner.log_handle();
    let engine = RunEngine::new(runner);
    engine
        .execute(&mut workflow, &mut ctx)
        .await
        .expect("run should be instantiated");

    let invocations = log.lock().unwrap().clone();
    WorkflowTestResult {
        workflow,
        invocations,
    }
}
