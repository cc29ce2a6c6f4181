//! Run engine - executes a workflow's job strictly in step order

use crate::{
    core::{RunContext, RunStatus, StepState, TriggerEvent, Workflow},
    execution::{StepExecutor, StepOutcome},
    runner::CommandRunner,
};
use std::sync::{Arc, Mutex};
use tracing::{error, info};
use uuid::Uuid;

/// Events that occur during a run
///
/// This is the status-reporting surface: per-step and overall pass/fail are
/// surfaced upstream through these events.
#[derive(Debug, Clone)]
pub enum ExecutionEvent {
    RunStarted {
        run_id: Uuid,
        workflow_name: String,
        event: TriggerEvent,
    },
    StepStarted {
        step_id: String,
    },
    StepOutput {
        step_id: String,
        output: String,
    },
    StepCompleted {
        step_id: String,
    },
    StepFailed {
        step_id: String,
        error: String,
    },
    StepSkipped {
        step_id: String,
        reason: String,
    },
    RunCompleted {
        run_id: Uuid,
        status: RunStatus,
    },
}

/// Type for event handlers
pub type EventHandler = Arc<dyn Fn(ExecutionEvent) + Send + Sync>;

/// Executes workflow runs
///
/// Steps run strictly in declaration order. The first non-zero exit halts
/// the run: the failing step is recorded, every remaining step is marked
/// skipped, and the run fails. There is no retry and no rollback.
pub struct RunEngine<R> {
    executor: StepExecutor<R>,
    event_handlers: Mutex<Vec<EventHandler>>,
}

impl<R: CommandRunner> RunEngine<R> {
    pub fn new(runner: R) -> Self {
        Self {
            executor: StepExecutor::new(runner),
            event_handlers: Mutex::new(Vec::new()),
        }
    }

    /// Add an event handler
    pub fn add_event_handler<F>(&self, handler: F)
    where
        F: Fn(ExecutionEvent) + Send + Sync + 'static,
    {
        self.event_handlers
            .lock()
            .expect("event handler lock")
            .push(Arc::new(handler));
    }

    /// Emit an event to all handlers
    fn emit(&self, event: ExecutionEvent) {
        let handlers = self.event_handlers.lock().expect("event handler lock");
        for handler in handlers.iter() {
            handler(event.clone());
        }
    }

    /// Execute one run of the workflow for the context's trigger event
    ///
    /// Returns `Err` only when the run could not be instantiated (the
    /// workflow does not respond to the event). A failing step is a normal
    /// outcome: the run finishes with `RunStatus::Failed`.
    pub async fn execute(
        &self,
        workflow: &mut Workflow,
        ctx: &mut RunContext,
    ) -> Result<(), String> {
        let run_id = workflow.state.run_id;

        if !workflow.triggered_by(ctx.event) {
            return Err(format!(
                "workflow '{}' does not respond to {} events",
                workflow.name, ctx.event
            ));
        }

        info!(
            "starting run of '{}' for {} ({})",
            workflow.name, ctx.event, run_id
        );
        self.emit(ExecutionEvent::RunStarted {
            run_id,
            workflow_name: workflow.name.clone(),
            event: ctx.event,
        });

        let total = workflow.job.steps.len();
        workflow.state.start(total);
        let job_env = workflow.job.env.clone();

        for index in 0..total {
            let step = workflow.job.steps[index].clone();
            ctx.current_step_id = Some(step.id.clone());

            let started_at = chrono::Utc::now();
            workflow.job.steps[index].state = StepState::Running { started_at };
            self.emit(ExecutionEvent::StepStarted {
                step_id: step.id.clone(),
            });

            let outcome = self.executor.execute(&step, &job_env, ctx).await;

            match outcome {
                StepOutcome::Success { output } => {
                    workflow.job.steps[index].state = StepState::Completed {
                        exit_code: 0,
                        output: output.clone(),
                        started_at,
                        completed_at: chrono::Utc::now(),
                    };
                    ctx.set_step_output(&step.id, output.clone());

                    self.emit(ExecutionEvent::StepOutput {
                        step_id: step.id.clone(),
                        output,
                    });
                    self.emit(ExecutionEvent::StepCompleted {
                        step_id: step.id.clone(),
                    });
                }
                StepOutcome::Failed { error, exit_code } => {
                    error!("step {} failed, halting run", step.id);
                    workflow.job.steps[index].state = StepState::Failed {
                        error: error.clone(),
                        exit_code,
                        started_at,
                        failed_at: chrono::Utc::now(),
                    };
                    self.emit(ExecutionEvent::StepFailed {
                        step_id: step.id.clone(),
                        error,
                    });

                    // Fail-fast: nothing after the failing step executes
                    for rest in workflow.job.steps.iter_mut().skip(index + 1) {
                        let reason = format!("step '{}' failed", step.id);
                        rest.state = StepState::Skipped {
                            reason: reason.clone(),
                        };
                        self.emit(ExecutionEvent::StepSkipped {
                            step_id: rest.id.clone(),
                            reason,
                        });
                    }

                    self.update_counts(workflow);
                    workflow.state.fail();
                    self.emit(ExecutionEvent::RunCompleted {
                        run_id,
                        status: RunStatus::Failed,
                    });
                    info!("run {} failed at step {}", run_id, step.id);
                    return Ok(());
                }
            }

            self.update_counts(workflow);
        }

        workflow.state.complete();
        self.emit(ExecutionEvent::RunCompleted {
            run_id,
            status: RunStatus::Completed,
        });
        info!("run {} completed", run_id);

        Ok(())
    }

    /// Refresh the run state's step counts
    fn update_counts(&self, workflow: &mut Workflow) {
        let mut completed = 0;
        let mut failed = 0;
        let mut skipped = 0;

        for step in &workflow.job.steps {
            match &step.state {
                StepState::Completed { .. } => completed += 1,
                StepState::Failed { .. } => failed += 1,
                StepState::Skipped { .. } => skipped += 1,
                _ => {}
            }
        }

        workflow.state.update_counts(completed, failed, skipped);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::config::WorkflowConfig;
    use crate::runner::{CommandInvocation, CommandOutput, RunnerError};
    use async_trait::async_trait;

    /// Runner that fails any command line containing the marker
    struct ScriptedRunner {
        fail_on: Option<String>,
        recorded: Mutex<Vec<String>>,
    }

    impl ScriptedRunner {
        fn ok() -> Self {
            Self {
                fail_on: None,
                recorded: Mutex::new(Vec::new()),
            }
        }

        fn failing_on(marker: &str) -> Self {
            Self {
                fail_on: Some(marker.to_string()),
                recorded: Mutex::new(Vec::new()),
            }
        }
    }

    #[async_trait]
    impl CommandRunner for ScriptedRunner {
        async fn run(&self, invocation: &CommandInvocation) -> Result<CommandOutput, RunnerError> {
            let display = invocation.display();
            self.recorded.lock().unwrap().push(display.clone());

            if self
                .fail_on
                .as_ref()
                .is_some_and(|marker| display.contains(marker))
            {
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

    const YAML: &str = r#"
name: CI
on: [push]
jobs:
  default:
    runs-on: ubuntu-latest
    steps:
      - name: Build
        run: cargo build
      - name: Test
        run: cargo test
      - name: Format check
        run: cargo fmt -- --check
"#;

    fn workflow() -> Workflow {
        WorkflowConfig::from_yaml(YAML)
            .unwrap()
            .to_workflow()
            .unwrap()
    }

    fn context() -> RunContext {
        RunContext::new(TriggerEvent::Push, std::path::PathBuf::from("/tmp/ws"))
    }

    #[tokio::test]
    async fn test_all_steps_run_in_order() {
        let engine = RunEngine::new(ScriptedRunner::ok());
        let mut wf = workflow();
        let mut ctx = context();

        engine.execute(&mut wf, &mut ctx).await.unwrap();

        assert_eq!(wf.state.status, RunStatus::Completed);
        assert!(wf.is_complete());
        assert_eq!(
            wf.completed_step_ids(),
            vec!["build", "test", "format-check"]
        );

        let recorded = engine.executor_runner_log();
        assert_eq!(recorded.len(), 3);
        assert!(recorded[0].contains("cargo build"));
        assert!(recorded[1].contains("cargo test"));
        assert!(recorded[2].contains("cargo fmt"));
    }

    #[tokio::test]
    async fn test_fail_fast_skips_remaining_steps() {
        let engine = RunEngine::new(ScriptedRunner::failing_on("cargo test"));
        let mut wf = workflow();
        let mut ctx = context();

        engine.execute(&mut wf, &mut ctx).await.unwrap();

        assert_eq!(wf.state.status, RunStatus::Failed);
        assert_eq!(wf.completed_step_ids(), vec!["build"]);
        assert_eq!(wf.skipped_step_ids(), vec!["format-check"]);
        assert_eq!(wf.failed_step().unwrap().id, "test");

        // The format check never ran
        let recorded = engine.executor_runner_log();
        assert!(!recorded.iter().any(|line| line.contains("cargo fmt")));
    }

    #[tokio::test]
    async fn test_untriggered_event_is_rejected() {
        let engine = RunEngine::new(ScriptedRunner::ok());
        let mut wf = workflow();
        let mut ctx = RunContext::new(
            TriggerEvent::PullRequest,
            std::path::PathBuf::from("/tmp/ws"),
        );

        let result = engine.execute(&mut wf, &mut ctx).await;
        assert!(result.is_err());
        assert_eq!(wf.state.status, RunStatus::Pending);
    }

    #[tokio::test]
    async fn test_events_are_emitted() {
        let engine = RunEngine::new(ScriptedRunner::failing_on("cargo test"));
        let events: Arc<Mutex<Vec<String>>> = Arc::new(Mutex::new(Vec::new()));

        let sink = events.clone();
        engine.add_event_handler(move |event| {
            let tag = match event {
                ExecutionEvent::RunStarted { .. } => "run-started".to_string(),
                ExecutionEvent::StepStarted { step_id } => format!("started:{}", step_id),
                ExecutionEvent::StepOutput { .. } => "output".to_string(),
                ExecutionEvent::StepCompleted { step_id } => format!("completed:{}", step_id),
                ExecutionEvent::StepFailed { step_id, .. } => format!("failed:{}", step_id),
                ExecutionEvent::StepSkipped { step_id, .. } => format!("skipped:{}", step_id),
                ExecutionEvent::RunCompleted { status, .. } => format!("run-done:{:?}", status),
            };
            sink.lock().unwrap().push(tag);
        });

        let mut wf = workflow();
        let mut ctx = context();
        engine.execute(&mut wf, &mut ctx).await.unwrap();

        let events = events.lock().unwrap();
        assert_eq!(
            *events,
            vec![
                "run-started",
                "started:build",
                "output",
                "completed:build",
                "started:test",
                "failed:test",
                "skipped:format-check",
                "run-done:Failed",
            ]
        );
    }

    impl RunEngine<ScriptedRunner> {
        fn executor_runner_log(&self) -> Vec<String> {
            self.executor.runner().recorded.lock().unwrap().clone()
        }
    }
}
