//! Step executor - resolves one step to commands and runs them

use crate::{
    actions,
    core::{render_expressions, RunContext, Step, StepKind},
    runner::{CommandInvocation, CommandRunner},
};
use std::collections::HashMap;
use tokio::time::{timeout, Duration};
use tracing::{debug, error, info};

/// Result of executing a step
#[derive(Debug, Clone)]
pub enum StepOutcome {
    /// Every command of the step exited zero
    Success { output: String },
    /// A command exited non-zero, timed out, or could not be started
    Failed {
        error: String,
        exit_code: Option<i32>,
    },
}

/// Executes a single step
pub struct StepExecutor<R> {
    runner: R,
}

impl<R: CommandRunner> StepExecutor<R> {
    pub fn new(runner: R) -> Self {
        Self { runner }
    }

    #[cfg(test)]
    pub(crate) fn runner(&self) -> &R {
        &self.runner
    }

    /// Execute a step and return the outcome
    ///
    /// The step's environment overlay is rendered and merged over the job
    /// environment; the merged overlay reaches only this step's process
    /// tree.
    pub async fn execute(
        &self,
        step: &Step,
        job_env: &HashMap<String, String>,
        ctx: &RunContext,
    ) -> StepOutcome {
        info!("executing step: {}", step.id);

        let variables = ctx.rendering_variables();

        let invocations = match &step.kind {
            StepKind::Run(script) => {
                let script = render_expressions(script, &variables);
                vec![CommandInvocation::shell(&script)]
            }
            StepKind::Action { action, with } => {
                let with: HashMap<String, String> = with
                    .iter()
                    .map(|(key, value)| (key.clone(), render_expressions(value, &variables)))
                    .collect();

                match actions::resolve(action, &with, ctx) {
                    Ok(invocations) => invocations,
                    Err(e) => {
                        error!("action resolution failed for step {}: {}", step.id, e);
                        return StepOutcome::Failed {
                            error: e.to_string(),
                            exit_code: None,
                        };
                    }
                }
            }
        };

        let mut overlay = job_env.clone();
        for (key, value) in &step.env {
            overlay.insert(key.clone(), render_expressions(value, &variables));
        }

        let mut output = String::new();

        for mut invocation in invocations {
            // Action-provided env (e.g. an injected token) wins over the overlay
            let mut env = overlay.clone();
            env.extend(invocation.env);
            invocation.env = env;

            if invocation.cwd.is_none() {
                invocation.cwd = Some(ctx.workspace.clone());
            }

            debug!("step {} running: {}", step.id, invocation.display());

            let result = timeout(
                Duration::from_secs(step.timeout_secs),
                self.runner.run(&invocation),
            )
            .await;

            match result {
                Ok(Ok(command_output)) => {
                    output.push_str(&command_output.stdout);

                    if !command_output.success() {
                        // Surface the failing command's console output verbatim
                        let mut error = format!(
                            "`{}` exited with code {}",
                            invocation.display(),
                            command_output.exit_code
                        );
                        if !command_output.stderr.trim().is_empty() {
                            error.push('\n');
                            error.push_str(command_output.stderr.trim_end());
                        }
                        error!("step {} failed: {}", step.id, error);
                        return StepOutcome::Failed {
                            error,
                            exit_code: Some(command_output.exit_code),
                        };
                    }
                }
                Ok(Err(e)) => {
                    error!("step {} could not run: {}", step.id, e);
                    return StepOutcome::Failed {
                        error: e.to_string(),
                        exit_code: None,
                    };
                }
                Err(_) => {
                    error!(
                        "step {} timed out after {}s",
                        step.id, step.timeout_secs
                    );
                    return StepOutcome::Failed {
                        error: format!("timeout after {} seconds", step.timeout_secs),
                        exit_code: None,
                    };
                }
            }
        }

        info!("step {} completed", step.id);
        StepOutcome::Success { output }
    }
}
