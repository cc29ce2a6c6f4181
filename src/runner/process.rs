//! Real process execution over tokio

use crate::runner::{CommandInvocation, CommandOutput, CommandRunner, RunnerError};
use async_trait::async_trait;
use std::process::Stdio;
use tokio::process::Command;
use tracing::debug;

/// Executes invocations as local processes
///
/// The invocation's environment is applied as an overlay on the inherited
/// environment, so it is visible to the spawned process tree and nowhere
/// else.
#[derive(Debug, Clone, Default)]
pub struct ProcessRunner;

impl ProcessRunner {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl CommandRunner for ProcessRunner {
    async fn run(&self, invocation: &CommandInvocation) -> Result<CommandOutput, RunnerError> {
        debug!("spawning: {}", invocation.display());

        let mut command = Command::new(&invocation.program);
        command
            .args(&invocation.args)
            .envs(&invocation.env)
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        if let Some(cwd) = &invocation.cwd {
            command.current_dir(cwd);
        }

        let output = command.output().await.map_err(|e| RunnerError::Spawn {
            program: invocation.program.clone(),
            source: e,
        })?;

        let exit_code = output.status.code().unwrap_or(-1);
        debug!("'{}' exited with code {}", invocation.program, exit_code);

        Ok(CommandOutput {
            exit_code,
            stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
            stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
        })
    }
}
