//! conveyor - a declarative CI workflow runner
//!
//! Workflows are defined in YAML: trigger events, one job bound to an OS
//! image, and an ordered list of steps (shell commands or named actions with
//! parameter and environment mappings). A run executes the steps strictly in
//! declaration order and halts at the first non-zero exit.

pub mod actions;
pub mod cli;
pub mod core;
pub mod execution;
pub mod persistence;
pub mod runner;

// Re-export commonly used types
pub use crate::core::{
    RunContext, RunState, RunStatus, Step, StepKind, StepState, TriggerEvent, Workflow,
    WorkflowConfig,
};
pub use execution::{ExecutionEvent, RunEngine, StepExecutor, StepOutcome};
pub use runner::{CommandInvocation, CommandOutput, CommandRunner, ProcessRunner, RunnerError};
