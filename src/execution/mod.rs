//! Workflow run execution

pub mod engine;
pub mod executor;

pub use engine::{EventHandler, ExecutionEvent, RunEngine};
pub use executor::{StepExecutor, StepOutcome};
