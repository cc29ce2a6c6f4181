//! Run context - per-run environment, secrets, and step outputs

use crate::core::config::TriggerEvent;
use std::collections::HashMap;
use std::fmt;
use std::path::PathBuf;

/// Execution context for one workflow run
///
/// Instantiated per trigger event and discarded with the run. Secrets are
/// held here and only reach a step through explicit expression
/// interpolation or an action's parameter mapping.
#[derive(Clone)]
pub struct RunContext {
    /// The event that caused this run
    pub event: TriggerEvent,

    /// Ephemeral working directory steps execute in
    pub workspace: PathBuf,

    /// Environment values available as `${{ env.NAME }}`
    pub env: HashMap<String, String>,

    /// Outputs of completed steps (step id -> captured stdout)
    pub step_outputs: HashMap<String, String>,

    /// The step currently executing (if any)
    pub current_step_id: Option<String>,

    secrets: HashMap<String, String>,
}

impl RunContext {
    /// Create a new context for an event in a workspace
    pub fn new(event: TriggerEvent, workspace: PathBuf) -> Self {
        Self {
            event,
            workspace,
            env: HashMap::new(),
            step_outputs: HashMap::new(),
            current_step_id: None,
            secrets: HashMap::new(),
        }
    }

    /// Set an environment value
    pub fn set_env(&mut self, key: String, value: String) {
        self.env.insert(key, value);
    }

    /// Register a secret
    pub fn add_secret(&mut self, key: String, value: String) {
        self.secrets.insert(key, value);
    }

    /// Look up a secret by name
    pub fn secret(&self, key: &str) -> Option<&String> {
        self.secrets.get(key)
    }

    /// Record the output of a completed step
    pub fn set_step_output(&mut self, step_id: &str, output: String) {
        self.step_outputs.insert(step_id.to_string(), output);
    }

    /// Get the output of a completed step
    pub fn get_step_output(&self, step_id: &str) -> Option<&String> {
        self.step_outputs.get(step_id)
    }

    /// All variables available for expression rendering
    ///
    /// Keys follow the `scope.name` shape used in `${{ ... }}` expressions.
    pub fn rendering_variables(&self) -> HashMap<String, String> {
        let mut vars = HashMap::new();

        for (key, value) in &self.env {
            vars.insert(format!("env.{}", key), value.clone());
        }

        for (key, value) in &self.secrets {
            vars.insert(format!("secrets.{}", key), value.clone());
        }

        for (step_id, output) in &self.step_outputs {
            vars.insert(format!("steps.{}.output", step_id), output.clone());
        }

        vars.insert("event".to_string(), self.event.as_str().to_string());
        vars.insert(
            "workspace".to_string(),
            self.workspace.display().to_string(),
        );

        vars
    }
}

// Secrets stay out of logs and debug dumps.
impl fmt::Debug for RunContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RunContext")
            .field("event", &self.event)
            .field("workspace", &self.workspace)
            .field("env", &self.env)
            .field("step_outputs", &self.step_outputs)
            .field("current_step_id", &self.current_step_id)
            .field("secrets", &format_args!("<{} redacted>", self.secrets.len()))
            .finish()
    }
}
