//! Workflow configuration from YAML

use crate::core::Workflow;
use anyhow::Result;
use regex::Regex;
use serde::{Deserialize, Serialize};
use serde_yaml::Value;
use std::collections::{BTreeSet, HashMap};
use std::fmt;
use std::path::Path;
use std::str::FromStr;

/// Trigger events a workflow responds to
///
/// Unfiltered: a workflow fires for any revision of a subscribed event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TriggerEvent {
    Push,
    PullRequest,
}

impl TriggerEvent {
    pub fn as_str(&self) -> &'static str {
        match self {
            TriggerEvent::Push => "push",
            TriggerEvent::PullRequest => "pull_request",
        }
    }
}

impl fmt::Display for TriggerEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TriggerEvent {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "push" => Ok(TriggerEvent::Push),
            "pull_request" => Ok(TriggerEvent::PullRequest),
            other => Err(format!("unknown trigger event '{}'", other)),
        }
    }
}

/// Top-level workflow configuration loaded from YAML
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkflowConfig {
    /// Workflow name
    pub name: String,

    /// Trigger events - a single event name or a sequence of them
    #[serde(rename = "on")]
    on: Value,

    /// Jobs keyed by job id (exactly one job is supported)
    pub jobs: HashMap<String, JobConfig>,
}

/// Job configuration as defined in YAML
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JobConfig {
    /// OS image label the job is bound to (e.g. "ubuntu-latest")
    #[serde(rename = "runs-on")]
    pub runs_on: String,

    /// Environment visible to every step of the job
    #[serde(default)]
    pub env: HashMap<String, String>,

    /// Ordered step sequence
    pub steps: Vec<StepConfig>,
}

/// Step configuration as defined in YAML
///
/// Exactly one of `run` and `uses` must be present.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StepConfig {
    /// Human-readable step name
    #[serde(default)]
    pub name: Option<String>,

    /// Named external action to invoke (`name@version`)
    #[serde(default)]
    pub uses: Option<String>,

    /// Shell command to execute
    #[serde(default)]
    pub run: Option<String>,

    /// Parameter mapping for `uses` steps
    #[serde(default)]
    pub with: HashMap<String, String>,

    /// Environment overlay visible only to this step's process tree
    #[serde(default)]
    pub env: HashMap<String, String>,

    /// Timeout for this step (host default applies when absent)
    #[serde(default)]
    pub timeout_secs: Option<u64>,
}

impl WorkflowConfig {
    /// Load workflow configuration from a YAML file
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_yaml(&content)
    }

    /// Parse workflow configuration from a YAML string
    pub fn from_yaml(yaml: &str) -> Result<Self> {
        let config: WorkflowConfig = serde_yaml::from_str(yaml)?;
        config.validate()?;
        Ok(config)
    }

    /// Parse the `on:` field into trigger events
    ///
    /// Accepts a single scalar (`on: push`) or a sequence
    /// (`on: [push, pull_request]`).
    pub fn triggers(&self) -> Result<Vec<TriggerEvent>> {
        let mut events = Vec::new();

        match &self.on {
            Value::String(s) => {
                events.push(TriggerEvent::from_str(s).map_err(anyhow::Error::msg)?);
            }
            Value::Sequence(seq) => {
                for item in seq {
                    let name = item
                        .as_str()
                        .ok_or_else(|| anyhow::anyhow!("trigger event must be a string"))?;
                    events.push(TriggerEvent::from_str(name).map_err(anyhow::Error::msg)?);
                }
            }
            other => {
                anyhow::bail!(
                    "'on' must be an event name or a sequence of event names, got {:?}",
                    other
                );
            }
        }

        Ok(events)
    }

    /// Validate the workflow configuration
    pub fn validate(&self) -> Result<()> {
        let triggers = self.triggers()?;
        if triggers.is_empty() {
            anyhow::bail!("workflow '{}' declares no trigger events", self.name);
        }

        // The data model binds one job to one execution environment
        if self.jobs.is_empty() {
            anyhow::bail!("workflow '{}' declares no jobs", self.name);
        }
        if self.jobs.len() > 1 {
            anyhow::bail!(
                "workflow '{}' declares {} jobs; exactly one is supported",
                self.name,
                self.jobs.len()
            );
        }

        let (job_id, job) = self.jobs.iter().next().expect("one job");

        if job.runs_on.trim().is_empty() {
            anyhow::bail!("job '{}' has an empty runs-on label", job_id);
        }
        if job.steps.is_empty() {
            anyhow::bail!("job '{}' has no steps", job_id);
        }

        let mut seen_names = std::collections::HashSet::new();
        for (index, step) in job.steps.iter().enumerate() {
            match (&step.run, &step.uses) {
                (Some(_), Some(_)) => {
                    anyhow::bail!(
                        "step {} of job '{}' declares both 'run' and 'uses'",
                        index + 1,
                        job_id
                    );
                }
                (None, None) => {
                    anyhow::bail!(
                        "step {} of job '{}' declares neither 'run' nor 'uses'",
                        index + 1,
                        job_id
                    );
                }
                (Some(run), None) => {
                    if run.trim().is_empty() {
                        anyhow::bail!("step {} of job '{}' has an empty command", index + 1, job_id);
                    }
                    if !step.with.is_empty() {
                        anyhow::bail!(
                            "step {} of job '{}' has 'with' parameters but no 'uses'",
                            index + 1,
                            job_id
                        );
                    }
                }
                (None, Some(uses)) => {
                    let action = crate::actions::ActionRef::parse(uses)?;
                    if !crate::actions::is_builtin(action.name()) {
                        anyhow::bail!(
                            "step {} of job '{}' uses unknown action '{}'",
                            index + 1,
                            job_id,
                            action.name()
                        );
                    }
                }
            }

            if let Some(name) = &step.name {
                if !seen_names.insert(name.clone()) {
                    anyhow::bail!("duplicate step name '{}' in job '{}'", name, job_id);
                }
            }
        }

        Ok(())
    }

    /// Names of secrets referenced anywhere in the step definitions
    ///
    /// Used to resolve the secret surface before a run starts.
    pub fn referenced_secrets(&self) -> Vec<String> {
        let pattern = Regex::new(r"\$\{\{\s*secrets\.([A-Za-z0-9_]+)\s*\}\}")
            .expect("secret reference pattern is valid");
        let mut names = BTreeSet::new();

        for job in self.jobs.values() {
            for step in &job.steps {
                let mut scan = |text: &str| {
                    for capture in pattern.captures_iter(text) {
                        names.insert(capture[1].to_string());
                    }
                };

                if let Some(run) = &step.run {
                    scan(run);
                }
                for value in step.with.values() {
                    scan(value);
                }
                for value in step.env.values() {
                    scan(value);
                }
            }
        }

        names.into_iter().collect()
    }

    /// Convert the config to a Workflow domain model
    pub fn to_workflow(&self) -> Result<Workflow> {
        Workflow::from_config(self)
    }
}
