//! Step domain model

use crate::actions::ActionRef;
use crate::core::{config::StepConfig, state::StepState};
use regex::Regex;
use std::collections::HashMap;

/// What a step does when it executes
#[derive(Debug, Clone)]
pub enum StepKind {
    /// Shell command executed with `sh -c`
    Run(String),

    /// Invocation of a named external action with a parameter mapping
    Action {
        action: ActionRef,
        with: HashMap<String, String>,
    },
}

/// A single step in a job
///
/// Steps execute strictly in declaration order; the first failure halts the
/// run. There is no retry and no rollback.
#[derive(Debug, Clone)]
pub struct Step {
    /// Step identifier, derived from the name or the position
    pub id: String,

    /// Human-readable step name
    pub name: String,

    /// The work this step performs
    pub kind: StepKind,

    /// Environment overlay visible only to this step's process tree
    pub env: HashMap<String, String>,

    /// Timeout in seconds
    pub timeout_secs: u64,

    /// Runtime state
    pub state: StepState,
}

/// Defaults applied to steps that do not override them
#[derive(Debug, Clone)]
pub struct StepDefaults {
    pub timeout_secs: u64,
}

impl Default for StepDefaults {
    fn default() -> Self {
        Self {
            // Host default; workflows declare no timeout of their own
            timeout_secs: 3600,
        }
    }
}

impl Step {
    /// Create a step from a step config
    ///
    /// `index` is the zero-based position in the job, used for the fallback
    /// id of unnamed steps.
    pub fn from_config(index: usize, config: &StepConfig, defaults: &StepDefaults) -> Self {
        let kind = match (&config.run, &config.uses) {
            (Some(run), None) => StepKind::Run(run.clone()),
            (None, Some(uses)) => StepKind::Action {
                // Config validation guarantees the reference parses
                action: ActionRef::parse(uses).unwrap_or_else(|_| ActionRef::raw(uses)),
                with: config.with.clone(),
            },
            // Config validation guarantees exactly one of run/uses
            _ => StepKind::Run(config.run.clone().unwrap_or_default()),
        };

        let name = config
            .name
            .clone()
            .unwrap_or_else(|| format!("step-{}", index + 1));

        Step {
            id: slugify(&name),
            name,
            kind,
            env: config.env.clone(),
            timeout_secs: config.timeout_secs.unwrap_or(defaults.timeout_secs),
            state: StepState::Pending,
        }
    }
}

/// Derive a step id from its display name
pub fn slugify(name: &str) -> String {
    let mut slug = String::with_capacity(name.len());
    let mut last_dash = true;

    for ch in name.chars() {
        if ch.is_ascii_alphanumeric() {
            slug.push(ch.to_ascii_lowercase());
            last_dash = false;
        } else if !last_dash {
            slug.push('-');
            last_dash = true;
        }
    }

    while slug.ends_with('-') {
        slug.pop();
    }

    if slug.is_empty() {
        "step".to_string()
    } else {
        slug
    }
}

/// Substitute `${{ scope.name }}` expressions with values from `variables`
///
/// Unresolved expressions interpolate as the empty string; the run proceeds
/// and the gap is logged, matching host behavior for absent secrets.
pub fn render_expressions(input: &str, variables: &HashMap<String, String>) -> String {
    let pattern =
        Regex::new(r"\$\{\{\s*([A-Za-z0-9_.-]+)\s*\}\}").expect("expression pattern is valid");

    pattern
        .replace_all(input, |caps: &regex::Captures<'_>| {
            let key = &caps[1];
            match variables.get(key) {
                Some(value) => value.clone(),
                None => {
                    tracing::warn!("expression '{}' is unresolved, interpolating empty", key);
                    String::new()
                }
            }
        })
        .into_owned()
}
