//! Builtin action registry
//!
//! `uses:` steps name an external action; the registry resolves a known
//! action plus its parameter mapping into concrete command invocations.
//! Unknown actions are rejected at validation time, not at run time.

use crate::core::RunContext;
use crate::runner::CommandInvocation;
use std::collections::HashMap;
use thiserror::Error;
use tracing::warn;

/// Error types for action resolution
#[derive(Debug, Error)]
pub enum ActionError {
    #[error("malformed action reference '{0}'")]
    Malformed(String),

    #[error("unknown action '{0}'")]
    Unknown(String),
}

/// A parsed `name@version` action reference
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ActionRef {
    name: String,
    version: Option<String>,
}

impl ActionRef {
    /// Parse an action reference like `checkout@v2`
    pub fn parse(spec: &str) -> Result<Self, ActionError> {
        let (name, version) = match spec.split_once('@') {
            Some((name, version)) => (name, Some(version)),
            None => (spec, None),
        };

        if name.trim().is_empty() {
            return Err(ActionError::Malformed(spec.to_string()));
        }
        if let Some(version) = version {
            if version.trim().is_empty() {
                return Err(ActionError::Malformed(spec.to_string()));
            }
        }

        Ok(Self {
            name: name.to_string(),
            version: version.map(|v| v.to_string()),
        })
    }

    /// An unparsed reference, kept verbatim
    pub fn raw(spec: &str) -> Self {
        Self {
            name: spec.to_string(),
            version: None,
        }
    }

    /// Full action name (possibly `owner/name`)
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Pinned version, if any
    pub fn version(&self) -> Option<&str> {
        self.version.as_deref()
    }

    /// Name without any `owner/` prefix
    pub fn short_name(&self) -> &str {
        self.name.rsplit('/').next().unwrap_or(&self.name)
    }
}

/// Whether an action name resolves to a builtin
pub fn is_builtin(name: &str) -> bool {
    let short = name.rsplit('/').next().unwrap_or(name);
    matches!(short, "checkout" | "clippy-check")
}

/// Resolve an action and its (already rendered) parameters into commands
///
/// The returned list may be empty: a `checkout` with no repository or ref on
/// an already-provisioned workspace has nothing to do.
pub fn resolve(
    action: &ActionRef,
    with: &HashMap<String, String>,
    ctx: &RunContext,
) -> Result<Vec<CommandInvocation>, ActionError> {
    match action.short_name() {
        "checkout" => Ok(resolve_checkout(with, ctx)),
        "clippy-check" => Ok(resolve_clippy_check(with)),
        other => Err(ActionError::Unknown(other.to_string())),
    }
}

/// Acquire source at the triggering revision
fn resolve_checkout(with: &HashMap<String, String>, ctx: &RunContext) -> Vec<CommandInvocation> {
    let mut invocations = Vec::new();

    if let Some(repository) = with.get("repository").filter(|r| !r.is_empty()) {
        invocations.push(
            CommandInvocation::new("git")
                .arg("clone")
                .arg(repository)
                .arg(ctx.workspace.display().to_string()),
        );
    }

    if let Some(reference) = with.get("ref").filter(|r| !r.is_empty()) {
        invocations.push(CommandInvocation::new("git").arg("checkout").arg(reference));
    }

    invocations
}

/// Static-analysis lint, optionally authenticated with a repository token
fn resolve_clippy_check(with: &HashMap<String, String>) -> Vec<CommandInvocation> {
    let mut invocation = CommandInvocation::new("cargo").arg("clippy");

    if let Some(args) = with.get("args") {
        invocation = invocation.args(args.split_whitespace().map(str::to_string));
    }

    match with.get("token").map(String::as_str) {
        Some(token) if !token.is_empty() => {
            invocation = invocation.env_var("GITHUB_TOKEN", token);
        }
        Some(_) => {
            // Absent credential is not fatal; only lint findings fail the run
            warn!("clippy-check token resolved empty, running unauthenticated");
        }
        None => {}
    }

    vec![invocation]
}
