//! Command execution seam
//!
//! Steps resolve to one or more command invocations; the trait here is the
//! boundary between the engine and the host machine, so tests can substitute
//! a scripted runner for real processes.

pub mod process;

use async_trait::async_trait;
use std::collections::HashMap;
use std::path::PathBuf;
use thiserror::Error;

pub use process::ProcessRunner;

/// Error types for command execution
#[derive(Debug, Error)]
pub enum RunnerError {
    #[error("failed to spawn '{program}': {source}")]
    Spawn {
        program: String,
        #[source]
        source: std::io::Error,
    },

    #[error("internal error: {0}")]
    Internal(String),
}

/// One command to execute: program, arguments, environment overlay, cwd
#[derive(Debug, Clone)]
pub struct CommandInvocation {
    pub program: String,
    pub args: Vec<String>,
    /// Overlay on top of the inherited process environment
    pub env: HashMap<String, String>,
    pub cwd: Option<PathBuf>,
}

impl CommandInvocation {
    /// Create an invocation of a program with no arguments
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
            env: HashMap::new(),
            cwd: None,
        }
    }

    /// Append an argument
    pub fn arg(mut self, arg: impl Into<String>) -> Self {
        self.args.push(arg.into());
        self
    }

    /// Append several arguments
    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args.extend(args.into_iter().map(Into::into));
        self
    }

    /// Add an environment variable to the overlay
    pub fn env_var(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.env.insert(key.into(), value.into());
        self
    }

    /// A shell step: `sh -c <script>`
    pub fn shell(script: &str) -> Self {
        Self::new("sh").arg("-c").arg(script)
    }

    /// Render the command line for logs and error messages
    pub fn display(&self) -> String {
        let mut parts = vec![self.program.clone()];
        parts.extend(self.args.iter().map(|a| quote_arg(a)));
        parts.join(" ")
    }
}

/// Captured result of a finished command
#[derive(Debug, Clone)]
pub struct CommandOutput {
    pub exit_code: i32,
    pub stdout: String,
    pub stderr: String,
}

impl CommandOutput {
    /// Whether the command exited zero
    pub fn success(&self) -> bool {
        self.exit_code == 0
    }

    /// A successful empty output (for steps that resolve to no commands)
    pub fn empty() -> Self {
        Self {
            exit_code: 0,
            stdout: String::new(),
            stderr: String::new(),
        }
    }
}

/// Trait for command execution - allows for different implementations
#[async_trait]
pub trait CommandRunner: Send + Sync {
    /// Execute one command to completion and capture its output
    async fn run(&self, invocation: &CommandInvocation) -> Result<CommandOutput, RunnerError>;
}

/// Escape a value for use inside single quotes.
/// Replaces `'` with `'\''` (end quote, escaped quote, start quote).
fn escape_single_quote_content(value: &str) -> String {
    value.replace('\'', "'\\''")
}

/// Quote a single argument for display as a shell command line.
/// - Empty strings become `''`
/// - Strings with shell metacharacters are wrapped in single quotes
/// - Embedded single quotes are escaped
pub fn quote_arg(arg: &str) -> String {
    if arg.is_empty() {
        return "''".to_string();
    }

    // Characters that require quoting
    const SHELL_META: &[char] = &[
        ' ', '\t', '\n', '\'', '"', '\\', '$', '`', '!', '*', '?', '[', ']', '(', ')', '{', '}',
        '<', '>', '|', '&', ';', '#', '~',
    ];

    if !arg.contains(SHELL_META) {
        return arg.to_string();
    }

    format!("'{}'", escape_single_quote_content(arg))
}
