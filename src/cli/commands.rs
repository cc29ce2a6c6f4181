//! CLI command definitions

use crate::core::TriggerEvent;
use clap::{Args, ValueEnum};
use std::path::PathBuf;

/// Trigger event argument
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum TriggerEventArg {
    Push,
    #[value(name = "pull_request")]
    PullRequest,
}

impl From<TriggerEventArg> for TriggerEvent {
    fn from(arg: TriggerEventArg) -> Self {
        match arg {
            TriggerEventArg::Push => TriggerEvent::Push,
            TriggerEventArg::PullRequest => TriggerEvent::PullRequest,
        }
    }
}

/// Run a workflow
#[derive(Debug, Args, Clone)]
pub struct RunCommand {
    /// Path to workflow YAML file
    #[arg(short, long)]
    pub file: String,

    /// Trigger event to simulate
    #[arg(short, long, value_enum, default_value_t = TriggerEventArg::Push)]
    pub event: TriggerEventArg,

    /// Secrets for `${{ secrets.* }}` references (KEY=VALUE)
    #[arg(long, value_parser = parse_key_value)]
    pub secret: Vec<(String, String)>,

    /// Extra environment values for `${{ env.* }}` references (KEY=VALUE)
    #[arg(long = "env", value_parser = parse_key_value)]
    pub env: Vec<(String, String)>,

    /// Working directory for the run (defaults to the current directory)
    #[arg(short, long)]
    pub workspace: Option<PathBuf>,

    /// Don't save the run to history
    #[arg(long)]
    pub no_history: bool,
}

/// Validate a workflow configuration
#[derive(Debug, Args, Clone)]
pub struct ValidateCommand {
    /// Path to workflow YAML file
    #[arg(short, long)]
    pub file: String,

    /// Output in JSON format
    #[arg(long)]
    pub json: bool,
}

/// List workflows with recorded runs
#[derive(Debug, Args, Clone)]
pub struct ListCommand {
    /// Show run counts
    #[arg(long)]
    pub with_counts: bool,

    /// Output in JSON format
    #[arg(long)]
    pub json: bool,
}

/// Show run history
#[derive(Debug, Args, Clone)]
pub struct HistoryCommand {
    /// Workflow name to filter by
    #[arg(short, long)]
    pub workflow: Option<String>,

    /// Specific run ID to show
    #[arg(short, long)]
    pub run_id: Option<String>,

    /// Maximum number of runs to show
    #[arg(short, long, default_value_t = 20)]
    pub limit: usize,

    /// Output in JSON format
    #[arg(long)]
    pub json: bool,

    /// Show full run details
    #[arg(long)]
    pub details: bool,
}

/// Parse a KEY=VALUE pair
fn parse_key_value(s: &str) -> Result<(String, String), String> {
    match s.split_once('=') {
        Some((key, value)) if !key.is_empty() => Ok((key.to_string(), value.to_string())),
        _ => Err(format!("expected KEY=VALUE, got '{}'", s)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_key_value() {
        assert_eq!(
            parse_key_value("GITHUB_TOKEN=abc").unwrap(),
            ("GITHUB_TOKEN".to_string(), "abc".to_string())
        );
        assert_eq!(
            parse_key_value("KEY=a=b").unwrap(),
            ("KEY".to_string(), "a=b".to_string())
        );
        assert!(parse_key_value("novalue").is_err());
        assert!(parse_key_value("=empty").is_err());
    }

    #[test]
    fn test_trigger_event_arg_conversion() {
        assert_eq!(TriggerEvent::from(TriggerEventArg::Push), TriggerEvent::Push);
        assert_eq!(
            TriggerEvent::from(TriggerEventArg::PullRequest),
            TriggerEvent::PullRequest
        );
    }
}
