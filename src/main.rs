use anyhow::{Context, Result};
use conveyor::cli::commands::{HistoryCommand, ListCommand, RunCommand, ValidateCommand};
use conveyor::cli::output::*;
use conveyor::cli::{Cli, Command};
use conveyor::core::{RunContext, RunStatus, StepState, TriggerEvent, WorkflowConfig};
use conveyor::execution::ExecutionEvent;
use conveyor::persistence::{
    create_summary, InMemoryPersistence, PersistenceBackend, RunSummary, SqliteRunStore,
};
use conveyor::runner::ProcessRunner;
use conveyor::RunEngine;
use std::sync::Arc;
use tracing::{warn, Level};
use tracing_subscriber::FmtSubscriber;

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::from_args();

    // Initialize logging
    let log_level = if cli.verbose { Level::DEBUG } else { Level::WARN };
    let subscriber = FmtSubscriber::builder()
        .with_max_level(log_level)
        .finish();
    tracing::subscriber::set_global_default(subscriber)
        .context("Failed to set logging subscriber")?;

    match &cli.command {
        Command::Run(cmd) => run_workflow(cmd, cli.clone()).await?,
        Command::Validate(cmd) => validate_workflow(cmd)?,
        Command::List(cmd) => list_workflows(cmd).await?,
        Command::History(cmd) => show_history(cmd).await?,
    }

    Ok(())
}

async fn run_workflow(cmd: &RunCommand, cli: Cli) -> Result<()> {
    let config =
        WorkflowConfig::from_file(&cmd.file).context("Failed to load workflow config")?;

    println!("{} Loaded workflow: {}", INFO, style(&config.name).bold());

    let mut workflow = config.to_workflow()?;
    let event: TriggerEvent = cmd.event.into();

    let workspace = match &cmd.workspace {
        Some(path) => path.clone(),
        None => std::env::current_dir().context("Failed to resolve current directory")?,
    };
    let mut ctx = RunContext::new(event, workspace);

    // Job env first, CLI overrides on top
    for (key, value) in &workflow.job.env {
        ctx.set_env(key.clone(), value.clone());
    }
    for (key, value) in &cmd.env {
        ctx.set_env(key.clone(), value.clone());
        println!(
            "{} Env override: {} = {}",
            INFO,
            style(key).cyan(),
            style(value).dim()
        );
    }

    // Resolve the secret surface: --secret flags first, process env second
    for name in config.referenced_secrets() {
        let provided = cmd.secret.iter().find(|(key, _)| *key == name);
        match provided {
            Some((_, value)) => ctx.add_secret(name, value.clone()),
            None => match std::env::var(&name) {
                Ok(value) => ctx.add_secret(name, value),
                Err(_) => warn!("secret '{}' is referenced but not provided", name),
            },
        }
    }
    for (key, value) in &cmd.secret {
        ctx.add_secret(key.clone(), value.clone());
    }

    // Set up persistence
    let store: Arc<dyn PersistenceBackend> = if cmd.no_history {
        Arc::new(InMemoryPersistence::new())
    } else {
        Arc::new(SqliteRunStore::with_default_path().await?)
    };

    let engine = RunEngine::new(ProcessRunner::new());

    // Console reporting of per-step and overall status
    let progress = create_progress_bar(workflow.job.steps.len());
    let bar = progress.clone();
    let stream = cli.stream;
    engine.add_event_handler(move |event| {
        match &event {
            ExecutionEvent::StepOutput { output, .. } => {
                if stream && !output.trim().is_empty() {
                    bar.println(format_output(output, 20));
                }
            }
            other => {
                bar.println(format_execution_event(other));
                if matches!(
                    other,
                    ExecutionEvent::StepCompleted { .. }
                        | ExecutionEvent::StepFailed { .. }
                        | ExecutionEvent::StepSkipped { .. }
                ) {
                    bar.inc(1);
                }
            }
        }
    });

    println!();
    let result = engine.execute(&mut workflow, &mut ctx).await;
    progress.finish_and_clear();

    if let Err(e) = result {
        println!("{} {}", CROSS, style(&e).red());
        std::process::exit(1);
    }

    // Save to history
    if !cmd.no_history {
        let summary = create_summary(&workflow, event);
        store.save_run(&summary).await?;
        println!(
            "\n{} Run saved to history (ID: {})",
            INFO,
            style(&summary.run_id.to_string()[..8]).dim()
        );
    }

    // Exit contract: pass iff every step exited zero
    if workflow.state.status == RunStatus::Completed {
        println!(
            "\n{} {} {}",
            CHECK,
            style(&workflow.name).bold(),
            style("passed").green()
        );
        Ok(())
    } else {
        if let Some(step) = workflow.failed_step() {
            if let StepState::Failed { error, .. } = &step.state {
                println!(
                    "\n{} {} failed at {}:\n{}",
                    CROSS,
                    style(&workflow.name).bold(),
                    style(&step.id).red(),
                    error
                );
            }
        }
        std::process::exit(1);
    }
}

fn validate_workflow(cmd: &ValidateCommand) -> Result<()> {
    println!("{} Validating workflow...", INFO);

    match WorkflowConfig::from_file(&cmd.file) {
        Ok(config) => {
            println!("{} Workflow configuration is valid!", CHECK);
            println!("  Name: {}", style(&config.name).bold());
            let triggers = config
                .triggers()?
                .iter()
                .map(|t| t.to_string())
                .collect::<Vec<_>>()
                .join(", ");
            println!("  Triggers: {}", style(triggers).cyan());
            for (job_id, job) in &config.jobs {
                println!(
                    "  Job '{}': {} steps on {}",
                    style(job_id).bold(),
                    style(job.steps.len()).cyan(),
                    style(&job.runs_on).dim()
                );
            }

            if cmd.json {
                let json = serde_json::to_string_pretty(&config)?;
                println!("\n{}", json);
            }
            Ok(())
        }
        Err(e) => {
            println!("{} Validation failed:", CROSS);
            println!("  {}", style(e).red());
            std::process::exit(1);
        }
    }
}

async fn list_workflows(cmd: &ListCommand) -> Result<()> {
    let store = SqliteRunStore::with_default_path().await?;
    let workflows = store.list_workflows().await?;

    if workflows.is_empty() {
        println!("{} No workflows found in history", INFO);
        return Ok(());
    }

    println!("{} Workflows in history:", INFO);

    for workflow_name in &workflows {
        let runs = store.list_runs(workflow_name).await?;

        if cmd.with_counts {
            let passed = runs
                .iter()
                .filter(|r| r.status == RunStatus::Completed)
                .count();
            let failed = runs.iter().filter(|r| r.status == RunStatus::Failed).count();
            println!(
                "  {} ({} runs: {} passed, {} failed)",
                style(workflow_name).bold(),
                style(runs.len()).cyan(),
                style(passed).green(),
                style(failed).red()
            );
        } else {
            println!("  {}", style(workflow_name).bold());
        }
    }

    if cmd.json {
        let mut json_data = Vec::new();
        for workflow in &workflows {
            let runs = store.list_runs(workflow).await.ok();
            json_data.push(serde_json::json!({
                "name": workflow,
                "run_count": runs.as_ref().map(|r| r.len()).unwrap_or(0)
            }));
        }
        let data = serde_json::json!({ "workflows": json_data });
        println!("\n{}", serde_json::to_string_pretty(&data)?);
    }

    Ok(())
}

async fn show_history(cmd: &HistoryCommand) -> Result<()> {
    let store = SqliteRunStore::with_default_path().await?;

    // If a specific run is requested
    if let Some(run_id_str) = &cmd.run_id {
        let run_id = uuid::Uuid::parse_str(run_id_str).context("Invalid run ID format")?;
        match store.load_run(run_id).await? {
            Some(summary) => print_run_details(&summary, cmd.details)?,
            None => println!("{} Run not found", WARN),
        }
        return Ok(());
    }

    // List runs for one workflow or all
    let runs = if let Some(workflow_name) = &cmd.workflow {
        store.list_runs(workflow_name).await?
    } else {
        let workflows = store.list_workflows().await?;
        let mut all_runs = Vec::new();
        for workflow in &workflows {
            all_runs.extend(store.list_runs(workflow).await?);
        }
        all_runs.sort_by(|a, b| b.started_at.cmp(&a.started_at));
        all_runs
    };
    let runs: Vec<_> = runs.into_iter().take(cmd.limit).collect();

    if runs.is_empty() {
        println!("{} No runs found", INFO);
        return Ok(());
    }

    println!("{} Run history (showing latest {}):", INFO, cmd.limit);

    if cmd.json {
        let data = serde_json::json!({ "runs": runs });
        println!("{}", serde_json::to_string_pretty(&data)?);
    } else {
        for summary in &runs {
            println!("  {}", format_run_summary(summary));
        }
    }

    Ok(())
}

fn print_run_details(summary: &RunSummary, verbose: bool) -> Result<()> {
    println!("{} Run Details", INFO);
    println!("  ID: {}", style(summary.run_id).cyan());
    println!("  Workflow: {}", style(&summary.workflow_name).bold());
    println!("  Event: {}", style(summary.event).cyan());
    println!("  Status: {}", format_status(summary.status));
    println!("  Started: {}", style(summary.started_at.to_rfc3339()).dim());
    if let Some(completed) = summary.completed_at {
        println!("  Completed: {}", style(completed.to_rfc3339()).dim());
        if let Ok(duration) = completed.signed_duration_since(summary.started_at).to_std() {
            println!("  Duration: {}", style(format_duration(duration)).dim());
        }
    }
    println!(
        "  Progress: {} ({}/{})",
        style(format!("{:.0}%", summary.progress * 100.0)).cyan(),
        summary.completed_steps,
        summary.total_steps
    );

    if verbose {
        println!("\n  {}", style("Full details:").bold());
        let json = serde_json::to_string_pretty(summary)?;
        for line in json.lines() {
            println!("    {}", line);
        }
    }

    Ok(())
}

fn format_duration(duration: std::time::Duration) -> String {
    let secs = duration.as_secs();
    if secs < 60 {
        format!("{}s", secs)
    } else if secs < 3600 {
        format!("{}m {}s", secs / 60, secs % 60)
    } else {
        format!("{}h {}m {}s", secs / 3600, (secs % 3600) / 60, secs % 60)
    }
}
