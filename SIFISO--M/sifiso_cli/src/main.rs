use std::{path::PathBuf, time::Duration};

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use serde_json::{json, Value};
use sifiso_audit::ExportFormat;
use sifiso_orchestrator::{AgentTask, SifisoConfig, SifisoRuntime, TaskPriority};
use sifiso_sensors::ForcedState;
use tracing::info;

#[derive(Parser, Debug)]
#[command(name = "sifiso", version, about = "On-device wellness and career agent runtime")]
struct Cli {
    /// TOML configuration; defaults apply when omitted.
    #[arg(long, global = true)]
    config: Option<PathBuf>,
    /// Directory for JSON-lines operational logs.
    #[arg(long, global = true)]
    log_dir: Option<PathBuf>,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Runs the runtime on synthetic sensor data for a bounded time.
    Run {
        /// How long to run.
        #[arg(long, default_value_t = 10)]
        seconds: u64,
        /// Forces a physiological scenario (stressed, calm, sedentary, dehydrated, active).
        #[arg(long)]
        force: Option<ForcedState>,
        /// Writes the audit log here before exiting.
        #[arg(long)]
        export: Option<PathBuf>,
        /// Export format.
        #[arg(long, default_value = "json")]
        format: ExportFormat,
    },
    /// Runs one routine and prints its result.
    Routine {
        /// `morning_routine`, `travel_disruption` or `wellness_intervention`.
        name: String,
        /// JSON object passed as routine context.
        #[arg(long, default_value = "{}")]
        context: String,
    },
    /// Dispatches one task and prints its result.
    Task {
        /// Dotted task type, e.g. `wellness.stress_check`.
        task_type: String,
        /// JSON object of task parameters.
        #[arg(long, default_value = "{}")]
        params: String,
        #[arg(long, value_enum, default_value_t = PriorityArg::Normal)]
        priority: PriorityArg,
    },
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum PriorityArg {
    Low,
    Normal,
    High,
    Critical,
}

impl From<PriorityArg> for TaskPriority {
    fn from(value: PriorityArg) -> Self {
        match value {
            PriorityArg::Low => Self::Low,
            PriorityArg::Normal => Self::Normal,
            PriorityArg::High => Self::High,
            PriorityArg::Critical => Self::Critical,
        }
    }
}

fn parse_object(raw: &str, what: &str) -> Result<Value> {
    let value: Value =
        serde_json::from_str(raw).with_context(|| format!("parsing {what} as JSON"))?;
    if !value.is_object() {
        bail!("{what} must be a JSON object");
    }
    Ok(value)
}

fn load_config(path: Option<&PathBuf>) -> Result<SifisoConfig> {
    match path {
        Some(path) => SifisoConfig::load(path),
        None => Ok(SifisoConfig::default()),
    }
}

fn runtime(cli: &Cli, synthetic: bool) -> Result<SifisoRuntime> {
    let config = load_config(cli.config.as_ref())?;
    let mut builder = SifisoRuntime::builder(config).synthetic(synthetic);
    if let Some(dir) = &cli.log_dir {
        builder = builder.log_dir(dir);
    }
    builder.build()
}

async fn run(
    cli: &Cli,
    seconds: u64,
    force: Option<ForcedState>,
    export: Option<&PathBuf>,
    format: ExportFormat,
) -> Result<()> {
    let runtime = runtime(cli, true)?;
    if let Some(state) = force {
        runtime.stream().force_state(state);
    }
    info!(seconds, "running");
    tokio::time::sleep(Duration::from_secs(seconds)).await;
    runtime.shutdown().await;

    let summary = json!({
        "snapshots": runtime.stream().current().version,
        "audit": runtime.audit().stats(),
        "notifications": runtime
            .notifications()
            .iter()
            .map(|intent| json!({ "title": intent.title, "message": intent.message }))
            .collect::<Vec<_>>(),
        "agents": runtime.orchestrator().agent_statuses(),
    });
    println!("{}", serde_json::to_string_pretty(&summary)?);

    if let Some(path) = export {
        let written = runtime
            .audit()
            .export_to_file(path, format)
            .with_context(|| format!("exporting audit log to {}", path.display()))?;
        info!(path = %path.display(), written, "audit log exported");
    }
    Ok(())
}

async fn routine(cli: &Cli, name: &str, context: &str) -> Result<()> {
    let context = parse_object(context, "routine context")?;
    let runtime = runtime(cli, false)?;
    let result = runtime.orchestrator().orchestrate_routine(name, context).await;
    runtime.shutdown().await;
    println!("{}", serde_json::to_string_pretty(&result)?);
    if !result.success {
        bail!("routine {name} did not succeed: {}", result.message);
    }
    Ok(())
}

async fn task(cli: &Cli, task_type: &str, params: &str, priority: PriorityArg) -> Result<()> {
    let params = parse_object(params, "task parameters")?;
    let runtime = runtime(cli, false)?;
    let mut task = AgentTask::new(task_type)
        .with_priority(priority.into())
        .with_parameters(params);
    runtime.orchestrator().execute_task(&mut task).await;
    runtime.shutdown().await;
    println!("{}", serde_json::to_string_pretty(&task)?);
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();
    match &cli.command {
        Commands::Run {
            seconds,
            force,
            export,
            format,
        } => run(&cli, *seconds, *force, export.as_ref(), *format).await,
        Commands::Routine { name, context } => routine(&cli, name, context).await,
        Commands::Task {
            task_type,
            params,
            priority,
        } => task(&cli, task_type, params, *priority).await,
    }
}
