mod config;
mod engine;
mod setup;
mod telemetry;

use anyhow::{anyhow, Context, Result};
use chrono::{DateTime, Utc};
use clap::{Parser, Subcommand};
use task_core::models::{
    CompleteOptions, FeedbackInput, FileRef, NewTask, SuccessCriterion, TaskFilter, TaskPatch,
    TaskPriority, TaskStatus,
};
use task_core::{TaskError, TaskId};
use task_store::SchemaRepository;
use tracing::info;

use crate::config::ProcessConfig;
use crate::engine::parse_metrics_period;
use crate::setup::{initialize_app, save_feature_config};
use crate::telemetry::{init_telemetry, report_error, LogFormat};

#[derive(Parser)]
#[command(name = "taskctl")]
#[command(about = "Dependency-aware task coordination for multi-agent teams")]
#[command(version = env!("CARGO_PKG_VERSION"))]
struct Cli {
    /// Output format for read commands that support it.
    #[arg(long, global = true, default_value = "human")]
    format: OutputFormat,

    #[command(subcommand)]
    command: Command,
}

#[derive(Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
enum OutputFormat {
    Human,
    Json,
}

#[derive(Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
enum ExportFormat {
    Json,
    Markdown,
}

#[derive(Subcommand)]
enum Command {
    /// Create the project state directory and an empty database.
    Init,

    /// Create a task.
    Add {
        title: String,
        #[arg(long)]
        description: Option<String>,
        #[arg(long, value_enum)]
        priority: Option<CliPriority>,
        #[arg(long)]
        assignee: Option<String>,
        #[arg(long = "depends-on")]
        depends_on: Vec<String>,
        #[arg(long = "file")]
        file: Vec<String>,
        #[arg(long)]
        criteria: Option<String>,
        #[arg(long)]
        deadline: Option<String>,
        #[arg(long = "estimated-hours")]
        estimated_hours: Option<f64>,
    },

    /// List tasks, optionally filtered.
    List {
        #[arg(long)]
        status: Option<CliStatus>,
        #[arg(long)]
        assignee: Option<String>,
        #[arg(long = "has-deps")]
        has_deps: bool,
        #[arg(long)]
        priority: Option<CliPriority>,
    },

    /// Show a single task.
    Show { id: String },

    /// Update a task's status or assignee.
    Update {
        id: String,
        #[arg(long)]
        status: Option<CliStatus>,
        #[arg(long)]
        assignee: Option<String>,
    },

    /// Mark a task completed.
    Complete {
        id: String,
        #[arg(long)]
        validate: bool,
        #[arg(long = "actual-hours")]
        actual_hours: Option<f64>,
        #[arg(long)]
        summary: Option<String>,
        #[arg(long = "impact-review")]
        impact_review: bool,
    },

    /// Delete a task with no incoming dependency edges.
    Delete { id: String },

    /// Assign a task to an agent.
    Assign { id: String, agent: String },

    /// Record a progress note on a task.
    Progress { id: String, message: String },

    /// Record feedback on a completed task.
    Feedback {
        id: String,
        #[arg(long)]
        quality: Option<i32>,
        #[arg(long)]
        timeliness: Option<i32>,
        #[arg(long)]
        note: Option<String>,
    },

    /// Aggregate metrics over completed tasks.
    Metrics {
        #[arg(long)]
        feedback: bool,
        #[arg(long = "time-tracking")]
        time_tracking: bool,
        #[arg(long)]
        telemetry: bool,
        #[arg(long)]
        period: Option<String>,
    },

    /// Print this agent's unread notifications.
    Watch,

    /// Record a discovery on a task and broadcast it.
    Discover {
        id: String,
        message: String,
        #[arg(long)]
        tags: Option<String>,
    },

    /// Dump every task as JSON or a Markdown report.
    Export {
        #[arg(long, value_enum, default_value = "json")]
        format: ExportFormat,
    },

    /// Inspect or apply the database schema migration state.
    Migrate {
        #[arg(long)]
        status: bool,
        #[arg(long)]
        apply: bool,
        #[arg(long)]
        rollback: bool,
    },

    /// View or change the feature-toggle configuration.
    Config {
        #[arg(long)]
        show: bool,
        #[arg(long)]
        enable: Option<String>,
        #[arg(long)]
        disable: Option<String>,
        #[arg(long = "minimal-mode")]
        minimal_mode: bool,
        #[arg(long)]
        reset: bool,
    },

    /// Print the current critical path (longest chain of active work).
    CriticalPath,
}

#[derive(Clone, Copy, clap::ValueEnum)]
enum CliPriority {
    Low,
    Medium,
    High,
    Critical,
}

impl From<CliPriority> for TaskPriority {
    fn from(value: CliPriority) -> Self {
        match value {
            CliPriority::Low => TaskPriority::Low,
            CliPriority::Medium => TaskPriority::Medium,
            CliPriority::High => TaskPriority::High,
            CliPriority::Critical => TaskPriority::Critical,
        }
    }
}

#[derive(Clone, Copy, clap::ValueEnum)]
#[value(rename_all = "snake_case")]
enum CliStatus {
    Pending,
    InProgress,
    Completed,
    Blocked,
    Cancelled,
}

impl From<CliStatus> for TaskStatus {
    fn from(value: CliStatus) -> Self {
        match value {
            CliStatus::Pending => TaskStatus::Pending,
            CliStatus::InProgress => TaskStatus::InProgress,
            CliStatus::Completed => TaskStatus::Completed,
            CliStatus::Blocked => TaskStatus::Blocked,
            CliStatus::Cancelled => TaskStatus::Cancelled,
        }
    }
}

fn parse_file_ref(raw: &str) -> Result<FileRef> {
    let mut parts = raw.rsplitn(3, ':');
    let third = parts.next();
    let second = parts.next();
    let first = parts.next();
    let (path, line_start, line_end) = match (first, second, third) {
        (Some(path), Some(start), Some(end)) => (
            path.to_string(),
            Some(start.parse::<u32>().context("file ref line_start must be an integer")?),
            Some(end.parse::<u32>().context("file ref line_end must be an integer")?),
        ),
        (None, Some(path), Some(start)) => {
            (path.to_string(), Some(start.parse::<u32>().context("file ref line_start must be an integer")?), None)
        }
        (None, None, Some(path)) => (path.to_string(), None, None),
        _ => return Err(anyhow!("empty --file value")),
    };
    Ok(FileRef { path, line_start, line_end })
}

fn parse_deadline(raw: &str) -> Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(raw).map(|dt| dt.with_timezone(&Utc)).context("deadline must be ISO-8601")
}

fn parse_criteria(raw: &str) -> Result<Vec<SuccessCriterion>> {
    serde_json::from_str(raw).context("--criteria must be a JSON array of {criterion, measurable} objects")
}

fn print_tasks(format: OutputFormat, tasks: &[task_core::models::Task]) -> Result<()> {
    match format {
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(tasks)?),
        OutputFormat::Human => {
            println!("{:<10} {:<10} {:<9} {:<16} {}", "ID", "STATUS", "PRIORITY", "ASSIGNEE", "TITLE");
            for task in tasks {
                println!(
                    "{:<10} {:<10} {:<9} {:<16} {}",
                    task.id,
                    task.status,
                    task.priority,
                    task.assignee.as_deref().unwrap_or("-"),
                    task.title,
                );
            }
        }
    }
    Ok(())
}

fn print_task(format: OutputFormat, task: &task_core::models::Task) -> Result<()> {
    match format {
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(task)?),
        OutputFormat::Human => {
            println!("id:          {}", task.id);
            println!("title:       {}", task.title);
            if let Some(description) = &task.description {
                println!("description: {description}");
            }
            println!("status:      {}", task.status);
            println!("priority:    {}", task.priority);
            println!("assignee:    {}", task.assignee.as_deref().unwrap_or("-"));
            println!("created_by:  {}", task.created_by);
            if let Some(deadline) = task.deadline {
                println!("deadline:    {deadline}");
            }
            if !task.success_criteria.is_empty() {
                println!("criteria:");
                for c in &task.success_criteria {
                    println!("  - {}: {}", c.criterion, c.measurable);
                }
            }
            if let Some(summary) = &task.completion_summary {
                println!("summary:     {summary}");
            }
        }
    }
    Ok(())
}

async fn run(cli: Cli) -> Result<()> {
    let process = ProcessConfig::resolve(None, None, None);
    init_telemetry(&process.log_level, LogFormat::Pretty)?;

    match cli.command {
        Command::Init => {
            config::ensure_state_dir(&process.state_dir)?;
            let app = initialize_app(&process).await?;
            info!(db_path = %process.db_path.display(), "project initialized");
            let (version, _) = app.core().schema_status().await?;
            println!("initialized {} (schema version {version})", process.state_dir.display());
        }

        Command::Add { title, description, priority, assignee, depends_on, file, criteria, deadline, estimated_hours } => {
            let app = initialize_app(&process).await?;
            let file_refs = file.iter().map(|f| parse_file_ref(f)).collect::<Result<Vec<_>>>()?;
            let success_criteria = match criteria {
                Some(raw) => parse_criteria(&raw)?,
                None => Vec::new(),
            };
            let deadline = deadline.map(|d| parse_deadline(&d)).transpose()?;
            let new_task = NewTask {
                title,
                description,
                priority: priority.map(Into::into),
                assignee,
                created_by: Some(process.agent_id.clone()),
                depends_on: depends_on.into_iter().map(TaskId::from).collect(),
                file_refs,
                success_criteria,
                deadline,
                estimated_hours,
            };
            let task = app.core().add(new_task).await?;
            println!("{}", task.id);
        }

        Command::List { status, assignee, has_deps, priority } => {
            let app = initialize_app(&process).await?;
            let filter = TaskFilter {
                status: status.map(Into::into),
                assignee,
                has_deps: if has_deps { Some(true) } else { None },
                priority: priority.map(Into::into),
                ..Default::default()
            };
            let tasks = app.core().list(filter).await?;
            print_tasks(cli.format, &tasks)?;
        }

        Command::Show { id } => {
            let app = initialize_app(&process).await?;
            let task = app.core().show(&TaskId::from(id)).await?;
            print_task(cli.format, &task)?;
        }

        Command::Update { id, status, assignee } => {
            let app = initialize_app(&process).await?;
            let patch = TaskPatch { status: status.map(Into::into), assignee, ..Default::default() };
            let task = app.core().update(&TaskId::from(id), patch).await?;
            print_task(cli.format, &task)?;
        }

        Command::Complete { id, validate, actual_hours, summary, impact_review } => {
            let app = initialize_app(&process).await?;
            let options = CompleteOptions { validate, actual_hours, summary, impact_review, ..Default::default() };
            let task = app.core().complete(&TaskId::from(id), options).await?;
            print_task(cli.format, &task)?;
        }

        Command::Delete { id } => {
            let app = initialize_app(&process).await?;
            app.core().delete(&TaskId::from(id)).await?;
        }

        Command::Assign { id, agent } => {
            let app = initialize_app(&process).await?;
            let task = app.core().assign(&TaskId::from(id), &agent).await?;
            print_task(cli.format, &task)?;
        }

        Command::Progress { id, message } => {
            let app = initialize_app(&process).await?;
            app.core().progress(&TaskId::from(id), &process.agent_id, &message).await?;
        }

        Command::Feedback { id, quality, timeliness, note } => {
            let app = initialize_app(&process).await?;
            let input = FeedbackInput { quality, timeliness, note };
            let task = app.core().feedback(&TaskId::from(id), input).await?;
            print_task(cli.format, &task)?;
        }

        Command::Metrics { feedback, time_tracking, telemetry: telemetry_flag, period } => {
            let app = initialize_app(&process).await?;
            let period = period.as_deref().and_then(parse_metrics_period);
            let show_all = !feedback && !time_tracking && !telemetry_flag;

            let mut report = serde_json::Map::new();
            if feedback || show_all {
                report.insert("feedback".to_string(), serde_json::to_value(app.core().feedback_summary(period.clone()).await?)?);
            }
            if time_tracking || show_all {
                report.insert("time_tracking".to_string(), serde_json::to_value(app.core().time_summary(period.clone()).await?)?);
            }
            if telemetry_flag || show_all {
                report.insert("adoption".to_string(), serde_json::to_value(app.core().adoption_summary(period).await?)?);
            }
            println!("{}", serde_json::to_string_pretty(&report)?);
        }

        Command::Watch => {
            let app = initialize_app(&process).await?;
            let notifications = app.core().watch(&process.agent_id, None).await?;
            match cli.format {
                OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&notifications)?),
                OutputFormat::Human => {
                    for n in &notifications {
                        println!("[{}] {} ({})", n.kind, n.message, n.task_id.as_ref().map(TaskId::as_str).unwrap_or("-"));
                    }
                }
            }
        }

        Command::Discover { id, message, tags } => {
            let app = initialize_app(&process).await?;
            let tags = tags.map(|t| t.split(',').map(|s| s.trim().to_string()).collect()).unwrap_or_default();
            app.core().discover(&TaskId::from(id), &process.agent_id, &message, tags).await?;
        }

        Command::Export { format } => {
            let app = initialize_app(&process).await?;
            let tasks = app.core().list(TaskFilter::default()).await?;
            match format {
                ExportFormat::Json => println!("{}", serde_json::to_string_pretty(&tasks)?),
                ExportFormat::Markdown => {
                    println!("# Tasks\n");
                    for task in &tasks {
                        println!("## {} ({})\n", task.title, task.id);
                        println!("- status: {}", task.status);
                        println!("- priority: {}", task.priority);
                        println!("- assignee: {}\n", task.assignee.as_deref().unwrap_or("unassigned"));
                    }
                }
            }
        }

        Command::Migrate { status, apply, rollback } => {
            config::ensure_state_dir(&process.state_dir)?;
            let store = setup::create_store_unmigrated(&process).await?;
            if rollback {
                store.rollback(process.backups_dir()).await?;
                println!("rolled back to the previous backup");
            } else if apply {
                store.migrate(process.backups_dir()).await?;
                println!("migrations applied");
            } else {
                let _ = status;
                let version = store.current_version().await.unwrap_or(0);
                println!("schema version: {version}");
            }
        }

        Command::Config { show, enable, disable, minimal_mode, reset } => {
            config::ensure_state_dir(&process.state_dir)?;
            let mut features = setup::load_feature_config(&process)?;
            let mut changed = false;
            if reset {
                features = task_core::FeatureConfig::default();
                changed = true;
            }
            if let Some(feature) = &enable {
                if !features.enable(feature) {
                    return Err(anyhow!("unknown feature '{feature}'"));
                }
                changed = true;
            }
            if let Some(feature) = &disable {
                if !features.disable(feature) {
                    return Err(anyhow!("unknown feature '{feature}'"));
                }
                changed = true;
            }
            if minimal_mode {
                features.minimal_mode = true;
                changed = true;
            }
            if changed {
                save_feature_config(&process, &features)?;
            }
            let _ = show;
            println!("{}", features.to_yaml().map_err(|e| anyhow!(e))?);
        }

        Command::CriticalPath => {
            let app = initialize_app(&process).await?;
            let path = app.core().critical_path().await?;
            match cli.format {
                OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&path)?),
                OutputFormat::Human => {
                    for id in &path {
                        println!("{id}");
                    }
                }
            }
        }
    }

    Ok(())
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    if let Err(err) = run(cli).await {
        report_error(&err);
        eprintln!("error: {err}");
        let code = err.downcast_ref::<TaskError>().map(TaskError::exit_code).unwrap_or(1);
        std::process::exit(code);
    }
}
