//! tg - task-graph sync and mutation engine
//!
//! CLI entry point for reading, deleting from and expanding task documents.

use std::fs;
use std::path::PathBuf;
use std::sync::Arc;

use clap::Parser;
use colored::*;
use eyre::{Context, Result, eyre};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use taskgraph::cli::{Cli, Command, OutputFormat, get_log_path, import_operation};
use taskgraph::config::Config;
use taskgraph::domain::{TaskNode, TaskStatus};
use taskgraph::external::{ExternalOperation, MutationOrchestrator, ProgressEvent};
use taskgraph::impact::{DeleteOptions, ImpactReport};
use taskgraph::sync::{LoadOutcome, TaskSnapshot, TaskSync};
use taskgraph::watcher::DocumentWatcher;

fn setup_logging(cli_log_level: Option<&str>, config_log_level: Option<&str>) -> Result<()> {
    // Logging isn't initialized yet, so nothing here can log
    let log_path = get_log_path();
    if let Some(log_dir) = log_path.parent() {
        fs::create_dir_all(log_dir).context("Failed to create log directory")?;
    }

    // Priority: CLI --log-level > config file > default (INFO)
    let level = match cli_log_level.or(config_log_level) {
        Some(s) => match s.to_uppercase().as_str() {
            "TRACE" => tracing::Level::TRACE,
            "DEBUG" => tracing::Level::DEBUG,
            "INFO" => tracing::Level::INFO,
            "WARN" | "WARNING" => tracing::Level::WARN,
            "ERROR" => tracing::Level::ERROR,
            _ => {
                eprintln!("Warning: Unknown log-level '{}', defaulting to INFO", s);
                tracing::Level::INFO
            }
        },
        None => tracing::Level::INFO,
    };

    let log_file = fs::File::create(&log_path).context("Failed to create log file")?;

    tracing_subscriber::fmt()
        .with_writer(log_file)
        .with_ansi(false)
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env().add_directive(level.into()))
        .init();

    info!("Logging initialized (level: {:?})", level);
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let config_log_level = Config::load_log_level(cli.config.as_ref());
    setup_logging(cli.log_level.as_deref(), config_log_level.as_deref()).context("Failed to setup logging")?;

    let mut config = Config::load(cli.config.as_ref()).context("Failed to load configuration")?;
    if let Some(root) = &cli.root {
        config.sync.root = Some(root.clone());
    }
    if let Some(tag) = &cli.tag {
        config.sync.tag = tag.clone();
    }
    info!(tag = %config.sync.tag, "tg loaded config");

    let sync = Arc::new(TaskSync::discover(&config.sync)?);
    if !sync.is_available() {
        return Err(eyre!(
            "No task document found: no '{}' directory in this directory or any parent",
            config.sync.marker_dir
        ));
    }

    let cancel = CancellationToken::new();
    sync.load(false, &cancel).context("Failed to load task document")?;

    debug!(command = ?cli.command, "main: dispatching command");
    match cli.command {
        Command::List { status, format } => cmd_list(&sync, status.as_deref(), format),
        Command::Show { id, format } => cmd_show(&sync, &id, format),
        Command::Next { format } => cmd_next(&sync, format),
        Command::Stats { format } => cmd_stats(&sync, format),
        Command::Warnings => cmd_warnings(&sync),
        Command::Tags => cmd_tags(&sync),
        Command::Delete {
            ids,
            recursive,
            force,
            dry_run,
        } => cmd_delete(&sync, &ids, DeleteOptions { recursive, force }, dry_run, &cancel),
        Command::Expand(args) => {
            let op = args.to_operation().ok_or_else(|| eyre!("No expand scope given"))?;
            cmd_external(&sync, &config, op, &cancel).await
        }
        Command::Import {
            file,
            num_tasks,
            research,
            append,
            force,
        } => {
            let op = import_operation(absolute(file)?, num_tasks, research, append, force);
            cmd_external(&sync, &config, op, &cancel).await
        }
        Command::Watch => cmd_watch(sync, &config, &cancel).await,
    }
}

fn absolute(path: PathBuf) -> Result<PathBuf> {
    if path.is_absolute() {
        return Ok(path);
    }
    Ok(std::env::current_dir().context("Failed to read working directory")?.join(path))
}

fn status_colored(status: &TaskStatus) -> ColoredString {
    let s = status.as_str();
    match status {
        TaskStatus::Done => s.green(),
        TaskStatus::InProgress => s.yellow(),
        TaskStatus::Blocked => s.red(),
        TaskStatus::Cancelled | TaskStatus::Deferred => s.dimmed(),
        TaskStatus::Pending => s.normal(),
        TaskStatus::Other(_) => s.magenta(),
    }
}

fn print_tree(nodes: &[TaskNode], depth: usize, filter: Option<&TaskStatus>) {
    for node in nodes {
        if filter.is_none_or(|f| &node.status == f) {
            let deps = if node.dependencies.is_empty() {
                String::new()
            } else {
                format!(" (deps: {})", node.dependencies.join(", ")).dimmed().to_string()
            };
            println!(
                "{}{} [{}] {}{}",
                "  ".repeat(depth),
                node.id.cyan(),
                status_colored(&node.status),
                node.title,
                deps
            );
        }
        print_tree(&node.subtasks, depth + 1, filter);
    }
}

fn print_task(node: &TaskNode) {
    println!("{} {}", node.id.cyan().bold(), node.title.bold());
    println!("  Status:       {}", status_colored(&node.status));
    if let Some(priority) = &node.priority {
        println!("  Priority:     {}", priority);
    }
    if !node.parent_id.is_empty() {
        println!("  Parent:       {}", node.parent_id);
    }
    if !node.dependencies.is_empty() {
        println!("  Dependencies: {}", node.dependencies.join(", "));
    }
    if !node.description.is_empty() {
        println!("\n{}", node.description);
    }
    if !node.details.is_empty() {
        println!("\n{}\n{}", "Details:".bold(), node.details);
    }
    if !node.test_strategy.is_empty() {
        println!("\n{}\n{}", "Test strategy:".bold(), node.test_strategy);
    }
    if !node.subtasks.is_empty() {
        println!("\n{}", "Subtasks:".bold());
        print_tree(&node.subtasks, 1, None);
    }
}

fn print_json(value: &serde_json::Value) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

fn cmd_list(sync: &TaskSync, status: Option<&str>, format: OutputFormat) -> Result<()> {
    debug!(?status, ?format, "cmd_list: called");
    let snapshot = sync.get_all()?;
    let filter = status.map(|s| TaskStatus::from(s.to_string()));

    match format {
        OutputFormat::Json => {
            let tasks: Vec<_> = snapshot.tasks().iter().map(TaskNode::to_json).collect();
            print_json(&serde_json::json!({
                "shape": snapshot.shape().to_string(),
                "tasks": tasks,
                "warnings": snapshot.warning_messages(),
            }))
        }
        OutputFormat::Text => {
            if snapshot.tasks().is_empty() {
                println!("No tasks.");
            } else {
                print_tree(snapshot.tasks(), 0, filter.as_ref());
            }
            print_warning_hint(&snapshot);
            Ok(())
        }
    }
}

fn cmd_show(sync: &TaskSync, id: &str, format: OutputFormat) -> Result<()> {
    debug!(%id, ?format, "cmd_show: called");
    let node = sync.get_by_id(id)?.ok_or_else(|| eyre!("Task not found: {}", id))?;
    match format {
        OutputFormat::Json => print_json(&node.to_json()),
        OutputFormat::Text => {
            print_task(&node);
            Ok(())
        }
    }
}

fn cmd_next(sync: &TaskSync, format: OutputFormat) -> Result<()> {
    debug!(?format, "cmd_next: called");
    match (sync.get_next()?, format) {
        (Some(node), OutputFormat::Json) => print_json(&node.to_json()),
        (None, OutputFormat::Json) => print_json(&serde_json::Value::Null),
        (Some(node), OutputFormat::Text) => {
            print_task(&node);
            Ok(())
        }
        (None, OutputFormat::Text) => {
            println!("No pending task is ready.");
            Ok(())
        }
    }
}

fn cmd_stats(sync: &TaskSync, format: OutputFormat) -> Result<()> {
    debug!(?format, "cmd_stats: called");
    let counts = sync.count_by_status()?;
    let total: usize = counts.values().sum();

    match format {
        OutputFormat::Json => {
            let by_status: serde_json::Map<String, serde_json::Value> =
                counts.iter().map(|(s, n)| (s.to_string(), serde_json::json!(n))).collect();
            print_json(&serde_json::json!({ "total": total, "by_status": by_status }))
        }
        OutputFormat::Text => {
            println!("{} tasks", total.to_string().bold());
            for (status, count) in &counts {
                println!("  {:<12} {}", status_colored(status), count);
            }
            Ok(())
        }
    }
}

fn cmd_warnings(sync: &TaskSync) -> Result<()> {
    debug!("cmd_warnings: called");
    let warnings = sync.warnings()?;
    if warnings.is_empty() {
        println!("{} No warnings", "✓".green());
    }
    for warning in warnings {
        println!("{} {}", "!".yellow(), warning);
    }
    Ok(())
}

fn cmd_tags(sync: &TaskSync) -> Result<()> {
    debug!("cmd_tags: called");
    let active = sync.tag();
    let tags = sync.available_tags()?;
    if tags.is_empty() {
        println!("Document is not tagged.");
    }
    for tag in tags {
        if tag == active {
            println!("* {}", tag.green());
        } else {
            println!("  {}", tag);
        }
    }
    Ok(())
}

fn print_impact(report: &ImpactReport) {
    println!("Selected:    {}", report.selected.join(", "));
    if !report.descendants.is_empty() {
        println!("Subtasks:    {}", report.descendants.join(", "));
    }
    if !report.dependents.is_empty() {
        println!("Dependents:  {}", report.dependents.join(", "));
    }
    if !report.missing.is_empty() {
        println!("Missing:     {}", report.missing.join(", ").yellow());
    }
}

fn cmd_delete(
    sync: &TaskSync,
    ids: &[String],
    options: DeleteOptions,
    dry_run: bool,
    cancel: &CancellationToken,
) -> Result<()> {
    debug!(?ids, ?options, dry_run, "cmd_delete: called");
    if dry_run {
        let report = sync.analyze_impact(ids, options.recursive)?;
        print_impact(&report);
        if let Some(reason) = &report.blocking_reason {
            println!("{} {}", "Blocked:".red(), reason);
        } else {
            println!("{} task(s) would be deleted", report.total());
        }
        return Ok(());
    }

    match sync.delete(ids, options, cancel) {
        Ok(outcome) => {
            print_impact(&outcome.report);
            println!("{} Deleted {} task(s)", "✓".green(), outcome.removed);
            Ok(())
        }
        Err(e) => {
            if let Some(report) = e.impact() {
                print_impact(report);
            }
            Err(e.into())
        }
    }
}

fn print_progress(event: &ProgressEvent) {
    let pct = format!("{:>3.0}%", event.progress * 100.0);
    println!("{} {:<10} {}", pct.cyan(), event.stage.to_string().bold(), event.message);
}

async fn cmd_external(sync: &Arc<TaskSync>, config: &Config, op: ExternalOperation, cancel: &CancellationToken) -> Result<()> {
    debug!(%op, "cmd_external: called");
    let orchestrator = MutationOrchestrator::new(Arc::clone(sync), config.external.clone());

    let ctrl_c = cancel.clone();
    let signal_task = tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            ctrl_c.cancel();
        }
    });

    let before = sync.get_all()?.node_count();
    let result = orchestrator.run(&op, cancel, |event| print_progress(&event)).await;
    signal_task.abort();

    match result {
        Ok(outcome) => {
            let after = sync.get_all()?.node_count();
            println!(
                "{} {} finished: {} tasks ({:+})",
                "✓".green(),
                op,
                after,
                after as i64 - before as i64
            );
            if let LoadOutcome::Reloaded {
                warnings: warnings @ 1..,
                ..
            } = outcome.reload
            {
                println!("{} {} warning(s); run `tg warnings`", "!".yellow(), warnings);
            }
            Ok(())
        }
        Err(e) if e.is_cancelled() => {
            println!("{} {} cancelled", "✗".red(), op);
            Ok(())
        }
        Err(e) => Err(e.into()),
    }
}

async fn cmd_watch(sync: Arc<TaskSync>, config: &Config, cancel: &CancellationToken) -> Result<()> {
    debug!("cmd_watch: called");
    let mut notices = sync
        .reload_notifications()
        .ok_or_else(|| eyre!("Reload notifications already taken"))?;
    // Drop the notice queued by the initial load
    while notices.try_recv().is_ok() {}
    let handle = DocumentWatcher::spawn(Arc::clone(&sync), &config.watcher, cancel)?;

    if let Some(path) = sync.document_path() {
        println!("Watching {} (Ctrl-C to stop)", path.display().to_string().cyan());
    }

    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => break,
            notice = notices.recv() => match notice {
                Some(notice) => {
                    let snapshot = sync.get_all()?;
                    println!(
                        "{} reload #{} ({}): {} tasks, {} warning(s)",
                        "↻".cyan(),
                        notice.generation,
                        notice.tag,
                        snapshot.node_count(),
                        snapshot.warnings().len()
                    );
                }
                None => break,
            },
        }
    }

    handle.stop().await;
    println!("Stopped.");
    Ok(())
}

fn print_warning_hint(snapshot: &TaskSnapshot) {
    let count = snapshot.warnings().len();
    if count > 0 {
        println!("\n{} {} warning(s); run `tg warnings`", "!".yellow(), count);
    }
}
