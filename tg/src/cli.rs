//! CLI command definitions and subcommands

use clap::{ArgGroup, Args, Parser, Subcommand};
use std::path::PathBuf;
use tracing::debug;

use crate::external::{ExpandOptions, ExpandScope, ExternalOperation, ImportOptions};

/// tg - task-graph sync and mutation engine
#[derive(Parser)]
#[command(
    name = "tg",
    about = "Inspect and mutate task-master task documents",
    version
)]
pub struct Cli {
    /// Path to config file
    #[arg(short, long, global = true, help = "Path to config file")]
    pub config: Option<PathBuf>,

    /// Log level (TRACE, DEBUG, INFO, WARN, ERROR)
    #[arg(
        short = 'l',
        long = "log-level",
        global = true,
        help = "Log level (TRACE, DEBUG, INFO, WARN, ERROR)"
    )]
    pub log_level: Option<String>,

    /// Project root (skips marker directory discovery)
    #[arg(short, long, global = true)]
    pub root: Option<PathBuf>,

    /// Document context to operate on
    #[arg(short, long, global = true)]
    pub tag: Option<String>,

    /// Subcommand to execute
    #[command(subcommand)]
    pub command: Command,
}

/// CLI subcommands
#[derive(Debug, Subcommand)]
pub enum Command {
    /// List tasks as a tree
    List {
        /// Only show tasks with this status
        #[arg(short, long)]
        status: Option<String>,

        /// Output format
        #[arg(short, long, default_value = "text")]
        format: OutputFormat,
    },

    /// Show one task
    Show {
        /// Task ID (e.g. 3 or 3.1)
        id: String,

        /// Output format
        #[arg(short, long, default_value = "text")]
        format: OutputFormat,
    },

    /// Show the next task to work on
    Next {
        /// Output format
        #[arg(short, long, default_value = "text")]
        format: OutputFormat,
    },

    /// Count tasks by status
    Stats {
        /// Output format
        #[arg(short, long, default_value = "text")]
        format: OutputFormat,
    },

    /// Show structural warnings for the document
    Warnings,

    /// List the contexts of a tagged document
    Tags,

    /// Delete tasks and report what else is affected
    Delete {
        /// Task IDs to delete
        #[arg(required = true)]
        ids: Vec<String>,

        /// Also delete subtasks and dependent tasks
        #[arg(short = 'R', long)]
        recursive: bool,

        /// Skip IDs that do not exist
        #[arg(short, long)]
        force: bool,

        /// Only report the impact
        #[arg(short = 'n', long)]
        dry_run: bool,
    },

    /// Break tasks into subtasks with the external tool
    Expand(ExpandArgs),

    /// Generate tasks from a requirements document with the external tool
    Import {
        /// Requirements document
        file: PathBuf,

        /// Approximate number of tasks to generate
        #[arg(long)]
        num_tasks: Option<u32>,

        /// Use the research model
        #[arg(long)]
        research: bool,

        /// Append to existing tasks
        #[arg(long)]
        append: bool,

        /// Overwrite existing tasks without asking
        #[arg(long)]
        force: bool,
    },

    /// Watch the document and report reloads until interrupted
    Watch,
}

/// Arguments for `tg expand`
#[derive(Debug, Args)]
#[command(group(ArgGroup::new("scope").required(true).args(["id", "all", "from", "scope_tag"])))]
pub struct ExpandArgs {
    /// Expand a single task
    #[arg(long)]
    pub id: Option<String>,

    /// Expand every pending task
    #[arg(long)]
    pub all: bool,

    /// First task of a range
    #[arg(long, requires = "to")]
    pub from: Option<String>,

    /// Last task of a range
    #[arg(long, requires = "from")]
    pub to: Option<String>,

    /// Expand every pending task in another context
    #[arg(long = "scope-tag")]
    pub scope_tag: Option<String>,

    /// Use the research model
    #[arg(long)]
    pub research: bool,

    /// Number of subtasks to generate
    #[arg(long)]
    pub num: Option<u32>,

    /// Replace existing subtasks
    #[arg(long)]
    pub force: bool,

    /// Extra context for the generator
    #[arg(long)]
    pub prompt: Option<String>,
}

impl ExpandArgs {
    /// Selected scope; clap guarantees exactly one is present
    pub fn scope(&self) -> Option<ExpandScope> {
        debug!(?self, "ExpandArgs::scope: called");
        if let Some(id) = &self.id {
            return Some(ExpandScope::Single(id.clone()));
        }
        if self.all {
            return Some(ExpandScope::All);
        }
        if let (Some(from), Some(to)) = (&self.from, &self.to) {
            return Some(ExpandScope::Range {
                from: from.clone(),
                to: to.clone(),
            });
        }
        self.scope_tag.clone().map(ExpandScope::Tag)
    }

    pub fn to_operation(&self) -> Option<ExternalOperation> {
        let scope = self.scope()?;
        Some(ExternalOperation::Expand(ExpandOptions {
            scope,
            research: self.research,
            num: self.num,
            force: self.force,
            prompt: self.prompt.clone(),
        }))
    }
}

/// Build the import operation from `tg import` arguments
pub fn import_operation(
    file: PathBuf,
    num_tasks: Option<u32>,
    research: bool,
    append: bool,
    force: bool,
) -> ExternalOperation {
    ExternalOperation::Import(ImportOptions {
        input: file,
        num_tasks,
        research,
        append,
        force,
    })
}

/// Get the log file path
pub fn get_log_path() -> PathBuf {
    debug!("get_log_path: called");
    let path = dirs::data_local_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("taskgraph")
        .join("logs")
        .join("taskgraph.log");
    debug!(?path, "get_log_path: returning path");
    path
}

/// Output format for read commands
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub enum OutputFormat {
    #[default]
    Text,
    Json,
}

impl std::str::FromStr for OutputFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        debug!(%s, "OutputFormat::from_str: called");
        match s.to_lowercase().as_str() {
            "text" | "plain" => Ok(Self::Text),
            "json" => Ok(Self::Json),
            _ => Err(format!("Unknown format: {}. Use text or json", s)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition_is_valid() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_parse_delete() {
        let cli = Cli::try_parse_from(["tg", "--tag", "feature", "delete", "3", "4.1", "-R", "--dry-run"]).unwrap();
        assert_eq!(cli.tag.as_deref(), Some("feature"));
        match cli.command {
            Command::Delete {
                ids,
                recursive,
                force,
                dry_run,
            } => {
                assert_eq!(ids, vec!["3", "4.1"]);
                assert!(recursive);
                assert!(!force);
                assert!(dry_run);
            }
            other => panic!("unexpected command {:?}", other),
        }
    }

    #[test]
    fn test_expand_requires_scope() {
        assert!(Cli::try_parse_from(["tg", "expand"]).is_err());
        assert!(Cli::try_parse_from(["tg", "expand", "--from", "2"]).is_err());
        assert!(Cli::try_parse_from(["tg", "expand", "--id", "1", "--all"]).is_err());
    }

    #[test]
    fn test_expand_range_operation() {
        let cli = Cli::try_parse_from(["tg", "expand", "--from", "2", "--to", "5", "--num", "3"]).unwrap();
        let Command::Expand(args) = cli.command else {
            panic!("expected expand");
        };
        let op = args.to_operation().unwrap();
        assert_eq!(op.args("master"), vec!["--from=2", "--to=5", "--tag=master", "--num=3"]);
    }

    #[test]
    fn test_output_format_parse() {
        assert_eq!("JSON".parse::<OutputFormat>().unwrap(), OutputFormat::Json);
        assert_eq!("plain".parse::<OutputFormat>().unwrap(), OutputFormat::Text);
        assert!("xml".parse::<OutputFormat>().is_err());
    }
}
