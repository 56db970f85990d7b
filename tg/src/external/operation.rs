//! Typed descriptors for external mutations

use std::fmt;
use std::path::PathBuf;

/// Which tasks an expansion targets
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ExpandScope {
    /// One task by id
    Single(String),
    /// Every pending task in the active context
    All,
    /// Inclusive id range
    Range { from: String, to: String },
    /// Every pending task in the named context
    Tag(String),
}

/// Options for an AI-assisted task breakdown
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExpandOptions {
    pub scope: ExpandScope,
    /// Let the external tool use its research model
    pub research: bool,
    /// Number of subtasks to generate
    pub num: Option<u32>,
    /// Replace existing subtasks
    pub force: bool,
    /// Extra context passed to the generator
    pub prompt: Option<String>,
}

impl ExpandOptions {
    pub fn new(scope: ExpandScope) -> Self {
        Self {
            scope,
            research: false,
            num: None,
            force: false,
            prompt: None,
        }
    }
}

/// Options for importing tasks from a requirements document
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImportOptions {
    /// Source document
    pub input: PathBuf,
    /// Approximate number of top-level tasks to create
    pub num_tasks: Option<u32>,
    pub research: bool,
    /// Add to the existing tasks instead of replacing them
    pub append: bool,
    /// Overwrite without confirmation
    pub force: bool,
}

impl ImportOptions {
    pub fn new(input: impl Into<PathBuf>) -> Self {
        Self {
            input: input.into(),
            num_tasks: None,
            research: false,
            append: false,
            force: false,
        }
    }
}

/// A mutation the engine delegates to the external command
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ExternalOperation {
    Expand(ExpandOptions),
    Import(ImportOptions),
}

impl ExternalOperation {
    /// First positional argument naming the operation
    pub fn subcommand(&self) -> &'static str {
        match self {
            Self::Expand(_) => "expand",
            Self::Import(_) => "parse-prd",
        }
    }

    /// Flags following the subcommand
    ///
    /// `active_tag` is passed explicitly so the command works on the same
    /// context the caller is reading.
    pub fn args(&self, active_tag: &str) -> Vec<String> {
        let mut args = Vec::new();
        match self {
            Self::Expand(opts) => {
                match &opts.scope {
                    ExpandScope::Single(id) => args.push(format!("--id={}", id)),
                    ExpandScope::All => args.push("--all".to_string()),
                    ExpandScope::Range { from, to } => {
                        args.push(format!("--from={}", from));
                        args.push(format!("--to={}", to));
                    }
                    ExpandScope::Tag(_) => args.push("--all".to_string()),
                }
                let tag = match &opts.scope {
                    ExpandScope::Tag(tag) => tag.as_str(),
                    _ => active_tag,
                };
                args.push(format!("--tag={}", tag));
                if opts.research {
                    args.push("--research".to_string());
                }
                if let Some(num) = opts.num {
                    args.push(format!("--num={}", num));
                }
                if opts.force {
                    args.push("--force".to_string());
                }
                if let Some(prompt) = &opts.prompt {
                    args.push(format!("--prompt={}", prompt));
                }
            }
            Self::Import(opts) => {
                args.push(format!("--input={}", opts.input.display()));
                if let Some(n) = opts.num_tasks {
                    args.push(format!("--num-tasks={}", n));
                }
                args.push(format!("--tag={}", active_tag));
                if opts.research {
                    args.push("--research".to_string());
                }
                if opts.append {
                    args.push("--append".to_string());
                }
                if opts.force {
                    args.push("--force".to_string());
                }
            }
        }
        args
    }
}

impl fmt::Display for ExternalOperation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Expand(opts) => match &opts.scope {
                ExpandScope::Single(id) => write!(f, "expand task {}", id),
                ExpandScope::All => write!(f, "expand all tasks"),
                ExpandScope::Range { from, to } => write!(f, "expand tasks {}..={}", from, to),
                ExpandScope::Tag(tag) => write!(f, "expand tasks in {}", tag),
            },
            Self::Import(opts) => write!(f, "import {}", opts.input.display()),
        }
    }
}
