//! External mutation orchestration
//!
//! Task breakdown and document import are delegated to an external command.
//! Its text output is classified into [`ProgressEvent`]s, and a successful
//! run ends with a forced reload of the sync service.

mod classifier;
mod config;
mod operation;
mod runner;

pub use classifier::{MAX_LINE_CHARS, ProgressClassifier, ProgressEvent, Stage, classify_line, is_noise, strip_ansi};
pub use config::ExternalConfig;
pub use operation::{ExpandOptions, ExpandScope, ExternalOperation, ImportOptions};
pub use runner::{ExternalOutcome, LineStream, LineTap, MutationOrchestrator};
