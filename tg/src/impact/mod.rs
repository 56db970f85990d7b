//! Delete and impact analysis

mod analysis;
mod delete;

pub use analysis::{ImpactReport, analyze_impact, prune_tasks};
pub use delete::{DeleteOptions, DeleteOutcome};
