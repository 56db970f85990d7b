//! Task status values

use serde::{Deserialize, Serialize};

/// Workflow status of a task
///
/// Unrecognised strings are kept as `Other` so a document with a typo still
/// loads; the validator reports them.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, Default)]
#[serde(from = "String", into = "String")]
pub enum TaskStatus {
    #[default]
    Pending,
    InProgress,
    Done,
    Deferred,
    Cancelled,
    Blocked,
    Other(String),
}

impl TaskStatus {
    /// All statuses the document format defines
    pub const KNOWN: [TaskStatus; 6] = [
        Self::Pending,
        Self::InProgress,
        Self::Done,
        Self::Deferred,
        Self::Cancelled,
        Self::Blocked,
    ];

    /// Canonical on-disk spelling
    pub fn as_str(&self) -> &str {
        match self {
            Self::Pending => "pending",
            Self::InProgress => "in-progress",
            Self::Done => "done",
            Self::Deferred => "deferred",
            Self::Cancelled => "cancelled",
            Self::Blocked => "blocked",
            Self::Other(s) => s,
        }
    }

    /// Check if this is one of the defined values
    pub fn is_known(&self) -> bool {
        !matches!(self, Self::Other(_))
    }

    /// Check if the task counts as complete for dependency purposes
    pub fn is_done(&self) -> bool {
        *self == Self::Done
    }
}

impl From<String> for TaskStatus {
    fn from(s: String) -> Self {
        match s.as_str() {
            "pending" => Self::Pending,
            "in-progress" => Self::InProgress,
            "done" => Self::Done,
            "deferred" => Self::Deferred,
            "cancelled" => Self::Cancelled,
            "blocked" => Self::Blocked,
            _ => Self::Other(s),
        }
    }
}

impl From<TaskStatus> for String {
    fn from(status: TaskStatus) -> Self {
        match status {
            TaskStatus::Other(s) => s,
            known => known.as_str().to_string(),
        }
    }
}

impl std::fmt::Display for TaskStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl std::str::FromStr for TaskStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match Self::from(s.to_lowercase()) {
            Self::Other(_) => Err(format!("Unknown status: {}", s)),
            status => Ok(status),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_display() {
        assert_eq!(TaskStatus::InProgress.to_string(), "in-progress");
        assert_eq!(TaskStatus::Done.to_string(), "done");
        assert_eq!(TaskStatus::Other("review".to_string()).to_string(), "review");
    }

    #[test]
    fn test_status_parse() {
        assert_eq!("DONE".parse::<TaskStatus>().unwrap(), TaskStatus::Done);
        assert_eq!("blocked".parse::<TaskStatus>().unwrap(), TaskStatus::Blocked);
        assert!("finished".parse::<TaskStatus>().is_err());
    }

    #[test]
    fn test_status_serde_keeps_unknown_values() {
        let status: TaskStatus = serde_json::from_str("\"review\"").unwrap();
        assert_eq!(status, TaskStatus::Other("review".to_string()));
        assert!(!status.is_known());
        assert_eq!(serde_json::to_string(&status).unwrap(), "\"review\"");

        let status: TaskStatus = serde_json::from_str("\"in-progress\"").unwrap();
        assert_eq!(status, TaskStatus::InProgress);
    }
}
