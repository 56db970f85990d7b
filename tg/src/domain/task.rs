//! TaskNode - one work item in the task tree

use serde_json::{Map, Value};

use super::priority::Priority;
use super::status::TaskStatus;

/// Key under which a task's children are stored on disk
pub const SUBTASKS_KEY: &str = "subtasks";

/// A node in the task tree
///
/// `subtasks` is structural ownership: a subtask lives exactly as long as its
/// parent. `parent_id` is a denormalised back-reference recomputed on every
/// load and never authoritative.
///
/// The node also keeps the JSON object it was parsed from, so writing an
/// untouched node back reproduces the original keys, key order and id
/// representation.
#[derive(Debug, Clone, PartialEq)]
pub struct TaskNode {
    /// Normalised, fully-qualified id ("1", "1.2", "1.2.3")
    pub id: String,

    pub title: String,

    pub description: String,

    pub details: String,

    pub test_strategy: String,

    pub status: TaskStatus,

    /// `None` when the priority is absent or empty
    pub priority: Option<Priority>,

    /// Normalised ids of the tasks this one depends on
    pub dependencies: Vec<String>,

    /// Owned child tasks, in document order
    pub subtasks: Vec<TaskNode>,

    /// Id of the owning task, empty for roots
    pub parent_id: String,

    /// Source object; the subtasks entry is a placeholder rebuilt on write
    pub(crate) source: Map<String, Value>,
}

impl TaskNode {
    /// Create a new pending root task
    pub fn new(id: impl Into<String>, title: impl Into<String>) -> Self {
        let id = id.into();
        let title = title.into();
        let mut source = Map::new();
        source.insert("id".to_string(), Value::String(id.clone()));
        source.insert("title".to_string(), Value::String(title.clone()));
        source.insert("status".to_string(), Value::String(TaskStatus::Pending.to_string()));
        source.insert("dependencies".to_string(), Value::Array(Vec::new()));

        Self {
            id,
            title,
            description: String::new(),
            details: String::new(),
            test_strategy: String::new(),
            status: TaskStatus::Pending,
            priority: None,
            dependencies: Vec::new(),
            subtasks: Vec::new(),
            parent_id: String::new(),
            source,
        }
    }

    /// Set the status
    pub fn with_status(mut self, status: TaskStatus) -> Self {
        self.source
            .insert("status".to_string(), Value::String(status.to_string()));
        self.status = status;
        self
    }

    /// Set the dependency list
    pub fn with_dependencies<I, S>(mut self, deps: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.dependencies = deps.into_iter().map(Into::into).collect();
        self.source.insert(
            "dependencies".to_string(),
            Value::Array(self.dependencies.iter().cloned().map(Value::String).collect()),
        );
        self
    }

    /// Set the subtasks, re-parenting them under this task
    pub fn with_subtasks(mut self, subtasks: Vec<TaskNode>) -> Self {
        self.subtasks = subtasks
            .into_iter()
            .map(|mut child| {
                child.parent_id = self.id.clone();
                child
            })
            .collect();
        self.source
            .entry(SUBTASKS_KEY.to_string())
            .or_insert_with(|| Value::Array(Vec::new()));
        self
    }

    /// Check if this task has no owning parent
    pub fn is_root(&self) -> bool {
        self.parent_id.is_empty()
    }

    /// Number of nodes in this subtree, including this one
    pub fn subtree_len(&self) -> usize {
        1 + self.subtasks.iter().map(TaskNode::subtree_len).sum::<usize>()
    }

    /// Visit this node and every descendant in pre-order
    pub fn walk<'a>(&'a self, visit: &mut impl FnMut(&'a TaskNode)) {
        visit(self);
        for child in &self.subtasks {
            child.walk(visit);
        }
    }

    /// Rebuild the on-disk JSON object for this subtree
    pub fn to_json(&self) -> Value {
        let mut object = self.source.clone();
        let children = Value::Array(self.subtasks.iter().map(TaskNode::to_json).collect());
        match object.get_mut(SUBTASKS_KEY) {
            Some(slot @ Value::Array(_)) => *slot = children,
            Some(_) => {}
            None if !self.subtasks.is_empty() => {
                object.insert(SUBTASKS_KEY.to_string(), children);
            }
            None => {}
        }
        Value::Object(object)
    }
}

/// Visit every node of a forest in pre-order
pub fn walk_forest<'a>(tasks: &'a [TaskNode], visit: &mut impl FnMut(&'a TaskNode)) {
    for task in tasks {
        task.walk(visit);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_with_subtasks_sets_parent() {
        let task = TaskNode::new("1", "Parent").with_subtasks(vec![TaskNode::new("1.1", "Child")]);
        assert!(task.is_root());
        assert_eq!(task.subtasks[0].parent_id, "1");
        assert!(!task.subtasks[0].is_root());
        assert_eq!(task.subtree_len(), 2);
    }

    #[test]
    fn test_walk_is_preorder() {
        let tasks = vec![
            TaskNode::new("1", "A").with_subtasks(vec![TaskNode::new("1.1", "B"), TaskNode::new("1.2", "C")]),
            TaskNode::new("2", "D"),
        ];
        let mut seen = Vec::new();
        walk_forest(&tasks, &mut |t| seen.push(t.id.clone()));
        assert_eq!(seen, vec!["1", "1.1", "1.2", "2"]);
    }

    #[test]
    fn test_to_json_rebuilds_subtasks() {
        let task = TaskNode::new("1", "Parent")
            .with_dependencies(["2"])
            .with_subtasks(vec![TaskNode::new("1.1", "Child")]);
        let json = task.to_json();
        assert_eq!(json["id"], "1");
        assert_eq!(json["dependencies"][0], "2");
        assert_eq!(json["subtasks"][0]["title"], "Child");
    }
}
