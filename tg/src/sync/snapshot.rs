//! Immutable view of one load of the task document

use std::collections::BTreeMap;

use tracing::debug;

use crate::document::DocumentShape;
use crate::domain::{TaskNode, TaskStatus, walk_forest};
use crate::graph::{TaskIndex, Warning, validate};

/// Task tree, index and warnings from a single load or mutation
///
/// A snapshot never changes once built. The sync service swaps in a new one
/// on every reload or delete, so holding one across an await point is safe.
#[derive(Debug, Clone)]
pub struct TaskSnapshot {
    tasks: Vec<TaskNode>,
    index: TaskIndex,
    warnings: Vec<Warning>,
    shape: DocumentShape,
}

impl TaskSnapshot {
    /// Index and validate a freshly parsed tree
    pub fn build(tasks: Vec<TaskNode>, shape: DocumentShape) -> Self {
        debug!(roots = tasks.len(), %shape, "TaskSnapshot::build: called");
        let (index, mut warnings) = TaskIndex::build(&tasks);
        warnings.extend(validate(&tasks, &index));
        Self {
            tasks,
            index,
            warnings,
            shape,
        }
    }

    /// Snapshot with no tasks
    pub fn empty(shape: DocumentShape) -> Self {
        Self::build(Vec::new(), shape)
    }

    /// Root-level tasks in document order
    pub fn tasks(&self) -> &[TaskNode] {
        &self.tasks
    }

    pub fn index(&self) -> &TaskIndex {
        &self.index
    }

    /// Structural warnings found while loading
    pub fn warnings(&self) -> &[Warning] {
        &self.warnings
    }

    /// Warnings rendered for display
    pub fn warning_messages(&self) -> Vec<String> {
        self.warnings.iter().map(ToString::to_string).collect()
    }

    /// Layout the tree was loaded from
    pub fn shape(&self) -> &DocumentShape {
        &self.shape
    }

    /// Look up a node at any depth
    pub fn get(&self, id: &str) -> Option<&TaskNode> {
        self.index.get(&self.tasks, id)
    }

    /// Total number of nodes, duplicates included
    pub fn node_count(&self) -> usize {
        self.index.node_count()
    }

    /// First pending task, in pre-order, whose dependencies are all done
    ///
    /// A dependency that does not resolve never blocks.
    pub fn next_task(&self) -> Option<&TaskNode> {
        fn search<'a>(nodes: &'a [TaskNode], ready: &impl Fn(&TaskNode) -> bool) -> Option<&'a TaskNode> {
            for node in nodes {
                if ready(node) {
                    return Some(node);
                }
                if let Some(found) = search(&node.subtasks, ready) {
                    return Some(found);
                }
            }
            None
        }

        let ready = |node: &TaskNode| {
            node.status == TaskStatus::Pending
                && node
                    .dependencies
                    .iter()
                    .all(|dep| self.get(dep).is_none_or(|d| d.status.is_done()))
        };
        search(&self.tasks, &ready)
    }

    /// Count nodes per status at every depth
    pub fn count_by_status(&self) -> BTreeMap<TaskStatus, usize> {
        let mut counts = BTreeMap::new();
        walk_forest(&self.tasks, &mut |node| {
            *counts.entry(node.status.clone()).or_insert(0) += 1;
        });
        counts
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn snapshot(tasks: Vec<TaskNode>) -> TaskSnapshot {
        TaskSnapshot::build(tasks, DocumentShape::Array)
    }

    #[test]
    fn test_next_task_skips_blocked() {
        let snap = snapshot(vec![
            TaskNode::new("1", "a").with_status(TaskStatus::Done),
            TaskNode::new("2", "b").with_dependencies(["3"]),
            TaskNode::new("3", "c"),
        ]);
        assert_eq!(snap.next_task().unwrap().id, "3");
    }

    #[test]
    fn test_next_task_dangling_dependency_does_not_block() {
        let snap = snapshot(vec![TaskNode::new("1", "a").with_dependencies(["404"])]);
        assert_eq!(snap.next_task().unwrap().id, "1");
    }

    #[test]
    fn test_next_task_descends_into_subtasks() {
        let snap = snapshot(vec![
            TaskNode::new("1", "a")
                .with_status(TaskStatus::InProgress)
                .with_subtasks(vec![
                    TaskNode::new("1.1", "b").with_status(TaskStatus::Done),
                    TaskNode::new("1.2", "c").with_dependencies(["1.1"]),
                ]),
            TaskNode::new("2", "d"),
        ]);
        assert_eq!(snap.next_task().unwrap().id, "1.2");
    }

    #[test]
    fn test_next_task_none_when_all_done() {
        let snap = snapshot(vec![TaskNode::new("1", "a").with_status(TaskStatus::Done)]);
        assert!(snap.next_task().is_none());
    }

    #[test]
    fn test_count_by_status_every_depth() {
        let snap = snapshot(vec![
            TaskNode::new("1", "a").with_status(TaskStatus::Done).with_subtasks(vec![
                TaskNode::new("1.1", "b").with_status(TaskStatus::Done),
                TaskNode::new("1.2", "c"),
            ]),
            TaskNode::new("2", "d").with_status(TaskStatus::Blocked),
        ]);
        let counts = snap.count_by_status();
        assert_eq!(counts[&TaskStatus::Done], 2);
        assert_eq!(counts[&TaskStatus::Pending], 1);
        assert_eq!(counts[&TaskStatus::Blocked], 1);
        assert_eq!(counts.values().sum::<usize>(), snap.node_count());
    }

    #[test]
    fn test_warning_messages() {
        let snap = snapshot(vec![TaskNode::new("1", "a").with_dependencies(["9"])]);
        assert_eq!(snap.warning_messages(), vec!["task 1 depends on missing task 9"]);
    }
}
