//! Identifier index over the task tree
//!
//! The tree owns its nodes; the index only records where each id lives and
//! the parent/child relation between ids. The relation is navigational and is
//! rebuilt from scratch on every load.

use std::collections::HashMap;

use tracing::debug;

use super::validate::Warning;
use crate::domain::TaskNode;

/// Where a node lives and how it relates to its neighbours
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct IndexEntry {
    /// Child positions from the root list down to the node
    pub path: Vec<usize>,

    /// Id of the owning node, `None` for roots
    pub parent_id: Option<String>,

    /// Ids of the direct subtasks, in document order
    pub children: Vec<String>,
}

/// id -> node lookup table covering every depth
#[derive(Debug, Clone, Default)]
pub struct TaskIndex {
    entries: HashMap<String, IndexEntry>,
    node_count: usize,
}

impl TaskIndex {
    /// Build the index with one depth-first pass
    ///
    /// A repeated id produces a warning and the later node replaces the
    /// earlier one in the index.
    pub fn build(tasks: &[TaskNode]) -> (Self, Vec<Warning>) {
        debug!(roots = tasks.len(), "TaskIndex::build: called");
        let mut index = Self::default();
        let mut warnings = Vec::new();
        let mut path = Vec::new();

        for (i, task) in tasks.iter().enumerate() {
            path.push(i);
            index.insert(task, None, &mut path, &mut warnings);
            path.pop();
        }

        debug!(
            entries = index.entries.len(),
            nodes = index.node_count,
            warnings = warnings.len(),
            "TaskIndex::build: complete"
        );
        (index, warnings)
    }

    fn insert(&mut self, node: &TaskNode, parent: Option<&str>, path: &mut Vec<usize>, warnings: &mut Vec<Warning>) {
        self.node_count += 1;

        let entry = IndexEntry {
            path: path.clone(),
            parent_id: parent.map(str::to_string),
            children: node.subtasks.iter().map(|c| c.id.clone()).collect(),
        };
        if self.entries.insert(node.id.clone(), entry).is_some() {
            debug!(id = %node.id, "TaskIndex::insert: duplicate id");
            warnings.push(Warning::DuplicateId { id: node.id.clone() });
        }

        for (i, child) in node.subtasks.iter().enumerate() {
            path.push(i);
            self.insert(child, Some(&node.id), path, warnings);
            path.pop();
        }
    }

    /// Resolve an id to its node in `tasks`
    ///
    /// `tasks` must be the forest this index was built from.
    pub fn get<'a>(&self, tasks: &'a [TaskNode], id: &str) -> Option<&'a TaskNode> {
        let entry = self.entries.get(id)?;
        node_at(tasks, &entry.path)
    }

    /// Get the index entry for an id
    pub fn entry(&self, id: &str) -> Option<&IndexEntry> {
        self.entries.get(id)
    }

    /// Check if an id is indexed
    pub fn contains(&self, id: &str) -> bool {
        self.entries.contains_key(id)
    }

    /// Id of the node owning `id`
    pub fn parent_of(&self, id: &str) -> Option<&str> {
        self.entries.get(id)?.parent_id.as_deref()
    }

    /// Ids of the direct subtasks of `id`
    pub fn children_of(&self, id: &str) -> &[String] {
        self.entries.get(id).map(|e| e.children.as_slice()).unwrap_or_default()
    }

    /// Every indexed id, in no particular order
    pub fn ids(&self) -> impl Iterator<Item = &str> {
        self.entries.keys().map(String::as_str)
    }

    /// Number of distinct ids
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Check if nothing is indexed
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Number of nodes visited while building, duplicates included
    pub fn node_count(&self) -> usize {
        self.node_count
    }
}

/// Follow a child-position path down from the root list
pub fn node_at<'a>(tasks: &'a [TaskNode], path: &[usize]) -> Option<&'a TaskNode> {
    let (first, rest) = path.split_first()?;
    let mut node = tasks.get(*first)?;
    for i in rest {
        node = node.subtasks.get(*i)?;
    }
    Some(node)
}
