//! Impact analysis - what a deletion would take with it

use std::collections::HashSet;

use serde::Serialize;
use tracing::debug;

use crate::domain::{TaskNode, walk_forest};
use crate::graph::TaskIndex;

/// Everything a deletion of `selected` touches
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ImpactReport {
    /// Requested ids that exist, in request order
    pub selected: Vec<String>,

    /// Nodes owned (at any depth) by a removed node
    pub descendants: Vec<String>,

    /// Nodes outside the selection whose dependencies reference a removed node
    pub dependents: Vec<String>,

    /// Requested ids that do not exist
    pub missing: Vec<String>,

    /// Why a non-recursive deletion must not proceed
    pub blocking_reason: Option<String>,
}

impl ImpactReport {
    pub fn is_blocked(&self) -> bool {
        self.blocking_reason.is_some()
    }

    /// Every id the deletion removes
    pub fn removal_set(&self) -> HashSet<String> {
        self.selected
            .iter()
            .chain(&self.descendants)
            .chain(&self.dependents)
            .cloned()
            .collect()
    }

    /// Number of nodes the deletion removes
    pub fn total(&self) -> usize {
        self.selected.len() + self.descendants.len() + self.dependents.len()
    }
}

/// Compute the selection, descendant and dependent sets for `ids`
///
/// Dependents are the nodes whose dependencies name a selected node or one
/// of its descendants. With
/// `recursive` the search repeats over each round of new dependents (and the
/// subtrees they own) until nothing new is found. Without it, any descendant
/// or dependent sets a blocking reason.
pub fn analyze_impact(tasks: &[TaskNode], index: &TaskIndex, ids: &[String], recursive: bool) -> ImpactReport {
    debug!(?ids, recursive, "analyze_impact: called");
    let mut report = ImpactReport::default();
    let mut removed: HashSet<String> = HashSet::new();

    for id in ids {
        if removed.contains(id) {
            continue;
        }
        if index.contains(id) {
            removed.insert(id.clone());
            report.selected.push(id.clone());
        } else if !report.missing.contains(id) {
            report.missing.push(id.clone());
        }
    }

    for id in &report.selected {
        if let Some(node) = index.get(tasks, id) {
            collect_subtree(node, &mut removed, &mut report.descendants);
        }
    }

    let mut frontier: HashSet<String> = report.selected.iter().chain(&report.descendants).cloned().collect();
    while !frontier.is_empty() {
        let mut round = Vec::new();
        walk_forest(tasks, &mut |node| {
            if !removed.contains(&node.id) && node.dependencies.iter().any(|d| frontier.contains(d)) {
                round.push(node);
            }
        });

        let mut next = HashSet::new();
        for node in round {
            if !removed.insert(node.id.clone()) {
                continue;
            }
            report.dependents.push(node.id.clone());
            next.insert(node.id.clone());
            if recursive {
                let start = report.descendants.len();
                collect_subtree(node, &mut removed, &mut report.descendants);
                next.extend(report.descendants[start..].iter().cloned());
            }
        }

        if !recursive {
            break;
        }
        frontier = next;
    }

    if !recursive && (!report.descendants.is_empty() || !report.dependents.is_empty()) {
        report.blocking_reason = Some(blocking_reason(&report));
    }

    debug!(
        selected = report.selected.len(),
        descendants = report.descendants.len(),
        dependents = report.dependents.len(),
        missing = report.missing.len(),
        blocked = report.is_blocked(),
        "analyze_impact: complete"
    );
    report
}

/// Add every node under `node` (not `node` itself) that is not yet removed
fn collect_subtree(node: &TaskNode, removed: &mut HashSet<String>, out: &mut Vec<String>) {
    walk_forest(&node.subtasks, &mut |child| {
        if removed.insert(child.id.clone()) {
            out.push(child.id.clone());
        }
    });
}

fn blocking_reason(report: &ImpactReport) -> String {
    let mut parts = Vec::new();
    if !report.descendants.is_empty() {
        parts.push(format!("{} subtask(s) [{}]", report.descendants.len(), report.descendants.join(", ")));
    }
    if !report.dependents.is_empty() {
        parts.push(format!(
            "{} dependent task(s) [{}]",
            report.dependents.len(),
            report.dependents.join(", ")
        ));
    }
    format!(
        "{} {} {}; delete recursively to remove them too",
        report.selected.join(", "),
        if report.selected.len() == 1 { "has" } else { "have" },
        parts.join(" and ")
    )
}

/// Rebuild the tree without any node whose id is in `remove`, at every depth
///
/// Removing a node removes its whole subtree.
pub fn prune_tasks(tasks: &[TaskNode], remove: &HashSet<String>) -> Vec<TaskNode> {
    tasks
        .iter()
        .filter(|node| !remove.contains(&node.id))
        .map(|node| {
            let mut kept = node.clone();
            kept.subtasks = prune_tasks(&node.subtasks, remove);
            kept
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ids(items: &[&str]) -> Vec<String> {
        items.iter().map(|s| s.to_string()).collect()
    }

    fn analyze(tasks: &[TaskNode], targets: &[&str], recursive: bool) -> ImpactReport {
        let (index, _) = TaskIndex::build(tasks);
        analyze_impact(tasks, &index, &ids(targets), recursive)
    }

    fn sample() -> Vec<TaskNode> {
        vec![
            TaskNode::new("1", "a").with_subtasks(vec![
                TaskNode::new("1.1", "b"),
                TaskNode::new("1.2", "c").with_subtasks(vec![TaskNode::new("1.2.1", "d")]),
            ]),
            TaskNode::new("2", "e").with_dependencies(["1"]),
            TaskNode::new("3", "f")
                .with_dependencies(["2"])
                .with_subtasks(vec![TaskNode::new("3.1", "g")]),
            TaskNode::new("4", "h").with_dependencies(["3.1"]),
            TaskNode::new("5", "i"),
        ]
    }

    #[test]
    fn test_leaf_without_dependents_not_blocked() {
        let report = analyze(&sample(), &["5"], false);
        assert_eq!(report.selected, ids(&["5"]));
        assert!(report.descendants.is_empty());
        assert!(report.dependents.is_empty());
        assert!(!report.is_blocked());
    }

    #[test]
    fn test_subtasks_block_non_recursive() {
        let report = analyze(&sample(), &["1.2"], false);
        assert_eq!(report.descendants, ids(&["1.2.1"]));
        let reason = report.blocking_reason.unwrap();
        assert!(reason.contains("1.2.1"), "{}", reason);
    }

    #[test]
    fn test_direct_dependents_only_when_not_recursive() {
        let report = analyze(&sample(), &["1"], false);
        assert_eq!(report.descendants, ids(&["1.1", "1.2", "1.2.1"]));
        assert_eq!(report.dependents, ids(&["2"]));
        assert!(report.is_blocked());
    }

    #[test]
    fn test_recursive_closure() {
        let report = analyze(&sample(), &["1"], true);
        assert_eq!(report.dependents, ids(&["2", "3", "4"]));
        assert_eq!(report.descendants, ids(&["1.1", "1.2", "1.2.1", "3.1"]));
        assert!(!report.is_blocked());
        assert_eq!(report.total(), 8);
    }

    #[test]
    fn test_dependent_of_descendant() {
        let report = analyze(&sample(), &["3"], false);
        assert_eq!(report.descendants, ids(&["3.1"]));
        assert_eq!(report.dependents, ids(&["4"]));
    }

    #[test]
    fn test_missing_and_duplicate_targets() {
        let report = analyze(&sample(), &["5", "99", "5", "99"], false);
        assert_eq!(report.selected, ids(&["5"]));
        assert_eq!(report.missing, ids(&["99"]));
    }

    #[test]
    fn test_selected_child_of_selected_parent_counted_once() {
        let report = analyze(&sample(), &["1", "1.1"], true);
        assert_eq!(report.selected, ids(&["1", "1.1"]));
        assert!(!report.descendants.contains(&"1.1".to_string()));
    }

    #[test]
    fn test_prune_every_depth() {
        let remove: HashSet<String> = ids(&["1.2", "4"]).into_iter().collect();
        let pruned = prune_tasks(&sample(), &remove);
        let mut remaining = Vec::new();
        walk_forest(&pruned, &mut |n| remaining.push(n.id.clone()));
        assert_eq!(remaining, ids(&["1", "1.1", "2", "3", "3.1", "5"]));
    }
}
