//! Structural validation
//!
//! Every check here is advisory. Nothing stops a document from loading; the
//! results are surfaced to callers as read-only diagnostics.

use std::collections::{HashMap, HashSet};

use tracing::debug;

use super::index::TaskIndex;
use crate::domain::{TaskNode, walk_forest};

/// A structural problem found while indexing or validating
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Warning {
    /// The id appears more than once; the later node shadows the earlier
    DuplicateId { id: String },
    /// Status is not one of the defined values
    InvalidStatus { id: String, status: String },
    /// Priority is not one of the defined values
    InvalidPriority { id: String, priority: String },
    /// A dependency id does not resolve
    DanglingDependency { id: String, dependency: String },
    /// Dependency path that returns to its first node
    DependencyCycle { path: Vec<String> },
}

impl std::fmt::Display for Warning {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::DuplicateId { id } => write!(f, "duplicate task id {}", id),
            Self::InvalidStatus { id, status } => write!(f, "task {} has invalid status '{}'", id, status),
            Self::InvalidPriority { id, priority } => {
                write!(f, "task {} has invalid priority '{}'", id, priority)
            }
            Self::DanglingDependency { id, dependency } => {
                write!(f, "task {} depends on missing task {}", id, dependency)
            }
            Self::DependencyCycle { path } if path.len() == 2 => {
                write!(f, "task {} depends on itself", path[0])
            }
            Self::DependencyCycle { path } => write!(f, "circular dependency: {}", path.join(" -> ")),
        }
    }
}

/// Validate enum values and dependency references, then look for cycles
pub fn validate(tasks: &[TaskNode], index: &TaskIndex) -> Vec<Warning> {
    debug!(nodes = index.node_count(), "validate: called");
    let mut warnings = Vec::new();

    walk_forest(tasks, &mut |node| {
        if !node.status.is_known() {
            warnings.push(Warning::InvalidStatus {
                id: node.id.clone(),
                status: node.status.to_string(),
            });
        }
        if let Some(priority) = node.priority.as_ref().filter(|p| !p.is_known()) {
            warnings.push(Warning::InvalidPriority {
                id: node.id.clone(),
                priority: priority.to_string(),
            });
        }
        for dep in &node.dependencies {
            if !index.contains(dep) {
                warnings.push(Warning::DanglingDependency {
                    id: node.id.clone(),
                    dependency: dep.clone(),
                });
            }
        }
    });

    warnings.extend(
        find_cycles(tasks, index)
            .into_iter()
            .map(|path| Warning::DependencyCycle { path }),
    );

    debug!(warnings = warnings.len(), "validate: complete");
    warnings
}

/// Find dependency cycles with a depth-first search over the dependency graph
///
/// Each back edge yields one cycle: the stack slice from the repeated node to
/// the top, closed with the repeated node. Unresolved dependencies are skipped.
pub fn find_cycles(tasks: &[TaskNode], index: &TaskIndex) -> Vec<Vec<String>> {
    debug!("find_cycles: called");
    let mut order: Vec<&str> = Vec::new();
    let mut graph: HashMap<&str, &[String]> = HashMap::new();

    walk_forest(tasks, &mut |node| {
        if graph.contains_key(node.id.as_str()) {
            return;
        }
        // Resolve through the index so a shadowed duplicate is not used
        let deps = index
            .get(tasks, &node.id)
            .map(|n| n.dependencies.as_slice())
            .unwrap_or(node.dependencies.as_slice());
        graph.insert(node.id.as_str(), deps);
        order.push(node.id.as_str());
    });

    let mut visited = HashSet::new();
    let mut stack = Vec::new();
    let mut on_stack = HashSet::new();
    let mut cycles = Vec::new();

    for node in order {
        if !visited.contains(node) {
            cycle_dfs(node, &graph, &mut visited, &mut stack, &mut on_stack, &mut cycles);
        }
    }

    debug!(cycle_count = cycles.len(), "find_cycles: complete");
    cycles
}

fn cycle_dfs<'a>(
    node: &'a str,
    graph: &HashMap<&'a str, &'a [String]>,
    visited: &mut HashSet<&'a str>,
    stack: &mut Vec<&'a str>,
    on_stack: &mut HashSet<&'a str>,
    cycles: &mut Vec<Vec<String>>,
) {
    visited.insert(node);
    stack.push(node);
    on_stack.insert(node);

    for dep in graph.get(node).copied().unwrap_or_default() {
        let dep = dep.as_str();
        if !graph.contains_key(dep) {
            continue;
        }
        if on_stack.contains(dep) {
            let start = stack.iter().position(|n| *n == dep).unwrap_or(0);
            let mut cycle: Vec<String> = stack[start..].iter().map(|n| n.to_string()).collect();
            cycle.push(dep.to_string());
            debug!(?cycle, "cycle_dfs: back edge");
            cycles.push(cycle);
        } else if !visited.contains(dep) {
            cycle_dfs(dep, graph, visited, stack, on_stack, cycles);
        }
    }

    stack.pop();
    on_stack.remove(node);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{Priority, TaskStatus};

    fn check(tasks: &[TaskNode]) -> Vec<Warning> {
        let (index, mut warnings) = TaskIndex::build(tasks);
        warnings.extend(validate(tasks, &index));
        warnings
    }

    fn cycles(warnings: &[Warning]) -> Vec<&Vec<String>> {
        warnings
            .iter()
            .filter_map(|w| match w {
                Warning::DependencyCycle { path } => Some(path),
                _ => None,
            })
            .collect()
    }

    #[test]
    fn test_two_node_cycle() {
        let tasks = vec![
            TaskNode::new("A", "a").with_dependencies(["B"]),
            TaskNode::new("B", "b").with_dependencies(["A"]),
        ];
        let warnings = check(&tasks);
        let found = cycles(&warnings);
        assert_eq!(found.len(), 1);
        assert!(found[0].contains(&"A".to_string()));
        assert!(found[0].contains(&"B".to_string()));
        assert_eq!(*found[0], vec!["A", "B", "A"]);
    }

    #[test]
    fn test_self_cycle_reported_once() {
        let tasks = vec![TaskNode::new("A", "a").with_dependencies(["A"])];
        let warnings = check(&tasks);
        assert_eq!(cycles(&warnings), vec![&vec!["A".to_string(), "A".to_string()]]);
        assert_eq!(warnings[0].to_string(), "task A depends on itself");
    }

    #[test]
    fn test_diamond_has_no_cycle() {
        let tasks = vec![
            TaskNode::new("A", "a"),
            TaskNode::new("B", "b").with_dependencies(["A"]),
            TaskNode::new("C", "c").with_dependencies(["A"]),
            TaskNode::new("D", "d").with_dependencies(["B", "C"]),
        ];
        assert!(check(&tasks).is_empty());
    }

    #[test]
    fn test_three_node_cycle_through_subtasks() {
        let tasks = vec![
            TaskNode::new("1", "a")
                .with_dependencies(["2.1"])
                .with_subtasks(vec![TaskNode::new("1.1", "b")]),
            TaskNode::new("2", "c").with_subtasks(vec![TaskNode::new("2.1", "d").with_dependencies(["3"])]),
            TaskNode::new("3", "e").with_dependencies(["1"]),
        ];
        let warnings = check(&tasks);
        let found = cycles(&warnings);
        assert_eq!(found.len(), 1);
        assert_eq!(*found[0], vec!["1", "2.1", "3", "1"]);
        assert_eq!(warnings[0].to_string(), "circular dependency: 1 -> 2.1 -> 3 -> 1");
    }

    #[test]
    fn test_dangling_dependency_is_warning() {
        let tasks = vec![TaskNode::new("1", "a").with_dependencies(["99"])];
        assert_eq!(
            check(&tasks),
            vec![Warning::DanglingDependency {
                id: "1".to_string(),
                dependency: "99".to_string()
            }]
        );
    }

    #[test]
    fn test_invalid_enums() {
        let mut task = TaskNode::new("1", "a").with_status(TaskStatus::Other("wip".to_string()));
        task.priority = Some(Priority::Other("urgent".to_string()));
        let warnings = check(&[task]);
        assert_eq!(warnings.len(), 2);
        assert!(matches!(&warnings[0], Warning::InvalidStatus { status, .. } if status == "wip"));
        assert!(matches!(&warnings[1], Warning::InvalidPriority { priority, .. } if priority == "urgent"));
    }

    #[test]
    fn test_empty_priority_is_valid() {
        let mut task = TaskNode::new("1", "a");
        task.priority = None;
        assert!(check(&[task]).is_empty());
    }
}
