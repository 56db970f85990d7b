//! Document loader - bytes to task tree

use serde_json::{Map, Value};
use tracing::debug;

use super::{DocumentShape, LoadedDocument, TASKS_KEY};
use crate::domain::{Priority, SUBTASKS_KEY, TaskNode, TaskStatus};
use crate::error::{SyncError, SyncResult};

/// Parse raw document bytes into a task tree
///
/// Detection order: the `tag` context if present and holding a `tasks` array,
/// then a root-level `tasks` array, then a bare array.
pub fn parse_document(bytes: &[u8], tag: &str) -> SyncResult<LoadedDocument> {
    debug!(len = bytes.len(), %tag, "parse_document: called");
    let root: Value = serde_json::from_slice(bytes).map_err(|e| SyncError::MalformedDocument(e.to_string()))?;

    let (shape, array) = detect_shape(&root, tag)?;
    debug!(%shape, count = array.len(), "parse_document: shape detected");

    let tasks = array
        .iter()
        .enumerate()
        .map(|(i, value)| parse_task(value, None, &format!("tasks[{}]", i)))
        .collect::<SyncResult<Vec<_>>>()?;

    Ok(LoadedDocument { shape, tasks })
}

/// List the contexts of a tagged document
///
/// Returns an empty list for flat and array documents.
pub fn list_tags(bytes: &[u8]) -> SyncResult<Vec<String>> {
    let root: Value = serde_json::from_slice(bytes).map_err(|e| SyncError::MalformedDocument(e.to_string()))?;
    let Value::Object(map) = root else {
        return Ok(Vec::new());
    };
    Ok(map
        .iter()
        .filter(|(_, v)| v.get(TASKS_KEY).is_some_and(Value::is_array))
        .map(|(k, _)| k.clone())
        .collect())
}

fn detect_shape<'a>(root: &'a Value, tag: &str) -> SyncResult<(DocumentShape, &'a Vec<Value>)> {
    match root {
        Value::Object(map) => {
            if let Some(array) = map.get(tag).and_then(|ctx| ctx.get(TASKS_KEY)).and_then(Value::as_array) {
                return Ok((DocumentShape::Tagged { tag: tag.to_string() }, array));
            }
            if let Some(array) = map.get(TASKS_KEY).and_then(Value::as_array) {
                return Ok((DocumentShape::Flat, array));
            }
            Err(SyncError::UnrecognizedDocumentShape(format!(
                "object has neither a '{}' context nor a root '{}' array",
                tag, TASKS_KEY
            )))
        }
        Value::Array(array) => Ok((DocumentShape::Array, array)),
        other => Err(SyncError::UnrecognizedDocumentShape(format!(
            "top-level value is {}",
            json_kind(other)
        ))),
    }
}

/// Normalise a numeric or string identifier to its string form
///
/// Returns `None` for empty strings and non-scalar values.
pub fn normalize_id(value: &Value) -> Option<String> {
    match value {
        Value::Number(n) => Some(n.to_string()),
        Value::String(s) if !s.trim().is_empty() => Some(s.trim().to_string()),
        _ => None,
    }
}

/// Qualify a local id with its parent ("2" under "1" is "1.2")
fn qualify(id: String, parent: Option<&str>) -> String {
    match parent {
        Some(parent) if !id.contains('.') => format!("{}.{}", parent, id),
        _ => id,
    }
}

fn parse_task(value: &Value, parent: Option<&str>, path: &str) -> SyncResult<TaskNode> {
    let Value::Object(object) = value else {
        return Err(SyncError::MalformedDocument(format!(
            "{} is {}, expected an object",
            path,
            json_kind(value)
        )));
    };

    let raw_id = object
        .get("id")
        .and_then(normalize_id)
        .ok_or_else(|| SyncError::MalformedDocument(format!("{} has no usable id", path)))?;
    let id = qualify(raw_id, parent);

    let status = match object.get("status") {
        None | Some(Value::Null) => TaskStatus::Pending,
        Some(Value::String(s)) => TaskStatus::from(s.clone()),
        Some(other) => TaskStatus::Other(other.to_string()),
    };

    let priority = match object.get("priority") {
        Some(Value::String(s)) if !s.is_empty() => Some(Priority::from(s.clone())),
        None | Some(Value::Null) | Some(Value::String(_)) => None,
        Some(other) => Some(Priority::Other(other.to_string())),
    };

    let dependencies = parse_dependencies(object, parent, path)?;

    let mut source = object.clone();
    let subtasks = match source.get_mut(SUBTASKS_KEY) {
        Some(Value::Array(children)) => {
            let children = std::mem::take(children);
            children
                .iter()
                .enumerate()
                .map(|(i, child)| parse_task(child, Some(&id), &format!("{}.subtasks[{}]", path, i)))
                .collect::<SyncResult<Vec<_>>>()?
        }
        _ => Vec::new(),
    };

    Ok(TaskNode {
        title: text(object, &["title"]),
        description: text(object, &["description"]),
        details: text(object, &["details"]),
        test_strategy: text(object, &["testStrategy", "test_strategy"]),
        status,
        priority,
        dependencies,
        subtasks,
        parent_id: parent.unwrap_or_default().to_string(),
        source,
        id,
    })
}

/// Numeric entries inside a subtask are sibling references and get qualified
fn parse_dependencies(object: &Map<String, Value>, parent: Option<&str>, path: &str) -> SyncResult<Vec<String>> {
    let Some(deps) = object.get("dependencies") else {
        return Ok(Vec::new());
    };
    let Value::Array(deps) = deps else {
        if deps.is_null() {
            return Ok(Vec::new());
        }
        return Err(SyncError::MalformedDocument(format!(
            "{}.dependencies is {}, expected an array",
            path,
            json_kind(deps)
        )));
    };

    deps.iter()
        .map(|dep| {
            let id = normalize_id(dep).ok_or_else(|| {
                SyncError::MalformedDocument(format!("{} has an unusable dependency {}", path, dep))
            })?;
            Ok(if dep.is_number() { qualify(id, parent) } else { id })
        })
        .collect()
}

fn text(object: &Map<String, Value>, keys: &[&str]) -> String {
    keys.iter()
        .find_map(|k| object.get(*k))
        .map(|v| match v {
            Value::String(s) => s.clone(),
            Value::Null => String::new(),
            other => other.to_string(),
        })
        .unwrap_or_default()
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tagged_shape() {
        let doc = br#"{"master": {"tasks": [{"id": 1, "title": "A", "status": "pending"}]}}"#;
        let loaded = parse_document(doc, "master").unwrap();
        assert_eq!(
            loaded.shape,
            DocumentShape::Tagged {
                tag: "master".to_string()
            }
        );
        assert_eq!(loaded.tasks[0].id, "1");
    }

    #[test]
    fn test_flat_shape_when_tag_missing() {
        let doc = br#"{"tasks": [{"id": "1", "title": "A"}], "metadata": {"version": 2}}"#;
        let loaded = parse_document(doc, "master").unwrap();
        assert_eq!(loaded.shape, DocumentShape::Flat);
        assert_eq!(loaded.tasks.len(), 1);
    }

    #[test]
    fn test_array_shape() {
        let doc = br#"[{"id": 1, "title": "A"}, {"id": 2, "title": "B"}]"#;
        let loaded = parse_document(doc, "master").unwrap();
        assert_eq!(loaded.shape, DocumentShape::Array);
        assert_eq!(loaded.tasks.len(), 2);
    }

    #[test]
    fn test_tag_without_tasks_falls_through() {
        let doc = br#"{"master": {"metadata": {}}, "tasks": []}"#;
        let loaded = parse_document(doc, "master").unwrap();
        assert_eq!(loaded.shape, DocumentShape::Flat);
    }

    #[test]
    fn test_malformed_json() {
        let err = parse_document(b"{not json", "master").unwrap_err();
        assert!(matches!(err, SyncError::MalformedDocument(_)));
    }

    #[test]
    fn test_unrecognized_shape() {
        let err = parse_document(br#"{"foo": 1}"#, "master").unwrap_err();
        assert!(matches!(err, SyncError::UnrecognizedDocumentShape(_)));

        let err = parse_document(b"42", "master").unwrap_err();
        assert!(matches!(err, SyncError::UnrecognizedDocumentShape(_)));
    }

    #[test]
    fn test_ids_normalized_and_qualified() {
        let doc = br#"[
            {"id": 3, "title": "Parent", "dependencies": [1, "2"], "subtasks": [
                {"id": 1, "title": "Child", "dependencies": [2, "1"]},
                {"id": "3.2", "title": "Already qualified"}
            ]}
        ]"#;
        let loaded = parse_document(doc, "master").unwrap();
        let parent = &loaded.tasks[0];
        assert_eq!(parent.id, "3");
        assert_eq!(parent.dependencies, vec!["1", "2"]);
        assert_eq!(parent.subtasks[0].id, "3.1");
        assert_eq!(parent.subtasks[0].parent_id, "3");
        assert_eq!(parent.subtasks[0].dependencies, vec!["3.2", "1"]);
        assert_eq!(parent.subtasks[1].id, "3.2");
    }

    #[test]
    fn test_fields_and_enums() {
        let doc = br#"[{"id": 1, "title": "T", "description": "D", "details": "X",
            "testStrategy": "S", "status": "review", "priority": ""}]"#;
        let task = &parse_document(doc, "master").unwrap().tasks[0];
        assert_eq!(task.description, "D");
        assert_eq!(task.details, "X");
        assert_eq!(task.test_strategy, "S");
        assert_eq!(task.status, TaskStatus::Other("review".to_string()));
        assert_eq!(task.priority, None);
    }

    #[test]
    fn test_missing_id_is_malformed() {
        let err = parse_document(br#"[{"title": "no id"}]"#, "master").unwrap_err();
        assert!(err.to_string().contains("tasks[0]"));
    }

    #[test]
    fn test_list_tags() {
        let doc = br#"{"master": {"tasks": []}, "feature": {"tasks": []}, "settings": {"x": 1}}"#;
        assert_eq!(list_tags(doc).unwrap(), vec!["master", "feature"]);
        assert!(list_tags(b"[]").unwrap().is_empty());
    }
}
