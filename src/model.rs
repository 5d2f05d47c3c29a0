// Copyright (c) 2025-2026 Adrian Robinson. Licensed under the AGPL-3.0.
// See LICENSE file in the project root for full license text.

//! Schema-typed remote entities.
//!
//! Every entity names the fields the sync engine reads or stores, and keeps
//! anything else the remote sends in a flattened `extra` map so new remote
//! columns survive a round trip without a code change.
//!
//! Flags arrive as booleans or as `0`/`1` depending on endpoint, so they are
//! decoded loosely.

use serde::ser::SerializeMap;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_json::{Map, Value};

use crate::record::{truthy, Record, RecordError};

/// Remote identifiers are integers in the v8 Sync API.
pub type EntityId = i64;

fn loose_flag<'de, D>(deserializer: D) -> Result<bool, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<Value>::deserialize(deserializer)?;
    Ok(value.as_ref().is_some_and(truthy))
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Label {
    pub id: EntityId,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub color: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub item_order: Option<i64>,
    #[serde(default, deserialize_with = "loose_flag")]
    pub is_deleted: bool,
    #[serde(default, deserialize_with = "loose_flag")]
    pub is_favorite: bool,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Project {
    pub id: EntityId,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub color: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parent_id: Option<EntityId>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub child_order: Option<i64>,
    #[serde(default, deserialize_with = "loose_flag")]
    pub is_deleted: bool,
    #[serde(default, deserialize_with = "loose_flag")]
    pub is_archived: bool,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Section {
    pub id: EntityId,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub project_id: Option<EntityId>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub section_order: Option<i64>,
    #[serde(default, deserialize_with = "loose_flag")]
    pub is_deleted: bool,
    #[serde(default, deserialize_with = "loose_flag")]
    pub is_archived: bool,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// Due-date substructure attached to a task.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Due {
    #[serde(default)]
    pub date: Option<String>,
    #[serde(default, deserialize_with = "loose_flag")]
    pub is_recurring: bool,
    #[serde(default)]
    pub string: Option<String>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Task {
    pub id: EntityId,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub project_id: Option<EntityId>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub section_id: Option<EntityId>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parent_id: Option<EntityId>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content: Option<String>,
    /// An absent due date still serializes its columns as null so a cleared
    /// due date reads as a change.
    #[serde(default, serialize_with = "due_or_cleared")]
    pub due: Option<Due>,
    /// Label identifiers currently linked to the task.
    #[serde(default)]
    pub labels: Vec<EntityId>,
    #[serde(default, deserialize_with = "loose_flag")]
    pub checked: bool,
    #[serde(default, deserialize_with = "loose_flag")]
    pub in_history: bool,
    #[serde(default, deserialize_with = "loose_flag")]
    pub is_deleted: bool,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

fn due_or_cleared<S>(due: &Option<Due>, serializer: S) -> Result<S::Ok, S::Error>
where
    S: Serializer,
{
    match due {
        Some(due) => due.serialize(serializer),
        None => {
            let mut map = serializer.serialize_map(Some(3))?;
            map.serialize_entry("date", &Value::Null)?;
            map.serialize_entry("is_recurring", &Value::Null)?;
            map.serialize_entry("string", &Value::Null)?;
            map.end()
        }
    }
}

impl Task {
    /// Derived due-date record: `{id, due_date, due_is_recurring, due_string}`.
    ///
    /// Returns `None` when the task carries no due substructure.
    pub fn due_record(&self) -> Result<Option<Record>, RecordError> {
        let Some(due) = &self.due else {
            return Ok(None);
        };
        let record = Record::new(self.id)
            .with("due_date", due.date.clone())?
            .with("due_is_recurring", due.is_recurring)?
            .with("due_string", due.string.clone())?;
        Ok(Some(record))
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Comment {
    pub id: EntityId,
    /// Owning task (the v8 API still calls tasks "items").
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub item_id: Option<EntityId>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub project_id: Option<EntityId>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content: Option<String>,
    #[serde(default, deserialize_with = "loose_flag")]
    pub is_deleted: bool,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct User {
    pub id: EntityId,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub full_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub karma: Option<f64>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// Full pull of every remote resource collection.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Snapshot {
    #[serde(default)]
    pub labels: Vec<Label>,
    #[serde(default)]
    pub projects: Vec<Project>,
    #[serde(default)]
    pub user: Option<User>,
    #[serde(default)]
    pub sections: Vec<Section>,
    #[serde(default, alias = "items")]
    pub tasks: Vec<Task>,
    #[serde(default, alias = "notes")]
    pub comments: Vec<Comment>,
}

/// A single task as returned by an individual lookup, with its comments.
#[derive(Debug, Clone, Deserialize)]
pub struct TaskDetail {
    #[serde(alias = "item")]
    pub task: Task,
    #[serde(default, alias = "notes")]
    pub comments: Vec<Comment>,
}

/// One page of archived tasks for a project.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ArchivePage {
    #[serde(default, alias = "items")]
    pub tasks: Vec<Task>,
    #[serde(default)]
    pub has_more: bool,
    #[serde(default)]
    pub next_cursor: Option<String>,
}
