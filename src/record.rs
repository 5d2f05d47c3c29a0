// Copyright (c) 2025-2026 Adrian Robinson. Licensed under the AGPL-3.0.
// See LICENSE file in the project root for full license text.

//! Record data structure.
//!
//! A [`Record`] is the unit that flows through the upsert engine: an ordered
//! column map that always carries an `id`. Records are transient; they are
//! built per remote item (inbound pass) or per store row (verification pass)
//! and dropped after the write they produce.
//!
//! # Example
//!
//! ```
//! use task_sync_engine::Record;
//! use serde_json::json;
//!
//! let record = Record::from_value(json!({
//!     "id": 42,
//!     "due": {"date": "2024-01-01", "is_recurring": false}
//! })).unwrap();
//!
//! let flat = record.flattened();
//! assert_eq!(flat["due_date"], json!("2024-01-01"));
//! assert_eq!(flat["due_is_recurring"], json!(false));
//! ```

use serde::Serialize;
use serde_json::{Map, Value};
use thiserror::Error;

/// Column name every record is keyed on.
pub const ID_COLUMN: &str = "id";

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RecordError {
    #[error("Record has no usable 'id' column")]
    MissingId,
    #[error("Record 'id' is immutable once created")]
    IdImmutable,
    #[error("Record source is not an object: {0}")]
    NotAnObject(String),
}

/// Ordered mapping of column name to value, keyed on a stable `id`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Record {
    fields: Map<String, Value>,
}

impl Record {
    /// Create a record holding only its `id`.
    pub fn new(id: impl Into<Value>) -> Self {
        let mut fields = Map::new();
        fields.insert(ID_COLUMN.to_string(), id.into());
        Self { fields }
    }

    /// Wrap an existing column map. Fails when `id` is absent or null.
    pub fn from_map(fields: Map<String, Value>) -> Result<Self, RecordError> {
        match fields.get(ID_COLUMN) {
            None | Some(Value::Null) => Err(RecordError::MissingId),
            Some(_) => Ok(Self { fields }),
        }
    }

    pub fn from_value(value: Value) -> Result<Self, RecordError> {
        match value {
            Value::Object(map) => Self::from_map(map),
            other => Err(RecordError::NotAnObject(other.to_string())),
        }
    }

    /// Build a record from any schema-typed entity.
    pub fn from_entity<T: Serialize>(entity: &T) -> Result<Self, RecordError> {
        let value = serde_json::to_value(entity)
            .map_err(|e| RecordError::NotAnObject(e.to_string()))?;
        Self::from_value(value)
    }

    pub fn id(&self) -> &Value {
        // from_map guarantees presence
        self.fields.get(ID_COLUMN).unwrap_or(&Value::Null)
    }

    /// Display form of the id, without JSON string quoting.
    pub fn id_display(&self) -> String {
        match self.id() {
            Value::String(s) => s.clone(),
            other => other.to_string(),
        }
    }

    pub fn get(&self, column: &str) -> Option<&Value> {
        self.fields.get(column)
    }

    pub fn contains(&self, column: &str) -> bool {
        self.fields.contains_key(column)
    }

    /// Set a column value. The `id` column cannot be changed.
    pub fn set(&mut self, column: &str, value: impl Into<Value>) -> Result<(), RecordError> {
        if column == ID_COLUMN {
            return Err(RecordError::IdImmutable);
        }
        self.fields.insert(column.to_string(), value.into());
        Ok(())
    }

    /// Builder-style [`set`](Self::set).
    pub fn with(mut self, column: &str, value: impl Into<Value>) -> Result<Self, RecordError> {
        self.set(column, value)?;
        Ok(self)
    }

    /// Loose truthiness of a column: absent, null, `false`, `0`, `""` and
    /// `"0"` are all false.
    #[must_use]
    pub fn flag(&self, column: &str) -> bool {
        self.fields.get(column).is_some_and(truthy)
    }

    /// Integer view of a column, accepting numeric strings.
    pub fn int(&self, column: &str) -> Option<i64> {
        match self.fields.get(column)? {
            Value::Number(n) => n.as_i64().or_else(|| n.as_f64().map(|f| f as i64)),
            Value::String(s) => s.trim().parse().ok(),
            Value::Bool(b) => Some(i64::from(*b)),
            _ => None,
        }
    }

    pub fn fields(&self) -> &Map<String, Value> {
        &self.fields
    }

    pub fn into_map(self) -> Map<String, Value> {
        self.fields
    }

    /// Flatten nested values into storage column names.
    ///
    /// Objects become `parent_child` columns and arrays become
    /// `parent_index` columns, recursively. Scalars pass through.
    #[must_use]
    pub fn flattened(&self) -> Map<String, Value> {
        let mut out = Map::with_capacity(self.fields.len());
        for (name, value) in &self.fields {
            flatten_into(&mut out, name, value);
        }
        out
    }
}

fn flatten_into(out: &mut Map<String, Value>, name: &str, value: &Value) {
    match value {
        Value::Object(children) => {
            for (child, child_value) in children {
                flatten_into(out, &format!("{name}_{child}"), child_value);
            }
        }
        Value::Array(items) => {
            for (index, item) in items.iter().enumerate() {
                flatten_into(out, &format!("{name}_{index}"), item);
            }
        }
        scalar => {
            out.insert(name.to_string(), scalar.clone());
        }
    }
}

/// Loose truthiness used for store flags, which may come back as integers,
/// booleans or text depending on who wrote them.
#[must_use]
pub fn truthy(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64().is_some_and(|f| f != 0.0),
        Value::String(s) => !(s.is_empty() || s == "0"),
        Value::Array(a) => !a.is_empty(),
        Value::Object(o) => !o.is_empty(),
    }
}
