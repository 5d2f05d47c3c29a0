// Copyright (c) 2025-2026 Adrian Robinson. Licensed under the AGPL-3.0.
// See LICENSE file in the project root for full license text.

//! Statement templates.
//!
//! Templates are plain SQL with `$column` placeholders. Compiling a template
//! turns every placeholder into a positional `?` parameter and remembers the
//! column name it stands for, so record values are always bound, never
//! spliced into the SQL text.
//!
//! Binding applies the record coercion rules:
//! - `false` / `true` bind as `0` / `1`
//! - `null` and the literal string `"null"` bind as SQL `NULL`
//! - numbers bind verbatim (integer or real)
//! - everything else binds as text
//!
//! ```
//! use task_sync_engine::storage::template::{StatementTemplate, BindValue};
//! use serde_json::json;
//!
//! let stmt = StatementTemplate::compile("UPDATE t SET done = $done WHERE id = $id").unwrap();
//! assert_eq!(stmt.sql(), "UPDATE t SET done = ? WHERE id = ?");
//!
//! let values = json!({"id": 3, "done": false});
//! let binds = stmt.bindings(values.as_object().unwrap());
//! assert_eq!(binds, vec![BindValue::Integer(0), BindValue::Integer(3)]);
//! ```

use serde_json::{Map, Value};
use tracing::trace;

use super::traits::StorageError;

/// A single positional parameter value.
#[derive(Debug, Clone, PartialEq)]
pub enum BindValue {
    Null,
    Integer(i64),
    Real(f64),
    Text(String),
}

impl BindValue {
    #[must_use]
    pub fn from_json(value: &Value) -> Self {
        match value {
            Value::Null => Self::Null,
            Value::Bool(b) => Self::Integer(i64::from(*b)),
            Value::Number(n) => match n.as_i64() {
                Some(i) => Self::Integer(i),
                None => n.as_f64().map_or(Self::Null, Self::Real),
            },
            Value::String(s) if s == "null" => Self::Null,
            Value::String(s) => Self::Text(s.clone()),
            // flattened records never carry these, but keep them bindable
            nested @ (Value::Array(_) | Value::Object(_)) => Self::Text(nested.to_string()),
        }
    }
}

/// A compiled `$name` template.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StatementTemplate {
    sql: String,
    params: Vec<String>,
}

impl StatementTemplate {
    pub fn compile(source: &str) -> Result<Self, StorageError> {
        let source = source.trim();
        let mut sql = String::with_capacity(source.len());
        let mut params = Vec::new();
        let mut chars = source.char_indices().peekable();

        while let Some((start, c)) = chars.next() {
            if c != '$' {
                sql.push(c);
                continue;
            }
            let mut end = start + 1;
            while let Some(&(idx, next)) = chars.peek() {
                let valid = if idx == start + 1 {
                    next.is_ascii_alphabetic() || next == '_'
                } else {
                    next.is_ascii_alphanumeric() || next == '_'
                };
                if !valid {
                    break;
                }
                end = idx + next.len_utf8();
                chars.next();
            }
            if end == start + 1 {
                return Err(StorageError::Template(format!(
                    "dangling '$' at offset {start}"
                )));
            }
            params.push(source[start + 1..end].to_string());
            sql.push('?');
        }

        Ok(Self { sql, params })
    }

    pub fn sql(&self) -> &str {
        &self.sql
    }

    /// Column names in placeholder order. Repeated placeholders repeat.
    pub fn params(&self) -> &[String] {
        &self.params
    }

    /// Resolve placeholder values from a flattened column map.
    ///
    /// Columns the map does not carry bind as `NULL`.
    #[must_use]
    pub fn bindings(&self, values: &Map<String, Value>) -> Vec<BindValue> {
        self.params
            .iter()
            .map(|name| match values.get(name) {
                Some(value) => BindValue::from_json(value),
                None => {
                    trace!(column = %name, "Unbound placeholder, binding NULL");
                    BindValue::Null
                }
            })
            .collect()
    }
}
