// Copyright (c) 2025-2026 Adrian Robinson. Licensed under the AGPL-3.0.
// See LICENSE file in the project root for full license text.

use async_trait::async_trait;
use serde_json::{Map, Value};
use thiserror::Error;

use crate::record::Record;
use super::tables::EntityTable;
use super::template::StatementTemplate;

#[derive(Error, Debug)]
pub enum StorageError {
    #[error("Storage backend error: {0}")]
    Backend(String),
    #[error("Statement template error: {0}")]
    Template(String),
    #[error("No '{verb}' statement defined for table '{table}'")]
    MissingTemplate {
        table: &'static str,
        verb: &'static str,
    },
    #[error("Row decode error: {0}")]
    Decode(String),
}

/// Relational row store behind the upsert engine.
///
/// Every method is a single statement against the store; the engine owns
/// the multi-step upsert protocol on top of these primitives.
#[async_trait]
pub trait RowStore: Send + Sync {
    /// All rows of a table.
    async fn query(&self, table: EntityTable) -> Result<Vec<Record>, StorageError>;

    /// Rows of `table` whose `column` equals `value` (child lookups such as
    /// the labels or comments of one task).
    async fn query_where(
        &self,
        table: EntityTable,
        column: &'static str,
        value: &Value,
    ) -> Result<Vec<Record>, StorageError>;

    /// Run a read statement and return its first row, if any.
    async fn fetch_row(
        &self,
        statement: &StatementTemplate,
        values: &Map<String, Value>,
    ) -> Result<Option<Map<String, Value>>, StorageError>;

    /// Run a write statement and return the number of rows it affected.
    async fn execute(
        &self,
        statement: &StatementTemplate,
        values: &Map<String, Value>,
    ) -> Result<u64, StorageError>;

    /// Stamp the `modified` column of one row. Returns rows affected.
    async fn stamp_modified(&self, table: EntityTable, id: &Value) -> Result<u64, StorageError>;
}
