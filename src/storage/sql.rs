// Copyright (c) 2025-2026 Adrian Robinson. Licensed under the AGPL-3.0.
// See LICENSE file in the project root for full license text.

//! SQLite row store for the local mirror.
//!
//! One connection, one writer: the sync run is sequential and SQLite's
//! affected-row count is per connection, so the pool is pinned to a single
//! long-lived connection. That also keeps `sqlite::memory:` databases alive
//! for the lifetime of the store.
//!
//! Rows are decoded dynamically into [`Record`]s using each value's SQLite
//! storage class:
//!
//! | storage class | JSON value          |
//! |---------------|---------------------|
//! | `NULL`        | `null`              |
//! | `INTEGER`     | number (i64)        |
//! | `REAL`        | number (f64)        |
//! | `TEXT`        | string              |
//! | `BLOB`        | string (lossy UTF-8)|

use std::str::FromStr;
use std::time::Duration;

use async_trait::async_trait;
use serde_json::{Map, Number, Value};
use sqlx::query::Query;
use sqlx::sqlite::{
    Sqlite, SqliteArguments, SqliteConnectOptions, SqlitePool, SqlitePoolOptions, SqliteRow,
};
use sqlx::{Column, Row, TypeInfo, ValueRef};
use tracing::{debug, info};

use crate::record::Record;
use crate::resilience::retry::{retry, RetryConfig};
use super::tables::{EntityTable, SCHEMA};
use super::template::{BindValue, StatementTemplate};
use super::traits::{RowStore, StorageError};

fn backend(e: sqlx::Error) -> StorageError {
    StorageError::Backend(e.to_string())
}

pub struct SqliteStore {
    pool: SqlitePool,
}

impl SqliteStore {
    /// Open (creating if needed) the database and bootstrap the schema.
    ///
    /// Uses startup-mode retry so a bad path fails fast.
    pub async fn connect(url: &str) -> Result<Self, StorageError> {
        Self::connect_with_retry(url, &RetryConfig::startup()).await
    }

    pub async fn connect_with_retry(url: &str, config: &RetryConfig) -> Result<Self, StorageError> {
        let options = SqliteConnectOptions::from_str(url)
            .map_err(backend)?
            .create_if_missing(true);

        let pool = retry("sqlite_connect", config, || {
            let options = options.clone();
            async move {
                SqlitePoolOptions::new()
                    .max_connections(1)
                    .min_connections(1)
                    .idle_timeout(None::<Duration>)
                    .max_lifetime(None::<Duration>)
                    .connect_with(options)
                    .await
                    .map_err(backend)
            }
        })
        .await?;

        let store = Self { pool };
        store.init_schema().await?;
        info!(url = %url, "Local store ready");
        Ok(store)
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    async fn init_schema(&self) -> Result<(), StorageError> {
        for statement in SCHEMA.split(';').map(str::trim).filter(|s| !s.is_empty()) {
            sqlx::query(statement)
                .execute(&self.pool)
                .await
                .map_err(|e| StorageError::Backend(format!("Schema bootstrap failed: {e}")))?;
        }
        Ok(())
    }

    fn bind_all<'q>(
        mut query: Query<'q, Sqlite, SqliteArguments<'q>>,
        binds: Vec<BindValue>,
    ) -> Query<'q, Sqlite, SqliteArguments<'q>> {
        for bind in binds {
            query = match bind {
                BindValue::Null => query.bind(None::<String>),
                BindValue::Integer(i) => query.bind(i),
                BindValue::Real(f) => query.bind(f),
                BindValue::Text(s) => query.bind(s),
            };
        }
        query
    }

    fn decode_row(row: &SqliteRow) -> Result<Map<String, Value>, StorageError> {
        let mut map = Map::with_capacity(row.columns().len());
        for column in row.columns() {
            let index = column.ordinal();
            let raw = row
                .try_get_raw(index)
                .map_err(|e| StorageError::Decode(e.to_string()))?;
            let value = if raw.is_null() {
                Value::Null
            } else {
                let storage_class = raw.type_info().name().to_ascii_uppercase();
                match storage_class.as_str() {
                    "INTEGER" | "BOOLEAN" | "INT8" => row
                        .try_get::<i64, _>(index)
                        .map(Value::from)
                        .map_err(|e| StorageError::Decode(e.to_string()))?,
                    "REAL" => row
                        .try_get::<f64, _>(index)
                        .ok()
                        .and_then(Number::from_f64)
                        .map_or(Value::Null, Value::Number),
                    "BLOB" => row
                        .try_get::<Vec<u8>, _>(index)
                        .map(|bytes| Value::String(String::from_utf8_lossy(&bytes).into_owned()))
                        .map_err(|e| StorageError::Decode(e.to_string()))?,
                    _ => row
                        .try_get::<String, _>(index)
                        .map(Value::String)
                        .map_err(|e| StorageError::Decode(e.to_string()))?,
                }
            };
            map.insert(column.name().to_string(), value);
        }
        Ok(map)
    }

    fn decode_records(rows: &[SqliteRow]) -> Result<Vec<Record>, StorageError> {
        rows.iter()
            .map(|row| {
                let map = Self::decode_row(row)?;
                Record::from_map(map).map_err(|e| StorageError::Decode(e.to_string()))
            })
            .collect()
    }
}

#[async_trait]
impl RowStore for SqliteStore {
    async fn query(&self, table: EntityTable) -> Result<Vec<Record>, StorageError> {
        let sql = format!("SELECT * FROM \"{}\" ORDER BY rowid", table.physical());
        let rows = sqlx::query(&sql).fetch_all(&self.pool).await.map_err(backend)?;
        Self::decode_records(&rows)
    }

    async fn query_where(
        &self,
        table: EntityTable,
        column: &'static str,
        value: &Value,
    ) -> Result<Vec<Record>, StorageError> {
        let sql = format!("SELECT * FROM \"{}\" WHERE \"{}\" = ?", table.physical(), column);
        let query = Self::bind_all(sqlx::query(&sql), vec![BindValue::from_json(value)]);
        let rows = query.fetch_all(&self.pool).await.map_err(backend)?;

        // Link tables have no id column of their own
        rows.iter()
            .map(|row| {
                let mut map = Self::decode_row(row)?;
                if !map.contains_key("id") {
                    map.insert("id".to_string(), value.clone());
                }
                Record::from_map(map).map_err(|e| StorageError::Decode(e.to_string()))
            })
            .collect()
    }

    async fn fetch_row(
        &self,
        statement: &StatementTemplate,
        values: &Map<String, Value>,
    ) -> Result<Option<Map<String, Value>>, StorageError> {
        let query = Self::bind_all(sqlx::query(statement.sql()), statement.bindings(values));
        let row = query.fetch_optional(&self.pool).await.map_err(backend)?;
        row.as_ref().map(Self::decode_row).transpose()
    }

    async fn execute(
        &self,
        statement: &StatementTemplate,
        values: &Map<String, Value>,
    ) -> Result<u64, StorageError> {
        let query = Self::bind_all(sqlx::query(statement.sql()), statement.bindings(values));
        let result = query.execute(&self.pool).await.map_err(backend)?;
        debug!(rows = result.rows_affected(), sql = %statement.sql(), "Statement executed");
        Ok(result.rows_affected())
    }

    async fn stamp_modified(&self, table: EntityTable, id: &Value) -> Result<u64, StorageError> {
        let sql = format!(
            "UPDATE \"{}\" SET modified = CURRENT_TIMESTAMP WHERE id = ?",
            table.physical()
        );
        let query = Self::bind_all(sqlx::query(&sql), vec![BindValue::from_json(id)]);
        let result = query.execute(&self.pool).await.map_err(backend)?;
        Ok(result.rows_affected())
    }
}
