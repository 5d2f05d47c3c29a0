// Copyright (c) 2025-2026 Adrian Robinson. Licensed under the AGPL-3.0.
// See LICENSE file in the project root for full license text.

//! Upsert engine.
//!
//! Writes one [`Record`] into one logical table and classifies the result.
//!
//! # Upsert protocol
//!
//! ```text
//! before ← read current row by id (if the table defines a before read)
//! n      ← execute update
//! n == 0 → execute insert          → Inserted | Failed
//! n == 1 → row_changed(before, r)?
//!            yes → stamp modified  → Updated  | Failed
//!            no                    → Unchanged
//! n >  1 → integrity anomaly       → Failed
//! ```
//!
//! Store errors never escape as `Err`: every call yields exactly one
//! [`UpsertOutcome`]. There is no transaction around the steps; the store is
//! owned by a single sequential run.

pub mod change;

use std::sync::Arc;

use serde_json::{Map, Value};
use tracing::{debug, error, warn};

use crate::metrics;
use crate::outcome::UpsertOutcome;
use crate::record::Record;
use crate::storage::{EntityTable, RowStore, Verb};

pub use change::{loose_eq, row_changed};

#[derive(Clone)]
pub struct UpsertEngine {
    store: Arc<dyn RowStore>,
}

impl UpsertEngine {
    pub fn new(store: Arc<dyn RowStore>) -> Self {
        Self { store }
    }

    pub fn store(&self) -> &Arc<dyn RowStore> {
        &self.store
    }

    /// Idempotent insert-or-update keyed on the record id.
    pub async fn upsert(&self, table: EntityTable, record: &Record) -> UpsertOutcome {
        let values = record.flattened();
        let id = record.id_display();

        let before = match self.read_before(table, &values).await {
            Ok(before) => before,
            Err(message) => return self.finish(table, &id, UpsertOutcome::failed(message)),
        };

        let update = match table.statement(Verb::Update) {
            Ok(stmt) => stmt,
            Err(e) => return self.finish(table, &id, UpsertOutcome::failed(e.to_string())),
        };

        let affected = match self.store.execute(&update, &values).await {
            Ok(n) => n,
            Err(e) => {
                let outcome = UpsertOutcome::failed(format!("Error running initial update: {e}"));
                return self.finish(table, &id, outcome);
            }
        };

        let outcome = match affected {
            0 => self.run_insert(table, &values, &id).await,
            1 => {
                let changed = before.as_ref().is_some_and(|row| row_changed(row, &values));
                if changed {
                    self.stamp(table, record.id(), &id).await
                } else {
                    UpsertOutcome::unchanged()
                }
            }
            n => {
                error!(table = %table, id = %id, rows = n, "Update touched more than one row");
                UpsertOutcome::failed(format!(
                    "Integrity anomaly: update of {table} row {id} affected {n} rows"
                ))
            }
        };

        self.finish(table, &id, outcome)
    }

    /// Run the table's insert statement only.
    pub async fn insert(&self, table: EntityTable, record: &Record) -> UpsertOutcome {
        let values = record.flattened();
        let id = record.id_display();
        let outcome = self.run_insert(table, &values, &id).await;
        self.finish(table, &id, outcome)
    }

    /// Run the table's delete statement only.
    pub async fn delete(&self, table: EntityTable, record: &Record) -> UpsertOutcome {
        let values = record.flattened();
        let id = record.id_display();

        let outcome = match table.statement(Verb::Delete) {
            Ok(stmt) => match self.store.execute(&stmt, &values).await {
                Ok(_) => UpsertOutcome::deleted(format!("Deleted {table} row {id}")),
                Err(e) => UpsertOutcome::failed(format!("Delete failed: {e}")),
            },
            Err(e) => UpsertOutcome::failed(e.to_string()),
        };

        self.finish(table, &id, outcome)
    }

    async fn read_before(
        &self,
        table: EntityTable,
        values: &Map<String, Value>,
    ) -> Result<Option<Map<String, Value>>, String> {
        if table.template(Verb::Before).is_none() {
            return Ok(None);
        }
        let stmt = table.statement(Verb::Before).map_err(|e| e.to_string())?;
        self.store
            .fetch_row(&stmt, values)
            .await
            .map_err(|e| format!("Error reading current row: {e}"))
    }

    async fn run_insert(
        &self,
        table: EntityTable,
        values: &Map<String, Value>,
        id: &str,
    ) -> UpsertOutcome {
        let stmt = match table.statement(Verb::Insert) {
            Ok(stmt) => stmt,
            Err(e) => return UpsertOutcome::failed(e.to_string()),
        };
        match self.store.execute(&stmt, values).await {
            Ok(_) => UpsertOutcome::inserted(format!("Inserted {table} row {id}")),
            Err(e) => UpsertOutcome::failed(format!("Insert failed: {e}")),
        }
    }

    async fn stamp(&self, table: EntityTable, raw_id: &Value, id: &str) -> UpsertOutcome {
        match self.store.stamp_modified(table, raw_id).await {
            Ok(1) => UpsertOutcome::updated(format!("Updated {table} row {id}")),
            Ok(n) => UpsertOutcome::failed(format!(
                "Modified stamp on {} row {id} affected {n} rows",
                table.physical()
            )),
            Err(e) => UpsertOutcome::failed(format!("Error stamping modified: {e}")),
        }
    }

    fn finish(&self, table: EntityTable, id: &str, outcome: UpsertOutcome) -> UpsertOutcome {
        if outcome.is_failure() {
            warn!(table = %table, id = %id, error = %outcome.message(), "Store write failed");
        } else {
            debug!(table = %table, id = %id, outcome = %outcome.kind(), "Store write classified");
        }
        metrics::record_outcome(table.name(), outcome.kind());
        outcome
    }
}
