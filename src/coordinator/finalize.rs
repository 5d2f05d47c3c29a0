// Copyright (c) 2025-2026 Adrian Robinson. Licensed under the AGPL-3.0.
// See LICENSE file in the project root for full license text.

//! Finalize: reduce stats to import-history rows.

use tracing::{instrument, warn};

use super::SyncCoordinator;
use crate::metrics::PassTimer;
use crate::outcome::{EntitySummary, SyncStats, UpsertOutcome};
use crate::record::{Record, RecordError};
use crate::storage::EntityTable;

fn history_record(batch: &str, summary: &EntitySummary) -> Result<Record, RecordError> {
    Record::new(format!("{batch}:{}", summary.entity))
        .with("batch", batch)?
        .with("entity", summary.entity.as_str())?
        .with("success", summary.success)?
        .with("inserted", summary.inserted)?
        .with("updated", summary.updated)?
        .with("deleted", summary.deleted)
}

impl SyncCoordinator {
    /// One insert-only history row per stats bucket.
    #[instrument(skip(self, stats))]
    pub(super) async fn finalize(&self, batch: &str, stats: &SyncStats) -> Vec<UpsertOutcome> {
        let _timer = PassTimer::new("finalize");
        let mut outcomes = Vec::new();

        for summary in stats.summarize() {
            let outcome = match history_record(batch, &summary) {
                Ok(record) => self.engine.insert(EntityTable::ImportHistory, &record).await,
                Err(e) => UpsertOutcome::failed(e.to_string()),
            };
            if outcome.is_failure() {
                warn!(entity = %summary.entity, error = %outcome.message(), "Import history write failed");
            }
            outcomes.push(outcome);
        }
        outcomes
    }
}
