// Copyright (c) 2025-2026 Adrian Robinson. Licensed under the AGPL-3.0.
// See LICENSE file in the project root for full license text.

//! Write outcomes and the per-run results collector.
//!
//! Every store write the engine performs is classified into exactly one
//! [`OutcomeKind`]. Outcomes are appended to a [`SyncStats`] bucket named
//! after the entity being synced and reduced to [`EntitySummary`] rows when
//! the run finishes.

use std::collections::BTreeMap;
use std::fmt;

use serde::Serialize;

/// Classification of one write against the store.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum OutcomeKind {
    Inserted,
    Updated,
    Deleted,
    /// The row exists and nothing in it actually changed.
    Unchanged,
    Failed,
}

impl OutcomeKind {
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Inserted => "inserted",
            Self::Updated => "updated",
            Self::Deleted => "deleted",
            Self::Unchanged => "unchanged",
            Self::Failed => "failed",
        }
    }
}

impl fmt::Display for OutcomeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Result of one upsert/insert/delete call.
///
/// The inserted/updated/deleted views are mutually exclusive because they
/// all derive from a single [`OutcomeKind`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct UpsertOutcome {
    kind: OutcomeKind,
    message: String,
}

impl UpsertOutcome {
    pub fn inserted(message: impl Into<String>) -> Self {
        Self { kind: OutcomeKind::Inserted, message: message.into() }
    }

    pub fn updated(message: impl Into<String>) -> Self {
        Self { kind: OutcomeKind::Updated, message: message.into() }
    }

    pub fn deleted(message: impl Into<String>) -> Self {
        Self { kind: OutcomeKind::Deleted, message: message.into() }
    }

    #[must_use]
    pub fn unchanged() -> Self {
        Self { kind: OutcomeKind::Unchanged, message: String::new() }
    }

    pub fn failed(message: impl Into<String>) -> Self {
        Self { kind: OutcomeKind::Failed, message: message.into() }
    }

    #[must_use]
    pub fn kind(&self) -> OutcomeKind {
        self.kind
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    /// True when a write landed. An unchanged row is a no-op, not a success.
    #[must_use]
    pub fn succeeded(&self) -> bool {
        matches!(
            self.kind,
            OutcomeKind::Inserted | OutcomeKind::Updated | OutcomeKind::Deleted
        )
    }

    #[must_use]
    pub fn is_inserted(&self) -> bool {
        self.kind == OutcomeKind::Inserted
    }

    #[must_use]
    pub fn is_updated(&self) -> bool {
        self.kind == OutcomeKind::Updated
    }

    #[must_use]
    pub fn is_deleted(&self) -> bool {
        self.kind == OutcomeKind::Deleted
    }

    #[must_use]
    pub fn is_unchanged(&self) -> bool {
        self.kind == OutcomeKind::Unchanged
    }

    #[must_use]
    pub fn is_failure(&self) -> bool {
        self.kind == OutcomeKind::Failed
    }
}

/// Per-entity counts reduced from one stats bucket.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct EntitySummary {
    pub entity: String,
    pub success: u64,
    pub inserted: u64,
    pub updated: u64,
    pub deleted: u64,
    pub unchanged: u64,
    pub failed: u64,
}

impl EntitySummary {
    fn reduce(entity: &str, outcomes: &[UpsertOutcome]) -> Self {
        let mut summary = Self { entity: entity.to_string(), ..Self::default() };
        for outcome in outcomes {
            if outcome.succeeded() {
                summary.success += 1;
            }
            match outcome.kind() {
                OutcomeKind::Inserted => summary.inserted += 1,
                OutcomeKind::Updated => summary.updated += 1,
                OutcomeKind::Deleted => summary.deleted += 1,
                OutcomeKind::Unchanged => summary.unchanged += 1,
                OutcomeKind::Failed => summary.failed += 1,
            }
        }
        summary
    }
}

/// Results collector for one run, bucketed by entity name.
///
/// Passed explicitly into each sync pass rather than living in shared state.
#[derive(Debug, Clone, Default)]
pub struct SyncStats {
    buckets: BTreeMap<String, Vec<UpsertOutcome>>,
}

impl SyncStats {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(&mut self, entity: &str, outcome: UpsertOutcome) {
        self.buckets.entry(entity.to_string()).or_default().push(outcome);
    }

    pub fn extend(&mut self, entity: &str, outcomes: impl IntoIterator<Item = UpsertOutcome>) {
        self.buckets.entry(entity.to_string()).or_default().extend(outcomes);
    }

    pub fn outcomes(&self, entity: &str) -> &[UpsertOutcome] {
        self.buckets.get(entity).map_or(&[], Vec::as_slice)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &[UpsertOutcome])> {
        self.buckets.iter().map(|(k, v)| (k.as_str(), v.as_slice()))
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.buckets.is_empty()
    }

    #[must_use]
    pub fn summarize(&self) -> Vec<EntitySummary> {
        self.buckets
            .iter()
            .map(|(entity, outcomes)| EntitySummary::reduce(entity, outcomes))
            .collect()
    }

    #[must_use]
    pub fn summary_for(&self, entity: &str) -> EntitySummary {
        EntitySummary::reduce(entity, self.outcomes(entity))
    }
}
