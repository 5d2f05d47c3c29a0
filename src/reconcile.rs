// Copyright (c) 2025-2026 Adrian Robinson. Licensed under the AGPL-3.0.
// See LICENSE file in the project root for full license text.

//! Many-to-many association reconciliation.
//!
//! Diffs the remote and local member sets of one owner and applies the
//! minimal delta through the engine's delete/insert primitives: all removals
//! first, then all additions. Equal sets produce no writes.
//!
//! # Example
//!
//! ```
//! use task_sync_engine::reconcile::diff_sets;
//!
//! let delta = diff_sets([9, 15], [3, 9]);
//! assert_eq!(delta.to_add, vec![15]);
//! assert_eq!(delta.to_remove, vec![3]);
//! ```

use std::collections::BTreeSet;

use serde_json::json;
use tracing::debug;

use crate::engine::UpsertEngine;
use crate::model::EntityId;
use crate::outcome::UpsertOutcome;
use crate::record::{Record, RecordError};
use crate::storage::{EntityTable, StorageError};

/// Minimal change set turning `local` into `remote`.
///
/// Both sides are sorted and free of duplicates, and never share an element.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AssociationDelta<T> {
    pub to_add: Vec<T>,
    pub to_remove: Vec<T>,
}

impl<T> AssociationDelta<T> {
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.to_add.is_empty() && self.to_remove.is_empty()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.to_add.len() + self.to_remove.len()
    }
}

/// Set difference in both directions. Input order and duplicates are
/// irrelevant.
pub fn diff_sets<T, R, L>(remote: R, local: L) -> AssociationDelta<T>
where
    T: Ord + Clone,
    R: IntoIterator<Item = T>,
    L: IntoIterator<Item = T>,
{
    let remote: BTreeSet<T> = remote.into_iter().collect();
    let local: BTreeSet<T> = local.into_iter().collect();
    AssociationDelta {
        to_add: remote.difference(&local).cloned().collect(),
        to_remove: local.difference(&remote).cloned().collect(),
    }
}

/// A link table between an owner entity and its members.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Association {
    pub table: EntityTable,
    pub owner_column: &'static str,
    pub member_column: &'static str,
}

/// Labels attached to tasks.
pub const TASK_LABELS: Association = Association {
    table: EntityTable::TaskLabel,
    owner_column: "task_id",
    member_column: "label_id",
};

impl Association {
    /// Link record for one (owner, member) pair, keyed `owner:member`.
    pub fn link(&self, owner: EntityId, member: EntityId) -> Result<Record, RecordError> {
        Record::new(format!("{owner}:{member}"))
            .with(self.owner_column, owner)?
            .with(self.member_column, member)
    }
}

#[derive(Clone)]
pub struct AssociationReconciler {
    engine: UpsertEngine,
}

impl AssociationReconciler {
    pub fn new(engine: UpsertEngine) -> Self {
        Self { engine }
    }

    /// Member ids currently linked to `owner` in the store.
    pub async fn local_members(
        &self,
        association: &Association,
        owner: EntityId,
    ) -> Result<Vec<EntityId>, StorageError> {
        let rows = self
            .engine
            .store()
            .query_where(association.table, association.owner_column, &json!(owner))
            .await?;
        Ok(rows
            .iter()
            .filter_map(|row| row.int(association.member_column))
            .collect())
    }

    /// Apply the delta between `remote` and `local` for one owner.
    ///
    /// Returns one outcome per write, deletions before insertions.
    pub async fn reconcile(
        &self,
        association: &Association,
        owner: EntityId,
        remote: &[EntityId],
        local: &[EntityId],
    ) -> Vec<UpsertOutcome> {
        let delta = diff_sets(remote.iter().copied(), local.iter().copied());
        if delta.is_empty() {
            return Vec::new();
        }
        debug!(
            table = %association.table,
            owner,
            add = ?delta.to_add,
            remove = ?delta.to_remove,
            "Reconciling associations"
        );

        let mut outcomes = Vec::with_capacity(delta.len());
        for member in delta.to_remove {
            outcomes.push(match association.link(owner, member) {
                Ok(link) => self.engine.delete(association.table, &link).await,
                Err(e) => UpsertOutcome::failed(e.to_string()),
            });
        }
        for member in delta.to_add {
            outcomes.push(match association.link(owner, member) {
                Ok(link) => self.engine.insert(association.table, &link).await,
                Err(e) => UpsertOutcome::failed(e.to_string()),
            });
        }
        outcomes
    }
}
