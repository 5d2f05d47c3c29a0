// Copyright (c) 2025-2026 Adrian Robinson. Licensed under the AGPL-3.0.
// See LICENSE file in the project root for full license text.

//! Inbound pass: remote snapshot into the local store.

use tracing::{debug, instrument};

use super::buckets;
use super::{SyncCoordinator, SyncError};
use crate::metrics::PassTimer;
use crate::model::Task;
use crate::outcome::{SyncStats, UpsertOutcome};
use crate::reconcile::TASK_LABELS;
use crate::record::Record;
use crate::storage::EntityTable;

impl SyncCoordinator {
    /// Pull the full snapshot and upsert every collection in dependency
    /// order. Returns the number of tasks in the snapshot.
    #[instrument(skip(self, stats))]
    pub(super) async fn inbound(&self, stats: &mut SyncStats) -> Result<usize, SyncError> {
        let _timer = PassTimer::new("inbound");
        let snapshot = self.remote.fetch_snapshot().await?;
        debug!(
            labels = snapshot.labels.len(),
            projects = snapshot.projects.len(),
            sections = snapshot.sections.len(),
            tasks = snapshot.tasks.len(),
            comments = snapshot.comments.len(),
            "Snapshot received"
        );

        for label in &snapshot.labels {
            self.upsert_entity(stats, buckets::LABELS, EntityTable::Label, label).await;
        }

        for project in &snapshot.projects {
            self.upsert_entity(stats, buckets::PROJECTS, EntityTable::Project, project).await;
        }

        if let Some(user) = &snapshot.user {
            self.upsert_entity(stats, buckets::USER, EntityTable::User, user).await;
            let history = match Record::from_entity(user) {
                Ok(record) => self.engine.insert(EntityTable::UserHistory, &record).await,
                Err(e) => UpsertOutcome::failed(e.to_string()),
            };
            stats.record(buckets::USER_HISTORY, history);
        }

        for section in &snapshot.sections {
            self.upsert_entity(stats, buckets::SECTIONS, EntityTable::Section, section).await;
        }

        for task in &snapshot.tasks {
            self.sync_task(stats, task).await?;
        }

        for comment in &snapshot.comments {
            self.upsert_entity(stats, buckets::COMMENTS, EntityTable::Comment, comment).await;
        }

        Ok(snapshot.tasks.len())
    }

    /// Task row, then its due-date columns, then its label links.
    async fn sync_task(&self, stats: &mut SyncStats, task: &Task) -> Result<(), SyncError> {
        self.upsert_entity(stats, buckets::TASKS, EntityTable::Task, task).await;

        match task.due_record() {
            Ok(Some(due)) => {
                let outcome = self.engine.upsert(EntityTable::TaskDue, &due).await;
                stats.record(buckets::TASKS_DUE, outcome);
            }
            Ok(None) => {}
            Err(e) => stats.record(buckets::TASKS_DUE, UpsertOutcome::failed(e.to_string())),
        }

        let local = self.reconciler.local_members(&TASK_LABELS, task.id).await?;
        let outcomes = self
            .reconciler
            .reconcile(&TASK_LABELS, task.id, &task.labels, &local)
            .await;
        stats.extend(buckets::TASKS_LABELS, outcomes);
        Ok(())
    }
}
