// Copyright (c) 2025-2026 Adrian Robinson. Licensed under the AGPL-3.0.
// See LICENSE file in the project root for full license text.

//! Verification pass and archive sweep.
//!
//! The snapshot does not reliably report deletions, so every locally active
//! project, section and task is re-fetched one by one. A resource the remote
//! no longer knows is marked deleted locally rather than treated as an
//! error.

use std::collections::{HashMap, HashSet};

use serde_json::json;
use tracing::{debug, instrument, warn};

use super::buckets;
use super::{SyncCoordinator, SyncError};
use crate::metrics::PassTimer;
use crate::model::{EntityId, TaskDetail};
use crate::outcome::SyncStats;
use crate::record::Record;
use crate::storage::EntityTable;

/// A task needs re-verification only if it is not historical, not deleted,
/// and its project is neither archived nor deleted.
///
/// `inactive_projects` maps project id to "archived or deleted". Unknown
/// projects count as active.
#[must_use]
pub fn is_task_active(task: &Record, inactive_projects: &HashMap<EntityId, bool>) -> bool {
    if task.flag("in_history") || task.flag("is_deleted") {
        return false;
    }
    task.int("project_id")
        .and_then(|project| inactive_projects.get(&project))
        .map_or(true, |inactive| !inactive)
}

fn is_live(row: &Record) -> bool {
    !row.flag("is_archived") && !row.flag("is_deleted")
}

impl SyncCoordinator {
    #[instrument(skip(self, stats))]
    pub(super) async fn verify(&self, stats: &mut SyncStats) -> Result<(), SyncError> {
        let _timer = PassTimer::new("verify");
        self.verify_projects(stats).await?;
        self.verify_sections(stats).await?;
        self.verify_tasks(stats).await
    }

    async fn verify_projects(&self, stats: &mut SyncStats) -> Result<(), SyncError> {
        let projects = self.engine.store().query(EntityTable::Project).await?;
        for row in projects.into_iter().filter(is_live) {
            let Some(id) = row.int("id") else {
                warn!(id = %row.id_display(), "Skipping project with non-integer id");
                continue;
            };
            match self.remote.fetch_project(id).await? {
                Some(project) => {
                    self.upsert_entity(stats, buckets::PROJECTS_UPDATED, EntityTable::Project, &project)
                        .await;
                }
                None => {
                    debug!(project_id = id, "Project gone remotely, marking deleted");
                    let row = row.with("is_deleted", 1)?;
                    let outcome = self.engine.upsert(EntityTable::Project, &row).await;
                    stats.record(buckets::PROJECTS_UPDATED, outcome);
                }
            }
        }
        Ok(())
    }

    async fn verify_sections(&self, stats: &mut SyncStats) -> Result<(), SyncError> {
        let sections = self.engine.store().query(EntityTable::Section).await?;
        for row in sections.into_iter().filter(is_live) {
            let Some(id) = row.int("id") else {
                warn!(id = %row.id_display(), "Skipping section with non-integer id");
                continue;
            };
            match self.remote.fetch_section(id).await? {
                Some(section) => {
                    self.upsert_entity(stats, buckets::SECTIONS_UPDATED, EntityTable::Section, &section)
                        .await;
                }
                None => {
                    debug!(section_id = id, "Section gone remotely, marking deleted");
                    let row = row.with("is_deleted", 1)?;
                    let outcome = self.engine.upsert(EntityTable::Section, &row).await;
                    stats.record(buckets::SECTIONS_UPDATED, outcome);
                }
            }
        }
        Ok(())
    }

    async fn verify_tasks(&self, stats: &mut SyncStats) -> Result<(), SyncError> {
        // Read after project verification so freshly deleted projects count
        let inactive: HashMap<EntityId, bool> = self
            .engine
            .store()
            .query(EntityTable::Project)
            .await?
            .iter()
            .filter_map(|p| p.int("id").map(|id| (id, !is_live(p))))
            .collect();

        let tasks = self.engine.store().query(EntityTable::Task).await?;
        for row in tasks.iter().filter(|t| is_task_active(t, &inactive)) {
            let Some(id) = row.int("id") else {
                warn!(id = %row.id_display(), "Skipping task with non-integer id");
                continue;
            };
            match self.remote.fetch_task(id).await? {
                None => {
                    debug!(task_id = id, "Task gone remotely, marking deleted");
                    self.mark_task_deleted(stats, id).await?;
                }
                Some(detail) if detail.task.is_deleted => {
                    self.mark_task_deleted(stats, id).await?;
                }
                Some(detail) => {
                    self.upsert_entity(stats, buckets::TASKS_UPDATED, EntityTable::Task, &detail.task)
                        .await;
                    self.retire_missing_comments(stats, id, &detail).await?;
                }
            }
        }
        Ok(())
    }

    async fn mark_task_deleted(&self, stats: &mut SyncStats, id: EntityId) -> Result<(), SyncError> {
        let record = Record::new(id).with("is_deleted", true)?;
        let outcome = self.engine.upsert(EntityTable::TaskDeleted, &record).await;
        stats.record(buckets::TASKS_UPDATED, outcome);
        Ok(())
    }

    /// Mark local comments of a task that the remote no longer lists.
    async fn retire_missing_comments(
        &self,
        stats: &mut SyncStats,
        task_id: EntityId,
        detail: &TaskDetail,
    ) -> Result<(), SyncError> {
        let remote_ids: HashSet<EntityId> = detail.comments.iter().map(|c| c.id).collect();
        let local = self
            .engine
            .store()
            .query_where(EntityTable::Comment, "task_id", &json!(task_id))
            .await?;

        for comment in local {
            let known = comment.int("id").is_some_and(|id| remote_ids.contains(&id));
            if known || comment.flag("is_deleted") {
                continue;
            }
            let comment = comment.with("is_deleted", 1)?.with("item_id", task_id)?;
            let outcome = self.engine.upsert(EntityTable::Comment, &comment).await;
            stats.record(buckets::COMMENTS_UPDATED, outcome);
        }
        Ok(())
    }

    /// Pull archived tasks for every local project. Insert/update only.
    #[instrument(skip(self, stats))]
    pub(super) async fn archive_sweep(&self, stats: &mut SyncStats) -> Result<usize, SyncError> {
        let _timer = PassTimer::new("archive_sweep");
        let projects = self.engine.store().query(EntityTable::Project).await?;
        let mut archived = 0;

        for project in &projects {
            let Some(project_id) = project.int("id") else {
                continue;
            };
            let tasks = self.remote.fetch_archived_tasks(project_id).await?;
            archived += tasks.len();
            for task in &tasks {
                self.upsert_entity(stats, buckets::TASKS_ARCHIVED, EntityTable::Task, task).await;
            }
        }

        debug!(projects = projects.len(), archived, "Archive sweep done");
        Ok(archived)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn task(v: serde_json::Value) -> Record {
        Record::from_value(v).unwrap()
    }

    #[test]
    fn test_active_task() {
        let inactive = HashMap::from([(100, false)]);
        assert!(is_task_active(&task(json!({"id": 1, "project_id": 100})), &inactive));
    }

    #[test]
    fn test_historical_or_deleted_task_is_inactive() {
        let inactive = HashMap::new();
        assert!(!is_task_active(&task(json!({"id": 1, "in_history": 1})), &inactive));
        assert!(!is_task_active(&task(json!({"id": 1, "is_deleted": "1"})), &inactive));
    }

    #[test]
    fn test_task_in_inactive_project_is_inactive() {
        let inactive = HashMap::from([(100, true)]);
        assert!(!is_task_active(&task(json!({"id": 1, "project_id": 100})), &inactive));
    }

    #[test]
    fn test_unknown_project_counts_as_active() {
        let inactive = HashMap::from([(100, true)]);
        assert!(is_task_active(&task(json!({"id": 1, "project_id": 200})), &inactive));
        assert!(is_task_active(&task(json!({"id": 1, "project_id": null})), &inactive));
    }
}
