// Copyright (c) 2025-2026 Adrian Robinson. Licensed under the AGPL-3.0.
// See LICENSE file in the project root for full license text.

//! Sync run coordinator.
//!
//! The [`SyncCoordinator`] ties the remote client, the upsert engine and the
//! association reconciler together and drives one run through its passes:
//!
//! - **Inbound**: full remote snapshot into the store
//! - **Verify**: re-fetch every locally active project, section and task to
//!   catch deletions the snapshot missed
//! - **ArchiveSweep**: archived tasks for every local project
//! - **Finalize**: one import-history row per stats bucket
//!
//! # Phases
//!
//! ```text
//! Idle → Inbound → Verify → ArchiveSweep → Finalize → Complete
//!                                   (any abort) → Failed
//! ```
//!
//! Everything runs sequentially: one collection at a time, one record at a
//! time, one remote call at a time.
//!
//! # Example
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use task_sync_engine::{SqliteStore, SyncConfig, SyncCoordinator, SyncPhase, TodoistClient};
//!
//! # #[tokio::main]
//! # async fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let config = SyncConfig {
//!     api_endpoint: "https://api.todoist.com/sync/".into(),
//!     api_token: "token".into(),
//!     ..Default::default()
//! };
//! let store = Arc::new(SqliteStore::connect(&config.database_url).await?);
//! let remote = Arc::new(TodoistClient::new(&config)?);
//! let coordinator = SyncCoordinator::new(store, remote);
//! assert_eq!(coordinator.phase(), SyncPhase::Idle);
//!
//! let report = coordinator.run().await?;
//! print!("{}", report.render(false));
//! # Ok(())
//! # }
//! ```

mod types;
mod inbound;
mod verify;
mod finalize;

pub use types::{RunReport, RunTotals, SyncError, SyncPhase};

use std::sync::Arc;

use serde::Serialize;
use tokio::sync::{watch, Mutex};
use tracing::{error, info};
use uuid::Uuid;

use crate::config::SyncConfig;
use crate::engine::UpsertEngine;
use crate::metrics;
use crate::outcome::{SyncStats, UpsertOutcome};
use crate::reconcile::AssociationReconciler;
use crate::record::Record;
use crate::remote::{RemoteClient, TodoistClient};
use crate::storage::{EntityTable, RowStore, SqliteStore};

/// Drives sync runs against one store and one remote.
pub struct SyncCoordinator {
    pub(super) engine: UpsertEngine,
    pub(super) reconciler: AssociationReconciler,
    pub(super) remote: Arc<dyn RemoteClient>,

    /// Run phase (broadcast to watchers)
    phase: watch::Sender<SyncPhase>,
    phase_rx: watch::Receiver<SyncPhase>,

    /// Held for the duration of a run
    running: Mutex<()>,
}

impl SyncCoordinator {
    pub fn new(store: Arc<dyn RowStore>, remote: Arc<dyn RemoteClient>) -> Self {
        let engine = UpsertEngine::new(store);
        let reconciler = AssociationReconciler::new(engine.clone());
        let (phase_tx, phase_rx) = watch::channel(SyncPhase::Idle);
        Self {
            engine,
            reconciler,
            remote,
            phase: phase_tx,
            phase_rx,
            running: Mutex::new(()),
        }
    }

    /// Validate `config`, open its store and build the Todoist client.
    pub async fn from_config(config: &SyncConfig) -> Result<Self, SyncError> {
        config.validate()?;
        let store = SqliteStore::connect(&config.database_url).await?;
        let remote = TodoistClient::new(config)?;
        Ok(Self::new(Arc::new(store), Arc::new(remote)))
    }

    #[must_use]
    pub fn phase(&self) -> SyncPhase {
        *self.phase_rx.borrow()
    }

    pub fn phase_receiver(&self) -> watch::Receiver<SyncPhase> {
        self.phase_rx.clone()
    }

    pub fn engine(&self) -> &UpsertEngine {
        &self.engine
    }

    fn set_phase(&self, phase: SyncPhase) {
        info!(phase = %phase, "Sync phase");
        let _ = self.phase.send(phase);
    }

    /// Run every pass once and write the import history.
    ///
    /// Remote failures and store read failures abort the run; store write
    /// failures are counted as failed outcomes in the report.
    #[tracing::instrument(skip(self), fields(run_id = tracing::field::Empty))]
    pub async fn run(&self) -> Result<RunReport, SyncError> {
        let _guard = self.running.try_lock().map_err(|_| SyncError::AlreadyRunning)?;

        let run_id = Uuid::new_v4();
        tracing::Span::current().record("run_id", tracing::field::display(run_id));
        let batch = chrono::Utc::now().to_rfc3339();
        info!(batch = %batch, "Sync run started");

        match self.run_passes(run_id, batch).await {
            Ok(report) => {
                self.set_phase(SyncPhase::Complete);
                info!(
                    api_calls = report.totals.api_calls,
                    tasks = report.totals.tasks,
                    archived_tasks = report.totals.archived_tasks,
                    failures = report.failures(),
                    "Sync run finished"
                );
                Ok(report)
            }
            Err(e) => {
                self.set_phase(SyncPhase::Failed);
                error!(error = %e, "Sync run aborted");
                Err(e)
            }
        }
    }

    async fn run_passes(&self, run_id: Uuid, batch: String) -> Result<RunReport, SyncError> {
        let mut stats = SyncStats::new();

        self.set_phase(SyncPhase::Inbound);
        let tasks = self.inbound(&mut stats).await?;

        self.set_phase(SyncPhase::Verify);
        self.verify(&mut stats).await?;

        self.set_phase(SyncPhase::ArchiveSweep);
        let archived_tasks = self.archive_sweep(&mut stats).await?;

        self.set_phase(SyncPhase::Finalize);
        let history = self.finalize(&batch, &stats).await;

        let totals = RunTotals {
            api_calls: self.remote.call_count(),
            tasks,
            archived_tasks,
        };
        metrics::set_last_run_tasks(totals.tasks);
        metrics::set_last_run_archived(totals.archived_tasks);

        Ok(RunReport { run_id, batch, stats, totals, history })
    }

    /// Upsert one schema-typed entity and record the outcome.
    pub(super) async fn upsert_entity<T: Serialize + Sync>(
        &self,
        stats: &mut SyncStats,
        bucket: &str,
        table: EntityTable,
        entity: &T,
    ) {
        let outcome = match Record::from_entity(entity) {
            Ok(record) => self.engine.upsert(table, &record).await,
            Err(e) => UpsertOutcome::failed(e.to_string()),
        };
        stats.record(bucket, outcome);
    }
}

/// Stats bucket names.
pub mod buckets {
    pub const LABELS: &str = "labels";
    pub const PROJECTS: &str = "projects";
    pub const USER: &str = "user";
    pub const USER_HISTORY: &str = "user-history";
    pub const SECTIONS: &str = "sections";
    pub const TASKS: &str = "tasks";
    pub const TASKS_DUE: &str = "tasks-due";
    pub const TASKS_LABELS: &str = "tasks-labels";
    pub const COMMENTS: &str = "comments";
    pub const PROJECTS_UPDATED: &str = "projects-updated";
    pub const SECTIONS_UPDATED: &str = "sections-updated";
    pub const TASKS_UPDATED: &str = "tasks-updated";
    pub const COMMENTS_UPDATED: &str = "comments-updated";
    pub const TASKS_ARCHIVED: &str = "tasks-archived";
}
