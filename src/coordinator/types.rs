//! Public types for the sync coordinator.

use std::fmt::Write as _;

use thiserror::Error;
use uuid::Uuid;

use crate::config::ConfigError;
use crate::outcome::{EntitySummary, SyncStats, UpsertOutcome};
use crate::record::RecordError;
use crate::remote::RemoteError;
use crate::storage::StorageError;

/// Run phase.
///
/// A run moves strictly forward with no loop-back:
/// `Idle → Inbound → Verify → ArchiveSweep → Finalize → Complete`.
/// Any aborting error moves it to `Failed`.
/// Use [`super::SyncCoordinator::phase()`] to check the current phase or
/// [`super::SyncCoordinator::phase_receiver()`] to watch it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncPhase {
    /// Created, no run started
    Idle,
    /// Pulling the remote snapshot into the store
    Inbound,
    /// Re-fetching locally active projects, sections and tasks
    Verify,
    /// Pulling archived tasks per local project
    ArchiveSweep,
    /// Writing the import history
    Finalize,
    /// Last run finished
    Complete,
    /// Last run aborted
    Failed,
}

impl SyncPhase {
    /// Label used for metrics and spans.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Idle => "idle",
            Self::Inbound => "inbound",
            Self::Verify => "verify",
            Self::ArchiveSweep => "archive_sweep",
            Self::Finalize => "finalize",
            Self::Complete => "complete",
            Self::Failed => "failed",
        }
    }
}

impl std::fmt::Display for SyncPhase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Idle => write!(f, "Idle"),
            Self::Inbound => write!(f, "Inbound"),
            Self::Verify => write!(f, "Verify"),
            Self::ArchiveSweep => write!(f, "ArchiveSweep"),
            Self::Finalize => write!(f, "Finalize"),
            Self::Complete => write!(f, "Complete"),
            Self::Failed => write!(f, "Failed"),
        }
    }
}

/// Errors that abort a run.
///
/// Store *write* failures never show up here; they are recorded as failed
/// outcomes and the run carries on.
#[derive(Error, Debug)]
pub enum SyncError {
    #[error(transparent)]
    Remote(#[from] RemoteError),
    #[error(transparent)]
    Storage(#[from] StorageError),
    #[error(transparent)]
    Record(#[from] RecordError),
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error("A sync run is already in progress")]
    AlreadyRunning,
}

/// End-of-run counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RunTotals {
    /// Completed remote exchanges, including "not found" replies
    pub api_calls: u64,
    /// Tasks in the remote snapshot
    pub tasks: usize,
    /// Archived tasks pulled by the sweep
    pub archived_tasks: usize,
}

/// Everything one run produced.
#[derive(Debug, Clone)]
pub struct RunReport {
    pub run_id: Uuid,
    /// RFC 3339 start time; also the `batch` key of the import history
    pub batch: String,
    pub stats: SyncStats,
    pub totals: RunTotals,
    /// Outcomes of the import-history writes themselves
    pub history: Vec<UpsertOutcome>,
}

impl RunReport {
    #[must_use]
    pub fn summaries(&self) -> Vec<EntitySummary> {
        self.stats.summarize()
    }

    /// Failed writes across every bucket.
    #[must_use]
    pub fn failures(&self) -> usize {
        self.stats
            .iter()
            .map(|(_, outcomes)| outcomes.iter().filter(|o| o.is_failure()).count())
            .sum()
    }

    /// Tab-separated console report.
    ///
    /// Verbose mode lists every outcome as
    /// `entity, succeeded, inserted, updated, deleted, message`.
    #[must_use]
    pub fn render(&self, verbose: bool) -> String {
        let mut out = String::new();
        let flag = |b: bool| u8::from(b);

        if verbose {
            for (entity, outcomes) in self.stats.iter() {
                for o in outcomes {
                    let _ = writeln!(
                        out,
                        "{entity}\t{}\t{}\t{}\t{}\t{}",
                        flag(o.succeeded()),
                        flag(o.is_inserted()),
                        flag(o.is_updated()),
                        flag(o.is_deleted()),
                        o.message()
                    );
                }
            }
        }

        let _ = writeln!(out, "entity\tsuccess\tinserted\tupdated\tdeleted\tunchanged\tfailed");
        for s in self.summaries() {
            let _ = writeln!(
                out,
                "{}\t{}\t{}\t{}\t{}\t{}\t{}",
                s.entity, s.success, s.inserted, s.updated, s.deleted, s.unchanged, s.failed
            );
        }
        let _ = writeln!(out, "API calls: {}", self.totals.api_calls);
        let _ = writeln!(out, "Tasks: {}", self.totals.tasks);
        let _ = writeln!(out, "Archived tasks: {}", self.totals.archived_tasks);
        out
    }
}
