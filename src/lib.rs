//! # Task Sync Engine
//!
//! Mirrors a remote task-management service (Todoist Sync API v8) into a
//! local SQLite database, with idempotent upserts that only report a row as
//! updated when its content actually changed.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                      SyncCoordinator                        │
//! │  • Inbound: snapshot → store                               │
//! │  • Verify: re-fetch active projects / sections / tasks     │
//! │  • ArchiveSweep: archived tasks per project                │
//! │  • Finalize: import history                                │
//! └─────────────────────────────────────────────────────────────┘
//!            │                                   │
//!            ▼                                   ▼
//! ┌──────────────────────────┐     ┌──────────────────────────┐
//! │      RemoteClient        │     │  AssociationReconciler   │
//! │  • reqwest, form POSTs   │     │  • set diff, delete-first│
//! │  • 404 → None            │     └──────────────────────────┘
//! └──────────────────────────┘                   │
//!                                                ▼
//! ┌─────────────────────────────────────────────────────────────┐
//! │                       UpsertEngine                          │
//! │  • before-read → update → insert fallback / modified stamp │
//! │  • spurious-change suppression (row_changed)               │
//! └─────────────────────────────────────────────────────────────┘
//!                              │
//!                              ▼
//! ┌─────────────────────────────────────────────────────────────┐
//! │                  RowStore (SqliteStore)                     │
//! │  • $name templates compiled to prepared statements         │
//! └─────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use task_sync_engine::{SyncConfig, SyncCoordinator};
//!
//! #[tokio::main]
//! async fn main() {
//!     let config = SyncConfig {
//!         api_endpoint: "https://api.todoist.com/sync/".into(),
//!         api_token: std::env::var("TODOIST_API_TOKEN").unwrap_or_default(),
//!         ..Default::default()
//!     };
//!     let coordinator = SyncCoordinator::from_config(&config)
//!         .await
//!         .expect("Invalid config or unreachable store");
//!
//!     let report = coordinator.run().await.expect("Sync failed");
//!     print!("{}", report.render(false));
//! }
//! ```
//!
//! ## Modules
//!
//! - [`coordinator`]: the [`SyncCoordinator`] and its passes
//! - [`engine`]: the [`UpsertEngine`] and change detection
//! - [`reconcile`]: set-difference association reconciliation
//! - [`remote`]: the [`RemoteClient`] contract and the Todoist client
//! - [`storage`]: table registry, statement templates, SQLite store
//! - [`record`], [`model`], [`outcome`]: data flowing through a run
//! - [`resilience`]: start-up retry for the store connection

pub mod config;
pub mod record;
pub mod model;
pub mod outcome;
pub mod storage;
pub mod engine;
pub mod reconcile;
pub mod remote;
pub mod resilience;
pub mod coordinator;
pub mod metrics;

pub use config::{ConfigError, SyncConfig};
pub use record::{Record, RecordError};
pub use outcome::{EntitySummary, OutcomeKind, SyncStats, UpsertOutcome};
pub use storage::{EntityTable, RowStore, SqliteStore, StorageError};
pub use engine::UpsertEngine;
pub use reconcile::{diff_sets, Association, AssociationDelta, AssociationReconciler, TASK_LABELS};
pub use remote::{RemoteClient, RemoteError, TodoistClient};
pub use coordinator::{RunReport, RunTotals, SyncCoordinator, SyncError, SyncPhase};
pub use resilience::retry::RetryConfig;
