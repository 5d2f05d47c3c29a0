// Copyright (c) 2025-2026 Adrian Robinson. Licensed under the AGPL-3.0.
// See LICENSE file in the project root for full license text.

//! Remote task service.
//!
//! The coordinator only sees [`RemoteClient`]. For single-item lookups "not
//! found" is a value (`Ok(None)`), never an error: the verification pass
//! relies on it to detect deletions. A missing snapshot is an error. Every other failure is classified once into a [`RemoteError`]
//! and aborts the run.

pub mod todoist;

use async_trait::async_trait;
use thiserror::Error;

use crate::model::{EntityId, Project, Section, Snapshot, Task, TaskDetail};

pub use todoist::TodoistClient;

#[derive(Error, Debug)]
pub enum RemoteError {
    #[error("Transport error: {0}")]
    Transport(String),
    #[error("Authentication rejected: {0}")]
    Auth(String),
    #[error("Remote returned HTTP {status}: {message}")]
    Status { status: u16, message: String },
    #[error("Failed to decode remote response: {0}")]
    Decode(String),
    /// The full pull came back missing or empty. Continuing would read every
    /// local row as deleted remotely.
    #[error("Snapshot unavailable: {0}")]
    SnapshotUnavailable(String),
}

#[async_trait]
pub trait RemoteClient: Send + Sync {
    /// Full pull of every resource collection.
    async fn fetch_snapshot(&self) -> Result<Snapshot, RemoteError>;

    /// One task and its comments, or `None` if the remote no longer has it.
    async fn fetch_task(&self, id: EntityId) -> Result<Option<TaskDetail>, RemoteError>;

    async fn fetch_project(&self, id: EntityId) -> Result<Option<Project>, RemoteError>;

    async fn fetch_section(&self, id: EntityId) -> Result<Option<Section>, RemoteError>;

    /// Every archived task of a project, all pages drained.
    async fn fetch_archived_tasks(&self, project_id: EntityId) -> Result<Vec<Task>, RemoteError>;

    /// Completed remote exchanges so far.
    fn call_count(&self) -> u64;
}
