// Copyright (c) 2025-2026 Adrian Robinson. Licensed under the AGPL-3.0.
// See LICENSE file in the project root for full license text.

//! Metrics instrumentation for the task sync engine.
//!
//! Uses the `metrics` crate for backend-agnostic collection. The embedding
//! process chooses the exporter (Prometheus, OTEL, etc.)
//!
//! # Metric Naming Convention
//! - `task_sync_` prefix for all metrics
//! - `_total` suffix for counters
//! - `_seconds` suffix for duration histograms
//!
//! # Labels
//! - `table`: logical table name (`task`, `task_label`, ...)
//! - `outcome`: inserted, updated, deleted, unchanged, failed
//! - `endpoint`: remote path (`sync`, `items/get`, ...)
//! - `status`: ok, not_found, error
//! - `pass`: inbound, verify, archive_sweep, finalize

use metrics::{counter, gauge, histogram};
use std::time::{Duration, Instant};

use crate::outcome::OutcomeKind;

/// Record one classified store write.
pub fn record_outcome(table: &str, outcome: OutcomeKind) {
    counter!(
        "task_sync_outcomes_total",
        "table" => table.to_string(),
        "outcome" => outcome.as_str()
    )
    .increment(1);
}

/// Record one completed remote call.
pub fn record_api_call(endpoint: &str, status: &str) {
    counter!(
        "task_sync_api_calls_total",
        "endpoint" => endpoint.to_string(),
        "status" => status.to_string()
    )
    .increment(1);
}

/// Record a retried operation (store connection only).
pub fn record_retry(operation: &str) {
    counter!(
        "task_sync_retries_total",
        "operation" => operation.to_string()
    )
    .increment(1);
}

/// Record how long one sync pass took.
pub fn record_pass_duration(pass: &str, duration: Duration) {
    histogram!(
        "task_sync_pass_seconds",
        "pass" => pass.to_string()
    )
    .record(duration.as_secs_f64());
}

/// Task count seen by the most recent run.
pub fn set_last_run_tasks(count: usize) {
    gauge!("task_sync_last_run_tasks").set(count as f64);
}

/// Archived-task count seen by the most recent run.
pub fn set_last_run_archived(count: usize) {
    gauge!("task_sync_last_run_archived_tasks").set(count as f64);
}

/// Timer guard that records the pass duration when dropped.
pub struct PassTimer {
    pass: &'static str,
    start: Instant,
}

impl PassTimer {
    pub fn new(pass: &'static str) -> Self {
        Self {
            pass,
            start: Instant::now(),
        }
    }
}

impl Drop for PassTimer {
    fn drop(&mut self) {
        record_pass_duration(self.pass, self.start.elapsed());
    }
}
