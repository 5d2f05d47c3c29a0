// Copyright (c) 2025-2026 Adrian Robinson. Licensed under the AGPL-3.0.
// See LICENSE file in the project root for full license text.

//! Resilience helpers.
//!
//! Only the local store connection retries; remote calls are classified once
//! and surfaced to the coordinator, which aborts the run on transport errors.

pub mod retry;
