// Copyright (c) 2025-2026 Adrian Robinson. Licensed under the AGPL-3.0.
// See LICENSE file in the project root for full license text.

//! Local row store.
//!
//! - [`traits`]: the [`RowStore`] contract the upsert engine writes through
//! - [`tables`]: logical table registry and embedded statement templates
//! - [`template`]: `$name` template compilation and value binding
//! - [`sql`]: SQLite implementation

pub mod traits;
pub mod tables;
pub mod template;
pub mod sql;

pub use traits::{RowStore, StorageError};
pub use tables::{EntityTable, Verb};
pub use template::{BindValue, StatementTemplate};
pub use sql::SqliteStore;
