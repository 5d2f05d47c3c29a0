// Copyright (c) 2025-2026 Adrian Robinson. Licensed under the AGPL-3.0.
// See LICENSE file in the project root for full license text.

//! Logical table registry.
//!
//! Each [`EntityTable`] names a logical table and the statement templates it
//! supports. Several logical tables can share one physical table: the
//! derived due-date and deletion records both write into `task`.
//!
//! Templates live in `sql/{verb}-{table}.sql` and are embedded at compile
//! time.

use std::fmt;

use super::template::StatementTemplate;
use super::traits::StorageError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum EntityTable {
    Label,
    Project,
    Section,
    User,
    UserHistory,
    Task,
    TaskDue,
    TaskDeleted,
    TaskLabel,
    Comment,
    ImportHistory,
}

/// Statement kinds a table may define.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Verb {
    /// Read of the current row, used for change detection.
    Before,
    Update,
    Insert,
    Delete,
}

impl Verb {
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Before => "before",
            Self::Update => "update",
            Self::Insert => "insert",
            Self::Delete => "delete",
        }
    }
}

macro_rules! sql {
    ($file:literal) => {
        include_str!(concat!(env!("CARGO_MANIFEST_DIR"), "/sql/", $file, ".sql"))
    };
}

impl EntityTable {
    pub const ALL: [EntityTable; 11] = [
        Self::Label,
        Self::Project,
        Self::Section,
        Self::User,
        Self::UserHistory,
        Self::Task,
        Self::TaskDue,
        Self::TaskDeleted,
        Self::TaskLabel,
        Self::Comment,
        Self::ImportHistory,
    ];

    /// Logical name, as used in diagnostics and metrics.
    #[must_use]
    pub fn name(&self) -> &'static str {
        match self {
            Self::Label => "label",
            Self::Project => "project",
            Self::Section => "section",
            Self::User => "user",
            Self::UserHistory => "user_history",
            Self::Task => "task",
            Self::TaskDue => "task_due",
            Self::TaskDeleted => "task_deleted",
            Self::TaskLabel => "task_label",
            Self::Comment => "comment",
            Self::ImportHistory => "import_history",
        }
    }

    /// Table the statements actually write to.
    #[must_use]
    pub fn physical(&self) -> &'static str {
        match self {
            Self::TaskDue | Self::TaskDeleted => "task",
            other => other.name(),
        }
    }

    /// Raw template source for a verb, if the table defines one.
    #[must_use]
    pub fn template(&self, verb: Verb) -> Option<&'static str> {
        use EntityTable as T;
        use Verb as V;
        match (self, verb) {
            (T::Label, V::Before) => Some(sql!("before-label")),
            (T::Label, V::Update) => Some(sql!("update-label")),
            (T::Label, V::Insert) => Some(sql!("insert-label")),

            (T::Project, V::Before) => Some(sql!("before-project")),
            (T::Project, V::Update) => Some(sql!("update-project")),
            (T::Project, V::Insert) => Some(sql!("insert-project")),

            (T::Section, V::Before) => Some(sql!("before-section")),
            (T::Section, V::Update) => Some(sql!("update-section")),
            (T::Section, V::Insert) => Some(sql!("insert-section")),

            (T::User, V::Before) => Some(sql!("before-user")),
            (T::User, V::Update) => Some(sql!("update-user")),
            (T::User, V::Insert) => Some(sql!("insert-user")),

            (T::UserHistory, V::Insert) => Some(sql!("insert-user_history")),

            (T::Task, V::Before) => Some(sql!("before-task")),
            (T::Task, V::Update) => Some(sql!("update-task")),
            (T::Task, V::Insert) => Some(sql!("insert-task")),

            (T::TaskDue, V::Before) => Some(sql!("before-task_due")),
            (T::TaskDue, V::Update) => Some(sql!("update-task_due")),
            (T::TaskDue, V::Insert) => Some(sql!("insert-task_due")),

            (T::TaskDeleted, V::Before) => Some(sql!("before-task_deleted")),
            (T::TaskDeleted, V::Update) => Some(sql!("update-task_deleted")),
            (T::TaskDeleted, V::Insert) => Some(sql!("insert-task_deleted")),

            (T::TaskLabel, V::Insert) => Some(sql!("insert-task_label")),
            (T::TaskLabel, V::Delete) => Some(sql!("delete-task_label")),

            (T::Comment, V::Before) => Some(sql!("before-comment")),
            (T::Comment, V::Update) => Some(sql!("update-comment")),
            (T::Comment, V::Insert) => Some(sql!("insert-comment")),

            (T::ImportHistory, V::Insert) => Some(sql!("insert-import_history")),

            _ => None,
        }
    }

    /// Compiled statement for a verb.
    pub fn statement(&self, verb: Verb) -> Result<StatementTemplate, StorageError> {
        let source = self.template(verb).ok_or(StorageError::MissingTemplate {
            table: self.name(),
            verb: verb.as_str(),
        })?;
        StatementTemplate::compile(source)
    }

    /// Tables with both update and insert templates can be upserted.
    #[cfg(test)]
    fn is_upsertable(&self) -> bool {
        self.template(Verb::Update).is_some() && self.template(Verb::Insert).is_some()
    }
}

impl fmt::Display for EntityTable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Schema bootstrap script.
pub const SCHEMA: &str = sql!("schema");
