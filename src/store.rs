//! High-level store API: the task operations.

use crate::query::CompiledQuery;
use crate::storage::{Database, DatabaseLocation};
use crate::types::{NewTask, Task, TaskPatch, TaskQuery, timestamp};
use eyre::{Context, Result};

/// Errors that can occur during store operations.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StoreError {
    /// Task not found.
    TaskNotFound(i64),
}

impl std::fmt::Display for StoreError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            StoreError::TaskNotFound(id) => write!(f, "task not found: {}", id),
        }
    }
}

impl std::error::Error for StoreError {}

impl StoreError {
    /// Find a `StoreError` anywhere in a report's chain.
    pub fn from_report(report: &eyre::Report) -> Option<&StoreError> {
        report.chain().find_map(|cause| cause.downcast_ref::<StoreError>())
    }
}

/// The task store.
///
/// Each operation runs in its own storage session, so a failure never leaves
/// half-applied changes behind.
#[derive(Clone)]
pub struct TaskStore {
    db: Database,
}

impl TaskStore {
    /// Open the store at `location`, creating the schema if needed.
    pub fn open(location: &DatabaseLocation) -> Result<Self> {
        let db = Database::open(location)?;
        Ok(Self { db })
    }

    /// Open a private in-memory store.
    pub fn open_in_memory() -> Result<Self> {
        Self::open(&DatabaseLocation::Memory)
    }

    pub fn location(&self) -> &DatabaseLocation {
        self.db.location()
    }

    /// Get a task by id.
    pub fn get_task(&self, id: i64) -> Result<Option<Task>> {
        self.db.session(|s| s.get_task(id))
    }

    /// List tasks. `None` means every task, newest first.
    pub fn list_tasks(&self, query: Option<&TaskQuery>) -> Result<Vec<Task>> {
        let compiled = match query {
            Some(query) => CompiledQuery::compile(query),
            None => CompiledQuery::compile(&TaskQuery::default()),
        };
        self.db.session(|s| s.select_tasks(&compiled))
    }

    /// Count the tasks a listing would return.
    pub fn count_tasks(&self, query: &TaskQuery) -> Result<usize> {
        let compiled = CompiledQuery::compile(query);
        self.db.session(|s| s.count_tasks(&compiled))
    }

    /// Create a new task.
    pub fn create_task(&self, input: NewTask) -> Result<Task> {
        let now = timestamp::now();
        let task = self
            .db
            .session(|s| s.insert_task(&input, now))
            .context("Failed to create task")?;

        log::debug!("Created task {}", task.id);
        Ok(task)
    }

    /// Apply a partial update. Always refreshes `updated_at`.
    pub fn update_task(&self, id: i64, patch: TaskPatch) -> Result<Task> {
        if patch.is_empty() {
            log::debug!("Empty patch for task {}, touching updated_at only", id);
        }

        let updated = self.db.session(|s| {
            let existing = s.get_task(id)?.ok_or(StoreError::TaskNotFound(id))?;
            let updated = patch.apply(existing, timestamp::now());
            s.write_task(&updated).context("Failed to persist updated task")?;
            Ok(updated)
        })?;

        log::debug!("Updated task {}", id);
        Ok(updated)
    }

    /// Delete a task permanently and return what was removed.
    pub fn delete_task(&self, id: i64) -> Result<Task> {
        let removed = self.db.session(|s| {
            let existing = s.get_task(id)?.ok_or(StoreError::TaskNotFound(id))?;
            s.delete_task(id).context("Failed to persist task removal")?;
            Ok(existing)
        })?;

        log::debug!("Deleted task {}", id);
        Ok(removed)
    }

    /// Distinct categories in use.
    pub fn list_categories(&self) -> Result<Vec<String>> {
        self.db.session(|s| s.distinct_categories())
    }

    /// Check that storage is reachable.
    pub fn ping(&self) -> Result<()> {
        self.db.ping()
    }

    /// Release the storage handle.
    pub fn close(self) -> Result<()> {
        self.db.close()
    }
}
