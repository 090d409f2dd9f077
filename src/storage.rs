//! Storage layer: the SQLite handle and per-operation sessions.

use crate::query::CompiledQuery;
use crate::types::{NewTask, Task, timestamp};
use chrono::{DateTime, Utc};
use eyre::{Context, Result, bail, eyre};
use rusqlite::functions::FunctionFlags;
use rusqlite::{Connection, OptionalExtension, Transaction, params, params_from_iter};
use std::fmt;
use std::fs;
use std::path::PathBuf;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

/// Database file used when no location is configured.
pub const DEFAULT_DB_FILE: &str = "todos.db";

/// How long a write waits on a locked database file before failing.
const BUSY_TIMEOUT: Duration = Duration::from_secs(5);

/// Column list shared by every task SELECT, in `row_to_task` order.
const TASK_COLUMNS: &str = "id, title, description, completed, priority, category, due_date, created_at, updated_at";

/// Where the SQLite database lives.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DatabaseLocation {
    File(PathBuf),
    Memory,
}

impl Default for DatabaseLocation {
    fn default() -> Self {
        DatabaseLocation::File(PathBuf::from(DEFAULT_DB_FILE))
    }
}

impl DatabaseLocation {
    /// Resolve a `DATABASE_URL`-style string.
    ///
    /// Accepts `sqlite:///path`, `sqlite://path`, `sqlite:path`,
    /// `sqlite::memory:`, `:memory:` or a bare file path. `None` or an empty
    /// string selects the default file.
    pub fn from_url(url: Option<&str>) -> Result<Self> {
        let Some(url) = url.map(str::trim).filter(|u| !u.is_empty()) else {
            return Ok(Self::default());
        };

        if url == ":memory:" {
            return Ok(DatabaseLocation::Memory);
        }

        let Some(rest) = url.strip_prefix("sqlite:") else {
            if let Some((scheme, _)) = url.split_once("://") {
                bail!("Unsupported database scheme '{}': only sqlite is available", scheme);
            }
            return Ok(DatabaseLocation::File(PathBuf::from(url)));
        };

        let path = rest
            .strip_prefix("///")
            .or_else(|| rest.strip_prefix("//"))
            .unwrap_or(rest);
        // Connection options such as `?mode=rwc` are not used
        let path = path.split('?').next().unwrap_or_default();

        match path {
            "" | ":memory:" => Ok(DatabaseLocation::Memory),
            path => Ok(DatabaseLocation::File(PathBuf::from(path))),
        }
    }
}

impl fmt::Display for DatabaseLocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DatabaseLocation::File(path) => write!(f, "{}", path.display()),
            DatabaseLocation::Memory => write!(f, ":memory:"),
        }
    }
}

/// Process-wide storage handle.
///
/// Cloning is cheap; all clones share one connection. Every unit of work goes
/// through [`Database::session`].
#[derive(Clone)]
pub struct Database {
    conn: Arc<Mutex<Connection>>,
    location: DatabaseLocation,
}

impl Database {
    /// Open (or create) the database and make sure the schema exists.
    pub fn open(location: &DatabaseLocation) -> Result<Self> {
        let conn = match location {
            DatabaseLocation::File(path) => {
                if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
                    fs::create_dir_all(parent).context("Failed to create database directory")?;
                }
                let conn = Connection::open(path)
                    .with_context(|| format!("Failed to open SQLite database at {}", path.display()))?;
                conn.busy_timeout(BUSY_TIMEOUT)
                    .context("Failed to set SQLite busy timeout")?;
                conn
            }
            DatabaseLocation::Memory => {
                Connection::open_in_memory().context("Failed to open in-memory SQLite database")?
            }
        };

        register_functions(&conn)?;
        init_schema(&conn)?;

        log::info!("Database ready at {}", location);

        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
            location: location.clone(),
        })
    }

    /// Open a private in-memory database.
    pub fn open_in_memory() -> Result<Self> {
        Self::open(&DatabaseLocation::Memory)
    }

    pub fn location(&self) -> &DatabaseLocation {
        &self.location
    }

    fn lock(&self) -> Result<MutexGuard<'_, Connection>> {
        self.conn
            .lock()
            .map_err(|_| eyre!("Database connection lock poisoned"))
    }

    /// Run `work` inside one transaction.
    ///
    /// Commits when `work` returns `Ok`, rolls back when it returns `Err` or
    /// when the commit itself fails.
    pub fn session<T>(&self, work: impl FnOnce(&Session<'_>) -> Result<T>) -> Result<T> {
        let mut conn = self.lock()?;
        let tx = conn.transaction().context("Failed to begin transaction")?;
        let session = Session { tx };

        match work(&session) {
            Ok(value) => {
                session.commit()?;
                Ok(value)
            }
            Err(e) => {
                session.rollback();
                Err(e)
            }
        }
    }

    /// Check that the database answers a trivial query.
    pub fn ping(&self) -> Result<()> {
        let conn = self.lock()?;
        conn.query_row("SELECT 1", [], |row| row.get::<_, i64>(0))
            .context("Database did not answer SELECT 1")?;
        Ok(())
    }

    /// Close the underlying connection.
    ///
    /// If other clones of the handle are still alive the connection stays
    /// open until the last one is dropped.
    pub fn close(self) -> Result<()> {
        match Arc::try_unwrap(self.conn) {
            Ok(mutex) => {
                let conn = mutex
                    .into_inner()
                    .map_err(|_| eyre!("Database connection lock poisoned"))?;
                conn.close()
                    .map_err(|(_, e)| e)
                    .context("Failed to close SQLite database")?;
                log::info!("Database at {} closed", self.location);
            }
            Err(_) => {
                log::warn!("Database at {} still in use, deferring close", self.location);
            }
        }
        Ok(())
    }
}

/// One open transaction. Only reachable through [`Database::session`].
pub struct Session<'conn> {
    tx: Transaction<'conn>,
}

impl Session<'_> {
    fn commit(self) -> Result<()> {
        // A failed COMMIT drops the transaction, which rolls it back
        self.tx.commit().map_err(|e| {
            log::warn!("Commit failed, transaction rolled back: {}", e);
            eyre!(e).wrap_err("Failed to commit transaction")
        })
    }

    fn rollback(self) {
        if let Err(e) = self.tx.rollback() {
            log::warn!("Rollback failed: {}", e);
        }
    }

    /// Get a task by id.
    pub fn get_task(&self, id: i64) -> Result<Option<Task>> {
        let sql = format!("SELECT {} FROM tasks WHERE id = ?1", TASK_COLUMNS);
        let task = self
            .tx
            .query_row(&sql, params![id], row_to_task)
            .optional()
            .context("Failed to load task")?;
        Ok(task)
    }

    /// Insert a new task stamped with `now` and return the stored record.
    pub fn insert_task(&self, input: &NewTask, now: DateTime<Utc>) -> Result<Task> {
        let stamp = timestamp::format(&now);
        self.tx
            .execute(
                r#"
                INSERT INTO tasks (title, description, completed, priority, category, due_date, created_at, updated_at)
                VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)
                "#,
                params![
                    input.title,
                    input.description,
                    input.completed,
                    input.priority,
                    input.category,
                    input.due_date.as_ref().map(timestamp::format),
                    stamp,
                    stamp,
                ],
            )
            .context("Failed to insert task")?;

        Ok(Task {
            id: self.tx.last_insert_rowid(),
            title: input.title.clone(),
            description: input.description.clone(),
            completed: input.completed,
            priority: input.priority,
            category: input.category.clone(),
            due_date: input.due_date,
            created_at: now,
            updated_at: now,
        })
    }

    /// Overwrite every mutable column of an existing row.
    pub fn write_task(&self, task: &Task) -> Result<()> {
        let changed = self
            .tx
            .execute(
                r#"
                UPDATE tasks
                SET title = ?1, description = ?2, completed = ?3, priority = ?4,
                    category = ?5, due_date = ?6, updated_at = ?7
                WHERE id = ?8
                "#,
                params![
                    task.title,
                    task.description,
                    task.completed,
                    task.priority,
                    task.category,
                    task.due_date.as_ref().map(timestamp::format),
                    timestamp::format(&task.updated_at),
                    task.id,
                ],
            )
            .context("Failed to update task")?;

        if changed != 1 {
            bail!("Expected to update one row for task {}, updated {}", task.id, changed);
        }
        Ok(())
    }

    /// Remove a task. Returns false if there was no such row.
    pub fn delete_task(&self, id: i64) -> Result<bool> {
        let removed = self
            .tx
            .execute("DELETE FROM tasks WHERE id = ?1", params![id])
            .context("Failed to delete task")?;
        Ok(removed > 0)
    }

    /// Run a compiled listing query.
    pub fn select_tasks(&self, query: &CompiledQuery) -> Result<Vec<Task>> {
        let sql = format!(
            "SELECT {} FROM tasks{} ORDER BY {}",
            TASK_COLUMNS,
            query.where_clause(),
            query.order_clause()
        );
        let mut stmt = self.tx.prepare(&sql).context("Failed to prepare task query")?;
        let tasks = stmt
            .query_map(params_from_iter(query.params()), row_to_task)?
            .collect::<rusqlite::Result<Vec<_>>>()
            .context("Failed to read tasks")?;
        Ok(tasks)
    }

    /// Count the rows a compiled listing query would return.
    pub fn count_tasks(&self, query: &CompiledQuery) -> Result<usize> {
        let sql = format!("SELECT COUNT(*) FROM tasks{}", query.where_clause());
        let count: i64 = self
            .tx
            .query_row(&sql, params_from_iter(query.params()), |row| row.get(0))
            .context("Failed to count tasks")?;
        Ok(count as usize)
    }

    /// Distinct non-empty categories, sorted.
    pub fn distinct_categories(&self) -> Result<Vec<String>> {
        let mut stmt = self.tx.prepare(
            r#"
            SELECT DISTINCT category FROM tasks
            WHERE category IS NOT NULL AND category <> ''
            ORDER BY category
            "#,
        )?;
        let categories = stmt
            .query_map([], |row| row.get(0))?
            .collect::<rusqlite::Result<Vec<String>>>()
            .context("Failed to read categories")?;
        Ok(categories)
    }
}

/// Create the tasks table if it does not exist yet.
fn init_schema(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        r#"
        CREATE TABLE IF NOT EXISTS tasks (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            title VARCHAR(255) NOT NULL,
            description TEXT,
            completed BOOLEAN NOT NULL DEFAULT 0,
            priority INTEGER NOT NULL DEFAULT 5,
            category VARCHAR(100),
            due_date TEXT,
            created_at TEXT NOT NULL,
            updated_at TEXT NOT NULL
        );
        "#,
    )
    .context("Failed to initialize schema")?;

    Ok(())
}

/// SQLite's LOWER() only folds ASCII, so search goes through this instead.
fn register_functions(conn: &Connection) -> Result<()> {
    conn.create_scalar_function(
        "casefold",
        1,
        FunctionFlags::SQLITE_UTF8 | FunctionFlags::SQLITE_DETERMINISTIC,
        |ctx| {
            let value: Option<String> = ctx.get(0)?;
            Ok(value.map(|s| s.to_lowercase()))
        },
    )
    .context("Failed to register casefold function")?;

    Ok(())
}

/// Convert a database row to a Task.
fn row_to_task(row: &rusqlite::Row) -> rusqlite::Result<Task> {
    let due_date: Option<String> = row.get(6)?;
    let created_at: String = row.get(7)?;
    let updated_at: String = row.get(8)?;

    Ok(Task {
        id: row.get(0)?,
        title: row.get(1)?,
        description: row.get(2)?,
        completed: row.get(3)?,
        priority: row.get(4)?,
        category: row.get(5)?,
        due_date: due_date.map(|raw| parse_stored(6, &raw)).transpose()?,
        created_at: parse_stored(7, &created_at)?,
        updated_at: parse_stored(8, &updated_at)?,
    })
}

/// Decode a stored timestamp. Rows written by other tools may use a naive
/// `YYYY-MM-DD HH:MM:SS` form, which is read as UTC.
fn parse_stored(column: usize, raw: &str) -> rusqlite::Result<DateTime<Utc>> {
    timestamp::parse(raw).ok_or_else(|| {
        rusqlite::Error::FromSqlConversionFailure(
            column,
            rusqlite::types::Type::Text,
            format!("invalid timestamp '{}'", raw).into(),
        )
    })
}
