//! Taskboard: a small task-tracking service over SQLite.
//!
//! Tasks carry a title, optional description and category, a priority, an
//! optional due date and a completion flag. The [`TaskStore`] owns the
//! database; the [`api`] module exposes it over HTTP.
//!
//! # Example
//!
//! ```no_run
//! use taskboard::{NewTask, StatusFilter, StoreQueryExt, TaskPatch, TaskStore};
//!
//! let store = TaskStore::open_in_memory().unwrap();
//!
//! let milk = store.create_task(NewTask::new("Buy milk").with_category("errands")).unwrap();
//! store.create_task(NewTask::new("Write report").with_category("work").with_priority(1)).unwrap();
//!
//! store.update_task(milk.id, TaskPatch::new().completed(true)).unwrap();
//!
//! let pending = store.query().status(StatusFilter::Pending).execute().unwrap();
//! assert_eq!(pending.len(), 1);
//! assert_eq!(store.list_categories().unwrap(), vec!["errands", "work"]);
//! ```

mod query;
mod storage;
mod store;
mod types;

pub mod api;
pub mod config;
pub mod server;

// Re-export public API
pub use api::{AppState, router};
pub use config::ServerConfig;
pub use query::{Query, StoreQueryExt};
pub use server::Server;
pub use storage::{Database, DatabaseLocation};
pub use store::{StoreError, TaskStore};
pub use types::{DEFAULT_PRIORITY, NewTask, SortKey, SortOrder, StatusFilter, Task, TaskPatch, TaskQuery, timestamp};
