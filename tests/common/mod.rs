//! Shared test infrastructure for taskboard integration tests.
//!
//! Provides TestEnv helper for consistent test setup/teardown.

#![allow(dead_code)]

use axum::Router;
use axum::body::Body;
use axum::http::{Method, Request, StatusCode, header};
use http_body_util::BodyExt;
use serde_json::Value;
use taskboard::{AppState, DatabaseLocation, NewTask, Task, TaskPatch, TaskStore, router};
use tempfile::TempDir;
use tower::ServiceExt;

/// Test environment with automatic cleanup.
pub struct TestEnv {
    pub temp_dir: TempDir,
    pub store: TaskStore,
}

impl TestEnv {
    /// Create a new test environment with a file-backed store.
    pub fn new() -> Self {
        let temp_dir = TempDir::new().expect("Failed to create temp dir");
        let location = DatabaseLocation::File(temp_dir.path().join("todos.db"));
        let store = TaskStore::open(&location).expect("Failed to open store");
        Self { temp_dir, store }
    }

    /// Create a task with only a title.
    pub fn create_task(&self, title: &str) -> Task {
        self.store.create_task(NewTask::new(title)).expect("Failed to create task")
    }

    /// Create a task with a priority.
    pub fn create_task_with_priority(&self, title: &str, priority: i32) -> Task {
        self.store
            .create_task(NewTask::new(title).with_priority(priority))
            .expect("Failed to create task")
    }

    /// Create a task in a category.
    pub fn create_task_in(&self, title: &str, category: &str) -> Task {
        self.store
            .create_task(NewTask::new(title).with_category(category))
            .expect("Failed to create task")
    }

    /// Mark a task completed.
    pub fn complete_task(&self, task: &Task) -> Task {
        self.store
            .update_task(task.id, TaskPatch::new().completed(true))
            .expect("Failed to complete task")
    }

    /// Router over this environment's store.
    pub fn app(&self) -> Router {
        let origins = vec!["http://localhost:3000".to_string()];
        router(AppState::new(self.store.clone(), 8000), &origins)
    }

    /// Send a request and return the status and JSON body (`Null` if empty).
    pub async fn send(&self, method: Method, uri: &str, body: Option<Value>) -> (StatusCode, Value) {
        let builder = Request::builder().method(method).uri(uri);
        let request = match body {
            Some(json) => builder
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(json.to_string())),
            None => builder.body(Body::empty()),
        }
        .expect("Failed to build request");

        self.send_request(request).await
    }

    /// Send a prepared request.
    pub async fn send_request(&self, request: Request<Body>) -> (StatusCode, Value) {
        let response = self.app().oneshot(request).await.expect("Request failed");
        let status = response.status();
        let bytes = response
            .into_body()
            .collect()
            .await
            .expect("Failed to read body")
            .to_bytes();

        let body = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap_or_else(|_| Value::String(String::from_utf8_lossy(&bytes).into()))
        };
        (status, body)
    }
}

impl Default for TestEnv {
    fn default() -> Self {
        Self::new()
    }
}
