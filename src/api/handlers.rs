//! Route handlers.
//!
//! Storage is synchronous, so every handler hands its work to the blocking
//! pool and awaits the result.

use axum::{Json, extract::State};
use serde::Serialize;

use super::AppState;
use super::error::{ApiError, TASK_NOT_FOUND, describe};
use super::extract::{ApiJson, ApiPath, ApiQuery};
use crate::store::TaskStore;
use crate::types::{NewTask, Task, TaskPatch, TaskQuery};

/// Name reported by the health check.
pub const SERVICE_NAME: &str = "taskboard";

#[derive(Debug, Serialize)]
pub struct RootResponse {
    pub message: &'static str,
    pub status: &'static str,
    pub port: u16,
}

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub service: &'static str,
    pub port: u16,
}

#[derive(Debug, Serialize)]
pub struct ReadyResponse {
    pub status: &'static str,
    pub database: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct MessageResponse {
    pub message: &'static str,
}

/// Run `work` against the store on the blocking pool.
async fn with_store<T, F>(state: &AppState, work: F) -> Result<T, ApiError>
where
    F: FnOnce(&TaskStore) -> eyre::Result<T> + Send + 'static,
    T: Send + 'static,
{
    let store = state.store.clone();
    let outcome = tokio::task::spawn_blocking(move || work(&store)).await?;
    outcome.map_err(ApiError::from)
}

pub async fn root(State(state): State<AppState>) -> Json<RootResponse> {
    Json(RootResponse {
        message: "Taskboard API is running",
        status: "healthy",
        port: state.port,
    })
}

/// Liveness. Never touches storage.
pub async fn health_check(State(state): State<AppState>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy",
        service: SERVICE_NAME,
        port: state.port,
    })
}

/// Readiness. Reports storage trouble in the body rather than the status code.
pub async fn readiness_check(State(state): State<AppState>) -> Json<ReadyResponse> {
    let store = state.store.clone();
    let failure = match tokio::task::spawn_blocking(move || store.ping()).await {
        Ok(Ok(())) => None,
        Ok(Err(report)) => Some(describe(&report)),
        Err(e) => Some(e.to_string()),
    };

    Json(match failure {
        None => ReadyResponse {
            status: "ready",
            database: "connected",
            error: None,
        },
        Some(error) => {
            log::warn!("Readiness check failed: {}", error);
            ReadyResponse {
                status: "not ready",
                database: "disconnected",
                error: Some(error),
            }
        }
    })
}

pub async fn list_tasks(
    State(state): State<AppState>,
    ApiQuery(query): ApiQuery<TaskQuery>,
) -> Result<Json<Vec<Task>>, ApiError> {
    let tasks = with_store(&state, move |store| store.list_tasks(Some(&query))).await?;
    Ok(Json(tasks))
}

pub async fn create_task(
    State(state): State<AppState>,
    ApiJson(input): ApiJson<NewTask>,
) -> Result<Json<Task>, ApiError> {
    let task = with_store(&state, move |store| store.create_task(input)).await?;
    Ok(Json(task))
}

pub async fn get_task(
    State(state): State<AppState>,
    ApiPath(id): ApiPath<i64>,
) -> Result<Json<Task>, ApiError> {
    match with_store(&state, move |store| store.get_task(id)).await? {
        Some(task) => Ok(Json(task)),
        None => Err(ApiError::not_found(TASK_NOT_FOUND)),
    }
}

pub async fn update_task(
    State(state): State<AppState>,
    ApiPath(id): ApiPath<i64>,
    ApiJson(patch): ApiJson<TaskPatch>,
) -> Result<Json<Task>, ApiError> {
    let task = with_store(&state, move |store| store.update_task(id, patch)).await?;
    Ok(Json(task))
}

pub async fn delete_task(
    State(state): State<AppState>,
    ApiPath(id): ApiPath<i64>,
) -> Result<Json<MessageResponse>, ApiError> {
    with_store(&state, move |store| store.delete_task(id)).await?;
    Ok(Json(MessageResponse {
        message: "Task deleted successfully",
    }))
}

pub async fn list_categories(State(state): State<AppState>) -> Result<Json<Vec<String>>, ApiError> {
    let categories = with_store(&state, |store| store.list_categories()).await?;
    Ok(Json(categories))
}
