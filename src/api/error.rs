//! API error handling.
//!
//! Every failure leaves the service as `{"detail": ...}`. The detail is a
//! plain message for not-found and internal errors, and a list of located
//! messages for rejected input, including bodies that are not JSON.

use axum::{
    Json,
    extract::rejection::{JsonRejection, PathRejection, QueryRejection},
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::Serialize;
use tokio::task::JoinError;

use crate::store::StoreError;

/// Detail text for a missing task.
pub const TASK_NOT_FOUND: &str = "Task not found";

/// One rejected piece of input.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FieldError {
    /// Where the problem is, e.g. `["body"]` or `["path", "id"]`
    pub loc: Vec<String>,

    pub msg: String,

    #[serde(rename = "type")]
    pub kind: String,
}

impl FieldError {
    pub fn new(loc: &[&str], msg: impl Into<String>, kind: impl Into<String>) -> Self {
        Self {
            loc: loc.iter().map(|part| part.to_string()).collect(),
            msg: msg.into(),
            kind: kind.into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum ErrorDetail {
    Message(String),
    Fields(Vec<FieldError>),
}

/// An HTTP error response.
#[derive(Debug, Clone)]
pub struct ApiError {
    pub status: StatusCode,
    pub detail: ErrorDetail,
}

#[derive(Serialize)]
struct ErrorBody<'a> {
    detail: &'a ErrorDetail,
}

impl ApiError {
    pub fn new(status: StatusCode, message: impl Into<String>) -> Self {
        Self {
            status,
            detail: ErrorDetail::Message(message.into()),
        }
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        Self::new(StatusCode::NOT_FOUND, message)
    }

    pub fn internal(message: impl Into<String>) -> Self {
        Self::new(StatusCode::INTERNAL_SERVER_ERROR, message)
    }

    /// 422 with located messages.
    pub fn validation(errors: Vec<FieldError>) -> Self {
        Self {
            status: StatusCode::UNPROCESSABLE_ENTITY,
            detail: ErrorDetail::Fields(errors),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (self.status, Json(ErrorBody { detail: &self.detail })).into_response()
    }
}

/// Render a report with its whole cause chain.
pub(crate) fn describe(report: &eyre::Report) -> String {
    report
        .chain()
        .map(|cause| cause.to_string())
        .collect::<Vec<_>>()
        .join(": ")
}

impl From<eyre::Report> for ApiError {
    fn from(report: eyre::Report) -> Self {
        match StoreError::from_report(&report) {
            Some(StoreError::TaskNotFound(_)) => Self::not_found(TASK_NOT_FOUND),
            None => {
                let description = describe(&report);
                log::error!("Request failed: {}", description);
                Self::internal(description)
            }
        }
    }
}

impl From<JoinError> for ApiError {
    fn from(error: JoinError) -> Self {
        log::error!("Storage task did not complete: {}", error);
        Self::internal(error.to_string())
    }
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        match rejection {
            JsonRejection::JsonDataError(e) => {
                Self::validation(vec![FieldError::new(&["body"], e.body_text(), "value_error")])
            }
            JsonRejection::JsonSyntaxError(e) => {
                Self::validation(vec![FieldError::new(&["body"], e.body_text(), "json_invalid")])
            }
            JsonRejection::MissingJsonContentType(e) => {
                Self::validation(vec![FieldError::new(&["body"], e.body_text(), "content_type")])
            }
            other => Self::new(other.status(), other.body_text()),
        }
    }
}

impl From<PathRejection> for ApiError {
    fn from(rejection: PathRejection) -> Self {
        match rejection {
            PathRejection::FailedToDeserializePathParams(e) => {
                Self::validation(vec![FieldError::new(&["path"], e.body_text(), "type_error")])
            }
            other => Self::new(other.status(), other.body_text()),
        }
    }
}

impl From<QueryRejection> for ApiError {
    fn from(rejection: QueryRejection) -> Self {
        match rejection {
            QueryRejection::FailedToDeserializeQueryString(e) => {
                Self::validation(vec![FieldError::new(&["query"], e.body_text(), "type_error")])
            }
            other => Self::new(other.status(), other.body_text()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::to_bytes;

    async fn body_json(error: ApiError) -> (StatusCode, serde_json::Value) {
        let response = error.into_response();
        let status = response.status();
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        (status, serde_json::from_slice(&bytes).unwrap())
    }

    #[tokio::test]
    async fn test_not_found_body() {
        let (status, body) = body_json(ApiError::not_found(TASK_NOT_FOUND)).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(body, serde_json::json!({"detail": "Task not found"}));
    }

    #[tokio::test]
    async fn test_validation_body() {
        let error = ApiError::validation(vec![FieldError::new(&["body"], "missing field `title`", "value_error")]);
        let (status, body) = body_json(error).await;
        assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
        assert_eq!(body["detail"][0]["loc"], serde_json::json!(["body"]));
        assert_eq!(body["detail"][0]["type"], "value_error");
    }

    #[test]
    fn test_store_not_found_maps_to_404() {
        let report = eyre::Report::new(StoreError::TaskNotFound(9)).wrap_err("Failed to update");
        let error = ApiError::from(report);
        assert_eq!(error.status, StatusCode::NOT_FOUND);
        assert_eq!(error.detail, ErrorDetail::Message(TASK_NOT_FOUND.to_string()));
    }

    #[test]
    fn test_other_reports_map_to_500_with_cause_chain() {
        let report = eyre::eyre!("disk I/O error").wrap_err("Failed to create task");
        let error = ApiError::from(report);
        assert_eq!(error.status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(
            error.detail,
            ErrorDetail::Message("Failed to create task: disk I/O error".to_string())
        );
    }
}
