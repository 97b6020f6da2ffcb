//! HTTP error mapping.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};

/// Error returned by request handlers.
///
/// Renders as `{"error": "<message>"}` with the matching status code.
#[derive(Debug)]
pub enum ApiError {
    Internal(tasksync_core::Error),
    NotFound(String),
    BadRequest(String),
}

impl From<tasksync_core::Error> for ApiError {
    fn from(err: tasksync_core::Error) -> Self {
        match err {
            tasksync_core::Error::NotFound(msg) => ApiError::NotFound(msg),
            tasksync_core::Error::InvalidInput(msg) => ApiError::BadRequest(msg),
            other => ApiError::Internal(other),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            ApiError::Internal(err) => {
                tracing::error!(subsystem = "api", error = %err, "Request failed");
                (StatusCode::INTERNAL_SERVER_ERROR, err.to_string())
            }
            ApiError::NotFound(msg) => (StatusCode::NOT_FOUND, msg),
            ApiError::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg),
        };

        let body = Json(serde_json::json!({
            "error": message,
        }));

        (status, body).into_response()
    }
}
