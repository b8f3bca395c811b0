use crate::services::error::ServiceError;
use axum::{
    Json,
    extract::rejection::JsonRejection,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde_json::json;
use std::fmt;

/// A lightweight wrapper for errors that reach the HTTP boundary.
#[derive(Debug)]
pub struct AppError {
    pub status: StatusCode,
    pub message: String,
}

impl AppError {
    /// Create a new AppError with a specific status and message.
    pub fn new(status: StatusCode, msg: impl Into<String>) -> Self {
        Self {
            status,
            message: msg.into(),
        }
    }

    /// Shortcut for 400 Bad Request
    pub fn bad_request(msg: impl Into<String>) -> Self {
        Self::new(StatusCode::BAD_REQUEST, msg)
    }
}

impl fmt::Display for AppError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl std::error::Error for AppError {}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let body = Json(json!({ "error": self.message }));
        (self.status, body).into_response()
    }
}

/// Malformed or missing JSON bodies are client errors like any other.
impl From<JsonRejection> for AppError {
    fn from(rej: JsonRejection) -> Self {
        AppError::bad_request(rej.body_text())
    }
}

impl From<ServiceError> for AppError {
    fn from(err: ServiceError) -> Self {
        let status = match &err {
            ServiceError::Validation(_) => StatusCode::BAD_REQUEST,
            ServiceError::Unauthenticated | ServiceError::Forbidden(_) => StatusCode::FORBIDDEN,
            ServiceError::NotFound(_) => StatusCode::NOT_FOUND,
            ServiceError::Conflict(_) => StatusCode::CONFLICT,
            ServiceError::Dependency(_) | ServiceError::Inconsistent { .. } => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        };
        AppError::new(status, err.to_string())
    }
}
