//! API error responses.

use axum::{
    extract::rejection::JsonRejection,
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use tracing::error;

/// Error returned by a route handler
#[derive(Debug)]
pub enum ApiError {
    /// Missing or malformed input; never reaches an actor
    BadRequest(String),
    /// Session never initialized or already erased
    NotFound(String),
    /// Session has ended; callers should stop retrying
    Gone(String),
    Internal(String),
}

#[derive(Serialize)]
struct ErrorResponse {
    success: bool,
    error: String,
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            ApiError::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg),
            ApiError::NotFound(msg) => (StatusCode::NOT_FOUND, msg),
            ApiError::Gone(msg) => (StatusCode::GONE, msg),
            ApiError::Internal(msg) => {
                error!(error = %msg, "Request failed");
                (StatusCode::INTERNAL_SERVER_ERROR, msg)
            }
        };

        let body = Json(ErrorResponse {
            success: false,
            error: message,
        });

        (status, body).into_response()
    }
}

impl From<sessiond_core::Error> for ApiError {
    fn from(err: sessiond_core::Error) -> Self {
        use sessiond_core::Error;
        match err {
            Error::SessionNotFound(_) => ApiError::NotFound("Session not found".to_string()),
            Error::SessionEnded(_) => ApiError::Gone("Session has ended".to_string()),
            Error::InvalidConfig(msg) => ApiError::BadRequest(msg),
            other => ApiError::Internal(other.to_string()),
        }
    }
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        ApiError::BadRequest(rejection.body_text())
    }
}
