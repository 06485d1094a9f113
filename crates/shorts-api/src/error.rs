//! API error types and HTTP mapping.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;
use thiserror::Error;

use shorts_registry::RegistryError;

pub type ApiResult<T> = Result<T, ApiError>;

#[derive(Debug, Error)]
pub enum ApiError {
    #[error("Invalid API key")]
    Unauthorized,

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Bad request: {0}")]
    BadRequest(String),

    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Queue is full")]
    QueueFull,

    #[error("Internal error: {0}")]
    Internal(String),
}

impl ApiError {
    pub fn not_found(msg: impl Into<String>) -> Self {
        Self::NotFound(msg.into())
    }

    pub fn bad_request(msg: impl Into<String>) -> Self {
        Self::BadRequest(msg.into())
    }

    pub fn internal(msg: impl Into<String>) -> Self {
        Self::Internal(msg.into())
    }

    pub fn status_code(&self) -> StatusCode {
        match self {
            ApiError::Unauthorized => StatusCode::UNAUTHORIZED,
            ApiError::NotFound(_) => StatusCode::NOT_FOUND,
            ApiError::BadRequest(_) => StatusCode::BAD_REQUEST,
            ApiError::Conflict(_) => StatusCode::CONFLICT,
            ApiError::QueueFull => StatusCode::TOO_MANY_REQUESTS,
            ApiError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl From<RegistryError> for ApiError {
    fn from(err: RegistryError) -> Self {
        match err {
            RegistryError::NotFound(id) => ApiError::NotFound(format!("Job {id} not found")),
            RegistryError::InvalidRequest(msg) => ApiError::BadRequest(msg),
            RegistryError::QueueFull(_) => ApiError::QueueFull,
            RegistryError::NotTerminal(id) => {
                ApiError::Conflict(format!("Job {id} is not in a terminal state"))
            }
            RegistryError::Terminal(id) => {
                ApiError::Conflict(format!("Job {id} is already terminal"))
            }
            RegistryError::Closed => ApiError::Internal("registry is shutting down".to_string()),
        }
    }
}

#[derive(Serialize)]
struct ErrorResponse {
    detail: String,
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status_code();

        // Client errors are the caller's problem; keep them out of ERROR logs.
        match &self {
            ApiError::Internal(msg) => tracing::error!(error = %msg, "Internal error"),
            ApiError::Unauthorized => tracing::warn!("Invalid API key attempt"),
            other => tracing::debug!(error = %other, "Request rejected"),
        }

        let body = ErrorResponse {
            detail: self.to_string(),
        };
        (status, Json(body)).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn registry_errors_map_to_contract_statuses() {
        let cases = [
            (
                ApiError::from(RegistryError::NotFound("x".into())),
                StatusCode::NOT_FOUND,
            ),
            (
                ApiError::from(RegistryError::InvalidRequest("bad".into())),
                StatusCode::BAD_REQUEST,
            ),
            (
                ApiError::from(RegistryError::QueueFull(32)),
                StatusCode::TOO_MANY_REQUESTS,
            ),
            (
                ApiError::from(RegistryError::NotTerminal("x".into())),
                StatusCode::CONFLICT,
            ),
        ];
        for (err, status) in cases {
            assert_eq!(err.status_code(), status);
        }
        assert_eq!(ApiError::Unauthorized.status_code(), StatusCode::UNAUTHORIZED);
    }
}
