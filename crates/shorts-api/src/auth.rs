//! Shared-secret authentication.

use axum::body::Body;
use axum::extract::State;
use axum::http::Request;
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};

use crate::error::ApiError;
use crate::state::AppState;

/// Header carrying the shared secret.
pub const API_KEY_HEADER: &str = "X-API-KEY";

/// Exact-string check of the presented key against the configured secret.
///
/// A server without a configured secret accepts nothing; authentication
/// cannot be disabled by omission.
pub fn verify_api_key(presented: Option<&str>, configured: &str) -> bool {
    match presented {
        Some(key) => !configured.is_empty() && key == configured,
        None => false,
    }
}

/// Middleware guarding the job endpoints.
pub async fn require_api_key(
    State(state): State<AppState>,
    request: Request<Body>,
    next: Next,
) -> Response {
    let presented = request
        .headers()
        .get(API_KEY_HEADER)
        .and_then(|v| v.to_str().ok());

    if !verify_api_key(presented, &state.config.shared_secret) {
        return ApiError::Unauthorized.into_response();
    }

    next.run(request).await
}
