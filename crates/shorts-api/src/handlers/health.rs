//! Health and version handlers. No auth.

use axum::Json;
use chrono::Utc;
use serde::Serialize;

/// Health response.
#[derive(Serialize)]
pub struct HealthResponse {
    pub ok: bool,
    pub timestamp: String,
}

/// Liveness probe.
pub async fn healthz() -> Json<HealthResponse> {
    Json(HealthResponse {
        ok: true,
        timestamp: Utc::now().to_rfc3339(),
    })
}

/// Version response.
#[derive(Serialize)]
pub struct VersionResponse {
    pub version: String,
    pub commit: String,
}

/// Build information.
pub async fn version() -> Json<VersionResponse> {
    Json(VersionResponse {
        version: env!("CARGO_PKG_VERSION").to_string(),
        commit: std::env::var("GIT_SHA").unwrap_or_else(|_| "dev".to_string()),
    })
}
