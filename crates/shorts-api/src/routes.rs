//! API routes.

use axum::middleware;
use axum::routing::{get, post};
use axum::Router;

use crate::auth::require_api_key;
use crate::handlers::health::{healthz, version};
use crate::handlers::jobs::{create_job, get_job, retry_job};
use crate::middleware::{cors_layer, request_logging};
use crate::state::AppState;

/// Create the API router.
pub fn create_router(state: AppState) -> Router {
    let job_routes = Router::new()
        .route("/jobs", post(create_job))
        .route("/jobs/:job_id", get(get_job))
        .route("/jobs/:job_id/retry", post(retry_job))
        .layer(middleware::from_fn_with_state(
            state.clone(),
            require_api_key,
        ));

    let public_routes = Router::new()
        .route("/healthz", get(healthz))
        .route("/version", get(version));

    Router::new()
        .merge(job_routes)
        .merge(public_routes)
        .layer(middleware::from_fn(request_logging))
        .layer(cors_layer(&state.config.cors_origins))
        .with_state(state)
}
