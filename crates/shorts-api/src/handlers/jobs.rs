//! Job submission and polling handlers.

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::Json;
use serde::{Deserialize, Serialize};
use tracing::info;

use shorts_models::{ClipOutput, Job, JobError, JobId, JobRequest, OptionsOverride, Stage};

use crate::error::ApiResult;
use crate::state::AppState;

/// Response for job creation and retry.
#[derive(Debug, Serialize)]
pub struct CreateJobResponse {
    pub job_id: String,
    pub status: String,
}

/// Full job snapshot returned to pollers.
#[derive(Debug, Serialize)]
pub struct JobStatusResponse {
    pub job_id: String,
    pub status: String,
    pub progress: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stage: Option<Stage>,
    pub message: String,
    pub outputs: Vec<ClipOutput>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<JobError>,
    pub trace_id: String,
    pub attempt: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub retry_of: Option<String>,
    pub created_at: String,
    pub updated_at: String,
}

impl From<Job> for JobStatusResponse {
    fn from(job: Job) -> Self {
        Self {
            job_id: job.job_id.to_string(),
            status: job.status.as_str().to_string(),
            progress: job.progress,
            stage: job.stage,
            message: job.message,
            outputs: job.outputs,
            error: job.error,
            trace_id: job.trace_id,
            attempt: job.attempt,
            retry_of: job.retry_of.map(|id| id.to_string()),
            created_at: job.created_at.to_rfc3339(),
            updated_at: job.updated_at.to_rfc3339(),
        }
    }
}

/// Retry request body. Options are a per-field override; unmentioned
/// fields keep the original submission's values.
#[derive(Debug, Default, Deserialize)]
pub struct RetryJobRequest {
    #[serde(default)]
    pub options: Option<OptionsOverride>,
}

/// POST /jobs
///
/// Validates and enqueues a job. 201 with `{job_id, status}` on success,
/// 400 on validation failure, 429 when the queue is full.
pub async fn create_job(
    State(state): State<AppState>,
    Json(request): Json<JobRequest>,
) -> ApiResult<(StatusCode, Json<CreateJobResponse>)> {
    info!(
        source_type = request.source_type.as_str(),
        target_count = request.options.target_count,
        "Creating job"
    );

    let job = state.registry.create(request).await?;

    Ok((
        StatusCode::CREATED,
        Json(CreateJobResponse {
            job_id: job.job_id.to_string(),
            status: job.status.as_str().to_string(),
        }),
    ))
}

/// GET /jobs/{job_id}
///
/// Full job snapshot. 404 when unknown.
pub async fn get_job(
    State(state): State<AppState>,
    Path(job_id): Path<String>,
) -> ApiResult<Json<JobStatusResponse>> {
    let job = state.registry.get(&JobId::from_string(job_id)).await?;
    Ok(Json(job.into()))
}

/// POST /jobs/{job_id}/retry
///
/// Creates a fresh job from a terminal one. 201 with the new id,
/// 409 while the referenced job is still queued or running.
pub async fn retry_job(
    State(state): State<AppState>,
    Path(job_id): Path<String>,
    body: Option<Json<RetryJobRequest>>,
) -> ApiResult<(StatusCode, Json<CreateJobResponse>)> {
    let options = body.and_then(|Json(b)| b.options);
    let job = state
        .registry
        .retry(&JobId::from_string(job_id), options)
        .await?;

    Ok((
        StatusCode::CREATED,
        Json(CreateJobResponse {
            job_id: job.job_id.to_string(),
            status: job.status.as_str().to_string(),
        }),
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    use shorts_models::{JobPatch, JobStatus, Options, SourceType};
    use shorts_registry::{JobRegistry, RegistryConfig};

    use crate::config::ApiConfig;
    use crate::error::ApiError;

    fn state() -> AppState {
        AppState::new(
            ApiConfig::default(),
            Arc::new(JobRegistry::new(RegistryConfig::default())),
        )
    }

    fn request() -> JobRequest {
        JobRequest {
            source_type: SourceType::Drive,
            drive_file_id: Some("file-1".to_string()),
            source_url: None,
            title_hint: None,
            idempotency_key: None,
            options: Options::default(),
        }
    }

    #[tokio::test]
    async fn create_returns_created_and_queued() {
        let state = state();
        let (status, Json(body)) = create_job(State(state.clone()), Json(request()))
            .await
            .unwrap();
        assert_eq!(status, StatusCode::CREATED);
        assert_eq!(body.status, "queued");

        let Json(snapshot) = get_job(State(state), Path(body.job_id.clone())).await.unwrap();
        assert_eq!(snapshot.job_id, body.job_id);
        assert_eq!(snapshot.progress, 0.0);
    }

    #[tokio::test]
    async fn invalid_request_is_bad_request() {
        let state = state();
        let mut bad = request();
        bad.drive_file_id = None;

        let err = create_job(State(state), Json(bad)).await.unwrap_err();
        assert!(matches!(err, ApiError::BadRequest(_)));
    }

    #[tokio::test]
    async fn unknown_job_is_not_found() {
        let state = state();
        let err = get_job(State(state), Path("missing".to_string()))
            .await
            .unwrap_err();
        assert!(matches!(err, ApiError::NotFound(_)));
    }

    #[tokio::test]
    async fn retry_of_running_job_conflicts() {
        let state = state();
        let (_, Json(created)) = create_job(State(state.clone()), Json(request()))
            .await
            .unwrap();

        let err = retry_job(State(state), Path(created.job_id), None)
            .await
            .unwrap_err();
        assert!(matches!(err, ApiError::Conflict(_)));
    }

    #[tokio::test]
    async fn retry_of_failed_job_creates_new_one() {
        let state = state();
        let (_, Json(created)) = create_job(State(state.clone()), Json(request()))
            .await
            .unwrap();

        state
            .registry
            .update(
                &JobId::from_string(created.job_id.clone()),
                JobPatch::default().with_status(JobStatus::Failed),
            )
            .await
            .unwrap();

        let (status, Json(retried)) = retry_job(
            State(state),
            Path(created.job_id.clone()),
            Some(Json(RetryJobRequest::default())),
        )
        .await
        .unwrap();
        assert_eq!(status, StatusCode::CREATED);
        assert_ne!(retried.job_id, created.job_id);
        assert_eq!(retried.status, "queued");
    }

    #[tokio::test]
    async fn full_queue_maps_to_queue_full() {
        let state = AppState::new(
            ApiConfig::default(),
            Arc::new(JobRegistry::new(RegistryConfig {
                max_concurrent_jobs: 2,
                max_queue_depth: 1,
            })),
        );

        create_job(State(state.clone()), Json(request())).await.unwrap();
        let err = create_job(State(state), Json(request())).await.unwrap_err();
        assert!(matches!(err, ApiError::QueueFull));
        assert_eq!(err.status_code(), StatusCode::TOO_MANY_REQUESTS);
    }
}
