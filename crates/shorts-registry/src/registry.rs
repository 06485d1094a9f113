//! The in-memory job registry.

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use chrono::Utc;
use tokio::sync::{mpsc, RwLock, Semaphore};
use tracing::{info, warn};

use shorts_models::{Job, JobId, JobPatch, JobRequest, JobStatus, OptionsOverride};

use crate::error::{RegistryError, RegistryResult};

/// Registry tuning knobs.
#[derive(Debug, Clone)]
pub struct RegistryConfig {
    /// Global cap on concurrently running jobs
    pub max_concurrent_jobs: usize,
    /// Queued jobs beyond this are rejected with `QueueFull`
    pub max_queue_depth: usize,
}

impl Default for RegistryConfig {
    fn default() -> Self {
        Self {
            max_concurrent_jobs: 2,
            max_queue_depth: 32,
        }
    }
}

impl RegistryConfig {
    /// Create config from environment variables.
    pub fn from_env() -> Self {
        Self {
            max_concurrent_jobs: std::env::var("MAX_CONCURRENT_JOBS")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(2),
            max_queue_depth: std::env::var("MAX_QUEUE_DEPTH")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(32),
        }
    }
}

/// In-memory `job_id → Job` map plus the FIFO dispatch queue.
///
/// All mutations of a single record go through the write lock; readers get
/// a cloned snapshot, never a partially-updated record. After dispatch only
/// the owning worker writes to a job (single-writer invariant); the registry
/// additionally refuses any patch against a terminal record and clamps
/// progress so it never decreases.
pub struct JobRegistry {
    config: RegistryConfig,
    jobs: RwLock<HashMap<String, Job>>,
    idempotency: RwLock<HashMap<String, JobId>>,
    queue_tx: mpsc::UnboundedSender<JobId>,
    queue_rx: std::sync::Mutex<Option<mpsc::UnboundedReceiver<JobId>>>,
    queued: AtomicUsize,
    semaphore: Arc<Semaphore>,
}

impl JobRegistry {
    pub fn new(config: RegistryConfig) -> Self {
        let (queue_tx, queue_rx) = mpsc::unbounded_channel();
        let semaphore = Arc::new(Semaphore::new(config.max_concurrent_jobs));
        Self {
            config,
            jobs: RwLock::new(HashMap::new()),
            idempotency: RwLock::new(HashMap::new()),
            queue_tx,
            queue_rx: std::sync::Mutex::new(Some(queue_rx)),
            queued: AtomicUsize::new(0),
            semaphore,
        }
    }

    pub fn config(&self) -> &RegistryConfig {
        &self.config
    }

    /// Number of jobs accepted but not yet picked up by a worker.
    pub fn queue_len(&self) -> usize {
        self.queued.load(Ordering::SeqCst)
    }

    /// Validate and admit a new job.
    ///
    /// Returns the queued snapshot. A resubmission carrying an already-seen
    /// idempotency key returns the existing job instead of creating one.
    pub async fn create(&self, request: JobRequest) -> RegistryResult<Job> {
        request
            .validate()
            .map_err(|e| RegistryError::invalid_request(e.to_string()))?;

        if let Some(key) = &request.idempotency_key {
            let map = self.idempotency.read().await;
            if let Some(existing) = map.get(key) {
                if let Some(job) = self.jobs.read().await.get(existing.as_str()) {
                    info!(
                        job_id = %job.job_id,
                        trace_id = %job.trace_id,
                        stage = job.stage.map(|s| s.as_str()).unwrap_or("queued"),
                        idempotency_key = %key,
                        "Idempotency key match, returning existing job"
                    );
                    return Ok(job.clone());
                }
            }
        }

        self.admit(Job::new(request)).await
    }

    /// Fetch an immutable snapshot of a job.
    pub async fn get(&self, job_id: &JobId) -> RegistryResult<Job> {
        self.jobs
            .read()
            .await
            .get(job_id.as_str())
            .cloned()
            .ok_or_else(|| RegistryError::not_found(job_id.as_str()))
    }

    /// Apply a patch to a job record.
    ///
    /// Fails with `Terminal` if the record already reached `done`/`failed`.
    /// Progress is clamped to `[current, 1.0]` so it never decreases.
    pub async fn update(&self, job_id: &JobId, patch: JobPatch) -> RegistryResult<Job> {
        let mut jobs = self.jobs.write().await;
        let job = jobs
            .get_mut(job_id.as_str())
            .ok_or_else(|| RegistryError::not_found(job_id.as_str()))?;

        if job.is_terminal() {
            warn!(
                job_id = %job_id,
                trace_id = %job.trace_id,
                stage = job.stage.map(|s| s.as_str()).unwrap_or("queued"),
                "Rejected update against terminal job"
            );
            return Err(RegistryError::Terminal(job_id.to_string()));
        }

        if let Some(status) = patch.status {
            job.status = status;
        }
        if let Some(progress) = patch.progress {
            job.progress = progress.clamp(job.progress, 1.0);
        }
        if let Some(stage) = patch.stage {
            job.stage = Some(stage);
        }
        if let Some(message) = patch.message {
            job.message = message;
        }
        if let Some(outputs) = patch.outputs {
            job.outputs = outputs;
        }
        if let Some(error) = patch.error {
            job.error = Some(error);
        }
        job.updated_at = Utc::now();

        Ok(job.clone())
    }

    /// Create a fresh job retrying a terminal one.
    ///
    /// The new job shares the source reference, merges the options override,
    /// and gets a fresh id. Fails with `NotTerminal` while the original is
    /// still queued or running.
    pub async fn retry(
        &self,
        job_id: &JobId,
        options_override: Option<OptionsOverride>,
    ) -> RegistryResult<Job> {
        let original = self.get(job_id).await?;
        if !original.is_terminal() {
            return Err(RegistryError::NotTerminal(job_id.to_string()));
        }

        let mut request = original.request.clone();
        request.options = original.request.options.merged(options_override);
        // A retry is a new submission; it must not alias the old key.
        request.idempotency_key = None;
        request
            .validate()
            .map_err(|e| RegistryError::invalid_request(e.to_string()))?;

        let job = original.retried(request);
        info!(
            job_id = %job.job_id,
            trace_id = %job.trace_id,
            stage = "queued",
            retry_of = %job_id,
            attempt = job.attempt,
            "Retrying job"
        );
        self.admit(job).await
    }

    /// Insert a queued job and hand it to the dispatcher.
    async fn admit(&self, job: Job) -> RegistryResult<Job> {
        let depth = self.queued.load(Ordering::SeqCst);
        if depth >= self.config.max_queue_depth {
            warn!(stage = "queued", depth, "Rejecting job, queue is full");
            return Err(RegistryError::QueueFull(depth));
        }

        let snapshot = job.clone();
        {
            let mut jobs = self.jobs.write().await;
            jobs.insert(job.job_id.to_string(), job);
        }
        if let Some(key) = &snapshot.request.idempotency_key {
            self.idempotency
                .write()
                .await
                .insert(key.clone(), snapshot.job_id.clone());
        }

        self.queued.fetch_add(1, Ordering::SeqCst);
        self.queue_tx
            .send(snapshot.job_id.clone())
            .map_err(|_| RegistryError::Closed)?;

        info!(
            job_id = %snapshot.job_id,
            trace_id = %snapshot.trace_id,
            stage = "queued",
            "Job queued"
        );
        Ok(snapshot)
    }

    /// Count of jobs currently `running` (used by tests and diagnostics).
    pub async fn running_count(&self) -> usize {
        self.jobs
            .read()
            .await
            .values()
            .filter(|j| j.status == JobStatus::Running)
            .count()
    }

    pub(crate) fn semaphore(&self) -> Arc<Semaphore> {
        Arc::clone(&self.semaphore)
    }

    pub(crate) fn note_dequeued(&self) {
        self.queued.fetch_sub(1, Ordering::SeqCst);
    }

    pub(crate) fn take_queue_receiver(&self) -> Option<mpsc::UnboundedReceiver<JobId>> {
        self.queue_rx.lock().expect("queue receiver lock poisoned").take()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use shorts_models::{ErrorKind, JobError, Options, SourceType, Stage};

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

    fn registry() -> JobRegistry {
        JobRegistry::new(RegistryConfig::default())
    }

    #[tokio::test]
    async fn create_then_get_sees_the_job() {
        let reg = registry();
        let job = reg.create(request()).await.unwrap();
        let seen = reg.get(&job.job_id).await.unwrap();
        assert_eq!(seen.job_id, job.job_id);
        assert_eq!(seen.status, JobStatus::Queued);
        assert_eq!(reg.queue_len(), 1);
    }

    #[tokio::test]
    async fn get_unknown_is_not_found() {
        let reg = registry();
        let err = reg.get(&JobId::from_string("nope")).await.unwrap_err();
        assert!(matches!(err, RegistryError::NotFound(_)));
    }

    #[tokio::test]
    async fn invalid_request_is_rejected() {
        let reg = registry();
        let mut req = request();
        req.drive_file_id = None;
        let err = reg.create(req).await.unwrap_err();
        assert!(matches!(err, RegistryError::InvalidRequest(_)));
    }

    #[tokio::test]
    async fn queue_full_rejects() {
        let reg = JobRegistry::new(RegistryConfig {
            max_concurrent_jobs: 2,
            max_queue_depth: 2,
        });
        reg.create(request()).await.unwrap();
        reg.create(request()).await.unwrap();
        let err = reg.create(request()).await.unwrap_err();
        assert!(matches!(err, RegistryError::QueueFull(_)));
    }

    #[tokio::test]
    async fn progress_never_decreases() {
        let reg = registry();
        let job = reg.create(request()).await.unwrap();

        reg.update(&job.job_id, JobPatch::default().with_progress(0.5))
            .await
            .unwrap();
        let after = reg
            .update(&job.job_id, JobPatch::default().with_progress(0.2))
            .await
            .unwrap();
        assert_eq!(after.progress, 0.5);
    }

    #[tokio::test]
    async fn terminal_state_is_sticky() {
        let reg = registry();
        let job = reg.create(request()).await.unwrap();

        reg.update(
            &job.job_id,
            JobPatch::default()
                .with_status(JobStatus::Failed)
                .with_message("boom"),
        )
        .await
        .unwrap();

        let err = reg
            .update(&job.job_id, JobPatch::default().with_status(JobStatus::Running))
            .await
            .unwrap_err();
        assert!(matches!(err, RegistryError::Terminal(_)));

        let seen = reg.get(&job.job_id).await.unwrap();
        assert_eq!(seen.status, JobStatus::Failed);
    }

    #[tokio::test]
    async fn retry_requires_terminal() {
        let reg = registry();
        let job = reg.create(request()).await.unwrap();

        let err = reg.retry(&job.job_id, None).await.unwrap_err();
        assert!(matches!(err, RegistryError::NotTerminal(_)));

        reg.update(
            &job.job_id,
            JobPatch::default().with_status(JobStatus::Failed),
        )
        .await
        .unwrap();

        let retried = reg.retry(&job.job_id, None).await.unwrap();
        assert_ne!(retried.job_id, job.job_id);
        assert_eq!(retried.attempt, 2);
        assert_eq!(retried.retry_of, Some(job.job_id.clone()));
        assert_eq!(retried.status, JobStatus::Queued);
    }

    #[tokio::test]
    async fn retry_merges_options() {
        let reg = registry();
        let mut req = request();
        req.options.language = "en".to_string();
        req.options.target_count = 8;
        let job = reg.create(req).await.unwrap();
        reg.update(
            &job.job_id,
            JobPatch::default().with_status(JobStatus::Failed),
        )
        .await
        .unwrap();

        let over = OptionsOverride {
            force_rule_based: Some(true),
            ..Default::default()
        };

        let retried = reg.retry(&job.job_id, Some(over)).await.unwrap();
        assert!(retried.request.options.force_rule_based);
        // Unmentioned fields keep the original submission's values.
        assert_eq!(retried.request.options.language, "en");
        assert_eq!(retried.request.options.target_count, 8);
        // Source reference carried over unchanged.
        assert_eq!(retried.request.drive_file_id.as_deref(), Some("file-1"));
    }

    #[tokio::test]
    async fn idempotency_key_returns_existing_job() {
        let reg = registry();
        let mut req = request();
        req.idempotency_key = Some("make-run-42".to_string());

        let first = reg.create(req.clone()).await.unwrap();
        let second = reg.create(req).await.unwrap();
        assert_eq!(first.job_id, second.job_id);
        assert_eq!(reg.queue_len(), 1);
    }

    #[tokio::test]
    async fn error_record_lands_in_snapshot() {
        let reg = registry();
        let job = reg.create(request()).await.unwrap();

        let mut patch = JobPatch::default().with_status(JobStatus::Failed);
        patch.error = Some(JobError::new(ErrorKind::JobTimeout, "30m cap").at_stage(Stage::Rendering));
        reg.update(&job.job_id, patch).await.unwrap();

        let seen = reg.get(&job.job_id).await.unwrap();
        let err = seen.error.unwrap();
        assert_eq!(err.kind, ErrorKind::JobTimeout);
        assert_eq!(err.stage, Some(Stage::Rendering));
    }
}
