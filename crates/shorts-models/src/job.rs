//! Job record and lifecycle types.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

use crate::error::JobError;
use crate::output::ClipOutput;
use crate::request::JobRequest;

/// Unique identifier for a job.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct JobId(pub String);

impl JobId {
    /// Generate a new random job ID.
    pub fn new() -> Self {
        Self(Uuid::new_v4().to_string())
    }

    /// Create from an existing string.
    pub fn from_string(s: impl Into<String>) -> Self {
        Self(s.into())
    }

    /// Get the inner string.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for JobId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for JobId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Job lifecycle state.
///
/// `Done` and `Failed` are terminal; a terminal job never transitions again.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum JobStatus {
    /// Waiting for a worker slot
    #[default]
    Queued,
    /// A worker owns the job and is executing stages
    Running,
    /// Completed with at least the guaranteed minimum of clips
    Done,
    /// Terminated with an error
    Failed,
}

impl JobStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            JobStatus::Queued => "queued",
            JobStatus::Running => "running",
            JobStatus::Done => "done",
            JobStatus::Failed => "failed",
        }
    }

    /// Check if this is a terminal state (no more updates expected).
    pub fn is_terminal(&self) -> bool {
        matches!(self, JobStatus::Done | JobStatus::Failed)
    }
}

impl fmt::Display for JobStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Coarse phase of a running job.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    Fetching,
    Transcribing,
    Selecting,
    Rendering,
    Uploading,
    Done,
}

impl Stage {
    pub fn as_str(&self) -> &'static str {
        match self {
            Stage::Fetching => "fetching",
            Stage::Transcribing => "transcribing",
            Stage::Selecting => "selecting",
            Stage::Rendering => "rendering",
            Stage::Uploading => "uploading",
            Stage::Done => "done",
        }
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A job tracked by the registry.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Job {
    /// Unique job ID
    pub job_id: JobId,

    /// Correlation token for logs
    pub trace_id: String,

    /// Lifecycle state
    pub status: JobStatus,

    /// Progress in [0.0, 1.0], monotonically non-decreasing
    pub progress: f64,

    /// Current coarse phase (set once the worker picks the job up)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stage: Option<Stage>,

    /// Free-form human message
    pub message: String,

    /// The accepted submission
    pub request: JobRequest,

    /// Finished clips, in chronological source order
    pub outputs: Vec<ClipOutput>,

    /// Set only when `status == Failed`
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<JobError>,

    /// 1-based attempt number across retries of the same source
    pub attempt: u32,

    /// Job this one was retried from, if any
    #[serde(skip_serializing_if = "Option::is_none")]
    pub retry_of: Option<JobId>,

    /// Creation timestamp
    pub created_at: DateTime<Utc>,

    /// Last update timestamp
    pub updated_at: DateTime<Utc>,
}

impl Job {
    /// Create a freshly queued job for an accepted request.
    pub fn new(request: JobRequest) -> Self {
        let job_id = JobId::new();
        let trace_id = format!("trace-{}", &job_id.as_str()[..12.min(job_id.as_str().len())]);
        let now = Utc::now();

        Self {
            job_id,
            trace_id,
            status: JobStatus::Queued,
            progress: 0.0,
            stage: None,
            message: "Job queued".to_string(),
            request,
            outputs: Vec::new(),
            error: None,
            attempt: 1,
            retry_of: None,
            created_at: now,
            updated_at: now,
        }
    }

    /// Create a retry of this job: fresh id, same source, merged options.
    pub fn retried(&self, request: JobRequest) -> Self {
        let mut job = Job::new(request);
        job.attempt = self.attempt + 1;
        job.retry_of = Some(self.job_id.clone());
        job.message = "Job queued for retry".to_string();
        job
    }

    pub fn is_terminal(&self) -> bool {
        self.status.is_terminal()
    }
}

/// A partial update to a job record.
///
/// Only the owning worker may apply patches after dispatch; the registry
/// rejects patches against terminal jobs and clamps progress so it never
/// decreases.
#[derive(Debug, Clone, Default)]
pub struct JobPatch {
    pub status: Option<JobStatus>,
    pub progress: Option<f64>,
    pub stage: Option<Stage>,
    pub message: Option<String>,
    pub outputs: Option<Vec<ClipOutput>>,
    pub error: Option<JobError>,
}

impl JobPatch {
    /// Patch that enters a stage at the given progress breakpoint.
    pub fn stage(stage: Stage, progress: f64) -> Self {
        Self {
            stage: Some(stage),
            progress: Some(progress),
            ..Default::default()
        }
    }

    pub fn with_status(mut self, status: JobStatus) -> Self {
        self.status = Some(status);
        self
    }

    pub fn with_message(mut self, message: impl Into<String>) -> Self {
        self.message = Some(message.into());
        self
    }

    pub fn with_progress(mut self, progress: f64) -> Self {
        self.progress = Some(progress);
        self
    }

    pub fn with_outputs(mut self, outputs: Vec<ClipOutput>) -> Self {
        self.outputs = Some(outputs);
        self
    }
}
