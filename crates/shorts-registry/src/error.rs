//! Registry error types.

use thiserror::Error;

/// Result type for registry operations.
pub type RegistryResult<T> = Result<T, RegistryError>;

/// Errors surfaced by registry operations.
#[derive(Debug, Error)]
pub enum RegistryError {
    #[error("Job not found: {0}")]
    NotFound(String),

    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    #[error("Queue is full ({0} jobs queued)")]
    QueueFull(usize),

    #[error("Job {0} is not in a terminal state")]
    NotTerminal(String),

    #[error("Job {0} is terminal and cannot be updated")]
    Terminal(String),

    #[error("Registry is shutting down")]
    Closed,
}

impl RegistryError {
    pub fn not_found(job_id: impl Into<String>) -> Self {
        Self::NotFound(job_id.into())
    }

    pub fn invalid_request(msg: impl Into<String>) -> Self {
        Self::InvalidRequest(msg.into())
    }
}
