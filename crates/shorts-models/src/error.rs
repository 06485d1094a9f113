//! Job error records.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::job::Stage;

/// Classified failure kinds the pipeline distinguishes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    /// Source file missing, oversized, or without a usable audio track
    SourceUnusable,
    /// Speech-to-text failed or timed out
    TranscribeFailed,
    /// LLM API or response failure
    LlmFailed,
    /// Encoder exited non-zero or produced no output
    EncoderFailed,
    /// Source could not be decoded
    InputCorrupt,
    /// Remote-storage upload failed after retries
    UploadFailed,
    /// Could not meet the guaranteed minimum clip count
    NoSegmentsProducible,
    /// The overall job wall-clock cap was exceeded
    JobTimeout,
    /// Anything unclassified
    Internal,
}

impl ErrorKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorKind::SourceUnusable => "source_unusable",
            ErrorKind::TranscribeFailed => "transcribe_failed",
            ErrorKind::LlmFailed => "llm_failed",
            ErrorKind::EncoderFailed => "encoder_failed",
            ErrorKind::InputCorrupt => "input_corrupt",
            ErrorKind::UploadFailed => "upload_failed",
            ErrorKind::NoSegmentsProducible => "no_segments_producible",
            ErrorKind::JobTimeout => "job_timeout",
            ErrorKind::Internal => "internal",
        }
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// The error record attached to a failed job snapshot.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JobError {
    pub kind: ErrorKind,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stage: Option<Stage>,
}

impl JobError {
    pub fn new(kind: ErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
            stage: None,
        }
    }

    pub fn at_stage(mut self, stage: Stage) -> Self {
        self.stage = Some(stage);
        self
    }
}

impl fmt::Display for JobError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.kind, self.message)
    }
}
