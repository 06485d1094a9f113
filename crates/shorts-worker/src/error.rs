//! Worker error types.

use thiserror::Error;

use shorts_models::ErrorKind;

pub type WorkerResult<T> = Result<T, WorkerError>;

#[derive(Debug, Error)]
pub enum WorkerError {
    #[error("Source unusable: {0}")]
    SourceUnusable(String),

    #[error("Transcription failed: {0}")]
    TranscribeFailed(String),

    #[error("LLM failed: {0}")]
    LlmFailed(String),

    #[error("Encoder failed: {0}")]
    EncoderFailed(String),

    #[error("Input corrupt: {0}")]
    InputCorrupt(String),

    #[error("Upload failed: {0}")]
    UploadFailed(String),

    #[error("Cannot produce the guaranteed minimum of clips: {0}")]
    NoSegmentsProducible(String),

    #[error("Job timed out: {0}")]
    JobTimeout(String),

    #[error("Registry error: {0}")]
    Registry(#[from] shorts_registry::RegistryError),

    #[error("Media error: {0}")]
    Media(#[from] shorts_media::MediaError),

    #[error("Storage error: {0}")]
    Storage(#[from] shorts_storage::StorageError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl WorkerError {
    pub fn source_unusable(msg: impl Into<String>) -> Self {
        Self::SourceUnusable(msg.into())
    }

    pub fn llm_failed(msg: impl Into<String>) -> Self {
        Self::LlmFailed(msg.into())
    }

    pub fn no_segments(msg: impl Into<String>) -> Self {
        Self::NoSegmentsProducible(msg.into())
    }

    pub fn internal(msg: impl Into<String>) -> Self {
        Self::Internal(msg.into())
    }

    /// The classified kind recorded on a failed job snapshot.
    pub fn kind(&self) -> ErrorKind {
        match self {
            WorkerError::SourceUnusable(_) => ErrorKind::SourceUnusable,
            WorkerError::TranscribeFailed(_) => ErrorKind::TranscribeFailed,
            WorkerError::LlmFailed(_) => ErrorKind::LlmFailed,
            WorkerError::EncoderFailed(_) => ErrorKind::EncoderFailed,
            WorkerError::InputCorrupt(_) => ErrorKind::InputCorrupt,
            WorkerError::UploadFailed(_) | WorkerError::Storage(_) => ErrorKind::UploadFailed,
            WorkerError::NoSegmentsProducible(_) => ErrorKind::NoSegmentsProducible,
            WorkerError::JobTimeout(_) => ErrorKind::JobTimeout,
            WorkerError::Media(e) if e.is_input_corrupt() => ErrorKind::InputCorrupt,
            WorkerError::Media(_)
            | WorkerError::Registry(_)
            | WorkerError::Io(_)
            | WorkerError::Internal(_) => ErrorKind::Internal,
        }
    }
}
