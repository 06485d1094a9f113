//! Shared data models for the auto-shorts job server.
//!
//! This crate provides Serde-serializable types for:
//! - Jobs, job status and pipeline stages
//! - Job submission requests and their options
//! - Transcripts and selection ranges
//! - Clip outputs and job error records

pub mod error;
pub mod job;
pub mod output;
pub mod request;
pub mod selection;
pub mod transcript;

pub use error::{ErrorKind, JobError};
pub use job::{Job, JobId, JobPatch, JobStatus, Stage};
pub use output::{ClipOutput, ClipSpan};
pub use request::{
    JobRequest, Options, OptionsOverride, RequestError, SourceType, SubtitleOverride,
    SubtitleStyle, WhisperModel, MIN_GUARANTEED,
};
pub use selection::{SelectionMethod, SelectionRange};
pub use transcript::{Transcript, TranscriptSegment};
