//! Per-job processing pipeline.
//!
//! This crate provides:
//! - The job pipeline (fetch → transcribe → select → render → upload)
//! - Segment selection: LLM strategy, rule-based strategy, fixed fallback
//! - The Gemini highlight-model client
//! - Jittered-backoff retry for transport operations
//! - Scratch directory lifecycle

pub mod config;
pub mod error;
pub mod fetch;
pub mod llm;
pub mod pipeline;
pub mod retry;
pub mod scratch;
pub mod selector;

pub use config::PipelineConfig;
pub use error::{WorkerError, WorkerResult};
pub use fetch::{DefaultFetcher, FetchedSource, SourceFetcher};
pub use llm::{GeminiClient, HighlightModel};
pub use pipeline::JobPipeline;
pub use scratch::ScratchDir;
