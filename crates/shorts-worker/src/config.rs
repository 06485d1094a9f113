//! Pipeline configuration.

use std::path::PathBuf;
use std::time::Duration;

/// Immutable pipeline configuration, passed explicitly into each stage.
#[derive(Debug, Clone)]
pub struct PipelineConfig {
    /// Root for per-job scratch directories
    pub tmp_dir: PathBuf,
    /// Source download cap (per attempt)
    pub download_timeout: Duration,
    /// Transcription wall-clock cap
    pub transcribe_timeout: Duration,
    /// Overall per-job wall-clock cap
    pub job_timeout: Duration,
    /// Base delay for transport-retry backoff
    pub retry_base_delay: Duration,
    /// Remote folder clips are published into
    pub output_folder_id: String,
    /// Speech-to-text binary name
    pub whisper_binary: String,
    /// LLM credential; the LLM strategy is skipped when absent
    pub gemini_api_key: Option<String>,
    /// LLM model name
    pub gemini_model: String,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            tmp_dir: PathBuf::from("/tmp/autoshorts"),
            download_timeout: Duration::from_secs(600),
            transcribe_timeout: Duration::from_secs(1800),
            job_timeout: Duration::from_secs(1800),
            retry_base_delay: Duration::from_secs(2),
            output_folder_id: String::new(),
            whisper_binary: "whisper".to_string(),
            gemini_api_key: None,
            gemini_model: "gemini-1.5-flash".to_string(),
        }
    }
}

impl PipelineConfig {
    /// Create config from environment variables.
    pub fn from_env() -> Self {
        Self {
            tmp_dir: std::env::var("TMP_DIR")
                .map(PathBuf::from)
                .unwrap_or_else(|_| PathBuf::from("/tmp/autoshorts")),
            download_timeout: Duration::from_secs(
                std::env::var("DOWNLOAD_TIMEOUT")
                    .ok()
                    .and_then(|s| s.parse().ok())
                    .unwrap_or(600),
            ),
            transcribe_timeout: Duration::from_secs(
                std::env::var("TRANSCRIBE_TIMEOUT")
                    .ok()
                    .and_then(|s| s.parse().ok())
                    .unwrap_or(1800),
            ),
            job_timeout: Duration::from_secs(
                std::env::var("JOB_TIMEOUT")
                    .ok()
                    .and_then(|s| s.parse().ok())
                    .unwrap_or(1800),
            ),
            retry_base_delay: Duration::from_secs(
                std::env::var("RETRY_BACKOFF_BASE")
                    .ok()
                    .and_then(|s| s.parse().ok())
                    .unwrap_or(2),
            ),
            output_folder_id: std::env::var("DRIVE_READY_FOLDER_ID").unwrap_or_default(),
            whisper_binary: std::env::var("WHISPER_BINARY").unwrap_or_else(|_| "whisper".to_string()),
            gemini_api_key: std::env::var("GEMINI_API_KEY").ok().filter(|s| !s.is_empty()),
            gemini_model: std::env::var("GEMINI_MODEL")
                .unwrap_or_else(|_| "gemini-1.5-flash".to_string()),
        }
    }

    /// Required-value check, logged as warnings at startup.
    pub fn validate(&self) -> Vec<String> {
        let mut errors = Vec::new();
        if self.output_folder_id.is_empty() {
            errors.push("DRIVE_READY_FOLDER_ID is required".to_string());
        }
        if self.gemini_api_key.is_none() {
            errors.push("GEMINI_API_KEY not set; LLM selection disabled".to_string());
        }
        errors
    }
}
