//! Speech-to-text engine seam and the Whisper CLI implementation.

use async_trait::async_trait;
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::Duration;
use tokio::process::Command;
use tracing::{debug, info, warn};

use shorts_models::{Transcript, TranscriptSegment, WhisperModel};

use crate::error::{MediaError, MediaResult};

/// Seam for transcript production.
///
/// Implementations must return segments that are monotonic and
/// non-overlapping; empty audio yields an empty transcript, not an error.
#[async_trait]
pub trait SpeechToText: Send + Sync {
    async fn transcribe(
        &self,
        media: &Path,
        language: &str,
        model: WhisperModel,
    ) -> MediaResult<Transcript>;
}

/// Whisper CLI engine.
///
/// Invokes the `whisper` command with JSON output and parses the segment
/// list. The binary name can be overridden for whisper.cpp style wrappers.
pub struct WhisperCli {
    binary: String,
    timeout: Duration,
}

impl WhisperCli {
    pub fn new(binary: impl Into<String>, timeout: Duration) -> Self {
        Self {
            binary: binary.into(),
            timeout,
        }
    }
}

impl Default for WhisperCli {
    fn default() -> Self {
        Self::new("whisper", Duration::from_secs(1800))
    }
}

/// Whisper JSON output shape (the fields we read).
#[derive(Debug, Deserialize)]
struct WhisperOutput {
    #[serde(default)]
    segments: Vec<WhisperSegment>,
    language: Option<String>,
}

#[derive(Debug, Deserialize)]
struct WhisperSegment {
    start: f64,
    end: f64,
    text: String,
}

#[async_trait]
impl SpeechToText for WhisperCli {
    async fn transcribe(
        &self,
        media: &Path,
        language: &str,
        model: WhisperModel,
    ) -> MediaResult<Transcript> {
        which::which(&self.binary).map_err(|_| MediaError::WhisperNotFound)?;

        let out_dir = media
            .parent()
            .map(Path::to_path_buf)
            .unwrap_or_else(|| PathBuf::from("."));

        info!(
            stage = "transcribing",
            media = %media.display(),
            model = model.as_str(),
            language,
            "Running whisper transcription"
        );

        let child = Command::new(&self.binary)
            .arg(media)
            .args(["--model", model.as_str()])
            .args(["--language", language])
            .args(["--output_format", "json"])
            .args(["--output_dir", &out_dir.to_string_lossy()])
            .args(["--verbose", "False"])
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()?;

        let output = tokio::time::timeout(self.timeout, child.wait_with_output())
            .await
            .map_err(|_| {
                warn!(stage = "transcribing", timeout_secs = self.timeout.as_secs(), "whisper timed out");
                MediaError::Timeout(self.timeout.as_secs())
            })??;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(MediaError::transcribe_failed(format!(
                "whisper exited with {:?}: {}",
                output.status.code(),
                stderr.lines().last().unwrap_or("")
            )));
        }

        let json_path = out_dir.join(
            media
                .file_stem()
                .map(|s| format!("{}.json", s.to_string_lossy()))
                .unwrap_or_else(|| "source.json".to_string()),
        );
        let raw = tokio::fs::read_to_string(&json_path).await.map_err(|e| {
            MediaError::transcribe_failed(format!(
                "whisper output {} unreadable: {}",
                json_path.display(),
                e
            ))
        })?;

        let parsed = parse_whisper_json(&raw)?;
        debug!(stage = "transcribing", segments = parsed.segments.len(), "Transcription parsed");
        Ok(parsed)
    }
}

/// Parse whisper JSON into a normalized transcript.
fn parse_whisper_json(raw: &str) -> MediaResult<Transcript> {
    let output: WhisperOutput = serde_json::from_str(raw)?;

    let segments = output
        .segments
        .into_iter()
        .map(|s| TranscriptSegment::new(s.start, s.end, s.text.trim().to_string()))
        .filter(|s| !s.text.is_empty())
        .collect();

    let mut transcript = Transcript::new(segments).normalized();
    transcript.language_detected = output.language;
    Ok(transcript)
}
