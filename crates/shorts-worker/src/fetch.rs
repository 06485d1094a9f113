//! Source acquisition: remote-storage download or URL downloader.

use async_trait::async_trait;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{info, warn};

use shorts_media::{download_url_video, probe_video, MediaError, VideoInfo};
use shorts_models::{JobRequest, SourceType};
use shorts_storage::{StorageClient, StorageError};

use crate::config::PipelineConfig;
use crate::error::{WorkerError, WorkerResult};
use crate::retry::{retry_async, RetryConfig};
use crate::scratch::ScratchDir;

/// Maximum accepted source size: 2 GB.
const MAX_SOURCE_BYTES: u64 = 2 * 1024 * 1024 * 1024;

/// A fetched, validated source video.
#[derive(Debug, Clone)]
pub struct FetchedSource {
    /// Local path inside the job's scratch directory
    pub path: PathBuf,
    /// Container extension ("mp4", "mkv", ...)
    pub container: String,
    /// Probe result (duration, geometry, audio presence)
    pub info: VideoInfo,
}

/// Seam for source acquisition.
#[async_trait]
pub trait SourceFetcher: Send + Sync {
    /// Obtain the source as a local file, retrying transport errors.
    async fn fetch(&self, request: &JobRequest, scratch: &ScratchDir)
        -> WorkerResult<FetchedSource>;
}

/// Production fetcher: Drive download by id, yt-dlp for public URLs.
pub struct DefaultFetcher {
    storage: Arc<dyn StorageClient>,
    config: PipelineConfig,
}

impl DefaultFetcher {
    pub fn new(storage: Arc<dyn StorageClient>, config: PipelineConfig) -> Self {
        Self { storage, config }
    }

    async fn fetch_drive(&self, file_id: &str, scratch: &ScratchDir) -> WorkerResult<PathBuf> {
        let dest = scratch.source_path("mp4");
        let retry = RetryConfig::new("drive_download").with_base_delay(self.config.retry_base_delay);

        retry_async(
            &retry,
            || self.storage.download_file(file_id, &dest),
            StorageError::is_retryable,
        )
        .await
        .map_err(|e| match e {
            StorageError::NotFound(id) => {
                WorkerError::source_unusable(format!("Drive file {id} not found"))
            }
            other => WorkerError::source_unusable(format!("download failed: {other}")),
        })?;

        Ok(dest)
    }

    async fn fetch_url(&self, url: &str, scratch: &ScratchDir) -> WorkerResult<PathBuf> {
        let retry = RetryConfig::new("url_download").with_base_delay(self.config.retry_base_delay);

        retry_async(
            &retry,
            || download_url_video(url, scratch.path(), self.config.download_timeout),
            |e| matches!(e, MediaError::DownloadFailed(_) | MediaError::Timeout(_)),
        )
        .await
        .map_err(|e| WorkerError::source_unusable(format!("download failed: {e}")))
    }
}

#[async_trait]
impl SourceFetcher for DefaultFetcher {
    async fn fetch(
        &self,
        request: &JobRequest,
        scratch: &ScratchDir,
    ) -> WorkerResult<FetchedSource> {
        let path = match request.source_type {
            SourceType::Drive => {
                let file_id = request
                    .drive_file_id
                    .as_deref()
                    .ok_or_else(|| WorkerError::source_unusable("missing drive_file_id"))?;
                self.fetch_drive(file_id, scratch).await?
            }
            SourceType::Url => {
                let url = request
                    .source_url
                    .as_deref()
                    .ok_or_else(|| WorkerError::source_unusable("missing source_url"))?;
                self.fetch_url(url, scratch).await?
            }
        };

        let info = probe_video(&path).await.map_err(|e| {
            warn!(stage = "fetching", error = %e, "Source failed to probe");
            WorkerError::source_unusable(format!("cannot probe source: {e}"))
        })?;

        validate_source(&info)?;

        let container = path
            .extension()
            .and_then(|s| s.to_str())
            .unwrap_or("mp4")
            .to_string();

        info!(
            stage = "fetching",
            path = %path.display(),
            duration = info.duration,
            size = info.size,
            container = %container,
            "Source fetched"
        );

        Ok(FetchedSource { path, container, info })
    }
}

/// Reject oversized sources and sources without a usable audio track.
fn validate_source(info: &VideoInfo) -> WorkerResult<()> {
    if info.size > MAX_SOURCE_BYTES {
        return Err(WorkerError::source_unusable(format!(
            "source is {} bytes, over the 2 GB limit",
            info.size
        )));
    }
    if !info.has_audio || info.audio_duration <= 0.0 {
        return Err(WorkerError::source_unusable("source has no usable audio track"));
    }
    if info.duration <= 0.0 {
        return Err(WorkerError::source_unusable("source has zero duration"));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn info() -> VideoInfo {
        VideoInfo {
            duration: 600.0,
            width: 1920,
            height: 1080,
            codec: "h264".to_string(),
            format_name: "mov,mp4,m4a,3gp,3g2,mj2".to_string(),
            size: 100 * 1024 * 1024,
            has_audio: true,
            audio_duration: 600.0,
        }
    }

    #[test]
    fn accepts_normal_source() {
        assert!(validate_source(&info()).is_ok());
    }

    #[test]
    fn rejects_oversized_source() {
        let mut i = info();
        i.size = MAX_SOURCE_BYTES + 1;
        let err = validate_source(&i).unwrap_err();
        assert!(matches!(err, WorkerError::SourceUnusable(_)));
    }

    #[test]
    fn rejects_silent_source() {
        let mut i = info();
        i.has_audio = false;
        i.audio_duration = 0.0;
        assert!(validate_source(&i).is_err());

        let mut i = info();
        i.audio_duration = 0.0;
        assert!(validate_source(&i).is_err());
    }
}
