//! Per-job scratch directory lifecycle.
//!
//! Layout: `{tmp_dir}/{job_id}/source.{ext}`, `.../transcript.json`,
//! `.../clip_NN.mp4`. The directory is removed on every worker exit path;
//! the Drop impl is a best-effort backstop for aborted tasks.

use std::path::{Path, PathBuf};
use tracing::{debug, warn};

use shorts_models::JobId;

/// A job's private scratch directory.
#[derive(Debug)]
pub struct ScratchDir {
    path: PathBuf,
}

impl ScratchDir {
    /// Create `{tmp_dir}/{job_id}`.
    pub async fn create(tmp_dir: &Path, job_id: &JobId) -> std::io::Result<Self> {
        let path = tmp_dir.join(job_id.as_str());
        tokio::fs::create_dir_all(&path).await?;
        debug!(path = %path.display(), "Created scratch directory");
        Ok(Self { path })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// `source.{ext}`
    pub fn source_path(&self, ext: &str) -> PathBuf {
        self.path.join(format!("source.{ext}"))
    }

    /// `transcript.json`
    pub fn transcript_path(&self) -> PathBuf {
        self.path.join("transcript.json")
    }

    /// `clip_NN.mp4` with a 1-based, zero-padded index.
    pub fn clip_path(&self, index: usize) -> PathBuf {
        self.path.join(format!("clip_{index:02}.mp4"))
    }

    /// Remove the directory and everything in it.
    pub async fn cleanup(&self) {
        if let Err(e) = tokio::fs::remove_dir_all(&self.path).await {
            if e.kind() != std::io::ErrorKind::NotFound {
                warn!(path = %self.path.display(), error = %e, "Scratch cleanup failed");
            }
        }
    }
}

impl Drop for ScratchDir {
    fn drop(&mut self) {
        // Backstop for cancelled tasks; the async cleanup is the normal path.
        let _ = std::fs::remove_dir_all(&self.path);
    }
}
