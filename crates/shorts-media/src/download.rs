//! Public-URL video download using yt-dlp.

use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::Duration;
use tokio::process::Command;
use tracing::{debug, info};

use crate::error::{MediaError, MediaResult};

/// Download a video from a public URL into `dest_dir`.
///
/// Returns the path of the downloaded file. The container is whatever
/// yt-dlp produced after its mp4-preferring format selection.
pub async fn download_url_video(
    url: &str,
    dest_dir: impl AsRef<Path>,
    timeout: Duration,
) -> MediaResult<PathBuf> {
    which::which("yt-dlp").map_err(|_| MediaError::YtDlpNotFound)?;

    let dest_dir = dest_dir.as_ref();
    tokio::fs::create_dir_all(dest_dir).await?;

    let output_template = dest_dir.join("source.%(ext)s");
    let template_str = output_template.to_string_lossy().to_string();

    let args = [
        "--no-playlist",
        "--no-progress",
        "-f",
        "bv*[ext=mp4]+ba[ext=m4a]/b[ext=mp4]/b",
        "--merge-output-format",
        "mp4",
        "-o",
        &template_str,
        url,
    ];

    info!(stage = "fetching", url = %url, "Downloading source video with yt-dlp");
    debug!("yt-dlp args: {:?}", args);

    let child = Command::new("yt-dlp")
        .args(args)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true)
        .spawn()?;

    let output = tokio::time::timeout(timeout, child.wait_with_output())
        .await
        .map_err(|_| MediaError::Timeout(timeout.as_secs()))??;

    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        return Err(MediaError::download_failed(format!(
            "yt-dlp exited with {:?}: {}",
            output.status.code(),
            stderr.lines().last().unwrap_or("")
        )));
    }

    find_downloaded_file(dest_dir).await
}

/// Locate the `source.*` file yt-dlp wrote.
async fn find_downloaded_file(dest_dir: &Path) -> MediaResult<PathBuf> {
    let mut entries = tokio::fs::read_dir(dest_dir).await?;
    let mut candidates = Vec::new();

    while let Some(entry) = entries.next_entry().await? {
        let path = entry.path();
        let stem = path.file_stem().and_then(|s| s.to_str());
        let ext = path.extension().and_then(|s| s.to_str()).unwrap_or("");
        // yt-dlp leaves .part files behind on interrupted downloads
        if stem == Some("source") && ext != "part" {
            candidates.push(path);
        }
    }

    candidates
        .into_iter()
        .next()
        .ok_or_else(|| MediaError::download_failed("yt-dlp reported success but wrote no file"))
}
