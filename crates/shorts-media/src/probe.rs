//! FFprobe source inspection.

use serde::{Deserialize, Serialize};
use std::path::Path;
use std::process::Stdio;
use tokio::process::Command;

use crate::error::{MediaError, MediaResult};

/// Video file information.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VideoInfo {
    /// Duration in seconds
    pub duration: f64,
    /// Width in pixels
    pub width: u32,
    /// Height in pixels
    pub height: u32,
    /// Video codec
    pub codec: String,
    /// Container format name (e.g. "mov,mp4,m4a,3gp,3g2,mj2")
    pub format_name: String,
    /// File size in bytes
    pub size: u64,
    /// Whether an audio stream is present
    pub has_audio: bool,
    /// Duration of the audio stream in seconds (0.0 when absent)
    pub audio_duration: f64,
}

/// FFprobe JSON output format.
#[derive(Debug, Deserialize)]
struct FfprobeOutput {
    format: FfprobeFormat,
    streams: Vec<FfprobeStream>,
}

#[derive(Debug, Deserialize)]
struct FfprobeFormat {
    duration: Option<String>,
    size: Option<String>,
    format_name: Option<String>,
}

#[derive(Debug, Deserialize)]
struct FfprobeStream {
    codec_type: String,
    codec_name: Option<String>,
    width: Option<u32>,
    height: Option<u32>,
    duration: Option<String>,
}

/// Probe a video file for information.
pub async fn probe_video(path: impl AsRef<Path>) -> MediaResult<VideoInfo> {
    let path = path.as_ref();

    if !path.exists() {
        return Err(MediaError::FileNotFound(path.to_path_buf()));
    }

    which::which("ffprobe").map_err(|_| MediaError::FfprobeNotFound)?;

    let output = Command::new("ffprobe")
        .args([
            "-v",
            "quiet",
            "-print_format",
            "json",
            "-show_format",
            "-show_streams",
        ])
        .arg(path)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .output()
        .await?;

    if !output.status.success() {
        return Err(MediaError::ProbeFailed {
            message: "ffprobe failed".to_string(),
            stderr: Some(String::from_utf8_lossy(&output.stderr).to_string()),
        });
    }

    let probe: FfprobeOutput = serde_json::from_slice(&output.stdout)?;
    parse_probe(probe)
}

fn parse_probe(probe: FfprobeOutput) -> MediaResult<VideoInfo> {
    let video_stream = probe
        .streams
        .iter()
        .find(|s| s.codec_type == "video")
        .ok_or_else(|| MediaError::InvalidVideo("No video stream found".to_string()))?;

    let duration = probe
        .format
        .duration
        .as_ref()
        .and_then(|d| d.parse::<f64>().ok())
        .unwrap_or(0.0);

    let size = probe
        .format
        .size
        .as_ref()
        .and_then(|s| s.parse::<u64>().ok())
        .unwrap_or(0);

    let audio_stream = probe.streams.iter().find(|s| s.codec_type == "audio");
    let audio_duration = audio_stream
        .and_then(|s| s.duration.as_ref())
        .and_then(|d| d.parse::<f64>().ok())
        // Streams without a per-stream duration inherit the container's.
        .unwrap_or(if audio_stream.is_some() { duration } else { 0.0 });

    Ok(VideoInfo {
        duration,
        width: video_stream.width.unwrap_or(0),
        height: video_stream.height.unwrap_or(0),
        codec: video_stream.codec_name.clone().unwrap_or_default(),
        format_name: probe.format.format_name.clone().unwrap_or_default(),
        size,
        has_audio: audio_stream.is_some(),
        audio_duration,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn probe_json(json: &str) -> VideoInfo {
        let probe: FfprobeOutput = serde_json::from_str(json).unwrap();
        parse_probe(probe).unwrap()
    }

    #[test]
    fn parses_video_and_audio_streams() {
        let info = probe_json(
            r#"{
                "format": {"duration": "600.5", "size": "104857600", "format_name": "mov,mp4,m4a,3gp,3g2,mj2"},
                "streams": [
                    {"codec_type": "video", "codec_name": "h264", "width": 1920, "height": 1080},
                    {"codec_type": "audio", "codec_name": "aac", "duration": "600.2"}
                ]
            }"#,
        );
        assert_eq!(info.width, 1920);
        assert!((info.duration - 600.5).abs() < 0.01);
        assert!(info.has_audio);
        assert!((info.audio_duration - 600.2).abs() < 0.01);
    }

    #[test]
    fn missing_audio_stream_reports_zero_duration() {
        let info = probe_json(
            r#"{
                "format": {"duration": "60.0", "size": "1000"},
                "streams": [
                    {"codec_type": "video", "codec_name": "h264", "width": 1280, "height": 720}
                ]
            }"#,
        );
        assert!(!info.has_audio);
        assert_eq!(info.audio_duration, 0.0);
    }

    #[test]
    fn audio_without_stream_duration_inherits_container() {
        let info = probe_json(
            r#"{
                "format": {"duration": "120.0", "size": "1000"},
                "streams": [
                    {"codec_type": "video", "codec_name": "h264", "width": 1280, "height": 720},
                    {"codec_type": "audio", "codec_name": "opus"}
                ]
            }"#,
        );
        assert!(info.has_audio);
        assert!((info.audio_duration - 120.0).abs() < 0.01);
    }

    #[test]
    fn no_video_stream_is_invalid() {
        let probe: FfprobeOutput = serde_json::from_str(
            r#"{"format": {}, "streams": [{"codec_type": "audio"}]}"#,
        )
        .unwrap();
        assert!(parse_probe(probe).is_err());
    }
}
