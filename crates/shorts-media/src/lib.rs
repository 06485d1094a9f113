//! Media plumbing for the auto-shorts pipeline.
//!
//! This crate provides:
//! - FFmpeg command builder and runner with timeouts
//! - ffprobe wrapper for source inspection
//! - yt-dlp wrapper for public-URL downloads
//! - SRT subtitle generation from transcript segments
//! - The clip renderer (9:16 letterboxed MP4 with burned-in captions)
//! - The speech-to-text engine seam

pub mod command;
pub mod download;
pub mod error;
pub mod probe;
pub mod render;
pub mod subtitle;
pub mod transcribe;

pub use command::{check_ffmpeg, check_ffprobe, check_ytdlp, FfmpegCommand, FfmpegRunner};
pub use download::download_url_video;
pub use error::{MediaError, MediaResult};
pub use probe::{probe_video, VideoInfo};
pub use render::{ClipRenderer, FfmpegRenderer, RenderSpec};
pub use transcribe::{SpeechToText, WhisperCli};
