//! Clip rendering: 9:16 letterboxed MP4 with burned-in captions.

use async_trait::async_trait;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

use shorts_models::{SubtitleStyle, TranscriptSegment};

use crate::command::{FfmpegCommand, FfmpegRunner};
use crate::error::MediaResult;
use crate::subtitle::build_srt;

/// Output canvas.
const TARGET_WIDTH: u32 = 1080;
const TARGET_HEIGHT: u32 = 1920;

/// Everything needed to render one clip.
#[derive(Debug, Clone)]
pub struct RenderSpec {
    /// Source video path
    pub source: PathBuf,
    /// Output MP4 path
    pub output: PathBuf,
    /// Range start in source seconds
    pub start: f64,
    /// Range end in source seconds
    pub end: f64,
    /// Transcript segments to burn in; `None` renders without captions
    pub subtitles: Option<Vec<TranscriptSegment>>,
    /// Subtitle styling
    pub style: SubtitleStyle,
    /// Source frame width (from probe), used for letterbox geometry
    pub source_width: u32,
    /// Source frame height
    pub source_height: u32,
}

impl RenderSpec {
    pub fn duration(&self) -> f64 {
        self.end - self.start
    }

    /// Per-clip wall-clock cap: `max(90s, 3 × range duration)`.
    pub fn timeout_secs(&self) -> u64 {
        (3.0 * self.duration()).ceil().max(90.0) as u64
    }
}

/// Seam for clip production.
#[async_trait]
pub trait ClipRenderer: Send + Sync {
    /// Render one clip, returning the output path.
    async fn render(&self, spec: &RenderSpec) -> MediaResult<PathBuf>;
}

/// FFmpeg-based renderer.
///
/// Output contract: MP4 `+faststart`, H.264 High 1080×1920 @ 30fps yuv420p,
/// source scaled to fit and centered with black letterbox bars, AAC-LC
/// 128 kbps 48 kHz stereo, subtitles burned into the lower letterbox band.
#[derive(Debug, Default, Clone)]
pub struct FfmpegRenderer;

impl FfmpegRenderer {
    pub fn new() -> Self {
        Self
    }

    /// Letterbox filter: scale to fit 1080×1920 preserving aspect, center,
    /// pad with black bars. No cropping of source content.
    fn letterbox_filter() -> String {
        format!(
            "scale=iw*min({w}/iw\\,{h}/ih):ih*min({w}/iw\\,{h}/ih),\
             pad={w}:{h}:({w}-iw)/2:({h}-ih)/2,setsar=1",
            w = TARGET_WIDTH,
            h = TARGET_HEIGHT
        )
    }

    /// Height of each black bar for a source scaled to fit by width.
    fn letterbox_bar_height(source_width: u32, source_height: u32) -> u32 {
        if source_width == 0 || source_height == 0 {
            return 0;
        }
        let factor = (TARGET_WIDTH as f64 / source_width as f64)
            .min(TARGET_HEIGHT as f64 / source_height as f64);
        let scaled_h = (source_height as f64 * factor).round() as u32;
        TARGET_HEIGHT.saturating_sub(scaled_h) / 2
    }

    /// Vertical margin that centers captions in the lower letterbox band.
    fn subtitle_margin_v(spec: &RenderSpec) -> u32 {
        let bar = Self::letterbox_bar_height(spec.source_width, spec.source_height);
        let centered = bar.saturating_sub(spec.style.font_size) / 2;
        centered.max(24)
    }

    fn subtitle_filter(srt_path: &Path, spec: &RenderSpec) -> String {
        let escaped = srt_path
            .to_string_lossy()
            .replace('\\', "/")
            .replace(':', "\\:");
        format!(
            "subtitles='{}':force_style='FontName={},FontSize={},\
             PrimaryColour={},OutlineColour={},Outline=3,Alignment=2,MarginV={}'",
            escaped,
            spec.style.font_family,
            spec.style.font_size,
            spec.style.fill_color,
            spec.style.outline_color,
            Self::subtitle_margin_v(spec),
        )
    }

    /// Build the full ffmpeg invocation for a spec.
    fn build_command(spec: &RenderSpec, srt_path: Option<&Path>) -> FfmpegCommand {
        let mut vf = Self::letterbox_filter();
        if let Some(srt) = srt_path {
            vf.push(',');
            vf.push_str(&Self::subtitle_filter(srt, spec));
        }

        FfmpegCommand::new(&spec.source, &spec.output)
            .seek(spec.start)
            .duration(spec.duration())
            .video_filter(vf)
            .audio_filter("loudnorm=I=-16:TP=-1.5:LRA=11")
            .video_codec("libx264")
            .output_args(["-profile:v", "high"])
            .output_args(["-preset", "medium"])
            .output_args(["-crf", "18"])
            .output_args(["-pix_fmt", "yuv420p"])
            .output_args(["-r", "30"])
            .audio_codec("aac")
            .audio_bitrate("128k")
            .output_args(["-ar", "48000"])
            .output_args(["-ac", "2"])
            .output_args(["-movflags", "+faststart"])
    }
}

#[async_trait]
impl ClipRenderer for FfmpegRenderer {
    async fn render(&self, spec: &RenderSpec) -> MediaResult<PathBuf> {
        let srt_path = match &spec.subtitles {
            Some(segments) => {
                let srt = build_srt(segments, spec.start, spec.end);
                if srt.is_empty() {
                    None
                } else {
                    let path = spec.output.with_extension("srt");
                    tokio::fs::write(&path, srt).await?;
                    Some(path)
                }
            }
            None => None,
        };

        let cmd = Self::build_command(spec, srt_path.as_deref());
        let timeout = spec.timeout_secs();

        info!(
            stage = "rendering",
            output = %spec.output.display(),
            start = spec.start,
            end = spec.end,
            subtitles = srt_path.is_some(),
            timeout_secs = timeout,
            "Rendering clip"
        );
        debug!("ffmpeg {}", cmd.build_args().join(" "));

        FfmpegRunner::new().with_timeout(timeout).run(&cmd).await?;

        if let Some(srt) = srt_path {
            tokio::fs::remove_file(srt).await.ok();
        }

        Ok(spec.output.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn spec(subtitles: Option<Vec<TranscriptSegment>>) -> RenderSpec {
        RenderSpec {
            source: PathBuf::from("/tmp/job/source.mp4"),
            output: PathBuf::from("/tmp/job/clip_01.mp4"),
            start: 100.0,
            end: 135.0,
            subtitles,
            style: SubtitleStyle::default(),
            source_width: 1920,
            source_height: 1080,
        }
    }

    #[test]
    fn timeout_formula() {
        let mut s = spec(None);
        // 35s clip → 105s cap
        assert_eq!(s.timeout_secs(), 105);
        // Short clip floors at 90s
        s.end = s.start + 10.0;
        assert_eq!(s.timeout_secs(), 90);
    }

    #[test]
    fn letterbox_geometry_for_16_9_source() {
        // 1920x1080 scaled to width 1080 → height 608 (rounded), bars ≈ 656
        let bar = FfmpegRenderer::letterbox_bar_height(1920, 1080);
        assert!((650..=660).contains(&bar), "bar = {}", bar);
    }

    #[test]
    fn command_carries_output_contract() {
        let args = FfmpegRenderer::build_command(&spec(None), None)
            .build_args()
            .join(" ");
        assert!(args.contains("-c:v libx264"));
        assert!(args.contains("-profile:v high"));
        assert!(args.contains("-pix_fmt yuv420p"));
        assert!(args.contains("-r 30"));
        assert!(args.contains("-c:a aac"));
        assert!(args.contains("-b:a 128k"));
        assert!(args.contains("-ar 48000"));
        assert!(args.contains("-ac 2"));
        assert!(args.contains("-movflags +faststart"));
        assert!(args.contains("pad=1080:1920"));
        assert!(args.contains("loudnorm"));
        assert!(args.contains("-ss 100.000"));
        assert!(args.contains("-t 35.000"));
        assert!(!args.contains("subtitles="));
    }

    #[test]
    fn subtitle_filter_centers_in_lower_bar() {
        let s = spec(Some(vec![TranscriptSegment::new(100.0, 110.0, "hi")]));
        let filter = FfmpegRenderer::subtitle_filter(Path::new("/tmp/job/clip_01.srt"), &s);
        assert!(filter.contains("FontName=Noto Sans CJK JP"));
        assert!(filter.contains("Alignment=2"));

        let margin = FfmpegRenderer::subtitle_margin_v(&s);
        let bar = FfmpegRenderer::letterbox_bar_height(1920, 1080);
        assert!(margin < bar);
        assert!(margin >= 24);
    }

    #[test]
    fn tall_source_gets_minimum_margin() {
        let mut s = spec(None);
        // 9:16 source fills the canvas, no letterbox band
        s.source_width = 1080;
        s.source_height = 1920;
        assert_eq!(FfmpegRenderer::letterbox_bar_height(1080, 1920), 0);
        assert_eq!(FfmpegRenderer::subtitle_margin_v(&s), 24);
    }
}
