//! Job submission requests and options.
//!
//! Options form a closed, validated schema: unknown keys are rejected at the
//! boundary and every recognized key has an explicit default.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Number of clips a job must produce to finish `done`.
pub const MIN_GUARANTEED: usize = 3;

/// Where the source video comes from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SourceType {
    /// Remote-storage file id
    Drive,
    /// Public URL handled by the downloader tool
    Url,
}

impl SourceType {
    pub fn as_str(&self) -> &'static str {
        match self {
            SourceType::Drive => "drive",
            SourceType::Url => "url",
        }
    }
}

/// Whisper model size.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum WhisperModel {
    Tiny,
    Base,
    #[default]
    Small,
    Medium,
}

impl WhisperModel {
    pub fn as_str(&self) -> &'static str {
        match self {
            WhisperModel::Tiny => "tiny",
            WhisperModel::Base => "base",
            WhisperModel::Small => "small",
            WhisperModel::Medium => "medium",
        }
    }
}

/// Burned-in subtitle styling.
///
/// Family and outline colour are system-wide; requests may only override
/// `font_size` and `fill_color`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields, default)]
pub struct SubtitleStyle {
    pub font_family: String,
    pub font_size: u32,
    /// ASS BGR colour, e.g. "&H000000&"
    pub outline_color: String,
    pub fill_color: String,
}

impl Default for SubtitleStyle {
    fn default() -> Self {
        Self {
            font_family: "Noto Sans CJK JP".to_string(),
            font_size: 48,
            outline_color: "&H000000&".to_string(),
            fill_color: "&HFFFFFF&".to_string(),
        }
    }
}

/// Per-request subtitle override, limited to size and fill colour.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SubtitleOverride {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub font_size: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub fill_color: Option<String>,
}

/// Per-field options override carried by a retry request.
///
/// Only fields actually present change the new job's options; everything
/// else is inherited from the original submission.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct OptionsOverride {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub target_count: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub min_sec: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_sec: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub language: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub whisper_model: Option<WhisperModel>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub force_rule_based: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub subtitle_style: Option<SubtitleOverride>,
}

/// Recognized job options with defaults.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields, default)]
pub struct Options {
    /// Target number of clips, clamped to [3, 8]
    pub target_count: u32,
    /// Minimum clip duration in seconds
    pub min_sec: f64,
    /// Maximum clip duration in seconds
    pub max_sec: f64,
    /// BCP-47-ish language tag
    pub language: String,
    /// Whisper model size
    pub whisper_model: WhisperModel,
    /// Skip the LLM selection strategy
    pub force_rule_based: bool,
    /// Subtitle override (size and fill colour only)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub subtitle_style: Option<SubtitleOverride>,
}

impl Default for Options {
    fn default() -> Self {
        Self {
            target_count: 5,
            min_sec: 25.0,
            max_sec: 45.0,
            language: "ja".to_string(),
            whisper_model: WhisperModel::default(),
            force_rule_based: false,
            subtitle_style: None,
        }
    }
}

impl Options {
    /// Validate cross-field constraints.
    pub fn validate(&self) -> Result<(), RequestError> {
        if self.min_sec <= 0.0 || !self.min_sec.is_finite() {
            return Err(RequestError::new("min_sec must be a positive number"));
        }
        if !self.max_sec.is_finite() || self.max_sec < self.min_sec {
            return Err(RequestError::new("max_sec must be >= min_sec"));
        }
        if self.language.is_empty() || self.language.len() > 16 {
            return Err(RequestError::new("language must be a short BCP-47-ish tag"));
        }
        Ok(())
    }

    /// Target count clamped to the allowed [3, 8] window.
    pub fn clamped_target_count(&self) -> usize {
        self.target_count.clamp(3, 8) as usize
    }

    /// Effective subtitle style: system defaults plus the request override.
    pub fn effective_subtitle_style(&self) -> SubtitleStyle {
        let mut style = SubtitleStyle::default();
        if let Some(over) = &self.subtitle_style {
            if let Some(size) = over.font_size {
                style.font_size = size;
            }
            if let Some(fill) = &over.fill_color {
                style.fill_color = fill.clone();
            }
        }
        style
    }

    /// Merge a partial override on top of these options (used by retry).
    ///
    /// Fields absent from the override keep the original submission's value.
    pub fn merged(&self, over: Option<OptionsOverride>) -> Options {
        let mut merged = self.clone();
        let Some(over) = over else {
            return merged;
        };

        if let Some(target_count) = over.target_count {
            merged.target_count = target_count;
        }
        if let Some(min_sec) = over.min_sec {
            merged.min_sec = min_sec;
        }
        if let Some(max_sec) = over.max_sec {
            merged.max_sec = max_sec;
        }
        if let Some(language) = over.language {
            merged.language = language;
        }
        if let Some(whisper_model) = over.whisper_model {
            merged.whisper_model = whisper_model;
        }
        if let Some(force_rule_based) = over.force_rule_based {
            merged.force_rule_based = force_rule_based;
        }
        if let Some(subtitle_style) = over.subtitle_style {
            merged.subtitle_style = Some(subtitle_style);
        }
        merged
    }
}

/// A job submission.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct JobRequest {
    pub source_type: SourceType,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub drive_file_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title_hint: Option<String>,
    /// Resubmissions with the same key return the existing job
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub idempotency_key: Option<String>,
    #[serde(default)]
    pub options: Options,
}

impl JobRequest {
    /// Validate the request at the boundary.
    ///
    /// Exactly one of `drive_file_id` / `source_url` must be populated, and
    /// it must match `source_type`.
    pub fn validate(&self) -> Result<(), RequestError> {
        match (&self.drive_file_id, &self.source_url) {
            (Some(_), Some(_)) => {
                return Err(RequestError::new(
                    "exactly one of drive_file_id and source_url must be set",
                ))
            }
            (None, None) => {
                return Err(RequestError::new(
                    "one of drive_file_id or source_url is required",
                ))
            }
            (Some(id), None) => {
                if self.source_type != SourceType::Drive {
                    return Err(RequestError::new("drive_file_id requires source_type=drive"));
                }
                if id.trim().is_empty() {
                    return Err(RequestError::new("drive_file_id must not be empty"));
                }
            }
            (None, Some(url)) => {
                if self.source_type != SourceType::Url {
                    return Err(RequestError::new("source_url requires source_type=url"));
                }
                if !url.starts_with("http://") && !url.starts_with("https://") {
                    return Err(RequestError::new("source_url must be an http(s) URL"));
                }
            }
        }

        self.options.validate()
    }

    /// The source reference as an opaque display string.
    pub fn source_ref(&self) -> &str {
        self.drive_file_id
            .as_deref()
            .or(self.source_url.as_deref())
            .unwrap_or("")
    }
}

/// A request validation failure. Surfaced as HTTP 400, never logged at ERROR.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RequestError(pub String);

impl RequestError {
    pub fn new(msg: impl Into<String>) -> Self {
        Self(msg.into())
    }
}

impl fmt::Display for RequestError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl std::error::Error for RequestError {}

#[cfg(test)]
mod tests {
    use super::*;

    fn drive_request() -> JobRequest {
        JobRequest {
            source_type: SourceType::Drive,
            drive_file_id: Some("abc".to_string()),
            source_url: None,
            title_hint: None,
            idempotency_key: None,
            options: Options::default(),
        }
    }

    #[test]
    fn defaults_match_contract() {
        let opts = Options::default();
        assert_eq!(opts.target_count, 5);
        assert_eq!(opts.min_sec, 25.0);
        assert_eq!(opts.max_sec, 45.0);
        assert_eq!(opts.language, "ja");
        assert_eq!(opts.whisper_model, WhisperModel::Small);
        assert!(!opts.force_rule_based);
    }

    #[test]
    fn target_count_is_clamped_not_rejected() {
        let mut opts = Options::default();
        opts.target_count = 1;
        assert_eq!(opts.clamped_target_count(), 3);
        opts.target_count = 20;
        assert_eq!(opts.clamped_target_count(), 8);
        opts.target_count = 6;
        assert_eq!(opts.clamped_target_count(), 6);
    }

    #[test]
    fn max_sec_below_min_sec_rejected() {
        let mut opts = Options::default();
        opts.min_sec = 40.0;
        opts.max_sec = 30.0;
        assert!(opts.validate().is_err());
    }

    #[test]
    fn both_sources_rejected() {
        let mut req = drive_request();
        req.source_url = Some("https://example.com/v".to_string());
        assert!(req.validate().is_err());
    }

    #[test]
    fn neither_source_rejected() {
        let mut req = drive_request();
        req.drive_file_id = None;
        assert!(req.validate().is_err());
    }

    #[test]
    fn mismatched_source_type_rejected() {
        let mut req = drive_request();
        req.source_type = SourceType::Url;
        assert!(req.validate().is_err());
    }

    #[test]
    fn unknown_source_type_rejected_by_serde() {
        let json = r#"{"source_type": "ftp", "drive_file_id": "x"}"#;
        assert!(serde_json::from_str::<JobRequest>(json).is_err());
    }

    #[test]
    fn unknown_option_keys_rejected() {
        let json = r#"{"source_type": "drive", "drive_file_id": "x", "options": {"bogus": 1}}"#;
        assert!(serde_json::from_str::<JobRequest>(json).is_err());
    }

    #[test]
    fn subtitle_override_limited_to_size_and_fill() {
        let mut opts = Options::default();
        opts.subtitle_style = Some(SubtitleOverride {
            font_size: Some(64),
            fill_color: Some("&H00FFFF&".to_string()),
        });
        let style = opts.effective_subtitle_style();
        assert_eq!(style.font_size, 64);
        assert_eq!(style.fill_color, "&H00FFFF&");
        // Family and outline stay at the system defaults.
        assert_eq!(style.font_family, SubtitleStyle::default().font_family);
        assert_eq!(style.outline_color, SubtitleStyle::default().outline_color);
    }

    #[test]
    fn merged_keeps_unmentioned_fields() {
        let mut original = Options::default();
        original.language = "en".to_string();
        original.target_count = 8;
        original.min_sec = 20.0;

        let over = OptionsOverride {
            force_rule_based: Some(true),
            ..Default::default()
        };

        let merged = original.merged(Some(over));
        assert!(merged.force_rule_based);
        assert_eq!(merged.language, "en");
        assert_eq!(merged.target_count, 8);
        assert_eq!(merged.min_sec, 20.0);
        assert_eq!(merged.whisper_model, original.whisper_model);
    }

    #[test]
    fn merged_without_override_is_identity() {
        let mut original = Options::default();
        original.language = "en".to_string();
        assert_eq!(original.merged(None), original);
    }

    #[test]
    fn merged_applies_every_present_field() {
        let original = Options::default();
        let over = OptionsOverride {
            target_count: Some(4),
            min_sec: Some(30.0),
            max_sec: Some(60.0),
            language: Some("en".to_string()),
            whisper_model: Some(WhisperModel::Medium),
            force_rule_based: Some(true),
            subtitle_style: Some(SubtitleOverride {
                font_size: Some(64),
                fill_color: None,
            }),
        };

        let merged = original.merged(Some(over));
        assert_eq!(merged.target_count, 4);
        assert_eq!(merged.min_sec, 30.0);
        assert_eq!(merged.max_sec, 60.0);
        assert_eq!(merged.language, "en");
        assert_eq!(merged.whisper_model, WhisperModel::Medium);
        assert!(merged.force_rule_based);
        assert_eq!(merged.effective_subtitle_style().font_size, 64);
    }

    #[test]
    fn sparse_override_body_deserializes_sparse() {
        let over: OptionsOverride =
            serde_json::from_str(r#"{"force_rule_based": true}"#).unwrap();
        assert_eq!(over.force_rule_based, Some(true));
        assert!(over.target_count.is_none());
        assert!(over.language.is_none());
    }

    #[test]
    fn url_request_validates() {
        let req = JobRequest {
            source_type: SourceType::Url,
            drive_file_id: None,
            source_url: Some("https://example.com/talk.mp4".to_string()),
            title_hint: Some("talk".to_string()),
            idempotency_key: None,
            options: Options::default(),
        };
        assert!(req.validate().is_ok());
        assert_eq!(req.source_ref(), "https://example.com/talk.mp4");
    }
}
