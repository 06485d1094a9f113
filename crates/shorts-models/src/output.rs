//! Finished clip outputs.

use serde::{Deserialize, Serialize};

use crate::selection::SelectionMethod;

/// The source interval a clip was cut from.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClipSpan {
    pub start: f64,
    pub end: f64,
}

/// One published clip.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClipOutput {
    /// Display name of the uploaded file
    pub file_name: String,
    /// Shareable locator returned by remote storage
    pub remote_locator: String,
    /// Server-assigned file id in remote storage
    pub remote_file_id: String,
    /// Clip duration in seconds
    pub duration_sec: f64,
    /// Source interval
    pub segment: ClipSpan,
    /// Strategy that selected the interval
    pub method: SelectionMethod,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn serializes_with_segment_object() {
        let out = ClipOutput {
            file_name: "clip_01.mp4".to_string(),
            remote_locator: "https://drive.google.com/file/d/x/view".to_string(),
            remote_file_id: "x".to_string(),
            duration_sec: 30.0,
            segment: ClipSpan { start: 10.0, end: 40.0 },
            method: SelectionMethod::Rule,
        };
        let json = serde_json::to_value(&out).unwrap();
        assert_eq!(json["segment"]["start"], 10.0);
        assert_eq!(json["method"], "rule");
    }
}
