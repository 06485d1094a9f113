//! Timed transcript segments.

use serde::{Deserialize, Serialize};

/// One timed segment of speech.
///
/// Invariants: `0 <= start < end`, and within a transcript segments are
/// monotonic and non-overlapping (`segments[i].end <= segments[i+1].start`).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TranscriptSegment {
    /// Start time in seconds from the beginning of the source
    pub start: f64,
    /// End time in seconds
    pub end: f64,
    /// Transcribed text
    pub text: String,
}

impl TranscriptSegment {
    pub fn new(start: f64, end: f64, text: impl Into<String>) -> Self {
        Self {
            start,
            end,
            text: text.into(),
        }
    }

    pub fn duration(&self) -> f64 {
        self.end - self.start
    }
}

/// A full transcript of the audio track.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Transcript {
    pub segments: Vec<TranscriptSegment>,
    /// Language reported by the speech-to-text engine
    #[serde(skip_serializing_if = "Option::is_none")]
    pub language_detected: Option<String>,
}

impl Transcript {
    pub fn new(segments: Vec<TranscriptSegment>) -> Self {
        Self {
            segments,
            language_detected: None,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.segments.is_empty()
    }

    /// End time of the last segment, or 0.0 for an empty transcript.
    pub fn end(&self) -> f64 {
        self.segments.last().map(|s| s.end).unwrap_or(0.0)
    }

    /// Drop malformed segments and enforce monotonic, non-overlapping order.
    ///
    /// Segments with `start >= end` or negative times are discarded; an
    /// overlapping start is clamped forward to the previous end.
    pub fn normalized(mut self) -> Self {
        self.segments
            .retain(|s| s.start >= 0.0 && s.end > s.start && s.start.is_finite() && s.end.is_finite());
        self.segments
            .sort_by(|a, b| a.start.partial_cmp(&b.start).unwrap_or(std::cmp::Ordering::Equal));

        let mut prev_end = 0.0f64;
        self.segments.retain_mut(|s| {
            if s.start < prev_end {
                s.start = prev_end;
            }
            if s.end <= s.start {
                return false;
            }
            prev_end = s.end;
            true
        });
        self
    }

    /// Check the §3 ordering invariant.
    pub fn is_monotonic(&self) -> bool {
        self.segments.windows(2).all(|w| w[0].end <= w[1].start)
            && self.segments.iter().all(|s| s.start >= 0.0 && s.start < s.end)
    }

    /// Segments intersecting the half-open range `[start, end)`.
    pub fn slice(&self, start: f64, end: f64) -> Vec<TranscriptSegment> {
        self.segments
            .iter()
            .filter(|s| s.end > start && s.start < end)
            .cloned()
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normalized_drops_and_clamps() {
        let t = Transcript::new(vec![
            TranscriptSegment::new(5.0, 4.0, "inverted"),
            TranscriptSegment::new(0.0, 2.0, "a"),
            TranscriptSegment::new(1.5, 3.0, "overlaps"),
            TranscriptSegment::new(-1.0, 1.0, "negative"),
        ])
        .normalized();

        assert!(t.is_monotonic());
        assert_eq!(t.segments.len(), 2);
        assert_eq!(t.segments[0].text, "a");
        assert_eq!(t.segments[1].start, 2.0);
    }

    #[test]
    fn empty_transcript_is_valid() {
        let t = Transcript::default();
        assert!(t.is_empty());
        assert!(t.is_monotonic());
        assert_eq!(t.end(), 0.0);
    }

    #[test]
    fn slice_returns_intersecting_segments() {
        let t = Transcript::new(vec![
            TranscriptSegment::new(0.0, 5.0, "a"),
            TranscriptSegment::new(5.0, 10.0, "b"),
            TranscriptSegment::new(10.0, 15.0, "c"),
        ]);

        let hit = t.slice(4.0, 11.0);
        assert_eq!(hit.len(), 3);

        let hit = t.slice(5.0, 10.0);
        assert_eq!(hit.len(), 1);
        assert_eq!(hit[0].text, "b");
    }
}
