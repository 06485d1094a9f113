//! SRT subtitle generation from transcript segments.
//!
//! Segments are clipped to the selection range, rebased so the clip starts
//! at 00:00:00, and wrapped to at most 20 half-width columns per line
//! (full-width characters count as two columns).

use shorts_models::TranscriptSegment;

/// Maximum half-width columns per subtitle line.
const MAX_LINE_COLUMNS: usize = 20;

/// Build SRT content for the transcript segments overlapping
/// `[range_start, range_end)`, with times rebased to the clip.
pub fn build_srt(segments: &[TranscriptSegment], range_start: f64, range_end: f64) -> String {
    let mut lines = Vec::new();
    let mut index = 1;

    for seg in segments {
        if seg.end <= range_start || seg.start >= range_end {
            continue;
        }

        let start = (seg.start.max(range_start) - range_start).max(0.0);
        let end = (seg.end.min(range_end) - range_start).max(0.0);
        if end <= start {
            continue;
        }

        let text = wrap_text(seg.text.trim());
        if text.is_empty() {
            continue;
        }

        lines.push(index.to_string());
        lines.push(format!(
            "{} --> {}",
            format_srt_timestamp(start),
            format_srt_timestamp(end)
        ));
        lines.push(text);
        lines.push(String::new());
        index += 1;
    }

    lines.join("\n")
}

/// Format seconds as an SRT timestamp: `HH:MM:SS,mmm`.
pub fn format_srt_timestamp(seconds: f64) -> String {
    let total_ms = (seconds * 1000.0).round() as u64;
    let hours = total_ms / 3_600_000;
    let minutes = (total_ms % 3_600_000) / 60_000;
    let secs = (total_ms % 60_000) / 1000;
    let millis = total_ms % 1000;
    format!("{:02}:{:02}:{:02},{:03}", hours, minutes, secs, millis)
}

/// Display width of a character in half-width columns.
///
/// CJK ideographs, kana and full-width forms take two columns; everything
/// else takes one. Close enough for subtitle line budgeting.
fn char_columns(c: char) -> usize {
    match c as u32 {
        // Hangul Jamo, CJK radicals through Hangul syllables (incl. kana, ideographs)
        0x1100..=0x115F | 0x2E80..=0xA4CF | 0xAC00..=0xD7A3
        // Full-width forms and CJK compatibility
        | 0xF900..=0xFAFF | 0xFF00..=0xFF60 | 0xFFE0..=0xFFE6 => 2,
        _ => 1,
    }
}

/// Wrap text to lines of at most [`MAX_LINE_COLUMNS`] half-width columns,
/// breaking after sentence punctuation when it lands within the budget.
pub fn wrap_text(text: &str) -> String {
    let mut lines: Vec<String> = Vec::new();
    let mut current = String::new();
    let mut current_cols = 0usize;

    for c in text.chars() {
        if c == '\n' {
            if !current.trim().is_empty() {
                lines.push(std::mem::take(&mut current));
            }
            current_cols = 0;
            continue;
        }

        let cols = char_columns(c);
        if current_cols + cols > MAX_LINE_COLUMNS && !current.is_empty() {
            lines.push(std::mem::take(&mut current));
            current_cols = 0;
            // Drop a leading space after a forced break
            if c == ' ' {
                continue;
            }
        }

        current.push(c);
        current_cols += cols;

        if is_sentence_break(c) && current_cols >= MAX_LINE_COLUMNS / 2 {
            lines.push(std::mem::take(&mut current));
            current_cols = 0;
        }
    }

    if !current.trim().is_empty() {
        lines.push(current);
    }

    lines.join("\n")
}

fn is_sentence_break(c: char) -> bool {
    matches!(c, '。' | '！' | '？' | '、' | '.' | '!' | '?' | ',')
}

#[cfg(test)]
mod tests {
    use super::*;
    use shorts_models::TranscriptSegment;

    #[test]
    fn timestamp_format() {
        assert_eq!(format_srt_timestamp(0.0), "00:00:00,000");
        assert_eq!(format_srt_timestamp(61.5), "00:01:01,500");
        assert_eq!(format_srt_timestamp(3723.042), "01:02:03,042");
    }

    #[test]
    fn ascii_lines_wrap_at_twenty_columns() {
        let wrapped = wrap_text("aaaaaaaaaaaaaaaaaaaaaaaaa");
        let lines: Vec<&str> = wrapped.lines().collect();
        assert_eq!(lines.len(), 2);
        assert_eq!(lines[0].len(), 20);
        assert_eq!(lines[1].len(), 5);
    }

    #[test]
    fn cjk_counts_double_width() {
        // 11 ideographs = 22 columns, must split
        let wrapped = wrap_text("ああああああああああああ");
        for line in wrapped.lines() {
            let cols: usize = line.chars().map(char_columns).sum();
            assert!(cols <= 20, "line '{}' is {} columns", line, cols);
        }
        assert!(wrapped.lines().count() >= 2);
    }

    #[test]
    fn breaks_after_sentence_punctuation() {
        let wrapped = wrap_text("こんにちは。今日はいい天気です。");
        let first = wrapped.lines().next().unwrap();
        assert!(first.ends_with('。'));
    }

    #[test]
    fn srt_clips_and_rebases() {
        let segments = vec![
            TranscriptSegment::new(8.0, 12.0, "before and into"),
            TranscriptSegment::new(12.0, 16.0, "inside"),
            TranscriptSegment::new(40.0, 44.0, "after"),
        ];

        let srt = build_srt(&segments, 10.0, 40.0);

        // First cue is clipped to the range start and rebased to 0
        assert!(srt.contains("00:00:00,000 --> 00:00:02,000"));
        assert!(srt.contains("00:00:02,000 --> 00:00:06,000"));
        // Segment starting at range_end is excluded
        assert!(!srt.contains("after"));
    }

    #[test]
    fn srt_empty_for_no_overlap() {
        let segments = vec![TranscriptSegment::new(0.0, 5.0, "early")];
        assert!(build_srt(&segments, 100.0, 130.0).is_empty());
    }
}
