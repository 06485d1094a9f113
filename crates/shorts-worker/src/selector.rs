//! Segment selection: LLM strategy, rule-based strategy, fixed fallback.
//!
//! Strategy order is strict: the LLM path runs first unless disabled, the
//! rule-based path covers LLM failure (and pads short LLM results), and the
//! fixed fallback produces three evenly spaced ranges when no transcript
//! can support either.
//!
//! With a fixed transcript and options the rule-based path is fully
//! deterministic: ties break on earlier start, then shorter range.

use serde::Deserialize;
use tracing::{debug, info, warn};

use shorts_models::{
    Options, SelectionMethod, SelectionRange, Transcript, TranscriptSegment, MIN_GUARANTEED,
};

use crate::llm::{extract_json_array, HighlightModel};

/// Snapping tolerance when aligning LLM range endpoints to transcript
/// segment boundaries, in seconds.
const SNAP_TOLERANCE: f64 = 2.0;

/// Score bonus for segments ending in sentence-terminal punctuation.
const PUNCT_BONUS: f64 = 0.3;

/// Score boost for segments past the first 10% of the source.
const COLD_OPEN_BOOST: f64 = 0.15;

/// Choose clip ranges from the transcript.
///
/// Returns up to `target_count` chronologically ordered, pairwise
/// non-overlapping ranges. The caller treats a result shorter than
/// [`MIN_GUARANTEED`] as `NoSegmentsProducible`.
pub async fn pick_ranges(
    transcript: &Transcript,
    source_duration: f64,
    options: &Options,
    model: Option<&dyn HighlightModel>,
) -> Vec<SelectionRange> {
    let target = options.clamped_target_count();

    let mut ranges = match model {
        Some(model) if !options.force_rule_based && !transcript.is_empty() => {
            match llm_ranges(transcript, options, model).await {
                Some(ranges) => {
                    info!(stage = "selecting", count = ranges.len(), "LLM selection succeeded");
                    ranges
                }
                None => Vec::new(),
            }
        }
        _ => Vec::new(),
    };

    if ranges.is_empty() {
        ranges = rule_based(transcript, source_duration, options);
        info!(stage = "selecting", count = ranges.len(), "Rule-based selection produced ranges");
    } else if ranges.len() < target {
        // Short LLM result: pad with non-overlapping rule-based ranges.
        let padding = rule_based(transcript, source_duration, options);
        for candidate in padding {
            if ranges.len() >= target {
                break;
            }
            if ranges.iter().all(|r| !r.overlaps(&candidate)) {
                ranges.push(candidate);
            }
        }
        debug!(stage = "selecting", count = ranges.len(), "Padded LLM selection with rule-based ranges");
    }

    if ranges.len() < MIN_GUARANTEED {
        warn!(
            stage = "selecting",
            count = ranges.len(),
            "Selection below guaranteed minimum, using fixed fallback"
        );
        ranges = fixed_fallback(source_duration, options);
    }

    ranges.sort_by(|a, b| a.start.total_cmp(&b.start));
    ranges.truncate(target);
    ranges
}

// ============================================================================
// Strategy A: LLM
// ============================================================================

/// Raw range object expected from the model.
#[derive(Debug, Deserialize)]
struct LlmRange {
    start: f64,
    end: f64,
    #[serde(default)]
    #[allow(dead_code)]
    reason: Option<String>,
}

/// Run the LLM strategy. `None` means the strategy failed and the caller
/// must fall through to the rule-based path.
async fn llm_ranges(
    transcript: &Transcript,
    options: &Options,
    model: &dyn HighlightModel,
) -> Option<Vec<SelectionRange>> {
    let prompt = build_prompt(transcript, options);

    let raw = match model.complete(&prompt).await {
        Ok(raw) => raw,
        Err(e) => {
            warn!(stage = "selecting", error = %e, "LLM request failed, falling back to rule-based");
            return None;
        }
    };

    let value = match extract_json_array(&raw) {
        Some(value) => value,
        None => {
            warn!(stage = "selecting", "LLM response is not valid JSON, falling back to rule-based");
            return None;
        }
    };

    let candidates: Vec<LlmRange> = match serde_json::from_value(value) {
        Ok(candidates) => candidates,
        Err(e) => {
            warn!(stage = "selecting", error = %e, "LLM JSON has unexpected shape, falling back to rule-based");
            return None;
        }
    };

    let validated = post_validate(candidates, transcript, options);
    if validated.len() < MIN_GUARANTEED {
        warn!(
            stage = "selecting",
            count = validated.len(),
            "LLM produced too few valid ranges, falling back to rule-based"
        );
        return None;
    }
    Some(validated)
}

/// Build the fixed selection prompt.
fn build_prompt(transcript: &Transcript, options: &Options) -> String {
    let mut listing = String::new();
    for (i, seg) in transcript.segments.iter().enumerate() {
        listing.push_str(&format!(
            "[{}] [{:.1}s - {:.1}s] {}\n",
            i, seg.start, seg.end, seg.text
        ));
        // Keep the prompt inside a sane token budget.
        if listing.len() > 8000 {
            break;
        }
    }

    format!(
        "You are a short-form video editor. From the transcript below \
         (language: {lang}), choose exactly {target} ranges with the highest \
         retention potential, each between {min:.0} and {max:.0} seconds long.\n\
         Rules:\n\
         - Each range must be a concatenation of contiguous transcript segments.\n\
         - Ranges must not overlap.\n\
         - Prefer ranges that open with a hook and end on a complete sentence.\n\
         Respond with only a JSON array of objects shaped \
         {{\"start\": <seconds>, \"end\": <seconds>, \"reason\": <short string>}} \
         totaling exactly {target} entries.\n\n\
         Transcript:\n{listing}",
        lang = options.language,
        target = options.clamped_target_count(),
        min = options.min_sec,
        max = options.max_sec,
        listing = listing,
    )
}

/// Post-validate LLM output: drop out-of-range durations, snap endpoints to
/// transcript boundaries, resolve overlaps in favor of the earliest start,
/// truncate to the target count.
fn post_validate(
    candidates: Vec<LlmRange>,
    transcript: &Transcript,
    options: &Options,
) -> Vec<SelectionRange> {
    let boundaries: Vec<f64> = transcript
        .segments
        .iter()
        .flat_map(|s| [s.start, s.end])
        .collect();

    let mut ranges: Vec<SelectionRange> = candidates
        .into_iter()
        .filter(|c| {
            c.start.is_finite()
                && c.end.is_finite()
                && c.end > c.start
                && (options.min_sec..=options.max_sec).contains(&(c.end - c.start))
        })
        .map(|c| {
            let start = snap_to_boundary(c.start, &boundaries);
            let end = snap_to_boundary(c.end, &boundaries);
            // Snapping must not push the duration out of bounds.
            if end > start && (options.min_sec..=options.max_sec).contains(&(end - start)) {
                SelectionRange::new(start, end, SelectionMethod::Llm)
            } else {
                SelectionRange::new(c.start, c.end, SelectionMethod::Llm)
            }
        })
        .collect();

    // Earliest-starting range wins each overlap.
    ranges.sort_by(|a, b| a.start.total_cmp(&b.start));
    let mut kept: Vec<SelectionRange> = Vec::new();
    for range in ranges {
        if kept.iter().all(|k| !k.overlaps(&range)) {
            kept.push(range);
        }
    }

    kept.truncate(options.clamped_target_count());
    kept
}

/// Snap a time to the nearest transcript boundary within tolerance.
fn snap_to_boundary(time: f64, boundaries: &[f64]) -> f64 {
    boundaries
        .iter()
        .copied()
        .filter(|b| (b - time).abs() <= SNAP_TOLERANCE)
        .min_by(|a, b| (a - time).abs().total_cmp(&(b - time).abs()))
        .unwrap_or(time)
}

// ============================================================================
// Strategy B: rule-based
// ============================================================================

/// Composite interest score for one segment.
fn segment_score(seg: &TranscriptSegment, max_len: usize, source_duration: f64) -> f64 {
    let len_norm = if max_len > 0 {
        seg.text.chars().count() as f64 / max_len as f64
    } else {
        0.0
    };

    let punct = if seg
        .text
        .trim_end()
        .ends_with(['。', '！', '？', '.', '!', '?'])
    {
        PUNCT_BONUS
    } else {
        0.0
    };

    let past_cold_open = if source_duration > 0.0 && seg.start >= 0.1 * source_duration {
        COLD_OPEN_BOOST
    } else {
        0.0
    };

    len_norm + punct + past_cold_open
}

/// Greedy rule-based selection.
///
/// Seeds are visited by descending score (ties: earlier start, then shorter
/// segment). Each seed grows forward until the range reaches `min_sec`,
/// then keeps absorbing following segments while it stays within `max_sec`
/// and the next segment raises the range's mean score. Candidates that
/// overlap an accepted range are rejected.
pub fn rule_based(
    transcript: &Transcript,
    source_duration: f64,
    options: &Options,
) -> Vec<SelectionRange> {
    let segments = &transcript.segments;
    if segments.is_empty() {
        return Vec::new();
    }

    let target = options.clamped_target_count();
    let max_len = segments
        .iter()
        .map(|s| s.text.chars().count())
        .max()
        .unwrap_or(0);
    let scores: Vec<f64> = segments
        .iter()
        .map(|s| segment_score(s, max_len, source_duration))
        .collect();

    let mut seed_order: Vec<usize> = (0..segments.len()).collect();
    seed_order.sort_by(|&a, &b| {
        scores[b]
            .total_cmp(&scores[a])
            .then(segments[a].start.total_cmp(&segments[b].start))
            .then(segments[a].duration().total_cmp(&segments[b].duration()))
    });

    let mut assigned = vec![false; segments.len()];
    let mut selected: Vec<SelectionRange> = Vec::new();

    for &seed in &seed_order {
        if selected.len() >= target {
            break;
        }
        if assigned[seed] {
            continue;
        }

        let Some((first, last)) = grow_range(segments, &scores, seed, options) else {
            continue;
        };

        let range = SelectionRange::new(
            segments[first].start,
            segments[last].end,
            SelectionMethod::Rule,
        );

        if selected.iter().any(|r| r.overlaps(&range)) {
            continue;
        }

        for flag in assigned.iter_mut().take(last + 1).skip(first) {
            *flag = true;
        }
        selected.push(range);
    }

    selected.sort_by(|a, b| a.start.total_cmp(&b.start));
    selected
}

/// Grow a range of contiguous segments starting at `seed`.
///
/// Returns the inclusive segment index span, or `None` when no span from
/// this seed can satisfy the duration window.
fn grow_range(
    segments: &[TranscriptSegment],
    scores: &[f64],
    seed: usize,
    options: &Options,
) -> Option<(usize, usize)> {
    let start = segments[seed].start;
    let mut last = seed;
    let mut score_sum = scores[seed];

    // Reach the minimum duration.
    while segments[last].end - start < options.min_sec {
        let next = last + 1;
        if next >= segments.len() {
            return None;
        }
        if segments[next].end - start > options.max_sec {
            return None;
        }
        last = next;
        score_sum += scores[last];
    }

    // Optional growth while the next segment improves the mean score.
    while let Some(next) = segments.get(last + 1) {
        if next.end - start > options.max_sec {
            break;
        }
        let count = (last - seed + 1) as f64;
        if scores[last + 1] <= score_sum / count {
            break;
        }
        last += 1;
        score_sum += scores[last];
    }

    Some((seed, last))
}

// ============================================================================
// Strategy C: fixed fallback
// ============================================================================

/// Three evenly spaced ranges at 10%, 45% and 80% of the source, each the
/// midpoint duration, clipped to fit. Used only when no transcript-driven
/// strategy can reach the guaranteed minimum; these clips get no subtitles.
pub fn fixed_fallback(source_duration: f64, options: &Options) -> Vec<SelectionRange> {
    let duration = ((options.min_sec + options.max_sec) / 2.0).clamp(options.min_sec, options.max_sec);

    let mut ranges = Vec::with_capacity(3);
    let mut prev_end = 0.0f64;
    for fraction in [0.10, 0.45, 0.80] {
        let mut start = fraction * source_duration;
        if start + duration > source_duration {
            start = (source_duration - duration).max(0.0);
        }
        start = start.max(prev_end);
        let end = (start + duration).min(source_duration);
        if end - start < 1.0 {
            continue;
        }
        prev_end = end;
        ranges.push(SelectionRange::new(start, end, SelectionMethod::Fallback));
    }
    ranges
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use shorts_models::selection::is_ordered_non_overlapping;

    use crate::error::{WorkerError, WorkerResult};

    /// A model that replays a canned response or fails.
    struct CannedModel {
        response: Option<String>,
    }

    #[async_trait]
    impl HighlightModel for CannedModel {
        async fn complete(&self, _prompt: &str) -> WorkerResult<String> {
            match &self.response {
                Some(r) => Ok(r.clone()),
                None => Err(WorkerError::llm_failed("connection refused")),
            }
        }
    }

    /// 120 segments of ~5s each covering a 600s talk.
    fn talk_transcript() -> Transcript {
        let segments = (0..120)
            .map(|i| {
                let start = i as f64 * 5.0;
                let text = if i % 3 == 0 {
                    format!("ポイント{}はこちらです。", i)
                } else {
                    format!("セグメント{}の説明が続きます", i)
                };
                TranscriptSegment::new(start, start + 5.0, text)
            })
            .collect();
        Transcript::new(segments)
    }

    #[tokio::test]
    async fn rule_based_happy_path() {
        let transcript = talk_transcript();
        let options = Options::default();

        let ranges = pick_ranges(&transcript, 600.0, &options, None).await;

        assert_eq!(ranges.len(), 5);
        assert!(is_ordered_non_overlapping(&ranges));
        for r in &ranges {
            assert!(r.duration() >= options.min_sec && r.duration() <= options.max_sec);
            assert_eq!(r.method, SelectionMethod::Rule);
        }
    }

    #[tokio::test]
    async fn empty_transcript_uses_fixed_fallback() {
        let options = Options::default();
        let ranges = pick_ranges(&Transcript::default(), 600.0, &options, None).await;

        assert_eq!(ranges.len(), 3);
        // Midpoint of [25, 45] is 35s.
        for r in &ranges {
            assert!((r.duration() - 35.0).abs() < 1e-9);
            assert_eq!(r.method, SelectionMethod::Fallback);
        }
        assert!((ranges[0].start - 60.0).abs() < 1e-9);
        assert!((ranges[1].start - 270.0).abs() < 1e-9);
        assert!((ranges[2].start - 480.0).abs() < 1e-9);
        assert!(is_ordered_non_overlapping(&ranges));
    }

    #[tokio::test]
    async fn malformed_llm_json_falls_back_to_rules() {
        let transcript = talk_transcript();
        let options = Options::default();
        let model = CannedModel {
            response: Some("I cannot do this".to_string()),
        };

        let ranges = pick_ranges(&transcript, 600.0, &options, Some(&model)).await;

        assert_eq!(ranges.len(), 5);
        assert!(ranges.iter().all(|r| r.method == SelectionMethod::Rule));
    }

    #[tokio::test]
    async fn erroring_model_matches_rule_based() {
        let transcript = talk_transcript();
        let options = Options::default();
        let broken = CannedModel { response: None };

        let with_broken_llm = pick_ranges(&transcript, 600.0, &options, Some(&broken)).await;

        let mut forced = options.clone();
        forced.force_rule_based = true;
        let forced_rule = pick_ranges(&transcript, 600.0, &forced, Some(&broken)).await;

        assert_eq!(with_broken_llm, forced_rule);
    }

    #[tokio::test]
    async fn valid_llm_ranges_are_kept_and_tagged() {
        let transcript = talk_transcript();
        let options = Options::default();
        let model = CannedModel {
            response: Some(
                r#"[
                    {"start": 50.0, "end": 80.0, "reason": "hook"},
                    {"start": 100.0, "end": 130.0, "reason": "payoff"},
                    {"start": 200.0, "end": 230.0, "reason": "howto"},
                    {"start": 300.0, "end": 330.0, "reason": "surprise"},
                    {"start": 400.0, "end": 430.0, "reason": "closer"}
                ]"#
                .to_string(),
            ),
        };

        let ranges = pick_ranges(&transcript, 600.0, &options, Some(&model)).await;

        assert_eq!(ranges.len(), 5);
        assert!(ranges.iter().all(|r| r.method == SelectionMethod::Llm));
        assert!(is_ordered_non_overlapping(&ranges));
    }

    #[tokio::test]
    async fn short_llm_result_is_padded_with_rule_ranges() {
        let transcript = talk_transcript();
        let options = Options::default();
        let model = CannedModel {
            response: Some(
                r#"[
                    {"start": 50.0, "end": 80.0},
                    {"start": 100.0, "end": 130.0},
                    {"start": 200.0, "end": 230.0}
                ]"#
                .to_string(),
            ),
        };

        let ranges = pick_ranges(&transcript, 600.0, &options, Some(&model)).await;

        assert_eq!(ranges.len(), 5);
        assert_eq!(
            ranges.iter().filter(|r| r.method == SelectionMethod::Llm).count(),
            3
        );
        assert_eq!(
            ranges.iter().filter(|r| r.method == SelectionMethod::Rule).count(),
            2
        );
        assert!(is_ordered_non_overlapping(&ranges));
    }

    #[test]
    fn post_validate_drops_bad_durations_and_overlaps() {
        let transcript = talk_transcript();
        let options = Options::default();
        let candidates = vec![
            LlmRange { start: 10.0, end: 20.0, reason: None },   // too short
            LlmRange { start: 0.0, end: 120.0, reason: None },   // too long
            LlmRange { start: 50.0, end: 80.0, reason: None },
            LlmRange { start: 75.0, end: 105.0, reason: None },  // overlaps previous
            LlmRange { start: 200.0, end: 230.0, reason: None },
        ];

        let kept = post_validate(candidates, &transcript, &options);
        assert_eq!(kept.len(), 2);
        assert_eq!(kept[0].start, 50.0);
        assert_eq!(kept[1].start, 200.0);
    }

    #[test]
    fn post_validate_snaps_to_segment_boundaries() {
        let transcript = talk_transcript();
        let options = Options::default();
        // 49.2 is within tolerance of the 50.0 boundary; 81.0 snaps to 80.0.
        let candidates = vec![LlmRange { start: 49.2, end: 81.0, reason: None }];

        let kept = post_validate(candidates, &transcript, &options);
        assert_eq!(kept.len(), 1);
        assert_eq!(kept[0].start, 50.0);
        assert_eq!(kept[0].end, 80.0);
    }

    #[test]
    fn rule_based_is_deterministic() {
        let transcript = talk_transcript();
        let options = Options::default();

        let a = rule_based(&transcript, 600.0, &options);
        let b = rule_based(&transcript, 600.0, &options);
        assert_eq!(a, b);
    }

    #[test]
    fn rule_based_respects_target_count_option() {
        let transcript = talk_transcript();
        let mut options = Options::default();
        options.target_count = 8;

        let ranges = rule_based(&transcript, 600.0, &options);
        assert!(ranges.len() <= 8);
        assert!(ranges.len() >= MIN_GUARANTEED);
    }

    #[test]
    fn rule_based_short_transcript_yields_nothing() {
        // Two 5s segments cannot reach min_sec=25.
        let transcript = Transcript::new(vec![
            TranscriptSegment::new(0.0, 5.0, "短い。"),
            TranscriptSegment::new(5.0, 10.0, "これも短い。"),
        ]);
        let ranges = rule_based(&transcript, 10.0, &Options::default());
        assert!(ranges.is_empty());
    }

    #[test]
    fn fallback_clips_to_short_sources() {
        let options = Options::default();
        // 100s source: the 80% range cannot fit a full 35s and is clipped.
        let ranges = fixed_fallback(100.0, &options);
        assert!(!ranges.is_empty());
        assert!(is_ordered_non_overlapping(&ranges));
        for r in &ranges {
            assert!(r.end <= 100.0);
            assert!(r.start >= 0.0);
        }
    }
}
