//! Selected clip ranges.

use serde::{Deserialize, Serialize};

/// The strategy that produced a selection range.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SelectionMethod {
    Llm,
    Rule,
    Fallback,
}

impl SelectionMethod {
    pub fn as_str(&self) -> &'static str {
        match self {
            SelectionMethod::Llm => "llm",
            SelectionMethod::Rule => "rule",
            SelectionMethod::Fallback => "fallback",
        }
    }
}

/// A `[start, end)` interval in the source chosen for clipping.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SelectionRange {
    pub start: f64,
    pub end: f64,
    pub method: SelectionMethod,
}

impl SelectionRange {
    pub fn new(start: f64, end: f64, method: SelectionMethod) -> Self {
        Self { start, end, method }
    }

    pub fn duration(&self) -> f64 {
        self.end - self.start
    }

    pub fn overlaps(&self, other: &SelectionRange) -> bool {
        self.start < other.end && other.start < self.end
    }
}

/// Check that ranges are pairwise non-overlapping and chronologically ordered.
pub fn is_ordered_non_overlapping(ranges: &[SelectionRange]) -> bool {
    ranges.windows(2).all(|w| w[0].end <= w[1].start)
}
