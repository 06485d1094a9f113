//! Stage progress breakpoints.
//!
//! Rendering and uploading interpolate linearly per finished clip inside
//! their bands; everything else publishes a fixed value on stage entry.

use shorts_models::Stage;

/// Progress published when a stage is entered.
pub fn stage_entry(stage: Stage) -> f64 {
    match stage {
        Stage::Fetching => 0.05,
        Stage::Transcribing => 0.20,
        Stage::Selecting => 0.45,
        Stage::Rendering => 0.55,
        Stage::Uploading => 0.90,
        Stage::Done => 1.0,
    }
}

/// Progress after `done` of `total` clips have rendered (0.55 → 0.90).
pub fn render_progress(done: usize, total: usize) -> f64 {
    if total == 0 {
        return stage_entry(Stage::Rendering);
    }
    0.55 + 0.35 * (done.min(total) as f64 / total as f64)
}

/// Progress after `done` of `total` clips have uploaded (0.90 → 0.99).
pub fn upload_progress(done: usize, total: usize) -> f64 {
    if total == 0 {
        return stage_entry(Stage::Uploading);
    }
    0.90 + 0.09 * (done.min(total) as f64 / total as f64)
}
