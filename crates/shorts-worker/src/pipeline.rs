//! The per-job pipeline: fetch → transcribe → select → render → upload.
//!
//! Per-stage failure policy:
//! - fetch fails → job fails (nothing to work with)
//! - transcribe fails → continue with an empty transcript
//! - selection below the guaranteed minimum → `NoSegmentsProducible`
//! - render/upload failure on a clip → skip that clip; the job fails only
//!   when fewer than the guaranteed minimum survive
//!
//! The whole run sits under `job_timeout`; on expiry the stage future is
//! dropped (killing any child processes) and the job fails with
//! `JobTimeout`. The scratch directory is removed on every exit path.

use std::sync::Arc;

use tracing::{error, info, warn};

use shorts_media::{ClipRenderer, RenderSpec, SpeechToText};
use shorts_models::{
    ClipOutput, ClipSpan, Job, JobError, JobPatch, JobStatus, SelectionMethod, SelectionRange,
    Stage, Transcript, MIN_GUARANTEED,
};
use shorts_registry::progress::{render_progress, stage_entry, upload_progress};
use shorts_registry::JobRegistry;
use shorts_storage::{StorageClient, StorageError, UploadRequest};

use crate::config::PipelineConfig;
use crate::error::{WorkerError, WorkerResult};
use crate::fetch::{FetchedSource, SourceFetcher};
use crate::llm::HighlightModel;
use crate::retry::{retry_async, RetryConfig};
use crate::scratch::ScratchDir;
use crate::selector;

/// One pipeline instance serves all jobs; per-job state lives on the stack.
pub struct JobPipeline {
    config: PipelineConfig,
    registry: Arc<JobRegistry>,
    fetcher: Arc<dyn SourceFetcher>,
    stt: Arc<dyn SpeechToText>,
    model: Option<Arc<dyn HighlightModel>>,
    renderer: Arc<dyn ClipRenderer>,
    storage: Arc<dyn StorageClient>,
}

impl JobPipeline {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        config: PipelineConfig,
        registry: Arc<JobRegistry>,
        fetcher: Arc<dyn SourceFetcher>,
        stt: Arc<dyn SpeechToText>,
        model: Option<Arc<dyn HighlightModel>>,
        renderer: Arc<dyn ClipRenderer>,
        storage: Arc<dyn StorageClient>,
    ) -> Self {
        Self {
            config,
            registry,
            fetcher,
            stt,
            model,
            renderer,
            storage,
        }
    }

    /// Entry point called by the dispatcher. Never panics the worker task;
    /// every outcome lands in the registry.
    pub async fn run(&self, job: Job) {
        info!(
            job_id = %job.job_id,
            trace_id = %job.trace_id,
            stage = "queued",
            attempt = job.attempt,
            "Job started"
        );

        let scratch = match ScratchDir::create(&self.config.tmp_dir, &job.job_id).await {
            Ok(scratch) => scratch,
            Err(e) => {
                self.fail(&job, WorkerError::internal(format!("scratch dir: {e}")))
                    .await;
                return;
            }
        };

        let outcome =
            tokio::time::timeout(self.config.job_timeout, self.execute(&job, &scratch)).await;

        match outcome {
            Ok(Ok(())) => {}
            Ok(Err(e)) => self.fail(&job, e).await,
            Err(_) => {
                // Dropping the stage future kills in-flight subprocesses.
                self.fail(
                    &job,
                    WorkerError::JobTimeout(format!(
                        "exceeded {}s",
                        self.config.job_timeout.as_secs()
                    )),
                )
                .await;
            }
        }

        scratch.cleanup().await;

        let final_stage = self
            .registry
            .get(&job.job_id)
            .await
            .ok()
            .and_then(|j| j.stage)
            .map(|s| s.as_str())
            .unwrap_or("queued");
        info!(
            job_id = %job.job_id,
            trace_id = %job.trace_id,
            stage = final_stage,
            "Job finished, scratch released"
        );
    }

    async fn execute(&self, job: &Job, scratch: &ScratchDir) -> WorkerResult<()> {
        let options = &job.request.options;

        // Stage 1: fetch. Failure here terminates the job.
        self.publish(
            job,
            JobPatch::stage(Stage::Fetching, stage_entry(Stage::Fetching))
                .with_status(JobStatus::Running)
                .with_message("Fetching source"),
        )
        .await;

        let source = self.fetcher.fetch(&job.request, scratch).await?;

        // Stage 2: transcribe. Failure degrades to an empty transcript.
        self.publish(
            job,
            JobPatch::stage(Stage::Transcribing, stage_entry(Stage::Transcribing))
                .with_message("Transcribing audio"),
        )
        .await;

        let transcript = self.transcribe(job, &source).await;
        self.persist_transcript(job, scratch, &transcript).await;

        // Stage 3: select.
        self.publish(
            job,
            JobPatch::stage(Stage::Selecting, stage_entry(Stage::Selecting))
                .with_message("Selecting segments"),
        )
        .await;

        let ranges = selector::pick_ranges(
            &transcript,
            source.info.duration,
            options,
            self.model.as_deref(),
        )
        .await;

        if ranges.len() < MIN_GUARANTEED {
            return Err(WorkerError::no_segments(format!(
                "selection produced {} ranges, need {}",
                ranges.len(),
                MIN_GUARANTEED
            )));
        }

        info!(
            job_id = %job.job_id,
            trace_id = %job.trace_id,
            stage = "selecting",
            count = ranges.len(),
            method = ranges[0].method.as_str(),
            "Segments selected"
        );

        // Stage 4: render, sequentially to respect encoder resources.
        self.publish(
            job,
            JobPatch::stage(Stage::Rendering, stage_entry(Stage::Rendering))
                .with_message("Rendering clips"),
        )
        .await;

        let (rendered, render_skips) = self
            .render_clips(job, scratch, &source, &transcript, &ranges)
            .await;

        if rendered.len() < MIN_GUARANTEED {
            return Err(WorkerError::no_segments(format!(
                "only {} of {} clips rendered, need {}",
                rendered.len(),
                ranges.len(),
                MIN_GUARANTEED
            )));
        }

        // Stage 5: upload.
        self.publish(
            job,
            JobPatch::stage(Stage::Uploading, stage_entry(Stage::Uploading))
                .with_message("Uploading clips"),
        )
        .await;

        let (outputs, upload_skips) = self.upload_clips(job, &rendered).await;

        if outputs.len() < MIN_GUARANTEED {
            return Err(WorkerError::no_segments(format!(
                "only {} of {} clips uploaded, need {}",
                outputs.len(),
                rendered.len(),
                MIN_GUARANTEED
            )));
        }

        let mut message = format!("Successfully created {} clips", outputs.len());
        let skipped = render_skips + upload_skips;
        if skipped > 0 {
            message.push_str(&format!(" ({skipped} skipped after failures)"));
        }

        let count = outputs.len();
        self.publish(
            job,
            JobPatch::stage(Stage::Done, stage_entry(Stage::Done))
                .with_status(JobStatus::Done)
                .with_message(message)
                .with_outputs(outputs),
        )
        .await;

        info!(
            job_id = %job.job_id,
            trace_id = %job.trace_id,
            stage = "done",
            outputs = count,
            "Job completed"
        );
        Ok(())
    }

    /// Transcribe the source; failures and timeouts degrade to an empty
    /// transcript so selection can fall back to fixed ranges.
    async fn transcribe(&self, job: &Job, source: &FetchedSource) -> Transcript {
        let options = &job.request.options;
        let result = tokio::time::timeout(
            self.config.transcribe_timeout,
            self.stt
                .transcribe(&source.path, &options.language, options.whisper_model),
        )
        .await;

        match result {
            Ok(Ok(transcript)) => {
                let transcript = transcript.normalized();
                info!(
                    job_id = %job.job_id,
                    trace_id = %job.trace_id,
                    stage = "transcribing",
                    segments = transcript.segments.len(),
                    language = transcript.language_detected.as_deref().unwrap_or("unknown"),
                    "Transcription complete"
                );
                transcript
            }
            Ok(Err(e)) => {
                warn!(
                    job_id = %job.job_id,
                    trace_id = %job.trace_id,
                    stage = "transcribing",
                    error = %e,
                    "Transcription failed, continuing with empty transcript"
                );
                Transcript::default()
            }
            Err(_) => {
                warn!(
                    job_id = %job.job_id,
                    trace_id = %job.trace_id,
                    stage = "transcribing",
                    timeout_secs = self.config.transcribe_timeout.as_secs(),
                    "Transcription timed out, continuing with empty transcript"
                );
                Transcript::default()
            }
        }
    }

    async fn persist_transcript(&self, job: &Job, scratch: &ScratchDir, transcript: &Transcript) {
        match serde_json::to_vec_pretty(transcript) {
            Ok(bytes) => {
                if let Err(e) = tokio::fs::write(scratch.transcript_path(), bytes).await {
                    warn!(
                        job_id = %job.job_id,
                        trace_id = %job.trace_id,
                        stage = "transcribing",
                        error = %e,
                        "Failed to persist transcript"
                    );
                }
            }
            Err(e) => warn!(
                job_id = %job.job_id,
                trace_id = %job.trace_id,
                stage = "transcribing",
                error = %e,
                "Failed to serialize transcript"
            ),
        }
    }

    /// Render each range in order; a failed clip is skipped.
    /// Returns the surviving clips (1-based index, range, local path) and
    /// the skip count.
    async fn render_clips(
        &self,
        job: &Job,
        scratch: &ScratchDir,
        source: &FetchedSource,
        transcript: &Transcript,
        ranges: &[SelectionRange],
    ) -> (Vec<(usize, SelectionRange, std::path::PathBuf)>, usize) {
        let style = job.request.options.effective_subtitle_style();
        let mut rendered = Vec::new();
        let mut skipped = 0usize;

        for (i, range) in ranges.iter().enumerate() {
            let index = i + 1;
            let subtitles = if range.method == SelectionMethod::Fallback {
                None
            } else {
                Some(transcript.slice(range.start, range.end))
            };

            let spec = RenderSpec {
                source: source.path.clone(),
                output: scratch.clip_path(index),
                start: range.start,
                end: range.end,
                subtitles,
                style: style.clone(),
                source_width: source.info.width,
                source_height: source.info.height,
            };

            match self.renderer.render(&spec).await {
                Ok(path) => rendered.push((index, range.clone(), path)),
                Err(e) => {
                    skipped += 1;
                    warn!(
                        job_id = %job.job_id,
                        trace_id = %job.trace_id,
                        stage = "rendering",
                        clip = index,
                        error = %e,
                        "Clip render failed, skipping"
                    );
                }
            }

            self.publish(
                job,
                JobPatch::default().with_progress(render_progress(i + 1, ranges.len())),
            )
            .await;
        }

        (rendered, skipped)
    }

    /// Upload surviving clips; transport errors are retried, a clip that
    /// still fails is skipped.
    async fn upload_clips(
        &self,
        job: &Job,
        rendered: &[(usize, SelectionRange, std::path::PathBuf)],
    ) -> (Vec<ClipOutput>, usize) {
        let mut outputs = Vec::new();
        let mut skipped = 0usize;

        for (n, (index, range, path)) in rendered.iter().enumerate() {
            let display_name = display_name(job.request.title_hint.as_deref(), *index);
            let request = UploadRequest {
                path: path.clone(),
                folder_id: self.config.output_folder_id.clone(),
                display_name: display_name.clone(),
                mime_type: "video/mp4".to_string(),
            };

            let retry =
                RetryConfig::new("clip_upload").with_base_delay(self.config.retry_base_delay);
            let result = retry_async(
                &retry,
                || self.storage.upload_file(&request),
                StorageError::is_retryable,
            )
            .await;

            match result {
                Ok(stored) => outputs.push(ClipOutput {
                    file_name: display_name,
                    remote_locator: stored.locator,
                    remote_file_id: stored.file_id,
                    duration_sec: range.duration(),
                    segment: ClipSpan {
                        start: range.start,
                        end: range.end,
                    },
                    method: range.method,
                }),
                Err(e) => {
                    skipped += 1;
                    warn!(
                        job_id = %job.job_id,
                        trace_id = %job.trace_id,
                        stage = "uploading",
                        clip = index,
                        error = %e,
                        "Clip upload failed after retries, skipping"
                    );
                }
            }

            self.publish(
                job,
                JobPatch::default().with_progress(upload_progress(n + 1, rendered.len())),
            )
            .await;
        }

        (outputs, skipped)
    }

    /// Record a terminal failure.
    async fn fail(&self, job: &Job, err: WorkerError) {
        let stage = self
            .registry
            .get(&job.job_id)
            .await
            .ok()
            .and_then(|j| j.stage);

        error!(
            job_id = %job.job_id,
            trace_id = %job.trace_id,
            stage = stage.map(|s| s.as_str()).unwrap_or("unknown"),
            kind = err.kind().as_str(),
            error = %err,
            "Job failed"
        );

        let mut record = JobError::new(err.kind(), err.to_string());
        if let Some(stage) = stage {
            record = record.at_stage(stage);
        }

        let mut patch = JobPatch::default()
            .with_status(JobStatus::Failed)
            .with_message(format!("Error: {err}"));
        patch.error = Some(record);

        if let Err(e) = self.registry.update(&job.job_id, patch).await {
            warn!(
                job_id = %job.job_id,
                trace_id = %job.trace_id,
                stage = stage.map(|s| s.as_str()).unwrap_or("queued"),
                error = %e,
                "Could not record job failure"
            );
        }
    }

    /// Publish a progress patch; a rejected patch is logged, not fatal.
    async fn publish(&self, job: &Job, patch: JobPatch) {
        let stage = patch.stage;
        if let Err(e) = self.registry.update(&job.job_id, patch).await {
            let stage = match stage {
                Some(stage) => Some(stage),
                None => self
                    .registry
                    .get(&job.job_id)
                    .await
                    .ok()
                    .and_then(|j| j.stage),
            };
            warn!(
                job_id = %job.job_id,
                trace_id = %job.trace_id,
                stage = stage.map(|s| s.as_str()).unwrap_or("queued"),
                error = %e,
                "Progress update rejected"
            );
        }
    }
}

/// Display name for an uploaded clip: the title hint when present,
/// `clip_NN.mp4` otherwise. NN is the 1-based selection index.
fn display_name(title_hint: Option<&str>, index: usize) -> String {
    match title_hint.map(str::trim) {
        Some(hint) if !hint.is_empty() => {
            let safe: String = hint
                .chars()
                .map(|c| {
                    if c == '/' || c == '\\' || c.is_control() {
                        '_'
                    } else {
                        c
                    }
                })
                .collect();
            format!("{safe}_{index:02}.mp4")
        }
        _ => format!("clip_{index:02}.mp4"),
    }
}
