//! Per-job pipeline.
//!
//! A run loads the job, commits `Processing`, refines the prompt, renders
//! video and narration concurrently, then either places the mock artifact
//! or stitches the final output. The job record is committed exactly twice
//! per run: on entering `Processing` and once more at the end.
//!
//! Stitch failures do not fail the job. A non-mock run that got as far as
//! stitching is always `Completed` with the intended output path, whether
//! or not the encode produced a file; the failure is only logged and
//! counted.

use std::panic::AssertUnwindSafe;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;

use futures::FutureExt;
use tokio::fs;
use tracing::Instrument;

use foundry_genai::{
    AudioOutcome, AudioProvider, GeminiVisualProvider, TieredAudioProvider, VisualProvider,
};
use foundry_media::{
    move_file, partial_path, write_file_atomic, FfmpegStitcher, MediaStitcher, StitchOutcome,
};
use foundry_models::{ArtifactPaths, Job, JobId, JobStatus};
use foundry_store::JobStore;

use crate::config::WorkerConfig;
use crate::error::WorkerResult;
use crate::logging::JobLogger;
use crate::metrics;

/// Final artifact content when mock video left no raw file to copy.
pub const MOCK_FINAL_PLACEHOLDER: &[u8] = b"Mock Video File Content";

/// What happened to a run request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RunOutcome {
    /// No job with this id
    NotFound,
    /// The store could not be read, or `Processing` could not be committed
    StoreUnavailable(String),
    /// The job is not `Queued`; nothing was changed
    NotRunnable(JobStatus),
    /// Terminal status reached and committed
    Finished(JobStatus),
    /// Terminal status reached but the final commit failed
    PersistFailed(JobStatus),
}

impl RunOutcome {
    /// Terminal status the run reached, committed or not.
    pub fn terminal_status(&self) -> Option<JobStatus> {
        match self {
            RunOutcome::Finished(s) | RunOutcome::PersistFailed(s) => Some(*s),
            _ => None,
        }
    }
}

/// Drives one job from `Queued` to a terminal status.
pub struct Orchestrator {
    store: Arc<dyn JobStore>,
    visual: Arc<dyn VisualProvider>,
    audio: Arc<dyn AudioProvider>,
    stitcher: Arc<dyn MediaStitcher>,
    temp_dir: PathBuf,
    output_dir: PathBuf,
}

impl Orchestrator {
    pub fn new(
        store: Arc<dyn JobStore>,
        visual: Arc<dyn VisualProvider>,
        audio: Arc<dyn AudioProvider>,
        stitcher: Arc<dyn MediaStitcher>,
    ) -> Self {
        let defaults = WorkerConfig::default();
        Self {
            store,
            visual,
            audio,
            stitcher,
            temp_dir: defaults.temp_dir,
            output_dir: defaults.output_dir,
        }
    }

    /// Set where artifacts are written.
    pub fn with_dirs(mut self, temp_dir: impl Into<PathBuf>, output_dir: impl Into<PathBuf>) -> Self {
        self.temp_dir = temp_dir.into();
        self.output_dir = output_dir.into();
        self
    }

    /// Build with the Gemini, tiered narration and FFmpeg implementations.
    pub fn from_config(config: &WorkerConfig, store: Arc<dyn JobStore>) -> WorkerResult<Self> {
        let visual = Arc::new(GeminiVisualProvider::new(config.visual.clone())?);
        let audio = Arc::new(TieredAudioProvider::from_config(&config.audio)?);
        let stitcher = Arc::new(FfmpegStitcher::new(config.stitch.clone()));

        Ok(Self::new(store, visual, audio, stitcher)
            .with_dirs(config.temp_dir.clone(), config.output_dir.clone()))
    }

    pub fn store(&self) -> &Arc<dyn JobStore> {
        &self.store
    }

    /// Run a job to completion. Never panics and never returns an error;
    /// everything that can go wrong is reflected in the job status or the
    /// returned outcome.
    pub async fn run(&self, id: &JobId) -> RunOutcome {
        let logger = JobLogger::new(id, "generate");
        let span = logger.create_span();
        self.run_logged(id, &logger).instrument(span).await
    }

    async fn run_logged(&self, id: &JobId, logger: &JobLogger) -> RunOutcome {
        let mut job = match self.store.load(id).await {
            Ok(Some(job)) => job,
            Ok(None) => {
                logger.log_warning("job not found");
                return RunOutcome::NotFound;
            }
            Err(e) => {
                logger.log_error(&format!("failed to load job: {}", e));
                return RunOutcome::StoreUnavailable(e.to_string());
            }
        };

        if let Err(e) = job.start() {
            logger.log_warning(&format!("job is not runnable: {}", e));
            return RunOutcome::NotRunnable(job.status);
        }

        if let Err(e) = self.store.commit(&job).await {
            logger.log_error(&format!("failed to commit processing status: {}", e));
            return RunOutcome::StoreUnavailable(e.to_string());
        }

        logger.log_start(&format!(
            "style={} premium_audio={}",
            job.style, job.wants_premium_audio
        ));
        let started = Instant::now();

        let result = AssertUnwindSafe(self.execute(&mut job, logger))
            .catch_unwind()
            .await;

        let failure = match result {
            Ok(Ok(())) => None,
            Ok(Err(e)) => Some(e.to_string()),
            Err(panic) => Some(format!("panic: {}", panic_message(panic.as_ref()))),
        };

        if let Some(message) = failure {
            logger.log_error(&message);
            if !job.status.is_terminal() {
                if let Err(e) = job.fail(message) {
                    logger.log_error(&format!("could not mark job failed: {}", e));
                }
            }
        }

        let status = job.status;
        metrics::record_job_finished(status, started.elapsed().as_secs_f64());

        match self.store.commit(&job).await {
            Ok(()) => {
                logger.log_completion(&format!(
                    "status={} in {:.1}s",
                    status,
                    started.elapsed().as_secs_f64()
                ));
                RunOutcome::Finished(status)
            }
            Err(e) => {
                logger.log_error(&format!("failed to commit final status {}: {}", status, e));
                RunOutcome::PersistFailed(status)
            }
        }
    }

    async fn execute(&self, job: &mut Job, logger: &JobLogger) -> WorkerResult<()> {
        let paths = ArtifactPaths::for_job(&job.id, &self.temp_dir, &self.output_dir);
        let script = job.narration_script().to_string();

        let refined = self.visual.refine(&job.prompt, &job.style).await;
        logger.log_progress(&format!("refined prompt: {}", refined));

        let (video_ok, audio) = tokio::join!(
            self.visual.generate_video(&refined, &paths.raw_video),
            self.audio
                .generate(&script, &paths.audio, job.wants_premium_audio),
        );

        if video_ok {
            job.video_artifact_path = Some(paths.raw_video.clone());
        }
        match &audio {
            AudioOutcome::Generated { tier, bytes } => {
                logger.log_progress(&format!("narration ready ({}, {} bytes)", tier.as_str(), bytes));
                job.audio_artifact_path = Some(paths.audio.clone());
            }
            AudioOutcome::SkippedEmpty => logger.log_progress("narration skipped: empty script"),
            AudioOutcome::Failed(reason) => {
                logger.log_warning(&format!("narration failed: {}", reason))
            }
        }

        if !video_ok {
            metrics::record_video_failure();
            job.fail("video generation failed")?;
            return Ok(());
        }

        if self.visual.is_mock() {
            place_mock_final(&paths.raw_video, &paths.final_output).await?;
            job.complete_mock(paths.final_output)?;
            return Ok(());
        }

        let outcome = self
            .stitcher
            .stitch(&paths.raw_video, &paths.audio, &paths.final_output)
            .await;
        match &outcome {
            StitchOutcome::Failed(reason) => {
                logger.log_warning(&format!("stitching failed, output may be missing: {}", reason))
            }
            other => logger.log_progress(&format!("stitched ({})", other.as_str())),
        }

        job.complete(paths.final_output)?;
        Ok(())
    }
}

/// Copy the raw video to the final location, or write a placeholder.
async fn place_mock_final(raw: &Path, final_output: &Path) -> WorkerResult<()> {
    if fs::try_exists(raw).await.unwrap_or(false) {
        if let Some(parent) = final_output.parent() {
            fs::create_dir_all(parent).await?;
        }
        let tmp = partial_path(final_output);
        if let Err(e) = fs::copy(raw, &tmp).await {
            let _ = fs::remove_file(&tmp).await;
            return Err(e.into());
        }
        move_file(&tmp, final_output).await?;
    } else {
        write_file_atomic(final_output, MOCK_FINAL_PLACEHOLDER).await?;
    }
    Ok(())
}

fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_mock_final_copies_raw_video() {
        let dir = TempDir::new().unwrap();
        let raw = dir.path().join("tmp").join("j_raw.mp4");
        let out = dir.path().join("out").join("j_final.mp4");
        std::fs::create_dir_all(raw.parent().unwrap()).unwrap();
        std::fs::write(&raw, b"raw-video").unwrap();

        place_mock_final(&raw, &out).await.unwrap();

        assert_eq!(std::fs::read(&out).unwrap(), b"raw-video");
        assert!(raw.exists());
    }

    #[tokio::test]
    async fn test_mock_final_placeholder_without_raw() {
        let dir = TempDir::new().unwrap();
        let out = dir.path().join("out").join("j_final.mp4");

        place_mock_final(&dir.path().join("missing.mp4"), &out)
            .await
            .unwrap();

        assert_eq!(std::fs::read(&out).unwrap(), MOCK_FINAL_PLACEHOLDER);
    }

    #[test]
    fn test_panic_message() {
        let payload: Box<dyn std::any::Any + Send> = Box::new("boom");
        assert_eq!(panic_message(payload.as_ref()), "boom");
        let payload: Box<dyn std::any::Any + Send> = Box::new(String::from("bang"));
        assert_eq!(panic_message(payload.as_ref()), "bang");
    }

    #[test]
    fn test_terminal_status() {
        assert_eq!(
            RunOutcome::PersistFailed(JobStatus::Failed).terminal_status(),
            Some(JobStatus::Failed)
        );
        assert_eq!(RunOutcome::NotFound.terminal_status(), None);
    }
}
