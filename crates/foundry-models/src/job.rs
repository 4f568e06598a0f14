//! Job definitions and the job status state machine.

use std::fmt;
use std::path::PathBuf;

use chrono::{DateTime, Utc};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

/// Style tag used when the submitter does not provide one.
pub const DEFAULT_STYLE: &str = "cinematic";

/// Unique identifier for a job.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema)]
#[serde(transparent)]
pub struct JobId(pub String);

impl JobId {
    /// Generate a new random job ID.
    pub fn new() -> Self {
        Self(Uuid::new_v4().to_string())
    }

    /// Create from an existing string.
    pub fn from_string(s: impl Into<String>) -> Self {
        Self(s.into())
    }

    /// Get the inner string.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for JobId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for JobId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Job processing status.
///
/// Transitions only move forward:
/// `Queued -> Processing -> {Completed | CompletedMock | Failed}`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema, Default)]
#[serde(rename_all = "snake_case")]
pub enum JobStatus {
    /// Job is waiting for a worker slot
    #[default]
    Queued,
    /// Job is actively being processed
    Processing,
    /// Job finished with a stitched artifact
    Completed,
    /// Job finished under mock video mode (stitching skipped)
    CompletedMock,
    /// Job failed
    Failed,
}

impl JobStatus {
    /// Get string representation of the status.
    pub fn as_str(&self) -> &'static str {
        match self {
            JobStatus::Queued => "queued",
            JobStatus::Processing => "processing",
            JobStatus::Completed => "completed",
            JobStatus::CompletedMock => "completed_mock",
            JobStatus::Failed => "failed",
        }
    }

    /// Check if this is a terminal state (no more updates expected).
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            JobStatus::Completed | JobStatus::CompletedMock | JobStatus::Failed
        )
    }

    /// Whether a job in this status must carry a final artifact path.
    pub fn has_final_artifact(&self) -> bool {
        matches!(self, JobStatus::Completed | JobStatus::CompletedMock)
    }

    /// Check whether moving from `self` to `next` follows the transition graph.
    pub fn can_transition_to(&self, next: JobStatus) -> bool {
        match (self, next) {
            (JobStatus::Queued, JobStatus::Processing) => true,
            (JobStatus::Processing, next) => next.is_terminal(),
            _ => false,
        }
    }
}

impl fmt::Display for JobStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Rejected status change.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("invalid job transition {from} -> {to}")]
pub struct InvalidTransition {
    pub from: JobStatus,
    pub to: JobStatus,
}

/// One prompt-to-media request tracked through the pipeline.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct Job {
    /// Unique job ID
    pub id: JobId,

    /// Visual intent text
    pub prompt: String,

    /// Narration text; the prompt is narrated when this is blank
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub monologue: Option<String>,

    /// Free-form visual style tag passed to refinement
    #[serde(default = "default_style")]
    pub style: String,

    /// Request the premium narration tier
    #[serde(default)]
    pub wants_premium_audio: bool,

    /// Current status
    #[serde(default)]
    pub status: JobStatus,

    /// Raw generated video
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub video_artifact_path: Option<PathBuf>,

    /// Generated narration
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub audio_artifact_path: Option<PathBuf>,

    /// Final combined output
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub final_artifact_path: Option<PathBuf>,

    /// Creation timestamp
    pub created_at: DateTime<Utc>,

    /// Last update timestamp
    pub updated_at: DateTime<Utc>,

    /// Started at timestamp
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub started_at: Option<DateTime<Utc>>,

    /// Reached a terminal status at
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub completed_at: Option<DateTime<Utc>>,

    /// Error message (if failed)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error_message: Option<String>,
}

fn default_style() -> String {
    DEFAULT_STYLE.to_string()
}

impl Job {
    /// Create a new queued job.
    pub fn new(
        prompt: impl Into<String>,
        monologue: Option<String>,
        style: impl Into<String>,
        wants_premium_audio: bool,
    ) -> Self {
        let now = Utc::now();

        Self {
            id: JobId::new(),
            prompt: prompt.into(),
            monologue,
            style: style.into(),
            wants_premium_audio,
            status: JobStatus::Queued,
            video_artifact_path: None,
            audio_artifact_path: None,
            final_artifact_path: None,
            created_at: now,
            updated_at: now,
            started_at: None,
            completed_at: None,
            error_message: None,
        }
    }

    /// The text to narrate: the monologue when non-blank, otherwise the prompt.
    pub fn narration_script(&self) -> &str {
        match self.monologue.as_deref() {
            Some(m) if !m.trim().is_empty() => m,
            _ => &self.prompt,
        }
    }

    /// Enter `Processing`.
    pub fn start(&mut self) -> Result<(), InvalidTransition> {
        self.transition(JobStatus::Processing)?;
        self.started_at = Some(self.updated_at);
        Ok(())
    }

    /// Mark job as completed with a stitched artifact.
    pub fn complete(&mut self, final_path: impl Into<PathBuf>) -> Result<(), InvalidTransition> {
        self.finish(JobStatus::Completed, final_path.into())
    }

    /// Mark job as completed under mock video mode.
    pub fn complete_mock(&mut self, final_path: impl Into<PathBuf>) -> Result<(), InvalidTransition> {
        self.finish(JobStatus::CompletedMock, final_path.into())
    }

    /// Mark job as failed. The final artifact path is cleared so that it is
    /// only ever present on completed jobs.
    pub fn fail(&mut self, error: impl Into<String>) -> Result<(), InvalidTransition> {
        self.transition(JobStatus::Failed)?;
        self.final_artifact_path = None;
        self.error_message = Some(error.into());
        self.completed_at = Some(self.updated_at);
        Ok(())
    }

    fn finish(&mut self, status: JobStatus, final_path: PathBuf) -> Result<(), InvalidTransition> {
        self.transition(status)?;
        self.final_artifact_path = Some(final_path);
        self.completed_at = Some(self.updated_at);
        Ok(())
    }

    fn transition(&mut self, next: JobStatus) -> Result<(), InvalidTransition> {
        if !self.status.can_transition_to(next) {
            return Err(InvalidTransition {
                from: self.status,
                to: next,
            });
        }
        self.status = next;
        self.updated_at = Utc::now();
        Ok(())
    }
}
