//! Submission requests and polling views.

use std::path::PathBuf;

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::{Job, JobId, JobStatus, DEFAULT_STYLE};

/// Errors for malformed submissions.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RequestError {
    #[error("prompt must not be empty")]
    EmptyPrompt,
}

/// A request to generate a clip.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct GenerateRequest {
    /// Visual intent
    pub prompt: String,
    /// Optional narration; empty means the prompt is narrated
    #[serde(default)]
    pub monologue: String,
    /// Visual style tag
    #[serde(default = "default_style")]
    pub style: String,
    /// Request the premium narration tier
    #[serde(default)]
    pub use_paid_voice: bool,
}

fn default_style() -> String {
    DEFAULT_STYLE.to_string()
}

impl GenerateRequest {
    /// Create a request with default style, no monologue and standard voice.
    pub fn new(prompt: impl Into<String>) -> Self {
        Self {
            prompt: prompt.into(),
            monologue: String::new(),
            style: default_style(),
            use_paid_voice: false,
        }
    }

    /// Set the narration text.
    pub fn with_monologue(mut self, monologue: impl Into<String>) -> Self {
        self.monologue = monologue.into();
        self
    }

    /// Set the style tag.
    pub fn with_style(mut self, style: impl Into<String>) -> Self {
        self.style = style.into();
        self
    }

    /// Request the premium narration tier.
    pub fn with_paid_voice(mut self, paid: bool) -> Self {
        self.use_paid_voice = paid;
        self
    }

    /// Validate the request.
    pub fn validate(&self) -> Result<(), RequestError> {
        if self.prompt.trim().is_empty() {
            return Err(RequestError::EmptyPrompt);
        }
        Ok(())
    }

    /// Build the queued job for this request.
    pub fn into_job(self) -> Result<Job, RequestError> {
        self.validate()?;

        let style = if self.style.trim().is_empty() {
            default_style()
        } else {
            self.style
        };

        Ok(Job::new(
            self.prompt,
            Some(self.monologue),
            style,
            self.use_paid_voice,
        ))
    }
}

/// What a polling client sees for a job.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct JobStatusView {
    pub id: JobId,
    pub status: JobStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub final_artifact_path: Option<PathBuf>,
}

impl From<&Job> for JobStatusView {
    fn from(job: &Job) -> Self {
        Self {
            id: job.id.clone(),
            status: job.status,
            final_artifact_path: job.final_artifact_path.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_request_defaults() {
        let req: GenerateRequest = serde_json::from_str(r#"{"prompt": "a red fox runs"}"#).unwrap();
        assert_eq!(req.style, "cinematic");
        assert_eq!(req.monologue, "");
        assert!(!req.use_paid_voice);
    }

    #[test]
    fn test_blank_prompt_rejected() {
        let req = GenerateRequest::new("   ");
        assert_eq!(req.validate(), Err(RequestError::EmptyPrompt));
        assert!(req.into_job().is_err());
    }

    #[test]
    fn test_into_job() {
        let job = GenerateRequest::new("a red fox runs")
            .with_monologue("Hello world")
            .with_style("")
            .with_paid_voice(true)
            .into_job()
            .unwrap();

        assert_eq!(job.status, JobStatus::Queued);
        assert_eq!(job.style, "cinematic");
        assert!(job.wants_premium_audio);
        assert_eq!(job.narration_script(), "Hello world");
    }

    #[test]
    fn test_status_view_from_job() {
        let job = GenerateRequest::new("p").into_job().unwrap();
        let view = JobStatusView::from(&job);
        assert_eq!(view.id, job.id);
        assert_eq!(view.status, JobStatus::Queued);
        assert!(view.final_artifact_path.is_none());
    }
}
