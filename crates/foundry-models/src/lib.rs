//! Shared data models for the Foundry generation pipeline.
//!
//! This crate provides Serde-serializable types for:
//! - Jobs, job identifiers and the job status state machine
//! - Submission requests and polling views
//! - The artifact naming convention keyed by job id

pub mod artifacts;
pub mod job;
pub mod request;

// Re-export common types
pub use artifacts::{job_id_from_final_name, ArtifactPaths, FINAL_SUFFIX, RAW_VIDEO_SUFFIX};
pub use job::{InvalidTransition, Job, JobId, JobStatus, DEFAULT_STYLE};
pub use request::{GenerateRequest, JobStatusView, RequestError};
