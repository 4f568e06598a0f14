//! Job orchestration worker.
//!
//! This crate provides:
//! - The per-job pipeline (refine, render, narrate, stitch)
//! - A bounded worker pool fed by the in-process queue
//! - The submission and polling service
//! - Logging and metrics setup for the binaries

pub mod config;
pub mod error;
pub mod executor;
pub mod logging;
pub mod metrics;
pub mod orchestrator;
pub mod service;

pub use config::WorkerConfig;
pub use error::{WorkerError, WorkerResult};
pub use executor::JobExecutor;
pub use logging::{init_tracing, JobLogger};
pub use orchestrator::{Orchestrator, RunOutcome, MOCK_FINAL_PLACEHOLDER};
pub use service::{JobService, DEFAULT_HISTORY_LIMIT};
