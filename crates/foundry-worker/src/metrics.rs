//! Prometheus metrics for the worker.

use std::net::SocketAddr;

use metrics::{counter, gauge, histogram};
use metrics_exporter_prometheus::PrometheusBuilder;

use foundry_models::JobStatus;

use crate::error::{WorkerError, WorkerResult};

/// Install the Prometheus recorder with an HTTP listener on `port`.
pub fn init_metrics(port: u16) -> WorkerResult<()> {
    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    PrometheusBuilder::new()
        .with_http_listener(addr)
        .install()
        .map_err(|e| WorkerError::config_error(format!("metrics exporter: {}", e)))
}

/// Metric names as constants for consistency.
pub mod names {
    pub const JOBS_SUBMITTED_TOTAL: &str = "foundry_jobs_submitted_total";
    pub const JOBS_FINISHED_TOTAL: &str = "foundry_jobs_finished_total";
    pub const JOB_DURATION_SECONDS: &str = "foundry_job_duration_seconds";
    pub const JOBS_IN_FLIGHT: &str = "foundry_jobs_in_flight";
    pub const VIDEO_FAILURES_TOTAL: &str = "foundry_video_failures_total";
}

pub fn record_job_submitted() {
    counter!(names::JOBS_SUBMITTED_TOTAL).increment(1);
}

/// Record a job reaching a terminal status.
pub fn record_job_finished(status: JobStatus, duration_secs: f64) {
    counter!(names::JOBS_FINISHED_TOTAL, "status" => status.as_str()).increment(1);
    histogram!(names::JOB_DURATION_SECONDS, "status" => status.as_str()).record(duration_secs);
}

pub fn record_video_failure() {
    counter!(names::VIDEO_FAILURES_TOTAL).increment(1);
}

pub fn set_jobs_in_flight(count: usize) {
    gauge!(names::JOBS_IN_FLIGHT).set(count as f64);
}
