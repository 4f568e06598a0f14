//! Job record persistence.
//!
//! This crate provides:
//! - The [`JobStore`] trait used by the service and the orchestrator
//! - An in-memory store for tests and single-process runs
//! - A JSON file store, one document per job

pub mod error;
pub mod file;
pub mod memory;

use async_trait::async_trait;
use foundry_models::{Job, JobId, JobStatus};

pub use error::{StoreError, StoreResult};
pub use file::FileJobStore;
pub use memory::InMemoryJobStore;

/// Durable job records keyed by id.
///
/// `commit` replaces the whole record; callers own a job exclusively for
/// the duration of a run, so there is no merge.
#[async_trait]
pub trait JobStore: Send + Sync {
    /// Fetch a job. `Ok(None)` when the id is unknown.
    async fn load(&self, id: &JobId) -> StoreResult<Option<Job>>;

    /// Insert or replace a job.
    async fn commit(&self, job: &Job) -> StoreResult<()>;

    /// Jobs ordered newest first.
    async fn list_recent(&self, offset: usize, limit: usize) -> StoreResult<Vec<Job>>;

    /// All jobs currently in `status`, oldest first.
    async fn list_by_status(&self, status: JobStatus) -> StoreResult<Vec<Job>>;
}

/// Sort newest first, breaking ties by id for a stable order.
pub(crate) fn sort_newest_first(jobs: &mut [Job]) {
    jobs.sort_by(|a, b| {
        b.created_at
            .cmp(&a.created_at)
            .then_with(|| a.id.as_str().cmp(b.id.as_str()))
    });
}

pub(crate) fn page(mut jobs: Vec<Job>, offset: usize, limit: usize) -> Vec<Job> {
    sort_newest_first(&mut jobs);
    jobs.into_iter().skip(offset).take(limit).collect()
}

pub(crate) fn oldest_first(mut jobs: Vec<Job>) -> Vec<Job> {
    sort_newest_first(&mut jobs);
    jobs.reverse();
    jobs
}
