//! Job submission and polling.

use std::sync::Arc;
use std::time::Duration;

use tracing::{info, warn};

use foundry_models::{GenerateRequest, Job, JobId, JobStatusView};
use foundry_queue::{JobQueue, QueueError};
use foundry_store::JobStore;

use crate::error::WorkerResult;
use crate::metrics;

/// Default page size for [`JobService::history`].
pub const DEFAULT_HISTORY_LIMIT: usize = 20;

/// Front door for clients: submit jobs, poll status, list history.
#[derive(Clone)]
pub struct JobService {
    store: Arc<dyn JobStore>,
    queue: JobQueue,
}

impl JobService {
    pub fn new(store: Arc<dyn JobStore>, queue: JobQueue) -> Self {
        Self { store, queue }
    }

    /// Create a `Queued` job and schedule it. Returns as soon as the job is
    /// recorded; the outcome is observed by polling [`JobService::status`].
    pub async fn submit(&self, request: GenerateRequest) -> WorkerResult<JobId> {
        let job = request.into_job()?;
        self.store.commit(&job).await?;

        match self.queue.enqueue(job.id.clone()) {
            // The recovery sweep may have picked it up between commit and enqueue
            Ok(()) | Err(QueueError::Duplicate(_)) => {}
            // Left Queued in the store; the recovery sweep schedules it later
            Err(QueueError::Full(capacity)) => {
                warn!(
                    job_id = %job.id,
                    "Queue at capacity ({}), job deferred to recovery sweep",
                    capacity
                );
            }
            Err(e) => return Err(e.into()),
        }

        metrics::record_job_submitted();
        info!(job_id = %job.id, style = %job.style, "Job queued");
        Ok(job.id)
    }

    /// Current status of a job, `None` if unknown.
    pub async fn status(&self, id: &JobId) -> WorkerResult<Option<JobStatusView>> {
        Ok(self.store.load(id).await?.as_ref().map(JobStatusView::from))
    }

    /// Full job record, `None` if unknown.
    pub async fn job(&self, id: &JobId) -> WorkerResult<Option<Job>> {
        Ok(self.store.load(id).await?)
    }

    /// Jobs newest first. `limit` defaults to [`DEFAULT_HISTORY_LIMIT`].
    pub async fn history(&self, offset: usize, limit: Option<usize>) -> WorkerResult<Vec<Job>> {
        let limit = limit.unwrap_or(DEFAULT_HISTORY_LIMIT);
        Ok(self.store.list_recent(offset, limit).await?)
    }

    /// Poll until the job reaches a terminal status.
    pub async fn wait_for_terminal(&self, id: &JobId, poll_interval: Duration) -> WorkerResult<Option<Job>> {
        loop {
            match self.store.load(id).await? {
                Some(job) if job.status.is_terminal() => return Ok(Some(job)),
                Some(_) => tokio::time::sleep(poll_interval).await,
                None => return Ok(None),
            }
        }
    }
}
