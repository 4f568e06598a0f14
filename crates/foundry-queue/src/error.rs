//! Queue error types.

use thiserror::Error;

use foundry_models::JobId;

pub type QueueResult<T> = Result<T, QueueError>;

#[derive(Debug, Error)]
pub enum QueueError {
    #[error("Job {0} is already queued or running")]
    Duplicate(JobId),

    #[error("Queue is full (capacity {0})")]
    Full(usize),

    #[error("Queue is closed")]
    Closed,
}
