//! In-process job queue.
//!
//! This crate provides:
//! - A bounded queue of job ids feeding the worker pool
//! - Per-id deduplication covering both queued and running jobs

pub mod error;
pub mod queue;

pub use error::{QueueError, QueueResult};
pub use queue::{JobQueue, JobReceiver, JobTicket, QueueConfig};
