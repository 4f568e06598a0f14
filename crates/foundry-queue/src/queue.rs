//! Bounded job queue with an in-flight set.
//!
//! An id enters the in-flight set when it is enqueued and leaves it when
//! the [`JobTicket`] handed to the consumer is dropped, i.e. after the run
//! finishes. While it is in the set, enqueueing it again is rejected.

use std::collections::HashSet;
use std::sync::{Arc, Mutex, MutexGuard};

use tokio::sync::mpsc;
use tracing::debug;

use foundry_models::JobId;

use crate::error::{QueueError, QueueResult};

/// Queue configuration.
#[derive(Debug, Clone)]
pub struct QueueConfig {
    /// Maximum number of waiting jobs
    pub capacity: usize,
}

impl Default for QueueConfig {
    fn default() -> Self {
        Self { capacity: 64 }
    }
}

impl QueueConfig {
    /// Create config from environment variables.
    pub fn from_env() -> Self {
        Self {
            capacity: std::env::var("WORKER_QUEUE_CAPACITY")
                .ok()
                .and_then(|s| s.parse().ok())
                .filter(|&c: &usize| c > 0)
                .unwrap_or(64),
        }
    }
}

type InFlight = Arc<Mutex<HashSet<JobId>>>;

fn lock(set: &InFlight) -> MutexGuard<'_, HashSet<JobId>> {
    // The set is only touched in short non-panicking sections.
    set.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

/// Producer side of the queue. Cheap to clone.
#[derive(Debug, Clone)]
pub struct JobQueue {
    sender: mpsc::Sender<JobId>,
    in_flight: InFlight,
    capacity: usize,
}

/// Consumer side of the queue.
#[derive(Debug)]
pub struct JobReceiver {
    receiver: mpsc::Receiver<JobId>,
    in_flight: InFlight,
}

/// A dequeued job id. Releases the id from the in-flight set on drop.
#[derive(Debug)]
pub struct JobTicket {
    id: JobId,
    in_flight: InFlight,
}

impl JobQueue {
    /// Create a queue and its single consumer.
    pub fn new(config: QueueConfig) -> (JobQueue, JobReceiver) {
        let capacity = config.capacity.max(1);
        let (sender, receiver) = mpsc::channel(capacity);
        let in_flight: InFlight = Arc::new(Mutex::new(HashSet::new()));

        (
            JobQueue {
                sender,
                in_flight: Arc::clone(&in_flight),
                capacity,
            },
            JobReceiver {
                receiver,
                in_flight,
            },
        )
    }

    /// Enqueue a job id.
    ///
    /// Fails with [`QueueError::Duplicate`] while the id is queued or
    /// running, and with [`QueueError::Full`] when the queue is at capacity.
    pub fn enqueue(&self, id: JobId) -> QueueResult<()> {
        let mut set = lock(&self.in_flight);
        if set.contains(&id) {
            return Err(QueueError::Duplicate(id));
        }

        match self.sender.try_send(id.clone()) {
            Ok(()) => {
                debug!(job_id = %id, "Enqueued job");
                set.insert(id);
                Ok(())
            }
            Err(mpsc::error::TrySendError::Full(_)) => Err(QueueError::Full(self.capacity)),
            Err(mpsc::error::TrySendError::Closed(_)) => Err(QueueError::Closed),
        }
    }

    /// Whether the id is currently queued or running.
    pub fn contains(&self, id: &JobId) -> bool {
        lock(&self.in_flight).contains(id)
    }

    /// Number of ids queued or running.
    pub fn in_flight(&self) -> usize {
        lock(&self.in_flight).len()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }
}

impl JobReceiver {
    /// Wait for the next job. `None` once every producer is dropped and the
    /// queue is drained.
    pub async fn recv(&mut self) -> Option<JobTicket> {
        let id = self.receiver.recv().await?;
        Some(JobTicket {
            id,
            in_flight: Arc::clone(&self.in_flight),
        })
    }

    /// Stop accepting new jobs; already queued ids can still be received.
    pub fn close(&mut self) {
        self.receiver.close();
    }
}

impl JobTicket {
    pub fn id(&self) -> &JobId {
        &self.id
    }
}

impl Drop for JobTicket {
    fn drop(&mut self) {
        lock(&self.in_flight).remove(&self.id);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn queue(capacity: usize) -> (JobQueue, JobReceiver) {
        JobQueue::new(QueueConfig { capacity })
    }

    #[tokio::test]
    async fn test_fifo_delivery() {
        let (queue, mut rx) = queue(4);
        let a = JobId::from_string("a");
        let b = JobId::from_string("b");

        queue.enqueue(a.clone()).unwrap();
        queue.enqueue(b.clone()).unwrap();

        assert_eq!(rx.recv().await.unwrap().id(), &a);
        assert_eq!(rx.recv().await.unwrap().id(), &b);
    }

    #[tokio::test]
    async fn test_duplicate_rejected_until_ticket_dropped() {
        let (queue, mut rx) = queue(4);
        let id = JobId::from_string("job-1");

        queue.enqueue(id.clone()).unwrap();
        assert!(matches!(
            queue.enqueue(id.clone()),
            Err(QueueError::Duplicate(_))
        ));

        // Dequeued but still running
        let ticket = rx.recv().await.unwrap();
        assert!(queue.contains(&id));
        assert!(matches!(
            queue.enqueue(id.clone()),
            Err(QueueError::Duplicate(_))
        ));

        drop(ticket);
        assert!(!queue.contains(&id));
        queue.enqueue(id).unwrap();
    }

    #[tokio::test]
    async fn test_full_queue_does_not_track_id() {
        let (queue, _rx) = queue(1);
        queue.enqueue(JobId::from_string("first")).unwrap();

        let second = JobId::from_string("second");
        assert!(matches!(
            queue.enqueue(second.clone()),
            Err(QueueError::Full(1))
        ));
        assert!(!queue.contains(&second));
        assert_eq!(queue.in_flight(), 1);
    }

    #[tokio::test]
    async fn test_closed_queue() {
        let (queue, rx) = queue(2);
        drop(rx);
        assert!(matches!(
            queue.enqueue(JobId::new()),
            Err(QueueError::Closed)
        ));
        assert_eq!(queue.in_flight(), 0);
    }

    #[tokio::test]
    async fn test_recv_ends_when_producers_dropped() {
        let (queue, mut rx) = queue(2);
        queue.enqueue(JobId::from_string("last")).unwrap();
        drop(queue);

        assert!(rx.recv().await.is_some());
        assert!(rx.recv().await.is_none());
    }
}
