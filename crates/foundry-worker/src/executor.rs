//! Job executor.
//!
//! Pulls job ids from the queue and runs each on its own task, bounded by
//! a semaphore. A background sweep re-enqueues jobs still `Queued` in the
//! store (submitted while the queue was full, or left over from a previous
//! process).

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{watch, Semaphore};
use tracing::{debug, info, warn};

use foundry_models::JobStatus;
use foundry_queue::{JobQueue, JobReceiver, QueueError};
use foundry_store::JobStore;

use crate::config::WorkerConfig;
use crate::metrics;
use crate::orchestrator::Orchestrator;

/// Job executor that processes jobs from the queue.
pub struct JobExecutor {
    orchestrator: Arc<Orchestrator>,
    queue: JobQueue,
    job_semaphore: Arc<Semaphore>,
    max_concurrent_jobs: usize,
    shutdown: watch::Sender<bool>,
    shutdown_timeout: Duration,
    recovery_interval: Duration,
}

impl JobExecutor {
    pub fn new(config: &WorkerConfig, orchestrator: Arc<Orchestrator>, queue: JobQueue) -> Self {
        let max_concurrent_jobs = config.max_concurrent_jobs.max(1);
        let (shutdown, _) = watch::channel(false);

        Self {
            orchestrator,
            queue,
            job_semaphore: Arc::new(Semaphore::new(max_concurrent_jobs)),
            max_concurrent_jobs,
            shutdown,
            shutdown_timeout: config.shutdown_timeout,
            recovery_interval: config.recovery_interval,
        }
    }

    /// Number of jobs currently running.
    pub fn in_flight(&self) -> usize {
        self.max_concurrent_jobs - self.job_semaphore.available_permits()
    }

    pub fn queue(&self) -> &JobQueue {
        &self.queue
    }

    /// Signal shutdown.
    pub fn shutdown(&self) {
        let _ = self.shutdown.send(true);
    }

    /// Enqueue every job the store still has as `Queued`.
    pub async fn recover_queued(&self) -> usize {
        recover_queued(self.orchestrator.store().as_ref(), &self.queue).await
    }

    /// Consume the queue until shutdown, then wait for running jobs.
    pub async fn run(&self, mut receiver: JobReceiver) {
        info!(
            "Starting job executor with {} max concurrent jobs",
            self.max_concurrent_jobs
        );

        let recovery_task = {
            let store = Arc::clone(self.orchestrator.store());
            let queue = self.queue.clone();
            let interval = self.recovery_interval;
            let mut shutdown_rx = self.shutdown.subscribe();

            tokio::spawn(async move {
                let mut ticker = tokio::time::interval(interval);
                loop {
                    tokio::select! {
                        _ = wait_for_shutdown(&mut shutdown_rx) => break,
                        _ = ticker.tick() => {
                            let n = recover_queued(store.as_ref(), &queue).await;
                            if n > 0 {
                                info!("Recovered {} queued jobs from the store", n);
                            }
                        }
                    }
                }
            })
        };

        let mut shutdown_rx = self.shutdown.subscribe();
        loop {
            let ticket = tokio::select! {
                _ = wait_for_shutdown(&mut shutdown_rx) => break,
                ticket = receiver.recv() => match ticket {
                    Some(t) => t,
                    None => break,
                },
            };

            let permit = tokio::select! {
                _ = wait_for_shutdown(&mut shutdown_rx) => break,
                permit = Arc::clone(&self.job_semaphore).acquire_owned() => match permit {
                    Ok(p) => p,
                    Err(_) => break,
                },
            };

            let orchestrator = Arc::clone(&self.orchestrator);
            let semaphore = Arc::clone(&self.job_semaphore);
            let max = self.max_concurrent_jobs;
            metrics::set_jobs_in_flight(max - semaphore.available_permits());

            tokio::spawn(async move {
                let outcome = orchestrator.run(ticket.id()).await;
                debug!(job_id = %ticket.id(), ?outcome, "Run finished");
                drop(ticket);
                drop(permit);
                metrics::set_jobs_in_flight(max - semaphore.available_permits());
            });
        }

        info!("Shutdown signal received, stopping executor");
        receiver.close();
        recovery_task.abort();

        info!("Waiting for in-flight jobs to complete...");
        if tokio::time::timeout(self.shutdown_timeout, self.wait_for_jobs())
            .await
            .is_err()
        {
            warn!(
                "{} jobs still running after {}s shutdown timeout",
                self.in_flight(),
                self.shutdown_timeout.as_secs()
            );
        }

        info!("Job executor stopped");
    }

    /// Wait for all in-flight jobs to complete.
    async fn wait_for_jobs(&self) {
        loop {
            if self.job_semaphore.available_permits() == self.max_concurrent_jobs {
                break;
            }
            tokio::time::sleep(Duration::from_millis(100)).await;
        }
    }
}

/// Resolve once shutdown has been signalled (or the sender is gone).
async fn wait_for_shutdown(rx: &mut watch::Receiver<bool>) {
    loop {
        if *rx.borrow_and_update() {
            return;
        }
        if rx.changed().await.is_err() {
            return;
        }
    }
}

async fn recover_queued(store: &dyn JobStore, queue: &JobQueue) -> usize {
    let jobs = match store.list_by_status(JobStatus::Queued).await {
        Ok(jobs) => jobs,
        Err(e) => {
            warn!("Failed to list queued jobs: {}", e);
            return 0;
        }
    };

    let mut enqueued = 0;
    for job in jobs {
        match queue.enqueue(job.id.clone()) {
            Ok(()) => enqueued += 1,
            Err(QueueError::Duplicate(_)) => {}
            Err(QueueError::Full(_)) => {
                debug!("Queue full, deferring recovery of remaining jobs");
                break;
            }
            Err(QueueError::Closed) => break,
        }
    }
    enqueued
}
