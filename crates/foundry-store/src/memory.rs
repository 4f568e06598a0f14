//! In-memory job store.

use std::collections::HashMap;

use async_trait::async_trait;
use tokio::sync::RwLock;

use foundry_models::{Job, JobId, JobStatus};

use crate::error::StoreResult;
use crate::{oldest_first, page, JobStore};

/// Job store backed by a map. Contents are lost on restart.
#[derive(Debug, Default)]
pub struct InMemoryJobStore {
    jobs: RwLock<HashMap<JobId, Job>>,
}

impl InMemoryJobStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn len(&self) -> usize {
        self.jobs.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.jobs.read().await.is_empty()
    }
}

#[async_trait]
impl JobStore for InMemoryJobStore {
    async fn load(&self, id: &JobId) -> StoreResult<Option<Job>> {
        Ok(self.jobs.read().await.get(id).cloned())
    }

    async fn commit(&self, job: &Job) -> StoreResult<()> {
        self.jobs.write().await.insert(job.id.clone(), job.clone());
        Ok(())
    }

    async fn list_recent(&self, offset: usize, limit: usize) -> StoreResult<Vec<Job>> {
        let jobs = self.jobs.read().await.values().cloned().collect();
        Ok(page(jobs, offset, limit))
    }

    async fn list_by_status(&self, status: JobStatus) -> StoreResult<Vec<Job>> {
        let jobs = self
            .jobs
            .read()
            .await
            .values()
            .filter(|j| j.status == status)
            .cloned()
            .collect();
        Ok(oldest_first(jobs))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn job_at(prompt: &str, offset_secs: i64) -> Job {
        let mut job = Job::new(prompt, None, "cinematic", false);
        job.created_at = job.created_at + Duration::seconds(offset_secs);
        job
    }

    #[tokio::test]
    async fn test_commit_and_load() {
        let store = InMemoryJobStore::new();
        let mut job = job_at("a red fox", 0);
        store.commit(&job).await.unwrap();

        job.start().unwrap();
        store.commit(&job).await.unwrap();

        let loaded = store.load(&job.id).await.unwrap().unwrap();
        assert_eq!(loaded.status, JobStatus::Processing);
        assert_eq!(store.len().await, 1);
        assert!(store.load(&JobId::new()).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_list_recent_newest_first() {
        let store = InMemoryJobStore::new();
        for (i, prompt) in ["first", "second", "third"].iter().enumerate() {
            store.commit(&job_at(prompt, i as i64)).await.unwrap();
        }

        let recent = store.list_recent(0, 2).await.unwrap();
        let prompts: Vec<_> = recent.iter().map(|j| j.prompt.as_str()).collect();
        assert_eq!(prompts, vec!["third", "second"]);

        let rest = store.list_recent(2, 20).await.unwrap();
        assert_eq!(rest.len(), 1);
        assert_eq!(rest[0].prompt, "first");
    }

    #[tokio::test]
    async fn test_list_by_status() {
        let store = InMemoryJobStore::new();
        let queued = job_at("queued", 0);
        let mut running = job_at("running", 1);
        running.start().unwrap();

        store.commit(&queued).await.unwrap();
        store.commit(&running).await.unwrap();

        let jobs = store.list_by_status(JobStatus::Queued).await.unwrap();
        assert_eq!(jobs.len(), 1);
        assert_eq!(jobs[0].id, queued.id);
    }
}
