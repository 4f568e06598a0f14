//! JSON file job store.
//!
//! Each job is stored as `<dir>/<id>.json`. Writes go to a hidden
//! temporary file in the same directory and are renamed into place, so a
//! reader never observes a half-written record.
//!
//! The store keeps an id-to-status index built by one scan at open and
//! updated on every commit, so [`JobStore::list_by_status`] only parses the
//! matching documents. The index assumes this process is the only writer of
//! the directory. [`JobStore::list_recent`] still reads every document.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};

use async_trait::async_trait;
use tokio::fs;
use tokio::sync::RwLock;
use tracing::{debug, warn};

use foundry_models::{Job, JobId, JobStatus};

use crate::error::{StoreError, StoreResult};
use crate::{oldest_first, page, JobStore};

const EXTENSION: &str = "json";

/// Job store persisting one JSON document per job.
#[derive(Debug)]
pub struct FileJobStore {
    dir: PathBuf,
    write_seq: AtomicU64,
    statuses: RwLock<HashMap<JobId, JobStatus>>,
}

impl FileJobStore {
    /// Open (and create if needed) a store rooted at `dir`.
    pub async fn open(dir: impl Into<PathBuf>) -> StoreResult<Self> {
        let dir = dir.into();
        fs::create_dir_all(&dir).await?;
        let store = Self {
            dir,
            write_seq: AtomicU64::new(0),
            statuses: RwLock::new(HashMap::new()),
        };

        let index: HashMap<JobId, JobStatus> = store
            .read_all()
            .await?
            .into_iter()
            .map(|job| (job.id, job.status))
            .collect();
        debug!("Indexed {} job records in {}", index.len(), store.dir.display());
        *store.statuses.write().await = index;

        Ok(store)
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn path_for(&self, id: &JobId) -> StoreResult<PathBuf> {
        validate_id(id)?;
        Ok(self.dir.join(format!("{}.{}", id.as_str(), EXTENSION)))
    }

    async fn read_all(&self) -> StoreResult<Vec<Job>> {
        let mut jobs = Vec::new();
        let mut entries = fs::read_dir(&self.dir).await?;

        while let Some(entry) = entries.next_entry().await? {
            let path = entry.path();
            let is_record = path.extension().is_some_and(|e| e == EXTENSION)
                && !path
                    .file_name()
                    .is_some_and(|n| n.to_string_lossy().starts_with('.'));
            if !is_record {
                continue;
            }

            match fs::read(&path).await {
                Ok(bytes) => match serde_json::from_slice::<Job>(&bytes) {
                    Ok(job) => jobs.push(job),
                    Err(e) => warn!("Skipping unreadable job record {}: {}", path.display(), e),
                },
                // Removed between listing and reading
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
                Err(e) => return Err(e.into()),
            }
        }

        Ok(jobs)
    }
}

/// Ids become file names, so only a conservative character set is allowed.
fn validate_id(id: &JobId) -> StoreResult<()> {
    let s = id.as_str();
    let valid = !s.is_empty()
        && s.len() <= 128
        && s
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_');
    if valid {
        Ok(())
    } else {
        Err(StoreError::invalid_id(s))
    }
}

#[async_trait]
impl JobStore for FileJobStore {
    async fn load(&self, id: &JobId) -> StoreResult<Option<Job>> {
        let path = self.path_for(id)?;
        match fs::read(&path).await {
            Ok(bytes) => Ok(Some(serde_json::from_slice(&bytes)?)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    async fn commit(&self, job: &Job) -> StoreResult<()> {
        let path = self.path_for(&job.id)?;
        let bytes = serde_json::to_vec_pretty(job)?;

        let seq = self.write_seq.fetch_add(1, Ordering::Relaxed);
        let tmp = self.dir.join(format!(".{}.{}.tmp", job.id.as_str(), seq));

        if let Err(e) = fs::write(&tmp, &bytes).await {
            let _ = fs::remove_file(&tmp).await;
            return Err(e.into());
        }
        if let Err(e) = fs::rename(&tmp, &path).await {
            let _ = fs::remove_file(&tmp).await;
            return Err(e.into());
        }

        self.statuses.write().await.insert(job.id.clone(), job.status);
        debug!(job_id = %job.id, status = %job.status, "Committed job record");
        Ok(())
    }

    async fn list_recent(&self, offset: usize, limit: usize) -> StoreResult<Vec<Job>> {
        Ok(page(self.read_all().await?, offset, limit))
    }

    async fn list_by_status(&self, status: JobStatus) -> StoreResult<Vec<Job>> {
        let ids: Vec<JobId> = self
            .statuses
            .read()
            .await
            .iter()
            .filter(|(_, s)| **s == status)
            .map(|(id, _)| id.clone())
            .collect();

        let mut jobs = Vec::with_capacity(ids.len());
        for id in ids {
            match self.load(&id).await {
                Ok(Some(job)) if job.status == status => jobs.push(job),
                Ok(_) => {}
                Err(StoreError::Json(e)) => {
                    warn!(job_id = %id, "Skipping unreadable job record: {}", e)
                }
                Err(e) => return Err(e),
            }
        }
        Ok(oldest_first(jobs))
    }
}
