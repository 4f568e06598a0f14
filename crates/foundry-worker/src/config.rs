//! Worker configuration.

use std::path::PathBuf;
use std::time::Duration;

use tokio::fs;

use foundry_genai::{AudioConfig, VisualConfig};
use foundry_media::StitchConfig;
use foundry_models::{ArtifactPaths, JobId};
use foundry_queue::QueueConfig;

use crate::error::WorkerResult;

/// Worker configuration.
#[derive(Debug, Clone)]
pub struct WorkerConfig {
    /// Final artifacts
    pub output_dir: PathBuf,
    /// Raw video and narration
    pub temp_dir: PathBuf,
    /// JSON job store directory; in-memory store when unset
    pub store_dir: Option<PathBuf>,
    /// Maximum concurrent jobs
    pub max_concurrent_jobs: usize,
    /// Graceful shutdown timeout
    pub shutdown_timeout: Duration,
    /// How often the store is scanned for queued jobs that never reached the queue
    pub recovery_interval: Duration,
    /// Prometheus listener port
    pub metrics_port: Option<u16>,
    pub visual: VisualConfig,
    pub audio: AudioConfig,
    pub stitch: StitchConfig,
    pub queue: QueueConfig,
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self {
            output_dir: PathBuf::from("local_storage/outputs"),
            temp_dir: PathBuf::from("local_storage/temp"),
            store_dir: None,
            max_concurrent_jobs: 2,
            shutdown_timeout: Duration::from_secs(30),
            recovery_interval: Duration::from_secs(30),
            metrics_port: None,
            visual: VisualConfig::default(),
            audio: AudioConfig::default(),
            stitch: StitchConfig::default(),
            queue: QueueConfig::default(),
        }
    }
}

impl WorkerConfig {
    /// Create config from environment variables.
    pub fn from_env() -> Self {
        Self {
            output_dir: std::env::var("FOUNDRY_OUTPUT_DIR")
                .map(PathBuf::from)
                .unwrap_or_else(|_| PathBuf::from("local_storage/outputs")),
            temp_dir: std::env::var("FOUNDRY_TEMP_DIR")
                .map(PathBuf::from)
                .unwrap_or_else(|_| PathBuf::from("local_storage/temp")),
            store_dir: std::env::var("FOUNDRY_STORE_DIR")
                .ok()
                .filter(|s| !s.trim().is_empty())
                .map(PathBuf::from),
            max_concurrent_jobs: std::env::var("WORKER_MAX_JOBS")
                .ok()
                .and_then(|s| s.parse().ok())
                .filter(|&n: &usize| n > 0)
                .unwrap_or(2),
            shutdown_timeout: Duration::from_secs(
                std::env::var("WORKER_SHUTDOWN_TIMEOUT")
                    .ok()
                    .and_then(|s| s.parse().ok())
                    .unwrap_or(30),
            ),
            recovery_interval: Duration::from_secs(
                std::env::var("WORKER_RECOVERY_INTERVAL_SECS")
                    .ok()
                    .and_then(|s| s.parse().ok())
                    .filter(|&n: &u64| n > 0)
                    .unwrap_or(30),
            ),
            metrics_port: std::env::var("METRICS_PORT")
                .ok()
                .and_then(|s| s.parse().ok()),
            visual: VisualConfig::from_env(),
            audio: AudioConfig::from_env(),
            stitch: StitchConfig::from_env(),
            queue: QueueConfig::from_env(),
        }
    }

    /// Create the output and temp directories.
    pub async fn ensure_dirs(&self) -> WorkerResult<()> {
        fs::create_dir_all(&self.output_dir).await?;
        fs::create_dir_all(&self.temp_dir).await?;
        Ok(())
    }

    /// Artifact locations of a job.
    pub fn artifact_paths(&self, id: &JobId) -> ArtifactPaths {
        ArtifactPaths::for_job(id, &self.temp_dir, &self.output_dir)
    }

    /// One-line startup summary. Credentials are reported by presence only.
    pub fn summary(&self) -> String {
        format!(
            "max_jobs={} mock_video={} mock_audio={} refine_key={} premium_key={} output_dir={} temp_dir={} store={}",
            self.max_concurrent_jobs,
            self.visual.mock,
            self.audio.mock,
            self.visual.gemini_api_key.is_some(),
            self.audio.premium.is_some(),
            self.output_dir.display(),
            self.temp_dir.display(),
            self.store_dir
                .as_ref()
                .map(|d| d.display().to_string())
                .unwrap_or_else(|| "memory".to_string()),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;
    use tempfile::TempDir;

    #[test]
    fn test_defaults() {
        let config = WorkerConfig::default();
        assert_eq!(config.max_concurrent_jobs, 2);
        assert_eq!(config.output_dir, PathBuf::from("local_storage/outputs"));
        assert!(config.visual.mock);
        assert!(!config.audio.mock);
    }

    #[test]
    #[serial]
    fn test_from_env_overrides() {
        std::env::set_var("FOUNDRY_OUTPUT_DIR", "/srv/out");
        std::env::set_var("WORKER_MAX_JOBS", "0");
        std::env::set_var("USE_MOCK_VEO", "false");
        std::env::set_var("GEMINI_API_KEY", "secret-value");

        let config = WorkerConfig::from_env();

        std::env::remove_var("FOUNDRY_OUTPUT_DIR");
        std::env::remove_var("WORKER_MAX_JOBS");
        std::env::remove_var("USE_MOCK_VEO");
        std::env::remove_var("GEMINI_API_KEY");

        assert_eq!(config.output_dir, PathBuf::from("/srv/out"));
        assert_eq!(config.max_concurrent_jobs, 2);
        assert!(!config.visual.mock);
        assert!(config.summary().contains("refine_key=true"));
        assert!(!config.summary().contains("secret-value"));
    }

    #[tokio::test]
    async fn test_ensure_dirs_and_paths() {
        let dir = TempDir::new().unwrap();
        let config = WorkerConfig {
            output_dir: dir.path().join("out"),
            temp_dir: dir.path().join("tmp"),
            ..WorkerConfig::default()
        };

        config.ensure_dirs().await.unwrap();
        assert!(config.output_dir.is_dir());
        assert!(config.temp_dir.is_dir());

        let paths = config.artifact_paths(&JobId::from_string("abc"));
        assert_eq!(paths.final_output, dir.path().join("out").join("abc_final.mp4"));
        assert_eq!(paths.raw_video, dir.path().join("tmp").join("abc_raw.mp4"));
    }
}
