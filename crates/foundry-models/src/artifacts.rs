//! Artifact naming convention.
//!
//! Every file a job produces is keyed by its id so concurrent jobs never
//! collide. Recovery tooling scans the output directory for these names,
//! so they must stay stable:
//!
//! - `<temp_dir>/<id>_raw.mp4`: raw generated video
//! - `<temp_dir>/<id>.mp3`: narration audio
//! - `<output_dir>/<id>_final.mp4`: final artifact

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::JobId;

/// Suffix of the raw video file name.
pub const RAW_VIDEO_SUFFIX: &str = "_raw.mp4";
/// Extension of the narration file name.
pub const AUDIO_EXTENSION: &str = "mp3";
/// Suffix of the final artifact file name.
pub const FINAL_SUFFIX: &str = "_final.mp4";

/// Locations of the artifacts for one job.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ArtifactPaths {
    pub raw_video: PathBuf,
    pub audio: PathBuf,
    pub final_output: PathBuf,
}

impl ArtifactPaths {
    /// Build the artifact paths of a job.
    pub fn for_job(id: &JobId, temp_dir: impl AsRef<Path>, output_dir: impl AsRef<Path>) -> Self {
        let temp_dir = temp_dir.as_ref();
        Self {
            raw_video: temp_dir.join(format!("{}{}", id, RAW_VIDEO_SUFFIX)),
            audio: temp_dir.join(format!("{}.{}", id, AUDIO_EXTENSION)),
            final_output: output_dir.as_ref().join(format!("{}{}", id, FINAL_SUFFIX)),
        }
    }
}

/// Extract the job id from a final artifact file name (`<id>_final.mp4`).
pub fn job_id_from_final_name(file_name: &str) -> Option<JobId> {
    file_name
        .strip_suffix(FINAL_SUFFIX)
        .filter(|id| !id.is_empty())
        .map(JobId::from_string)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_paths_are_keyed_by_job_id() {
        let id = JobId::from_string("job-1");
        let paths = ArtifactPaths::for_job(&id, "/tmp/foundry", "/srv/outputs");

        assert_eq!(paths.raw_video, PathBuf::from("/tmp/foundry/job-1_raw.mp4"));
        assert_eq!(paths.audio, PathBuf::from("/tmp/foundry/job-1.mp3"));
        assert_eq!(paths.final_output, PathBuf::from("/srv/outputs/job-1_final.mp4"));
    }

    #[test]
    fn test_job_id_from_final_name() {
        assert_eq!(
            job_id_from_final_name("job-1_final.mp4"),
            Some(JobId::from_string("job-1"))
        );
        assert_eq!(job_id_from_final_name("job-1_raw.mp4"), None);
        assert_eq!(job_id_from_final_name("_final.mp4"), None);
        assert_eq!(job_id_from_final_name("job-1_final.tmp.mp4"), None);
    }
}
