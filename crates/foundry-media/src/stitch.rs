//! Audio/video stitching.
//!
//! The narration is the duration reference: the video is looped without
//! bound and the output stops with the shortest stream, which in practice
//! is the audio. When the narration is missing or too small to be real
//! audio, the video is re-packaged without an audio track instead.

use std::path::Path;

use async_trait::async_trait;
use metrics::counter;
use tokio::fs;
use tracing::{error, info, warn};

use crate::command::{FfmpegCommand, FfmpegRunner};
use crate::error::MediaResult;
use crate::fs_utils::{move_file, partial_path};

/// Audio files at or below this size are treated as missing.
pub const MIN_AUDIO_BYTES: u64 = 100;

const STITCH_TOTAL: &str = "foundry_stitch_total";

/// Result of a stitch call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StitchOutcome {
    /// Video looped under the narration
    WithAudio,
    /// Audio unusable; video copied without an audio track
    SilentVideo,
    /// Encoding failed; no output was placed
    Failed(String),
}

impl StitchOutcome {
    pub fn is_success(&self) -> bool {
        !matches!(self, StitchOutcome::Failed(_))
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            StitchOutcome::WithAudio => "with_audio",
            StitchOutcome::SilentVideo => "silent_video",
            StitchOutcome::Failed(_) => "failed",
        }
    }
}

/// Combines a video artifact and an audio artifact into the final artifact.
#[async_trait]
pub trait MediaStitcher: Send + Sync {
    async fn stitch(&self, video: &Path, audio: &Path, output: &Path) -> StitchOutcome;
}

/// Encoding settings for the stitched output.
#[derive(Debug, Clone)]
pub struct StitchConfig {
    /// FFmpeg executable
    pub ffmpeg_bin: String,
    /// Per-encode timeout
    pub timeout_secs: u64,
    pub video_codec: String,
    pub audio_codec: String,
    pub audio_bitrate: String,
    pub pixel_format: String,
    /// Audio at or below this many bytes is ignored
    pub min_audio_bytes: u64,
}

impl Default for StitchConfig {
    fn default() -> Self {
        Self {
            ffmpeg_bin: "ffmpeg".to_string(),
            timeout_secs: 600,
            video_codec: "libx264".to_string(),
            audio_codec: "aac".to_string(),
            audio_bitrate: "192k".to_string(),
            pixel_format: "yuv420p".to_string(),
            min_audio_bytes: MIN_AUDIO_BYTES,
        }
    }
}

impl StitchConfig {
    /// Create config from environment variables.
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            ffmpeg_bin: std::env::var("FFMPEG_BIN").unwrap_or(defaults.ffmpeg_bin),
            timeout_secs: std::env::var("STITCH_TIMEOUT_SECS")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(defaults.timeout_secs),
            ..defaults
        }
    }
}

/// FFmpeg-backed stitcher.
#[derive(Debug, Clone)]
pub struct FfmpegStitcher {
    config: StitchConfig,
    runner: FfmpegRunner,
}

impl Default for FfmpegStitcher {
    fn default() -> Self {
        Self::new(StitchConfig::default())
    }
}

impl FfmpegStitcher {
    pub fn new(config: StitchConfig) -> Self {
        let runner = FfmpegRunner::new()
            .with_binary(config.ffmpeg_bin.clone())
            .with_timeout(config.timeout_secs);
        Self { config, runner }
    }

    /// Whether the narration file exists and is large enough to be real audio.
    pub async fn audio_is_usable(&self, audio: &Path) -> bool {
        match fs::metadata(audio).await {
            Ok(meta) => meta.is_file() && meta.len() > self.config.min_audio_bytes,
            Err(_) => false,
        }
    }

    /// Re-package the video as-is with no audio track.
    pub fn silent_command(&self, video: &Path, output: &Path) -> FfmpegCommand {
        FfmpegCommand::new(video, output).codec_copy().no_audio()
    }

    /// Loop the video under the narration and stop when the narration ends.
    pub fn mixed_command(&self, video: &Path, audio: &Path, output: &Path) -> FfmpegCommand {
        FfmpegCommand::new(video, output)
            .stream_loop(-1)
            .add_input(audio)
            .shortest()
            .map("0:v:0")
            .map("1:a:0")
            .video_codec(self.config.video_codec.clone())
            .audio_codec(self.config.audio_codec.clone())
            .audio_bitrate(self.config.audio_bitrate.clone())
            .pixel_format(self.config.pixel_format.clone())
    }

    async fn encode(&self, cmd: &FfmpegCommand, output: &Path) -> MediaResult<()> {
        self.runner.run(cmd).await?;
        move_file(cmd.output(), output).await
    }
}

#[async_trait]
impl MediaStitcher for FfmpegStitcher {
    async fn stitch(&self, video: &Path, audio: &Path, output: &Path) -> StitchOutcome {
        let tmp = partial_path(output);

        let (cmd, outcome) = if self.audio_is_usable(audio).await {
            info!("Stitching audio + video into {}", output.display());
            (self.mixed_command(video, audio, &tmp), StitchOutcome::WithAudio)
        } else {
            warn!(
                "Audio missing or empty at {}, creating silent video",
                audio.display()
            );
            (self.silent_command(video, &tmp), StitchOutcome::SilentVideo)
        };

        let outcome = match self.encode(&cmd, output).await {
            Ok(()) => outcome,
            Err(e) => {
                let _ = fs::remove_file(&tmp).await;
                error!("Stitching {} failed: {}", output.display(), e);
                StitchOutcome::Failed(e.to_string())
            }
        };

        counter!(STITCH_TOTAL, "outcome" => outcome.as_str()).increment(1);
        outcome
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn stitcher() -> FfmpegStitcher {
        FfmpegStitcher::default()
    }

    #[tokio::test]
    async fn test_audio_usability_threshold() {
        let dir = TempDir::new().unwrap();
        let small = dir.path().join("small.mp3");
        let exact = dir.path().join("exact.mp3");
        let big = dir.path().join("big.mp3");

        fs::write(&small, b"mock_bytes").await.unwrap();
        fs::write(&exact, vec![0u8; 100]).await.unwrap();
        fs::write(&big, vec![0u8; 101]).await.unwrap();

        let s = stitcher();
        assert!(!s.audio_is_usable(&dir.path().join("missing.mp3")).await);
        assert!(!s.audio_is_usable(&small).await);
        assert!(!s.audio_is_usable(&exact).await);
        assert!(s.audio_is_usable(&big).await);
    }

    #[test]
    fn test_mixed_command_args() {
        let args = stitcher()
            .mixed_command(Path::new("v.mp4"), Path::new("a.mp3"), Path::new("o.mp4"))
            .build_args();
        let joined = args.join(" ");

        assert!(joined.contains("-stream_loop -1 -i v.mp4 -i a.mp3"));
        assert!(joined.contains("-shortest"));
        assert!(joined.contains("-map 0:v:0 -map 1:a:0"));
        assert!(joined.contains("-c:v libx264"));
        assert!(joined.contains("-c:a aac"));
        assert!(joined.contains("-b:a 192k"));
        assert!(joined.contains("-pix_fmt yuv420p"));
        assert!(joined.ends_with("o.mp4"));
    }

    #[test]
    fn test_silent_command_copies_without_audio() {
        let args = stitcher()
            .silent_command(Path::new("v.mp4"), Path::new("o.mp4"))
            .build_args();
        let joined = args.join(" ");

        assert!(joined.contains("-i v.mp4 -c copy -an o.mp4"));
        assert!(!joined.contains("-stream_loop"));
    }

    #[tokio::test]
    async fn test_failed_encode_leaves_no_output() {
        let dir = TempDir::new().unwrap();
        let video = dir.path().join("v.mp4");
        let output = dir.path().join("job_final.mp4");
        fs::write(&video, b"mock").await.unwrap();

        let stitcher = FfmpegStitcher::new(StitchConfig {
            ffmpeg_bin: "definitely-not-ffmpeg-xyz".to_string(),
            ..StitchConfig::default()
        });

        let outcome = stitcher.stitch(&video, &dir.path().join("a.mp3"), &output).await;

        assert!(matches!(outcome, StitchOutcome::Failed(_)));
        assert!(!outcome.is_success());
        assert!(!output.exists());
        assert!(!partial_path(&output).exists());
    }

    #[tokio::test]
    #[ignore = "requires ffmpeg"]
    async fn test_stitch_with_real_ffmpeg() {
        let dir = TempDir::new().unwrap();
        let video = dir.path().join("v.mp4");
        let audio = dir.path().join("a.mp3");
        let output = dir.path().join("job_final.mp4");

        for (args, path) in [
            (vec!["-f", "lavfi", "-i", "testsrc=duration=1:size=64x64:rate=10"], &video),
            (vec!["-f", "lavfi", "-i", "sine=frequency=440:duration=3"], &audio),
        ] {
            let status = tokio::process::Command::new("ffmpeg")
                .arg("-y")
                .args(args)
                .arg(path)
                .status()
                .await
                .unwrap();
            assert!(status.success());
        }

        let outcome = stitcher().stitch(&video, &audio, &output).await;
        assert_eq!(outcome, StitchOutcome::WithAudio);
        assert!(output.exists());

        let silent = dir.path().join("silent_final.mp4");
        let outcome = stitcher()
            .stitch(&video, &dir.path().join("missing.mp3"), &silent)
            .await;
        assert_eq!(outcome, StitchOutcome::SilentVideo);
        assert!(silent.exists());
    }
}
