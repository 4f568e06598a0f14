//! `edge-tts` standard narration.
//!
//! Runs the `edge-tts` command-line synthesizer as a subprocess. The script
//! is handed over through a text file so its length is not bounded by the
//! argument limit. The subprocess writes straight to a temporary sibling of
//! the destination, which is renamed into place once it is known to contain
//! audio.

use std::path::{Path, PathBuf};
use std::process::Stdio;

use async_trait::async_trait;
use tokio::process::Command;
use tracing::{debug, info, warn};

use foundry_media::{move_file, partial_path};

use crate::config::EdgeTtsConfig;
use crate::speech::{SpeechBackend, SpeechFailure, TierOutcome};

/// Keywords in edge-tts stderr that indicate the service was unreachable.
const CONNECTION_MARKERS: &[&str] = &[
    "connection",
    "connect",
    "timed out",
    "timeout",
    "network",
    "name resolution",
    "websocket",
];

/// Classify a failed run by its stderr.
pub fn classify_stderr(stderr: &str) -> SpeechFailure {
    let lower = stderr.to_lowercase();
    if CONNECTION_MARKERS.iter().any(|m| lower.contains(m)) {
        SpeechFailure::Connection
    } else {
        let last = stderr.lines().last().unwrap_or("").trim();
        SpeechFailure::Internal(format!("edge-tts failed: {}", last))
    }
}

/// Sibling file holding the script for one synthesis run.
fn script_path(destination: &Path) -> PathBuf {
    let name = destination
        .file_name()
        .map(|n| n.to_string_lossy().to_string())
        .unwrap_or_default();
    destination.with_file_name(format!("{}.script.txt", name))
}

/// edge-tts subprocess backend.
#[derive(Debug, Clone, Default)]
pub struct EdgeTtsBackend {
    config: EdgeTtsConfig,
}

impl EdgeTtsBackend {
    pub fn new(config: EdgeTtsConfig) -> Self {
        Self { config }
    }

    /// Whether the configured executable can be found.
    pub fn is_available(&self) -> bool {
        which::which(&self.config.binary).is_ok()
    }

    fn command(&self, script: &Path, output: &Path) -> Command {
        let mut cmd = Command::new(&self.config.binary);
        cmd.arg("--voice")
            .arg(&self.config.voice)
            .arg("--file")
            .arg(script)
            .arg("--write-media")
            .arg(output)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        cmd
    }

    async fn run(&self, script: &Path, tmp: &Path) -> Result<u64, SpeechFailure> {
        let child = self.command(script, tmp).spawn().map_err(|e| {
            SpeechFailure::Internal(format!("failed to spawn {}: {}", self.config.binary, e))
        })?;

        let output = match tokio::time::timeout(self.config.timeout, child.wait_with_output()).await
        {
            Ok(Ok(output)) => output,
            Ok(Err(e)) => return Err(SpeechFailure::Internal(e.to_string())),
            Err(_) => {
                warn!(
                    "edge-tts timed out after {}s",
                    self.config.timeout.as_secs()
                );
                return Err(SpeechFailure::Connection);
            }
        };

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            debug!("edge-tts stderr: {}", stderr.trim());
            return Err(classify_stderr(&stderr));
        }

        match tokio::fs::metadata(tmp).await {
            Ok(meta) if meta.len() > 0 => Ok(meta.len()),
            _ => Err(SpeechFailure::EmptyOutput),
        }
    }
}

#[async_trait]
impl SpeechBackend for EdgeTtsBackend {
    fn name(&self) -> &'static str {
        "edge_tts"
    }

    async fn synthesize(&self, text: &str, destination: &Path) -> TierOutcome {
        if text.trim().is_empty() {
            return TierOutcome::SkippedEmpty;
        }

        if !self.is_available() {
            warn!(binary = %self.config.binary, "edge-tts executable not found");
            return TierOutcome::BackendUnavailable;
        }

        if let Some(parent) = destination.parent() {
            if let Err(e) = tokio::fs::create_dir_all(parent).await {
                return TierOutcome::BackendError(SpeechFailure::Internal(e.to_string()));
            }
        }

        let script = script_path(destination);
        if let Err(e) = tokio::fs::write(&script, text).await {
            return TierOutcome::BackendError(SpeechFailure::Internal(e.to_string()));
        }

        let tmp = partial_path(destination);
        let result = self.run(&script, &tmp).await;
        let _ = tokio::fs::remove_file(&script).await;

        let bytes = match result {
            Ok(bytes) => bytes,
            Err(failure) => {
                let _ = tokio::fs::remove_file(&tmp).await;
                return TierOutcome::BackendError(failure);
            }
        };

        if let Err(e) = move_file(&tmp, destination).await {
            let _ = tokio::fs::remove_file(&tmp).await;
            return TierOutcome::BackendError(SpeechFailure::Internal(e.to_string()));
        }

        info!(
            voice = %self.config.voice,
            "edge-tts narration saved to {}",
            destination.display()
        );
        TierOutcome::Success { bytes }
    }
}
