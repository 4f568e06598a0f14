//! Prompt refinement and video generation.

use std::path::Path;
use std::time::Instant;

use async_trait::async_trait;
use tracing::{info, warn};

use foundry_media::write_file_atomic;

use crate::config::VisualConfig;
use crate::error::{GenAiError, GenAiResult};
use crate::gemini::GeminiClient;

/// Placeholder video written in mock mode.
pub const MOCK_VIDEO_BYTES: &[u8] = b"mock_video_bytes";

/// Refined descriptions are kept under this many words.
pub const MAX_REFINED_WORDS: usize = 40;

/// Deterministic refinement used when no credential is configured.
pub fn fallback_refinement(prompt: &str, style: &str) -> String {
    format!("Refined ({}): {}", style, prompt)
}

fn clamp_words(text: &str, max: usize) -> String {
    text.split_whitespace()
        .take(max.saturating_sub(1))
        .collect::<Vec<_>>()
        .join(" ")
}

fn refinement_instruction(prompt: &str, style: &str) -> String {
    format!(
        "Rewrite the following idea as a single vivid prompt for a {style} video \
         generation model. Describe subject, motion, camera and lighting. \
         Use fewer than {MAX_REFINED_WORDS} words and reply with the prompt only.\n\n\
         Idea: {prompt}"
    )
}

/// Refines prompts and renders video.
///
/// Neither method returns an error: refinement degrades to the input
/// prompt and video failure is reported as `false`.
#[async_trait]
pub trait VisualProvider: Send + Sync {
    async fn refine(&self, prompt: &str, style: &str) -> String;

    async fn generate_video(&self, description: &str, destination: &Path) -> bool;

    /// Whether video rendering is simulated.
    fn is_mock(&self) -> bool;
}

/// Gemini refinement with Veo (or mock) video.
pub struct GeminiVisualProvider {
    config: VisualConfig,
    client: Option<GeminiClient>,
}

impl GeminiVisualProvider {
    pub fn new(config: VisualConfig) -> GenAiResult<Self> {
        let client = match &config.gemini_api_key {
            Some(key) => Some(GeminiClient::new(
                key.clone(),
                config.api_base.clone(),
                config.request_timeout,
            )?),
            None => None,
        };
        Ok(Self { config, client })
    }

    pub fn has_credential(&self) -> bool {
        self.client.is_some()
    }

    async fn write_mock_video(&self, destination: &Path) -> bool {
        info!(
            "Mock video enabled, simulating render for {}ms",
            self.config.mock_delay.as_millis()
        );
        tokio::time::sleep(self.config.mock_delay).await;

        match write_file_atomic(destination, MOCK_VIDEO_BYTES).await {
            Ok(_) => true,
            Err(e) => {
                warn!("Failed to write mock video {}: {}", destination.display(), e);
                false
            }
        }
    }

    async fn render(&self, client: &GeminiClient, description: &str) -> GenAiResult<Vec<u8>> {
        let name = client
            .start_video_generation(&self.config.video_model, description)
            .await?;
        info!(operation = %name, "Video generation started");

        let started = Instant::now();
        let poll = async {
            loop {
                let op = client.get_operation(&name).await?;
                if op.done {
                    return Ok::<_, GenAiError>(op);
                }
                tokio::time::sleep(self.config.poll_interval).await;
            }
        };

        let op = tokio::time::timeout(self.config.poll_timeout, poll)
            .await
            .map_err(|_| GenAiError::Timeout(self.config.poll_timeout.as_secs()))??;

        info!(
            operation = %name,
            elapsed_secs = started.elapsed().as_secs(),
            "Video generation finished"
        );

        client.fetch_video(&op.video_payload()?).await
    }
}

#[async_trait]
impl VisualProvider for GeminiVisualProvider {
    async fn refine(&self, prompt: &str, style: &str) -> String {
        let Some(client) = &self.client else {
            return fallback_refinement(prompt, style);
        };

        match client
            .generate_text(&self.config.refine_model, &refinement_instruction(prompt, style))
            .await
        {
            Ok(text) => {
                let refined = clamp_words(&text, MAX_REFINED_WORDS);
                if refined.is_empty() {
                    prompt.to_string()
                } else {
                    refined
                }
            }
            Err(e) => {
                warn!("Prompt refinement failed, using original prompt: {}", e);
                prompt.to_string()
            }
        }
    }

    async fn generate_video(&self, description: &str, destination: &Path) -> bool {
        if self.config.mock {
            return self.write_mock_video(destination).await;
        }

        let Some(client) = &self.client else {
            warn!("Video generation requires GEMINI_API_KEY");
            return false;
        };

        let bytes = match self.render(client, description).await {
            Ok(bytes) => bytes,
            Err(e) => {
                warn!("Video generation failed: {}", e);
                return false;
            }
        };

        match write_file_atomic(destination, &bytes).await {
            Ok(written) => {
                info!("Saved {} byte video to {}", written, destination.display());
                true
            }
            Err(e) => {
                warn!("Failed to write video {}: {}", destination.display(), e);
                false
            }
        }
    }

    fn is_mock(&self) -> bool {
        self.config.mock
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::time::Duration;
    use tempfile::TempDir;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn real_config(server: &MockServer) -> VisualConfig {
        VisualConfig {
            mock: false,
            gemini_api_key: Some("test-key".into()),
            api_base: server.uri(),
            poll_interval: Duration::from_millis(10),
            poll_timeout: Duration::from_secs(5),
            ..VisualConfig::default()
        }
    }

    #[tokio::test]
    async fn test_refine_without_credential() {
        let provider = GeminiVisualProvider::new(VisualConfig::default()).unwrap();
        assert!(!provider.has_credential());
        assert_eq!(
            provider.refine("a red fox runs", "anime").await,
            "Refined (anime): a red fox runs"
        );
    }

    #[tokio::test]
    async fn test_refine_backend_error_returns_prompt() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(500))
            .mount(&server)
            .await;

        let provider = GeminiVisualProvider::new(real_config(&server)).unwrap();
        assert_eq!(provider.refine("a red fox", "cinematic").await, "a red fox");
    }

    #[tokio::test]
    async fn test_refine_clamps_length() {
        let server = MockServer::start().await;
        let long = vec!["word"; 80].join(" ");
        Mock::given(method("POST"))
            .and(path("/v1beta/models/gemini-2.0-flash:generateContent"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "candidates": [{ "content": { "parts": [{ "text": long }] } }]
            })))
            .mount(&server)
            .await;

        let provider = GeminiVisualProvider::new(real_config(&server)).unwrap();
        let refined = provider.refine("a fox", "cinematic").await;
        assert!(refined.split_whitespace().count() < MAX_REFINED_WORDS);
    }

    #[tokio::test]
    async fn test_mock_video_writes_placeholder() {
        let provider = GeminiVisualProvider::new(VisualConfig {
            mock_delay: Duration::from_millis(1),
            ..VisualConfig::default()
        })
        .unwrap();
        let dir = TempDir::new().unwrap();
        let dest = dir.path().join("job_raw.mp4");

        assert!(provider.is_mock());
        assert!(provider.generate_video("anything", &dest).await);
        assert_eq!(std::fs::read(&dest).unwrap(), MOCK_VIDEO_BYTES);
    }

    #[tokio::test]
    async fn test_real_video_without_credential_fails() {
        let provider = GeminiVisualProvider::new(VisualConfig {
            mock: false,
            ..VisualConfig::default()
        })
        .unwrap();
        let dir = TempDir::new().unwrap();
        assert!(!provider.generate_video("x", &dir.path().join("v.mp4")).await);
    }

    #[tokio::test]
    async fn test_real_video_polls_until_done() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v1beta/models/veo-2.0-generate-001:predictLongRunning"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "name": "operations/op1" })))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/v1beta/operations/op1"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "name": "operations/op1",
                "done": false
            })))
            .up_to_n_times(2)
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/v1beta/operations/op1"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "name": "operations/op1",
                "done": true,
                "response": { "generateVideoResponse": { "generatedSamples": [
                    { "video": { "uri": format!("{}/files/clip.mp4", server.uri()) } }
                ] } }
            })))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/files/clip.mp4"))
            .respond_with(ResponseTemplate::new(200).set_body_bytes(b"veo-video".to_vec()))
            .mount(&server)
            .await;

        let provider = GeminiVisualProvider::new(real_config(&server)).unwrap();
        let dir = TempDir::new().unwrap();
        let dest = dir.path().join("job_raw.mp4");

        assert!(provider.generate_video("a fox", &dest).await);
        assert_eq!(std::fs::read(&dest).unwrap(), b"veo-video");
    }

    #[tokio::test]
    async fn test_poll_timeout_is_failure() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "name": "operations/slow" })))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "name": "operations/slow",
                "done": false
            })))
            .mount(&server)
            .await;

        let provider = GeminiVisualProvider::new(VisualConfig {
            poll_timeout: Duration::from_millis(100),
            ..real_config(&server)
        })
        .unwrap();
        let dir = TempDir::new().unwrap();
        let dest = dir.path().join("job_raw.mp4");

        assert!(!provider.generate_video("a fox", &dest).await);
        assert!(!dest.exists());
    }

    #[tokio::test]
    async fn test_quota_exhausted_is_failure() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(429))
            .mount(&server)
            .await;

        let provider = GeminiVisualProvider::new(real_config(&server)).unwrap();
        let dir = TempDir::new().unwrap();
        assert!(!provider.generate_video("a fox", &dir.path().join("v.mp4")).await);
    }
}
