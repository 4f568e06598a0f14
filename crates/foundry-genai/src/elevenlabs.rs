//! ElevenLabs premium narration.

use std::path::Path;

use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde::Serialize;
use tracing::{debug, info, warn};

use foundry_media::write_file_atomic;

use crate::config::ElevenLabsConfig;
use crate::error::GenAiResult;
use crate::speech::{SpeechBackend, SpeechFailure, TierOutcome};

#[derive(Debug, Serialize)]
struct TtsRequest<'a> {
    text: &'a str,
    model_id: &'a str,
    voice_settings: VoiceSettings,
}

#[derive(Debug, Serialize)]
struct VoiceSettings {
    stability: f32,
    similarity_boost: f32,
}

/// ElevenLabs text-to-speech client.
pub struct ElevenLabsBackend {
    config: ElevenLabsConfig,
    client: Client,
}

impl ElevenLabsBackend {
    pub fn new(config: ElevenLabsConfig) -> GenAiResult<Self> {
        let client = Client::builder().timeout(config.timeout).build()?;
        Ok(Self { config, client })
    }

    fn endpoint(&self) -> String {
        format!(
            "{}/v1/text-to-speech/{}",
            self.config.api_base.trim_end_matches('/'),
            self.config.voice_id
        )
    }

    fn classify_status(status: StatusCode) -> SpeechFailure {
        match status.as_u16() {
            401 => SpeechFailure::Unauthorized,
            402 => SpeechFailure::QuotaExhausted,
            code => SpeechFailure::Http(code),
        }
    }
}

#[async_trait]
impl SpeechBackend for ElevenLabsBackend {
    fn name(&self) -> &'static str {
        "elevenlabs"
    }

    async fn synthesize(&self, text: &str, destination: &Path) -> TierOutcome {
        if text.trim().is_empty() {
            return TierOutcome::SkippedEmpty;
        }

        let body = TtsRequest {
            text,
            model_id: &self.config.model_id,
            voice_settings: VoiceSettings {
                stability: self.config.stability,
                similarity_boost: self.config.similarity_boost,
            },
        };

        debug!("Requesting ElevenLabs narration ({} chars)", text.len());

        let response = match self
            .client
            .post(self.endpoint())
            .header("xi-api-key", &self.config.api_key)
            .header("Accept", "audio/mpeg")
            .json(&body)
            .send()
            .await
        {
            Ok(r) => r,
            Err(e) => {
                warn!("ElevenLabs request failed: {}", e);
                return TierOutcome::BackendError(SpeechFailure::Connection);
            }
        };

        let status = response.status();
        if !status.is_success() {
            let detail = response.text().await.unwrap_or_default();
            let failure = Self::classify_status(status);
            warn!("ElevenLabs returned {}: {}", status, detail);
            return TierOutcome::BackendError(failure);
        }

        let bytes = match response.bytes().await {
            Ok(b) => b,
            Err(e) => {
                warn!("ElevenLabs body read failed: {}", e);
                return TierOutcome::BackendError(SpeechFailure::Connection);
            }
        };

        if bytes.is_empty() {
            return TierOutcome::BackendError(SpeechFailure::EmptyOutput);
        }

        match write_file_atomic(destination, &bytes).await {
            Ok(written) => {
                info!("ElevenLabs narration saved to {}", destination.display());
                TierOutcome::Success { bytes: written }
            }
            Err(e) => TierOutcome::BackendError(SpeechFailure::Internal(e.to_string())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;
    use wiremock::matchers::{body_partial_json, header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    async fn backend(server: &MockServer) -> ElevenLabsBackend {
        let mut config = ElevenLabsConfig::new("test-key");
        config.api_base = server.uri();
        ElevenLabsBackend::new(config).unwrap()
    }

    #[tokio::test]
    async fn test_success_writes_audio() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v1/text-to-speech/21m00Tcm4TlvDq8ikWAM"))
            .and(header("xi-api-key", "test-key"))
            .and(body_partial_json(serde_json::json!({
                "text": "Hello there",
                "model_id": "eleven_monolingual_v1",
                "voice_settings": { "stability": 0.5, "similarity_boost": 0.5 }
            })))
            .respond_with(ResponseTemplate::new(200).set_body_bytes(vec![7u8; 512]))
            .mount(&server)
            .await;

        let dir = TempDir::new().unwrap();
        let dest = dir.path().join("job.mp3");
        let outcome = backend(&server).await.synthesize("Hello there", &dest).await;

        assert_eq!(outcome, TierOutcome::Success { bytes: 512 });
        assert_eq!(std::fs::read(&dest).unwrap().len(), 512);
    }

    #[tokio::test]
    async fn test_status_classification() {
        for (status, expected) in [
            (401, SpeechFailure::Unauthorized),
            (402, SpeechFailure::QuotaExhausted),
            (500, SpeechFailure::Http(500)),
        ] {
            let server = MockServer::start().await;
            Mock::given(method("POST"))
                .respond_with(ResponseTemplate::new(status).set_body_string("nope"))
                .mount(&server)
                .await;

            let dir = TempDir::new().unwrap();
            let dest = dir.path().join("job.mp3");
            let outcome = backend(&server).await.synthesize("Hi", &dest).await;

            assert_eq!(outcome, TierOutcome::BackendError(expected));
            assert!(!dest.exists());
        }
    }

    #[tokio::test]
    async fn test_empty_body_is_failure() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200))
            .mount(&server)
            .await;

        let dir = TempDir::new().unwrap();
        let outcome = backend(&server)
            .await
            .synthesize("Hi", &dir.path().join("job.mp3"))
            .await;

        assert_eq!(outcome, TierOutcome::BackendError(SpeechFailure::EmptyOutput));
    }

    #[tokio::test]
    async fn test_unreachable_is_connection_error() {
        let mut config = ElevenLabsConfig::new("k");
        config.api_base = "http://127.0.0.1:9".to_string();
        let backend = ElevenLabsBackend::new(config).unwrap();

        let dir = TempDir::new().unwrap();
        let outcome = backend.synthesize("Hi", &dir.path().join("a.mp3")).await;

        assert_eq!(outcome, TierOutcome::BackendError(SpeechFailure::Connection));
    }

    #[tokio::test]
    async fn test_blank_text_skipped() {
        let backend = ElevenLabsBackend::new(ElevenLabsConfig::new("k")).unwrap();
        let dir = TempDir::new().unwrap();
        assert_eq!(
            backend.synthesize("  ", &dir.path().join("a.mp3")).await,
            TierOutcome::SkippedEmpty
        );
    }
}
