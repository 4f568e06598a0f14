//! Tiered narration provider.
//!
//! Premium synthesis is attempted only when requested and configured. Any
//! premium failure falls through to the standard backend, which decides
//! the final outcome.

use std::path::Path;
use std::sync::Arc;

use async_trait::async_trait;
use metrics::counter;
use tracing::{info, warn};

use foundry_media::write_file_atomic;

use crate::config::AudioConfig;
use crate::edge_tts::EdgeTtsBackend;
use crate::elevenlabs::ElevenLabsBackend;
use crate::error::GenAiResult;
use crate::speech::{SpeechBackend, SpeechFailure, TierOutcome};

/// Placeholder narration written in mock mode.
pub const MOCK_AUDIO_BYTES: &[u8] = b"mock_bytes";

const AUDIO_TIER_TOTAL: &str = "foundry_audio_tier_total";
const PREMIUM_FALLBACK_TOTAL: &str = "foundry_audio_premium_fallback_total";

/// Tier that produced the narration.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AudioTier {
    Mock,
    Premium,
    Standard,
}

impl AudioTier {
    pub fn as_str(&self) -> &'static str {
        match self {
            AudioTier::Mock => "mock",
            AudioTier::Premium => "premium",
            AudioTier::Standard => "standard",
        }
    }
}

/// Outcome of narration generation for one job.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AudioOutcome {
    Generated { tier: AudioTier, bytes: u64 },
    /// Blank script, nothing written
    SkippedEmpty,
    /// Every attempted tier failed; carries the last failure
    Failed(SpeechFailure),
}

impl AudioOutcome {
    pub fn is_success(&self) -> bool {
        matches!(self, AudioOutcome::Generated { .. })
    }
}

/// Produces narration audio for a script.
#[async_trait]
pub trait AudioProvider: Send + Sync {
    async fn generate(&self, script: &str, destination: &Path, wants_premium: bool)
        -> AudioOutcome;
}

/// Mock, premium and standard tiers behind one provider.
pub struct TieredAudioProvider {
    mock: bool,
    premium: Option<Arc<dyn SpeechBackend>>,
    standard: Arc<dyn SpeechBackend>,
}

impl TieredAudioProvider {
    pub fn new(
        mock: bool,
        premium: Option<Arc<dyn SpeechBackend>>,
        standard: Arc<dyn SpeechBackend>,
    ) -> Self {
        Self {
            mock,
            premium,
            standard,
        }
    }

    /// Build the provider with the ElevenLabs and edge-tts backends.
    pub fn from_config(config: &AudioConfig) -> GenAiResult<Self> {
        let premium = match &config.premium {
            Some(c) => Some(Arc::new(ElevenLabsBackend::new(c.clone())?) as Arc<dyn SpeechBackend>),
            None => None,
        };
        let standard = Arc::new(EdgeTtsBackend::new(config.standard.clone()));
        Ok(Self::new(config.mock, premium, standard))
    }

    pub fn is_mock(&self) -> bool {
        self.mock
    }

    pub fn has_premium(&self) -> bool {
        self.premium.is_some()
    }

    async fn write_mock(&self, destination: &Path) -> AudioOutcome {
        match write_file_atomic(destination, MOCK_AUDIO_BYTES).await {
            Ok(bytes) => AudioOutcome::Generated {
                tier: AudioTier::Mock,
                bytes,
            },
            Err(e) => AudioOutcome::Failed(SpeechFailure::Internal(e.to_string())),
        }
    }

    fn generated(tier: AudioTier, bytes: u64) -> AudioOutcome {
        counter!(AUDIO_TIER_TOTAL, "tier" => tier.as_str()).increment(1);
        AudioOutcome::Generated { tier, bytes }
    }
}

#[async_trait]
impl AudioProvider for TieredAudioProvider {
    async fn generate(
        &self,
        script: &str,
        destination: &Path,
        wants_premium: bool,
    ) -> AudioOutcome {
        if self.mock {
            info!("Mock audio enabled, writing placeholder narration");
            return self.write_mock(destination).await;
        }

        if script.trim().is_empty() {
            info!("Narration script is blank, skipping audio");
            return AudioOutcome::SkippedEmpty;
        }

        if wants_premium {
            match &self.premium {
                Some(backend) => match backend.synthesize(script, destination).await {
                    TierOutcome::Success { bytes } => {
                        return Self::generated(AudioTier::Premium, bytes);
                    }
                    TierOutcome::SkippedEmpty => return AudioOutcome::SkippedEmpty,
                    TierOutcome::BackendUnavailable => {
                        warn!(
                            backend = backend.name(),
                            "Premium narration unavailable, falling back"
                        );
                        counter!(PREMIUM_FALLBACK_TOTAL, "reason" => "unavailable").increment(1);
                    }
                    TierOutcome::BackendError(failure) => {
                        warn!(
                            backend = backend.name(),
                            reason = failure.as_str(),
                            "Premium narration failed ({}), falling back",
                            failure
                        );
                        counter!(PREMIUM_FALLBACK_TOTAL, "reason" => failure.as_str())
                            .increment(1);
                    }
                },
                None => {
                    info!("Premium narration requested but not configured, using standard");
                    counter!(PREMIUM_FALLBACK_TOTAL, "reason" => "not_configured").increment(1);
                }
            }
        }

        match self.standard.synthesize(script, destination).await {
            TierOutcome::Success { bytes } => Self::generated(AudioTier::Standard, bytes),
            TierOutcome::SkippedEmpty => AudioOutcome::SkippedEmpty,
            TierOutcome::BackendUnavailable => {
                warn!(backend = self.standard.name(), "Standard narration unavailable");
                AudioOutcome::Failed(SpeechFailure::Internal(
                    "standard backend unavailable".to_string(),
                ))
            }
            TierOutcome::BackendError(failure) => {
                warn!(
                    backend = self.standard.name(),
                    reason = failure.as_str(),
                    "Standard narration failed: {}",
                    failure
                );
                AudioOutcome::Failed(failure)
            }
        }
    }
}
