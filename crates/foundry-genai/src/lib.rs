//! Generation providers for the foundry pipeline.
//!
//! This crate provides:
//! - Prompt refinement and video generation (Gemini / Veo)
//! - Tiered narration (ElevenLabs premium, edge-tts standard)
//! - Mock modes for both, selected at startup

pub mod audio;
pub mod config;
pub mod edge_tts;
pub mod elevenlabs;
pub mod error;
pub mod gemini;
pub mod speech;
pub mod visual;

pub use audio::{AudioOutcome, AudioProvider, AudioTier, TieredAudioProvider, MOCK_AUDIO_BYTES};
pub use config::{env_flag, AudioConfig, EdgeTtsConfig, ElevenLabsConfig, VisualConfig};
pub use edge_tts::EdgeTtsBackend;
pub use elevenlabs::ElevenLabsBackend;
pub use error::{GenAiError, GenAiResult};
pub use gemini::{GeminiClient, Operation, VideoPayload};
pub use speech::{SpeechBackend, SpeechFailure, TierOutcome};
pub use visual::{fallback_refinement, GeminiVisualProvider, VisualProvider, MOCK_VIDEO_BYTES};
