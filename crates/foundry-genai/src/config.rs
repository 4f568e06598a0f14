//! Provider configuration.
//!
//! Mock switches and credentials are read once at startup; they are
//! deployment choices that apply uniformly to every job.

use std::time::Duration;

/// Base URL of the Google generative language API.
pub const DEFAULT_GOOGLE_API_BASE: &str = "https://generativelanguage.googleapis.com";
/// Base URL of the ElevenLabs API.
pub const DEFAULT_ELEVENLABS_API_BASE: &str = "https://api.elevenlabs.io";

/// Read a boolean switch such as `USE_MOCK_VEO=true`.
pub fn env_flag(name: &str, default: bool) -> bool {
    match std::env::var(name) {
        Ok(v) => matches!(v.trim().to_lowercase().as_str(), "1" | "true" | "yes" | "on"),
        Err(_) => default,
    }
}

/// Read a non-empty secret.
fn env_secret(name: &str) -> Option<String> {
    std::env::var(name).ok().filter(|v| !v.trim().is_empty())
}

fn env_secs(name: &str, default: u64) -> Duration {
    Duration::from_secs(
        std::env::var(name)
            .ok()
            .and_then(|s| s.parse().ok())
            .unwrap_or(default),
    )
}

/// Visual provider configuration.
#[derive(Debug, Clone)]
pub struct VisualConfig {
    /// Produce placeholder video instead of calling the video backend
    pub mock: bool,
    /// Credential for refinement and video generation
    pub gemini_api_key: Option<String>,
    /// API base URL
    pub api_base: String,
    /// Model used for prompt refinement
    pub refine_model: String,
    /// Model used for video generation
    pub video_model: String,
    /// Delay between operation polls
    pub poll_interval: Duration,
    /// Upper bound on the whole poll loop
    pub poll_timeout: Duration,
    /// Simulated render time in mock mode
    pub mock_delay: Duration,
    /// Per-request HTTP timeout
    pub request_timeout: Duration,
}

impl Default for VisualConfig {
    fn default() -> Self {
        Self {
            mock: true,
            gemini_api_key: None,
            api_base: DEFAULT_GOOGLE_API_BASE.to_string(),
            refine_model: "gemini-2.0-flash".to_string(),
            video_model: "veo-2.0-generate-001".to_string(),
            poll_interval: Duration::from_secs(10),
            poll_timeout: Duration::from_secs(900),
            mock_delay: Duration::from_millis(3000),
            request_timeout: Duration::from_secs(60),
        }
    }
}

impl VisualConfig {
    /// Create config from environment variables.
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            mock: env_flag("USE_MOCK_VEO", defaults.mock),
            gemini_api_key: env_secret("GEMINI_API_KEY"),
            api_base: std::env::var("GOOGLE_API_BASE").unwrap_or(defaults.api_base),
            refine_model: std::env::var("GEMINI_MODEL").unwrap_or(defaults.refine_model),
            video_model: std::env::var("VEO_MODEL").unwrap_or(defaults.video_model),
            poll_interval: env_secs("VEO_POLL_INTERVAL_SECS", 10),
            poll_timeout: env_secs("VEO_POLL_TIMEOUT_SECS", 900),
            mock_delay: Duration::from_millis(
                std::env::var("MOCK_VIDEO_DELAY_MS")
                    .ok()
                    .and_then(|s| s.parse().ok())
                    .unwrap_or(3000),
            ),
            request_timeout: defaults.request_timeout,
        }
    }
}

/// Premium narration backend configuration.
#[derive(Debug, Clone)]
pub struct ElevenLabsConfig {
    pub api_key: String,
    pub api_base: String,
    /// Voice id ("Rachel" by default)
    pub voice_id: String,
    pub model_id: String,
    pub stability: f32,
    pub similarity_boost: f32,
    pub timeout: Duration,
}

impl ElevenLabsConfig {
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            api_key: api_key.into(),
            api_base: DEFAULT_ELEVENLABS_API_BASE.to_string(),
            voice_id: "21m00Tcm4TlvDq8ikWAM".to_string(),
            model_id: "eleven_monolingual_v1".to_string(),
            stability: 0.5,
            similarity_boost: 0.5,
            timeout: Duration::from_secs(30),
        }
    }

    /// `None` when no credential is configured.
    pub fn from_env() -> Option<Self> {
        let mut config = Self::new(env_secret("ELEVENLABS_API_KEY")?);
        if let Ok(voice) = std::env::var("ELEVENLABS_VOICE_ID") {
            config.voice_id = voice;
        }
        if let Ok(base) = std::env::var("ELEVENLABS_API_BASE") {
            config.api_base = base;
        }
        Some(config)
    }
}

/// Standard narration backend configuration.
#[derive(Debug, Clone)]
pub struct EdgeTtsConfig {
    /// `edge-tts` executable
    pub binary: String,
    pub voice: String,
    pub timeout: Duration,
}

impl Default for EdgeTtsConfig {
    fn default() -> Self {
        Self {
            binary: "edge-tts".to_string(),
            voice: "en-US-ChristopherNeural".to_string(),
            timeout: Duration::from_secs(120),
        }
    }
}

impl EdgeTtsConfig {
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            binary: std::env::var("EDGE_TTS_BIN").unwrap_or(defaults.binary),
            voice: std::env::var("EDGE_TTS_VOICE").unwrap_or(defaults.voice),
            timeout: env_secs("EDGE_TTS_TIMEOUT_SECS", 120),
        }
    }
}

/// Narration provider configuration.
#[derive(Debug, Clone, Default)]
pub struct AudioConfig {
    /// Produce placeholder audio instead of calling any backend
    pub mock: bool,
    /// Present only when a premium credential is configured
    pub premium: Option<ElevenLabsConfig>,
    pub standard: EdgeTtsConfig,
}

impl AudioConfig {
    pub fn from_env() -> Self {
        Self {
            mock: env_flag("USE_MOCK_AUDIO", false),
            premium: ElevenLabsConfig::from_env(),
            standard: EdgeTtsConfig::from_env(),
        }
    }
}
