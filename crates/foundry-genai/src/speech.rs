//! Speech synthesis backends.

use std::fmt;
use std::path::Path;

use async_trait::async_trait;

/// Why a synthesis attempt did not produce audio.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SpeechFailure {
    /// Credential rejected
    Unauthorized,
    /// Credits or quota used up
    QuotaExhausted,
    /// Any other non-success status
    Http(u16),
    /// Network or service unreachable
    Connection,
    /// Backend reported success but produced nothing
    EmptyOutput,
    /// Local failure (spawn, filesystem, unexpected exit)
    Internal(String),
}

impl SpeechFailure {
    pub fn as_str(&self) -> &'static str {
        match self {
            SpeechFailure::Unauthorized => "unauthorized",
            SpeechFailure::QuotaExhausted => "quota_exhausted",
            SpeechFailure::Http(_) => "http",
            SpeechFailure::Connection => "connection",
            SpeechFailure::EmptyOutput => "empty_output",
            SpeechFailure::Internal(_) => "internal",
        }
    }
}

impl fmt::Display for SpeechFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SpeechFailure::Unauthorized => write!(f, "unauthorized (check API key)"),
            SpeechFailure::QuotaExhausted => write!(f, "quota exhausted"),
            SpeechFailure::Http(status) => write!(f, "HTTP {}", status),
            SpeechFailure::Connection => write!(f, "connection error"),
            SpeechFailure::EmptyOutput => write!(f, "backend produced no audio"),
            SpeechFailure::Internal(msg) => write!(f, "{}", msg),
        }
    }
}

/// Result of one backend attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TierOutcome {
    /// Audio written to the destination
    Success { bytes: u64 },
    /// Nothing to say
    SkippedEmpty,
    /// Backend could not be reached or its executable is missing
    BackendUnavailable,
    /// Backend was tried and failed
    BackendError(SpeechFailure),
}

/// A text-to-speech engine that writes narration to a file.
///
/// Implementations never return an error; every failure is reported as a
/// [`TierOutcome`] so callers can decide whether to fall back.
#[async_trait]
pub trait SpeechBackend: Send + Sync {
    /// Short name for logs and metrics.
    fn name(&self) -> &'static str;

    async fn synthesize(&self, text: &str, destination: &Path) -> TierOutcome;
}
