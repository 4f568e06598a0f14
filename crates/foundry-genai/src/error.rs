//! Generation provider error types.

use thiserror::Error;

pub type GenAiResult<T> = Result<T, GenAiError>;

#[derive(Debug, Error)]
pub enum GenAiError {
    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    #[error("Quota exhausted: {0}")]
    QuotaExhausted(String),

    #[error("HTTP {status}: {body}")]
    Http { status: u16, body: String },

    #[error("Invalid response: {0}")]
    InvalidResponse(String),

    #[error("Empty result: {0}")]
    EmptyResult(String),

    #[error("Remote operation failed: {0}")]
    OperationFailed(String),

    #[error("Timeout after {0} seconds")]
    Timeout(u64),

    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),

    #[error("Media error: {0}")]
    Media(#[from] foundry_media::MediaError),

    #[error("Invalid base64 payload: {0}")]
    Base64(#[from] base64::DecodeError),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl GenAiError {
    /// Map a non-success HTTP status onto the error taxonomy.
    pub fn from_http_status(status: u16, body: impl Into<String>) -> Self {
        let body = body.into();
        match status {
            401 | 403 => Self::Unauthorized(body),
            402 | 429 => Self::QuotaExhausted(body),
            _ => Self::Http { status, body },
        }
    }

    pub fn invalid_response(msg: impl Into<String>) -> Self {
        Self::InvalidResponse(msg.into())
    }
}
