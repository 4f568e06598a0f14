//! Worker error types.

use thiserror::Error;

pub type WorkerResult<T> = Result<T, WorkerError>;

#[derive(Debug, Error)]
pub enum WorkerError {
    #[error("Invalid request: {0}")]
    InvalidRequest(#[from] foundry_models::RequestError),

    #[error("Invalid transition: {0}")]
    Transition(#[from] foundry_models::InvalidTransition),

    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("Store error: {0}")]
    Store(#[from] foundry_store::StoreError),

    #[error("Queue error: {0}")]
    Queue(#[from] foundry_queue::QueueError),

    #[error("Provider error: {0}")]
    GenAi(#[from] foundry_genai::GenAiError),

    #[error("Media error: {0}")]
    Media(#[from] foundry_media::MediaError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl WorkerError {
    pub fn config_error(msg: impl Into<String>) -> Self {
        Self::ConfigError(msg.into())
    }
}
