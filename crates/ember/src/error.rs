//! Error types for Ember

use thiserror::Error;

use crate::bootstrap::BootstrapError;
use crate::config::ConfigError;

/// Result type alias using Ember's Error
pub type Result<T> = std::result::Result<T, Error>;

/// Main error type for adapter operations
#[derive(Error, Debug)]
pub enum Error {
    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("dependency bootstrap failed: {0}")]
    Bootstrap(#[from] BootstrapError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("model load failed: {0}")]
    ModelLoad(String),

    #[error("tokenizer error: {0}")]
    Tokenizer(String),

    #[error("chat template error: {0}")]
    Template(String),

    #[error("generation failed: {0}")]
    Generation(String),

    #[error("invalid request: {0}")]
    InvalidRequest(String),

    #[error("adapter is not initialized")]
    NotInitialized,

    #[error("adapter is already initialized")]
    AlreadyInitialized,

    #[cfg(feature = "candle")]
    #[error("candle error: {0}")]
    Candle(#[from] candle_core::Error),

    #[cfg(feature = "candle")]
    #[error("model hub error: {0}")]
    Hub(#[from] hf_hub::api::tokio::ApiError),

    #[error("JSON parsing error: {0}")]
    Json(#[from] serde_json::Error),
}

impl Error {
    /// Shorthand for [`Error::InvalidRequest`].
    pub(crate) fn invalid_request(reason: impl Into<String>) -> Self {
        Self::InvalidRequest(reason.into())
    }
}
