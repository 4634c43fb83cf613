//! Worker error types.

use thiserror::Error;

pub type WorkerResult<T> = Result<T, WorkerError>;

#[derive(Debug, Error)]
pub enum WorkerError {
    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("Run failed: {0}")]
    RunFailed(String),

    #[error("Run interrupted before completion")]
    Interrupted,

    #[error("Media error: {0}")]
    Media(#[from] t7md_media::MediaError),

    #[error("ML client error: {0}")]
    Ml(#[from] t7md_ml_client::MlError),

    #[error("Config store error: {0}")]
    Model(#[from] t7md_models::ModelError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl WorkerError {
    pub fn config(msg: impl Into<String>) -> Self {
        Self::ConfigError(msg.into())
    }

    pub fn run_failed(msg: impl Into<String>) -> Self {
        Self::RunFailed(msg.into())
    }
}
