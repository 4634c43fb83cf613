//! Error types for model and configuration operations.

use std::path::PathBuf;
use thiserror::Error;

/// Result type for model operations.
pub type ModelResult<T> = Result<T, ModelError>;

/// Errors raised by the data model and the configuration facade.
#[derive(Debug, Error)]
pub enum ModelError {
    #[error("Invalid bounding box: {0}")]
    InvalidBoundingBox(String),

    #[error("Invalid config path: '{0}'")]
    InvalidPath(String),

    #[error("Config value at '{path}' rejected: {message}")]
    InvalidValue { path: String, message: String },

    #[error("Home directory could not be resolved")]
    NoHomeDir,

    #[error("Failed to write config file {path}: {source}")]
    Persist {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl ModelError {
    /// Create an invalid bounding box error.
    pub fn invalid_bbox(message: impl Into<String>) -> Self {
        Self::InvalidBoundingBox(message.into())
    }

    /// Create an invalid value error for a config path.
    pub fn invalid_value(path: impl Into<String>, message: impl Into<String>) -> Self {
        Self::InvalidValue {
            path: path.into(),
            message: message.into(),
        }
    }
}
