//! Worker configuration.

use std::path::PathBuf;

use t7md_media::PROGRESS_CHANNEL_CAPACITY;
use t7md_ml_client::MlClientConfig;

/// Process-level settings read from the environment. Render settings live
/// in the persisted config tree instead.
#[derive(Debug, Clone)]
pub struct WorkerConfig {
    /// Config tree location; `None` uses `~/.t7md_vision/config.json`
    pub config_path: Option<PathBuf>,
    /// Recognition service client settings
    pub ml: MlClientConfig,
    /// Capacity of the progress event channel
    pub progress_capacity: usize,
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self {
            config_path: None,
            ml: MlClientConfig::default(),
            progress_capacity: PROGRESS_CHANNEL_CAPACITY,
        }
    }
}

impl WorkerConfig {
    /// Create config from environment variables.
    pub fn from_env() -> Self {
        Self {
            config_path: std::env::var("T7MD_CONFIG")
                .ok()
                .filter(|s| !s.trim().is_empty())
                .map(PathBuf::from),
            ml: MlClientConfig::from_env(),
            progress_capacity: std::env::var("T7MD_PROGRESS_CAPACITY")
                .ok()
                .and_then(|s| s.parse().ok())
                .filter(|n| *n > 0)
                .unwrap_or(PROGRESS_CHANNEL_CAPACITY),
        }
    }
}
