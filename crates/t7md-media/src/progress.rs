//! Run lifecycle state and progress events.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use tokio::sync::mpsc;
use tracing::debug;

/// Default capacity of a run's event channel.
pub const PROGRESS_CHANNEL_CAPACITY: usize = 256;

/// `Idle -> Running <-> Paused -> (Completed | Stopped | Failed)`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunState {
    Idle,
    Running,
    Paused,
    Completed,
    Stopped,
    Failed,
}

impl RunState {
    pub fn is_terminal(&self) -> bool {
        matches!(self, RunState::Completed | RunState::Stopped | RunState::Failed)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            RunState::Idle => "idle",
            RunState::Running => "running",
            RunState::Paused => "paused",
            RunState::Completed => "completed",
            RunState::Stopped => "stopped",
            RunState::Failed => "failed",
        }
    }
}

impl std::fmt::Display for RunState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// What a finished run left on disk.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunSummary {
    pub output_dir: PathBuf,
    pub metadata_path: PathBuf,
    /// Every artifact produced: video files, sequence and crop directories
    /// and the metadata log
    pub artifacts: Vec<PathBuf>,
    pub frames_processed: u64,
    pub frames_dropped: u64,
    pub stopped_early: bool,
}

/// Event emitted by a running pipeline.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum ProgressEvent {
    Started {
        total_frames: u64,
        fps: f64,
        output_dir: PathBuf,
    },
    /// One per processed frame.
    Frame {
        percent: u8,
        frame_index: u64,
        total_frames: u64,
        fps: f64,
    },
    Paused,
    Resumed,
    Completed(RunSummary),
    Stopped(RunSummary),
    Failed {
        error: String,
    },
}

impl ProgressEvent {
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            ProgressEvent::Completed(_) | ProgressEvent::Stopped(_) | ProgressEvent::Failed { .. }
        )
    }
}

/// Sending half of the event stream. Frame events never block the worker:
/// they are dropped when the consumer lags.
#[derive(Debug, Clone, Default)]
pub struct ProgressReporter {
    tx: Option<mpsc::Sender<ProgressEvent>>,
}

impl ProgressReporter {
    pub fn new(tx: mpsc::Sender<ProgressEvent>) -> Self {
        Self { tx: Some(tx) }
    }

    /// Reporter that discards everything.
    pub fn disabled() -> Self {
        Self { tx: None }
    }

    /// Emit a per-frame event without waiting.
    pub fn frame(&self, event: ProgressEvent) {
        let Some(tx) = &self.tx else {
            return;
        };
        if let Err(e) = tx.try_send(event) {
            debug!("Progress event dropped: {}", e);
        }
    }

    /// Emit a lifecycle event, waiting for channel space.
    pub async fn emit(&self, event: ProgressEvent) {
        let Some(tx) = &self.tx else {
            return;
        };
        if tx.send(event).await.is_err() {
            debug!("Progress receiver closed");
        }
    }
}
