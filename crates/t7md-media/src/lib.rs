#![deny(unreachable_patterns)]
//! Frame pipeline and HUD compositing engine.
//!
//! This crate provides:
//! - FFmpeg-backed frame sources and encoded stream sinks
//! - Detector and depth-estimator boundaries
//! - Temporal smoothing for the depth stream
//! - A multi-module HUD compositor with resolution-independent layout
//! - The output orchestrator with pause/stop control and progress events

pub mod command;
pub mod depth;
pub mod detector;
pub mod engine;
pub mod error;
pub mod fs_utils;
pub mod hud;
pub mod output;
pub mod probe;
pub mod progress;
pub mod sink;
pub mod smoother;
pub mod source;

pub use command::{check_ffmpeg, check_ffprobe, FfmpegCommand};
pub use depth::{DepthEstimator, DepthStage};
pub use detector::{DetectionRequest, Detector, NullDetector};
pub use engine::{RenderEngine, RunController, RunHandle, MAX_CONSECUTIVE_DECODE_ERRORS};
pub use error::{MediaError, MediaResult};
pub use hud::{HudCompositor, HudFont, HudModule, LayerKind, RenderContext};
pub use output::{MetadataWriter, OutputLayout};
pub use probe::{probe_video, VideoInfo};
pub use progress::{
    ProgressEvent, ProgressReporter, RunState, RunSummary, PROGRESS_CHANNEL_CAPACITY,
};
pub use sink::{FfmpegSink, FfmpegSinkFactory, FrameSink, SinkFactory, StreamSpec};
pub use smoother::TemporalSmoother;
pub use source::{FfmpegSource, FrameSource};
