//! Shared data models for the T7MD frame pipeline.
//!
//! This crate provides Serde-serializable types for:
//! - Detections and per-frame results
//! - Output profiles and codecs
//! - The typed render configuration tree and its path-based facade
//! - The per-run metadata log

pub mod config;
pub mod config_store;
pub mod detection;
pub mod error;
pub mod frame;
pub mod metadata;
pub mod profile;
pub mod timecode;

// Re-export common types
pub use config::{
    alpha_from_percent, Anchor, BboxConfig, CollageConfig, Color, DepthConfig, HAlign,
    MessageConfig, MinimapConfig, ModelsConfig, ModulesConfig, OutputConfig, RenderConfig,
    StatsConfig, StyleConfig, TimecodeConfig, VAlign,
};
pub use config_store::{deep_merge, ConfigStore, SharedConfig};
pub use detection::{
    BoundingBox, Category, CategoryParseError, ConfidenceThresholds, Detection, PixelRect,
    RawDetection, RawDetections,
};
pub use error::{ModelError, ModelResult};
pub use frame::{CategoryCounts, FrameResult, VideoMeta, DEFAULT_FPS};
pub use metadata::{
    DetectionRecord, DetectorFlags, FrameRecord, MetadataLog, RectRecord, RunMetadata, RunStats,
};
pub use profile::{Codec, OutputProfile, ProfileParseError};
pub use timecode::format_timecode;
