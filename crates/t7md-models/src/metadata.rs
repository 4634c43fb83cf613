//! Per-run metadata log.
//!
//! Serialized as `{ "metadata": {...}, "frames": [...], "summary": {...} }`.

use chrono::{DateTime, Utc};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::detection::{Category, Detection};
use crate::frame::{FrameResult, VideoMeta};
use crate::profile::{Codec, OutputProfile};

/// Which detectors were active for the run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct DetectorFlags {
    pub faces: bool,
    pub persons: bool,
    pub objects: bool,
    pub depth: bool,
}

/// Top-level block describing the source and the run settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct RunMetadata {
    pub source: String,
    pub width: u32,
    pub height: u32,
    pub fps: f64,
    pub total_frames: u64,
    pub profile: OutputProfile,
    pub codec: Codec,
    pub detectors: DetectorFlags,
    pub created_at: DateTime<Utc>,
}

impl RunMetadata {
    pub fn new(
        source: impl Into<String>,
        meta: &VideoMeta,
        profile: OutputProfile,
        codec: Codec,
        detectors: DetectorFlags,
    ) -> Self {
        Self {
            source: source.into(),
            width: meta.width,
            height: meta.height,
            fps: meta.effective_fps(),
            total_frames: meta.total_frames,
            profile,
            codec,
            detectors,
            created_at: Utc::now(),
        }
    }
}

/// Box size and center in whole pixels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct RectRecord {
    pub w: i64,
    pub h: i64,
    pub cx: i64,
    pub cy: i64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct DetectionRecord {
    pub label: String,
    pub category: Category,
    pub confidence: f64,
    pub rect: RectRecord,
}

impl From<&Detection> for DetectionRecord {
    fn from(d: &Detection) -> Self {
        let (cx, cy) = d.center();
        Self {
            label: d.label.clone(),
            category: d.category,
            confidence: d.confidence,
            rect: RectRecord {
                w: d.bbox.width().round() as i64,
                h: d.bbox.height().round() as i64,
                cx: i64::from(cx),
                cy: i64::from(cy),
            },
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct FrameRecord {
    pub index: u64,
    /// Seconds from the start of the source
    pub timestamp: f64,
    pub detections: Vec<DetectionRecord>,
}

impl FrameRecord {
    pub fn from_result(result: &FrameResult, meta: &VideoMeta) -> Self {
        Self {
            index: result.frame_index,
            timestamp: meta.timestamp(result.frame_index),
            detections: result.detections.iter().map(DetectionRecord::from).collect(),
        }
    }
}

/// Counters written when the run ends.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct RunStats {
    pub frames_processed: u64,
    pub frames_dropped: u64,
    pub stopped_early: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct MetadataLog {
    pub metadata: RunMetadata,
    pub frames: Vec<FrameRecord>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub summary: Option<RunStats>,
}

impl MetadataLog {
    pub fn new(metadata: RunMetadata) -> Self {
        Self {
            metadata,
            frames: Vec::new(),
            summary: None,
        }
    }

    pub fn push(&mut self, record: FrameRecord) {
        self.frames.push(record);
    }

    /// Indices are strictly increasing by one, starting at zero.
    pub fn is_contiguous(&self) -> bool {
        self.frames
            .iter()
            .enumerate()
            .all(|(i, frame)| frame.index == i as u64)
    }
}
