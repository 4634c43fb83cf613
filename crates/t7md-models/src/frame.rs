//! Per-frame result and source video metadata.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::detection::{Category, Detection};

/// Frame rate assumed when the source reports none.
pub const DEFAULT_FPS: f64 = 30.0;

/// Source video metadata reported by the decoder.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct VideoMeta {
    pub width: u32,
    pub height: u32,
    /// Frame rate as reported; may be 0 for broken containers
    pub fps: f64,
    /// Total frame count; 0 when unknown
    pub total_frames: u64,
}

impl VideoMeta {
    pub fn new(width: u32, height: u32, fps: f64, total_frames: u64) -> Self {
        Self {
            width,
            height,
            fps,
            total_frames,
        }
    }

    /// Frame rate used for timing, falling back to 30 when the source
    /// reports a non-positive rate.
    pub fn effective_fps(&self) -> f64 {
        if self.fps > 0.0 && self.fps.is_finite() {
            self.fps
        } else {
            DEFAULT_FPS
        }
    }

    /// Presentation time in seconds of a frame index.
    pub fn timestamp(&self, frame_index: u64) -> f64 {
        frame_index as f64 / self.effective_fps()
    }

    /// Progress percentage after `frames_done` frames, clamped to 100.
    pub fn percent(&self, frames_done: u64) -> u8 {
        if self.total_frames == 0 {
            return 0;
        }
        ((frames_done.saturating_mul(100)) / self.total_frames).min(100) as u8
    }
}

/// Detection counts for one frame.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CategoryCounts {
    pub faces: usize,
    pub persons: usize,
    pub objects: usize,
}

/// Aggregate for one processed source frame.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct FrameResult {
    /// Monotonic, 0-based index over frames actually read
    pub frame_index: u64,
    /// Ordered by category, then discovery order
    pub detections: Vec<Detection>,
}

impl FrameResult {
    pub fn new(frame_index: u64, detections: Vec<Detection>) -> Self {
        Self {
            frame_index,
            detections,
        }
    }

    pub fn empty(frame_index: u64) -> Self {
        Self::new(frame_index, Vec::new())
    }

    pub fn of_category(&self, category: Category) -> impl Iterator<Item = &Detection> {
        self.detections
            .iter()
            .filter(move |d| d.category == category)
    }

    pub fn counts(&self) -> CategoryCounts {
        self.detections
            .iter()
            .fold(CategoryCounts::default(), |mut counts, d| {
                match d.category {
                    Category::Face => counts.faces += 1,
                    Category::Person => counts.persons += 1,
                    Category::Object => counts.objects += 1,
                }
                counts
            })
    }
}
