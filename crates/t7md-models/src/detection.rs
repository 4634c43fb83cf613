//! Detection value types.
//!
//! The recognition stage reports three heterogeneous lists (faces, persons,
//! objects). They are unified here into one ordered `Detection` sequence
//! tagged by [`Category`], so every downstream consumer dispatches over the
//! enum instead of matching on label strings.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;
use tracing::warn;

use crate::error::{ModelError, ModelResult};

/// Label the recognition stage uses for people in the combined
/// person/object stream.
pub const PERSON_LABEL: &str = "person";

/// Label given to face detections.
pub const FACE_LABEL: &str = "Face";

/// Coarse classification bucket for a detection.
///
/// Ordering follows the emission order of a frame: faces, then persons,
/// then objects.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, JsonSchema,
)]
#[serde(rename_all = "snake_case")]
pub enum Category {
    Face,
    Person,
    Object,
}

impl Category {
    /// All categories in emission order.
    pub const ALL: &'static [Category] = &[Category::Face, Category::Person, Category::Object];

    /// Returns the category name as a string.
    pub fn as_str(&self) -> &'static str {
        match self {
            Category::Face => "face",
            Category::Person => "person",
            Category::Object => "object",
        }
    }

    /// Classify a label from the combined person/object stream.
    ///
    /// Only the literal `"person"` label maps to [`Category::Person`]; every
    /// other label, including ones the product never configured, is treated
    /// as an object.
    pub fn classify_label(label: &str) -> Category {
        if label == PERSON_LABEL {
            Category::Person
        } else {
            Category::Object
        }
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for Category {
    type Err = CategoryParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "face" | "faces" => Ok(Category::Face),
            "person" | "persons" => Ok(Category::Person),
            "object" | "objects" => Ok(Category::Object),
            _ => Err(CategoryParseError(s.to_string())),
        }
    }
}

#[derive(Debug, Error)]
#[error("Unknown detection category: {0}")]
pub struct CategoryParseError(String);

/// Axis-aligned box in pixel coordinates with `x1 < x2` and `y1 < y2`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct BoundingBox {
    pub x1: f64,
    pub y1: f64,
    pub x2: f64,
    pub y2: f64,
}

/// Integer pixel rectangle already clamped to a frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PixelRect {
    pub x: u32,
    pub y: u32,
    pub width: u32,
    pub height: u32,
}

impl BoundingBox {
    /// Create a bounding box, rejecting degenerate or non-finite corners.
    pub fn new(x1: f64, y1: f64, x2: f64, y2: f64) -> ModelResult<Self> {
        if ![x1, y1, x2, y2].iter().all(|v| v.is_finite()) {
            return Err(ModelError::invalid_bbox(format!(
                "non-finite coordinates [{x1}, {y1}, {x2}, {y2}]"
            )));
        }
        if x2 <= x1 || y2 <= y1 {
            return Err(ModelError::invalid_bbox(format!(
                "empty box [{x1}, {y1}, {x2}, {y2}]"
            )));
        }
        Ok(Self { x1, y1, x2, y2 })
    }

    /// Create from the `[x1, y1, x2, y2]` array used on the wire.
    pub fn from_array(coords: [f64; 4]) -> ModelResult<Self> {
        Self::new(coords[0], coords[1], coords[2], coords[3])
    }

    pub fn width(&self) -> f64 {
        self.x2 - self.x1
    }

    pub fn height(&self) -> f64 {
        self.y2 - self.y1
    }

    /// Midpoint rounded for pixel addressing.
    pub fn center(&self) -> (i32, i32) {
        (
            ((self.x1 + self.x2) / 2.0).round() as i32,
            ((self.y1 + self.y2) / 2.0).round() as i32,
        )
    }

    /// Clamp to `[0, width] x [0, height]`.
    ///
    /// Returns `None` when nothing of the box remains inside the frame.
    pub fn clamp_to(&self, width: u32, height: u32) -> Option<PixelRect> {
        let (w, h) = (width as f64, height as f64);
        let x1 = self.x1.clamp(0.0, w) as u32;
        let y1 = self.y1.clamp(0.0, h) as u32;
        let x2 = self.x2.clamp(0.0, w) as u32;
        let y2 = self.y2.clamp(0.0, h) as u32;

        if x2 <= x1 || y2 <= y1 {
            return None;
        }

        Some(PixelRect {
            x: x1,
            y: y1,
            width: x2 - x1,
            height: y2 - y1,
        })
    }
}

/// One recognized region in one frame.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct Detection {
    pub category: Category,
    pub label: String,
    /// Confidence in `[0.0, 1.0]`
    pub confidence: f64,
    pub bbox: BoundingBox,
    /// Identity handle. Always `None`: there is no cross-frame tracking.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub track_id: Option<u32>,
}

impl Detection {
    pub fn new(
        category: Category,
        label: impl Into<String>,
        confidence: f64,
        bbox: BoundingBox,
    ) -> Self {
        Self {
            category,
            label: label.into(),
            confidence: confidence.clamp(0.0, 1.0),
            bbox,
            track_id: None,
        }
    }

    pub fn center(&self) -> (i32, i32) {
        self.bbox.center()
    }
}

/// Minimum confidence per category.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ConfidenceThresholds {
    pub face: f64,
    pub person: f64,
    pub object: f64,
}

impl ConfidenceThresholds {
    /// Thresholds that accept everything.
    pub const NONE: ConfidenceThresholds = ConfidenceThresholds {
        face: 0.0,
        person: 0.0,
        object: 0.0,
    };

    pub fn for_category(&self, category: Category) -> f64 {
        match category {
            Category::Face => self.face,
            Category::Person => self.person,
            Category::Object => self.object,
        }
    }
}

impl Default for ConfidenceThresholds {
    fn default() -> Self {
        Self::NONE
    }
}

/// A single entry as reported by the recognition stage.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct RawDetection {
    pub bbox: [f64; 4],
    pub label: String,
    pub confidence: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub center: Option<[f64; 2]>,
}

impl RawDetection {
    pub fn new(bbox: [f64; 4], label: impl Into<String>, confidence: f64) -> Self {
        Self {
            bbox,
            label: label.into(),
            confidence,
            center: Some([(bbox[0] + bbox[2]) / 2.0, (bbox[1] + bbox[3]) / 2.0]),
        }
    }
}

/// Per-category lists returned by the recognition stage for one frame.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct RawDetections {
    #[serde(default)]
    pub faces: Vec<RawDetection>,
    #[serde(default)]
    pub persons: Vec<RawDetection>,
    #[serde(default)]
    pub objects: Vec<RawDetection>,
}

impl RawDetections {
    pub fn is_empty(&self) -> bool {
        self.faces.is_empty() && self.persons.is_empty() && self.objects.is_empty()
    }

    /// Flatten into one `Detection` list ordered by category, then by
    /// discovery order within each category.
    ///
    /// Entries with malformed boxes or below the category threshold are
    /// dropped.
    pub fn into_detections(self, thresholds: &ConfidenceThresholds) -> Vec<Detection> {
        let tagged = self
            .faces
            .into_iter()
            .map(|raw| (Category::Face, raw))
            .chain(
                self.persons
                    .into_iter()
                    .chain(self.objects)
                    .map(|raw| (Category::classify_label(&raw.label), raw)),
            );

        let mut detections: Vec<Detection> = tagged
            .filter_map(|(category, raw)| {
                let bbox = match BoundingBox::from_array(raw.bbox) {
                    Ok(bbox) => bbox,
                    Err(e) => {
                        warn!(category = %category, label = %raw.label, "Dropping detection: {}", e);
                        return None;
                    }
                };
                if raw.confidence < thresholds.for_category(category) {
                    return None;
                }
                let label = if category == Category::Face && raw.label.is_empty() {
                    FACE_LABEL.to_string()
                } else {
                    raw.label
                };
                Some(Detection::new(category, label, raw.confidence, bbox))
            })
            .collect();

        // Stable: discovery order survives within a category.
        detections.sort_by_key(|d| d.category);
        detections
    }
}
