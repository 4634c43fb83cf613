//! Recognition stage boundary.

use async_trait::async_trait;
use image::RgbImage;
use serde::{Deserialize, Serialize};

use t7md_models::{ModelsConfig, RawDetections};

use crate::error::MediaResult;

/// What the recognition stage should look for in a frame.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DetectionRequest {
    pub faces: bool,
    pub persons: bool,
    pub objects: bool,
    /// Extra class names for the object detector
    pub custom_classes: Vec<String>,
    pub face_confidence: f64,
    pub person_confidence: f64,
    pub object_confidence: f64,
}

impl DetectionRequest {
    /// Returns true if no detector is enabled.
    pub fn is_empty(&self) -> bool {
        !(self.faces || self.persons || self.objects)
    }
}

impl From<&ModelsConfig> for DetectionRequest {
    fn from(models: &ModelsConfig) -> Self {
        Self {
            faces: models.use_faces,
            persons: models.use_persons,
            objects: models.use_objects,
            custom_classes: models.custom_classes.clone(),
            face_confidence: models.face_confidence,
            person_confidence: models.person_confidence,
            object_confidence: models.object_confidence,
        }
    }
}

/// Black-box detector returning per-category raw detections.
#[async_trait]
pub trait Detector: Send + Sync {
    async fn detect(
        &self,
        frame: &RgbImage,
        request: &DetectionRequest,
    ) -> MediaResult<RawDetections>;

    /// Detector name for logging.
    fn name(&self) -> &'static str;
}

/// Detector that never finds anything.
#[derive(Debug, Clone, Copy, Default)]
pub struct NullDetector;

#[async_trait]
impl Detector for NullDetector {
    async fn detect(
        &self,
        _frame: &RgbImage,
        _request: &DetectionRequest,
    ) -> MediaResult<RawDetections> {
        Ok(RawDetections::default())
    }

    fn name(&self) -> &'static str {
        "null"
    }
}
