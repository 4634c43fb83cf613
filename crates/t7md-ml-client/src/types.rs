//! Wire types for the recognition service.
//!
//! Frames travel as base64 JPEG; depth maps come back as base64 PNG.

use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use image::codecs::jpeg::JpegEncoder;
use image::{GrayImage, RgbImage};
use serde::{Deserialize, Serialize};

use t7md_media::DetectionRequest;

use crate::error::{MlError, MlResult};

/// JPEG quality for uploaded frames.
pub const JPEG_QUALITY: u8 = 90;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    /// Models loaded by the service
    #[serde(default)]
    pub models: Vec<String>,
}

impl HealthResponse {
    pub fn is_healthy(&self) -> bool {
        self.status == "healthy" || self.status == "ok"
    }
}

/// `POST /detect` body.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DetectBody {
    /// Base64 JPEG frame
    pub image: String,
    pub faces: bool,
    pub persons: bool,
    pub objects: bool,
    pub custom_classes: Vec<String>,
    pub face_confidence: f64,
    pub person_confidence: f64,
    pub object_confidence: f64,
}

impl DetectBody {
    pub fn new(image: String, request: &DetectionRequest) -> Self {
        Self {
            image,
            faces: request.faces,
            persons: request.persons,
            objects: request.objects,
            custom_classes: request.custom_classes.clone(),
            face_confidence: request.face_confidence,
            person_confidence: request.person_confidence,
            object_confidence: request.object_confidence,
        }
    }
}

/// `POST /depth` body.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DepthBody {
    /// Base64 JPEG frame
    pub image: String,
}

/// `POST /depth` response.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DepthResponse {
    /// Base64 single-channel PNG
    pub depth: String,
}

impl DepthResponse {
    pub fn decode(&self) -> MlResult<GrayImage> {
        let bytes = STANDARD
            .decode(self.depth.as_bytes())
            .map_err(|e| MlError::InvalidResponse(format!("depth is not base64: {}", e)))?;
        Ok(image::load_from_memory(&bytes)?.to_luma8())
    }
}

/// Encode a frame as base64 JPEG.
pub fn encode_frame(frame: &RgbImage) -> MlResult<String> {
    let mut buf = Vec::new();
    JpegEncoder::new_with_quality(&mut buf, JPEG_QUALITY).encode_image(frame)?;
    Ok(STANDARD.encode(buf))
}
