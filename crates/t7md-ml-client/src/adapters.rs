//! Pipeline collaborators backed by the HTTP service.

use async_trait::async_trait;
use image::{GrayImage, RgbImage};
use std::sync::Arc;

use t7md_media::{DepthEstimator, DetectionRequest, Detector, MediaError, MediaResult};
use t7md_models::RawDetections;

use crate::client::MlClient;

/// [`Detector`] calling `POST /detect`.
#[derive(Clone)]
pub struct HttpDetector {
    client: Arc<MlClient>,
}

impl HttpDetector {
    pub fn new(client: Arc<MlClient>) -> Self {
        Self { client }
    }
}

#[async_trait]
impl Detector for HttpDetector {
    async fn detect(&self, frame: &RgbImage, request: &DetectionRequest) -> MediaResult<RawDetections> {
        self.client
            .detect(frame, request)
            .await
            .map_err(|e| MediaError::detection_failed(e.to_string()))
    }

    fn name(&self) -> &'static str {
        "http"
    }
}

/// [`DepthEstimator`] calling `POST /depth`. Ready when `/health` reports
/// a healthy service.
#[derive(Clone)]
pub struct HttpDepthEstimator {
    client: Arc<MlClient>,
}

impl HttpDepthEstimator {
    pub fn new(client: Arc<MlClient>) -> Self {
        Self { client }
    }
}

#[async_trait]
impl DepthEstimator for HttpDepthEstimator {
    async fn ready(&self) -> MediaResult<()> {
        match self.client.health_check().await {
            Ok(true) => Ok(()),
            Ok(false) => Err(MediaError::depth_failed(format!(
                "service at {} is not healthy",
                self.client.base_url()
            ))),
            Err(e) => Err(MediaError::depth_failed(e.to_string())),
        }
    }

    async fn estimate(&self, frame: &RgbImage) -> MediaResult<GrayImage> {
        self.client
            .estimate_depth(frame)
            .await
            .map_err(|e| MediaError::depth_failed(e.to_string()))
    }

    fn name(&self) -> &'static str {
        "http"
    }
}
