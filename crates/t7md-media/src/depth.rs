//! Depth estimation boundary and the smoothed depth stage.

use async_trait::async_trait;
use image::{DynamicImage, GrayImage, RgbImage};
use std::sync::Arc;
use tracing::{debug, warn};

use crate::error::MediaResult;
use crate::smoother::TemporalSmoother;

/// Black-box dense depth model: one color frame in, one single-channel map
/// out. The output keeps the aspect ratio but not necessarily the size.
#[async_trait]
pub trait DepthEstimator: Send + Sync {
    /// Initialization probe. A failure disables the depth stream for the run.
    async fn ready(&self) -> MediaResult<()>;

    async fn estimate(&self, frame: &RgbImage) -> MediaResult<GrayImage>;

    /// Estimator name for logging.
    fn name(&self) -> &'static str;
}

/// Per-run depth pipeline: estimate, smooth, convert for encoding.
pub struct DepthStage {
    estimator: Arc<dyn DepthEstimator>,
    smoother: TemporalSmoother,
    failures: u64,
}

impl DepthStage {
    pub fn new(estimator: Arc<dyn DepthEstimator>, smoother: TemporalSmoother) -> Self {
        Self {
            estimator,
            smoother,
            failures: 0,
        }
    }

    /// Probe the estimator and build a stage, or `None` when it is unusable.
    pub async fn try_init(
        estimator: Arc<dyn DepthEstimator>,
        alpha: f32,
        width: u32,
        height: u32,
    ) -> Option<Self> {
        if let Err(e) = estimator.ready().await {
            warn!(estimator = estimator.name(), "Depth estimator unavailable, depth stream disabled: {}", e);
            return None;
        }
        match TemporalSmoother::new(alpha, width, height) {
            Ok(smoother) => Some(Self::new(estimator, smoother)),
            Err(e) => {
                warn!("Depth stream disabled: {}", e);
                None
            }
        }
    }

    /// Smoothed depth visualization for `frame` as an RGB image.
    ///
    /// An estimator failure yields the previous smoothed map, or a neutral
    /// frame when there is none.
    pub async fn process(&mut self, frame: &RgbImage, frame_index: u64) -> RgbImage {
        let depth = match self.estimator.estimate(frame).await {
            Ok(map) => self.smoother.smooth(&map),
            Err(e) => {
                self.failures += 1;
                warn!(
                    frame_index,
                    estimator = self.estimator.name(),
                    "Depth estimation failed, reusing previous map: {}",
                    e
                );
                self.smoother.stale_or_neutral()
            }
        };
        debug!(frame_index, "Depth frame ready");
        DynamicImage::ImageLuma8(depth).to_rgb8()
    }

    pub fn failures(&self) -> u64 {
        self.failures
    }
}
