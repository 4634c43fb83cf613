//! Anti-flicker filter for the depth stream.
//!
//! A first-order IIR low-pass over a dense single-channel map:
//! `S = a * current + (1 - a) * S`. Lower `a` means steadier output with
//! more lag on motion. State is owned by one smoother instance, created
//! per run.

use image::imageops::{self, FilterType};
use image::{GrayImage, Luma};

use crate::error::{MediaError, MediaResult};

/// Reference blend weight.
pub const DEFAULT_ALPHA: f32 = 0.8;

/// Value of the neutral frame returned when no depth has been seen yet.
pub const NEUTRAL_DEPTH: u8 = 128;

/// Exponential moving average over depth maps at a fixed resolution.
#[derive(Debug, Clone)]
pub struct TemporalSmoother {
    alpha: f32,
    width: u32,
    height: u32,
    /// Previous smoothed map, `width * height` values
    state: Option<Vec<f32>>,
}

impl TemporalSmoother {
    /// Create a smoother producing `width x height` maps.
    ///
    /// `alpha` must lie in `(0, 1]`.
    pub fn new(alpha: f32, width: u32, height: u32) -> MediaResult<Self> {
        if !(alpha > 0.0 && alpha <= 1.0) {
            return Err(MediaError::InvalidConfig(format!(
                "depth smoothing alpha must be in (0, 1], got {}",
                alpha
            )));
        }
        if width == 0 || height == 0 {
            return Err(MediaError::InvalidConfig(format!(
                "depth map size must be non-zero, got {}x{}",
                width, height
            )));
        }
        Ok(Self {
            alpha,
            width,
            height,
            state: None,
        })
    }

    pub fn alpha(&self) -> f32 {
        self.alpha
    }

    pub fn has_state(&self) -> bool {
        self.state.is_some()
    }

    /// Blend `current` into the state and return the result in display range.
    ///
    /// `current` is resampled to the smoother's resolution first, so the
    /// state always matches the output video exactly.
    pub fn smooth(&mut self, current: &GrayImage) -> GrayImage {
        let resized;
        let current = if current.dimensions() == (self.width, self.height) {
            current
        } else {
            resized = imageops::resize(current, self.width, self.height, FilterType::Triangle);
            &resized
        };

        let alpha = self.alpha;
        if let Some(state) = self.state.as_mut() {
            for (s, px) in state.iter_mut().zip(current.pixels()) {
                // Same as a*x + (1-a)*s, exact when x == s.
                *s += alpha * (f32::from(px[0]) - *s);
            }
        } else {
            self.state = Some(current.pixels().map(|px| f32::from(px[0])).collect());
        }

        self.stale_or_neutral()
    }

    /// Last smoothed map, or a flat neutral frame before the first call.
    pub fn stale_or_neutral(&self) -> GrayImage {
        match &self.state {
            Some(state) => {
                let data = state.iter().map(|v| v.clamp(0.0, 255.0) as u8).collect();
                GrayImage::from_raw(self.width, self.height, data).unwrap_or_else(|| self.neutral())
            }
            None => self.neutral(),
        }
    }

    fn neutral(&self) -> GrayImage {
        GrayImage::from_pixel(self.width, self.height, Luma([NEUTRAL_DEPTH]))
    }

    /// Drop the state, e.g. when depth is toggled off mid-run.
    pub fn reset(&mut self) {
        self.state = None;
    }
}
