//! HUD compositor.
//!
//! Six independent modules render onto a frame:
//!
//! - Bounding boxes with crosshair and label tag
//! - Stats panel
//! - Timecode
//! - Minimap
//! - Custom message banner
//! - Face collage
//!
//! The first five draw onto one transparent overlay in that fixed order,
//! which is then alpha-composited over the base frame. The collage is
//! drawn last, directly onto the combined result, because it samples the
//! un-annotated source frame.
//!
//! Rendering is best-effort: a module that fails is logged and skipped and
//! the frame is still emitted.

pub mod bboxes;
pub mod collage;
pub mod draw;
pub mod font;
pub mod layout;
pub mod message;
pub mod minimap;
pub mod stats;
pub mod timecode;

use image::{imageops, DynamicImage, RgbImage, RgbaImage};
use thiserror::Error;
use tracing::{debug, warn};

use t7md_models::{FrameResult, RenderConfig, StyleConfig, VideoMeta};

pub use bboxes::BoundingBoxes;
pub use collage::FaceCollage;
pub use font::HudFont;
pub use layout::{anchor_position, responsive_px, responsive_size, REFERENCE_HEIGHT};
pub use message::MessageBanner;
pub use minimap::Minimap;
pub use stats::StatsPanel;
pub use timecode::TimecodeDisplay;

/// Result type for a single module draw.
pub type HudResult<T> = Result<T, HudError>;

/// Errors raised by individual HUD modules.
#[derive(Debug, Error)]
pub enum HudError {
    #[error("Font unavailable: {0}")]
    FontUnavailable(String),

    #[error("Element cannot be laid out: {0}")]
    Layout(String),
}

/// Everything a module may read while drawing one frame.
///
/// The config is a snapshot taken once per frame, so values cannot change
/// in the middle of a draw.
pub struct RenderContext<'a> {
    /// Un-annotated source frame
    pub source: &'a RgbImage,
    pub result: &'a FrameResult,
    pub meta: &'a VideoMeta,
    pub config: &'a RenderConfig,
    pub font: Option<&'a HudFont>,
}

impl<'a> RenderContext<'a> {
    pub fn width(&self) -> u32 {
        self.source.width()
    }

    pub fn height(&self) -> u32 {
        self.source.height()
    }

    /// Edge margin scaled to the frame height.
    pub fn margin(&self) -> u32 {
        responsive_size(f64::from(self.config.style.global_margin), self.height(), 100) as u32
    }

    /// Font size in pixels for a base size authored at 1080p.
    pub fn font_px(&self, base: f64, scale_percent: u32) -> f32 {
        responsive_px(base, self.height(), scale_percent) as f32
    }

    pub fn require_font(&self) -> HudResult<&'a HudFont> {
        self.font
            .ok_or_else(|| HudError::FontUnavailable("no HUD font loaded".to_string()))
    }
}

/// One overlay element.
pub trait HudModule: Send + Sync {
    /// Module name for logging.
    fn name(&self) -> &'static str;

    fn enabled(&self, config: &RenderConfig) -> bool;

    fn render(&self, ctx: &RenderContext<'_>, canvas: &mut RgbaImage) -> HudResult<()>;
}

/// Which isolated layer to render for image-sequence output.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LayerKind {
    /// Bounding boxes only.
    Bbox,
    /// Stats, timecode, minimap, message and collage.
    Hud,
}

/// Overlay modules in drawing order.
const OVERLAY_MODULES: [&dyn HudModule; 5] = [
    &BoundingBoxes,
    &StatsPanel,
    &TimecodeDisplay,
    &Minimap,
    &MessageBanner,
];

const HUD_LAYER_MODULES: [&dyn HudModule; 4] =
    [&StatsPanel, &TimecodeDisplay, &Minimap, &MessageBanner];

const BBOX_LAYER_MODULES: [&dyn HudModule; 1] = [&BoundingBoxes];

/// Stateless-per-call compositor. Holds only the loaded font.
#[derive(Debug, Clone, Default)]
pub struct HudCompositor {
    font: Option<HudFont>,
    font_key: String,
}

impl HudCompositor {
    /// Build a compositor, resolving the font from the style section.
    pub fn new(style: &StyleConfig) -> Self {
        Self {
            font: Self::load_font(&style.font_path),
            font_key: style.font_path.clone(),
        }
    }

    pub fn with_font(font: Option<HudFont>) -> Self {
        Self {
            font,
            font_key: String::new(),
        }
    }

    fn load_font(path: &str) -> Option<HudFont> {
        match HudFont::discover(path) {
            Ok(font) => Some(font),
            Err(e) => {
                warn!("HUD text disabled: {}", e);
                None
            }
        }
    }

    pub fn font(&self) -> Option<&HudFont> {
        self.font.as_ref()
    }

    /// Reload the font if `style.font_path` changed since the last call.
    pub fn refresh_font(&mut self, style: &StyleConfig) {
        if style.font_path != self.font_key {
            self.font_key = style.font_path.clone();
            self.font = Self::load_font(&style.font_path);
        }
    }

    /// Draw the full HUD over `frame`.
    pub fn composite(
        &self,
        frame: &RgbImage,
        result: &FrameResult,
        meta: &VideoMeta,
        config: &RenderConfig,
    ) -> RgbImage {
        let ctx = self.context(frame, result, meta, config);

        let mut combined = DynamicImage::ImageRgb8(frame.clone()).to_rgba8();
        if OVERLAY_MODULES.iter().any(|m| m.enabled(config)) {
            let mut overlay = RgbaImage::new(frame.width(), frame.height());
            draw_modules(&ctx, &OVERLAY_MODULES, &mut overlay);
            imageops::overlay(&mut combined, &overlay, 0, 0);
        }
        draw_modules(&ctx, &[&FaceCollage], &mut combined);

        DynamicImage::ImageRgba8(combined).to_rgb8()
    }

    /// Render one isolated transparent layer the size of `frame`.
    pub fn render_layer(
        &self,
        frame: &RgbImage,
        result: &FrameResult,
        meta: &VideoMeta,
        config: &RenderConfig,
        kind: LayerKind,
    ) -> RgbaImage {
        let ctx = self.context(frame, result, meta, config);
        let mut layer = RgbaImage::new(frame.width(), frame.height());

        match kind {
            LayerKind::Bbox => draw_modules(&ctx, &BBOX_LAYER_MODULES, &mut layer),
            LayerKind::Hud => {
                draw_modules(&ctx, &HUD_LAYER_MODULES, &mut layer);
                draw_modules(&ctx, &[&FaceCollage], &mut layer);
            }
        }

        layer
    }

    fn context<'a>(
        &'a self,
        frame: &'a RgbImage,
        result: &'a FrameResult,
        meta: &'a VideoMeta,
        config: &'a RenderConfig,
    ) -> RenderContext<'a> {
        RenderContext {
            source: frame,
            result,
            meta,
            config,
            font: self.font.as_ref(),
        }
    }
}

fn draw_modules(ctx: &RenderContext<'_>, modules: &[&dyn HudModule], canvas: &mut RgbaImage) {
    for module in modules {
        if !module.enabled(ctx.config) {
            continue;
        }
        match module.render(ctx, canvas) {
            Ok(()) => {}
            // Known at construction time and already reported once.
            Err(e @ HudError::FontUnavailable(_)) => debug!(
                module = module.name(),
                frame_index = ctx.result.frame_index,
                "HUD module skipped: {}",
                e
            ),
            Err(e) => warn!(
                module = module.name(),
                frame_index = ctx.result.frame_index,
                "HUD module failed: {}",
                e
            ),
        }
    }
}


#[cfg(test)]
mod tests {
    use super::test_support::*;
    use super::*;
    use image::Rgb;
    use t7md_models::Category;

    fn gray_frame(w: u32, h: u32) -> RgbImage {
        RgbImage::from_pixel(w, h, Rgb([50, 50, 50]))
    }

    #[test]
    fn test_all_disabled_returns_source() {
        let frame = gray_frame(64, 36);
        let result = FrameResult::new(0, vec![detection(Category::Face, [5.0, 5.0, 20.0, 20.0], 0.9)]);
        let meta = VideoMeta::new(64, 36, 30.0, 1);

        let out = HudCompositor::with_font(None).composite(&frame, &result, &meta, &all_disabled());
        assert_eq!(out, frame);
    }

    #[test]
    fn test_boxes_survive_missing_font() {
        let frame = gray_frame(200, 200);
        let result = FrameResult::new(
            7,
            vec![detection(Category::Person, [100.0, 100.0, 180.0, 180.0], 0.8)],
        );
        let meta = VideoMeta::new(200, 200, 30.0, 10);
        let mut config = RenderConfig::default();
        config.modules.minimap.enabled = false;
        config.modules.collage.enabled = false;

        // Stats and timecode need a font and are skipped; boxes still draw.
        let out = HudCompositor::with_font(None).composite(&frame, &result, &meta, &config);
        assert_eq!(*out.get_pixel(100, 140), Rgb([0, 255, 0]));
        assert_eq!(*out.get_pixel(140, 110), Rgb([50, 50, 50]));
    }

    #[test]
    fn test_layers_are_separated() {
        let frame = gray_frame(200, 200);
        let result = FrameResult::new(
            0,
            vec![detection(Category::Object, [100.0, 100.0, 180.0, 180.0], 0.8)],
        );
        let meta = VideoMeta::new(200, 200, 30.0, 10);
        let mut config = all_disabled();
        config.modules.bboxes.enabled = true;
        config.modules.bboxes.show_crosshair = false;
        config.modules.minimap.enabled = true;

        let compositor = HudCompositor::with_font(None);
        let bbox = compositor.render_layer(&frame, &result, &meta, &config, LayerKind::Bbox);
        let hud = compositor.render_layer(&frame, &result, &meta, &config, LayerKind::Hud);

        assert_eq!(bbox.dimensions(), (200, 200));
        assert_eq!(bbox.get_pixel(100, 140).0, [255, 255, 0, 255]);
        assert_eq!(hud.get_pixel(100, 140)[3], 0);
        // Minimap sits at the top right and only on the HUD layer.
        assert!(hud.pixels().any(|p| p[3] > 0));
        assert_eq!(bbox.get_pixel(190, 10)[3], 0);
    }
}
