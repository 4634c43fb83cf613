//! Minimap: the frame scaled down with one dot per detection center.

use image::{Rgba, RgbaImage};

use t7md_models::{alpha_from_percent, RenderConfig};

use super::draw;
use super::layout::{anchor_position, responsive_px};
use super::{HudError, HudModule, HudResult, RenderContext};

/// Minimap width as a fraction of the frame width at 100% scale.
const WIDTH_FRACTION: f64 = 0.15;
const GRID_COLOR: Rgba<u8> = Rgba([255, 255, 255, 100]);

#[derive(Debug, Clone, Copy, Default)]
pub struct Minimap;

impl Minimap {
    /// Map size for a `width x height` frame, keeping the aspect ratio.
    pub fn size(width: u32, height: u32, scale: u32) -> (u32, u32) {
        let map_w = (f64::from(width) * WIDTH_FRACTION * f64::from(scale) / 100.0) as u32;
        let map_h = if width == 0 {
            0
        } else {
            (f64::from(map_w) * f64::from(height) / f64::from(width)) as u32
        };
        (map_w, map_h)
    }
}

impl HudModule for Minimap {
    fn name(&self) -> &'static str {
        "minimap"
    }

    fn enabled(&self, config: &RenderConfig) -> bool {
        config.modules.minimap.enabled
    }

    fn render(&self, ctx: &RenderContext<'_>, canvas: &mut RgbaImage) -> HudResult<()> {
        let cfg = &ctx.config.modules.minimap;
        let (w, h) = (ctx.width(), ctx.height());
        let (map_w, map_h) = Self::size(w, h, cfg.scale);
        if map_w == 0 || map_h == 0 {
            return Err(HudError::Layout(format!("minimap collapses at {}x{}", w, h)));
        }

        let (x, y) = anchor_position(w, h, map_w, map_h, cfg.position, ctx.margin());

        let bg_alpha = alpha_from_percent(cfg.bg_opacity);
        if bg_alpha > 0 {
            draw::fill_rect(canvas, x, y, map_w, map_h, cfg.bg_color.with_alpha(bg_alpha).into());
        }
        if cfg.border_thick > 0 {
            draw::outline_rect(
                canvas,
                x,
                y,
                map_w,
                map_h,
                cfg.border_thick,
                cfg.border_color.with_alpha(255).into(),
            );
        }

        // Rule-of-thirds grid
        for third in [1, 2] {
            let gx = x + (map_w * third / 3) as i32;
            let gy = y + (map_h * third / 3) as i32;
            draw::line(canvas, (gx, y), (gx, y + map_h as i32), 1, GRID_COLOR);
            draw::line(canvas, (x, gy), (x + map_w as i32, gy), 1, GRID_COLOR);
        }

        let dot = responsive_px(f64::from(cfg.dot_size), h, 100) as i32;
        let (sx, sy) = (f64::from(map_w) / f64::from(w), f64::from(map_h) / f64::from(h));
        for detection in &ctx.result.detections {
            let (cx, cy) = detection.center();
            let mx = x + (f64::from(cx) * sx) as i32;
            let my = y + (f64::from(cy) * sy) as i32;
            let (color, _) = ctx.config.modules.bboxes.style_for(detection.category);
            let side = (2 * dot) as u32;
            draw::fill_rect(canvas, mx - dot, my - dot, side, side, color.with_alpha(255).into());
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hud::test_support::detection;
    use image::RgbImage;
    use t7md_models::{Category, FrameResult, VideoMeta};

    fn render(result: &FrameResult, config: &RenderConfig, w: u32, h: u32) -> HudResult<RgbaImage> {
        let source = RgbImage::new(w, h);
        let meta = VideoMeta::new(w, h, 30.0, 1);
        let ctx = RenderContext {
            source: &source,
            result,
            meta: &meta,
            config,
            font: None,
        };
        let mut canvas = RgbaImage::new(w, h);
        Minimap.render(&ctx, &mut canvas)?;
        Ok(canvas)
    }

    #[test]
    fn test_size_keeps_aspect() {
        assert_eq!(Minimap::size(1920, 1080, 100), (288, 162));
        assert_eq!(Minimap::size(1920, 1080, 50), (144, 81));
    }

    #[test]
    fn test_dot_uses_category_color() {
        let mut config = RenderConfig::default();
        config.style.global_margin = 0;
        config.modules.minimap.position = t7md_models::Anchor::TOP_LEFT;
        let result = FrameResult::new(
            0,
            vec![detection(Category::Face, [1000.0, 500.0, 1080.0, 580.0], 0.9)],
        );

        let canvas = render(&result, &config, 1920, 1080).unwrap();
        // Center (1040, 540) maps to (156, 81) on a 288x162 map.
        assert_eq!(canvas.get_pixel(156, 81).0, [0, 255, 255, 255]);
        // Border
        assert_eq!(canvas.get_pixel(0, 50).0, [255, 255, 255, 255]);
        // Background
        assert_eq!(canvas.get_pixel(20, 20).0, [0, 0, 0, 204]);
        assert_eq!(canvas.get_pixel(300, 20)[3], 0);
    }

    #[test]
    fn test_tiny_frame_is_layout_error() {
        let err = render(&FrameResult::empty(0), &RenderConfig::default(), 4, 4).unwrap_err();
        assert!(matches!(err, HudError::Layout(_)));
    }
}
