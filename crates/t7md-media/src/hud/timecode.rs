//! Timecode readout in `HH:MM:SS:FF`.

use image::RgbaImage;

use t7md_models::{alpha_from_percent, format_timecode, RenderConfig};

use super::draw;
use super::layout::anchor_position;
use super::{HudModule, HudResult, RenderContext};

const BASE_FONT_SIZE: f64 = 24.0;

#[derive(Debug, Clone, Copy, Default)]
pub struct TimecodeDisplay;

impl HudModule for TimecodeDisplay {
    fn name(&self) -> &'static str {
        "timecode"
    }

    fn enabled(&self, config: &RenderConfig) -> bool {
        config.modules.timecode.enabled
    }

    fn render(&self, ctx: &RenderContext<'_>, canvas: &mut RgbaImage) -> HudResult<()> {
        let cfg = &ctx.config.modules.timecode;
        let font = ctx.require_font()?;
        let px = ctx.font_px(BASE_FONT_SIZE, cfg.scale);
        let pad = (px * 0.5) as u32;

        let text = format_timecode(ctx.result.frame_index, ctx.meta.fps);
        let (tw, th) = draw::measure(font, px, &text);
        let (box_w, box_h) = (tw + 2 * pad, th + pad);

        let (x, y) = anchor_position(
            ctx.width(),
            ctx.height(),
            box_w,
            box_h,
            cfg.position,
            ctx.margin(),
        );

        let bg_alpha = alpha_from_percent(cfg.bg_opacity);
        if bg_alpha > 0 {
            draw::fill_rect(canvas, x, y, box_w, box_h, cfg.bg_color.with_alpha(bg_alpha).into());
        }
        draw::text(
            canvas,
            font,
            px,
            x + pad as i32,
            y + (pad / 4) as i32,
            &text,
            cfg.text_color.with_alpha(255).into(),
        );

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hud::{HudError, HudFont};
    use image::RgbImage;
    use t7md_models::{FrameResult, VideoMeta};

    #[test]
    fn test_requires_font() {
        let source = RgbImage::new(64, 64);
        let result = FrameResult::empty(95);
        let meta = VideoMeta::new(64, 64, 30.0, 100);
        let config = RenderConfig::default();
        let ctx = RenderContext {
            source: &source,
            result: &result,
            meta: &meta,
            config: &config,
            font: None,
        };
        let err = TimecodeDisplay.render(&ctx, &mut RgbaImage::new(64, 64)).unwrap_err();
        assert!(matches!(err, HudError::FontUnavailable(_)));
    }

    #[test]
    fn test_box_anchored_bottom_left() {
        let Ok(font) = HudFont::discover("") else {
            return;
        };
        let source = RgbImage::new(540, 270);
        let result = FrameResult::empty(95);
        let meta = VideoMeta::new(540, 270, 30.0, 100);
        let config = RenderConfig::default();
        let ctx = RenderContext {
            source: &source,
            result: &result,
            meta: &meta,
            config: &config,
            font: Some(&font),
        };
        let mut canvas = RgbaImage::new(540, 270);
        TimecodeDisplay.render(&ctx, &mut canvas).unwrap();

        let margin = ctx.margin();
        assert_eq!(canvas.get_pixel(margin, 270 - margin - 1).0, [0, 0, 0, 204]);
        assert_eq!(canvas.get_pixel(margin, 270 - margin)[3], 0);
        assert!(canvas.get_pixel(530, 5)[3] == 0);
    }
}
