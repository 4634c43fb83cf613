//! Free-text message banner.

use image::{Rgba, RgbaImage};

use t7md_models::{alpha_from_percent, RenderConfig};

use super::draw;
use super::layout::anchor_position;
use super::{HudModule, HudResult, RenderContext};

const BASE_FONT_SIZE: f64 = 24.0;
const SHADOW_OFFSET: i32 = 2;
const SHADOW_COLOR: Rgba<u8> = Rgba([0, 0, 0, 255]);

/// Multi-line banner. With a fully transparent background each line gets a
/// drop shadow so it stays readable.
#[derive(Debug, Clone, Copy, Default)]
pub struct MessageBanner;

impl HudModule for MessageBanner {
    fn name(&self) -> &'static str {
        "custom_msg"
    }

    fn enabled(&self, config: &RenderConfig) -> bool {
        config.modules.custom_msg.enabled
    }

    fn render(&self, ctx: &RenderContext<'_>, canvas: &mut RgbaImage) -> HudResult<()> {
        let cfg = &ctx.config.modules.custom_msg;
        if cfg.text.trim().is_empty() {
            return Ok(());
        }
        let font = ctx.require_font()?;
        let px = ctx.font_px(BASE_FONT_SIZE, cfg.scale);
        let line_h = px as u32 + 4;
        let pad = (px * 0.5) as u32;

        let lines: Vec<&str> = cfg.text.lines().collect();
        let max_w = lines
            .iter()
            .map(|line| draw::measure(font, px, line).0)
            .max()
            .unwrap_or(0);
        let box_w = max_w + 2 * pad;
        let box_h = lines.len() as u32 * line_h + pad;

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

        let color = cfg.text_color.with_alpha(255).into();
        let mut line_y = y + (pad / 2) as i32;
        for line in lines {
            let line_x = x + pad as i32;
            if bg_alpha == 0 {
                draw::text(
                    canvas,
                    font,
                    px,
                    line_x + SHADOW_OFFSET,
                    line_y + SHADOW_OFFSET,
                    line,
                    SHADOW_COLOR,
                );
            }
            draw::text(canvas, font, px, line_x, line_y, line, color);
            line_y += line_h as i32;
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hud::{HudError, HudFont};
    use image::RgbImage;
    use t7md_models::{FrameResult, VideoMeta};

    fn render(config: &RenderConfig, font: Option<&HudFont>) -> HudResult<RgbaImage> {
        let source = RgbImage::new(400, 200);
        let result = FrameResult::empty(0);
        let meta = VideoMeta::new(400, 200, 30.0, 1);
        let ctx = RenderContext {
            source: &source,
            result: &result,
            meta: &meta,
            config,
            font,
        };
        let mut canvas = RgbaImage::new(400, 200);
        MessageBanner.render(&ctx, &mut canvas)?;
        Ok(canvas)
    }

    #[test]
    fn test_empty_text_is_noop() {
        let mut config = RenderConfig::default();
        config.modules.custom_msg.enabled = true;
        config.modules.custom_msg.text = "  ".to_string();
        let canvas = render(&config, None).unwrap();
        assert!(canvas.pixels().all(|p| p[3] == 0));
    }

    #[test]
    fn test_text_requires_font() {
        let mut config = RenderConfig::default();
        config.modules.custom_msg.enabled = true;
        assert!(matches!(render(&config, None), Err(HudError::FontUnavailable(_))));
    }

    #[test]
    fn test_shadow_without_background() {
        let Ok(font) = HudFont::discover("") else {
            return;
        };
        let mut config = RenderConfig::default();
        config.modules.custom_msg.enabled = true;
        config.modules.custom_msg.text = "HELLO\nWORLD".to_string();
        config.modules.custom_msg.scale = 400;

        let canvas = render(&config, Some(&font)).unwrap();
        assert!(canvas.pixels().any(|p| p[3] > 0 && p[0] == 0 && p[1] == 0 && p[2] == 0));
        assert!(canvas.pixels().any(|p| p[3] > 0 && p[0] > 200));
    }
}
