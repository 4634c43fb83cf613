//! Bounding-box layer.

use image::RgbaImage;

use t7md_models::RenderConfig;

use super::draw;
use super::{HudModule, HudResult, RenderContext};

/// Half-length of the crosshair arms in pixels.
const CROSSHAIR_ARM: i32 = 10;
/// Crosshair opacity.
const CROSSHAIR_ALPHA: u8 = 200;
/// Label font size at 1080p.
const LABEL_BASE_SIZE: f64 = 12.0;

/// Per-detection rectangle, optional crosshair and a filled label tag with
/// the label and confidence.
#[derive(Debug, Clone, Copy, Default)]
pub struct BoundingBoxes;

impl HudModule for BoundingBoxes {
    fn name(&self) -> &'static str {
        "bboxes"
    }

    fn enabled(&self, config: &RenderConfig) -> bool {
        config.modules.bboxes.enabled
    }

    fn render(&self, ctx: &RenderContext<'_>, canvas: &mut RgbaImage) -> HudResult<()> {
        let cfg = &ctx.config.modules.bboxes;
        let label_px = ctx.font_px(LABEL_BASE_SIZE, cfg.label_scale);

        for detection in &ctx.result.detections {
            let Some(rect) = detection.bbox.clamp_to(ctx.width(), ctx.height()) else {
                continue;
            };
            let (color, thickness) = cfg.style_for(detection.category);
            let (x, y) = (rect.x as i32, rect.y as i32);

            draw::outline_rect(
                canvas,
                x,
                y,
                rect.width,
                rect.height,
                thickness.max(1),
                color.with_alpha(255).into(),
            );

            if cfg.show_crosshair {
                let (cx, cy) = detection.center();
                let cross = color.with_alpha(CROSSHAIR_ALPHA).into();
                draw::line(canvas, (cx - CROSSHAIR_ARM, cy), (cx + CROSSHAIR_ARM, cy), thickness, cross);
                draw::line(canvas, (cx, cy - CROSSHAIR_ARM), (cx, cy + CROSSHAIR_ARM), thickness, cross);
            }

            // Labels need text; boxes do not.
            if let Some(font) = ctx.font {
                let label = format!("{} {:.2}", detection.label, detection.confidence);
                let (tw, th) = draw::measure(font, label_px, &label);
                let tag_h = th + 4;
                let tag_y = if rect.y >= tag_h { y - tag_h as i32 } else { y };
                draw::fill_rect(canvas, x, tag_y, tw + 4, tag_h, color.with_alpha(255).into());
                draw::text(
                    canvas,
                    font,
                    label_px,
                    x + 2,
                    tag_y + 2,
                    &label,
                    cfg.label_text_color.with_alpha(255).into(),
                );
            }
        }

        Ok(())
    }
}
