//! Face collage: a column of thumbnails cropped from the source frame.

use image::imageops::{self, FilterType};
use image::{DynamicImage, RgbaImage};

use t7md_models::{alpha_from_percent, Category, RenderConfig};

use super::draw;
use super::layout::anchor_position;
use super::{HudError, HudModule, HudResult, RenderContext};

/// Maximum thumbnails per frame.
pub const MAX_FACES: usize = 5;

#[derive(Debug, Clone, Copy, Default)]
pub struct FaceCollage;

/// Thumbnail side and gap for a frame of `height` pixels.
pub fn thumb_geometry(height: u32, thumb_size_pct: f64, gap_pct: f64) -> (u32, u32) {
    let thumb = (f64::from(height) * thumb_size_pct / 100.0) as u32;
    let gap = (f64::from(thumb) * gap_pct / 100.0) as u32;
    (thumb, gap)
}

impl HudModule for FaceCollage {
    fn name(&self) -> &'static str {
        "collage"
    }

    fn enabled(&self, config: &RenderConfig) -> bool {
        config.modules.collage.enabled
    }

    fn render(&self, ctx: &RenderContext<'_>, canvas: &mut RgbaImage) -> HudResult<()> {
        let cfg = &ctx.config.modules.collage;
        let faces: Vec<_> = ctx.result.of_category(Category::Face).take(MAX_FACES).collect();
        if faces.is_empty() {
            return Ok(());
        }

        let (thumb, gap) = thumb_geometry(ctx.height(), cfg.thumb_size_pct, cfg.gap_pct);
        if thumb == 0 {
            return Err(HudError::Layout(format!(
                "thumbnail size {}% of {}px is empty",
                cfg.thumb_size_pct,
                ctx.height()
            )));
        }
        let count = faces.len() as u32;
        let column_h = count * (thumb + gap) - gap;

        let (x, y) = anchor_position(
            ctx.width(),
            ctx.height(),
            thumb,
            column_h,
            cfg.position,
            ctx.margin(),
        );
        let alpha = alpha_from_percent(cfg.opacity);

        for (i, face) in faces.iter().enumerate() {
            // An empty crop keeps its slot so the column does not shift.
            let Some(rect) = face.bbox.clamp_to(ctx.width(), ctx.height()) else {
                continue;
            };
            let crop = imageops::crop_imm(ctx.source, rect.x, rect.y, rect.width, rect.height).to_image();
            let resized = imageops::resize(&crop, thumb, thumb, FilterType::Triangle);
            let mut tile = DynamicImage::ImageRgb8(resized).to_rgba8();
            if alpha < u8::MAX {
                for px in tile.pixels_mut() {
                    px[3] = alpha;
                }
            }

            let slot_y = y + (i as u32 * (thumb + gap)) as i32;
            imageops::overlay(canvas, &tile, i64::from(x), i64::from(slot_y));

            if cfg.border_thick > 0 {
                draw::outline_rect(
                    canvas,
                    x,
                    slot_y,
                    thumb,
                    thumb,
                    cfg.border_thick,
                    cfg.border_color.with_alpha(255).into(),
                );
            }
        }

        Ok(())
    }
}
