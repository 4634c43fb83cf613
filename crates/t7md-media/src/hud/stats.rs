//! Stats panel: header, FPS readout and per-category counts.

use image::RgbaImage;

use t7md_models::{alpha_from_percent, RenderConfig};

use super::draw;
use super::layout::anchor_position;
use super::{HudModule, HudResult, RenderContext};

const BASE_FONT_SIZE: f64 = 14.0;

#[derive(Debug, Clone, Copy, Default)]
pub struct StatsPanel;

impl StatsPanel {
    /// Text lines for the current frame.
    pub fn lines(ctx: &RenderContext<'_>) -> [String; 3] {
        let counts = ctx.result.counts();
        [
            ctx.config.modules.stats.header_text.clone(),
            format!("FPS: {:.1}", ctx.meta.effective_fps()),
            format!(
                "F: {} | P: {} | O: {}",
                counts.faces, counts.persons, counts.objects
            ),
        ]
    }
}

impl HudModule for StatsPanel {
    fn name(&self) -> &'static str {
        "stats"
    }

    fn enabled(&self, config: &RenderConfig) -> bool {
        config.modules.stats.enabled
    }

    fn render(&self, ctx: &RenderContext<'_>, canvas: &mut RgbaImage) -> HudResult<()> {
        let cfg = &ctx.config.modules.stats;
        let font = ctx.require_font()?;
        let px = ctx.font_px(BASE_FONT_SIZE, cfg.scale);
        let line_h = px as u32 + 6;

        let lines = Self::lines(ctx);
        let max_w = lines
            .iter()
            .map(|line| draw::measure(font, px, line).0)
            .max()
            .unwrap_or(0);
        let panel_w = max_w + 20;
        let panel_h = line_h * lines.len() as u32;

        let (x, y) = anchor_position(
            ctx.width(),
            ctx.height(),
            panel_w,
            panel_h,
            cfg.position,
            ctx.margin(),
        );

        let bg_alpha = alpha_from_percent(cfg.bg_opacity);
        if bg_alpha > 0 {
            draw::fill_rect(canvas, x, y, panel_w, panel_h, cfg.bg_color.with_alpha(bg_alpha).into());
        }

        let color = cfg.text_color.with_alpha(255).into();
        for (i, line) in lines.iter().enumerate() {
            draw::text(canvas, font, px, x + 10, y + 5 + (i as u32 * line_h) as i32, line, color);
        }

        Ok(())
    }
}
