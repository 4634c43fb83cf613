//! Drawing primitives over RGBA canvases.
//!
//! Shapes replace the pixels they cover, so drawing on a transparent
//! overlay keeps the given alpha for the later composite.

use ab_glyph::PxScale;
use image::{Rgba, RgbaImage};
use imageproc::drawing::{
    draw_filled_rect_mut, draw_hollow_rect_mut, draw_line_segment_mut, draw_text_mut, text_size,
};
use imageproc::rect::Rect;

use super::font::HudFont;

pub fn fill_rect(canvas: &mut RgbaImage, x: i32, y: i32, w: u32, h: u32, color: Rgba<u8>) {
    if w == 0 || h == 0 {
        return;
    }
    draw_filled_rect_mut(canvas, Rect::at(x, y).of_size(w, h), color);
}

/// Rectangle outline growing inward by `thickness` pixels.
pub fn outline_rect(
    canvas: &mut RgbaImage,
    x: i32,
    y: i32,
    w: u32,
    h: u32,
    thickness: u32,
    color: Rgba<u8>,
) {
    for i in 0..thickness {
        let inset = 2 * i;
        if w <= inset || h <= inset {
            break;
        }
        draw_hollow_rect_mut(
            canvas,
            Rect::at(x + i as i32, y + i as i32).of_size(w - inset, h - inset),
            color,
        );
    }
}

/// Line of the given width; extra width is stacked perpendicular to the
/// line for axis-aligned segments.
pub fn line(
    canvas: &mut RgbaImage,
    from: (i32, i32),
    to: (i32, i32),
    width: u32,
    color: Rgba<u8>,
) {
    let horizontal = from.1 == to.1;
    let first = -((width.max(1) as i32 - 1) / 2);
    for offset in first..first + width.max(1) as i32 {
        let (dx, dy) = if horizontal { (0, offset) } else { (offset, 0) };
        draw_line_segment_mut(
            canvas,
            ((from.0 + dx) as f32, (from.1 + dy) as f32),
            ((to.0 + dx) as f32, (to.1 + dy) as f32),
            color,
        );
    }
}

/// Size of `text` rendered at `px` pixels.
pub fn measure(font: &HudFont, px: f32, text: &str) -> (u32, u32) {
    text_size(PxScale::from(px), &font.font, text)
}

pub fn text(
    canvas: &mut RgbaImage,
    font: &HudFont,
    px: f32,
    x: i32,
    y: i32,
    text: &str,
    color: Rgba<u8>,
) {
    draw_text_mut(canvas, color, x, y, PxScale::from(px), &font.font, text);
}

#[cfg(test)]
mod tests {
    use super::*;

    const RED: Rgba<u8> = Rgba([255, 0, 0, 255]);

    #[test]
    fn test_outline_thickness_grows_inward() {
        let mut canvas = RgbaImage::new(20, 20);
        outline_rect(&mut canvas, 2, 2, 10, 10, 2, RED);

        assert_eq!(*canvas.get_pixel(2, 2), RED);
        assert_eq!(*canvas.get_pixel(3, 3), RED);
        assert_eq!(*canvas.get_pixel(11, 11), RED);
        assert_eq!(canvas.get_pixel(4, 4)[3], 0);
        assert_eq!(canvas.get_pixel(12, 12)[3], 0);
    }

    #[test]
    fn test_zero_sized_shapes_are_skipped() {
        let mut canvas = RgbaImage::new(4, 4);
        fill_rect(&mut canvas, 0, 0, 0, 3, RED);
        outline_rect(&mut canvas, 0, 0, 1, 1, 3, RED);
        assert_eq!(canvas.pixels().filter(|p| p[3] > 0).count(), 1);
    }

    #[test]
    fn test_offscreen_fill_is_clipped() {
        let mut canvas = RgbaImage::new(4, 4);
        fill_rect(&mut canvas, -2, -2, 4, 4, RED);
        assert_eq!(*canvas.get_pixel(1, 1), RED);
        assert_eq!(canvas.get_pixel(2, 2)[3], 0);
    }

    #[test]
    fn test_thick_line() {
        let mut canvas = RgbaImage::new(10, 10);
        line(&mut canvas, (1, 5), (8, 5), 3, RED);
        assert_eq!(*canvas.get_pixel(4, 4), RED);
        assert_eq!(*canvas.get_pixel(4, 5), RED);
        assert_eq!(*canvas.get_pixel(4, 6), RED);
        assert_eq!(canvas.get_pixel(4, 7)[3], 0);
    }
}
