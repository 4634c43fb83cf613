//! Resolution-independent layout.
//!
//! All sizes are authored against a 1080-line frame and scaled linearly
//! with the output height, so one configuration renders identically on
//! 720p and 4K sources.

use t7md_models::{Anchor, HAlign, VAlign};

/// Frame height at which configured sizes apply unscaled.
pub const REFERENCE_HEIGHT: f64 = 1080.0;

/// `base * (screen_height / 1080) * (scale_percent / 100)`.
pub fn responsive_size(base: f64, screen_height: u32, scale_percent: u32) -> f64 {
    base * (f64::from(screen_height) / REFERENCE_HEIGHT) * (f64::from(scale_percent) / 100.0)
}

/// [`responsive_size`] truncated to whole pixels, never below 1.
pub fn responsive_px(base: f64, screen_height: u32, scale_percent: u32) -> u32 {
    (responsive_size(base, screen_height, scale_percent) as u32).max(1)
}

/// Top-left placement of an element of `elem_w x elem_h` at `anchor`,
/// kept `margin` pixels from the chosen edges.
///
/// Centered axes ignore the margin. Coordinates may be negative when the
/// element is larger than the screen.
pub fn anchor_position(
    screen_w: u32,
    screen_h: u32,
    elem_w: u32,
    elem_h: u32,
    anchor: Anchor,
    margin: u32,
) -> (i32, i32) {
    let (sw, sh) = (i64::from(screen_w), i64::from(screen_h));
    let (ew, eh) = (i64::from(elem_w), i64::from(elem_h));
    let margin = i64::from(margin);

    let x = match anchor.horizontal {
        HAlign::Left => margin,
        HAlign::Right => sw - ew - margin,
        HAlign::Center => (sw - ew) / 2,
    };
    let y = match anchor.vertical {
        VAlign::Top => margin,
        VAlign::Bottom => sh - eh - margin,
        VAlign::Center => (sh - eh) / 2,
    };

    (clamp_i32(x), clamp_i32(y))
}

fn clamp_i32(v: i64) -> i32 {
    v.clamp(i64::from(i32::MIN), i64::from(i32::MAX)) as i32
}
