//! SMPTE-style timecode formatting.

use crate::frame::DEFAULT_FPS;

/// Format a frame index as `HH:MM:SS:FF`.
///
/// Frames-within-second is `floor((seconds * fps) mod fps)`. Since
/// `seconds * fps` is the frame index itself, it is computed from the index
/// directly so integer rates do not pick up rounding error. A non-positive
/// `fps` is treated as 30.
pub fn format_timecode(frame_index: u64, fps: f64) -> String {
    let fps = if fps > 0.0 && fps.is_finite() {
        fps
    } else {
        DEFAULT_FPS
    };

    let seconds = frame_index as f64 / fps;
    let whole = seconds.floor() as u64;
    let hours = whole / 3600;
    let minutes = (whole % 3600) / 60;
    let secs = whole % 60;
    let frames = (frame_index as f64 % fps).floor() as u64;

    format!("{:02}:{:02}:{:02}:{:02}", hours, minutes, secs, frames)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_timecode_basic() {
        assert_eq!(format_timecode(95, 30.0), "00:00:03:05");
        assert_eq!(format_timecode(0, 30.0), "00:00:00:00");
    }

    #[test]
    fn test_timecode_hours() {
        // 1h 1m 1s and 12 frames at 24fps
        let index = (3600 + 60 + 1) * 24 + 12;
        assert_eq!(format_timecode(index, 24.0), "01:01:01:12");
    }

    #[test]
    fn test_timecode_zero_fps_defaults_to_30() {
        assert_eq!(format_timecode(95, 0.0), "00:00:03:05");
        assert_eq!(format_timecode(95, -1.0), "00:00:03:05");
    }

    #[test]
    fn test_timecode_fractional_rate() {
        // 30 frames at 29.97 is just past one second
        assert_eq!(format_timecode(30, 29.97), "00:00:01:00");
    }
}
