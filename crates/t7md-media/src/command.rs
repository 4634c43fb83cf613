//! FFmpeg command builder for raw frame pipes.

use std::path::{Path, PathBuf};
use std::process::Stdio;
use tokio::process::{Child, Command};
use tracing::debug;

use crate::error::{MediaError, MediaResult};

/// Pipe endpoint used in place of a file path.
pub const PIPE: &str = "-";

/// Builder for FFmpeg commands.
#[derive(Debug, Clone)]
pub struct FfmpegCommand {
    /// Input file path, or `-` for stdin
    input: PathBuf,
    /// Output file path, or `-` for stdout
    output: PathBuf,
    /// Input arguments (before -i)
    input_args: Vec<String>,
    /// Output arguments (after -i)
    output_args: Vec<String>,
    /// Whether to overwrite output
    overwrite: bool,
    /// Log level
    log_level: String,
}

impl FfmpegCommand {
    /// Create a new FFmpeg command.
    pub fn new(input: impl AsRef<Path>, output: impl AsRef<Path>) -> Self {
        Self {
            input: input.as_ref().to_path_buf(),
            output: output.as_ref().to_path_buf(),
            input_args: Vec::new(),
            output_args: Vec::new(),
            overwrite: true,
            log_level: "error".to_string(),
        }
    }

    /// Decode `input` into packed RGB24 frames on stdout.
    pub fn decode_rgb24(input: impl AsRef<Path>) -> Self {
        Self::new(input, PIPE).output_args(["-f", "rawvideo", "-pix_fmt", "rgb24"])
    }

    /// Encode packed RGB24 frames read from stdin into `output`.
    pub fn encode_rgb24(output: impl AsRef<Path>, width: u32, height: u32, fps: f64) -> Self {
        Self::new(PIPE, output).input_args([
            "-f".to_string(),
            "rawvideo".to_string(),
            "-pix_fmt".to_string(),
            "rgb24".to_string(),
            "-s".to_string(),
            format!("{}x{}", width, height),
            "-r".to_string(),
            format!("{:.3}", fps),
        ])
    }

    /// Add input arguments (before -i).
    pub fn input_arg(mut self, arg: impl Into<String>) -> Self {
        self.input_args.push(arg.into());
        self
    }

    /// Add multiple input arguments.
    pub fn input_args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.input_args.extend(args.into_iter().map(Into::into));
        self
    }

    /// Add output arguments (after -i).
    pub fn output_arg(mut self, arg: impl Into<String>) -> Self {
        self.output_args.push(arg.into());
        self
    }

    /// Add multiple output arguments.
    pub fn output_args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.output_args.extend(args.into_iter().map(Into::into));
        self
    }

    /// Set video filter.
    pub fn video_filter(self, filter: impl Into<String>) -> Self {
        self.output_arg("-vf").output_arg(filter)
    }

    /// Set video codec.
    pub fn video_codec(self, codec: impl Into<String>) -> Self {
        self.output_arg("-c:v").output_arg(codec)
    }

    /// Set the container codec tag (e.g. `hvc1`).
    pub fn codec_tag(self, tag: impl Into<String>) -> Self {
        self.output_arg("-tag:v").output_arg(tag)
    }

    /// Set output pixel format.
    pub fn pixel_format(self, format: impl Into<String>) -> Self {
        self.output_arg("-pix_fmt").output_arg(format)
    }

    /// Set CRF (quality).
    pub fn crf(self, crf: u8) -> Self {
        self.output_arg("-crf").output_arg(crf.to_string())
    }

    /// Set preset.
    pub fn preset(self, preset: impl Into<String>) -> Self {
        self.output_arg("-preset").output_arg(preset)
    }

    /// Set log level.
    pub fn log_level(mut self, level: impl Into<String>) -> Self {
        self.log_level = level.into();
        self
    }

    /// Build the command arguments.
    pub fn build_args(&self) -> Vec<String> {
        let mut args = Vec::new();

        if self.overwrite {
            args.push("-y".to_string());
        }

        args.push("-v".to_string());
        args.push(self.log_level.clone());

        args.extend(self.input_args.clone());

        args.push("-i".to_string());
        args.push(self.input.to_string_lossy().to_string());

        args.extend(self.output_args.clone());

        args.push(self.output.to_string_lossy().to_string());

        args
    }

    /// Spawn FFmpeg with stdin/stdout piped according to which side is `-`.
    pub fn spawn(&self) -> MediaResult<Child> {
        which::which("ffmpeg").map_err(|_| MediaError::FfmpegNotFound)?;

        let args = self.build_args();
        debug!("Spawning FFmpeg: ffmpeg {}", args.join(" "));

        let stdin = if self.input.as_os_str() == PIPE {
            Stdio::piped()
        } else {
            Stdio::null()
        };
        let stdout = if self.output.as_os_str() == PIPE {
            Stdio::piped()
        } else {
            Stdio::null()
        };

        Command::new("ffmpeg")
            .args(&args)
            .stdin(stdin)
            .stdout(stdout)
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| MediaError::ffmpeg_failed(format!("Failed to spawn FFmpeg: {}", e), None, None))
    }
}

/// Check if FFmpeg is available.
pub fn check_ffmpeg() -> MediaResult<PathBuf> {
    which::which("ffmpeg").map_err(|_| MediaError::FfmpegNotFound)
}

/// Check if FFprobe is available.
pub fn check_ffprobe() -> MediaResult<PathBuf> {
    which::which("ffprobe").map_err(|_| MediaError::FfprobeNotFound)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_decode_args() {
        let args = FfmpegCommand::decode_rgb24("input.mp4").build_args();
        assert_eq!(
            args,
            vec!["-y", "-v", "error", "-i", "input.mp4", "-f", "rawvideo", "-pix_fmt", "rgb24", "-"]
        );
    }

    #[test]
    fn test_encode_args() {
        let cmd = FfmpegCommand::encode_rgb24("out.mp4", 1280, 720, 29.97)
            .video_codec("libx265")
            .codec_tag("hvc1")
            .pixel_format("yuv420p")
            .crf(18);

        let args = cmd.build_args();
        let input_pos = args.iter().position(|a| a == "-i").unwrap();
        assert_eq!(args[input_pos + 1], "-");
        assert!(args[..input_pos].contains(&"1280x720".to_string()));
        assert!(args[..input_pos].contains(&"29.970".to_string()));
        assert!(args[input_pos..].contains(&"libx265".to_string()));
        assert!(args[input_pos..].contains(&"hvc1".to_string()));
        assert_eq!(args.last().unwrap(), "out.mp4");
    }
}
