//! Encoded video stream writers.

use async_trait::async_trait;
use image::RgbImage;
use std::path::{Path, PathBuf};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::process::{Child, ChildStdin};
use tracing::{debug, info};

use t7md_models::Codec;

use crate::command::FfmpegCommand;
use crate::error::{MediaError, MediaResult};

/// Default CRF for rendered streams
pub const DEFAULT_CRF: u8 = 18;
/// Default encoding preset
pub const DEFAULT_PRESET: &str = "fast";

/// Geometry and encoding parameters of an output stream.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct StreamSpec {
    pub width: u32,
    pub height: u32,
    pub fps: f64,
    pub codec: Codec,
}

/// Sink receiving one frame per processed source frame.
#[async_trait]
pub trait FrameSink: Send {
    async fn write_frame(&mut self, frame: &RgbImage) -> MediaResult<()>;

    /// Flush and close the stream. Must be called once.
    async fn finish(&mut self) -> MediaResult<()>;

    /// Destination path.
    fn path(&self) -> &Path;
}

/// Opens frame sinks for a run.
#[async_trait]
pub trait SinkFactory: Send + Sync {
    async fn open(&self, path: &Path, spec: &StreamSpec) -> MediaResult<Box<dyn FrameSink>>;
}

/// Sink piping RGB24 frames into an FFmpeg encoder.
pub struct FfmpegSink {
    path: PathBuf,
    spec: StreamSpec,
    child: Child,
    stdin: Option<ChildStdin>,
    frames: u64,
}

impl FfmpegSink {
    pub fn command(path: &Path, spec: &StreamSpec) -> FfmpegCommand {
        FfmpegCommand::encode_rgb24(path, spec.width, spec.height, spec.fps)
            // yuv420p needs even dimensions
            .video_filter("scale=trunc(iw/2)*2:trunc(ih/2)*2")
            .video_codec(spec.codec.encoder())
            .codec_tag(spec.codec.tag())
            .preset(DEFAULT_PRESET)
            .crf(DEFAULT_CRF)
            .pixel_format("yuv420p")
    }

    pub fn create(path: impl AsRef<Path>, spec: StreamSpec) -> MediaResult<Self> {
        let path = path.as_ref();
        let mut child = Self::command(path, &spec).spawn()?;
        let stdin = child.stdin.take().ok_or_else(|| {
            MediaError::ffmpeg_failed("Failed to capture FFmpeg stdin", None, None)
        })?;

        info!(path = %path.display(), codec = %spec.codec, "Opened video writer");

        Ok(Self {
            path: path.to_path_buf(),
            spec,
            child,
            stdin: Some(stdin),
            frames: 0,
        })
    }

    async fn stderr_text(&mut self) -> Option<String> {
        let mut stderr = self.child.stderr.take()?;
        let mut text = String::new();
        stderr.read_to_string(&mut text).await.ok()?;
        Some(text).filter(|t| !t.trim().is_empty())
    }
}

#[async_trait]
impl FrameSink for FfmpegSink {
    async fn write_frame(&mut self, frame: &RgbImage) -> MediaResult<()> {
        if frame.width() != self.spec.width || frame.height() != self.spec.height {
            return Err(MediaError::internal(format!(
                "Frame is {}x{}, stream expects {}x{}",
                frame.width(),
                frame.height(),
                self.spec.width,
                self.spec.height
            )));
        }

        let stdin = self
            .stdin
            .as_mut()
            .ok_or_else(|| MediaError::internal("Writer already finished"))?;

        if let Err(e) = stdin.write_all(frame.as_raw()).await {
            let stderr = self.stderr_text().await;
            return Err(MediaError::ffmpeg_failed(
                format!("Encoder rejected frame {}: {}", self.frames, e),
                stderr,
                None,
            ));
        }
        self.frames += 1;
        Ok(())
    }

    async fn finish(&mut self) -> MediaResult<()> {
        if let Some(mut stdin) = self.stdin.take() {
            stdin.flush().await?;
            drop(stdin);
        }

        let status = self.child.wait().await?;
        if !status.success() {
            let stderr = self.stderr_text().await;
            return Err(MediaError::ffmpeg_failed(
                format!("Encoder for {} failed", self.path.display()),
                stderr,
                status.code(),
            ));
        }

        debug!(path = %self.path.display(), frames = self.frames, "Closed video writer");
        Ok(())
    }

    fn path(&self) -> &Path {
        &self.path
    }
}

/// Default factory spawning one FFmpeg encoder per stream.
#[derive(Debug, Clone, Copy, Default)]
pub struct FfmpegSinkFactory;

#[async_trait]
impl SinkFactory for FfmpegSinkFactory {
    async fn open(&self, path: &Path, spec: &StreamSpec) -> MediaResult<Box<dyn FrameSink>> {
        Ok(Box::new(FfmpegSink::create(path, *spec)?))
    }
}
