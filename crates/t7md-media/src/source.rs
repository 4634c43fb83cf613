//! Decoded frame sources.

use async_trait::async_trait;
use image::RgbImage;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use tokio::io::{AsyncReadExt, BufReader};
use tokio::process::{Child, ChildStdout};
use tracing::{debug, info, warn};

use t7md_models::VideoMeta;

use crate::command::FfmpegCommand;
use crate::error::{MediaError, MediaResult};
use crate::probe::probe_video;

/// Sequential supplier of decoded color frames.
#[async_trait]
pub trait FrameSource: Send {
    /// Dimensions, rate and frame count of the stream.
    fn meta(&self) -> &VideoMeta;

    /// Next frame in presentation order.
    ///
    /// `Ok(None)` marks the end of the stream. `Err` means one frame could
    /// not be decoded; the caller may keep reading.
    async fn next_frame(&mut self) -> MediaResult<Option<RgbImage>>;

    /// Source name for logging.
    fn name(&self) -> &str;
}

/// Frame source backed by an FFmpeg child process writing RGB24 to stdout.
pub struct FfmpegSource {
    path: PathBuf,
    name: String,
    meta: VideoMeta,
    child: Child,
    reader: BufReader<ChildStdout>,
    frame_bytes: usize,
    finished: bool,
}

impl FfmpegSource {
    /// Probe and open `path` for decoding.
    pub async fn open(path: impl AsRef<Path>) -> MediaResult<Self> {
        let path = path.as_ref();
        let info = probe_video(path).await?;
        let meta = info.meta();

        let mut child = FfmpegCommand::decode_rgb24(path).spawn()?;
        let stdout = child.stdout.take().ok_or_else(|| {
            MediaError::ffmpeg_failed("Failed to capture FFmpeg stdout", None, None)
        })?;

        info!(
            path = %path.display(),
            width = meta.width,
            height = meta.height,
            fps = meta.fps,
            total_frames = meta.total_frames,
            "Opened video source"
        );

        Ok(Self {
            path: path.to_path_buf(),
            name: path.display().to_string(),
            frame_bytes: meta.width as usize * meta.height as usize * 3,
            meta,
            child,
            reader: BufReader::new(stdout),
            finished: false,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    async fn reap(&mut self) {
        self.finished = true;
        match self.child.wait().await {
            Ok(status) if !status.success() => {
                warn!(path = %self.path.display(), code = ?status.code(), "Decoder exited with non-zero status");
            }
            Ok(_) => debug!(path = %self.path.display(), "Decoder finished"),
            Err(e) => warn!(path = %self.path.display(), "Failed to reap decoder: {}", e),
        }
    }
}

#[async_trait]
impl FrameSource for FfmpegSource {
    fn meta(&self) -> &VideoMeta {
        &self.meta
    }

    async fn next_frame(&mut self) -> MediaResult<Option<RgbImage>> {
        if self.finished {
            return Ok(None);
        }

        let mut buffer = vec![0u8; self.frame_bytes];
        match self.reader.read_exact(&mut buffer).await {
            Ok(_) => RgbImage::from_raw(self.meta.width, self.meta.height, buffer)
                .map(Some)
                .ok_or_else(|| MediaError::decode_failed("Frame buffer size mismatch")),
            Err(e) if e.kind() == ErrorKind::UnexpectedEof => {
                self.reap().await;
                Ok(None)
            }
            Err(e) => Err(MediaError::decode_failed(e.to_string())),
        }
    }

    fn name(&self) -> &str {
        &self.name
    }
}
