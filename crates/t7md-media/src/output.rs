//! Output directory layout and the metadata log writer.
//!
//! All artifacts of one run live under a single directory:
//!
//! ```text
//! <root>/<run name>/
//!   render_final.mp4
//!   depth_map.mp4
//!   seq_bbox/bbox_00000.png
//!   seq_hud/hud_00000.png
//!   crops_faces/face_00000_87.jpg
//!   analysis.json
//! ```

use image::{imageops, RgbImage};
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use tracing::info;

use t7md_models::{FrameRecord, MetadataLog, OutputConfig, OutputProfile, RunMetadata, RunStats};

use crate::error::{MediaError, MediaResult};
use crate::fs_utils::{ensure_dir, write_atomic};

/// Root directory name when no output directory is configured.
pub const DEFAULT_ROOT_NAME: &str = "T7MD_Output";
/// Suffix appended to the source stem when no run name is configured.
pub const DEFAULT_RUN_SUFFIX: &str = "_processed";

pub const RENDER_FILE: &str = "render_final.mp4";
pub const DEPTH_FILE: &str = "depth_map.mp4";
pub const METADATA_FILE: &str = "analysis.json";
pub const BBOX_DIR: &str = "seq_bbox";
pub const HUD_DIR: &str = "seq_hud";
pub const CROPS_DIR: &str = "crops_faces";

/// Resolved artifact paths for one run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutputLayout {
    run_dir: PathBuf,
}

impl OutputLayout {
    pub fn new(run_dir: impl Into<PathBuf>) -> Self {
        Self {
            run_dir: run_dir.into(),
        }
    }

    /// Derive the run directory from the source path and output settings.
    pub fn resolve(source: &Path, output: &OutputConfig) -> MediaResult<Self> {
        let root = if output.output_dir.trim().is_empty() {
            source
                .parent()
                .unwrap_or_else(|| Path::new("."))
                .join(DEFAULT_ROOT_NAME)
        } else {
            PathBuf::from(output.output_dir.trim())
        };

        let name = if output.custom_filename.trim().is_empty() {
            let stem = source
                .file_stem()
                .and_then(|s| s.to_str())
                .filter(|s| !s.is_empty())
                .ok_or_else(|| {
                    MediaError::output_setup(source, "source path has no file name")
                })?;
            format!("{}{}", stem, DEFAULT_RUN_SUFFIX)
        } else {
            output.custom_filename.trim().to_string()
        };

        Ok(Self::new(root.join(name)))
    }

    pub fn run_dir(&self) -> &Path {
        &self.run_dir
    }

    pub fn render_path(&self) -> PathBuf {
        self.run_dir.join(RENDER_FILE)
    }

    pub fn depth_path(&self) -> PathBuf {
        self.run_dir.join(DEPTH_FILE)
    }

    pub fn metadata_path(&self) -> PathBuf {
        self.run_dir.join(METADATA_FILE)
    }

    pub fn bbox_dir(&self) -> PathBuf {
        self.run_dir.join(BBOX_DIR)
    }

    pub fn hud_dir(&self) -> PathBuf {
        self.run_dir.join(HUD_DIR)
    }

    pub fn crops_dir(&self) -> PathBuf {
        self.run_dir.join(CROPS_DIR)
    }

    pub fn bbox_frame(&self, frame_index: u64) -> PathBuf {
        self.bbox_dir().join(format!("bbox_{:05}.png", frame_index))
    }

    pub fn hud_frame(&self, frame_index: u64) -> PathBuf {
        self.hud_dir().join(format!("hud_{:05}.png", frame_index))
    }

    /// Crop file name: category, frame index and whole-percent confidence.
    pub fn face_crop(&self, frame_index: u64, confidence: f64) -> PathBuf {
        let percent = (confidence.clamp(0.0, 1.0) * 100.0) as u32;
        self.crops_dir()
            .join(format!("face_{:05}_{}.jpg", frame_index, percent))
    }

    /// Create the run directory and the directories `profile` writes into.
    ///
    /// Returns the directories that were prepared besides the run directory.
    pub async fn prepare(&self, profile: OutputProfile, save_crops: bool) -> MediaResult<Vec<PathBuf>> {
        ensure_dir(&self.run_dir).await?;

        let mut dirs = Vec::new();
        if profile.writes_layers() {
            dirs.push(self.bbox_dir());
            dirs.push(self.hud_dir());
            if save_crops {
                dirs.push(self.crops_dir());
            }
        }
        for dir in &dirs {
            ensure_dir(dir).await?;
        }

        info!(
            run_dir = %self.run_dir.display(),
            profile = %profile,
            "Prepared output directory"
        );
        Ok(dirs)
    }

    /// Save every face in `faces` cropped from `source`. Called from a
    /// blocking context.
    pub fn save_face_crops(
        &self,
        source: &RgbImage,
        frame_index: u64,
        faces: &[(t7md_models::PixelRect, f64)],
    ) -> MediaResult<Vec<PathBuf>> {
        let mut written = Vec::with_capacity(faces.len());
        let mut used = HashSet::new();

        for (ordinal, (rect, confidence)) in faces.iter().enumerate() {
            let mut path = self.face_crop(frame_index, *confidence);
            if !used.insert(path.clone()) {
                // Same frame and confidence: keep both.
                let stem = path
                    .file_stem()
                    .and_then(|s| s.to_str())
                    .unwrap_or("face")
                    .to_string();
                path.set_file_name(format!("{}_{}.jpg", stem, ordinal));
                used.insert(path.clone());
            }

            imageops::crop_imm(source, rect.x, rect.y, rect.width, rect.height)
                .to_image()
                .save(&path)?;
            written.push(path);
        }

        Ok(written)
    }
}

/// Accumulates frame records and persists the log atomically.
#[derive(Debug)]
pub struct MetadataWriter {
    path: PathBuf,
    log: MetadataLog,
}

impl MetadataWriter {
    pub fn new(path: impl Into<PathBuf>, metadata: RunMetadata) -> Self {
        Self {
            path: path.into(),
            log: MetadataLog::new(metadata),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn log(&self) -> &MetadataLog {
        &self.log
    }

    pub fn push(&mut self, record: FrameRecord) {
        self.log.push(record);
    }

    pub fn frames(&self) -> usize {
        self.log.frames.len()
    }

    /// Write the log, including `summary` when given.
    pub async fn flush(&mut self, summary: Option<RunStats>) -> MediaResult<()> {
        if summary.is_some() {
            self.log.summary = summary;
        }
        let json = serde_json::to_vec_pretty(&self.log)?;
        write_atomic(&self.path, &json).await?;
        info!(
            path = %self.path.display(),
            frames = self.log.frames.len(),
            "Metadata log written"
        );
        Ok(())
    }
}
