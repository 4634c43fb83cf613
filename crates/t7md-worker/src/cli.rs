//! Command-line arguments of the headless runner.

use std::path::{Path, PathBuf};

use clap::Parser;
use tracing::debug;

use t7md_models::{OutputProfile, SharedConfig};

use crate::error::{WorkerError, WorkerResult};

/// Suffix of the run directory when neither `--name` nor the config names it.
pub const HEADLESS_RUN_SUFFIX: &str = "_t7md_data";

/// Process one video without a user interface, reporting on stdout.
#[derive(Debug, Clone, Parser)]
#[command(name = "t7md-headless", version, about)]
pub struct HeadlessArgs {
    /// Source video
    #[arg(short, long)]
    pub input: PathBuf,

    /// Output root; defaults to `<source dir>/T7MD_Output`
    #[arg(short, long)]
    pub output_dir: Option<PathBuf>,

    /// Run directory name; defaults to `<source stem>_t7md_data`
    #[arg(long)]
    pub name: Option<String>,

    /// Detect faces
    #[arg(long)]
    pub faces: bool,

    /// Detect persons
    #[arg(long)]
    pub persons: bool,

    /// Detect objects
    #[arg(long)]
    pub objects: bool,

    /// Produce the smoothed depth stream
    #[arg(long)]
    pub depth: bool,

    /// Output profile ("Final Render", "Compositing", "JSON Only").
    /// Without it only the metadata log is written.
    #[arg(long)]
    pub profile: Option<OutputProfile>,

    /// Config file; defaults to `T7MD_CONFIG` or `~/.t7md_vision/config.json`
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// Recognition service base URL
    #[arg(long, env = "T7MD_ML_URL")]
    pub ml_url: Option<String>,
}

impl HeadlessArgs {
    /// Returns true if any detector flag was given on the command line.
    pub fn selects_detectors(&self) -> bool {
        self.faces || self.persons || self.objects
    }

    /// Write the command-line choices into the run's in-memory config.
    /// Nothing is persisted.
    pub fn apply_overrides(&self, config: &SharedConfig) -> WorkerResult<()> {
        if self.selects_detectors() {
            config.set("models.use_faces", self.faces)?;
            config.set("models.use_persons", self.persons)?;
            config.set("models.use_objects", self.objects)?;
        }
        if self.depth {
            config.set("models.use_depth", true)?;
        }

        if let Some(dir) = &self.output_dir {
            config.set("output.output_dir", dir.display().to_string())?;
        }

        let configured_name = config
            .get("output.custom_filename")
            .and_then(|v| v.as_str().map(str::to_string))
            .unwrap_or_default();
        let name = match &self.name {
            Some(name) => name.clone(),
            None if configured_name.trim().is_empty() => default_run_name(&self.input)?,
            None => configured_name,
        };
        config.set("output.custom_filename", name)?;

        match self.profile {
            Some(profile) => {
                config.set("output.profile", profile.as_str())?;
                config.set("output.skip_video", false)?;
            }
            None => config.set("output.skip_video", true)?,
        }

        debug!(input = %self.input.display(), "Applied command-line overrides");
        Ok(())
    }
}

/// `<source stem>_t7md_data`
pub fn default_run_name(input: &Path) -> WorkerResult<String> {
    input
        .file_stem()
        .and_then(|s| s.to_str())
        .filter(|s| !s.is_empty())
        .map(|stem| format!("{}{}", stem, HEADLESS_RUN_SUFFIX))
        .ok_or_else(|| WorkerError::config(format!("cannot name a run after {}", input.display())))
}

#[cfg(test)]
mod tests {
    use super::*;
    use t7md_models::ConfigStore;

    fn parse(args: &[&str]) -> HeadlessArgs {
        HeadlessArgs::try_parse_from(std::iter::once("t7md-headless").chain(args.iter().copied()))
            .unwrap()
    }

    #[test]
    fn test_headless_defaults_skip_video() {
        let args = parse(&["--input", "/clips/take_01.mov"]);
        let config = SharedConfig::new(ConfigStore::new());
        args.apply_overrides(&config).unwrap();

        let snapshot = config.snapshot();
        assert!(snapshot.output.skip_video);
        assert_eq!(snapshot.output.effective_profile(), OutputProfile::JsonOnly);
        assert_eq!(snapshot.output.custom_filename, "take_01_t7md_data");
        // Detector selection falls back to the config
        assert!(snapshot.models.use_faces && snapshot.models.use_persons);
        assert!(!snapshot.models.use_objects && !snapshot.models.use_depth);
    }

    #[test]
    fn test_flags_define_detector_set() {
        let args = parse(&[
            "-i",
            "clip.mp4",
            "--objects",
            "--depth",
            "--profile",
            "compositing",
            "--output-dir",
            "/renders",
        ]);
        let config = SharedConfig::new(ConfigStore::new());
        args.apply_overrides(&config).unwrap();

        let snapshot = config.snapshot();
        assert!(!snapshot.models.use_faces && !snapshot.models.use_persons);
        assert!(snapshot.models.use_objects && snapshot.models.use_depth);
        assert_eq!(snapshot.output.effective_profile(), OutputProfile::Compositing);
        assert_eq!(snapshot.output.output_dir, "/renders");
    }

    #[test]
    fn test_configured_name_is_kept() {
        let config = SharedConfig::new(ConfigStore::new());
        config.set("output.custom_filename", "shot_a").unwrap();
        parse(&["-i", "clip.mp4"]).apply_overrides(&config).unwrap();
        assert_eq!(config.snapshot().output.custom_filename, "shot_a");

        parse(&["-i", "clip.mp4", "--name", "explicit"])
            .apply_overrides(&config)
            .unwrap();
        assert_eq!(config.snapshot().output.custom_filename, "explicit");
    }

    #[test]
    fn test_rejects_unknown_profile() {
        let result = HeadlessArgs::try_parse_from(["t7md-headless", "-i", "a.mp4", "--profile", "gif"]);
        assert!(result.is_err());
    }
}
