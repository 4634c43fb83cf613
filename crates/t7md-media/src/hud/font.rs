//! Font discovery for HUD text.

use ab_glyph::FontArc;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

use super::HudError;

/// Environment override for the HUD font file.
pub const FONT_ENV: &str = "T7MD_FONT";

/// Fonts tried when no path is configured.
const SYSTEM_FONTS: &[&str] = &[
    "/usr/share/fonts/truetype/dejavu/DejaVuSans.ttf",
    "/usr/share/fonts/TTF/DejaVuSans.ttf",
    "/usr/share/fonts/dejavu/DejaVuSans.ttf",
    "/usr/share/fonts/truetype/liberation/LiberationSans-Regular.ttf",
    "/System/Library/Fonts/Supplemental/Arial.ttf",
    "/Library/Fonts/Arial.ttf",
    "C:\\Windows\\Fonts\\arial.ttf",
];

/// A loaded font and where it came from.
#[derive(Clone)]
pub struct HudFont {
    pub font: FontArc,
    pub path: PathBuf,
}

impl std::fmt::Debug for HudFont {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HudFont").field("path", &self.path).finish()
    }
}

impl HudFont {
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, HudError> {
        let path = path.as_ref();
        let bytes = std::fs::read(path)
            .map_err(|e| HudError::FontUnavailable(format!("{}: {}", path.display(), e)))?;
        let font = FontArc::try_from_vec(bytes)
            .map_err(|e| HudError::FontUnavailable(format!("{}: {}", path.display(), e)))?;
        Ok(Self {
            font,
            path: path.to_path_buf(),
        })
    }

    /// Resolve the HUD font: the configured path, then `T7MD_FONT`, then a
    /// list of common system fonts.
    pub fn discover(configured: &str) -> Result<Self, HudError> {
        let env_path = std::env::var(FONT_ENV).ok();
        let candidates = std::iter::once(configured)
            .chain(env_path.as_deref())
            .chain(SYSTEM_FONTS.iter().copied())
            .filter(|p| !p.trim().is_empty());

        for candidate in candidates {
            match Self::from_file(candidate) {
                Ok(font) => {
                    info!(path = %font.path.display(), "Loaded HUD font");
                    return Ok(font);
                }
                Err(e) => debug!("Skipping font candidate: {}", e),
            }
        }

        Err(HudError::FontUnavailable(
            "no usable TrueType font found; set style.font_path".to_string(),
        ))
    }
}
