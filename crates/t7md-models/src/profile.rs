//! Output profiles and codecs.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Run mode deciding which writers are opened.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema, Default)]
pub enum OutputProfile {
    /// One encoded video with burned-in annotations.
    #[default]
    #[serde(rename = "Final Render", alias = "final_render")]
    FinalRender,

    /// Annotated video plus bbox/HUD image sequences and face crops.
    #[serde(rename = "Compositing", alias = "compositing")]
    Compositing,

    /// Metadata log only.
    #[serde(rename = "JSON Only", alias = "json_only")]
    JsonOnly,
}

impl OutputProfile {
    pub const ALL: &'static [OutputProfile] = &[
        OutputProfile::FinalRender,
        OutputProfile::Compositing,
        OutputProfile::JsonOnly,
    ];

    /// Display name, also the persisted config value.
    pub fn as_str(&self) -> &'static str {
        match self {
            OutputProfile::FinalRender => "Final Render",
            OutputProfile::Compositing => "Compositing",
            OutputProfile::JsonOnly => "JSON Only",
        }
    }

    /// Returns true if the profile encodes video streams.
    pub fn writes_video(&self) -> bool {
        !matches!(self, OutputProfile::JsonOnly)
    }

    /// Returns true if bbox/HUD image sequences and face crops are written.
    pub fn writes_layers(&self) -> bool {
        matches!(self, OutputProfile::Compositing)
    }
}

impl fmt::Display for OutputProfile {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for OutputProfile {
    type Err = ProfileParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().replace(['_', '-'], " ").trim() {
            "final render" | "final" => Ok(OutputProfile::FinalRender),
            "compositing" => Ok(OutputProfile::Compositing),
            "json only" | "json" => Ok(OutputProfile::JsonOnly),
            _ => Err(ProfileParseError(s.to_string())),
        }
    }
}

#[derive(Debug, Error)]
#[error("Unknown output profile: {0}")]
pub struct ProfileParseError(String);

/// Video codec for encoded streams.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema, Default)]
pub enum Codec {
    #[default]
    #[serde(rename = "H.264", alias = "h264")]
    H264,
    #[serde(rename = "H.265", alias = "h265")]
    H265,
}

impl Codec {
    pub fn as_str(&self) -> &'static str {
        match self {
            Codec::H264 => "H.264",
            Codec::H265 => "H.265",
        }
    }

    /// FFmpeg encoder name.
    pub fn encoder(&self) -> &'static str {
        match self {
            Codec::H264 => "libx264",
            Codec::H265 => "libx265",
        }
    }

    /// Container codec tag.
    pub fn tag(&self) -> &'static str {
        match self {
            Codec::H264 => "avc1",
            Codec::H265 => "hvc1",
        }
    }
}

impl fmt::Display for Codec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for Codec {
    type Err = ProfileParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().replace('.', "").as_str() {
            "h264" | "avc" => Ok(Codec::H264),
            "h265" | "hevc" => Ok(Codec::H265),
            _ => Err(ProfileParseError(s.to_string())),
        }
    }
}
