//! Typed render configuration.
//!
//! Every section carries a complete default so a partial user document
//! deserializes into a fully populated tree. The persisted form is plain
//! JSON keyed by module name; see [`crate::config_store`] for the
//! path-based facade over it.

use schemars::gen::SchemaGenerator;
use schemars::schema::Schema;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::detection::{Category, ConfidenceThresholds};
use crate::profile::{Codec, OutputProfile};

/// Configuration schema version.
pub const CONFIG_VERSION: &str = "5.9.0";

/// Default message banner text.
pub const DEFAULT_MESSAGE: &str = "TRIPLESIETE\nPRODUCCIONES";

/// Default stats panel header.
pub const DEFAULT_HEADER: &str = "T7MD VISION PRO";

/// Convert an opacity percentage (0-100) into an 8-bit alpha.
pub fn alpha_from_percent(percent: u8) -> u8 {
    (f64::from(percent.min(100)) * 255.0 / 100.0).round() as u8
}

// ============================================================================
// Value types
// ============================================================================

/// RGB color persisted as a `#RRGGBB` hex string.
///
/// Malformed strings resolve to white.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub struct Color {
    pub r: u8,
    pub g: u8,
    pub b: u8,
}

impl Color {
    pub const WHITE: Color = Color::rgb(255, 255, 255);
    pub const BLACK: Color = Color::rgb(0, 0, 0);

    pub const fn rgb(r: u8, g: u8, b: u8) -> Self {
        Self { r, g, b }
    }

    /// Parse `#RRGGBB` (leading `#` optional).
    pub fn parse_hex(s: &str) -> Option<Self> {
        let hex = s.trim().trim_start_matches('#');
        if hex.len() != 6 || !hex.is_ascii() {
            return None;
        }
        let channel = |i: usize| u8::from_str_radix(&hex[i..i + 2], 16).ok();
        Some(Self::rgb(channel(0)?, channel(2)?, channel(4)?))
    }

    pub fn to_hex(&self) -> String {
        format!("#{:02X}{:02X}{:02X}", self.r, self.g, self.b)
    }

    /// RGBA channels with the given alpha.
    pub fn with_alpha(&self, alpha: u8) -> [u8; 4] {
        [self.r, self.g, self.b, alpha]
    }
}

impl From<String> for Color {
    fn from(s: String) -> Self {
        Self::parse_hex(&s).unwrap_or(Self::WHITE)
    }
}

impl From<Color> for String {
    fn from(c: Color) -> Self {
        c.to_hex()
    }
}

impl fmt::Display for Color {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_hex())
    }
}

impl JsonSchema for Color {
    fn schema_name() -> String {
        "Color".to_string()
    }

    fn json_schema(gen: &mut SchemaGenerator) -> Schema {
        String::json_schema(gen)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum HAlign {
    Left,
    Center,
    Right,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum VAlign {
    Top,
    Center,
    Bottom,
}

/// Named screen position: one of the 9 `{top,center,bottom}_{left,center,right}`
/// combinations.
///
/// Parsing is lenient: any name containing `left`/`right` and `top`/`bottom`
/// picks that side, everything else centers on that axis.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub struct Anchor {
    pub horizontal: HAlign,
    pub vertical: VAlign,
}

impl Anchor {
    pub const TOP_LEFT: Anchor = Anchor::new(HAlign::Left, VAlign::Top);
    pub const TOP_CENTER: Anchor = Anchor::new(HAlign::Center, VAlign::Top);
    pub const TOP_RIGHT: Anchor = Anchor::new(HAlign::Right, VAlign::Top);
    pub const CENTER_LEFT: Anchor = Anchor::new(HAlign::Left, VAlign::Center);
    pub const CENTER: Anchor = Anchor::new(HAlign::Center, VAlign::Center);
    pub const CENTER_RIGHT: Anchor = Anchor::new(HAlign::Right, VAlign::Center);
    pub const BOTTOM_LEFT: Anchor = Anchor::new(HAlign::Left, VAlign::Bottom);
    pub const BOTTOM_CENTER: Anchor = Anchor::new(HAlign::Center, VAlign::Bottom);
    pub const BOTTOM_RIGHT: Anchor = Anchor::new(HAlign::Right, VAlign::Bottom);

    pub const fn new(horizontal: HAlign, vertical: VAlign) -> Self {
        Self {
            horizontal,
            vertical,
        }
    }

    pub fn parse(name: &str) -> Self {
        let name = name.to_lowercase();
        let horizontal = if name.contains("left") {
            HAlign::Left
        } else if name.contains("right") {
            HAlign::Right
        } else {
            HAlign::Center
        };
        let vertical = if name.contains("top") {
            VAlign::Top
        } else if name.contains("bottom") {
            VAlign::Bottom
        } else {
            VAlign::Center
        };
        Self::new(horizontal, vertical)
    }

    pub fn as_str(&self) -> &'static str {
        match (self.vertical, self.horizontal) {
            (VAlign::Top, HAlign::Left) => "top_left",
            (VAlign::Top, HAlign::Center) => "top_center",
            (VAlign::Top, HAlign::Right) => "top_right",
            (VAlign::Center, HAlign::Left) => "center_left",
            (VAlign::Center, HAlign::Center) => "center",
            (VAlign::Center, HAlign::Right) => "center_right",
            (VAlign::Bottom, HAlign::Left) => "bottom_left",
            (VAlign::Bottom, HAlign::Center) => "bottom_center",
            (VAlign::Bottom, HAlign::Right) => "bottom_right",
        }
    }
}

impl From<String> for Anchor {
    fn from(s: String) -> Self {
        Self::parse(&s)
    }
}

impl From<Anchor> for String {
    fn from(a: Anchor) -> Self {
        a.as_str().to_string()
    }
}

impl fmt::Display for Anchor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl JsonSchema for Anchor {
    fn schema_name() -> String {
        "Anchor".to_string()
    }

    fn json_schema(gen: &mut SchemaGenerator) -> Schema {
        String::json_schema(gen)
    }
}

// ============================================================================
// Sections
// ============================================================================

/// Detector toggles and thresholds.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(default)]
pub struct ModelsConfig {
    pub use_faces: bool,
    pub use_persons: bool,
    pub use_objects: bool,
    /// Enables the smoothed depth sub-stream
    pub use_depth: bool,
    /// Extra class names forwarded to the object detector
    pub custom_classes: Vec<String>,
    pub face_confidence: f64,
    pub person_confidence: f64,
    pub object_confidence: f64,
}

impl Default for ModelsConfig {
    fn default() -> Self {
        Self {
            use_faces: true,
            use_persons: true,
            use_objects: false,
            use_depth: false,
            custom_classes: vec!["cell phone".to_string(), "laptop".to_string()],
            face_confidence: 0.4,
            person_confidence: 0.5,
            object_confidence: 0.3,
        }
    }
}

impl ModelsConfig {
    pub fn thresholds(&self) -> ConfidenceThresholds {
        ConfidenceThresholds {
            face: self.face_confidence,
            person: self.person_confidence,
            object: self.object_confidence,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(default)]
pub struct BboxConfig {
    pub enabled: bool,
    pub person_color: Color,
    pub person_thick: u32,
    pub face_color: Color,
    pub face_thick: u32,
    pub object_color: Color,
    pub object_thick: u32,
    /// Label font scale in percent
    pub label_scale: u32,
    pub label_text_color: Color,
    pub show_crosshair: bool,
}

impl Default for BboxConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            person_color: Color::rgb(0, 255, 0),
            person_thick: 2,
            face_color: Color::rgb(0, 255, 255),
            face_thick: 2,
            object_color: Color::rgb(255, 255, 0),
            object_thick: 2,
            label_scale: 100,
            label_text_color: Color::BLACK,
            show_crosshair: true,
        }
    }
}

impl BboxConfig {
    /// Color and line thickness for a category.
    pub fn style_for(&self, category: Category) -> (Color, u32) {
        match category {
            Category::Face => (self.face_color, self.face_thick),
            Category::Person => (self.person_color, self.person_thick),
            Category::Object => (self.object_color, self.object_thick),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(default)]
pub struct StatsConfig {
    pub enabled: bool,
    pub header_text: String,
    pub position: Anchor,
    pub scale: u32,
    pub text_color: Color,
    pub bg_color: Color,
    /// Background opacity in percent
    pub bg_opacity: u8,
}

impl Default for StatsConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            header_text: DEFAULT_HEADER.to_string(),
            position: Anchor::TOP_LEFT,
            scale: 100,
            text_color: Color::WHITE,
            bg_color: Color::BLACK,
            bg_opacity: 80,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(default)]
pub struct MinimapConfig {
    pub enabled: bool,
    pub position: Anchor,
    pub scale: u32,
    pub border_thick: u32,
    pub border_color: Color,
    pub bg_color: Color,
    pub bg_opacity: u8,
    pub dot_size: u32,
}

impl Default for MinimapConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            position: Anchor::TOP_RIGHT,
            scale: 100,
            border_thick: 1,
            border_color: Color::WHITE,
            bg_color: Color::BLACK,
            bg_opacity: 80,
            dot_size: 3,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(default)]
pub struct CollageConfig {
    pub enabled: bool,
    pub position: Anchor,
    /// Thumbnail edge as a percentage of the frame height
    pub thumb_size_pct: f64,
    pub border_thick: u32,
    pub border_color: Color,
    /// Gap between thumbnails as a percentage of the thumbnail edge
    pub gap_pct: f64,
    /// Per-thumbnail opacity in percent
    pub opacity: u8,
}

impl Default for CollageConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            position: Anchor::BOTTOM_RIGHT,
            thumb_size_pct: 15.0,
            border_thick: 1,
            border_color: Color::WHITE,
            gap_pct: 5.0,
            opacity: 80,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(default)]
pub struct TimecodeConfig {
    pub enabled: bool,
    pub position: Anchor,
    pub scale: u32,
    pub text_color: Color,
    pub bg_color: Color,
    pub bg_opacity: u8,
}

impl Default for TimecodeConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            position: Anchor::BOTTOM_LEFT,
            scale: 100,
            text_color: Color::WHITE,
            bg_color: Color::BLACK,
            bg_opacity: 80,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(default)]
pub struct MessageConfig {
    pub enabled: bool,
    /// Multi-line text, lines separated by `\n`
    pub text: String,
    pub position: Anchor,
    pub scale: u32,
    pub text_color: Color,
    pub bg_color: Color,
    pub bg_opacity: u8,
}

impl Default for MessageConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            text: DEFAULT_MESSAGE.to_string(),
            position: Anchor::BOTTOM_CENTER,
            scale: 100,
            text_color: Color::WHITE,
            bg_color: Color::BLACK,
            bg_opacity: 0,
        }
    }
}

/// HUD modules keyed by their persisted names.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(default)]
pub struct ModulesConfig {
    pub bboxes: BboxConfig,
    pub stats: StatsConfig,
    pub minimap: MinimapConfig,
    pub collage: CollageConfig,
    pub timecode: TimecodeConfig,
    pub custom_msg: MessageConfig,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(default)]
pub struct OutputConfig {
    /// Persist face crops under the Compositing profile
    pub save_crops: bool,
    /// Destination root; empty means `<source dir>/T7MD_Output`
    pub output_dir: String,
    /// Run directory name; empty means `<source stem>_processed`
    pub custom_filename: String,
    pub profile: OutputProfile,
    pub codec: Codec,
    /// Forces the JSON Only profile
    pub skip_video: bool,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            save_crops: true,
            output_dir: String::new(),
            custom_filename: String::new(),
            profile: OutputProfile::FinalRender,
            codec: Codec::H264,
            skip_video: false,
        }
    }
}

impl OutputConfig {
    /// Profile actually used for a run.
    pub fn effective_profile(&self) -> OutputProfile {
        if self.skip_video {
            OutputProfile::JsonOnly
        } else {
            self.profile
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(default)]
pub struct StyleConfig {
    /// Margin at 1080p, scaled with the frame height
    pub global_margin: u32,
    /// TrueType font file; empty searches the system font directories
    pub font_path: String,
}

impl Default for StyleConfig {
    fn default() -> Self {
        Self {
            global_margin: 40,
            font_path: String::new(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(default)]
pub struct DepthConfig {
    /// Blend weight of the newest estimate, in (0, 1]
    pub alpha: f64,
}

impl Default for DepthConfig {
    fn default() -> Self {
        Self { alpha: 0.8 }
    }
}

/// Root of the configuration tree.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(default)]
pub struct RenderConfig {
    pub version: String,
    pub models: ModelsConfig,
    pub modules: ModulesConfig,
    pub output: OutputConfig,
    pub style: StyleConfig,
    pub depth: DepthConfig,
}

impl Default for RenderConfig {
    fn default() -> Self {
        Self {
            version: CONFIG_VERSION.to_string(),
            models: ModelsConfig::default(),
            modules: ModulesConfig::default(),
            output: OutputConfig::default(),
            style: StyleConfig::default(),
            depth: DepthConfig::default(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_color_parse() {
        assert_eq!(Color::parse_hex("#00FFFF"), Some(Color::rgb(0, 255, 255)));
        assert_eq!(Color::parse_hex("ff8000"), Some(Color::rgb(255, 128, 0)));
        assert_eq!(Color::parse_hex("#12345"), None);
        assert_eq!(Color::parse_hex("#GG0000"), None);
        assert_eq!(Color::from("nonsense".to_string()), Color::WHITE);
    }

    #[test]
    fn test_anchor_parse() {
        assert_eq!(Anchor::parse("bottom_right"), Anchor::BOTTOM_RIGHT);
        assert_eq!(Anchor::parse("top_center"), Anchor::TOP_CENTER);
        assert_eq!(Anchor::parse("center"), Anchor::CENTER);
        assert_eq!(Anchor::parse("somewhere"), Anchor::CENTER);
        assert_eq!(Anchor::parse("center_left").as_str(), "center_left");
    }

    #[test]
    fn test_alpha_from_percent() {
        assert_eq!(alpha_from_percent(0), 0);
        assert_eq!(alpha_from_percent(80), 204);
        assert_eq!(alpha_from_percent(100), 255);
        assert_eq!(alpha_from_percent(200), 255);
    }

    #[test]
    fn test_partial_document_fills_defaults() {
        let config: RenderConfig = serde_json::from_value(serde_json::json!({
            "modules": { "stats": { "header_text": "CUSTOM", "position": "bottom_left" } },
            "output": { "profile": "Compositing" }
        }))
        .unwrap();

        assert_eq!(config.modules.stats.header_text, "CUSTOM");
        assert_eq!(config.modules.stats.position, Anchor::BOTTOM_LEFT);
        assert_eq!(config.modules.stats.bg_opacity, 80);
        assert_eq!(config.modules.minimap, MinimapConfig::default());
        assert_eq!(config.output.profile, OutputProfile::Compositing);
        assert_eq!(config.style.global_margin, 40);
        assert_eq!(config.version, CONFIG_VERSION);
    }

    #[test]
    fn test_skip_video_forces_json_only() {
        let output = OutputConfig {
            skip_video: true,
            profile: OutputProfile::Compositing,
            ..Default::default()
        };
        assert_eq!(output.effective_profile(), OutputProfile::JsonOnly);
    }

    #[test]
    fn test_bbox_style_dispatch() {
        let bboxes = BboxConfig::default();
        assert_eq!(bboxes.style_for(Category::Face), (Color::rgb(0, 255, 255), 2));
        assert_eq!(bboxes.style_for(Category::Object).0, Color::rgb(255, 255, 0));
    }

    #[test]
    fn test_schema_lists_sections() {
        let schema = schemars::schema_for!(RenderConfig);
        let json = serde_json::to_value(&schema).unwrap();
        let properties = json["properties"].as_object().unwrap();
        for section in ["models", "modules", "output", "style", "depth"] {
            assert!(properties.contains_key(section), "missing {section}");
        }
    }
}
