use std::fmt;

use serde::{Deserialize, Serialize};

use crate::ai::provider::LlmProvider;
use crate::core::secret::ApiKey;

pub const DEFAULT_TONE: &str = "professional";

/// Everything needed to turn one upload into one presentation.
pub struct GenerationRequest {
    pub text: String,
    pub guidance: Option<String>,
    pub tone: String,
    pub provider: LlmProvider,
    pub api_key: ApiKey,
    pub template: Vec<u8>,
    pub template_name: Option<String>,
}

// Manual impl: template bytes are noise in logs, and the key must stay redacted.
impl fmt::Debug for GenerationRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("GenerationRequest")
            .field("text_chars", &self.text.chars().count())
            .field("guidance", &self.guidance)
            .field("tone", &self.tone)
            .field("provider", &self.provider)
            .field("api_key", &self.api_key)
            .field("template_bytes", &self.template.len())
            .field("template_name", &self.template_name)
            .finish()
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SlideKind {
    Title,
    Section,
    #[default]
    Content,
}

impl SlideKind {
    /// Maps the model's free-form `type` string; anything unrecognised is a content slide.
    #[must_use]
    pub fn from_label(label: &str) -> Self {
        match label.trim().to_ascii_lowercase().as_str() {
            "title" => Self::Title,
            "section" => Self::Section,
            _ => Self::Content,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SlideEntry {
    #[serde(rename = "type")]
    pub kind: SlideKind,
    pub title: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub subtitle: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub content: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub speaker_notes: Option<String>,
}

/// Ordered slide outline produced by the LLM.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SlidePlan {
    pub title: String,
    pub slides: Vec<SlideEntry>,
}

/// An sRGB colour, serialised as `[r, g, b]`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Rgb(pub u8, pub u8, pub u8);

impl Rgb {
    /// Parses the `RRGGBB` form used by DrawingML `srgbClr/@val`.
    #[must_use]
    pub fn from_hex(hex: &str) -> Option<Self> {
        let hex = hex.trim();
        if hex.len() != 6 || !hex.is_ascii() {
            return None;
        }
        let channel = |range: std::ops::Range<usize>| u8::from_str_radix(&hex[range], 16).ok();
        Some(Self(channel(0..2)?, channel(2..4)?, channel(4..6)?))
    }

    #[must_use]
    pub fn to_hex(self) -> String {
        format!("{:02X}{:02X}{:02X}", self.0, self.1, self.2)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FontSet {
    pub title: String,
    pub subtitle: String,
    pub body: String,
}

impl Default for FontSet {
    fn default() -> Self {
        Self {
            title: "Arial".to_string(),
            subtitle: "Arial".to_string(),
            body: "Arial".to_string(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ColorSet {
    pub title: Rgb,
    pub body: Rgb,
    pub accent: Rgb,
}

impl Default for ColorSet {
    fn default() -> Self {
        Self {
            title: Rgb(0, 0, 0),
            body: Rgb(64, 64, 64),
            accent: Rgb(0, 102, 204),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NamedColor {
    pub name: String,
    pub rgb: Rgb,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlaceholderInfo {
    /// `p:ph/@type`, `obj` when absent.
    pub kind: String,
    pub idx: u32,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LayoutInfo {
    pub index: usize,
    pub name: String,
    pub placeholder_count: usize,
    pub placeholders: Vec<PlaceholderInfo>,
}

/// A picture found on one of the template's own slides. Offsets are in EMU.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TemplateImage {
    pub slide_index: usize,
    pub shape_index: usize,
    pub left: i64,
    pub top: i64,
    pub width: i64,
    pub height: i64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SlideSize {
    pub width: i64,
    pub height: i64,
}

impl Default for SlideSize {
    fn default() -> Self {
        // 10in x 7.5in
        Self {
            width: 9_144_000,
            height: 6_858_000,
        }
    }
}

/// Visual style read from an uploaded template.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TemplateStyle {
    pub fonts: FontSet,
    pub colors: ColorSet,
    pub theme_colors: Vec<NamedColor>,
    pub layouts: Vec<LayoutInfo>,
    pub images: Vec<TemplateImage>,
    pub slide_size: SlideSize,
}

pub struct GeneratedPresentation {
    pub file_name: String,
    pub bytes: Vec<u8>,
    pub slide_count: usize,
}

impl fmt::Debug for GeneratedPresentation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("GeneratedPresentation")
            .field("file_name", &self.file_name)
            .field("bytes", &self.bytes.len())
            .field("slide_count", &self.slide_count)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rgb_hex_round_trip() {
        let rgb = Rgb::from_hex("1f3864").unwrap();
        assert_eq!(rgb, Rgb(0x1F, 0x38, 0x64));
        assert_eq!(rgb.to_hex(), "1F3864");
        assert!(Rgb::from_hex("12345").is_none());
        assert!(Rgb::from_hex("GGGGGG").is_none());
    }

    #[test]
    fn test_slide_kind_from_label() {
        assert_eq!(SlideKind::from_label("Title"), SlideKind::Title);
        assert_eq!(SlideKind::from_label(" section "), SlideKind::Section);
        assert_eq!(SlideKind::from_label("bullets"), SlideKind::Content);
    }

    #[test]
    fn test_slide_entry_serializes_type_field() {
        let entry = SlideEntry {
            kind: SlideKind::Section,
            title: "Part 2".to_string(),
            subtitle: None,
            content: vec![],
            speaker_notes: None,
        };
        let json = serde_json::to_value(&entry).unwrap();
        assert_eq!(json["type"], "section");
        assert!(json.get("content").is_none());
    }
}
