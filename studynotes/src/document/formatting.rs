//! Text formatting attributes
//!
//! Presentation attributes the rendering layer attaches to a range or a
//! whole document. Only carried and serialized here, never interpreted.

use serde::{Deserialize, Serialize};

/// Paragraph alignment
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum TextAlignment {
    #[default]
    Left,
    Center,
    Right,
    Justify,
}

/// Formatting applied to a span of text
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TextFormatting {
    #[serde(default)]
    pub bold: bool,
    #[serde(default)]
    pub italic: bool,
    #[serde(default = "default_font_family")]
    pub font_family: String,
    #[serde(default = "default_font_size")]
    pub font_size: f64,
    #[serde(default = "default_text_color")]
    pub text_color: String,
    #[serde(default = "default_background_color")]
    pub background_color: String,
    #[serde(default)]
    pub alignment: TextAlignment,
    #[serde(default = "default_line_height")]
    pub line_height: f64,
    #[serde(default)]
    pub paragraph_spacing: f64,
    #[serde(default)]
    pub indent: f64,
}

fn default_font_family() -> String {
    "Segoe UI".to_string()
}

fn default_font_size() -> f64 {
    14.0
}

fn default_text_color() -> String {
    "#FF000000".to_string()
}

fn default_background_color() -> String {
    "#00FFFFFF".to_string() // transparent
}

fn default_line_height() -> f64 {
    1.2
}

impl Default for TextFormatting {
    fn default() -> Self {
        Self {
            bold: false,
            italic: false,
            font_family: default_font_family(),
            font_size: default_font_size(),
            text_color: default_text_color(),
            background_color: default_background_color(),
            alignment: TextAlignment::default(),
            line_height: default_line_height(),
            paragraph_spacing: 0.0,
            indent: 0.0,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_formatting_survives_serialization() {
        let formatting = TextFormatting {
            bold: true,
            italic: true,
            font_family: "Cascadia Code".to_string(),
            font_size: 17.5,
            text_color: "#FF112233".to_string(),
            background_color: "#FFFFFF00".to_string(),
            alignment: TextAlignment::Justify,
            line_height: 1.45,
            paragraph_spacing: 6.0,
            indent: 24.0,
        };

        let json = serde_json::to_string(&formatting).unwrap();
        let back: TextFormatting = serde_json::from_str(&json).unwrap();

        assert_eq!(back, formatting);
    }

    #[test]
    fn test_stable_field_names() {
        let json = serde_json::to_value(TextFormatting::default()).unwrap();

        assert_eq!(json["fontFamily"], "Segoe UI");
        assert_eq!(json["alignment"], "Left");
        assert!(json.get("paragraphSpacing").is_some());
    }

    #[test]
    fn test_missing_fields_fall_back_to_defaults() {
        let formatting: TextFormatting = serde_json::from_str(r#"{"bold":true}"#).unwrap();

        assert!(formatting.bold);
        assert_eq!(formatting.font_size, 14.0);
        assert_eq!(formatting.alignment, TextAlignment::Left);
    }
}
