//! Language Configuration
//!
//! The JSON-described bundle that drives highlighting for one language:
//! keyword categories, regex patterns, an optional palette and editor
//! feature flags.

use std::collections::BTreeMap;
use serde::{Deserialize, Serialize};

use kedit_core::EditorDefaults;

/// RGBA color written as `#rrggbb` or `#rrggbbaa`
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct Color {
    pub r: u8,
    pub g: u8,
    pub b: u8,
    pub a: u8,
}

impl Color {
    pub const fn rgb(r: u8, g: u8, b: u8) -> Self {
        Self { r, g, b, a: 255 }
    }

    pub fn from_hex(hex: &str) -> Option<Self> {
        let hex = hex.trim().strip_prefix('#')?;
        if !hex.is_ascii() {
            return None;
        }
        let channel = |i: usize| u8::from_str_radix(&hex[i..i + 2], 16).ok();
        match hex.len() {
            6 => Some(Self::rgb(channel(0)?, channel(2)?, channel(4)?)),
            8 => Some(Self {
                r: channel(0)?,
                g: channel(2)?,
                b: channel(4)?,
                a: channel(6)?,
            }),
            _ => None,
        }
    }

    pub fn to_hex(&self) -> String {
        if self.a == 255 {
            format!("#{:02x}{:02x}{:02x}", self.r, self.g, self.b)
        } else {
            format!("#{:02x}{:02x}{:02x}{:02x}", self.r, self.g, self.b, self.a)
        }
    }

    /// Packed `0xAARRGGBB`, the form Android color APIs take
    pub fn to_argb(&self) -> u32 {
        u32::from_be_bytes([self.a, self.r, self.g, self.b])
    }
}

/// Palette as stored in JSON; every entry is a hex string
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct ColorPalette {
    pub background: Option<String>,
    pub foreground: Option<String>,
    pub keyword: Option<String>,
    pub string: Option<String>,
    pub comment: Option<String>,
    pub number: Option<String>,
    pub function: Option<String>,
    #[serde(rename = "type")]
    pub type_name: Option<String>,
    pub operator: Option<String>,
    pub annotation: Option<String>,
    pub line_number: Option<String>,
    pub current_line: Option<String>,
    pub bracket_match: Option<String>,
}

impl ColorPalette {
    /// Every `(slot, value)` pair that is set
    pub fn entries(&self) -> Vec<(&'static str, &str)> {
        [
            ("background", &self.background),
            ("foreground", &self.foreground),
            ("keyword", &self.keyword),
            ("string", &self.string),
            ("comment", &self.comment),
            ("number", &self.number),
            ("function", &self.function),
            ("type", &self.type_name),
            ("operator", &self.operator),
            ("annotation", &self.annotation),
            ("line_number", &self.line_number),
            ("current_line", &self.current_line),
            ("bracket_match", &self.bracket_match),
        ]
        .into_iter()
        .filter_map(|(slot, value)| value.as_deref().map(|v| (slot, v)))
        .collect()
    }
}

/// Editor behaviour toggles
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct FeatureFlags {
    pub tab_size: u32,
    pub use_spaces: bool,
    pub line_numbers: bool,
    pub word_wrap: bool,
    pub highlight_brackets: bool,
    pub highlight_current_line: bool,
    pub auto_indent: bool,
}

impl Default for FeatureFlags {
    fn default() -> Self {
        Self::from(&EditorDefaults::default())
    }
}

impl From<&EditorDefaults> for FeatureFlags {
    fn from(defaults: &EditorDefaults) -> Self {
        Self {
            tab_size: defaults.tab_size,
            use_spaces: defaults.use_spaces,
            line_numbers: defaults.show_line_numbers,
            word_wrap: defaults.word_wrap,
            highlight_brackets: defaults.highlight_brackets,
            highlight_current_line: defaults.highlight_current_line,
            auto_indent: true,
        }
    }
}

/// Highlighting configuration for one language
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct LanguageConfiguration {
    /// Lowercase key, also the file name of the override
    pub name: String,
    #[serde(default)]
    pub display_name: String,
    #[serde(default)]
    pub file_extensions: Vec<String>,
    /// Category (`keyword`, `type`, `constant`, ...) to words
    #[serde(default)]
    pub keywords: BTreeMap<String, Vec<String>>,
    /// Category (`comment`, `string`, `number`, ...) to regex
    #[serde(default)]
    pub patterns: BTreeMap<String, String>,
    #[serde(default)]
    pub colors: Option<ColorPalette>,
    #[serde(default)]
    pub features: FeatureFlags,
}

impl LanguageConfiguration {
    /// Minimal configuration for a language nothing is known about
    pub fn template(name: &str) -> Self {
        let name = normalize_name(name);
        let mut patterns = BTreeMap::new();
        patterns.insert("string".to_string(), r#""(?:[^"\\]|\\.)*""#.to_string());
        patterns.insert("number".to_string(), r"\b\d+(?:\.\d+)?\b".to_string());

        Self {
            display_name: display_name_for(&name),
            name,
            file_extensions: Vec::new(),
            keywords: BTreeMap::new(),
            patterns,
            colors: None,
            features: FeatureFlags::default(),
        }
    }

    /// Whether `extension` (with or without the dot) belongs to this language
    pub fn handles_extension(&self, extension: &str) -> bool {
        let wanted = extension.trim_start_matches('.').to_ascii_lowercase();
        self.file_extensions
            .iter()
            .any(|e| e.trim_start_matches('.').eq_ignore_ascii_case(&wanted))
    }

    /// Nothing to drive a pattern highlighter with
    pub fn is_empty(&self) -> bool {
        self.keywords.values().all(Vec::is_empty) && self.patterns.is_empty()
    }

    pub fn keyword_count(&self) -> usize {
        self.keywords.values().map(Vec::len).sum()
    }
}

/// Lowercase, trimmed language key
pub fn normalize_name(name: &str) -> String {
    name.trim().to_ascii_lowercase()
}

fn display_name_for(name: &str) -> String {
    let mut chars = name.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_color_from_hex() {
        let color = Color::from_hex("#ff8000").unwrap();
        assert_eq!((color.r, color.g, color.b, color.a), (255, 128, 0, 255));
        assert_eq!(color.to_argb(), 0xffff8000);

        let translucent = Color::from_hex("#1e1e1e80").unwrap();
        assert_eq!(translucent.a, 0x80);
        assert_eq!(translucent.to_hex(), "#1e1e1e80");

        assert!(Color::from_hex("ff8000").is_none());
        assert!(Color::from_hex("#ff80").is_none());
        assert!(Color::from_hex("#gg0000").is_none());
    }

    #[test]
    fn test_unknown_fields_are_ignored() {
        let json = r#"{
            "name": "toy",
            "file_extensions": ["toy"],
            "keywords": {"keyword": ["if"]},
            "schema_version": 7,
            "features": {"tab_size": 2, "future_flag": true}
        }"#;
        let config: LanguageConfiguration = serde_json::from_str(json).unwrap();
        assert_eq!(config.features.tab_size, 2);
        assert!(config.features.use_spaces);
        assert!(config.colors.is_none());
        assert!(config.handles_extension(".TOY"));
    }

    #[test]
    fn test_all_fields_written() {
        let json = serde_json::to_value(LanguageConfiguration::template("Toy")).unwrap();
        for key in ["name", "display_name", "file_extensions", "keywords", "patterns", "colors", "features"] {
            assert!(json.get(key).is_some(), "missing {key}");
        }
        assert_eq!(json["name"], "toy");
        assert_eq!(json["display_name"], "Toy");
    }

    #[test]
    fn test_palette_entries() {
        let palette = ColorPalette {
            keyword: Some("#cc7832".into()),
            type_name: Some("#a9b7c6".into()),
            ..Default::default()
        };
        assert_eq!(palette.entries(), vec![("keyword", "#cc7832"), ("type", "#a9b7c6")]);
    }
}
