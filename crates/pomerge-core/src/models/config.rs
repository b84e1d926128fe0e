//! Configuration structures for a merge run.

use serde::{Deserialize, Serialize};

use crate::error::{ConfigError, Result};

/// Default store-code pattern: a letter prefix followed by exactly four digits.
pub const DEFAULT_STORE_CODE_PATTERN: &str = r"\b[A-Z]+\d{4}\b";

/// Main configuration for the pomerge pipeline.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct PoMergeConfig {
    /// Field extraction configuration.
    pub extraction: ExtractionConfig,

    /// Roster parsing configuration.
    pub roster: RosterConfig,

    /// Page annotation configuration.
    pub annotation: AnnotationConfig,

    /// Merge configuration.
    pub merge: MergeConfig,
}

/// Store-code, quantity and date extraction configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ExtractionConfig {
    /// Regular expression locating the store code on a page.
    pub store_code_pattern: String,

    /// Labels that introduce the quantity field.
    pub quantity_labels: Vec<String>,
}

impl Default for ExtractionConfig {
    fn default() -> Self {
        Self {
            store_code_pattern: DEFAULT_STORE_CODE_PATTERN.to_string(),
            quantity_labels: vec![
                "Total Qty".to_string(),
                "Order Qty".to_string(),
                "Quantity".to_string(),
                "Qty".to_string(),
                "Số lượng".to_string(),
                "SL".to_string(),
            ],
        }
    }
}

/// Roster file configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct RosterConfig {
    /// Skip the first non-blank row.
    pub has_header: bool,
}

/// Quantity overlay configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AnnotationConfig {
    /// Write the halved quantity onto pages.
    pub enabled: bool,

    /// Base-14 font used for the overlay.
    pub font: String,

    /// Font size at the reference page height.
    pub font_size: f32,

    /// Fill colour (RGB, 0.0 - 1.0).
    pub color: [f32; 3],

    /// Gap between the text and the right edge, as a share of page width.
    pub right_margin_ratio: f32,

    /// Gap between the baseline and the bottom edge, as a share of page height.
    pub bottom_margin_ratio: f32,

    /// Page height (points) at which `font_size` applies unscaled.
    pub reference_height: f32,

    /// Decimal separator used when rendering quantities.
    pub decimal_separator: char,

    /// Round rendered quantities to this many places (presentation only).
    pub decimal_places: Option<u32>,
}

impl Default for AnnotationConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            font: "Helvetica-Bold".to_string(),
            font_size: 20.0,
            color: [1.0, 0.0, 0.0],
            right_margin_ratio: 0.02,
            bottom_margin_ratio: 0.012,
            reference_height: 842.0,
            decimal_separator: '.',
            decimal_places: None,
        }
    }
}

/// Page order used for the merged output.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MergeOrder {
    /// Source-list order, then page order within each source.
    #[default]
    Source,
    /// Store groups in roster order, then extra codes, then ungrouped pages.
    Roster,
}

/// Merge configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MergeConfig {
    /// Output page order.
    pub order: MergeOrder,

    /// Abort the run on the first unreadable source instead of skipping it.
    pub strict: bool,
}

impl Default for MergeConfig {
    fn default() -> Self {
        Self {
            order: MergeOrder::Source,
            strict: true,
        }
    }
}

impl PoMergeConfig {
    /// Load configuration from a JSON file.
    pub fn from_file(path: &std::path::Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config = serde_json::from_str(&content)
            .map_err(|e| ConfigError::File(format!("{}: {}", path.display(), e)))?;
        Ok(config)
    }

    /// Save configuration to a JSON file.
    pub fn save(&self, path: &std::path::Path) -> Result<()> {
        let content = serde_json::to_string_pretty(self)
            .map_err(|e| ConfigError::File(e.to_string()))?;
        std::fs::write(path, content)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_partial_json_falls_back_to_defaults() {
        let config: PoMergeConfig =
            serde_json::from_str(r#"{"merge": {"order": "roster"}}"#).unwrap();

        assert_eq!(config.merge.order, MergeOrder::Roster);
        assert!(config.merge.strict);
        assert_eq!(config.extraction.store_code_pattern, DEFAULT_STORE_CODE_PATTERN);
        assert_eq!(config.annotation.decimal_separator, '.');
    }

    #[test]
    fn test_save_and_load() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");

        let mut config = PoMergeConfig::default();
        config.extraction.store_code_pattern = r"SG\d{4}".to_string();
        config.annotation.decimal_places = Some(1);
        config.save(&path).unwrap();

        let loaded = PoMergeConfig::from_file(&path).unwrap();
        assert_eq!(loaded.extraction.store_code_pattern, r"SG\d{4}");
        assert_eq!(loaded.annotation.decimal_places, Some(1));
    }

    #[test]
    fn test_malformed_file_is_config_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");
        std::fs::write(&path, "{ not json").unwrap();

        let err = PoMergeConfig::from_file(&path).unwrap_err();
        assert!(matches!(
            err,
            crate::error::PoMergeError::Config(ConfigError::File(_))
        ));
    }
}
