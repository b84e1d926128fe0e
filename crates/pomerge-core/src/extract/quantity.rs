//! Quantity extraction and formatting.

use regex::{Regex, RegexBuilder};
use rust_decimal::{Decimal, RoundingStrategy};
use std::str::FromStr;

use super::patterns::QUANTITY_VALUE;
use super::{ExtractionMatch, FieldExtractor};
use crate::error::ConfigError;
use crate::models::AnnotationConfig;

/// Finds a number that follows one of the configured quantity labels.
#[derive(Debug, Clone)]
pub struct QuantityExtractor {
    regex: Regex,
}

impl QuantityExtractor {
    /// Build the extractor from literal labels (matched case-insensitively).
    pub fn new(labels: &[String]) -> Result<Self, ConfigError> {
        let mut labels: Vec<&str> = labels
            .iter()
            .map(|l| l.trim())
            .filter(|l| !l.is_empty())
            .collect();
        if labels.is_empty() {
            return Err(ConfigError::InvalidLabels("no quantity label configured".to_string()));
        }

        // Longest first, so "Total Qty" is not shadowed by "Qty".
        labels.sort_by_key(|l| std::cmp::Reverse(l.chars().count()));
        let alternatives: Vec<String> = labels.iter().map(|l| regex::escape(l)).collect();

        // The value must start a word of its own, never the tail of a code
        let pattern = format!(
            r"\b(?:{})\b[^0-9\n]{{0,16}}?\b(?P<value>{})",
            alternatives.join("|"),
            QUANTITY_VALUE
        );
        let regex = RegexBuilder::new(&pattern)
            .case_insensitive(true)
            .build()
            .map_err(|e| ConfigError::InvalidLabels(e.to_string()))?;

        Ok(Self { regex })
    }
}

impl FieldExtractor for QuantityExtractor {
    type Output = ExtractionMatch<Decimal>;

    fn extract_all(&self, text: &str) -> Vec<Self::Output> {
        self.regex
            .captures_iter(text)
            .filter_map(|caps| {
                let value = caps.name("value")?;
                let quantity = parse_quantity(value.as_str())?;
                Some(ExtractionMatch::new(quantity, value.start(), value.end(), value.as_str()))
            })
            .collect()
    }
}

/// Parse a locale-formatted quantity ("1,234", "1.234,5", "12,5", "1 234").
///
/// With both `,` and `.` present the last one is the decimal separator. With
/// only one kind, it groups thousands when every group after the first has
/// exactly three digits; otherwise it is the decimal separator.
pub fn parse_quantity(s: &str) -> Option<Decimal> {
    let cleaned: String = s
        .chars()
        .filter(|c| c.is_ascii_digit() || *c == ',' || *c == '.')
        .collect();
    if cleaned.is_empty() {
        return None;
    }

    let normalized = match (cleaned.rfind(','), cleaned.rfind('.')) {
        (Some(c), Some(d)) if c > d => cleaned.replace('.', "").replace(',', "."),
        (Some(_), Some(_)) => cleaned.replace(',', ""),
        (Some(_), None) => normalize_single_separator(&cleaned, ','),
        (None, Some(_)) => normalize_single_separator(&cleaned, '.'),
        (None, None) => cleaned,
    };

    Decimal::from_str(&normalized).ok()
}

fn normalize_single_separator(s: &str, separator: char) -> String {
    let groups: Vec<&str> = s.split(separator).collect();
    let grouped = groups.len() > 1
        && !groups[0].is_empty()
        && !groups[0].starts_with('0')
        && groups[0].len() <= 3
        && groups[1..].iter().all(|g| g.len() == 3);

    if grouped {
        s.replace(separator, "")
    } else if groups.len() == 2 {
        s.replace(separator, ".")
    } else {
        // "1,2,3" is neither grouping nor a decimal; keep the leading number.
        groups[0].to_string()
    }
}

/// Render a quantity for presentation.
///
/// Without `decimal_places` the exact value is shown with trailing zeros
/// removed. With it, the value is rounded half away from zero.
pub fn format_quantity(value: Decimal, decimal_separator: char, decimal_places: Option<u32>) -> String {
    let s = match decimal_places {
        Some(dp) => {
            let rounded = value.round_dp_with_strategy(dp, RoundingStrategy::MidpointAwayFromZero);
            format!("{:.*}", dp as usize, rounded)
        }
        None => value.normalize().to_string(),
    };

    if decimal_separator == '.' {
        s
    } else {
        s.replace('.', &decimal_separator.to_string())
    }
}

/// Presentation settings for quantities.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct QuantityFormat {
    pub decimal_separator: char,
    pub decimal_places: Option<u32>,
}

impl QuantityFormat {
    pub fn format(&self, value: Decimal) -> String {
        format_quantity(value, self.decimal_separator, self.decimal_places)
    }
}

impl Default for QuantityFormat {
    fn default() -> Self {
        Self {
            decimal_separator: '.',
            decimal_places: None,
        }
    }
}

impl From<&AnnotationConfig> for QuantityFormat {
    fn from(config: &AnnotationConfig) -> Self {
        Self {
            decimal_separator: config.decimal_separator,
            decimal_places: config.decimal_places,
        }
    }
}
