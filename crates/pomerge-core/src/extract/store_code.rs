//! Store-code matching.

use regex::{Regex, RegexBuilder};

use super::{ExtractionMatch, FieldExtractor};
use crate::error::ConfigError;
use crate::models::StoreCode;

/// Locates store codes with a caller-supplied, case-insensitive pattern.
///
/// If the pattern has a capture group, group 1 is the code; otherwise the
/// whole match is.
#[derive(Debug, Clone)]
pub struct StoreCodeMatcher {
    regex: Regex,
    /// The same pattern anchored at both ends, for whole-token checks.
    whole: Regex,
    pattern: String,
}

impl StoreCodeMatcher {
    /// Compile the pattern, failing fast on invalid syntax.
    pub fn new(pattern: &str) -> Result<Self, ConfigError> {
        let compile = |source: &str| {
            RegexBuilder::new(source)
                .case_insensitive(true)
                .build()
                .map_err(|e| ConfigError::InvalidPattern {
                    pattern: pattern.to_string(),
                    reason: e.to_string(),
                })
        };
        let regex = compile(pattern)?;
        let whole = compile(&format!("^(?:{})$", pattern))?;

        Ok(Self {
            regex,
            whole,
            pattern: pattern.to_string(),
        })
    }

    /// The pattern this matcher was compiled from.
    pub fn pattern(&self) -> &str {
        &self.pattern
    }

    /// First store code in the text.
    pub fn find(&self, text: &str) -> Option<StoreCode> {
        self.extract(text).map(|m| m.value)
    }

    /// Whether a roster token is a well-formed store code.
    ///
    /// Capture-group patterns describe the surrounding page text rather than
    /// the code, so for those only the token's shape is checked.
    pub fn is_valid_code(&self, code: &str) -> bool {
        if code.is_empty() {
            return false;
        }
        if self.regex.captures_len() > 1 {
            return code
                .chars()
                .all(|c| c.is_alphanumeric() || c == '-' || c == '_');
        }
        self.whole.is_match(code)
    }
}

impl FieldExtractor for StoreCodeMatcher {
    type Output = ExtractionMatch<StoreCode>;

    fn extract_all(&self, text: &str) -> Vec<Self::Output> {
        self.regex
            .captures_iter(text)
            .filter_map(|caps| caps.get(1).or_else(|| caps.get(0)))
            .filter(|m| !m.as_str().trim().is_empty())
            .map(|m| ExtractionMatch::new(StoreCode::new(m.as_str()), m.start(), m.end(), m.as_str()))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::config::DEFAULT_STORE_CODE_PATTERN;

    #[test]
    fn test_first_match_wins_and_is_uppercased() {
        let matcher = StoreCodeMatcher::new(r"SG\d{4}").unwrap();
        let text = "Store: sg0042\nTransfer to SG0001";

        assert_eq!(matcher.find(text), Some(StoreCode::new("SG0042")));
        assert_eq!(matcher.extract_all(text).len(), 2);
    }

    #[test]
    fn test_no_match_is_none() {
        let matcher = StoreCodeMatcher::new(DEFAULT_STORE_CODE_PATTERN).unwrap();
        assert_eq!(matcher.find("Purchase order batch report\nPage 1 of 3"), None);
    }

    #[test]
    fn test_default_pattern_requires_four_digits() {
        let matcher = StoreCodeMatcher::new(DEFAULT_STORE_CODE_PATTERN).unwrap();

        assert_eq!(matcher.find("code AB12345 ignored, HN0007 kept"), Some(StoreCode::new("HN0007")));
        assert_eq!(matcher.find("dated 01/06/2024"), None);
    }

    #[test]
    fn test_capture_group_selects_code() {
        let matcher = StoreCodeMatcher::new(r"Store\s*#\s*(\w+\d{4})").unwrap();
        assert_eq!(matcher.find("Store # hn0009"), Some(StoreCode::new("HN0009")));
    }

    #[test]
    fn test_invalid_pattern_is_config_error() {
        let err = StoreCodeMatcher::new(r"SG\d{4").unwrap_err();
        assert!(matches!(err, ConfigError::InvalidPattern { .. }));
    }

    #[test]
    fn test_is_valid_code() {
        let matcher = StoreCodeMatcher::new(r"\bSG\d{4}\b").unwrap();

        assert!(matcher.is_valid_code("SG0001"));
        assert!(matcher.is_valid_code("sg0001"));
        assert!(!matcher.is_valid_code("SG001"));
        assert!(!matcher.is_valid_code("XSG0001"));
        assert!(!matcher.is_valid_code(""));
    }

    #[test]
    fn test_is_valid_code_tries_every_alternative() {
        let matcher = StoreCodeMatcher::new(r"SG\d{4}|SG\d{4}X").unwrap();

        assert!(matcher.is_valid_code("SG0001X"));
        assert!(matcher.is_valid_code("SG0001"));
        assert!(!matcher.is_valid_code("SG0001Y"));
    }
}
