//! Expected store roster and the code index built from it.
//!
//! A roster is UTF-8 text with one store per line: `code`, `code,name`, or
//! `code,name,staff`. The column count of the first row fixes the format
//! for the whole file.

use std::path::Path;

use indexmap::IndexMap;
use tracing::{debug, warn};

use crate::error::ConfigError;
use crate::extract::StoreCodeMatcher;
use crate::models::{RosterConfig, RosterEntry, StoreCode};

/// Column layout of a roster file.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum RosterFormat {
    /// `code`
    #[default]
    CodesOnly,
    /// `code,name`
    CodeAndName,
    /// `code,name,staff`
    CodeNameStaff,
}

impl RosterFormat {
    fn from_columns(columns: usize) -> Option<Self> {
        match columns {
            1 => Some(RosterFormat::CodesOnly),
            2 => Some(RosterFormat::CodeAndName),
            3 => Some(RosterFormat::CodeNameStaff),
            _ => None,
        }
    }

    /// Number of columns every row must have.
    pub fn columns(self) -> usize {
        match self {
            RosterFormat::CodesOnly => 1,
            RosterFormat::CodeAndName => 2,
            RosterFormat::CodeNameStaff => 3,
        }
    }
}

/// Read-only lookup of roster codes, preserving roster order.
#[derive(Debug, Clone, Default)]
pub struct CodeIndex {
    entries: IndexMap<StoreCode, RosterEntry>,
    format: RosterFormat,
}

impl CodeIndex {
    /// Parse roster text. Codes must match the store-code pattern.
    pub fn load(
        source: &str,
        matcher: &StoreCodeMatcher,
        config: &RosterConfig,
    ) -> Result<Self, ConfigError> {
        let source = source.trim_start_matches('\u{feff}');
        let mut reader = csv::ReaderBuilder::new()
            .has_headers(false)
            .flexible(true)
            .trim(csv::Trim::All)
            .comment(Some(b'#'))
            .from_reader(source.as_bytes());

        let mut entries: IndexMap<StoreCode, RosterEntry> = IndexMap::new();
        let mut format: Option<RosterFormat> = None;
        let mut skip_header = config.has_header;

        for record in reader.records() {
            let record = record.map_err(|e| ConfigError::Roster(e.to_string()))?;
            let line = record.position().map(|p| p.line()).unwrap_or(0);

            if record.iter().all(|field| field.is_empty()) {
                continue;
            }
            if skip_header {
                skip_header = false;
                continue;
            }

            let found = record.len();
            let expected = match format {
                Some(format) => format,
                None => {
                    let detected = RosterFormat::from_columns(found)
                        .ok_or(ConfigError::UnsupportedColumns { line, found })?;
                    debug!("Roster format detected from line {}: {:?}", line, detected);
                    format = Some(detected);
                    detected
                }
            };
            if found != expected.columns() {
                return Err(ConfigError::MixedColumns {
                    line,
                    expected: expected.columns(),
                    found,
                });
            }

            let raw_code = &record[0];
            if !matcher.is_valid_code(raw_code) {
                return Err(ConfigError::InvalidCode {
                    line,
                    code: raw_code.to_string(),
                });
            }

            let mut entry = RosterEntry::new(StoreCode::new(raw_code));
            if let Some(name) = record.get(1).filter(|s| !s.is_empty()) {
                entry = entry.with_display_name(name);
            }
            if let Some(staff) = record.get(2).filter(|s| !s.is_empty()) {
                entry = entry.with_staff(staff);
            }

            if entries.contains_key(&entry.code) {
                warn!("Roster line {}: duplicate code {} ignored", line, entry.code);
                continue;
            }
            entries.insert(entry.code.clone(), entry);
        }

        debug!("Loaded roster with {} codes", entries.len());
        Ok(Self {
            entries,
            format: format.unwrap_or_default(),
        })
    }

    /// Read and parse a roster file.
    pub fn from_path(
        path: &Path,
        matcher: &StoreCodeMatcher,
        config: &RosterConfig,
    ) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| ConfigError::Roster(format!("{}: {}", path.display(), e)))?;
        Self::load(&content, matcher, config)
    }

    /// Build an index from ready-made entries; later duplicates are ignored.
    pub fn from_entries(entries: impl IntoIterator<Item = RosterEntry>) -> Self {
        let mut map = IndexMap::new();
        let mut has_name = false;
        let mut has_staff = false;
        for entry in entries {
            has_name |= entry.display_name.is_some();
            has_staff |= entry.staff.is_some();
            map.entry(entry.code.clone()).or_insert(entry);
        }
        let format = match (has_name, has_staff) {
            (_, true) => RosterFormat::CodeNameStaff,
            (true, false) => RosterFormat::CodeAndName,
            (false, false) => RosterFormat::CodesOnly,
        };
        Self { entries: map, format }
    }

    pub fn contains(&self, code: &StoreCode) -> bool {
        self.entries.contains_key(code)
    }

    pub fn get(&self, code: &StoreCode) -> Option<&RosterEntry> {
        self.entries.get(code)
    }

    pub fn display_name(&self, code: &StoreCode) -> Option<&str> {
        self.entries.get(code).and_then(|e| e.display_name.as_deref())
    }

    pub fn staff(&self, code: &StoreCode) -> Option<&str> {
        self.entries.get(code).and_then(|e| e.staff.as_deref())
    }

    /// Entries in roster order.
    pub fn entries(&self) -> impl Iterator<Item = &RosterEntry> {
        self.entries.values()
    }

    pub fn format(&self) -> RosterFormat {
        self.format
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn matcher() -> StoreCodeMatcher {
        StoreCodeMatcher::new(r"\bSG\d{4}\b").unwrap()
    }

    fn codes(index: &CodeIndex) -> Vec<&str> {
        index.entries().map(|e| e.code.as_str()).collect()
    }

    #[test]
    fn test_single_column_roster() {
        let index = CodeIndex::load("sg0002\n\n  SG0001  \n", &matcher(), &RosterConfig::default()).unwrap();

        assert_eq!(index.format(), RosterFormat::CodesOnly);
        assert_eq!(codes(&index), vec!["SG0002", "SG0001"]);
        assert!(index.contains(&StoreCode::new("SG0001")));
        assert_eq!(index.display_name(&StoreCode::new("SG0001")), None);
    }

    #[test]
    fn test_two_column_roster() {
        let text = "SG0001, Store One\nSG0002,\"Store Two, Mall\"\nSG0003,\n";
        let index = CodeIndex::load(text, &matcher(), &RosterConfig::default()).unwrap();

        assert_eq!(index.format(), RosterFormat::CodeAndName);
        assert_eq!(index.display_name(&StoreCode::new("SG0001")), Some("Store One"));
        assert_eq!(index.display_name(&StoreCode::new("SG0002")), Some("Store Two, Mall"));
        assert_eq!(index.display_name(&StoreCode::new("SG0003")), None);
    }

    #[test]
    fn test_three_column_roster_carries_staff() {
        let text = "SG0001,Store One,Lan\nSG0002,Store Two,\n";
        let index = CodeIndex::load(text, &matcher(), &RosterConfig::default()).unwrap();

        assert_eq!(index.format(), RosterFormat::CodeNameStaff);
        assert_eq!(index.staff(&StoreCode::new("SG0001")), Some("Lan"));
        assert_eq!(index.staff(&StoreCode::new("SG0002")), None);
    }

    #[test]
    fn test_mixed_columns_fail() {
        let err = CodeIndex::load("SG0001\nSG0002,Store Two\n", &matcher(), &RosterConfig::default())
            .unwrap_err();

        assert!(matches!(
            err,
            ConfigError::MixedColumns {
                line: 2,
                expected: 1,
                found: 2
            }
        ));
    }

    #[test]
    fn test_invalid_code_fails() {
        let err = CodeIndex::load("SG0001\nSG01\n", &matcher(), &RosterConfig::default()).unwrap_err();
        assert!(matches!(err, ConfigError::InvalidCode { line: 2, .. }));
    }

    #[test]
    fn test_header_row_skipped_when_configured() {
        let config = RosterConfig { has_header: true };
        let index = CodeIndex::load("code,name\nSG0001,Store One\n", &matcher(), &config).unwrap();
        assert_eq!(codes(&index), vec!["SG0001"]);

        let err = CodeIndex::load("code,name\nSG0001,Store One\n", &matcher(), &RosterConfig::default())
            .unwrap_err();
        assert!(matches!(err, ConfigError::InvalidCode { line: 1, .. }));
    }

    #[test]
    fn test_duplicates_keep_first() {
        let text = "SG0001,First\nSG0002,Second\nsg0001,Again\n";
        let index = CodeIndex::load(text, &matcher(), &RosterConfig::default()).unwrap();

        assert_eq!(codes(&index), vec!["SG0001", "SG0002"]);
        assert_eq!(index.display_name(&StoreCode::new("SG0001")), Some("First"));
    }

    #[test]
    fn test_empty_roster() {
        let index = CodeIndex::load("\n\n", &matcher(), &RosterConfig::default()).unwrap();
        assert!(index.is_empty());
    }
}
