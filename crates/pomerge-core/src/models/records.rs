//! Per-page and roster data records.

use std::fmt;

use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// A store identifier, normalized to uppercase.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct StoreCode(String);

impl StoreCode {
    /// Normalize a matched token into a store code.
    pub fn new(raw: &str) -> Self {
        Self(raw.trim().to_uppercase())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for StoreCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// One row of the expected roster.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RosterEntry {
    pub code: StoreCode,
    pub display_name: Option<String>,
    /// Staff member responsible for the store (three-column rosters only).
    pub staff: Option<String>,
}

impl RosterEntry {
    pub fn new(code: StoreCode) -> Self {
        Self {
            code,
            display_name: None,
            staff: None,
        }
    }

    pub fn with_display_name(mut self, name: impl Into<String>) -> Self {
        self.display_name = Some(name.into());
        self
    }

    pub fn with_staff(mut self, staff: impl Into<String>) -> Self {
        self.staff = Some(staff.into());
        self
    }
}

/// Renders as `code` or `code - name`.
impl fmt::Display for RosterEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.display_name {
            Some(name) => write!(f, "{} - {}", self.code, name),
            None => write!(f, "{}", self.code),
        }
    }
}

/// Address of one page: index into the loaded source list and 1-based page number.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct PageRef {
    pub source: usize,
    pub page: u32,
}

impl PageRef {
    pub fn new(source: usize, page: u32) -> Self {
        Self { source, page }
    }
}

/// Everything extracted from one scanned page.
#[derive(Debug, Clone)]
pub struct PageRecord {
    pub source_id: String,
    pub page_ref: PageRef,
    pub raw_text: String,
    pub code: Option<StoreCode>,
    pub quantity: Option<Decimal>,
    pub date: Option<NaiveDate>,
}

impl PageRecord {
    /// Page number within its source (1-based).
    pub fn page(&self) -> u32 {
        self.page_ref.page
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_store_code_normalizes_case() {
        assert_eq!(StoreCode::new(" sg0001 ").as_str(), "SG0001");
        assert_eq!(StoreCode::new("sg0001"), StoreCode::new("SG0001"));
    }

    #[test]
    fn test_roster_entry_display() {
        let plain = RosterEntry::new(StoreCode::new("SG0002"));
        assert_eq!(plain.to_string(), "SG0002");

        let named = plain.with_display_name("Store Two");
        assert_eq!(named.to_string(), "SG0002 - Store Two");
    }
}
