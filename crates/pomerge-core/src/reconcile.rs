//! Set reconciliation of found store codes against the roster.

use std::collections::HashSet;

use serde::Serialize;

use crate::events::EventReporter;
use crate::models::{PageRecord, RosterEntry, StoreCode};
use crate::roster::CodeIndex;

/// A store code seen on a page, with where it was seen.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FoundCode {
    pub code: StoreCode,
    pub source_id: String,
    pub page: u32,
}

impl FoundCode {
    pub fn new(code: StoreCode, source_id: impl Into<String>, page: u32) -> Self {
        Self {
            code,
            source_id: source_id.into(),
            page,
        }
    }

    /// Codes of the scanned pages, in scan order.
    pub fn from_records(records: &[PageRecord]) -> Vec<FoundCode> {
        records
            .iter()
            .filter_map(|r| {
                r.code
                    .as_ref()
                    .map(|code| FoundCode::new(code.clone(), r.source_id.clone(), r.page()))
            })
            .collect()
    }
}

/// Roster discrepancies of one run.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ReconciliationResult {
    /// Roster entries not found on any page, in roster order.
    pub missing: Vec<RosterEntry>,
    /// Found codes absent from the roster, in first-seen order, tagged with
    /// the page they were first seen on.
    pub extra: Vec<FoundCode>,
}

impl ReconciliationResult {
    pub fn is_clean(&self) -> bool {
        self.missing.is_empty() && self.extra.is_empty()
    }

    /// Report missing codes, then extra codes.
    pub fn emit(&self, reporter: &mut dyn EventReporter) {
        for entry in &self.missing {
            reporter.on_code_missing(entry);
        }
        for extra in &self.extra {
            reporter.on_code_extra(&extra.code, &extra.source_id, extra.page);
        }
    }
}

/// Compare found codes with the roster.
///
/// A roster code found on several pages is neither missing nor extra, and an
/// extra code found several times is reported once.
pub fn reconcile(found: &[FoundCode], index: &CodeIndex) -> ReconciliationResult {
    let found_set: HashSet<&StoreCode> = found.iter().map(|f| &f.code).collect();

    let missing = index
        .entries()
        .filter(|entry| !found_set.contains(&entry.code))
        .cloned()
        .collect();

    let mut seen_extra: HashSet<&StoreCode> = HashSet::new();
    let mut extra = Vec::new();
    for f in found {
        if !index.contains(&f.code) && seen_extra.insert(&f.code) {
            extra.push(f.clone());
        }
    }

    ReconciliationResult { missing, extra }
}
