//! Run events and the reporter capability the pipeline calls.
//!
//! The pipeline calls the reporter synchronously, in a fixed order: page
//! scan events while scanning, then missing codes (roster order), extra
//! codes (first-seen order), date totals (ascending date), store totals and
//! staff totals.

use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::Serialize;
use tracing::{debug, info, warn};

use crate::error::SourceError;
use crate::extract::{format_date, QuantityFormat};
use crate::models::{RosterEntry, StoreCode};

/// Receives run events.
pub trait EventReporter {
    /// A found code that is not in the roster.
    fn on_code_extra(&mut self, code: &StoreCode, source_id: &str, page: u32);

    /// A roster code that was not found on any page.
    fn on_code_missing(&mut self, entry: &RosterEntry);

    /// Accumulated halved quantity for one date.
    fn on_date_total(&mut self, date: NaiveDate, total: Decimal);

    /// A page carried a store code.
    fn on_code_matched(&mut self, _code: &StoreCode, _source_id: &str, _page: u32) {}

    /// A source was skipped in lenient mode.
    fn on_source_skipped(&mut self, _error: &SourceError) {}

    /// Pages before the first detected code, and the code they were given to.
    fn on_leading_pages(&mut self, _count: usize, _assigned_to: Option<&StoreCode>) {}

    /// Accumulated halved quantity for one store.
    fn on_store_total(&mut self, _code: &StoreCode, _total: Decimal) {}

    /// Accumulated halved quantity for one staff member.
    fn on_staff_total(&mut self, _staff: &str, _total: Decimal, _codes: &[StoreCode]) {}

    /// Pages scanned so far.
    fn on_progress(&mut self, _done: usize, _total: usize) {}
}

/// Reporter that drops every event.
#[derive(Debug, Default, Clone, Copy)]
pub struct NullReporter;

impl EventReporter for NullReporter {
    fn on_code_extra(&mut self, _code: &StoreCode, _source_id: &str, _page: u32) {}
    fn on_code_missing(&mut self, _entry: &RosterEntry) {}
    fn on_date_total(&mut self, _date: NaiveDate, _total: Decimal) {}
}

/// A recorded run event.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum RunEvent {
    CodeMatched {
        code: StoreCode,
        source_id: String,
        page: u32,
    },
    CodeExtra {
        code: StoreCode,
        source_id: String,
        page: u32,
    },
    CodeMissing {
        entry: RosterEntry,
    },
    DateTotal {
        date: NaiveDate,
        total: Decimal,
    },
    SourceSkipped {
        source_id: String,
        reason: String,
    },
    LeadingPages {
        count: usize,
        assigned_to: Option<StoreCode>,
    },
    StoreTotal {
        code: StoreCode,
        total: Decimal,
    },
    StaffTotal {
        staff: String,
        total: Decimal,
        codes: Vec<StoreCode>,
    },
}

/// Collects events in call order. Progress ticks are not recorded.
#[derive(Debug, Default, Clone)]
pub struct RecordingReporter {
    pub events: Vec<RunEvent>,
}

impl RecordingReporter {
    pub fn new() -> Self {
        Self::default()
    }
}

impl EventReporter for RecordingReporter {
    fn on_code_extra(&mut self, code: &StoreCode, source_id: &str, page: u32) {
        self.events.push(RunEvent::CodeExtra {
            code: code.clone(),
            source_id: source_id.to_string(),
            page,
        });
    }

    fn on_code_missing(&mut self, entry: &RosterEntry) {
        self.events.push(RunEvent::CodeMissing {
            entry: entry.clone(),
        });
    }

    fn on_date_total(&mut self, date: NaiveDate, total: Decimal) {
        self.events.push(RunEvent::DateTotal { date, total });
    }

    fn on_code_matched(&mut self, code: &StoreCode, source_id: &str, page: u32) {
        self.events.push(RunEvent::CodeMatched {
            code: code.clone(),
            source_id: source_id.to_string(),
            page,
        });
    }

    fn on_source_skipped(&mut self, error: &SourceError) {
        self.events.push(RunEvent::SourceSkipped {
            source_id: error.source_id().to_string(),
            reason: error.to_string(),
        });
    }

    fn on_leading_pages(&mut self, count: usize, assigned_to: Option<&StoreCode>) {
        self.events.push(RunEvent::LeadingPages {
            count,
            assigned_to: assigned_to.cloned(),
        });
    }

    fn on_store_total(&mut self, code: &StoreCode, total: Decimal) {
        self.events.push(RunEvent::StoreTotal {
            code: code.clone(),
            total,
        });
    }

    fn on_staff_total(&mut self, staff: &str, total: Decimal, codes: &[StoreCode]) {
        self.events.push(RunEvent::StaffTotal {
            staff: staff.to_string(),
            total,
            codes: codes.to_vec(),
        });
    }
}

/// `Missing store code: SG0002 - Store Two`
pub fn missing_message(entry: &RosterEntry) -> String {
    format!("Missing store code: {}", entry)
}

/// `Store code not in roster: SG0003 (a.pdf, page 2)`
pub fn extra_message(code: &StoreCode, source_id: &str, page: u32) -> String {
    format!("Store code not in roster: {} ({}, page {})", code, source_id, page)
}

/// `Total quantity for date 01/06/2024: 30`
pub fn date_total_message(date: NaiveDate, total: &str) -> String {
    format!("Total quantity for date {}: {}", format_date(date), total)
}

/// Renders events as `tracing` records.
#[derive(Debug, Clone, Default)]
pub struct TracingReporter {
    format: QuantityFormat,
}

impl TracingReporter {
    pub fn new(format: QuantityFormat) -> Self {
        Self { format }
    }
}

impl EventReporter for TracingReporter {
    fn on_code_extra(&mut self, code: &StoreCode, source_id: &str, page: u32) {
        warn!("{}", extra_message(code, source_id, page));
    }

    fn on_code_missing(&mut self, entry: &RosterEntry) {
        warn!("{}", missing_message(entry));
    }

    fn on_date_total(&mut self, date: NaiveDate, total: Decimal) {
        info!("{}", date_total_message(date, &self.format.format(total)));
    }

    fn on_code_matched(&mut self, code: &StoreCode, source_id: &str, page: u32) {
        debug!("Store code {} on {} page {}", code, source_id, page);
    }

    fn on_source_skipped(&mut self, error: &SourceError) {
        warn!("Skipping source: {}", error);
    }

    fn on_leading_pages(&mut self, count: usize, assigned_to: Option<&StoreCode>) {
        match assigned_to {
            Some(code) => warn!(
                "{} page(s) before the first detected code, attached to {}",
                count, code
            ),
            None => warn!("No store code found in any input; {} page(s) ungrouped", count),
        }
    }

    fn on_store_total(&mut self, code: &StoreCode, total: Decimal) {
        info!("{}: {}", code, self.format.format(total));
    }

    fn on_staff_total(&mut self, staff: &str, total: Decimal, codes: &[StoreCode]) {
        let codes: Vec<&str> = codes.iter().map(|c| c.as_str()).collect();
        info!(
            "Staff {}: {} ({} store(s): {})",
            staff,
            self.format.format(total),
            codes.len(),
            codes.join(", ")
        );
    }
}
