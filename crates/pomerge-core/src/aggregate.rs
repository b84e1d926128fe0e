//! Quantity aggregation: halved per-page quantities summed per date,
//! per store and per staff member.
//!
//! All arithmetic is exact decimal; rounding happens only when a caller
//! formats a value for display.

use std::collections::{BTreeMap, HashMap};

use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::Serialize;
use tracing::{debug, warn};

use crate::events::EventReporter;
use crate::grouping::PageGroups;
use crate::models::{PageRef, StoreCode};
use crate::roster::{CodeIndex, RosterFormat};

/// Staff name used for stores the roster assigns to nobody.
pub const UNKNOWN_STAFF: &str = "Unknown Staff";

/// A page's contribution: its quantity divided by two.
pub fn halve(quantity: Decimal) -> Decimal {
    quantity / Decimal::TWO
}

/// Running per-date totals of halved quantities.
#[derive(Debug, Clone, Default)]
pub struct QuantityAggregator {
    totals: BTreeMap<NaiveDate, Decimal>,
}

impl QuantityAggregator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add one page. Returns the page's contribution, or `None` when the
    /// page is left out of the total: a negative quantity (totals never
    /// decrease) or one that would overflow the running total.
    pub fn add(&mut self, date: NaiveDate, quantity: Decimal) -> Option<Decimal> {
        if quantity.is_sign_negative() && !quantity.is_zero() {
            debug!("Ignoring negative quantity {} for {}", quantity, date);
            return None;
        }
        let contribution = halve(quantity);
        let total = self.totals.entry(date).or_insert(Decimal::ZERO);
        match total.checked_add(contribution) {
            Some(sum) => {
                *total = sum;
                Some(contribution)
            }
            None => {
                warn!(
                    "Quantity {} for {} overflows the date total; page not counted",
                    quantity, date
                );
                None
            }
        }
    }

    /// Totals in ascending date order.
    pub fn totals(&self) -> &BTreeMap<NaiveDate, Decimal> {
        &self.totals
    }

    pub fn total(&self, date: NaiveDate) -> Option<Decimal> {
        self.totals.get(&date).copied()
    }

    /// Report one total per date, ascending.
    pub fn emit(&self, reporter: &mut dyn EventReporter) {
        for (date, total) in &self.totals {
            reporter.on_date_total(*date, *total);
        }
    }
}

/// Halved quantity total of one store.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StoreTotal {
    pub code: StoreCode,
    pub total: Decimal,
}

/// Halved quantity total of one staff member.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StaffTotal {
    pub staff: String,
    pub total: Decimal,
    /// Contributing store codes, sorted.
    pub codes: Vec<StoreCode>,
}

/// Sum halved page quantities per store group.
///
/// Stores with a zero total are left out. Roster stores come first in roster
/// order, extra stores follow in first-seen order.
pub fn store_totals(
    groups: &PageGroups,
    halved: &HashMap<PageRef, Decimal>,
    index: &CodeIndex,
) -> Vec<StoreTotal> {
    let sum = |code: &StoreCode, pages: &[PageRef]| -> Decimal {
        pages
            .iter()
            .filter_map(|p| halved.get(p).map(|value| (p, *value)))
            .fold(Decimal::ZERO, |acc, (page, value)| {
                acc.checked_add(value).unwrap_or_else(|| {
                    warn!("{} total overflows at page {:?}; page not counted", code, page);
                    acc
                })
            })
    };

    let mut totals = Vec::new();
    for entry in index.entries() {
        if let Some(pages) = groups.pages_for(&entry.code) {
            totals.push(StoreTotal {
                code: entry.code.clone(),
                total: sum(&entry.code, pages),
            });
        }
    }
    for (code, pages) in groups.iter() {
        if !index.contains(code) {
            totals.push(StoreTotal {
                code: code.clone(),
                total: sum(code, pages),
            });
        }
    }

    totals.retain(|t| t.total > Decimal::ZERO);
    totals
}

/// Roll store totals up per staff member, in ascending staff-name order.
///
/// Only three-column rosters carry staff; other rosters yield nothing.
pub fn staff_totals(stores: &[StoreTotal], index: &CodeIndex) -> Vec<StaffTotal> {
    if index.format() != RosterFormat::CodeNameStaff {
        return Vec::new();
    }

    let mut by_staff: BTreeMap<&str, (Decimal, Vec<StoreCode>)> = BTreeMap::new();
    for store in stores {
        let staff = index.staff(&store.code).unwrap_or(UNKNOWN_STAFF);
        let (total, codes) = by_staff.entry(staff).or_insert((Decimal::ZERO, Vec::new()));
        match total.checked_add(store.total) {
            Some(sum) => *total = sum,
            None => warn!("{} total overflows at {}; store not counted", staff, store.code),
        }
        codes.push(store.code.clone());
    }

    by_staff
        .into_iter()
        .map(|(staff, (total, mut codes))| {
            codes.sort();
            StaffTotal {
                staff: staff.to_string(),
                total,
                codes,
            }
        })
        .collect()
}
