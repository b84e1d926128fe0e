//! Date extraction for purchase-order pages.

use chrono::NaiveDate;

use super::patterns::DATE_DMY;
use super::{ExtractionMatch, FieldExtractor};

/// Finds `DD/MM/YYYY`-shaped calendar dates.
#[derive(Debug, Clone, Copy)]
pub struct DateExtractor;

impl DateExtractor {
    pub fn new() -> Self {
        Self
    }
}

impl Default for DateExtractor {
    fn default() -> Self {
        Self::new()
    }
}

impl FieldExtractor for DateExtractor {
    type Output = ExtractionMatch<NaiveDate>;

    fn extract_all(&self, text: &str) -> Vec<Self::Output> {
        let mut results = Vec::new();

        for caps in DATE_DMY.captures_iter(text) {
            let day: u32 = caps[1].parse().unwrap_or(0);
            let month: u32 = caps[2].parse().unwrap_or(0);
            let year: i32 = caps[3].parse().unwrap_or(0);

            // 31/02/2024 and friends are not dates; skip them
            if let Some(date) = NaiveDate::from_ymd_opt(year, month, day) {
                if let Some(full_match) = caps.get(0) {
                    results.push(ExtractionMatch::new(
                        date,
                        full_match.start(),
                        full_match.end(),
                        full_match.as_str(),
                    ));
                }
            }
        }

        results
    }
}

/// First valid date on the page.
pub fn extract_date(text: &str) -> Option<NaiveDate> {
    DateExtractor::new().extract(text).map(|m| m.value)
}

/// Render a date as `DD/MM/YYYY`.
pub fn format_date(date: NaiveDate) -> String {
    date.format("%d/%m/%Y").to_string()
}
