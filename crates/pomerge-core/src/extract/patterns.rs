//! Common regex patterns for purchase-order extraction.

use lazy_static::lazy_static;
use regex::Regex;

/// A quantity token: digit groups with an optional fractional part.
///
/// Grouping separators are `.`, `,`, apostrophe and the non-breaking spaces.
/// A plain space never groups digits, since extracted text separates table
/// cells with spaces.
pub const QUANTITY_VALUE: &str =
    r"[0-9]{1,3}(?:[.,'\u{00a0}\u{202f}][0-9]{3})+(?:[.,][0-9]+)?|[0-9]+(?:[.,][0-9]+)?";

lazy_static! {
    // DD/MM/YYYY, also tolerating `.` and `-` separators
    pub static ref DATE_DMY: Regex = Regex::new(
        r"\b([0-9]{1,2})[/.\-]([0-9]{1,2})[/.\-]([0-9]{4})\b"
    ).unwrap();
}
