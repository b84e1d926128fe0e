//! Rule-based field extractors for purchase-order pages.
//!
//! Every extractor is best-effort: a field that is not on the page is
//! `None`, never an error. When a page carries several candidates the first
//! one in text order wins.

pub mod dates;
pub mod patterns;
pub mod quantity;
pub mod store_code;

pub use dates::{extract_date, format_date, DateExtractor};
pub use quantity::{format_quantity, parse_quantity, QuantityExtractor, QuantityFormat};
pub use store_code::StoreCodeMatcher;

/// Trait for field extractors.
pub trait FieldExtractor {
    /// The type of value this extractor produces.
    type Output;

    /// Extract the first occurrence of the field.
    fn extract(&self, text: &str) -> Option<Self::Output> {
        self.extract_all(text).into_iter().next()
    }

    /// Extract all occurrences of the field, in text order.
    fn extract_all(&self, text: &str) -> Vec<Self::Output>;
}

/// An extracted value with its location in the page text.
#[derive(Debug, Clone, PartialEq)]
pub struct ExtractionMatch<T> {
    /// Extracted value.
    pub value: T,
    /// Byte range in source text.
    pub position: (usize, usize),
    /// Source text that was matched.
    pub source: String,
}

impl<T> ExtractionMatch<T> {
    pub fn new(value: T, start: usize, end: usize, source: impl Into<String>) -> Self {
        Self {
            value,
            position: (start, end),
            source: source.into(),
        }
    }
}
