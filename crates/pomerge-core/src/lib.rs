//! Core library for purchase-order PDF reconciliation and merging.
//!
//! This crate provides:
//! - Store-code, quantity and date extraction from page text
//! - Roster loading and reconciliation (missing and extra store codes)
//! - Halved-quantity totals per date, per store and per staff member
//! - A quantity overlay on each page and a single merged PDF

pub mod aggregate;
pub mod error;
pub mod events;
pub mod extract;
pub mod grouping;
pub mod models;
pub mod pdf;
pub mod pipeline;
pub mod reconcile;
pub mod roster;

pub use error::{ConfigError, IntegrityError, PoMergeError, Result, SourceError};
pub use events::{EventReporter, NullReporter, RecordingReporter, RunEvent, TracingReporter};
pub use extract::{QuantityFormat, StoreCodeMatcher};
pub use models::{MergeOrder, PageRecord, PageRef, PoMergeConfig, RosterEntry, StoreCode};
pub use pdf::{DocumentSource, MergedDocument};
pub use pipeline::{MergeReport, PoMerger, RunSummary};
pub use reconcile::ReconciliationResult;
pub use roster::{CodeIndex, RosterFormat};
