//! Data models for pomerge.

pub mod config;
pub mod records;

pub use config::{
    AnnotationConfig, ExtractionConfig, MergeConfig, MergeOrder, PoMergeConfig, RosterConfig,
};
pub use records::{PageRecord, PageRef, RosterEntry, StoreCode};
