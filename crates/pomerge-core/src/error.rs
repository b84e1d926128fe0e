//! Error types for the pomerge-core library.

use thiserror::Error;

/// Main error type for the pomerge library.
#[derive(Error, Debug)]
pub enum PoMergeError {
    /// Invalid configuration or roster; raised before any page is processed.
    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),

    /// A source document could not be read (strict mode only).
    #[error("source error: {0}")]
    Source(#[from] SourceError),

    /// Assembly or annotation referenced something that no longer exists.
    #[error("integrity error: {0}")]
    Integrity(#[from] IntegrityError),

    /// The caller asked the run to stop.
    #[error("run cancelled before source {0}")]
    Cancelled(String),

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Errors in run configuration and roster structure.
#[derive(Error, Debug)]
pub enum ConfigError {
    /// The store-code pattern is not a valid regular expression.
    #[error("invalid store code pattern `{pattern}`: {reason}")]
    InvalidPattern { pattern: String, reason: String },

    /// No usable quantity label was configured.
    #[error("invalid quantity labels: {0}")]
    InvalidLabels(String),

    /// A roster row has a different column count than the first row.
    #[error("roster line {line}: expected {expected} column(s), found {found}")]
    MixedColumns {
        line: u64,
        expected: usize,
        found: usize,
    },

    /// The first roster row has an unsupported column count.
    #[error("roster line {line}: unsupported column count {found}")]
    UnsupportedColumns { line: u64, found: usize },

    /// A roster code does not match the store-code pattern.
    #[error("roster line {line}: `{code}` is not a valid store code")]
    InvalidCode { line: u64, code: String },

    /// The roster could not be parsed.
    #[error("failed to read roster: {0}")]
    Roster(String),

    /// The configuration file could not be parsed.
    #[error("failed to read configuration: {0}")]
    File(String),
}

/// Errors reading one input document.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum SourceError {
    /// The document bytes could not be read.
    #[error("{source_id}: failed to read: {reason}")]
    Read { source_id: String, reason: String },

    /// The document could not be parsed as a PDF.
    #[error("{source_id}: failed to parse PDF: {reason}")]
    Parse { source_id: String, reason: String },

    /// The PDF is encrypted with a non-empty password.
    #[error("{source_id}: PDF is encrypted")]
    Encrypted { source_id: String },

    /// The PDF has no pages.
    #[error("{source_id}: PDF has no pages")]
    NoPages { source_id: String },
}

impl SourceError {
    /// Id of the source the error belongs to.
    pub fn source_id(&self) -> &str {
        match self {
            SourceError::Read { source_id, .. }
            | SourceError::Parse { source_id, .. }
            | SourceError::Encrypted { source_id }
            | SourceError::NoPages { source_id } => source_id,
        }
    }
}

/// Errors that invalidate the merged output.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum IntegrityError {
    /// A page reference points at a source that was not loaded.
    #[error("unknown source index {0}")]
    UnknownSource(usize),

    /// A page reference points at a page the source does not have.
    #[error("{source_id}: page {page} does not exist")]
    MissingPage { source_id: String, page: u32 },

    /// The overlay could not be written onto a page.
    #[error("{source_id}: cannot annotate page {page}: {reason}")]
    Annotation {
        source_id: String,
        page: u32,
        reason: String,
    },

    /// The merged document could not be serialized.
    #[error("failed to write merged document: {0}")]
    Write(String),
}

/// Result type for the pomerge library.
pub type Result<T> = std::result::Result<T, PoMergeError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_source_error_carries_id() {
        let err = SourceError::NoPages {
            source_id: "a.pdf".to_string(),
        };
        assert_eq!(err.source_id(), "a.pdf");
        assert_eq!(err.to_string(), "a.pdf: PDF has no pages");
    }

    #[test]
    fn test_config_error_wraps_into_top_level() {
        let err: PoMergeError = ConfigError::MixedColumns {
            line: 3,
            expected: 1,
            found: 2,
        }
        .into();
        assert_eq!(
            err.to_string(),
            "configuration error: roster line 3: expected 1 column(s), found 2"
        );
    }
}
