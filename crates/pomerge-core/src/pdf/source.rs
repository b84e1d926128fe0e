//! Input documents and per-page text access.

use std::collections::BTreeMap;
use std::path::PathBuf;

use lopdf::{Document, Object, ObjectId};
use tracing::{debug, trace};

use crate::error::SourceError;

/// Page attributes a page may inherit from its ancestors in the page tree.
const INHERITABLE: [&[u8]; 4] = [b"Resources", b"MediaBox", b"CropBox", b"Rotate"];

/// Where an input document comes from.
#[derive(Debug, Clone)]
pub enum DocumentSource {
    /// In-memory bytes with a caller-chosen id.
    Bytes { id: String, data: Vec<u8> },
    /// A file, read when the run loads it.
    Path(PathBuf),
}

impl DocumentSource {
    pub fn from_bytes(id: impl Into<String>, data: Vec<u8>) -> Self {
        DocumentSource::Bytes {
            id: id.into(),
            data,
        }
    }

    pub fn from_path(path: impl Into<PathBuf>) -> Self {
        DocumentSource::Path(path.into())
    }

    /// Identifier used in events and errors.
    pub fn id(&self) -> String {
        match self {
            DocumentSource::Bytes { id, .. } => id.clone(),
            DocumentSource::Path(path) => path.display().to_string(),
        }
    }
}

/// A loaded, readable source document.
#[derive(Debug)]
pub struct SourceDocument {
    id: String,
    document: Document,
    pages: BTreeMap<u32, ObjectId>,
}

impl SourceDocument {
    /// Read and parse a source.
    pub fn load(source: &DocumentSource) -> Result<Self, SourceError> {
        match source {
            DocumentSource::Bytes { id, data } => Self::from_bytes(id.clone(), data),
            DocumentSource::Path(path) => {
                let id = path.display().to_string();
                let data = std::fs::read(path).map_err(|e| SourceError::Read {
                    source_id: id.clone(),
                    reason: e.to_string(),
                })?;
                Self::from_bytes(id, &data)
            }
        }
    }

    /// Parse PDF bytes.
    pub fn from_bytes(id: impl Into<String>, data: &[u8]) -> Result<Self, SourceError> {
        let id = id.into();
        let mut document = Document::load_mem(data).map_err(|e| SourceError::Parse {
            source_id: id.clone(),
            reason: e.to_string(),
        })?;

        // Handle PDFs with empty password encryption
        if document.is_encrypted() {
            if document.decrypt("").is_err() {
                return Err(SourceError::Encrypted { source_id: id });
            }
            debug!("Decrypted {} with empty password", id);
        }

        let pages = document.get_pages();
        if pages.is_empty() {
            return Err(SourceError::NoPages { source_id: id });
        }

        for page_id in pages.values() {
            materialize_inherited(&mut document, *page_id);
        }

        debug!("Loaded {} with {} pages", id, pages.len());
        Ok(Self { id, document, pages })
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn page_count(&self) -> u32 {
        self.pages.len() as u32
    }

    /// Page numbers (1-based), ascending.
    pub fn page_numbers(&self) -> impl Iterator<Item = u32> + '_ {
        self.pages.keys().copied()
    }

    pub fn page_id(&self, page: u32) -> Option<ObjectId> {
        self.pages.get(&page).copied()
    }

    /// Extractable text of one page; empty when the page has none or its
    /// text cannot be decoded.
    pub fn page_text(&self, page: u32) -> String {
        match self.document.extract_text(&[page]) {
            Ok(text) => text,
            Err(e) => {
                debug!("No text on {} page {}: {}", self.id, page, e);
                String::new()
            }
        }
    }

    pub fn document(&self) -> &Document {
        &self.document
    }

    pub fn document_mut(&mut self) -> &mut Document {
        &mut self.document
    }

    pub(crate) fn into_parts(self) -> (String, Document, BTreeMap<u32, ObjectId>) {
        (self.id, self.document, self.pages)
    }
}

/// Copy inherited attributes onto the page so it stands alone once detached
/// from its page tree.
fn materialize_inherited(doc: &mut Document, page_id: ObjectId) {
    let mut inherited: Vec<(&[u8], Object)> = Vec::new();

    if let Ok(page) = doc.get_dictionary(page_id) {
        for key in INHERITABLE {
            if page.has(key) {
                continue;
            }
            if let Some(value) = find_inherited(doc, page.get(b"Parent").ok(), key) {
                inherited.push((key, value));
            }
        }
    }

    if inherited.is_empty() {
        return;
    }
    if let Ok(page) = doc.get_dictionary_mut(page_id) {
        for (key, value) in inherited {
            trace!("Page {:?} inherits {}", page_id, String::from_utf8_lossy(key));
            page.set(key, value);
        }
    }
}

fn find_inherited(doc: &Document, parent: Option<&Object>, key: &[u8]) -> Option<Object> {
    let mut parent = parent.and_then(|p| p.as_reference().ok());
    // Page trees are shallow; the bound only guards against Parent cycles.
    for _ in 0..64 {
        let node = doc.get_dictionary(parent?).ok()?;
        if let Ok(value) = node.get(key) {
            return Some(value.clone());
        }
        parent = node.get(b"Parent").and_then(Object::as_reference).ok();
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pdf::fixtures::{build_pdf, encrypt_pdf};

    #[test]
    fn test_load_reads_pages_and_text() {
        let data = build_pdf(&[&["SG0001", "Qty: 10"], &["continued"]]);
        let source = SourceDocument::from_bytes("a.pdf", &data).unwrap();

        assert_eq!(source.id(), "a.pdf");
        assert_eq!(source.page_count(), 2);
        assert_eq!(source.page_numbers().collect::<Vec<_>>(), vec![1, 2]);
        assert!(source.page_text(1).contains("SG0001"));
        assert!(source.page_text(2).contains("continued"));
    }

    #[test]
    fn test_inherited_attributes_are_materialized() {
        let data = build_pdf(&[&["SG0001"]]);
        let source = SourceDocument::from_bytes("a.pdf", &data).unwrap();
        let page_id = source.page_id(1).unwrap();
        let page = source.document().get_dictionary(page_id).unwrap();

        // fixtures put Resources and MediaBox on the page tree root only
        assert!(page.has(b"Resources"));
        assert!(page.has(b"MediaBox"));
    }

    #[test]
    fn test_empty_password_encryption_is_removed() {
        let data = encrypt_pdf(&build_pdf(&[&["SG0001", "Qty: 10"]]), None);
        assert!(Document::load_mem(&data).unwrap().is_encrypted());

        let source = SourceDocument::from_bytes("locked.pdf", &data).unwrap();

        assert!(!source.document().is_encrypted());
        assert!(source.page_text(1).contains("SG0001"));
    }

    #[test]
    fn test_password_protected_is_encrypted_error() {
        let data = encrypt_pdf(&build_pdf(&[&["SG0001"]]), Some(vec![0u8; 32]));

        let err = SourceDocument::from_bytes("locked.pdf", &data).unwrap_err();
        assert!(matches!(err, SourceError::Encrypted { .. }));
    }

    #[test]
    fn test_garbage_is_parse_error() {
        let err = SourceDocument::from_bytes("junk.pdf", b"not a pdf").unwrap_err();
        assert!(matches!(err, SourceError::Parse { .. }));
        assert_eq!(err.source_id(), "junk.pdf");
    }

    #[test]
    fn test_missing_file_is_read_error() {
        let source = DocumentSource::from_path("/nonexistent/po.pdf");
        let err = SourceDocument::load(&source).unwrap_err();
        assert!(matches!(err, SourceError::Read { .. }));
    }
}
