//! Merged output assembly.

use std::collections::HashSet;
use std::io::Write;
use std::path::Path;

use lopdf::{dictionary, Document, Object, ObjectId};
use tracing::{debug, info};

use super::SourceDocument;
use crate::error::IntegrityError;
use crate::models::PageRef;

/// Serialized merged PDF.
#[derive(Debug, Clone)]
pub struct MergedDocument {
    bytes: Vec<u8>,
    page_order: Vec<PageRef>,
}

impl MergedDocument {
    pub fn bytes(&self) -> &[u8] {
        &self.bytes
    }

    pub fn into_bytes(self) -> Vec<u8> {
        self.bytes
    }

    /// Source page behind each output page.
    pub fn page_order(&self) -> &[PageRef] {
        &self.page_order
    }

    pub fn page_count(&self) -> usize {
        self.page_order.len()
    }

    /// Write the document to `path`. The file appears complete or not at
    /// all: bytes go to a temporary file next to it that is then renamed.
    pub fn write_to(&self, path: &Path) -> Result<(), IntegrityError> {
        let dir = match path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent,
            _ => Path::new("."),
        };
        let write_err = |e: std::io::Error| IntegrityError::Write(format!("{}: {}", path.display(), e));

        std::fs::create_dir_all(dir).map_err(write_err)?;
        let mut tmp = tempfile::NamedTempFile::new_in(dir).map_err(write_err)?;
        tmp.write_all(&self.bytes).map_err(write_err)?;
        tmp.flush().map_err(write_err)?;
        tmp.persist(path).map_err(|e| write_err(e.error))?;

        info!("Wrote {} page(s) to {}", self.page_count(), path.display());
        Ok(())
    }
}

/// Combines pages of several sources into one document.
#[derive(Debug, Default, Clone, Copy)]
pub struct MergeAssembler;

impl MergeAssembler {
    pub fn new() -> Self {
        Self
    }

    /// Build one document whose pages are `order`, in that order. A page
    /// listed twice is copied.
    pub fn assemble(
        &self,
        sources: Vec<SourceDocument>,
        order: &[PageRef],
    ) -> Result<MergedDocument, IntegrityError> {
        // Validate before touching anything.
        for page_ref in order {
            let source = sources
                .get(page_ref.source)
                .ok_or(IntegrityError::UnknownSource(page_ref.source))?;
            if source.page_id(page_ref.page).is_none() {
                return Err(IntegrityError::MissingPage {
                    source_id: source.id().to_string(),
                    page: page_ref.page,
                });
            }
        }

        let mut merged = Document::with_version("1.5");
        let mut page_ids: Vec<Vec<(u32, ObjectId)>> = Vec::with_capacity(sources.len());
        let mut next_id = 1;

        for source in sources {
            let (id, mut document, _) = source.into_parts();
            document.renumber_objects_with(next_id);
            next_id = document.max_id + 1;

            // page numbers map to new ids after renumbering
            page_ids.push(document.get_pages().into_iter().collect());

            for (object_id, object) in document.objects {
                if matches!(object.type_name(), Ok(b"Catalog") | Ok(b"Pages")) {
                    continue;
                }
                merged.objects.insert(object_id, object);
            }
            debug!("Collected objects of {}", id);
        }
        merged.max_id = next_id - 1;

        let pages_id = merged.new_object_id();
        let mut kids: Vec<Object> = Vec::with_capacity(order.len());
        let mut used: HashSet<ObjectId> = HashSet::new();

        for page_ref in order {
            let page_id = page_ids[page_ref.source]
                .iter()
                .find(|(n, _)| *n == page_ref.page)
                .map(|(_, id)| *id)
                .ok_or(IntegrityError::UnknownSource(page_ref.source))?;

            let target = if used.insert(page_id) {
                page_id
            } else {
                let copy = merged
                    .get_dictionary(page_id)
                    .map_err(|_| IntegrityError::UnknownSource(page_ref.source))?
                    .clone();
                merged.add_object(copy)
            };

            if let Ok(page) = merged.get_dictionary_mut(target) {
                page.set("Parent", pages_id);
            }
            kids.push(Object::Reference(target));
        }

        let count = kids.len();
        merged.objects.insert(
            pages_id,
            Object::Dictionary(dictionary! {
                "Type" => "Pages",
                "Kids" => kids,
                "Count" => count as i64,
            }),
        );
        let catalog_id = merged.add_object(dictionary! {
            "Type" => "Catalog",
            "Pages" => pages_id,
        });
        merged.trailer.set("Root", catalog_id);

        merged.prune_objects();
        merged.renumber_objects();
        merged.compress();

        let mut bytes = Vec::new();
        merged
            .save_to(&mut bytes)
            .map_err(|e| IntegrityError::Write(e.to_string()))?;

        debug!("Assembled {} page(s)", count);
        Ok(MergedDocument {
            bytes,
            page_order: order.to_vec(),
        })
    }
}
