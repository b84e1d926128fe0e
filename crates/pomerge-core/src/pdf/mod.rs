//! PDF processing module: loading sources, writing the quantity overlay and
//! assembling the merged output. Built on lopdf.

mod annotate;
mod assemble;
mod source;

#[cfg(test)]
pub(crate) mod fixtures;

pub use annotate::PageAnnotator;
pub use assemble::{MergeAssembler, MergedDocument};
pub use source::{DocumentSource, SourceDocument};

use lopdf::Object;

/// Numeric value of a PDF integer or real.
pub(crate) fn number(obj: &Object) -> Option<f32> {
    match obj {
        Object::Integer(i) => Some(*i as f32),
        Object::Real(r) => Some(*r as f32),
        _ => None,
    }
}
