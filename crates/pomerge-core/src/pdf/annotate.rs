//! Quantity overlay written at the bottom-right corner of a page.
//!
//! The overlay is appended as a separate content stream. The page's own
//! content is wrapped in `q`/`Q` first so a graphics state it leaves behind
//! (a transform, a clip) cannot move or hide the overlay. Existing operators
//! are never rewritten.

use lopdf::content::{Content, Operation};
use lopdf::{dictionary, Dictionary, Document, Object, ObjectId, Stream};
use tracing::trace;

use super::number;
use crate::models::AnnotationConfig;

/// Preferred resource name of the overlay font.
const FONT_RESOURCE: &str = "PoQty";

/// Writes overlay text onto pages.
#[derive(Debug, Clone)]
pub struct PageAnnotator {
    config: AnnotationConfig,
}

impl PageAnnotator {
    pub fn new(config: AnnotationConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &AnnotationConfig {
        &self.config
    }

    /// Add the overlay font to a document. One font object serves every page
    /// of that document.
    pub fn register_font(&self, doc: &mut Document) -> ObjectId {
        doc.add_object(dictionary! {
            "Type" => "Font",
            "Subtype" => "Type1",
            "BaseFont" => Object::Name(self.config.font.as_bytes().to_vec()),
            "Encoding" => "WinAnsiEncoding",
        })
    }

    /// Draw `text` right-aligned near the bottom-right corner of the page.
    pub fn annotate(
        &self,
        doc: &mut Document,
        page_id: ObjectId,
        font_id: ObjectId,
        text: &str,
    ) -> Result<(), String> {
        let [llx, lly, urx, ury] = page_box(doc, page_id)?;
        let (width, height) = (urx - llx, ury - lly);

        let font_name = ensure_font_resource(doc, page_id, font_id)?;

        let font_size = if self.config.reference_height > 0.0 {
            self.config.font_size * height / self.config.reference_height
        } else {
            self.config.font_size
        };
        let text_width = text_width(text, font_size);
        let x = (llx + width - width * self.config.right_margin_ratio - text_width).max(llx);
        let y = lly + height * self.config.bottom_margin_ratio;
        trace!(
            "Overlay {:?} at ({:.1}, {:.1}) size {:.1} on {:?}",
            text, x, y, font_size, page_id
        );

        let [r, g, b] = self.config.color;
        let overlay = Content {
            operations: vec![
                // closes the q that opens the page content
                Operation::new("Q", vec![]),
                Operation::new("q", vec![]),
                Operation::new("BT", vec![]),
                Operation::new("Tf", vec![Object::Name(font_name), font_size.into()]),
                Operation::new("rg", vec![r.into(), g.into(), b.into()]),
                Operation::new("Td", vec![x.into(), y.into()]),
                Operation::new("Tj", vec![Object::string_literal(text)]),
                Operation::new("ET", vec![]),
                Operation::new("Q", vec![]),
            ],
        };
        // Streams are concatenated as-is, so start on a fresh line.
        let mut overlay_bytes = b"\n".to_vec();
        overlay_bytes.extend(overlay.encode().map_err(|e| e.to_string())?);

        let existing = existing_contents(doc, page_id)?;
        let open_id = doc.add_object(Stream::new(dictionary! {}, b"q\n".to_vec()));
        let overlay_id = doc.add_object(Stream::new(dictionary! {}, overlay_bytes));

        let mut contents = Vec::with_capacity(existing.len() + 2);
        contents.push(Object::Reference(open_id));
        contents.extend(existing);
        contents.push(Object::Reference(overlay_id));

        doc.get_dictionary_mut(page_id)
            .map_err(|e| e.to_string())?
            .set("Contents", contents);

        Ok(())
    }
}

/// The page's content stream references, flattened.
fn existing_contents(doc: &Document, page_id: ObjectId) -> Result<Vec<Object>, String> {
    let page = doc.get_dictionary(page_id).map_err(|e| e.to_string())?;
    match page.get(b"Contents") {
        Ok(Object::Reference(id)) => match doc.get_object(*id) {
            Ok(Object::Array(items)) => Ok(items.clone()),
            _ => Ok(vec![Object::Reference(*id)]),
        },
        Ok(Object::Array(items)) => Ok(items.clone()),
        Ok(_) => Err("page Contents is neither a stream nor an array".to_string()),
        Err(_) => Ok(Vec::new()),
    }
}

/// Visible page box as `[llx, lly, urx, ury]`: CropBox when present,
/// MediaBox otherwise.
fn page_box(doc: &Document, page_id: ObjectId) -> Result<[f32; 4], String> {
    let page = doc.get_dictionary(page_id).map_err(|e| e.to_string())?;
    let rect = page
        .get(b"CropBox")
        .or_else(|_| page.get(b"MediaBox"))
        .map_err(|_| "page has no MediaBox".to_string())?;
    let (_, rect) = doc.dereference(rect).map_err(|e| e.to_string())?;
    let values = rect.as_array().map_err(|e| e.to_string())?;

    let mut corners = [0.0f32; 4];
    if values.len() != 4 {
        return Err(format!("page box has {} values", values.len()));
    }
    for (slot, value) in corners.iter_mut().zip(values) {
        let (_, value) = doc.dereference(value).map_err(|e| e.to_string())?;
        *slot = number(value).ok_or_else(|| "page box value is not a number".to_string())?;
    }

    let [x0, y0, x1, y1] = corners;
    Ok([x0.min(x1), y0.min(y1), x0.max(x1), y0.max(y1)])
}

/// Approximate rendered width using Helvetica-Bold advance widths.
fn text_width(text: &str, font_size: f32) -> f32 {
    let units: u32 = text
        .chars()
        .map(|c| match c {
            '.' | ',' => 278,
            '-' => 333,
            ' ' => 278,
            _ => 556,
        })
        .sum();
    units as f32 * font_size / 1000.0
}

/// Make the font available in the page's resources and return the name it
/// is registered under.
fn ensure_font_resource(
    doc: &mut Document,
    page_id: ObjectId,
    font_id: ObjectId,
) -> Result<Vec<u8>, String> {
    let resources_ref = {
        let page = doc.get_dictionary_mut(page_id).map_err(|e| e.to_string())?;
        match page.get(b"Resources") {
            Ok(Object::Reference(id)) => Some(*id),
            Ok(Object::Dictionary(_)) => None,
            _ => {
                page.set("Resources", Dictionary::new());
                None
            }
        }
    };

    let fonts_ref = match resources(doc, page_id, resources_ref)?.get(b"Font") {
        Ok(Object::Reference(id)) => Some(*id),
        _ => None,
    };

    let name = {
        let fonts = match fonts_ref {
            Some(id) => doc.get_dictionary(id).ok(),
            None => resources(doc, page_id, resources_ref)?
                .get(b"Font")
                .and_then(Object::as_dict)
                .ok(),
        };
        pick_font_name(fonts, font_id)
    };

    let fonts = match fonts_ref {
        Some(id) => doc.get_dictionary_mut(id).map_err(|e| e.to_string())?,
        None => {
            let res = resources_mut(doc, page_id, resources_ref)?;
            if !matches!(res.get(b"Font"), Ok(Object::Dictionary(_))) {
                res.set("Font", Dictionary::new());
            }
            res.get_mut(b"Font")
                .and_then(Object::as_dict_mut)
                .map_err(|e| e.to_string())?
        }
    };
    fonts.set(name.clone(), Object::Reference(font_id));

    Ok(name)
}

fn pick_font_name(fonts: Option<&Dictionary>, font_id: ObjectId) -> Vec<u8> {
    let Some(fonts) = fonts else {
        return FONT_RESOURCE.as_bytes().to_vec();
    };

    let mut suffix = 0;
    loop {
        let candidate = if suffix == 0 {
            FONT_RESOURCE.to_string()
        } else {
            format!("{}{}", FONT_RESOURCE, suffix)
        };
        match fonts.get(candidate.as_bytes()) {
            Ok(Object::Reference(id)) if *id == font_id => return candidate.into_bytes(),
            Ok(_) => suffix += 1,
            Err(_) => return candidate.into_bytes(),
        }
    }
}

fn resources(
    doc: &Document,
    page_id: ObjectId,
    resources_ref: Option<ObjectId>,
) -> Result<&Dictionary, String> {
    match resources_ref {
        Some(id) => doc.get_dictionary(id),
        None => doc
            .get_dictionary(page_id)
            .and_then(|page| page.get(b"Resources"))
            .and_then(Object::as_dict),
    }
    .map_err(|e| e.to_string())
}

fn resources_mut(
    doc: &mut Document,
    page_id: ObjectId,
    resources_ref: Option<ObjectId>,
) -> Result<&mut Dictionary, String> {
    match resources_ref {
        Some(id) => doc.get_dictionary_mut(id),
        None => doc
            .get_dictionary_mut(page_id)
            .and_then(|page| page.get_mut(b"Resources"))
            .and_then(Object::as_dict_mut),
    }
    .map_err(|e| e.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pdf::fixtures::{build_pdf, build_pdf_with_size};
    use crate::pdf::SourceDocument;

    fn annotate_first_page(data: &[u8], text: &str) -> Vec<u8> {
        let mut source = SourceDocument::from_bytes("a.pdf", data).unwrap();
        let page_id = source.page_id(1).unwrap();
        let annotator = PageAnnotator::new(AnnotationConfig::default());

        let doc = source.document_mut();
        let font_id = annotator.register_font(doc);
        annotator.annotate(doc, page_id, font_id, text).unwrap();

        let mut bytes = Vec::new();
        doc.save_to(&mut bytes).unwrap();
        bytes
    }

    #[test]
    fn test_overlay_text_is_extractable_alongside_original() {
        let data = build_pdf(&[&["SG0001", "Qty: 15"]]);
        let annotated = annotate_first_page(&data, "7.5");

        let doc = Document::load_mem(&annotated).unwrap();
        let text = doc.extract_text(&[1]).unwrap();
        assert!(text.contains("SG0001"));
        assert!(text.contains("Qty: 15"));
        assert!(text.contains("7.5"));
    }

    #[test]
    fn test_original_content_is_wrapped_not_rewritten() {
        let data = build_pdf(&[&["SG0001"]]);
        let before = SourceDocument::from_bytes("a.pdf", &data).unwrap();
        let page_id = before.page_id(1).unwrap();
        let original = before.document().get_page_content(page_id).unwrap();

        let annotated = annotate_first_page(&data, "10");
        let after = SourceDocument::from_bytes("a.pdf", &annotated).unwrap();
        let page_id = after.page_id(1).unwrap();
        let page = after.document().get_dictionary(page_id).unwrap();
        let contents = page.get(b"Contents").unwrap().as_array().unwrap();

        assert_eq!(contents.len(), 3);
        let middle = after
            .document()
            .get_object(contents[1].as_reference().unwrap())
            .unwrap()
            .as_stream()
            .unwrap();
        assert_eq!(middle.content, original);
    }

    #[test]
    fn test_existing_font_name_is_not_clobbered() {
        let mut doc = Document::with_version("1.5");
        let other = doc.add_object(dictionary! { "Type" => "Font" });
        let ours = doc.add_object(dictionary! { "Type" => "Font" });
        let fonts = dictionary! { "PoQty" => other };

        assert_eq!(pick_font_name(Some(&fonts), ours), b"PoQty1".to_vec());
        assert_eq!(pick_font_name(Some(&fonts), other), b"PoQty".to_vec());
        assert_eq!(pick_font_name(None, ours), b"PoQty".to_vec());
    }

    #[test]
    fn test_position_scales_with_page() {
        let data = build_pdf_with_size(&[&["SG0001"]], (300, 421));
        let mut source = SourceDocument::from_bytes("a.pdf", &data).unwrap();
        let page_id = source.page_id(1).unwrap();

        assert_eq!(page_box(source.document(), page_id).unwrap(), [0.0, 0.0, 300.0, 421.0]);

        let annotator = PageAnnotator::new(AnnotationConfig::default());
        let doc = source.document_mut();
        let font_id = annotator.register_font(doc);
        annotator.annotate(doc, page_id, font_id, "5").unwrap();

        let page = doc.get_dictionary(page_id).unwrap();
        let contents = page.get(b"Contents").unwrap().as_array().unwrap();
        let overlay_id = contents.last().unwrap().as_reference().unwrap();
        let overlay = doc.get_object(overlay_id).unwrap().as_stream().unwrap();
        let ops = Content::decode(&overlay.content).unwrap().operations;

        let tf = ops.iter().find(|op| op.operator == "Tf").unwrap();
        // half the reference height, half the font size
        assert_eq!(number(&tf.operands[1]), Some(10.0));

        let td = ops.iter().find(|op| op.operator == "Td").unwrap();
        let x = number(&td.operands[0]).unwrap();
        let y = number(&td.operands[1]).unwrap();
        assert!((x - (300.0 - 6.0 - 5.56)).abs() < 0.01);
        assert!((y - 421.0 * 0.012).abs() < 0.01);
    }

    #[test]
    fn test_text_width() {
        assert!((text_width("10", 10.0) - 11.12).abs() < 0.001);
        assert!((text_width("7.5", 10.0) - 13.9).abs() < 0.001);
    }
}
