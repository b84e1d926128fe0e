//! In-memory PDFs for tests.

use lopdf::content::{Content, Operation};
use lopdf::encryption::{decrypt_object, get_encryption_key};
use lopdf::{dictionary, Document, Object, ObjectId, Stream, StringFormat};

/// A4 portrait.
pub const A4: (i64, i64) = (595, 842);

/// Build a PDF with one page per entry, each line of text in its own
/// text object so extracted lines stay separate.
pub fn build_pdf(pages: &[&[&str]]) -> Vec<u8> {
    build_pdf_with_size(pages, A4)
}

pub fn build_pdf_with_size(pages: &[&[&str]], size: (i64, i64)) -> Vec<u8> {
    let mut doc = Document::with_version("1.5");
    let pages_id = doc.new_object_id();
    let font_id = doc.add_object(dictionary! {
        "Type" => "Font",
        "Subtype" => "Type1",
        "BaseFont" => "Helvetica",
        "Encoding" => "WinAnsiEncoding",
    });
    let resources_id = doc.add_object(dictionary! {
        "Font" => dictionary! {
            "F1" => font_id,
        },
    });

    let mut kids: Vec<Object> = Vec::new();
    for lines in pages {
        let mut operations = Vec::new();
        for (i, line) in lines.iter().enumerate() {
            let y = size.1 - 60 - 20 * i as i64;
            operations.push(Operation::new("BT", vec![]));
            operations.push(Operation::new("Tf", vec!["F1".into(), 12.into()]));
            operations.push(Operation::new("Td", vec![50.into(), y.into()]));
            operations.push(Operation::new("Tj", vec![Object::string_literal(*line)]));
            operations.push(Operation::new("ET", vec![]));
        }
        let content = Content { operations };
        let content_id = doc.add_object(Stream::new(
            dictionary! {},
            content.encode().unwrap(),
        ));
        let page_id = doc.add_object(dictionary! {
            "Type" => "Page",
            "Parent" => pages_id,
            "Contents" => content_id,
        });
        kids.push(page_id.into());
    }

    // Resources and MediaBox live on the tree root and are inherited.
    let media_box: Vec<Object> = vec![0.into(), 0.into(), size.0.into(), size.1.into()];
    let pages_dict = dictionary! {
        "Type" => "Pages",
        "Kids" => kids.clone(),
        "Count" => kids.len() as i64,
        "Resources" => resources_id,
        "MediaBox" => media_box,
    };
    doc.objects.insert(pages_id, Object::Dictionary(pages_dict));

    let catalog_id = doc.add_object(dictionary! {
        "Type" => "Catalog",
        "Pages" => pages_id,
    });
    doc.trailer.set("Root", catalog_id);

    let mut bytes = Vec::new();
    doc.save_to(&mut bytes).unwrap();
    bytes
}

/// Seal every stream of `bytes` with RC4 under the empty user password.
///
/// `user_hash` becomes the /U entry when given; a value that does not match
/// the empty password leaves the file unreadable.
pub fn encrypt_pdf(bytes: &[u8], user_hash: Option<Vec<u8>>) -> Vec<u8> {
    let mut doc = Document::load_mem(bytes).unwrap();
    let mut encrypt = dictionary! {
        "Filter" => "Standard",
        "V" => 2,
        "R" => 3,
        "Length" => 128,
        "O" => Object::String(vec![0x42u8; 32], StringFormat::Hexadecimal),
        "P" => -4,
        "CF" => dictionary! {
            "StdCF" => dictionary! { "CFM" => "V2", "Length" => 16 },
        },
        "StmF" => "StdCF",
        "StrF" => "StdCF",
    };
    if let Some(hash) = user_hash {
        encrypt.set("U", Object::String(hash, StringFormat::Hexadecimal));
    }
    let encrypt_id = doc.add_object(encrypt);
    doc.trailer.set("Encrypt", encrypt_id);
    let file_id = Object::string_literal(b"pomerge-fixture".to_vec());
    doc.trailer.set("ID", vec![file_id.clone(), file_id]);

    // RC4 is symmetric: the decrypting routine seals plain content
    let key = get_encryption_key(&doc, "", false).unwrap();
    let stream_ids: Vec<ObjectId> = doc
        .objects
        .iter()
        .filter(|(_, obj)| matches!(obj, Object::Stream(_)))
        .map(|(id, _)| *id)
        .collect();
    for id in stream_ids {
        let sealed = decrypt_object(&key, id, doc.get_object(id).unwrap(), false).unwrap();
        if let Ok(Object::Stream(stream)) = doc.get_object_mut(id) {
            stream.set_content(sealed);
        }
    }

    let mut out = Vec::new();
    doc.save_to(&mut out).unwrap();
    out
}

/// Extracted text of every page, in page order.
pub fn page_texts(bytes: &[u8]) -> Vec<String> {
    let doc = Document::load_mem(bytes).unwrap();
    doc.get_pages()
        .keys()
        .map(|n| doc.extract_text(&[*n]).unwrap_or_default())
        .collect()
}
