//! services/api/src/adapters/pdf_objects.rs
//!
//! Low-level `lopdf` helpers shared by the document store and the overlay compositor:
//! loading and saving, inherited page attributes, resource dictionaries and content
//! streams.

use lopdf::{dictionary, Dictionary, Document, Object, ObjectId, Stream};
use pdf_editor_core::domain::PageSize;
use pdf_editor_core::ports::{PortError, PortResult};

/// Page attributes a page may inherit from its ancestors in the page tree.
const INHERITABLE: [&[u8]; 4] = [b"Resources", b"MediaBox", b"CropBox", b"Rotate"];

/// US Letter, used when no MediaBox can be found anywhere in the tree.
const FALLBACK_SIZE: PageSize = PageSize {
    width: 612.0,
    height: 792.0,
};

pub fn load(bytes: &[u8]) -> PortResult<Document> {
    Document::load_mem(bytes).map_err(|e| PortError::InvalidInput(format!("PDF parse failed: {e}")))
}

pub fn save(mut doc: Document) -> PortResult<Vec<u8>> {
    let mut out = Vec::new();
    doc.save_to(&mut out)
        .map_err(|e| PortError::Unexpected(format!("PDF save failed: {e}")))?;
    Ok(out)
}

pub fn page_id(doc: &Document, page: u32) -> PortResult<ObjectId> {
    doc.get_pages()
        .get(&page)
        .copied()
        .ok_or_else(|| PortError::NotFound(format!("page {page}")))
}

/// Looks up `key` on the page, walking up through `Parent` links.
pub fn inherited<'a>(doc: &'a Document, page_id: ObjectId, key: &[u8]) -> Option<&'a Object> {
    let mut current = Some(page_id);
    while let Some(id) = current {
        let dict = doc.get_dictionary(id).ok()?;
        if let Ok(value) = dict.get(key) {
            return Some(resolve(doc, value));
        }
        current = dict.get(b"Parent").and_then(Object::as_reference).ok();
    }
    None
}

pub fn resolve<'a>(doc: &'a Document, object: &'a Object) -> &'a Object {
    match object {
        Object::Reference(id) => doc.get_object(*id).unwrap_or(object),
        other => other,
    }
}

/// Copies inherited attributes onto the page itself so it no longer depends on its
/// current parent. Needed before a page is moved to another page tree.
pub fn materialize_inherited(doc: &mut Document, page_id: ObjectId) -> PortResult<()> {
    let mut missing = Vec::new();
    {
        let page = doc
            .get_dictionary(page_id)
            .map_err(|e| PortError::Unexpected(format!("page object: {e}")))?;
        for key in INHERITABLE {
            if page.has(key) {
                continue;
            }
            if let Some(value) = inherited(doc, page_id, key) {
                missing.push((key.to_vec(), value.clone()));
            }
        }
    }
    let page = doc
        .get_dictionary_mut(page_id)
        .map_err(|e| PortError::Unexpected(format!("page object: {e}")))?;
    for (key, value) in missing {
        page.set(key, value);
    }
    Ok(())
}

pub fn page_size(doc: &Document, page_id: ObjectId) -> PageSize {
    inherited(doc, page_id, b"MediaBox")
        .and_then(|b| b.as_array().ok())
        .filter(|arr| arr.len() == 4)
        .and_then(|arr| {
            let n: Vec<f32> = arr.iter().filter_map(number).collect();
            (n.len() == 4).then(|| PageSize {
                width: (n[2] - n[0]).abs(),
                height: (n[3] - n[1]).abs(),
            })
        })
        .unwrap_or(FALLBACK_SIZE)
}

pub fn number(object: &Object) -> Option<f32> {
    match object {
        Object::Integer(i) => Some(*i as f32),
        Object::Real(f) => Some(*f),
        _ => None,
    }
}

fn owned_dict(doc: &Document, object: &Object) -> Option<Dictionary> {
    resolve(doc, object).as_dict().ok().cloned()
}

/// Registers `target` under `/category/name` in the page's own resource dictionary,
/// copying inherited or referenced resources inline first so existing entries survive.
pub fn add_resource(
    doc: &mut Document,
    page_id: ObjectId,
    category: &[u8],
    name: &str,
    target: ObjectId,
) -> PortResult<()> {
    let mut resources = inherited(doc, page_id, b"Resources")
        .and_then(|r| owned_dict(doc, r))
        .unwrap_or_else(Dictionary::new);
    let mut entries = resources
        .get(category)
        .ok()
        .and_then(|c| owned_dict(doc, c))
        .unwrap_or_else(Dictionary::new);
    entries.set(name, Object::Reference(target));
    resources.set(category.to_vec(), Object::Dictionary(entries));

    doc.get_dictionary_mut(page_id)
        .map_err(|e| PortError::Unexpected(format!("page object: {e}")))?
        .set("Resources", Object::Dictionary(resources));
    Ok(())
}

/// Appends `overlay` after the page's existing content. The existing content is
/// wrapped in `q`/`Q` so whatever graphics state it leaves behind does not leak into
/// the overlay.
pub fn append_overlay(doc: &mut Document, page_id: ObjectId, overlay: Vec<u8>) -> PortResult<()> {
    let existing: Vec<Object> = match doc
        .get_dictionary(page_id)
        .map_err(|e| PortError::Unexpected(format!("page object: {e}")))?
        .get(b"Contents")
    {
        Ok(Object::Reference(id)) => match doc.get_object(*id) {
            Ok(Object::Array(items)) => items.clone(),
            _ => vec![Object::Reference(*id)],
        },
        Ok(Object::Array(items)) => items.clone(),
        _ => Vec::new(),
    };

    let save_state = doc.add_object(Stream::new(dictionary! {}, b"q\n".to_vec()));
    let restore_state = doc.add_object(Stream::new(dictionary! {}, b"\nQ\n".to_vec()));
    let overlay_id = doc.add_object(Stream::new(dictionary! {}, overlay));

    let mut contents = Vec::with_capacity(existing.len() + 3);
    contents.push(Object::Reference(save_state));
    contents.extend(existing);
    contents.push(Object::Reference(restore_state));
    contents.push(Object::Reference(overlay_id));

    doc.get_dictionary_mut(page_id)
        .map_err(|e| PortError::Unexpected(format!("page object: {e}")))?
        .set("Contents", Object::Array(contents));
    Ok(())
}

/// Decodes a PDF text string: UTF-16BE with a byte order mark, otherwise one byte per
/// character.
pub fn decode_text_string(bytes: &[u8]) -> String {
    if let Some(utf16) = bytes.strip_prefix(&[0xFE, 0xFF]) {
        let units: Vec<u16> = utf16
            .chunks_exact(2)
            .map(|pair| u16::from_be_bytes([pair[0], pair[1]]))
            .collect();
        return String::from_utf16_lossy(&units);
    }
    bytes.iter().map(|&b| b as char).collect()
}

/// Runs CPU-bound PDF work off the async executor.
pub async fn blocking<T, F>(work: F) -> PortResult<T>
where
    T: Send + 'static,
    F: FnOnce() -> PortResult<T> + Send + 'static,
{
    tokio::task::spawn_blocking(work)
        .await
        .map_err(|e| PortError::Unexpected(format!("PDF worker failed: {e}")))?
}
