//! services/api/src/adapters/lopdf_store.rs
//!
//! This module contains the document store adapter built on `lopdf`.
//! It implements the `DocumentStore` port from the `core` crate.

use async_trait::async_trait;
use lopdf::{Document, Object, ObjectId};
use pdf_editor_core::domain::{DocumentMetadata, PageSize};
use pdf_editor_core::ports::{DocumentStore, PortError, PortResult};

use super::pdf_objects::{
    blocking, decode_text_string, inherited, load, materialize_inherited, page_id, page_size, resolve, save,
};

//=========================================================================================
// The Main Adapter Struct
//=========================================================================================

/// A document store that keeps nothing between calls: every operation parses the
/// bytes it is given and serializes a fresh document.
#[derive(Clone, Default)]
pub struct LopdfDocumentStore;

impl LopdfDocumentStore {
    pub fn new() -> Self {
        Self
    }
}

//=========================================================================================
// Document Operations
//=========================================================================================

fn rotate(mut doc: Document, page: u32, angle: i32) -> PortResult<Document> {
    if angle % 90 != 0 {
        return Err(PortError::InvalidInput(format!(
            "rotation angle must be a multiple of 90, got {angle}"
        )));
    }
    let id = page_id(&doc, page)?;
    let current = inherited(&doc, id, b"Rotate")
        .and_then(|r| r.as_i64().ok())
        .unwrap_or(0);
    let rotation = (current + i64::from(angle)).rem_euclid(360);
    doc.get_dictionary_mut(id)
        .map_err(|e| PortError::Unexpected(format!("page object: {e}")))?
        .set("Rotate", rotation);
    Ok(doc)
}

fn delete(mut doc: Document, page: u32) -> PortResult<Document> {
    page_id(&doc, page)?;
    doc.delete_pages(&[page]);
    doc.prune_objects();
    Ok(doc)
}

/// Keeps the listed pages (ascending, distinct) and drops the rest.
fn keep_only(mut doc: Document, pages: &[u32]) -> Document {
    let total = doc.get_pages().len() as u32;
    let drop: Vec<u32> = (1..=total).filter(|p| !pages.contains(p)).collect();
    if !drop.is_empty() {
        doc.delete_pages(&drop);
        doc.prune_objects();
    }
    doc
}

/// Appends every page of `secondary` to the root page tree of `primary`.
fn append_document(mut primary: Document, mut secondary: Document) -> PortResult<Document> {
    secondary.renumber_objects_with(primary.max_id + 1);
    let secondary_pages: Vec<ObjectId> = secondary.page_iter().collect();
    for id in &secondary_pages {
        materialize_inherited(&mut secondary, *id)?;
    }

    primary.max_id = primary.max_id.max(secondary.max_id);
    primary.objects.extend(secondary.objects);

    let pages_root = pages_root(&primary)?;
    {
        let root = primary
            .get_dictionary_mut(pages_root)
            .map_err(|e| PortError::Unexpected(format!("page tree root: {e}")))?;
        let mut kids = root
            .get(b"Kids")
            .and_then(Object::as_array)
            .cloned()
            .unwrap_or_default();
        kids.extend(secondary_pages.iter().map(|id| Object::Reference(*id)));
        let count = root.get(b"Count").and_then(Object::as_i64).unwrap_or(0);
        root.set("Kids", Object::Array(kids));
        root.set("Count", count + secondary_pages.len() as i64);
    }
    for id in secondary_pages {
        if let Ok(page) = primary.get_dictionary_mut(id) {
            page.set("Parent", Object::Reference(pages_root));
        }
    }
    Ok(primary)
}

fn pages_root(doc: &Document) -> PortResult<ObjectId> {
    let catalog = doc
        .trailer
        .get(b"Root")
        .and_then(Object::as_reference)
        .and_then(|id| doc.get_dictionary(id))
        .map_err(|e| PortError::InvalidInput(format!("document catalog: {e}")))?;
    catalog
        .get(b"Pages")
        .and_then(Object::as_reference)
        .map_err(|e| PortError::InvalidInput(format!("page tree root: {e}")))
}

fn metadata(doc: &Document) -> DocumentMetadata {
    let Some(info) = doc
        .trailer
        .get(b"Info")
        .ok()
        .map(|i| resolve(doc, i))
        .and_then(|i| i.as_dict().ok())
    else {
        return DocumentMetadata::default();
    };
    let field = |key: &[u8]| match info.get(key).map(|v| resolve(doc, v)) {
        Ok(Object::String(bytes, _)) => Some(decode_text_string(bytes)),
        _ => None,
    };
    DocumentMetadata {
        title: field(b"Title"),
        author: field(b"Author"),
        creator: field(b"Creator"),
    }
}

//=========================================================================================
// `DocumentStore` Trait Implementation
//=========================================================================================

#[async_trait]
impl DocumentStore for LopdfDocumentStore {
    async fn page_count(&self, document: &[u8]) -> PortResult<u32> {
        let document = document.to_vec();
        blocking(move || Ok(load(&document)?.get_pages().len() as u32)).await
    }

    async fn page_size(&self, document: &[u8], page: u32) -> PortResult<PageSize> {
        let document = document.to_vec();
        blocking(move || {
            let doc = load(&document)?;
            let id = page_id(&doc, page)?;
            Ok(page_size(&doc, id))
        })
        .await
    }

    async fn rotate_page(&self, document: Vec<u8>, page: u32, angle: i32) -> PortResult<Vec<u8>> {
        blocking(move || save(rotate(load(&document)?, page, angle)?)).await
    }

    async fn delete_page(&self, document: Vec<u8>, page: u32) -> PortResult<Vec<u8>> {
        blocking(move || save(delete(load(&document)?, page)?)).await
    }

    async fn select_pages(&self, document: &[u8], pages: &[u32]) -> PortResult<Vec<u8>> {
        let document = document.to_vec();
        let pages = pages.to_vec();
        blocking(move || save(keep_only(load(&document)?, &pages))).await
    }

    async fn merge(&self, documents: Vec<Vec<u8>>) -> PortResult<Vec<u8>> {
        blocking(move || {
            let mut parsed = documents.iter().map(|d| load(d));
            let first = parsed
                .next()
                .ok_or_else(|| PortError::InvalidInput("nothing to merge".to_string()))??;
            let mut merged = parsed.try_fold(first, |acc, next| append_document(acc, next?))?;
            merged.prune_objects();
            save(merged)
        })
        .await
    }

    async fn metadata(&self, document: &[u8]) -> PortResult<DocumentMetadata> {
        let document = document.to_vec();
        blocking(move || Ok(metadata(&load(&document)?))).await
    }

    async fn extract_text(&self, document: &[u8], page: u32) -> PortResult<String> {
        let document = document.to_vec();
        blocking(move || {
            let doc = load(&document)?;
            page_id(&doc, page)?;
            doc.extract_text(&[page])
                .map_err(|e| PortError::Unexpected(format!("text extraction failed: {e}")))
        })
        .await
    }
}
