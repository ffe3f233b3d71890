//! crates/pdf_editor_core/src/pipeline.rs
//!
//! The mutation pipeline. Every operation on a session runs while holding that
//! session's lock, and every structural change goes through read-modify-replace:
//! read the current document, build the new one through a port, stage it in the temp
//! directory, rename it over the session's file, then refresh `page_count` from the
//! committed bytes. A failure at any step leaves the file and the record untouched.

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use image::{DynamicImage, ImageFormat};
use std::collections::BTreeMap;
use std::future::Future;
use std::io::Cursor;
use std::sync::Arc;
use tokio::fs;
use tokio::sync::OwnedMutexGuard;
use tracing::{debug, info, warn};

use crate::domain::{
    Annotation, DocumentInfo, ExportedDocument, Placement, PlacedImage, RenderedPage,
    SessionRecord, TextEdit,
};
use crate::error::{EditorError, EditorResult};
use crate::ports::{
    DocumentStore, GlyphPainter, ImageStamp, OverlayCompositor, PortResult, Rasterizer,
};
use crate::preview::paint_annotations;
use crate::registry::SessionRegistry;
use crate::workspace::{timestamp, Workspace};

const UNKNOWN: &str = "Unknown";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum StampKind {
    Image,
    Signature,
}

impl StampKind {
    fn file_prefix(self) -> &'static str {
        match self {
            StampKind::Image => "img",
            StampKind::Signature => "sig",
        }
    }
}

//=========================================================================================
// The Editor
//=========================================================================================

/// Applies edits to registered sessions through the injected ports.
pub struct DocumentEditor {
    registry: Arc<SessionRegistry>,
    store: Arc<dyn DocumentStore>,
    rasterizer: Arc<dyn Rasterizer>,
    compositor: Arc<dyn OverlayCompositor>,
    painter: Arc<dyn GlyphPainter>,
}

impl DocumentEditor {
    pub fn new(
        registry: Arc<SessionRegistry>,
        store: Arc<dyn DocumentStore>,
        rasterizer: Arc<dyn Rasterizer>,
        compositor: Arc<dyn OverlayCompositor>,
        painter: Arc<dyn GlyphPainter>,
    ) -> Self {
        Self {
            registry,
            store,
            rasterizer,
            compositor,
            painter,
        }
    }

    pub fn registry(&self) -> &Arc<SessionRegistry> {
        &self.registry
    }

    fn workspace(&self) -> &Workspace {
        self.registry.workspace()
    }

    /// Looks up a session and takes its lock.
    async fn lock_session(&self, id: &str) -> EditorResult<OwnedMutexGuard<SessionRecord>> {
        let handle = self.registry.get(id).await?;
        let mut session = handle.clone().lock_owned().await;
        if !self.registry.is_registered(id, &handle).await {
            return Err(EditorError::SessionNotFound(id.to_string()));
        }
        session.touch();
        Ok(session)
    }

    /// Read-modify-replace. Returns the committed page count.
    async fn commit<F, Fut>(&self, session: &mut SessionRecord, mutate: F) -> EditorResult<u32>
    where
        F: FnOnce(Vec<u8>) -> Fut,
        Fut: Future<Output = PortResult<Vec<u8>>>,
    {
        let current = fs::read(&session.source_path).await?;
        let updated = mutate(current).await?;
        let page_count = self.store.page_count(&updated).await?;
        self.workspace()
            .replace_atomically(&session.source_path, &updated)
            .await?;
        session.page_count = page_count;
        Ok(page_count)
    }

    //=====================================================================================
    // Structural Mutations
    //=====================================================================================

    pub async fn rotate(&self, id: &str, page: u32, angle: i32) -> EditorResult<()> {
        let mut session = self.lock_session(id).await?;
        session.check_page(page)?;
        self.commit(&mut session, |doc| self.store.rotate_page(doc, page, angle))
            .await?;
        info!(session_id = %id, page, angle, "Rotated page");
        Ok(())
    }

    /// Removes one page and returns the new page count.
    pub async fn delete_page(&self, id: &str, page: u32) -> EditorResult<u32> {
        let mut session = self.lock_session(id).await?;
        session.check_page(page)?;
        let page_count = self
            .commit(&mut session, |doc| self.store.delete_page(doc, page))
            .await?;
        info!(session_id = %id, page, page_count, "Deleted page");
        Ok(page_count)
    }

    /// Burns an uploaded image into a page.
    pub async fn add_image(&self, id: &str, page: u32, image: Vec<u8>, placement: Placement) -> EditorResult<()> {
        let session = self.lock_session(id).await?;
        self.burn_in(session, page, image, placement, StampKind::Image)
            .await
    }

    /// Burns a base64 (or data-URL) signature into a page with a transparent background.
    pub async fn add_signature(&self, id: &str, page: u32, payload: &str, placement: Placement) -> EditorResult<()> {
        let session = self.lock_session(id).await?;
        let image = decode_signature(payload)?;
        self.burn_in(session, page, image, placement, StampKind::Signature)
            .await
    }

    async fn burn_in(
        &self,
        mut session: OwnedMutexGuard<SessionRecord>,
        page: u32,
        image: Vec<u8>,
        placement: Placement,
        kind: StampKind,
    ) -> EditorResult<()> {
        session.check_page(page)?;

        let image_path = self
            .workspace()
            .temp_file(&format!("{}_{}_{}", kind.file_prefix(), session.id, page), "png");
        fs::write(&image_path, &image).await?;

        let alpha_mask = kind == StampKind::Signature;
        let result = self
            .commit(&mut session, |doc| async move {
                let size = self.store.page_size(&doc, page).await?;
                let stamp = ImageStamp {
                    image,
                    rect: placement.to_page_space(size.height),
                    alpha_mask,
                };
                self.compositor.stamp_image(doc, page, stamp).await
            })
            .await;

        if let Err(e) = result {
            let _ = fs::remove_file(&image_path).await;
            warn!(session_id = %session.id, page, "Image burn-in failed: {}", e);
            return Err(e);
        }

        session
            .pending_images
            .entry(page)
            .or_default()
            .push(PlacedImage {
                placement,
                image_path,
                is_signature: alpha_mask,
            });
        info!(session_id = %session.id, page, signature = alpha_mask, "Burned image into page");
        Ok(())
    }

    //=====================================================================================
    // Queued Edits
    //=====================================================================================

    /// Queues a preview annotation. Pages past the end are accepted and never drawn.
    pub async fn add_annotation(&self, id: &str, page: u32, annotation: Annotation) -> EditorResult<()> {
        let mut session = self.lock_session(id).await?;
        check_positive(page, session.page_count)?;
        session.annotations.entry(page).or_default().push(annotation);
        debug!(session_id = %id, page, "Queued annotation");
        Ok(())
    }

    /// Queues a text edit for export. Pages past the end are accepted and ignored.
    pub async fn add_text_edit(&self, id: &str, page: u32, edit: TextEdit) -> EditorResult<()> {
        let mut session = self.lock_session(id).await?;
        check_positive(page, session.page_count)?;
        session.text_edits.entry(page).or_default().push(edit);
        debug!(session_id = %id, page, "Queued text edit");
        Ok(())
    }

    //=====================================================================================
    // Documents Outside a Session
    //=====================================================================================

    /// Concatenates the inputs into a new document, saved as `merged_{timestamp}.pdf`.
    pub async fn merge(&self, documents: Vec<Vec<u8>>) -> EditorResult<ExportedDocument> {
        if documents.len() < 2 {
            return Err(EditorError::InsufficientInputs(documents.len()));
        }
        for (index, document) in documents.iter().enumerate() {
            self.store.page_count(document).await.map_err(|e| {
                EditorError::InvalidDocument(format!("input {}: {}", index + 1, e))
            })?;
        }

        let inputs = documents.len();
        let bytes = self.store.merge(documents).await?;
        let filename = format!("merged_{}.pdf", timestamp());
        self.workspace().write_output(&filename, &bytes).await?;
        info!(inputs, output = %filename, "Merged documents");
        Ok(ExportedDocument { filename, bytes })
    }

    /// Writes one document per `(start, end)` range (1-based, inclusive). Page numbers
    /// outside the document are skipped, so a range may produce an empty document.
    pub async fn split(&self, id: &str, ranges: &[(i64, i64)]) -> EditorResult<Vec<String>> {
        let session = self.lock_session(id).await?;
        let source = fs::read(&session.source_path).await?;
        let page_count = i64::from(session.page_count);
        let stamp = timestamp();

        let mut outputs = Vec::with_capacity(ranges.len());
        for (index, &(start, end)) in ranges.iter().enumerate() {
            let pages: Vec<u32> = (start.max(1)..=end.min(page_count))
                .map(|p| p as u32)
                .collect();
            let bytes = self.store.select_pages(&source, &pages).await?;
            let filename = format!("split_{}_{}.pdf", index + 1, stamp);
            self.workspace().write_output(&filename, &bytes).await?;
            debug!(session_id = %id, range = index + 1, pages = pages.len(), "Wrote split output");
            outputs.push(filename);
        }
        info!(session_id = %id, outputs = outputs.len(), "Split document");
        Ok(outputs)
    }

    //=====================================================================================
    // Reads
    //=====================================================================================

    /// Rasterizes a page and draws its queued annotations over it.
    pub async fn render_page(&self, id: &str, page: u32, dpi: u32) -> EditorResult<RenderedPage> {
        let session = self.lock_session(id).await?;
        session.check_page(page)?;

        let mut bitmap = self
            .rasterizer
            .rasterize(&session.source_path, page, dpi)
            .await?;
        if let Some(annotations) = session.annotations.get(&page) {
            paint_annotations(&mut bitmap, annotations, self.painter.as_ref());
        }
        drop(session);

        let (width, height) = bitmap.dimensions();
        let mut png = Vec::new();
        DynamicImage::ImageRgba8(bitmap)
            .write_to(&mut Cursor::new(&mut png), ImageFormat::Png)
            .map_err(|e| EditorError::OperationFailed(format!("PNG encoding failed: {e}")))?;
        Ok(RenderedPage { png, width, height })
    }

    /// Produces the downloadable document. Queued text edits are written into every
    /// page that has an annotation or a text edit; without queued edits the stored
    /// bytes are returned as they are.
    pub async fn export(&self, id: &str) -> EditorResult<ExportedDocument> {
        let session = self.lock_session(id).await?;
        let current = fs::read(&session.source_path).await?;
        if !session.has_deferred_edits() {
            return Ok(ExportedDocument {
                filename: session.display_name.clone(),
                bytes: current,
            });
        }

        let mut overlays: BTreeMap<u32, Vec<TextEdit>> = session
            .annotations
            .keys()
            .map(|page| (*page, Vec::new()))
            .collect();
        for (page, edits) in &session.text_edits {
            overlays.insert(*page, edits.clone());
        }

        let bytes = self.compositor.stamp_text(current, overlays).await?;
        info!(session_id = %id, "Exported edited document");
        Ok(ExportedDocument {
            filename: format!("edited_{}", session.display_name),
            bytes,
        })
    }

    pub async fn info(&self, id: &str) -> EditorResult<DocumentInfo> {
        let session = self.lock_session(id).await?;
        let current = fs::read(&session.source_path).await?;
        let metadata = match self.store.metadata(&current).await {
            Ok(metadata) => metadata,
            Err(e) => {
                warn!(session_id = %id, "Could not read document metadata: {}", e);
                Default::default()
            }
        };
        let or_unknown = |value: Option<String>| {
            value
                .filter(|v| !v.trim().is_empty())
                .unwrap_or_else(|| UNKNOWN.to_string())
        };

        Ok(DocumentInfo {
            filename: session.display_name.clone(),
            page_count: session.page_count,
            title: or_unknown(metadata.title),
            author: or_unknown(metadata.author),
            creator: or_unknown(metadata.creator),
            file_size: current.len() as u64,
        })
    }

    pub async fn extract_text(&self, id: &str, page: u32) -> EditorResult<String> {
        let session = self.lock_session(id).await?;
        session.check_page(page)?;
        let current = fs::read(&session.source_path).await?;
        Ok(self.store.extract_text(&current, page).await?)
    }
}

fn check_positive(page: u32, page_count: u32) -> EditorResult<()> {
    if page == 0 {
        return Err(EditorError::PageOutOfRange { page, page_count });
    }
    Ok(())
}

/// Accepts raw base64 or a data URL; only the part after the first comma is decoded.
fn decode_signature(payload: &str) -> EditorResult<Vec<u8>> {
    let data = payload
        .split_once(',')
        .map_or(payload, |(_, data)| data)
        .trim();
    if data.is_empty() {
        return Err(EditorError::InvalidSignatureData(
            "No signature data provided".to_string(),
        ));
    }
    let bytes = BASE64
        .decode(data)
        .map_err(|e| EditorError::InvalidSignatureData(e.to_string()))?;
    if bytes.is_empty() {
        return Err(EditorError::InvalidSignatureData(
            "Signature decodes to nothing".to_string(),
        ));
    }
    Ok(bytes)
}
