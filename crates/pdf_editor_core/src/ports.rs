//! crates/pdf_editor_core/src/ports.rs
//!
//! Defines the service contracts (traits) the editor core depends on.
//! These traits form the boundary of the hexagonal architecture, keeping the core
//! independent of any concrete PDF library, rasterizer or font engine.

use async_trait::async_trait;
use image::{Rgba, RgbaImage};
use std::collections::BTreeMap;
use std::path::Path;

use crate::domain::{DocumentMetadata, PageRect, PageSize, TextEdit};

//=========================================================================================
// Generic Port Error and Result Types
//=========================================================================================

/// A generic error type for all port operations.
/// This abstracts away the specific errors from external libraries and processes.
#[derive(Debug, thiserror::Error)]
pub enum PortError {
    /// The input could not be parsed or violates the port's contract.
    #[error("Invalid input: {0}")]
    InvalidInput(String),
    #[error("Item not found: {0}")]
    NotFound(String),
    #[error("An unexpected error occurred: {0}")]
    Unexpected(String),
}

/// A convenience type alias for `Result<T, PortError>`.
pub type PortResult<T> = Result<T, PortError>;

//=========================================================================================
// Port Payloads
//=========================================================================================

/// An encoded image (PNG, JPEG, ...) to be stamped onto a page.
#[derive(Debug, Clone)]
pub struct ImageStamp {
    pub image: Vec<u8>,
    pub rect: PageRect,
    /// Use the image's alpha channel as a soft mask instead of flattening it.
    pub alpha_mask: bool,
}

//=========================================================================================
// Service Ports (Traits)
//=========================================================================================

/// Parsing, page-level restructuring and serialization of documents held in memory.
/// Page numbers are 1-based.
#[async_trait]
pub trait DocumentStore: Send + Sync {
    async fn page_count(&self, document: &[u8]) -> PortResult<u32>;

    async fn page_size(&self, document: &[u8], page: u32) -> PortResult<PageSize>;

    /// Adds `angle` degrees to the page rotation. Other pages pass through unchanged.
    async fn rotate_page(&self, document: Vec<u8>, page: u32, angle: i32) -> PortResult<Vec<u8>>;

    async fn delete_page(&self, document: Vec<u8>, page: u32) -> PortResult<Vec<u8>>;

    /// Builds a new document holding exactly `pages` (ascending, distinct).
    async fn select_pages(&self, document: &[u8], pages: &[u32]) -> PortResult<Vec<u8>>;

    /// Concatenates all pages of all documents in argument order.
    async fn merge(&self, documents: Vec<Vec<u8>>) -> PortResult<Vec<u8>>;

    async fn metadata(&self, document: &[u8]) -> PortResult<DocumentMetadata>;

    async fn extract_text(&self, document: &[u8], page: u32) -> PortResult<String>;
}

/// Renders vector content onto existing pages.
#[async_trait]
pub trait OverlayCompositor: Send + Sync {
    async fn stamp_image(&self, document: Vec<u8>, page: u32, stamp: ImageStamp) -> PortResult<Vec<u8>>;

    /// Writes every page's text edits over its content and re-serializes the whole
    /// document. Pages missing from the document are ignored.
    async fn stamp_text(
        &self,
        document: Vec<u8>,
        overlays: BTreeMap<u32, Vec<TextEdit>>,
    ) -> PortResult<Vec<u8>>;
}

/// Converts one page of a document on disk into a bitmap.
#[async_trait]
pub trait Rasterizer: Send + Sync {
    async fn rasterize(&self, document: &Path, page: u32, dpi: u32) -> PortResult<RgbaImage>;
}

/// Draws text into preview bitmaps.
pub trait GlyphPainter: Send + Sync {
    /// `(x, y)` is the top-left corner of the text line in pixels.
    fn draw_text(&self, canvas: &mut RgbaImage, x: f32, y: f32, text: &str, size: f32, color: Rgba<u8>);
}
