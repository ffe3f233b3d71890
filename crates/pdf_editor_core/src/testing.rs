//! In-memory port implementations for unit tests.
//!
//! A fake document is UTF-8 text: a `FAKEPDF` header line followed by one
//! `content|rotation` line per page. Overlays append markers to a page's content.

use async_trait::async_trait;
use image::{Rgba, RgbaImage};
use std::collections::BTreeMap;
use std::path::Path;
use std::sync::Mutex;

use crate::domain::{DocumentMetadata, PageSize, TextEdit};
use crate::ports::{
    DocumentStore, GlyphPainter, ImageStamp, OverlayCompositor, PortError, PortResult, Rasterizer,
};

const HEADER: &str = "FAKEPDF";

#[derive(Debug, Clone, PartialEq)]
pub struct FakePage {
    pub content: String,
    pub rotation: i32,
}

pub fn fake_document(pages: &[&str]) -> Vec<u8> {
    encode(
        &pages
            .iter()
            .map(|c| FakePage {
                content: c.to_string(),
                rotation: 0,
            })
            .collect::<Vec<_>>(),
    )
}

pub fn decode(bytes: &[u8]) -> PortResult<Vec<FakePage>> {
    let text = std::str::from_utf8(bytes).map_err(|e| PortError::InvalidInput(e.to_string()))?;
    let mut lines = text.lines();
    if lines.next() != Some(HEADER) {
        return Err(PortError::InvalidInput("missing header".into()));
    }
    lines
        .map(|line| {
            let (content, rotation) = line
                .rsplit_once('|')
                .ok_or_else(|| PortError::InvalidInput(format!("bad page line '{line}'")))?;
            Ok(FakePage {
                content: content.to_string(),
                rotation: rotation
                    .parse()
                    .map_err(|_| PortError::InvalidInput("bad rotation".into()))?,
            })
        })
        .collect()
}

pub fn encode(pages: &[FakePage]) -> Vec<u8> {
    let mut out = String::from(HEADER);
    out.push('\n');
    for page in pages {
        out.push_str(&format!("{}|{}\n", page.content, page.rotation));
    }
    out.into_bytes()
}

fn page_index(pages: &[FakePage], page: u32) -> PortResult<usize> {
    let index = page as usize;
    if index == 0 || index > pages.len() {
        return Err(PortError::NotFound(format!("page {page}")));
    }
    Ok(index - 1)
}

pub struct FakeStore;

#[async_trait]
impl DocumentStore for FakeStore {
    async fn page_count(&self, document: &[u8]) -> PortResult<u32> {
        Ok(decode(document)?.len() as u32)
    }

    async fn page_size(&self, document: &[u8], page: u32) -> PortResult<PageSize> {
        page_index(&decode(document)?, page)?;
        Ok(PageSize {
            width: 612.0,
            height: 792.0,
        })
    }

    async fn rotate_page(&self, document: Vec<u8>, page: u32, angle: i32) -> PortResult<Vec<u8>> {
        let mut pages = decode(&document)?;
        let index = page_index(&pages, page)?;
        pages[index].rotation = (pages[index].rotation + angle).rem_euclid(360);
        Ok(encode(&pages))
    }

    async fn delete_page(&self, document: Vec<u8>, page: u32) -> PortResult<Vec<u8>> {
        let mut pages = decode(&document)?;
        let index = page_index(&pages, page)?;
        pages.remove(index);
        Ok(encode(&pages))
    }

    async fn select_pages(&self, document: &[u8], pages: &[u32]) -> PortResult<Vec<u8>> {
        let all = decode(document)?;
        let mut selected = Vec::new();
        for page in pages {
            selected.push(all[page_index(&all, *page)?].clone());
        }
        Ok(encode(&selected))
    }

    async fn merge(&self, documents: Vec<Vec<u8>>) -> PortResult<Vec<u8>> {
        let mut pages = Vec::new();
        for document in &documents {
            pages.extend(decode(document)?);
        }
        Ok(encode(&pages))
    }

    async fn metadata(&self, _document: &[u8]) -> PortResult<DocumentMetadata> {
        Ok(DocumentMetadata {
            title: Some("Fake".into()),
            author: None,
            creator: None,
        })
    }

    async fn extract_text(&self, document: &[u8], page: u32) -> PortResult<String> {
        let pages = decode(document)?;
        Ok(pages[page_index(&pages, page)?].content.clone())
    }
}

pub struct FakeCompositor;

#[async_trait]
impl OverlayCompositor for FakeCompositor {
    async fn stamp_image(&self, document: Vec<u8>, page: u32, stamp: ImageStamp) -> PortResult<Vec<u8>> {
        if stamp.image.is_empty() {
            return Err(PortError::InvalidInput("empty image".into()));
        }
        let mut pages = decode(&document)?;
        let index = page_index(&pages, page)?;
        let r = stamp.rect;
        pages[index].content.push_str(&format!(
            "+img({},{},{},{},{})",
            r.x, r.y, r.width, r.height, stamp.alpha_mask
        ));
        Ok(encode(&pages))
    }

    async fn stamp_text(
        &self,
        document: Vec<u8>,
        overlays: BTreeMap<u32, Vec<TextEdit>>,
    ) -> PortResult<Vec<u8>> {
        let mut pages = decode(&document)?;
        for (page, edits) in overlays {
            let Ok(index) = page_index(&pages, page) else {
                continue;
            };
            for edit in edits {
                pages[index].content.push_str(&format!("+text({})", edit.text));
            }
        }
        Ok(encode(&pages))
    }
}

/// Produces a white bitmap. Fails when the file is not a fake document.
pub struct FakeRasterizer;

#[async_trait]
impl Rasterizer for FakeRasterizer {
    async fn rasterize(&self, document: &Path, page: u32, dpi: u32) -> PortResult<RgbaImage> {
        let bytes = tokio::fs::read(document)
            .await
            .map_err(|e| PortError::Unexpected(e.to_string()))?;
        page_index(&decode(&bytes)?, page)?;
        let side = dpi / 10;
        Ok(RgbaImage::from_pixel(side, side, Rgba([255, 255, 255, 255])))
    }
}

/// Records every text draw request.
#[derive(Default)]
pub struct RecordingPainter {
    pub drawn: Mutex<Vec<String>>,
}

impl GlyphPainter for RecordingPainter {
    fn draw_text(&self, _canvas: &mut RgbaImage, _x: f32, _y: f32, text: &str, _size: f32, _color: Rgba<u8>) {
        self.drawn
            .lock()
            .expect("painter mutex poisoned")
            .push(text.to_string());
    }
}
