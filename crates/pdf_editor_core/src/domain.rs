//! crates/pdf_editor_core/src/domain.rs
//!
//! Defines the pure, core data structures for the editor.
//! These structs are independent of any PDF library, HTTP layer or wire format.

use chrono::{DateTime, Utc};
use std::collections::BTreeMap;
use std::path::PathBuf;
use std::str::FromStr;

use crate::error::{EditorError, EditorResult};

//=========================================================================================
// Annotations and Overlays
//=========================================================================================

/// The two kinds of preview annotation a client can queue.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AnnotationKind {
    Highlight,
    Text,
}

impl FromStr for AnnotationKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "highlight" => Ok(Self::Highlight),
            "text" => Ok(Self::Text),
            other => Err(format!("unknown annotation type '{other}'")),
        }
    }
}

/// A preview annotation. Coordinates are rendered-image pixels, origin top-left.
#[derive(Debug, Clone, PartialEq)]
pub struct Annotation {
    pub kind: AnnotationKind,
    pub x: f32,
    pub y: f32,
    pub width: f32,
    pub height: f32,
    pub text: String,
    pub color: String,
    pub font_size: f32,
}

/// A text run written into the document at export. Coordinates are page space
/// (points, origin bottom-left).
#[derive(Debug, Clone, PartialEq)]
pub struct TextEdit {
    pub x: f32,
    pub y: f32,
    pub text: String,
    pub font_size: f32,
    pub color: String,
}

/// A box as the client sees the page: origin top-left, units are points.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Placement {
    pub x: f32,
    pub y: f32,
    pub width: f32,
    pub height: f32,
}

/// A box in PDF page space: origin bottom-left.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PageRect {
    pub x: f32,
    pub y: f32,
    pub width: f32,
    pub height: f32,
}

impl Placement {
    /// Flips the vertical axis so the box can be handed to the overlay compositor.
    pub fn to_page_space(&self, page_height: f32) -> PageRect {
        PageRect {
            x: self.x,
            y: page_height - self.y - self.height,
            width: self.width,
            height: self.height,
        }
    }
}

/// An image already burned into the document, kept for bookkeeping.
#[derive(Debug, Clone, PartialEq)]
pub struct PlacedImage {
    pub placement: Placement,
    pub image_path: PathBuf,
    pub is_signature: bool,
}

/// Width and height of a page in points.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PageSize {
    pub width: f32,
    pub height: f32,
}

//=========================================================================================
// Sessions
//=========================================================================================

/// One document actively being edited.
#[derive(Debug, Clone)]
pub struct SessionRecord {
    pub id: String,
    pub source_path: PathBuf,
    pub display_name: String,
    pub page_count: u32,
    pub annotations: BTreeMap<u32, Vec<Annotation>>,
    pub text_edits: BTreeMap<u32, Vec<TextEdit>>,
    pub pending_images: BTreeMap<u32, Vec<PlacedImage>>,
    pub created_at: DateTime<Utc>,
    pub last_accessed_at: DateTime<Utc>,
}

impl SessionRecord {
    pub fn new(id: String, source_path: PathBuf, display_name: String, page_count: u32) -> Self {
        let now = Utc::now();
        Self {
            id,
            source_path,
            display_name,
            page_count,
            annotations: BTreeMap::new(),
            text_edits: BTreeMap::new(),
            pending_images: BTreeMap::new(),
            created_at: now,
            last_accessed_at: now,
        }
    }

    /// Fails unless `page` addresses an existing page.
    pub fn check_page(&self, page: u32) -> EditorResult<()> {
        if page < 1 || page > self.page_count {
            return Err(EditorError::PageOutOfRange {
                page,
                page_count: self.page_count,
            });
        }
        Ok(())
    }

    /// True when annotations or text edits are waiting to be materialized at export.
    pub fn has_deferred_edits(&self) -> bool {
        !self.annotations.is_empty() || !self.text_edits.is_empty()
    }

    pub fn touch(&mut self) {
        self.last_accessed_at = Utc::now();
    }
}

//=========================================================================================
// Operation Results
//=========================================================================================

/// Metadata fields read from the document information dictionary.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DocumentMetadata {
    pub title: Option<String>,
    pub author: Option<String>,
    pub creator: Option<String>,
}

/// Summary returned by the info operation. Missing metadata reads as "Unknown".
#[derive(Debug, Clone, PartialEq)]
pub struct DocumentInfo {
    pub filename: String,
    pub page_count: u32,
    pub title: String,
    pub author: String,
    pub creator: String,
    pub file_size: u64,
}

/// A PNG preview of one page.
#[derive(Debug, Clone)]
pub struct RenderedPage {
    pub png: Vec<u8>,
    pub width: u32,
    pub height: u32,
}

/// A finished document ready for download.
#[derive(Debug, Clone)]
pub struct ExportedDocument {
    pub filename: String,
    pub bytes: Vec<u8>,
}

//=========================================================================================
// Colors
//=========================================================================================

/// Parses a CSS-like color name or hex string. Unknown values fall back to black.
pub fn parse_color(value: &str) -> [u8; 3] {
    let value = value.trim().to_ascii_lowercase();
    if let Some(hex) = value.strip_prefix('#') {
        return parse_hex(hex).unwrap_or([0, 0, 0]);
    }
    match value.as_str() {
        "white" => [255, 255, 255],
        "red" => [255, 0, 0],
        "green" => [0, 128, 0],
        "blue" => [0, 0, 255],
        "yellow" => [255, 255, 0],
        "orange" => [255, 165, 0],
        "purple" => [128, 0, 128],
        "gray" | "grey" => [128, 128, 128],
        "cyan" => [0, 255, 255],
        "magenta" => [255, 0, 255],
        _ => [0, 0, 0],
    }
}

fn parse_hex(hex: &str) -> Option<[u8; 3]> {
    let channel = |s: &str| u8::from_str_radix(s, 16).ok();
    match hex.len() {
        3 => {
            let mut out = [0u8; 3];
            for (i, c) in hex.chars().enumerate() {
                let v = channel(&c.to_string())?;
                out[i] = v * 17;
            }
            Some(out)
        }
        6 => Some([
            channel(hex.get(0..2)?)?,
            channel(hex.get(2..4)?)?,
            channel(hex.get(4..6)?)?,
        ]),
        _ => None,
    }
}
