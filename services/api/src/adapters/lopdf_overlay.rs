//! services/api/src/adapters/lopdf_overlay.rs
//!
//! This module contains the overlay compositor adapter built on `lopdf` and `image`.
//! It implements the `OverlayCompositor` port from the `core` crate.
//!
//! Overlays are appended to a page as extra content streams after the original
//! content, which is the vector equivalent of merging a transparent page-sized canvas
//! on top of the page.

use async_trait::async_trait;
use image::RgbaImage;
use lopdf::content::{Content, Operation};
use lopdf::{dictionary, Document, Object, ObjectId, Stream, StringFormat};
use pdf_editor_core::domain::{parse_color, PageRect, TextEdit};
use pdf_editor_core::ports::{ImageStamp, OverlayCompositor, PortError, PortResult};
use std::collections::BTreeMap;
use tracing::debug;

use super::pdf_objects::{add_resource, append_overlay, blocking, load, page_id, save};

const FONT_RESOURCE: &str = "FEdit";

//=========================================================================================
// The Main Adapter Struct
//=========================================================================================

#[derive(Clone, Default)]
pub struct LopdfOverlayCompositor;

impl LopdfOverlayCompositor {
    pub fn new() -> Self {
        Self
    }
}

//=========================================================================================
// Images
//=========================================================================================

/// Splits an RGBA bitmap into an RGB sample buffer and, when requested, a separate
/// alpha channel. Without a mask, transparency is flattened onto white.
fn split_channels(bitmap: &RgbaImage, keep_alpha: bool) -> (Vec<u8>, Option<Vec<u8>>) {
    let pixels = bitmap.pixels().len();
    let mut rgb = Vec::with_capacity(pixels * 3);
    let mut alpha = keep_alpha.then(|| Vec::with_capacity(pixels));
    for pixel in bitmap.pixels() {
        let [r, g, b, a] = pixel.0;
        match alpha.as_mut() {
            Some(mask) => {
                rgb.extend([r, g, b]);
                mask.push(a);
            }
            None => {
                let a = a as u32;
                let over_white = |c: u8| ((c as u32 * a + 255 * (255 - a) + 127) / 255) as u8;
                rgb.extend([over_white(r), over_white(g), over_white(b)]);
            }
        }
    }
    (rgb, alpha)
}

/// Scales the image to fit inside `rect` without distortion, centred in the box.
fn fit_preserving_aspect(rect: PageRect, image_width: u32, image_height: u32) -> PageRect {
    let scale = (rect.width / image_width as f32).min(rect.height / image_height as f32);
    let width = image_width as f32 * scale;
    let height = image_height as f32 * scale;
    PageRect {
        x: rect.x + (rect.width - width) / 2.0,
        y: rect.y + (rect.height - height) / 2.0,
        width,
        height,
    }
}

fn image_stream(dict: lopdf::Dictionary, samples: Vec<u8>) -> Stream {
    let mut stream = Stream::new(dict, samples);
    // An uncompressed stream is still valid, so a failed compression is not fatal.
    if let Err(e) = stream.compress() {
        debug!("Leaving image stream uncompressed: {}", e);
    }
    stream
}

fn stamp_image(mut doc: Document, page: u32, stamp: ImageStamp) -> PortResult<Document> {
    let page_id = page_id(&doc, page)?;
    let bitmap = image::load_from_memory(&stamp.image)
        .map_err(|e| PortError::InvalidInput(format!("unreadable image: {e}")))?
        .to_rgba8();
    let (width, height) = bitmap.dimensions();
    if width == 0 || height == 0 {
        return Err(PortError::InvalidInput("image has no pixels".to_string()));
    }

    let (rgb, alpha) = split_channels(&bitmap, stamp.alpha_mask);
    let mut image_dict = dictionary! {
        "Type" => "XObject",
        "Subtype" => "Image",
        "Width" => width as i64,
        "Height" => height as i64,
        "ColorSpace" => "DeviceRGB",
        "BitsPerComponent" => 8,
    };
    if let Some(alpha) = alpha {
        let smask = doc.add_object(image_stream(
            dictionary! {
                "Type" => "XObject",
                "Subtype" => "Image",
                "Width" => width as i64,
                "Height" => height as i64,
                "ColorSpace" => "DeviceGray",
                "BitsPerComponent" => 8,
            },
            alpha,
        ));
        image_dict.set("SMask", Object::Reference(smask));
    }
    let image_id = doc.add_object(image_stream(image_dict, rgb));
    let name = format!("ImStamp{}", image_id.0);
    add_resource(&mut doc, page_id, b"XObject", &name, image_id)?;

    let target = fit_preserving_aspect(stamp.rect, width, height);
    let content = Content {
        operations: vec![
            Operation::new("q", vec![]),
            Operation::new(
                "cm",
                vec![
                    target.width.into(),
                    0.into(),
                    0.into(),
                    target.height.into(),
                    target.x.into(),
                    target.y.into(),
                ],
            ),
            Operation::new("Do", vec![Object::Name(name.into_bytes())]),
            Operation::new("Q", vec![]),
        ],
    };
    append_overlay(&mut doc, page_id, encode(content)?)?;
    Ok(doc)
}

//=========================================================================================
// Text
//=========================================================================================

/// Helvetica with WinAnsiEncoding covers Latin-1; anything else is replaced.
fn win_ansi(text: &str) -> Vec<u8> {
    text.chars()
        .map(|c| u8::try_from(u32::from(c)).unwrap_or(b'?'))
        .collect()
}

fn text_operations(edit: &TextEdit) -> Vec<Operation> {
    let [r, g, b] = parse_color(&edit.color);
    let channel = |c: u8| Object::Real(c as f32 / 255.0);
    vec![
        Operation::new("BT", vec![]),
        Operation::new("rg", vec![channel(r), channel(g), channel(b)]),
        Operation::new(
            "Tf",
            vec![Object::Name(FONT_RESOURCE.into()), edit.font_size.into()],
        ),
        Operation::new("Td", vec![edit.x.into(), edit.y.into()]),
        Operation::new(
            "Tj",
            vec![Object::String(win_ansi(&edit.text), StringFormat::Literal)],
        ),
        Operation::new("ET", vec![]),
    ]
}

fn stamp_text(mut doc: Document, overlays: BTreeMap<u32, Vec<TextEdit>>) -> PortResult<Document> {
    let pages = doc.get_pages();
    let mut font: Option<ObjectId> = None;
    for (page, edits) in overlays {
        let Some(&page_id) = pages.get(&page) else {
            debug!(page, "Skipping overlay for a page that does not exist");
            continue;
        };
        if edits.is_empty() {
            continue;
        }
        let font_id = *font.get_or_insert_with(|| {
            doc.add_object(dictionary! {
                "Type" => "Font",
                "Subtype" => "Type1",
                "BaseFont" => "Helvetica",
                "Encoding" => "WinAnsiEncoding",
            })
        });
        add_resource(&mut doc, page_id, b"Font", FONT_RESOURCE, font_id)?;

        let operations = edits.iter().flat_map(text_operations).collect();
        append_overlay(&mut doc, page_id, encode(Content { operations })?)?;
    }
    Ok(doc)
}

fn encode(content: Content) -> PortResult<Vec<u8>> {
    content
        .encode()
        .map_err(|e| PortError::Unexpected(format!("content stream encoding failed: {e}")))
}

//=========================================================================================
// `OverlayCompositor` Trait Implementation
//=========================================================================================

#[async_trait]
impl OverlayCompositor for LopdfOverlayCompositor {
    async fn stamp_image(&self, document: Vec<u8>, page: u32, stamp: ImageStamp) -> PortResult<Vec<u8>> {
        blocking(move || save(stamp_image(load(&document)?, page, stamp)?)).await
    }

    async fn stamp_text(
        &self,
        document: Vec<u8>,
        overlays: BTreeMap<u32, Vec<TextEdit>>,
    ) -> PortResult<Vec<u8>> {
        blocking(move || save(stamp_text(load(&document)?, overlays)?)).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Rgba;

    #[test]
    fn fit_centres_a_wide_image_in_a_square_box() {
        let rect = PageRect {
            x: 0.0,
            y: 0.0,
            width: 100.0,
            height: 100.0,
        };
        let fitted = fit_preserving_aspect(rect, 200, 100);
        assert_eq!(fitted.width, 100.0);
        assert_eq!(fitted.height, 50.0);
        assert_eq!(fitted.x, 0.0);
        assert_eq!(fitted.y, 25.0);
    }

    #[test]
    fn transparency_is_flattened_or_kept_as_mask() {
        let bitmap = RgbaImage::from_pixel(1, 1, Rgba([0, 0, 0, 0]));
        let (rgb, alpha) = split_channels(&bitmap, false);
        assert_eq!(rgb, vec![255, 255, 255]);
        assert!(alpha.is_none());

        let (rgb, alpha) = split_channels(&bitmap, true);
        assert_eq!(rgb, vec![0, 0, 0]);
        assert_eq!(alpha, Some(vec![0]));
    }

    #[test]
    fn non_latin_text_is_replaced() {
        assert_eq!(win_ansi("café ✓"), vec![b'c', b'a', b'f', 0xE9, b' ', b'?']);
    }
}
