//! crates/pdf_editor_core/src/preview.rs
//!
//! Draws queued annotations onto a rasterized page. Previews only; nothing here is
//! written back into the document.

use image::{Rgba, RgbaImage};

use crate::domain::{parse_color, Annotation, AnnotationKind};
use crate::ports::GlyphPainter;

const HIGHLIGHT_RGB: [u8; 3] = [255, 255, 0];
const HIGHLIGHT_ALPHA: u8 = 100;

pub fn paint_annotations(canvas: &mut RgbaImage, annotations: &[Annotation], painter: &dyn GlyphPainter) {
    for annotation in annotations {
        match annotation.kind {
            AnnotationKind::Highlight => fill_rect(
                canvas,
                annotation.x,
                annotation.y,
                annotation.width,
                annotation.height,
                HIGHLIGHT_RGB,
                HIGHLIGHT_ALPHA,
            ),
            AnnotationKind::Text => {
                let [r, g, b] = parse_color(&annotation.color);
                painter.draw_text(
                    canvas,
                    annotation.x,
                    annotation.y,
                    &annotation.text,
                    annotation.font_size,
                    Rgba([r, g, b, 255]),
                );
            }
        }
    }
}

/// Alpha-blends a solid rectangle over the canvas, clipped to its bounds.
/// Both edges are inclusive.
pub fn fill_rect(canvas: &mut RgbaImage, x: f32, y: f32, width: f32, height: f32, rgb: [u8; 3], alpha: u8) {
    let (cw, ch) = canvas.dimensions();
    if cw == 0 || ch == 0 {
        return;
    }
    let x0 = x.min(x + width).floor().max(0.0);
    let y0 = y.min(y + height).floor().max(0.0);
    let x1 = x.max(x + width).floor().min((cw - 1) as f32);
    let y1 = y.max(y + height).floor().min((ch - 1) as f32);
    if x1 < x0 || y1 < y0 {
        return;
    }
    for py in y0 as u32..=y1 as u32 {
        for px in x0 as u32..=x1 as u32 {
            blend_pixel(canvas.get_pixel_mut(px, py), rgb, alpha);
        }
    }
}

/// Source-over blend of one color onto a pixel.
pub fn blend_pixel(pixel: &mut Rgba<u8>, rgb: [u8; 3], alpha: u8) {
    let a = alpha as u32;
    for (channel, src) in pixel.0.iter_mut().take(3).zip(rgb) {
        *channel = ((src as u32 * a + *channel as u32 * (255 - a) + 127) / 255) as u8;
    }
    pixel.0[3] = pixel.0[3].max(alpha);
}
