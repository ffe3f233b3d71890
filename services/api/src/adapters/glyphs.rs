//! services/api/src/adapters/glyphs.rs
//!
//! This module contains the glyph painter adapter built on `fontdue`.
//! It implements the `GlyphPainter` port from the `core` crate and is only used for
//! preview bitmaps.

use fontdue::{Font, FontSettings};
use image::{Rgba, RgbaImage};
use pdf_editor_core::ports::GlyphPainter;
use pdf_editor_core::preview::blend_pixel;
use std::path::{Path, PathBuf};
use tracing::{info, warn};

/// Tried in order when no font is configured or the configured one fails to load.
const SYSTEM_FONTS: &[&str] = &[
    "/usr/share/fonts/truetype/dejavu/DejaVuSans.ttf",
    "/usr/share/fonts/dejavu/DejaVuSans.ttf",
    "/usr/share/fonts/TTF/DejaVuSans.ttf",
    "/usr/share/fonts/truetype/liberation/LiberationSans-Regular.ttf",
    "/usr/share/fonts/liberation/LiberationSans-Regular.ttf",
    "/System/Library/Fonts/Helvetica.ttc",
    "/Library/Fonts/Arial.ttf",
    "C:\\Windows\\Fonts\\arial.ttf",
];

//=========================================================================================
// The Main Adapter Struct
//=========================================================================================

pub struct FontdueGlyphPainter {
    /// `None` when no font could be loaded; text annotations are then skipped.
    font: Option<Font>,
}

impl FontdueGlyphPainter {
    /// Loads `preferred` if given, falling back to well-known system fonts.
    pub fn load(preferred: Option<&Path>) -> Self {
        let candidates = preferred
            .map(Path::to_path_buf)
            .into_iter()
            .chain(SYSTEM_FONTS.iter().map(PathBuf::from));

        for path in candidates {
            match read_font(&path) {
                Ok(font) => {
                    info!("Loaded preview font from {}", path.display());
                    return Self { font: Some(font) };
                }
                Err(e) if Some(path.as_path()) == preferred => {
                    warn!("Could not load font {}: {}", path.display(), e);
                }
                Err(_) => {}
            }
        }
        warn!("No preview font found; text annotations will not be drawn in previews");
        Self { font: None }
    }
}

fn read_font(path: &Path) -> Result<Font, String> {
    let bytes = std::fs::read(path).map_err(|e| e.to_string())?;
    Font::from_bytes(bytes, FontSettings::default()).map_err(str::to_string)
}

//=========================================================================================
// `GlyphPainter` Trait Implementation
//=========================================================================================

impl GlyphPainter for FontdueGlyphPainter {
    fn draw_text(&self, canvas: &mut RgbaImage, x: f32, y: f32, text: &str, size: f32, color: Rgba<u8>) {
        let Some(font) = &self.font else {
            return;
        };
        if size <= 0.0 {
            return;
        }
        let ascent = font
            .horizontal_line_metrics(size)
            .map_or(size * 0.8, |m| m.ascent);
        let baseline = y + ascent;
        let (width, height) = canvas.dimensions();
        let [r, g, b, a] = color.0;

        let mut caret = x;
        let mut previous: Option<char> = None;
        for ch in text.chars() {
            if ch.is_control() {
                continue;
            }
            if let Some(kern) = previous.and_then(|p| font.horizontal_kern(p, ch, size)) {
                caret += kern;
            }
            previous = Some(ch);

            let (metrics, coverage) = font.rasterize(ch, size);
            let left = (caret + metrics.xmin as f32).round() as i64;
            let top = (baseline - (metrics.ymin as f32 + metrics.height as f32)).round() as i64;
            for row in 0..metrics.height {
                for col in 0..metrics.width {
                    let cover = coverage[row * metrics.width + col];
                    if cover == 0 {
                        continue;
                    }
                    let (px, py) = (left + col as i64, top + row as i64);
                    if px < 0 || py < 0 || px >= width as i64 || py >= height as i64 {
                        continue;
                    }
                    let alpha = (cover as u32 * a as u32 / 255) as u8;
                    blend_pixel(canvas.get_pixel_mut(px as u32, py as u32), [r, g, b], alpha);
                }
            }
            caret += metrics.advance_width;
        }
    }
}
