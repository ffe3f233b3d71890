pub mod glyphs;
pub mod lopdf_overlay;
pub mod lopdf_store;
mod pdf_objects;
pub mod pdftoppm;

pub use glyphs::FontdueGlyphPainter;
pub use lopdf_overlay::LopdfOverlayCompositor;
pub use lopdf_store::LopdfDocumentStore;
pub use pdftoppm::PdftoppmRasterizer;
