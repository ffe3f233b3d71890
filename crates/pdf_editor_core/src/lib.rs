pub mod domain;
pub mod error;
pub mod pipeline;
pub mod ports;
pub mod preview;
pub mod registry;
pub mod workspace;

#[cfg(test)]
mod testing;

pub use domain::{
    Annotation, AnnotationKind, DocumentInfo, DocumentMetadata, ExportedDocument, PageRect,
    PageSize, PlacedImage, Placement, RenderedPage, SessionRecord, TextEdit,
};
pub use error::{EditorError, EditorResult};
pub use pipeline::DocumentEditor;
pub use ports::{
    DocumentStore, GlyphPainter, ImageStamp, OverlayCompositor, PortError, PortResult, Rasterizer,
};
pub use registry::{SessionHandle, SessionRegistry};
pub use workspace::Workspace;
