//! crates/pdf_editor_core/src/error.rs
//!
//! The error taxonomy surfaced by the session registry and the mutation pipeline.

use crate::ports::PortError;

/// Every failure a pipeline operation can report to its caller.
#[derive(Debug, thiserror::Error)]
pub enum EditorError {
    /// The upload is not a recognized or parseable document.
    #[error("Invalid document: {0}")]
    InvalidDocument(String),

    #[error("Session not found: {0}")]
    SessionNotFound(String),

    #[error("Invalid page number {page} (document has {page_count} pages)")]
    PageOutOfRange { page: u32, page_count: u32 },

    /// Merge was called with fewer than two documents.
    #[error("At least 2 PDFs required, got {0}")]
    InsufficientInputs(usize),

    #[error("Invalid signature data: {0}")]
    InvalidSignatureData(String),

    /// A document store, compositor, rasterizer or filesystem failure.
    #[error("Operation failed: {0}")]
    OperationFailed(String),
}

impl From<PortError> for EditorError {
    fn from(err: PortError) -> Self {
        EditorError::OperationFailed(err.to_string())
    }
}

impl From<std::io::Error> for EditorError {
    fn from(err: std::io::Error) -> Self {
        EditorError::OperationFailed(err.to_string())
    }
}

/// A convenience type alias for `Result<T, EditorError>`.
pub type EditorResult<T> = Result<T, EditorError>;
