//! services/api/src/web/state.rs
//!
//! Defines the application's shared state.

use crate::config::Config;
use pdf_editor_core::DocumentEditor;
use std::sync::Arc;

//=========================================================================================
// AppState (Shared Across All Requests)
//=========================================================================================

/// The shared application state, created once at startup and passed to all handlers.
#[derive(Clone)]
pub struct AppState {
    /// Owns the session registry and every port adapter.
    pub editor: Arc<DocumentEditor>,
    pub config: Arc<Config>,
}
