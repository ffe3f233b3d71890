//! services/api/src/web/protocol.rs
//!
//! Defines the JSON payloads exchanged between the browser client and the API server.
//! Request defaults match what the editor front-end omits.

use serde::{Deserialize, Serialize};
use utoipa::{IntoParams, ToSchema};

fn default_color() -> String {
    "black".to_string()
}

fn default_font_size() -> f32 {
    12.0
}

fn default_signature_width() -> f32 {
    200.0
}

fn default_signature_height() -> f32 {
    100.0
}

//=========================================================================================
// Requests Sent FROM the Client TO the Server
//=========================================================================================

/// A preview annotation. Coordinates are pixels of the rendered page image.
#[derive(Deserialize, Debug, ToSchema)]
pub struct AnnotateRequest {
    pub page: u32,
    /// `highlight` or `text`.
    #[serde(rename = "type")]
    pub kind: String,
    pub x: f32,
    pub y: f32,
    #[serde(default)]
    pub width: f32,
    #[serde(default)]
    pub height: f32,
    #[serde(default)]
    pub text: String,
    #[serde(default = "default_color")]
    pub color: String,
    #[serde(default = "default_font_size")]
    pub size: f32,
}

/// Text to write into the exported document. Coordinates are PDF points, origin
/// bottom-left.
#[derive(Deserialize, Debug, ToSchema)]
pub struct AddTextRequest {
    pub text: String,
    pub x: f32,
    pub y: f32,
    #[serde(default = "default_font_size")]
    pub size: f32,
    #[serde(default = "default_color")]
    pub color: String,
}

#[derive(Deserialize, Debug, ToSchema)]
pub struct SplitRequest {
    /// Inclusive 1-based `[start, end]` pairs.
    #[serde(default)]
    #[schema(value_type = Vec<Vec<i64>>)]
    pub ranges: Vec<(i64, i64)>,
}

/// A signature image as base64 or a `data:` URL, placed with its top-left corner at
/// `(x, y)` in points from the top of the page.
#[derive(Deserialize, Debug, ToSchema)]
pub struct AddSignatureRequest {
    #[serde(default)]
    pub signature: String,
    #[serde(default)]
    pub x: f32,
    #[serde(default)]
    pub y: f32,
    #[serde(default = "default_signature_width")]
    pub width: f32,
    #[serde(default = "default_signature_height")]
    pub height: f32,
}

#[derive(Deserialize, Debug, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct RenderQuery {
    /// Overrides the configured resolution; clamped to 36..=600.
    pub dpi: Option<u32>,
}

//=========================================================================================
// Responses Sent FROM the Server TO the Client
//=========================================================================================

#[derive(Serialize, Debug, ToSchema)]
pub struct UploadResponse {
    pub session_id: String,
    pub filename: String,
    pub num_pages: u32,
}

#[derive(Serialize, Debug, ToSchema)]
pub struct RenderResponse {
    /// `data:image/png;base64,...`
    pub image: String,
    pub width: u32,
    pub height: u32,
}

#[derive(Serialize, Debug, ToSchema)]
pub struct SuccessResponse {
    pub success: bool,
}

impl SuccessResponse {
    pub fn ok() -> Self {
        Self { success: true }
    }
}

#[derive(Serialize, Debug, ToSchema)]
pub struct DeletePageResponse {
    pub success: bool,
    pub num_pages: u32,
}

#[derive(Serialize, Debug, ToSchema)]
pub struct SplitResponse {
    pub success: bool,
    pub files: Vec<String>,
}

#[derive(Serialize, Debug, ToSchema)]
pub struct TextResponse {
    pub text: String,
}

#[derive(Serialize, Debug, ToSchema)]
pub struct InfoResponse {
    pub filename: String,
    pub num_pages: u32,
    pub title: String,
    pub author: String,
    pub creator: String,
    pub file_size: u64,
}

#[derive(Serialize, Debug, ToSchema)]
pub struct ErrorResponse {
    pub error: String,
}
