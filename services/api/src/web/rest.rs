//! services/api/src/web/rest.rs
//!
//! Contains the Axum handlers for the REST API endpoints and the master
//! definition for the OpenAPI specification.

use axum::{
    extract::{
        multipart::MultipartRejection,
        rejection::{JsonRejection, PathRejection, QueryRejection},
        Multipart, Path, Query, State,
    },
    http::header,
    response::{IntoResponse, Json, Response},
};
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use bytes::Bytes;
use pdf_editor_core::workspace::has_pdf_extension;
use pdf_editor_core::{Annotation, AnnotationKind, Placement, TextEdit};
use std::io;
use std::sync::Arc;
use tracing::{debug, info};
use utoipa::OpenApi;

use crate::error::ApiError;
use crate::web::protocol::{
    AddSignatureRequest, AddTextRequest, AnnotateRequest, DeletePageResponse, ErrorResponse,
    InfoResponse, RenderQuery, RenderResponse, SplitRequest, SplitResponse, SuccessResponse,
    TextResponse, UploadResponse,
};
use crate::web::state::AppState;

const MIN_DPI: u32 = 36;
const MAX_DPI: u32 = 600;

/// Box used by add-image when the form omits any of x/y/width/height.
const DEFAULT_IMAGE_PLACEMENT: Placement = Placement {
    x: 0.0,
    y: 0.0,
    width: 100.0,
    height: 100.0,
};

//=========================================================================================
// OpenAPI Master Definition
//=========================================================================================

#[derive(OpenApi)]
#[openapi(
    paths(
        upload_handler,
        render_handler,
        annotate_handler,
        rotate_handler,
        delete_page_handler,
        merge_handler,
        split_handler,
        extract_text_handler,
        add_text_handler,
        download_handler,
        info_handler,
        add_image_handler,
        add_signature_handler,
        destroy_session_handler,
        output_file_handler,
    ),
    components(
        schemas(
            UploadResponse,
            RenderResponse,
            AnnotateRequest,
            SuccessResponse,
            DeletePageResponse,
            SplitRequest,
            SplitResponse,
            TextResponse,
            AddTextRequest,
            InfoResponse,
            AddSignatureRequest,
            ErrorResponse,
        )
    ),
    tags(
        (name = "PDF Editor API", description = "Upload, preview, edit and export PDF documents.")
    )
)]
pub struct ApiDoc;

//=========================================================================================
// Helpers
//=========================================================================================

/// A binary PDF response that browsers save under `filename`.
fn pdf_attachment(filename: &str, bytes: Vec<u8>) -> Response {
    let disposition = format!("attachment; filename=\"{}\"", filename.replace('"', ""));
    (
        [
            (header::CONTENT_TYPE, "application/pdf".to_string()),
            (header::CONTENT_DISPOSITION, disposition),
        ],
        bytes,
    )
        .into_response()
}

fn parse_coordinate(name: &str, value: &str) -> Result<f32, ApiError> {
    value
        .trim()
        .parse::<f32>()
        .map_err(|_| ApiError::BadRequest(format!("Invalid value for {}: '{}'", name, value)))
}

//=========================================================================================
// Session Lifecycle
//=========================================================================================

/// Upload a PDF and open an editing session for it.
///
/// Accepts a multipart/form-data request with a `file` part.
#[utoipa::path(
    post,
    path = "/api/upload",
    request_body(content_type = "multipart/form-data", description = "The PDF to edit, as the `file` part."),
    responses(
        (status = 200, description = "Session created", body = UploadResponse),
        (status = 400, description = "Missing file, wrong file type or unreadable PDF", body = ErrorResponse),
        (status = 500, description = "Internal server error", body = ErrorResponse)
    )
)]
pub async fn upload_handler(
    State(state): State<Arc<AppState>>,
    multipart: Result<Multipart, MultipartRejection>,
) -> Result<Json<UploadResponse>, ApiError> {
    let mut multipart = multipart?;
    let mut upload: Option<(String, Bytes)> = None;
    while let Some(field) = multipart.next_field().await? {
        if field.name() != Some("file") {
            continue;
        }
        let name = field.file_name().unwrap_or_default().to_string();
        let data = field.bytes().await?;
        upload = Some((name, data));
        break;
    }

    let (name, data) = upload.ok_or_else(|| ApiError::BadRequest("No file provided".to_string()))?;
    if name.is_empty() {
        return Err(ApiError::BadRequest("No file selected".to_string()));
    }

    let record = state.editor.registry().create(&data, &name).await?;
    Ok(Json(UploadResponse {
        session_id: record.id,
        filename: record.display_name,
        num_pages: record.page_count,
    }))
}

/// Close a session and delete its files.
#[utoipa::path(
    delete,
    path = "/api/session/{session}",
    params(("session" = String, Path, description = "The session id returned by upload.")),
    responses(
        (status = 200, description = "Session closed", body = SuccessResponse),
        (status = 404, description = "Session not found", body = ErrorResponse)
    )
)]
pub async fn destroy_session_handler(
    State(state): State<Arc<AppState>>,
    path: Result<Path<String>, PathRejection>,
) -> Result<Json<SuccessResponse>, ApiError> {
    let Path(session) = path?;
    state.editor.registry().destroy(&session).await?;
    Ok(Json(SuccessResponse::ok()))
}

//=========================================================================================
// Preview and Queued Edits
//=========================================================================================

/// Render one page as a PNG with the session's annotations drawn on top.
#[utoipa::path(
    get,
    path = "/api/render/{session}/{page}",
    params(
        ("session" = String, Path, description = "The session id returned by upload."),
        ("page" = u32, Path, description = "1-based page number."),
        RenderQuery
    ),
    responses(
        (status = 200, description = "Rendered page", body = RenderResponse),
        (status = 400, description = "Invalid page number", body = ErrorResponse),
        (status = 404, description = "Session not found", body = ErrorResponse),
        (status = 500, description = "Failed to render page", body = ErrorResponse)
    )
)]
pub async fn render_handler(
    State(state): State<Arc<AppState>>,
    path: Result<Path<(String, u32)>, PathRejection>,
    query: Result<Query<RenderQuery>, QueryRejection>,
) -> Result<Json<RenderResponse>, ApiError> {
    let Path((session, page)) = path?;
    let Query(query) = query?;
    let dpi = query
        .dpi
        .unwrap_or(state.config.render_dpi)
        .clamp(MIN_DPI, MAX_DPI);
    let rendered = state.editor.render_page(&session, page, dpi).await?;
    Ok(Json(RenderResponse {
        image: format!("data:image/png;base64,{}", BASE64.encode(&rendered.png)),
        width: rendered.width,
        height: rendered.height,
    }))
}

/// Queue a highlight or text annotation for previews.
#[utoipa::path(
    post,
    path = "/api/annotate/{session}",
    params(("session" = String, Path, description = "The session id returned by upload.")),
    request_body = AnnotateRequest,
    responses(
        (status = 200, description = "Annotation queued", body = SuccessResponse),
        (status = 400, description = "Malformed annotation", body = ErrorResponse),
        (status = 404, description = "Session not found", body = ErrorResponse)
    )
)]
pub async fn annotate_handler(
    State(state): State<Arc<AppState>>,
    path: Result<Path<String>, PathRejection>,
    payload: Result<Json<AnnotateRequest>, JsonRejection>,
) -> Result<Json<SuccessResponse>, ApiError> {
    let Path(session) = path?;
    let Json(req) = payload?;
    let kind: AnnotationKind = req.kind.parse().map_err(ApiError::BadRequest)?;
    let annotation = Annotation {
        kind,
        x: req.x,
        y: req.y,
        width: req.width,
        height: req.height,
        text: req.text,
        color: req.color,
        font_size: req.size,
    };
    state.editor.add_annotation(&session, req.page, annotation).await?;
    Ok(Json(SuccessResponse::ok()))
}

/// Queue text to be written into the page on download.
#[utoipa::path(
    post,
    path = "/api/add-text/{session}/{page}",
    params(
        ("session" = String, Path, description = "The session id returned by upload."),
        ("page" = u32, Path, description = "1-based page number.")
    ),
    request_body = AddTextRequest,
    responses(
        (status = 200, description = "Text edit queued", body = SuccessResponse),
        (status = 400, description = "Malformed text edit", body = ErrorResponse),
        (status = 404, description = "Session not found", body = ErrorResponse)
    )
)]
pub async fn add_text_handler(
    State(state): State<Arc<AppState>>,
    path: Result<Path<(String, u32)>, PathRejection>,
    payload: Result<Json<AddTextRequest>, JsonRejection>,
) -> Result<Json<SuccessResponse>, ApiError> {
    let Path((session, page)) = path?;
    let Json(req) = payload?;
    let edit = TextEdit {
        x: req.x,
        y: req.y,
        text: req.text,
        font_size: req.size,
        color: req.color,
    };
    state.editor.add_text_edit(&session, page, edit).await?;
    Ok(Json(SuccessResponse::ok()))
}

//=========================================================================================
// Structural Edits
//=========================================================================================

/// Rotate one page by a multiple of 90 degrees.
#[utoipa::path(
    post,
    path = "/api/rotate/{session}/{page}/{angle}",
    params(
        ("session" = String, Path, description = "The session id returned by upload."),
        ("page" = u32, Path, description = "1-based page number."),
        ("angle" = i32, Path, description = "Degrees clockwise; a multiple of 90.")
    ),
    responses(
        (status = 200, description = "Page rotated", body = SuccessResponse),
        (status = 400, description = "Invalid page number", body = ErrorResponse),
        (status = 404, description = "Session not found", body = ErrorResponse)
    )
)]
pub async fn rotate_handler(
    State(state): State<Arc<AppState>>,
    path: Result<Path<(String, u32, i32)>, PathRejection>,
) -> Result<Json<SuccessResponse>, ApiError> {
    let Path((session, page, angle)) = path?;
    if angle % 90 != 0 {
        return Err(ApiError::BadRequest(format!(
            "Rotation angle must be a multiple of 90, got {}",
            angle
        )));
    }
    state.editor.rotate(&session, page, angle).await?;
    Ok(Json(SuccessResponse::ok()))
}

/// Delete one page; later pages move up by one.
#[utoipa::path(
    delete,
    path = "/api/delete/{session}/{page}",
    params(
        ("session" = String, Path, description = "The session id returned by upload."),
        ("page" = u32, Path, description = "1-based page number.")
    ),
    responses(
        (status = 200, description = "Page deleted", body = DeletePageResponse),
        (status = 400, description = "Invalid page number", body = ErrorResponse),
        (status = 404, description = "Session not found", body = ErrorResponse)
    )
)]
pub async fn delete_page_handler(
    State(state): State<Arc<AppState>>,
    path: Result<Path<(String, u32)>, PathRejection>,
) -> Result<Json<DeletePageResponse>, ApiError> {
    let Path((session, page)) = path?;
    let num_pages = state.editor.delete_page(&session, page).await?;
    Ok(Json(DeletePageResponse {
        success: true,
        num_pages,
    }))
}

/// Burn an uploaded image into a page.
///
/// Accepts a multipart/form-data request with an `image` part and optional `x`, `y`,
/// `width` and `height` fields in points from the top-left of the page.
#[utoipa::path(
    post,
    path = "/api/add-image/{session}/{page}",
    params(
        ("session" = String, Path, description = "The session id returned by upload."),
        ("page" = u32, Path, description = "1-based page number.")
    ),
    request_body(content_type = "multipart/form-data", description = "The image and its placement."),
    responses(
        (status = 200, description = "Image added", body = SuccessResponse),
        (status = 400, description = "Missing image or invalid page number", body = ErrorResponse),
        (status = 404, description = "Session not found", body = ErrorResponse),
        (status = 500, description = "Image could not be added", body = ErrorResponse)
    )
)]
pub async fn add_image_handler(
    State(state): State<Arc<AppState>>,
    path: Result<Path<(String, u32)>, PathRejection>,
    multipart: Result<Multipart, MultipartRejection>,
) -> Result<Json<SuccessResponse>, ApiError> {
    let Path((session, page)) = path?;
    state.editor.registry().get(&session).await?;
    let mut multipart = multipart?;

    let mut image: Option<Bytes> = None;
    let mut placement = DEFAULT_IMAGE_PLACEMENT;
    while let Some(field) = multipart.next_field().await? {
        let name = field.name().unwrap_or_default().to_string();
        match name.as_str() {
            "image" => image = Some(field.bytes().await?),
            "x" | "y" | "width" | "height" => {
                let value = parse_coordinate(&name, &field.text().await?)?;
                match name.as_str() {
                    "x" => placement.x = value,
                    "y" => placement.y = value,
                    "width" => placement.width = value,
                    _ => placement.height = value,
                }
            }
            other => debug!("Ignoring multipart field '{}'", other),
        }
    }

    let image = image.ok_or_else(|| ApiError::BadRequest("No image provided".to_string()))?;
    state
        .editor
        .add_image(&session, page, image.to_vec(), placement)
        .await?;
    Ok(Json(SuccessResponse::ok()))
}

/// Burn a base64 signature image into a page, keeping its transparency.
#[utoipa::path(
    post,
    path = "/api/add-signature/{session}/{page}",
    params(
        ("session" = String, Path, description = "The session id returned by upload."),
        ("page" = u32, Path, description = "1-based page number.")
    ),
    request_body = AddSignatureRequest,
    responses(
        (status = 200, description = "Signature added", body = SuccessResponse),
        (status = 400, description = "Missing or malformed signature data", body = ErrorResponse),
        (status = 404, description = "Session not found", body = ErrorResponse),
        (status = 500, description = "Signature could not be added", body = ErrorResponse)
    )
)]
pub async fn add_signature_handler(
    State(state): State<Arc<AppState>>,
    path: Result<Path<(String, u32)>, PathRejection>,
    payload: Result<Json<AddSignatureRequest>, JsonRejection>,
) -> Result<Json<SuccessResponse>, ApiError> {
    let Path((session, page)) = path?;
    let Json(req) = payload?;
    let placement = Placement {
        x: req.x,
        y: req.y,
        width: req.width,
        height: req.height,
    };
    state
        .editor
        .add_signature(&session, page, &req.signature, placement)
        .await?;
    Ok(Json(SuccessResponse::ok()))
}

//=========================================================================================
// Documents Out
//=========================================================================================

/// Merge two or more uploaded PDFs into one download.
///
/// Accepts a multipart/form-data request with repeated `files` parts. Parts whose
/// filename does not end in `.pdf` are skipped.
#[utoipa::path(
    post,
    path = "/api/merge",
    request_body(content_type = "multipart/form-data", description = "Two or more PDFs as `files` parts."),
    responses(
        (status = 200, description = "The merged PDF"),
        (status = 400, description = "Fewer than two PDFs or an unreadable PDF", body = ErrorResponse),
        (status = 500, description = "Merge failed", body = ErrorResponse)
    )
)]
pub async fn merge_handler(
    State(state): State<Arc<AppState>>,
    multipart: Result<Multipart, MultipartRejection>,
) -> Result<Response, ApiError> {
    let mut multipart = multipart?;
    let mut documents = Vec::new();
    let mut saw_files = false;
    while let Some(field) = multipart.next_field().await? {
        if field.name() != Some("files") {
            continue;
        }
        saw_files = true;
        let name = field.file_name().unwrap_or_default().to_string();
        if !has_pdf_extension(&name) {
            debug!("Skipping non-PDF merge input '{}'", name);
            continue;
        }
        documents.push(field.bytes().await?.to_vec());
    }
    if !saw_files {
        return Err(ApiError::BadRequest("No files provided".to_string()));
    }

    let merged = state.editor.merge(documents).await?;
    Ok(pdf_attachment(&merged.filename, merged.bytes))
}

/// Split the session's document into one file per page range.
#[utoipa::path(
    post,
    path = "/api/split/{session}",
    params(("session" = String, Path, description = "The session id returned by upload.")),
    request_body = SplitRequest,
    responses(
        (status = 200, description = "Names of the written files", body = SplitResponse),
        (status = 404, description = "Session not found", body = ErrorResponse),
        (status = 500, description = "Split failed", body = ErrorResponse)
    )
)]
pub async fn split_handler(
    State(state): State<Arc<AppState>>,
    path: Result<Path<String>, PathRejection>,
    payload: Result<Json<SplitRequest>, JsonRejection>,
) -> Result<Json<SplitResponse>, ApiError> {
    let Path(session) = path?;
    let Json(req) = payload?;
    let files = state.editor.split(&session, &req.ranges).await?;
    Ok(Json(SplitResponse {
        success: true,
        files,
    }))
}

/// Extract the text of one page.
#[utoipa::path(
    get,
    path = "/api/extract-text/{session}/{page}",
    params(
        ("session" = String, Path, description = "The session id returned by upload."),
        ("page" = u32, Path, description = "1-based page number.")
    ),
    responses(
        (status = 200, description = "The page text", body = TextResponse),
        (status = 400, description = "Invalid page number", body = ErrorResponse),
        (status = 404, description = "Session not found", body = ErrorResponse)
    )
)]
pub async fn extract_text_handler(
    State(state): State<Arc<AppState>>,
    path: Result<Path<(String, u32)>, PathRejection>,
) -> Result<Json<TextResponse>, ApiError> {
    let Path((session, page)) = path?;
    let text = state.editor.extract_text(&session, page).await?;
    Ok(Json(TextResponse { text }))
}

/// Download the document with all queued text edits applied.
#[utoipa::path(
    get,
    path = "/api/download/{session}",
    params(("session" = String, Path, description = "The session id returned by upload.")),
    responses(
        (status = 200, description = "The edited PDF"),
        (status = 404, description = "Session not found", body = ErrorResponse)
    )
)]
pub async fn download_handler(
    State(state): State<Arc<AppState>>,
    path: Result<Path<String>, PathRejection>,
) -> Result<Response, ApiError> {
    let Path(session) = path?;
    let exported = state.editor.export(&session).await?;
    Ok(pdf_attachment(&exported.filename, exported.bytes))
}

/// Document metadata and size.
#[utoipa::path(
    get,
    path = "/api/info/{session}",
    params(("session" = String, Path, description = "The session id returned by upload.")),
    responses(
        (status = 200, description = "Document information", body = InfoResponse),
        (status = 404, description = "Session not found", body = ErrorResponse)
    )
)]
pub async fn info_handler(
    State(state): State<Arc<AppState>>,
    path: Result<Path<String>, PathRejection>,
) -> Result<Json<InfoResponse>, ApiError> {
    let Path(session) = path?;
    let info = state.editor.info(&session).await?;
    Ok(Json(InfoResponse {
        filename: info.filename,
        num_pages: info.page_count,
        title: info.title,
        author: info.author,
        creator: info.creator,
        file_size: info.file_size,
    }))
}

/// Download a file written by merge or split.
#[utoipa::path(
    get,
    path = "/api/files/{filename}",
    params(("filename" = String, Path, description = "A name returned by merge or split.")),
    responses(
        (status = 200, description = "The PDF"),
        (status = 404, description = "No such file", body = ErrorResponse)
    )
)]
pub async fn output_file_handler(
    State(state): State<Arc<AppState>>,
    path: Result<Path<String>, PathRejection>,
) -> Result<Response, ApiError> {
    let Path(filename) = path?;
    let not_found = || ApiError::NotFound(format!("File not found: {}", filename));
    let path = state
        .editor
        .registry()
        .workspace()
        .output_path(&filename)
        .filter(|_| has_pdf_extension(&filename))
        .ok_or_else(not_found)?;
    let bytes = match tokio::fs::read(&path).await {
        Ok(bytes) => bytes,
        Err(e) if e.kind() == io::ErrorKind::NotFound => return Err(not_found()),
        Err(e) => return Err(e.into()),
    };
    info!(file = %filename, "Serving output file");
    Ok(pdf_attachment(&filename, bytes))
}
