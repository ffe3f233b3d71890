pub mod middleware;
pub mod protocol;
pub mod rest;
pub mod state;

use axum::{
    extract::DefaultBodyLimit,
    http::{
        header::{ACCEPT, CONTENT_TYPE},
        HeaderValue, Method,
    },
    middleware as axum_middleware,
    routing::{delete, get, post},
    Router,
};
use std::sync::Arc;
use tower_http::cors::CorsLayer;
use tracing::warn;

pub use middleware::log_requests;
use rest::*;
pub use state::AppState;

/// Builds the `/api` router with body limit, CORS and request logging applied.
pub fn router(state: Arc<AppState>) -> Router {
    let cors = cors_layer(state.config.cors_origin.as_deref());
    let body_limit = DefaultBodyLimit::max(state.config.max_upload_bytes);

    Router::new()
        .route("/api/upload", post(upload_handler))
        .route("/api/session/{session}", delete(destroy_session_handler))
        .route("/api/render/{session}/{page}", get(render_handler))
        .route("/api/annotate/{session}", post(annotate_handler))
        .route("/api/add-text/{session}/{page}", post(add_text_handler))
        .route("/api/rotate/{session}/{page}/{angle}", post(rotate_handler))
        .route("/api/delete/{session}/{page}", delete(delete_page_handler))
        .route("/api/add-image/{session}/{page}", post(add_image_handler))
        .route("/api/add-signature/{session}/{page}", post(add_signature_handler))
        .route("/api/merge", post(merge_handler))
        .route("/api/split/{session}", post(split_handler))
        .route("/api/extract-text/{session}/{page}", get(extract_text_handler))
        .route("/api/download/{session}", get(download_handler))
        .route("/api/info/{session}", get(info_handler))
        .route("/api/files/{filename}", get(output_file_handler))
        .layer(body_limit)
        .layer(cors)
        .layer(axum_middleware::from_fn(log_requests))
        .with_state(state)
}

fn cors_layer(origin: Option<&str>) -> CorsLayer {
    let Some(origin) = origin else {
        return CorsLayer::permissive();
    };
    match origin.parse::<HeaderValue>() {
        Ok(origin) => CorsLayer::new()
            .allow_origin(origin)
            .allow_methods([Method::GET, Method::POST, Method::DELETE, Method::OPTIONS])
            .allow_headers([CONTENT_TYPE, ACCEPT]),
        Err(_) => {
            warn!("CORS_ORIGIN '{}' is not a valid header value; allowing any origin", origin);
            CorsLayer::permissive()
        }
    }
}
