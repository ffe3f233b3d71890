//! services/api/src/bin/api.rs

use api_lib::{
    adapters::{
        FontdueGlyphPainter, LopdfDocumentStore, LopdfOverlayCompositor, PdftoppmRasterizer,
    },
    config::Config,
    error::ApiError,
    web::{self, rest::ApiDoc, state::AppState},
};
use axum::Router;
use pdf_editor_core::{DocumentEditor, SessionRegistry, Workspace};
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

#[tokio::main]
async fn main() -> Result<(), ApiError> {
    // --- 1. Load Configuration & Set Up Logging ---
    let config = Arc::new(Config::from_env()?);
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(config.log_level.to_string()))
        .with(tracing_subscriber::fmt::layer())
        .init();
    info!("Configuration loaded. Starting server...");

    // --- 2. Prepare the On-Disk Workspace ---
    let workspace = Workspace::new(&config.upload_dir, &config.temp_dir);
    workspace.prepare().await?;
    info!(
        "Uploads in {}, temporary files in {}",
        config.upload_dir.display(),
        config.temp_dir.display()
    );

    // --- 3. Initialize Service Adapters ---
    let store = Arc::new(LopdfDocumentStore::new());
    let compositor = Arc::new(LopdfOverlayCompositor::new());
    let rasterizer = PdftoppmRasterizer::new(&config.pdftoppm_path, &config.temp_dir);
    if !rasterizer.is_available().await {
        warn!(
            "'{}' could not be started; page rendering will fail until poppler is installed",
            config.pdftoppm_path.display()
        );
    }
    let painter = Arc::new(FontdueGlyphPainter::load(config.font_path.as_deref()));

    // --- 4. Build the Registry, the Editor and the Shared AppState ---
    let registry = Arc::new(SessionRegistry::new(store.clone(), workspace));
    let editor = Arc::new(DocumentEditor::new(
        registry.clone(),
        store,
        Arc::new(rasterizer),
        compositor,
        painter,
    ));
    let app_state = Arc::new(AppState {
        editor,
        config: config.clone(),
    });

    // --- 5. Spawn Idle Session Eviction ---
    if let Some(ttl) = config.session_ttl {
        let registry = registry.clone();
        let period = ttl.min(Duration::from_secs(60));
        info!("Evicting sessions idle for more than {}s", ttl.as_secs());
        tokio::spawn(async move {
            let mut interval = tokio::time::interval(period);
            loop {
                interval.tick().await;
                registry.evict_idle(ttl).await;
            }
        });
    }

    // --- 6. Create the Web Router ---
    // Merge the API router with the Swagger UI router for a complete application.
    let app = Router::new()
        .merge(web::router(app_state))
        .merge(SwaggerUi::new("/swagger-ui").url("/api-docs/openapi.json", ApiDoc::openapi()));

    // --- 7. Start the Server ---
    info!("Starting server on {}", config.bind_address);
    info!(
        "Swagger UI available at http://{}/swagger-ui",
        config.bind_address
    );
    let listener = tokio::net::TcpListener::bind(&config.bind_address).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
