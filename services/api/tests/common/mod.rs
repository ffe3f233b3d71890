//! Shared fixtures for the integration tests: generated PDFs, PNGs, multipart bodies
//! and an application wired to the real lopdf adapters with a stub rasterizer.

#![allow(dead_code)]

use api_lib::adapters::{LopdfDocumentStore, LopdfOverlayCompositor};
use api_lib::config::Config;
use api_lib::web::{self, AppState};
use async_trait::async_trait;
use axum::body::Body;
use axum::http::{Request, StatusCode};
use axum::Router;
use image::{ImageFormat, Rgba, RgbaImage};
use lopdf::content::{Content, Operation};
use lopdf::{dictionary, Document, Object, Stream};
use pdf_editor_core::ports::{GlyphPainter, PortResult, Rasterizer};
use pdf_editor_core::{DocumentEditor, SessionRegistry, Workspace};
use std::io::Cursor;
use std::path::Path;
use std::sync::Arc;
use tower::ServiceExt;

pub const BOUNDARY: &str = "pdf-editor-test-boundary";

/// A Letter-sized document whose page `n` shows the text "Page n". Fonts, resources
/// and the media box are inherited from the page tree root.
pub fn sample_pdf(pages: usize) -> Vec<u8> {
    let mut doc = Document::with_version("1.5");
    let pages_id = doc.new_object_id();
    let font_id = doc.add_object(dictionary! {
        "Type" => "Font",
        "Subtype" => "Type1",
        "BaseFont" => "Courier",
        "Encoding" => "WinAnsiEncoding",
    });
    let resources_id = doc.add_object(dictionary! {
        "Font" => dictionary! { "F1" => font_id },
    });

    let mut kids: Vec<Object> = Vec::new();
    for n in 1..=pages {
        let content = Content {
            operations: vec![
                Operation::new("BT", vec![]),
                Operation::new("Tf", vec!["F1".into(), 24.into()]),
                Operation::new("Td", vec![72.into(), 700.into()]),
                Operation::new("Tj", vec![Object::string_literal(format!("Page {n}"))]),
                Operation::new("ET", vec![]),
            ],
        };
        let content_id = doc.add_object(Stream::new(dictionary! {}, content.encode().unwrap()));
        let page_id = doc.add_object(dictionary! {
            "Type" => "Page",
            "Parent" => pages_id,
            "Contents" => content_id,
        });
        kids.push(page_id.into());
    }

    doc.objects.insert(
        pages_id,
        Object::Dictionary(dictionary! {
            "Type" => "Pages",
            "Kids" => kids,
            "Count" => pages as i64,
            "Resources" => resources_id,
            "MediaBox" => vec![0.into(), 0.into(), 612.into(), 792.into()],
        }),
    );
    let catalog_id = doc.add_object(dictionary! {
        "Type" => "Catalog",
        "Pages" => pages_id,
    });
    doc.trailer.set("Root", catalog_id);
    let info_id = doc.add_object(dictionary! {
        "Title" => Object::string_literal("Sample"),
        "Author" => Object::string_literal("Tester"),
    });
    doc.trailer.set("Info", info_id);

    let mut out = Vec::new();
    doc.save_to(&mut out).unwrap();
    out
}

pub fn page_count(bytes: &[u8]) -> usize {
    Document::load_mem(bytes).unwrap().get_pages().len()
}

pub fn page_text(bytes: &[u8], page: u32) -> String {
    Document::load_mem(bytes).unwrap().extract_text(&[page]).unwrap()
}

/// A small half-transparent red PNG.
pub fn sample_png() -> Vec<u8> {
    let bitmap = RgbaImage::from_pixel(8, 4, Rgba([255, 0, 0, 128]));
    let mut png = Vec::new();
    bitmap
        .write_to(&mut Cursor::new(&mut png), ImageFormat::Png)
        .unwrap();
    png
}

//=========================================================================================
// Stub Ports
//=========================================================================================

/// Returns a blank page instead of running `pdftoppm`.
pub struct BlankRasterizer;

#[async_trait]
impl Rasterizer for BlankRasterizer {
    async fn rasterize(&self, document: &Path, _page: u32, _dpi: u32) -> PortResult<RgbaImage> {
        assert!(document.exists(), "rasterizer called with a missing file");
        Ok(RgbaImage::from_pixel(100, 120, Rgba([255, 255, 255, 255])))
    }
}

pub struct NoGlyphs;

impl GlyphPainter for NoGlyphs {
    fn draw_text(&self, _: &mut RgbaImage, _: f32, _: f32, _: &str, _: f32, _: Rgba<u8>) {}
}

//=========================================================================================
// Application Fixture
//=========================================================================================

pub struct TestApp {
    pub root: tempfile::TempDir,
    pub router: Router,
    pub editor: Arc<DocumentEditor>,
}

pub async fn test_app() -> TestApp {
    test_app_with(|_| {}).await
}

/// Like [`test_app`], with `adjust` applied to the config before the router is built.
pub async fn test_app_with(adjust: impl FnOnce(&mut Config)) -> TestApp {
    let root = tempfile::tempdir().unwrap();
    let mut config = Config {
        upload_dir: root.path().join("uploads"),
        temp_dir: root.path().join("temp"),
        ..Config::default()
    };
    adjust(&mut config);
    let workspace = Workspace::new(&config.upload_dir, &config.temp_dir);
    workspace.prepare().await.unwrap();

    let store = Arc::new(LopdfDocumentStore::new());
    let registry = Arc::new(SessionRegistry::new(store.clone(), workspace));
    let editor = Arc::new(DocumentEditor::new(
        registry,
        store,
        Arc::new(BlankRasterizer),
        Arc::new(LopdfOverlayCompositor::new()),
        Arc::new(NoGlyphs),
    ));
    let state = Arc::new(AppState {
        editor: editor.clone(),
        config: Arc::new(config),
    });
    TestApp {
        root,
        router: web::router(state),
        editor,
    }
}

//=========================================================================================
// Requests
//=========================================================================================

pub enum Part<'a> {
    File {
        name: &'a str,
        filename: &'a str,
        bytes: &'a [u8],
    },
    Text {
        name: &'a str,
        value: &'a str,
    },
}

pub fn multipart_body(parts: &[Part<'_>]) -> Vec<u8> {
    let mut body = Vec::new();
    for part in parts {
        body.extend_from_slice(format!("--{BOUNDARY}\r\n").as_bytes());
        match part {
            Part::File {
                name,
                filename,
                bytes,
            } => {
                body.extend_from_slice(
                    format!(
                        "Content-Disposition: form-data; name=\"{name}\"; filename=\"{filename}\"\r\n\
                         Content-Type: application/octet-stream\r\n\r\n"
                    )
                    .as_bytes(),
                );
                body.extend_from_slice(bytes);
            }
            Part::Text { name, value } => {
                body.extend_from_slice(
                    format!("Content-Disposition: form-data; name=\"{name}\"\r\n\r\n{value}").as_bytes(),
                );
            }
        }
        body.extend_from_slice(b"\r\n");
    }
    body.extend_from_slice(format!("--{BOUNDARY}--\r\n").as_bytes());
    body
}

pub fn multipart_request(uri: &str, parts: &[Part<'_>]) -> Request<Body> {
    Request::post(uri)
        .header(
            "content-type",
            format!("multipart/form-data; boundary={BOUNDARY}"),
        )
        .body(Body::from(multipart_body(parts)))
        .unwrap()
}

pub fn json_request(method: &str, uri: &str, json: serde_json::Value) -> Request<Body> {
    Request::builder()
        .method(method)
        .uri(uri)
        .header("content-type", "application/json")
        .body(Body::from(json.to_string()))
        .unwrap()
}

pub fn empty_request(method: &str, uri: &str) -> Request<Body> {
    Request::builder()
        .method(method)
        .uri(uri)
        .body(Body::empty())
        .unwrap()
}

pub struct TestResponse {
    pub status: StatusCode,
    pub headers: axum::http::HeaderMap,
    pub body: Vec<u8>,
}

impl TestResponse {
    pub fn json(&self) -> serde_json::Value {
        serde_json::from_slice(&self.body).unwrap()
    }

    pub fn header(&self, name: &str) -> String {
        self.headers
            .get(name)
            .and_then(|v| v.to_str().ok())
            .unwrap_or_default()
            .to_string()
    }
}

pub async fn send(router: &Router, request: Request<Body>) -> TestResponse {
    let response = router.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let headers = response.headers().clone();
    let body = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap()
        .to_vec();
    TestResponse {
        status,
        headers,
        body,
    }
}

/// Uploads `pages` generated pages as `report.pdf` and returns the session id.
pub async fn upload(app: &TestApp, pages: usize) -> String {
    let pdf = sample_pdf(pages);
    let response = send(
        &app.router,
        multipart_request(
            "/api/upload",
            &[Part::File {
                name: "file",
                filename: "report.pdf",
                bytes: &pdf,
            }],
        ),
    )
    .await;
    assert_eq!(response.status, StatusCode::OK, "{:?}", String::from_utf8_lossy(&response.body));
    response.json()["session_id"].as_str().unwrap().to_string()
}
