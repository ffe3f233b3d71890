//! End-to-end tests of the HTTP routes against the real lopdf adapters.

mod common;

use axum::http::StatusCode;
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use common::*;
use serde_json::json;

#[tokio::test]
async fn upload_opens_a_session() {
    let app = test_app().await;
    let pdf = sample_pdf(3);
    let response = send(
        &app.router,
        multipart_request(
            "/api/upload",
            &[Part::File {
                name: "file",
                filename: "quarterly report.pdf",
                bytes: &pdf,
            }],
        ),
    )
    .await;

    assert_eq!(response.status, StatusCode::OK);
    let body = response.json();
    assert_eq!(body["num_pages"], 3);
    assert_eq!(body["filename"], "quarterly_report.pdf");
    let id = body["session_id"].as_str().unwrap();
    assert!(id.ends_with("_quarterly_report"));
    assert_eq!(app.editor.registry().len().await, 1);
}

#[tokio::test]
async fn upload_rejections() {
    let app = test_app().await;

    let missing = send(
        &app.router,
        multipart_request("/api/upload", &[Part::Text { name: "note", value: "no file" }]),
    )
    .await;
    assert_eq!(missing.status, StatusCode::BAD_REQUEST);
    assert_eq!(missing.json()["error"], "No file provided");

    let wrong_type = send(
        &app.router,
        multipart_request(
            "/api/upload",
            &[Part::File {
                name: "file",
                filename: "notes.txt",
                bytes: b"hello",
            }],
        ),
    )
    .await;
    assert_eq!(wrong_type.status, StatusCode::BAD_REQUEST);
    assert!(wrong_type.json()["error"].as_str().unwrap().contains("Invalid file type"));

    let corrupt = send(
        &app.router,
        multipart_request(
            "/api/upload",
            &[Part::File {
                name: "file",
                filename: "broken.pdf",
                bytes: b"%PDF-1.4 truncated",
            }],
        ),
    )
    .await;
    assert_eq!(corrupt.status, StatusCode::BAD_REQUEST);
    assert!(app.editor.registry().is_empty().await);
}

#[tokio::test]
async fn upload_accepts_names_without_ascii_letters() {
    let app = test_app().await;
    let pdf = sample_pdf(1);
    let response = send(
        &app.router,
        multipart_request(
            "/api/upload",
            &[Part::File {
                name: "file",
                filename: "日本語.pdf",
                bytes: &pdf,
            }],
        ),
    )
    .await;

    assert_eq!(response.status, StatusCode::OK, "{}", String::from_utf8_lossy(&response.body));
    assert_eq!(response.json()["filename"], "document.pdf");
    assert_eq!(response.json()["num_pages"], 1);
}

#[tokio::test]
async fn malformed_requests_get_json_errors() {
    let app = test_app().await;
    let id = upload(&app, 1).await;

    let not_json = json_request("POST", "/api/upload", json!({ "file": "report.pdf" }));
    for request in [
        empty_request("GET", &format!("/api/render/{id}/abc")),
        empty_request("GET", &format!("/api/render/{id}/1?dpi=lots")),
        empty_request("POST", &format!("/api/rotate/{id}/1/quarter")),
        not_json,
    ] {
        let response = send(&app.router, request).await;
        assert_eq!(response.status, StatusCode::BAD_REQUEST);
        assert_eq!(response.header("content-type"), "application/json");
        assert!(response.json()["error"].is_string());
    }
}

#[tokio::test]
async fn oversized_upload_is_payload_too_large() {
    let app = test_app_with(|config| config.max_upload_bytes = 1024).await;
    let pdf = sample_pdf(1);
    let padded = [pdf.as_slice(), &[b' '; 4096]].concat();
    let response = send(
        &app.router,
        multipart_request(
            "/api/upload",
            &[Part::File {
                name: "file",
                filename: "big.pdf",
                bytes: &padded,
            }],
        ),
    )
    .await;

    assert_eq!(response.status, StatusCode::PAYLOAD_TOO_LARGE);
    assert!(response.json()["error"].is_string());
    assert!(app.editor.registry().is_empty().await);
}

#[tokio::test]
async fn unknown_session_is_not_found() {
    let app = test_app().await;
    for request in [
        empty_request("GET", "/api/info/missing"),
        empty_request("GET", "/api/render/missing/1"),
        empty_request("POST", "/api/rotate/missing/1/90"),
        empty_request("DELETE", "/api/delete/missing/1"),
        empty_request("GET", "/api/download/missing"),
        json_request("POST", "/api/add-signature/missing/1", json!({ "signature": "" })),
    ] {
        let response = send(&app.router, request).await;
        assert_eq!(response.status, StatusCode::NOT_FOUND);
        assert_eq!(response.json()["error"], "Session not found");
    }
}

#[tokio::test]
async fn rotate_and_delete_pages() {
    let app = test_app().await;
    let id = upload(&app, 3).await;

    let rotated = send(&app.router, empty_request("POST", &format!("/api/rotate/{id}/2/90"))).await;
    assert_eq!(rotated.status, StatusCode::OK);
    assert_eq!(rotated.json()["success"], true);

    let odd = send(&app.router, empty_request("POST", &format!("/api/rotate/{id}/2/45"))).await;
    assert_eq!(odd.status, StatusCode::BAD_REQUEST);

    let out_of_range = send(&app.router, empty_request("POST", &format!("/api/rotate/{id}/4/90"))).await;
    assert_eq!(out_of_range.status, StatusCode::BAD_REQUEST);
    assert_eq!(out_of_range.json()["error"], "Invalid page number");

    let deleted = send(&app.router, empty_request("DELETE", &format!("/api/delete/{id}/2"))).await;
    assert_eq!(deleted.status, StatusCode::OK);
    assert_eq!(deleted.json()["num_pages"], 2);

    let text = send(&app.router, empty_request("GET", &format!("/api/extract-text/{id}/2"))).await;
    assert_eq!(text.status, StatusCode::OK);
    assert!(text.json()["text"].as_str().unwrap().contains("Page 3"));

    let info = send(&app.router, empty_request("GET", &format!("/api/info/{id}"))).await;
    let info = info.json();
    assert_eq!(info["num_pages"], 2);
    assert_eq!(info["filename"], "report.pdf");
    assert_eq!(info["title"], "Sample");
    assert_eq!(info["author"], "Tester");
    assert_eq!(info["creator"], "Unknown");
    assert!(info["file_size"].as_u64().unwrap() > 0);
}

#[tokio::test]
async fn render_returns_a_png_data_url() {
    let app = test_app().await;
    let id = upload(&app, 2).await;

    let annotate = send(
        &app.router,
        json_request(
            "POST",
            &format!("/api/annotate/{id}"),
            json!({ "page": 1, "type": "highlight", "x": 10, "y": 10, "width": 20, "height": 5 }),
        ),
    )
    .await;
    assert_eq!(annotate.status, StatusCode::OK);

    let rendered = send(&app.router, empty_request("GET", &format!("/api/render/{id}/1?dpi=9999"))).await;
    assert_eq!(rendered.status, StatusCode::OK);
    let body = rendered.json();
    assert_eq!(body["width"], 100);
    assert_eq!(body["height"], 120);
    let data = body["image"]
        .as_str()
        .unwrap()
        .strip_prefix("data:image/png;base64,")
        .unwrap();
    let png = image::load_from_memory(&BASE64.decode(data).unwrap()).unwrap().to_rgba8();
    // Yellow highlight over white leaves the blue channel reduced inside the box.
    assert!(png.get_pixel(15, 12).0[2] < 255);
    assert_eq!(png.get_pixel(50, 50).0, [255, 255, 255, 255]);

    let invalid = send(&app.router, empty_request("GET", &format!("/api/render/{id}/3"))).await;
    assert_eq!(invalid.status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn annotation_validation() {
    let app = test_app().await;
    let id = upload(&app, 1).await;

    let beyond_end = send(
        &app.router,
        json_request(
            "POST",
            &format!("/api/annotate/{id}"),
            json!({ "page": 7, "type": "text", "x": 1, "y": 1, "text": "later" }),
        ),
    )
    .await;
    assert_eq!(beyond_end.status, StatusCode::OK);

    let unknown_kind = send(
        &app.router,
        json_request(
            "POST",
            &format!("/api/annotate/{id}"),
            json!({ "page": 1, "type": "scribble", "x": 1, "y": 1 }),
        ),
    )
    .await;
    assert_eq!(unknown_kind.status, StatusCode::BAD_REQUEST);

    let missing_fields = send(
        &app.router,
        json_request("POST", &format!("/api/annotate/{id}"), json!({ "page": 1 })),
    )
    .await;
    assert_eq!(missing_fields.status, StatusCode::BAD_REQUEST);
    assert!(missing_fields.json()["error"].is_string());
}

#[tokio::test]
async fn download_without_edits_is_the_upload() {
    let app = test_app().await;
    let pdf = sample_pdf(2);
    let uploaded = send(
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
    let id = uploaded.json()["session_id"].as_str().unwrap().to_string();

    let download = send(&app.router, empty_request("GET", &format!("/api/download/{id}"))).await;
    assert_eq!(download.status, StatusCode::OK);
    assert_eq!(download.header("content-type"), "application/pdf");
    assert_eq!(download.header("content-disposition"), "attachment; filename=\"report.pdf\"");
    assert_eq!(download.body, pdf);
}

#[tokio::test]
async fn download_writes_queued_text() {
    let app = test_app().await;
    let id = upload(&app, 2).await;

    let queued = send(
        &app.router,
        json_request(
            "POST",
            &format!("/api/add-text/{id}/2"),
            json!({ "text": "Signed off", "x": 72, "y": 72, "color": "#0000ff" }),
        ),
    )
    .await;
    assert_eq!(queued.status, StatusCode::OK);

    let download = send(&app.router, empty_request("GET", &format!("/api/download/{id}"))).await;
    assert_eq!(download.status, StatusCode::OK);
    assert_eq!(
        download.header("content-disposition"),
        "attachment; filename=\"edited_report.pdf\""
    );
    assert_eq!(page_count(&download.body), 2);
    assert!(page_text(&download.body, 2).contains("Signed off"));
    assert!(!page_text(&download.body, 1).contains("Signed off"));
}

#[tokio::test]
async fn merge_and_fetch_output() {
    let app = test_app().await;
    let (first, second) = (sample_pdf(2), sample_pdf(3));
    let merged = send(
        &app.router,
        multipart_request(
            "/api/merge",
            &[
                Part::File {
                    name: "files",
                    filename: "a.pdf",
                    bytes: &first,
                },
                Part::File {
                    name: "files",
                    filename: "readme.txt",
                    bytes: b"skipped",
                },
                Part::File {
                    name: "files",
                    filename: "b.pdf",
                    bytes: &second,
                },
            ],
        ),
    )
    .await;
    assert_eq!(merged.status, StatusCode::OK);
    assert_eq!(page_count(&merged.body), 5);
    let disposition = merged.header("content-disposition");
    let filename = disposition
        .strip_prefix("attachment; filename=\"")
        .and_then(|rest| rest.strip_suffix('"'))
        .unwrap();
    assert!(filename.starts_with("merged_"));

    let fetched = send(&app.router, empty_request("GET", &format!("/api/files/{filename}"))).await;
    assert_eq!(fetched.status, StatusCode::OK);
    assert_eq!(fetched.body, merged.body);
}

#[tokio::test]
async fn merge_needs_two_pdfs() {
    let app = test_app().await;
    let only = sample_pdf(1);
    let response = send(
        &app.router,
        multipart_request(
            "/api/merge",
            &[
                Part::File {
                    name: "files",
                    filename: "a.pdf",
                    bytes: &only,
                },
                Part::File {
                    name: "files",
                    filename: "b.docx",
                    bytes: &only,
                },
            ],
        ),
    )
    .await;
    assert_eq!(response.status, StatusCode::BAD_REQUEST);

    let nothing = send(
        &app.router,
        multipart_request("/api/merge", &[Part::Text { name: "note", value: "no files" }]),
    )
    .await;
    assert_eq!(nothing.status, StatusCode::BAD_REQUEST);
    assert_eq!(nothing.json()["error"], "No files provided");
}

#[tokio::test]
async fn split_writes_one_file_per_range() {
    let app = test_app().await;
    let id = upload(&app, 3).await;

    let split = send(
        &app.router,
        json_request(
            "POST",
            &format!("/api/split/{id}"),
            json!({ "ranges": [[1, 2], [3, 3], [8, 9]] }),
        ),
    )
    .await;
    assert_eq!(split.status, StatusCode::OK);
    let files: Vec<String> = split.json()["files"]
        .as_array()
        .unwrap()
        .iter()
        .map(|f| f.as_str().unwrap().to_string())
        .collect();
    assert_eq!(files.len(), 3);

    let mut counts = Vec::new();
    for file in &files {
        let fetched = send(&app.router, empty_request("GET", &format!("/api/files/{file}"))).await;
        assert_eq!(fetched.status, StatusCode::OK);
        counts.push(page_count(&fetched.body));
    }
    assert_eq!(counts, vec![2, 1, 0]);

    let missing = send(&app.router, empty_request("GET", "/api/files/nothing_here.pdf")).await;
    assert_eq!(missing.status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn images_and_signatures_are_burned_in() {
    let app = test_app().await;
    let id = upload(&app, 2).await;
    let png = sample_png();

    let image = send(
        &app.router,
        multipart_request(
            &format!("/api/add-image/{id}/1"),
            &[
                Part::File {
                    name: "image",
                    filename: "logo.png",
                    bytes: &png,
                },
                Part::Text {
                    name: "x",
                    value: "50",
                },
                Part::Text {
                    name: "width",
                    value: "80",
                },
            ],
        ),
    )
    .await;
    assert_eq!(image.status, StatusCode::OK, "{}", String::from_utf8_lossy(&image.body));

    let no_image = send(
        &app.router,
        multipart_request(&format!("/api/add-image/{id}/1"), &[Part::Text { name: "x", value: "1" }]),
    )
    .await;
    assert_eq!(no_image.status, StatusCode::BAD_REQUEST);
    assert_eq!(no_image.json()["error"], "No image provided");

    let signature = send(
        &app.router,
        json_request(
            "POST",
            &format!("/api/add-signature/{id}/2"),
            json!({ "signature": format!("data:image/png;base64,{}", BASE64.encode(&png)), "x": 100, "y": 600 }),
        ),
    )
    .await;
    assert_eq!(signature.status, StatusCode::OK);

    let snapshot = app.editor.registry().snapshot(&id).await.unwrap();
    assert_eq!(snapshot.page_count, 2);
    assert_eq!(snapshot.pending_images[&1].len(), 1);
    assert!(snapshot.pending_images[&2][0].is_signature);
}

#[tokio::test]
async fn malformed_signature_is_rejected_without_changes() {
    let app = test_app().await;
    let id = upload(&app, 1).await;
    let before = app.editor.registry().snapshot(&id).await.unwrap();
    let bytes_before = std::fs::read(&before.source_path).unwrap();

    let response = send(
        &app.router,
        json_request(
            "POST",
            &format!("/api/add-signature/{id}/1"),
            json!({ "signature": "***not base64***" }),
        ),
    )
    .await;
    assert_eq!(response.status, StatusCode::BAD_REQUEST);

    let after = app.editor.registry().snapshot(&id).await.unwrap();
    assert!(after.pending_images.is_empty());
    assert_eq!(after.page_count, 1);
    assert_eq!(std::fs::read(&after.source_path).unwrap(), bytes_before);
}

#[tokio::test]
async fn destroyed_session_is_gone() {
    let app = test_app().await;
    let id = upload(&app, 1).await;
    let source = app.editor.registry().snapshot(&id).await.unwrap().source_path;

    let destroyed = send(&app.router, empty_request("DELETE", &format!("/api/session/{id}"))).await;
    assert_eq!(destroyed.status, StatusCode::OK);
    assert!(!source.exists());

    let again = send(&app.router, empty_request("DELETE", &format!("/api/session/{id}"))).await;
    assert_eq!(again.status, StatusCode::NOT_FOUND);
}
