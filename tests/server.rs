//! HTTP API tests: requests go through the full router with stubbed
//! PDF and model collaborators, no sockets involved.

mod common;

use axum::body::Body;
use axum::http::{header, Request, StatusCode};
use axum::Router;
use base64::{engine::general_purpose::STANDARD, Engine as _};
use common::*;
use doc_analyzer::server;
use image::{DynamicImage, ImageFormat, Rgb, Rgb32FImage};
use serde_json::{json, Value};
use tower::ServiceExt;

// ── Test helpers ─────────────────────────────────────────────────────────────

const BOUNDARY: &str = "XdocAnalyzerBoundaryX";

fn app(h: &Harness) -> Router {
    server::router(h.analyzer.clone(), "stub-model")
}

async fn send(app: Router, req: Request<Body>) -> (StatusCode, Value) {
    let resp = app.oneshot(req).await.unwrap();
    let status = resp.status();
    let bytes = axum::body::to_bytes(resp.into_body(), usize::MAX).await.unwrap();
    let body = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
    (status, body)
}

fn post_json(uri: &str, body: Value) -> Request<Body> {
    Request::post(uri)
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

/// Build a multipart body: an optional file part followed by text fields.
fn multipart(file: Option<(&str, &[u8])>, fields: &[(&str, &str)]) -> Request<Body> {
    let mut body = Vec::new();
    if let Some((name, bytes)) = file {
        body.extend_from_slice(
            format!(
                "--{BOUNDARY}\r\nContent-Disposition: form-data; name=\"file\"; filename=\"{name}\"\r\n\
                 Content-Type: application/octet-stream\r\n\r\n"
            )
            .as_bytes(),
        );
        body.extend_from_slice(bytes);
        body.extend_from_slice(b"\r\n");
    }
    for (name, value) in fields {
        body.extend_from_slice(
            format!(
                "--{BOUNDARY}\r\nContent-Disposition: form-data; name=\"{name}\"\r\n\r\n{value}\r\n"
            )
            .as_bytes(),
        );
    }
    body.extend_from_slice(format!("--{BOUNDARY}--\r\n").as_bytes());

    Request::post("/api/analyze/file")
        .header(
            header::CONTENT_TYPE,
            format!("multipart/form-data; boundary={BOUNDARY}"),
        )
        .body(Body::from(body))
        .unwrap()
}

// ── Page and health ──────────────────────────────────────────────────────────

#[tokio::test]
async fn health_reports_model() {
    let h = Harness::new();
    let req = Request::get("/health").body(Body::empty()).unwrap();
    let (status, body) = send(app(&h), req).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "ok");
    assert_eq!(body["model"], "stub-model");
}

#[tokio::test]
async fn index_serves_three_tabs() {
    let h = Harness::new();
    let resp = app(&h)
        .oneshot(Request::get("/").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
    let bytes = axum::body::to_bytes(resp.into_body(), usize::MAX).await.unwrap();
    let html = String::from_utf8_lossy(&bytes);
    for tab in ["PDF URL", "Upload File", "Direct Base64"] {
        assert!(html.contains(tab), "missing tab {tab}");
    }
}

// ── Base64 ───────────────────────────────────────────────────────────────────

#[tokio::test]
async fn base64_returns_text_and_preview() {
    let h = Harness::new();
    let req = post_json(
        "/api/analyze/base64",
        json!({
            "image_base64": STANDARD.encode(png_bytes(10, 6)),
            "num_return_sequences": 2,
            "temperature": 0.2,
        }),
    );
    let (status, body) = send(app(&h), req).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["result"], "t100");
    assert!(body["image"]
        .as_str()
        .unwrap()
        .starts_with("data:image/png;base64,"));
    assert!(body.get("error").is_none());

    let calls = h.model.calls.lock().unwrap();
    assert_eq!(calls[0].num_return_sequences, 2);
    assert!((calls[0].temperature - 0.2).abs() < 1e-6);
}

#[tokio::test]
async fn base64_garbage_is_reported_in_result() {
    let h = Harness::new();
    let req = post_json("/api/analyze/base64", json!({ "image": "!!not-base64!!" }));
    let (status, body) = send(app(&h), req).await;

    assert_eq!(status, StatusCode::OK);
    assert!(body["result"]
        .as_str()
        .unwrap()
        .starts_with("Error: Could not decode image"));
    assert!(body["image"].is_null());
    assert_eq!(body["error"], "decode_error");
}

// ── Upload ───────────────────────────────────────────────────────────────────

#[tokio::test]
async fn upload_pdf_with_page_field() {
    let h = Harness::new();
    let req = multipart(Some(("paper.pdf", FAKE_PDF)), &[("page_number", "2")]);
    let (status, body) = send(app(&h), req).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["result"], "t100");
    assert!(body["image"].is_string());
    assert_eq!(h.leftovers(), 0);
}

#[tokio::test]
async fn upload_unsupported_format() {
    let h = Harness::new();
    let req = multipart(Some(("notes.txt", b"hello")), &[]);
    let (status, body) = send(app(&h), req).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(
        body["result"],
        "Unsupported file format: .txt. Please use PDF or images (JPG, PNG, etc.)"
    );
    assert!(body["image"].is_null());
}

#[tokio::test]
async fn upload_without_file_is_bad_request() {
    let h = Harness::new();
    let req = multipart(None, &[("page_number", "1")]);
    let (status, body) = send(app(&h), req).await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"]["code"], "BAD_REQUEST");
    assert_eq!(body["error"]["message"], "No file provided.");
}

#[tokio::test]
async fn upload_with_bad_number_is_bad_request() {
    let h = Harness::new();
    let req = multipart(Some(("scan.png", &png_bytes(4, 4))), &[("max_new_tokens", "lots")]);
    let (status, body) = send(app(&h), req).await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["error"]["message"]
        .as_str()
        .unwrap()
        .contains("max_new_tokens"));
}

#[tokio::test]
async fn float_tiff_upload_gets_a_preview() {
    let h = Harness::new();
    let float = DynamicImage::ImageRgb32F(Rgb32FImage::from_pixel(6, 4, Rgb([0.25, 0.5, 1.0])));
    let tiff = image_bytes(&float, ImageFormat::Tiff);
    let req = multipart(Some(("scan.tif", &tiff)), &[]);
    let (status, body) = send(app(&h), req).await;

    assert_eq!(status, StatusCode::OK);
    assert!(body.get("error").is_none(), "{body}");
    let preview = body["image"].as_str().unwrap();
    let png = STANDARD
        .decode(preview.trim_start_matches("data:image/png;base64,"))
        .unwrap();
    let back = image::load_from_memory(&png).unwrap();
    assert_eq!((back.width(), back.height()), (6, 4));
}

#[tokio::test]
async fn truncated_field_is_bad_request() {
    let h = Harness::new();
    let body = format!(
        "--{BOUNDARY}\r\nContent-Disposition: form-data; name=\"page_number\"\r\n\r\n12"
    );
    let req = Request::post("/api/analyze/file")
        .header(
            header::CONTENT_TYPE,
            format!("multipart/form-data; boundary={BOUNDARY}"),
        )
        .body(Body::from(body))
        .unwrap();
    let (status, body) = send(app(&h), req).await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    let message = body["error"]["message"].as_str().unwrap_or_default();
    assert!(!message.starts_with("invalid value"), "{message}");
    assert_ne!(message, "No file provided.");
    assert!(h.model.calls.lock().unwrap().is_empty());
}

// ── URL ──────────────────────────────────────────────────────────────────────

#[tokio::test]
async fn url_that_is_not_http_is_a_download_error() {
    let h = Harness::new();
    let req = post_json(
        "/api/analyze/url",
        json!({ "url": "ftp://example.com/a.pdf", "page_number": 0 }),
    );
    let (status, body) = send(app(&h), req).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["error"], "download_error");
    assert!(body["image"].is_null());
}
