//! Browser front-end: one HTML page with three input tabs (URL, file, base64)
//! backed by a small JSON API.
//!
//! Routes:
//!
//! | Method | Path                   | Body                         |
//! |--------|------------------------|------------------------------|
//! | GET    | `/`                    | —                            |
//! | GET    | `/health`              | —                            |
//! | POST   | `/api/analyze/url`     | JSON [`routes::UrlRequest`]  |
//! | POST   | `/api/analyze/file`    | multipart, field `file`      |
//! | POST   | `/api/analyze/base64`  | JSON [`routes::Base64Request`] |
//!
//! Every analyze route answers `200` with `{result, image}` even when the
//! analysis failed; only malformed requests get an error status.

pub mod error;
pub mod routes;

use crate::analyze::Analyzer;
use axum::extract::DefaultBodyLimit;
use axum::routing::{get, post};
use axum::Router;
use std::net::SocketAddr;
use std::sync::Arc;
use tower_http::trace::TraceLayer;

/// Largest accepted request body (uploads include multipart overhead).
pub const MAX_BODY_BYTES: usize = 64 * 1024 * 1024;

/// Shared handler state.
pub struct AppState {
    pub analyzer: Arc<Analyzer>,
    pub model_name: String,
}

/// Build the application router.
pub fn router(analyzer: Arc<Analyzer>, model_name: impl Into<String>) -> Router {
    let state = Arc::new(AppState {
        analyzer,
        model_name: model_name.into(),
    });

    Router::new()
        .route("/", get(routes::index))
        .route("/health", get(routes::health))
        .route("/api/analyze/url", post(routes::analyze_url))
        .route("/api/analyze/file", post(routes::analyze_file))
        .route("/api/analyze/base64", post(routes::analyze_base64))
        .layer(DefaultBodyLimit::max(MAX_BODY_BYTES))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Bind `addr` and serve until ctrl-c.
pub async fn serve(app: Router, addr: SocketAddr) -> std::io::Result<()> {
    let listener = tokio::net::TcpListener::bind(addr).await?;
    tracing::info!(addr = %listener.local_addr()?, "Server listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(async {
            let _ = tokio::signal::ctrl_c().await;
            tracing::info!("Shutdown requested");
        })
        .await
}
