//! HTTP transport: WebSocket upgrade, document pages, and static assets.
//!
//! The hub and the OT core are transport-agnostic; everything in this
//! module is the outer surface: URL routing, document-ID validation, the
//! `Origin` allowlist, and the handoff from an upgraded socket to the
//! per-connection pumps in [`ws`].

mod ws;

use std::path::PathBuf;
use std::sync::Arc;

use axum::extract::ws::WebSocketUpgrade;
use axum::extract::{Path, State};
use axum::http::{header, HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::Router;
use thiserror::Error;
use tokio::net::TcpListener;
use tower_http::services::ServeDir;
use tracing::info;

use crate::hub::participant::MAX_FRAME_SIZE;
use crate::hub::Hub;

/// Server configuration, fixed at process start.
#[derive(Clone, Debug)]
pub struct ServerConfig {
    /// Address to bind, `host:port`.
    pub listen_addr: String,
    /// Directory the UI assets are served from.
    pub static_dir: PathBuf,
    /// Origins allowed to open WebSocket connections. An empty list allows
    /// any origin; a request without an `Origin` header (same-origin or a
    /// non-browser caller) is always accepted.
    pub allowed_origins: Vec<String>,
    /// Whether the binary installs a tracing subscriber.
    pub log: bool,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            listen_addr: "0.0.0.0:8080".to_string(),
            static_dir: PathBuf::from("static"),
            allowed_origins: Vec::new(),
            log: true,
        }
    }
}

impl ServerConfig {
    /// Configuration listening on the given address.
    pub fn with_listen_addr(addr: impl Into<String>) -> Self {
        Self {
            listen_addr: addr.into(),
            ..Default::default()
        }
    }
}

/// Transport-level failures.
#[derive(Debug, Error)]
pub enum ServerError {
    #[error("failed to bind {0}: {1}")]
    Bind(String, #[source] std::io::Error),
    #[error("server error: {0}")]
    Serve(#[source] std::io::Error),
}

#[derive(Clone)]
struct AppState {
    hub: Hub,
    config: Arc<ServerConfig>,
}

/// Build the application router for the given hub and configuration.
pub fn router(hub: Hub, config: ServerConfig) -> Router {
    let static_dir = config.static_dir.clone();
    let state = AppState {
        hub,
        config: Arc::new(config),
    };
    Router::new()
        .route("/ws/:document_id", get(ws_upgrade))
        .route("/doc/:document_id", get(doc_page))
        .fallback_service(ServeDir::new(static_dir))
        .with_state(state)
}

/// Run the hub and the HTTP server until Ctrl-C, then shut both down.
pub async fn run(config: ServerConfig) -> Result<(), ServerError> {
    let hub = Hub::new();
    let hub_task = tokio::spawn({
        let hub = hub.clone();
        async move { hub.run().await }
    });

    let listener = TcpListener::bind(&config.listen_addr)
        .await
        .map_err(|e| ServerError::Bind(config.listen_addr.clone(), e))?;
    info!("listening on {}", config.listen_addr);

    let app = router(hub.clone(), config);
    axum::serve(listener, app)
        .with_graceful_shutdown(async {
            let _ = tokio::signal::ctrl_c().await;
            info!("interrupt received, shutting down");
        })
        .await
        .map_err(ServerError::Serve)?;

    hub.shutdown();
    let _ = hub_task.await;
    Ok(())
}

async fn ws_upgrade(
    ws: WebSocketUpgrade,
    Path(document_id): Path<String>,
    headers: HeaderMap,
    State(state): State<AppState>,
) -> Response {
    if !is_valid_document_id(&document_id) {
        return (StatusCode::BAD_REQUEST, "invalid document id").into_response();
    }
    if !origin_allowed(&headers, &state.config.allowed_origins) {
        return (StatusCode::FORBIDDEN, "origin not allowed").into_response();
    }

    let hub = state.hub.clone();
    ws.max_message_size(MAX_FRAME_SIZE)
        .on_upgrade(move |socket| ws::handle_socket(socket, hub, document_id))
}

async fn doc_page(
    Path(document_id): Path<String>,
    State(state): State<AppState>,
) -> Response {
    if !is_valid_document_id(&document_id) {
        return (StatusCode::BAD_REQUEST, "invalid document id").into_response();
    }
    let path = state.config.static_dir.join("doc.html");
    match tokio::fs::read(&path).await {
        Ok(body) => (
            [(header::CONTENT_TYPE, "text/html; charset=utf-8")],
            body,
        )
            .into_response(),
        Err(_) => StatusCode::NOT_FOUND.into_response(),
    }
}

/// Document IDs are 1-100 characters of `[A-Za-z0-9_-]`.
pub fn is_valid_document_id(id: &str) -> bool {
    !id.is_empty()
        && id.len() <= 100
        && id
            .bytes()
            .all(|b| b.is_ascii_alphanumeric() || b == b'-' || b == b'_')
}

fn origin_allowed(headers: &HeaderMap, allowed: &[String]) -> bool {
    let Some(origin) = headers.get(header::ORIGIN) else {
        return true;
    };
    if allowed.is_empty() {
        return true;
    }
    match origin.to_str() {
        Ok(origin) => allowed.iter().any(|candidate| candidate == origin),
        Err(_) => false,
    }
}
