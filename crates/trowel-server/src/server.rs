//! Development server implementation.

use std::net::SocketAddr;
use std::path::Path;
use std::sync::Arc;

use axum::{
    body::{to_bytes, Body},
    extract::{
        ws::{Message, WebSocket, WebSocketUpgrade},
        Request, State,
    },
    http::{header, StatusCode},
    middleware::{self, Next},
    response::{IntoResponse, Response},
    routing::get,
    Router,
};
use tokio::sync::broadcast::error::RecvError;
use tower_http::services::ServeDir;
use trowel_pipelines::Pipelines;

use crate::orchestrator::{Orchestrator, SubscriptionRegistry};
use crate::reload::{client_script, ReloadHub, ReloadMessage};
use crate::watcher::{existing_roots, FileWatcher};

const SOCKET_PATH: &str = "/__livereload";
const SCRIPT_PATH: &str = "/__livereload.js";

/// Configuration for the development server.
#[derive(Debug, Clone)]
pub struct DevServerConfig {
    /// Port to listen on
    pub port: u16,

    /// Host to bind to
    pub host: String,

    /// Open browser on start
    pub open: bool,
}

impl Default for DevServerConfig {
    fn default() -> Self {
        Self {
            port: 3000,
            host: "127.0.0.1".to_string(),
            open: true,
        }
    }
}

/// Errors that can occur with the server.
#[derive(Debug, thiserror::Error)]
pub enum ServerError {
    #[error("Invalid address {0}")]
    InvalidAddress(String),

    #[error("Failed to bind to {0}: {1}")]
    BindError(SocketAddr, String),

    #[error("File watch error: {0}")]
    WatchError(String),

    #[error("Server error: {0}")]
    ServeError(String),
}

struct ServerState {
    hub: ReloadHub,
}

/// Development server: static files, live reload and source watching.
pub struct DevServer {
    config: DevServerConfig,
    pipelines: Arc<Pipelines>,
    hub: ReloadHub,
}

impl DevServer {
    pub fn new(config: DevServerConfig, pipelines: Arc<Pipelines>, hub: ReloadHub) -> Self {
        Self {
            config,
            pipelines,
            hub,
        }
    }

    /// Start watching and serving. Runs until the process exits.
    pub async fn start(self) -> Result<(), ServerError> {
        let address = format!("{}:{}", self.config.host, self.config.port);
        let addr: SocketAddr = address
            .parse()
            .map_err(|_| ServerError::InvalidAddress(address.clone()))?;

        let registry = SubscriptionRegistry::from_paths(self.pipelines.paths())
            .map_err(|e| ServerError::WatchError(e.to_string()))?;
        let watch_roots = existing_roots(
            &registry.watch_roots(self.pipelines.root()),
            self.pipelines.root(),
        );

        let (watcher, rx) =
            FileWatcher::new(&watch_roots).map_err(|e| ServerError::WatchError(e.to_string()))?;

        let serve_root = self.pipelines.resolve(&self.pipelines.paths().serve_root);
        let orchestrator = Orchestrator::new(self.pipelines, registry, self.hub.clone());
        tokio::spawn(async move {
            orchestrator.run(rx).await;
            // Keep watcher alive
            drop(watcher);
        });

        let app = router(&serve_root, self.hub);

        let listener = tokio::net::TcpListener::bind(addr)
            .await
            .map_err(|e| ServerError::BindError(addr, e.to_string()))?;

        let url = format!("http://{}", addr);
        tracing::info!("Serving {} at {}", serve_root.display(), url);

        if self.config.open {
            if let Err(e) = open::that(&url) {
                tracing::warn!("Could not open browser: {}", e);
            }
        }

        axum::serve(listener, app)
            .await
            .map_err(|e| ServerError::ServeError(e.to_string()))
    }
}

/// Routes for serving `serve_root` with the live-reload client injected.
pub fn router(serve_root: &Path, hub: ReloadHub) -> Router {
    let state = Arc::new(ServerState { hub });

    Router::new()
        .route(SOCKET_PATH, get(ws_handler))
        .route(SCRIPT_PATH, get(client_script_handler))
        .fallback_service(ServeDir::new(serve_root))
        .layer(middleware::from_fn(inject_client))
        .with_state(state)
}

/// Insert the live-reload client before the closing body tag.
///
/// Documents without a body tag get the client appended.
pub fn inject_script(html: &str) -> String {
    let tag = format!(r#"<script src="{}"></script>"#, SCRIPT_PATH);

    match html.to_ascii_lowercase().rfind("</body>") {
        Some(index) => format!("{}{}{}", &html[..index], tag, &html[index..]),
        None => format!("{}{}", html, tag),
    }
}

/// Middleware that rewrites successful HTML responses.
async fn inject_client(request: Request, next: Next) -> Response {
    let response = next.run(request).await;

    let is_html = response.status() == StatusCode::OK
        && response
            .headers()
            .get(header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .is_some_and(|v| v.starts_with("text/html"));

    if !is_html {
        return response;
    }

    let (mut parts, body) = response.into_parts();
    let bytes = match to_bytes(body, usize::MAX).await {
        Ok(bytes) => bytes,
        Err(e) => {
            tracing::warn!("Failed to read page body: {}", e);
            return StatusCode::INTERNAL_SERVER_ERROR.into_response();
        }
    };

    match inject_into_body(&bytes) {
        Some(html) => {
            parts.headers.remove(header::CONTENT_LENGTH);
            Response::from_parts(parts, Body::from(html))
        }
        None => {
            tracing::debug!("Serving non-UTF-8 page without live reload");
            Response::from_parts(parts, Body::from(bytes))
        }
    }
}

/// Inject the client into a page body. Bodies that are not UTF-8 are left
/// alone.
fn inject_into_body(bytes: &[u8]) -> Option<String> {
    std::str::from_utf8(bytes).ok().map(inject_script)
}

async fn ws_handler(
    ws: WebSocketUpgrade,
    State(state): State<Arc<ServerState>>,
) -> impl IntoResponse {
    ws.on_upgrade(move |socket| handle_ws(socket, state))
}

async fn handle_ws(mut socket: WebSocket, state: Arc<ServerState>) {
    let mut rx = state.hub.subscribe();

    if send(&mut socket, &ReloadMessage::Connected).await.is_err() {
        return;
    }

    loop {
        match rx.recv().await {
            Ok(msg) => {
                if send(&mut socket, &msg).await.is_err() {
                    break;
                }
            }
            Err(RecvError::Lagged(skipped)) => {
                tracing::debug!("Live reload client skipped {} messages", skipped);
            }
            Err(RecvError::Closed) => break,
        }
    }
}

async fn send(socket: &mut WebSocket, msg: &ReloadMessage) -> Result<(), axum::Error> {
    let json = match serde_json::to_string(msg) {
        Ok(json) => json,
        Err(e) => {
            tracing::warn!("Failed to encode reload message: {}", e);
            return Ok(());
        }
    };
    socket.send(Message::Text(json.into())).await
}

async fn client_script_handler() -> impl IntoResponse {
    (
        [(header::CONTENT_TYPE, "application/javascript")],
        client_script(SOCKET_PATH),
    )
}
