//! HTTP request adapter.
//!
//! ```text
//! POST /version                          → 200 "<flirc_util version output>"
//! POST /cgi-bin/sendir?csv=500,200,900   → 200 "<sendir output>"
//! POST /ir-ctl-send?keymap=tv&keycode=KEY_POWER
//! POST /restart                          → 204 (empty)
//! POST /unknown-cmd                      → 404
//! GET  /index.html                       → static file under the document root
//! GET  /some/dir/                        → index.html if present, else 404
//! ```
//!
//! Every response carries `Server: flirc-bridge/<version>`.
//!
//! # Request → Command
//!
//! The command name is the request path with its leading `/` and an optional
//! `cgi-bin/` segment removed, then percent-decoded.  Flags are the query
//! pairs in the order they appear; repeated keys are kept and pairs with an
//! empty value are dropped.
//!
//! # Static files
//!
//! Non-POST requests fall back to a minimal static-file server rooted at the
//! configured document root.  Directory listings are never produced.

use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::Context;
use axum::body::Body;
use axum::extract::State;
use axum::http::{header, HeaderValue, Method, StatusCode, Uri};
use axum::middleware;
use axum::response::{IntoResponse, Response};
use axum::Router;
use tracing::{debug, info, warn};

use crate::application::normalizer::CommandDispatcher;
use crate::domain::command::{Command, CommandOutcome};
use crate::domain::percent::{parse_query_pairs, percent_decode};

/// Value of the `Server` response header.
pub const SERVER_NAME: &str = concat!("flirc-bridge/", env!("CARGO_PKG_VERSION"));

/// Optional path segment accepted in front of command names.
const CGI_PREFIX: &str = "cgi-bin/";

/// Files tried, in order, when a directory is requested.
const INDEX_FILES: &[&str] = &["index.html", "index.htm"];

/// Shared state for the request handler.
#[derive(Clone)]
struct HttpState {
    dispatcher: Arc<dyn CommandDispatcher>,
    static_root: Arc<PathBuf>,
}

/// Builds the router for the request adapter.
///
/// Exposed separately from [`serve`] so tests can drive it without a socket.
pub fn router(dispatcher: Arc<dyn CommandDispatcher>, static_root: PathBuf) -> Router {
    let state = HttpState {
        dispatcher,
        static_root: Arc::new(static_root),
    };

    Router::new()
        .fallback(handle_request)
        .with_state(state)
        .layer(middleware::map_response(add_server_header))
}

/// Binds `addr` and serves the request adapter until `shutdown` turns `true`.
///
/// # Errors
///
/// Returns an error if the listener cannot be bound or the server fails.
pub async fn serve(
    addr: SocketAddr,
    dispatcher: Arc<dyn CommandDispatcher>,
    static_root: PathBuf,
    shutdown: tokio::sync::watch::Receiver<bool>,
) -> anyhow::Result<()> {
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("failed to bind HTTP listener on {addr}"))?;

    info!("HTTP adapter listening on {addr}");

    let app = router(dispatcher, static_root);
    let mut shutdown = shutdown;
    axum::serve(listener, app)
        .with_graceful_shutdown(async move {
            let _ = shutdown.wait_for(|&stop| stop).await;
        })
        .await
        .context("HTTP server error")
}

// ── Handlers ──────────────────────────────────────────────────────────────────

async fn handle_request(State(state): State<HttpState>, method: Method, uri: Uri) -> Response {
    match method {
        Method::POST => handle_command(&state, &uri).await,
        Method::GET => serve_static(&state.static_root, uri.path(), false).await,
        Method::HEAD => serve_static(&state.static_root, uri.path(), true).await,
        _ => (StatusCode::NOT_IMPLEMENTED, "Unsupported method").into_response(),
    }
}

async fn handle_command(state: &HttpState, uri: &Uri) -> Response {
    let command = command_from_uri(uri);
    debug!("POST {} -> {:?}", uri.path(), command.name);

    match state.dispatcher.dispatch(command).await {
        Ok(outcome) => outcome_response(outcome),
        Err(e) => {
            warn!("POST {}: {e}", uri.path());
            (StatusCode::SERVICE_UNAVAILABLE, e.to_string()).into_response()
        }
    }
}

/// Decodes a request URI into a [`Command`].
pub fn command_from_uri(uri: &Uri) -> Command {
    let path = uri.path();
    let path = path.strip_prefix('/').unwrap_or(path);
    let path = path.strip_prefix(CGI_PREFIX).unwrap_or(path);

    let flags = uri.query().map(parse_query_pairs).unwrap_or_default();
    Command::new(percent_decode(path), flags)
}

/// Encodes a [`CommandOutcome`] as an HTTP response.
pub fn outcome_response(outcome: CommandOutcome) -> Response {
    match outcome {
        CommandOutcome::Text(output) => (StatusCode::OK, output).into_response(),
        CommandOutcome::Empty => StatusCode::NO_CONTENT.into_response(),
        CommandOutcome::Unrecognized => (StatusCode::NOT_FOUND, "Not Found").into_response(),
    }
}

async fn add_server_header(mut response: Response) -> Response {
    response
        .headers_mut()
        .insert(header::SERVER, HeaderValue::from_static(SERVER_NAME));
    response
}

// ── Static files ──────────────────────────────────────────────────────────────

async fn serve_static(root: &Path, uri_path: &str, head_only: bool) -> Response {
    let Some(path) = resolve_static_path(root, &percent_decode(uri_path)) else {
        return (StatusCode::NOT_FOUND, "Not Found").into_response();
    };

    let file = match tokio::fs::metadata(&path).await {
        Ok(meta) if meta.is_dir() => match find_index(&path).await {
            Some(index) => index,
            None => {
                return (StatusCode::NOT_FOUND, "No permission to list directory").into_response()
            }
        },
        Ok(meta) if meta.is_file() => path,
        _ => return (StatusCode::NOT_FOUND, "File not found").into_response(),
    };

    let contents = match tokio::fs::read(&file).await {
        Ok(c) => c,
        Err(e) => {
            debug!("static read {}: {e}", file.display());
            return (StatusCode::NOT_FOUND, "File not found").into_response();
        }
    };

    let length = contents.len();
    let body = if head_only {
        Body::empty()
    } else {
        Body::from(contents)
    };

    Response::builder()
        .status(StatusCode::OK)
        .header(header::CONTENT_TYPE, content_type_for(&file))
        .header(header::CONTENT_LENGTH, length)
        .body(body)
        .unwrap_or_else(|_| StatusCode::INTERNAL_SERVER_ERROR.into_response())
}

async fn find_index(dir: &Path) -> Option<PathBuf> {
    for name in INDEX_FILES {
        let candidate = dir.join(name);
        if let Ok(meta) = tokio::fs::metadata(&candidate).await {
            if meta.is_file() {
                return Some(candidate);
            }
        }
    }
    None
}

/// Maps a decoded request path onto the document root.
///
/// Returns `None` for paths that would escape the root.
fn resolve_static_path(root: &Path, decoded: &str) -> Option<PathBuf> {
    let mut path = root.to_path_buf();
    for part in decoded.split('/') {
        match part {
            "" | "." => continue,
            ".." => return None,
            p if p.contains(['\\', '\0']) => return None,
            p => path.push(p),
        }
    }
    Some(path)
}

fn content_type_for(path: &Path) -> &'static str {
    let ext = path
        .extension()
        .and_then(|e| e.to_str())
        .map(str::to_ascii_lowercase);
    match ext.as_deref() {
        Some("html" | "htm") => "text/html; charset=utf-8",
        Some("css") => "text/css; charset=utf-8",
        Some("js") => "text/javascript; charset=utf-8",
        Some("json") => "application/json",
        Some("txt" | "toml") => "text/plain; charset=utf-8",
        Some("svg") => "image/svg+xml",
        Some("png") => "image/png",
        Some("jpg" | "jpeg") => "image/jpeg",
        Some("ico") => "image/x-icon",
        _ => "application/octet-stream",
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
