pub mod page;

use std::borrow::Cow;
use std::net::SocketAddr;
use std::sync::Arc;

use axum::extract::{Request, State};
use axum::http::header::{
    ACCESS_CONTROL_ALLOW_HEADERS, ACCESS_CONTROL_ALLOW_METHODS, ACCESS_CONTROL_ALLOW_ORIGIN,
    CONTENT_TYPE,
};
use axum::http::{HeaderValue, Method, StatusCode, Uri};
use axum::middleware::{self, Next};
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::{Json, Router};
use serde_json::{json, Value};
use tokio::net::TcpListener;
use tokio::sync::Notify;
use tower_http::set_header::SetResponseHeaderLayer;
use tower_http::trace::TraceLayer;

use crate::error::{RelayError, Result};
use crate::store::ResultStore;

pub const SCAN_NOT_FOUND: &str = "Scan not found";

const SCANS_PREFIX: &str = "/api/scans/";

/// Build the read-only HTTP surface over `store`.
pub fn router(store: Arc<ResultStore>) -> Router {
    Router::new()
        .route("/", get(page::index))
        .route("/api/scans", get(list_scans))
        .route("/api/scans/{scan_id}", get(get_scan))
        .fallback(fallback)
        .with_state(store)
        .layer(middleware::from_fn(preflight))
        .layer(SetResponseHeaderLayer::overriding(
            ACCESS_CONTROL_ALLOW_ORIGIN,
            HeaderValue::from_static("*"),
        ))
        .layer(SetResponseHeaderLayer::overriding(
            ACCESS_CONTROL_ALLOW_METHODS,
            HeaderValue::from_static("GET, OPTIONS"),
        ))
        .layer(SetResponseHeaderLayer::overriding(
            ACCESS_CONTROL_ALLOW_HEADERS,
            HeaderValue::from_static("Content-Type"),
        ))
        .layer(TraceLayer::new_for_http())
}

async fn list_scans(State(store): State<Arc<ResultStore>>) -> Json<Value> {
    Json(json!({
        "status": "success",
        "scans": store.list_all(),
    }))
}

async fn get_scan(State(store): State<Arc<ResultStore>>, uri: Uri) -> Json<Value> {
    lookup(&store, &scan_id_from_path(uri.path()))
}

/// The id is the last path segment, percent-decoded. A segment that does
/// not decode to UTF-8 is looked up as-is.
fn scan_id_from_path(path: &str) -> Cow<'_, str> {
    let raw = path.rsplit('/').next().unwrap_or_default();
    urlencoding::decode(raw).unwrap_or(Cow::Borrowed(raw))
}

/// A miss is still a 200; callers inspect `status` in the body.
fn lookup(store: &ResultStore, scan_id: &str) -> Json<Value> {
    match store.get(scan_id) {
        Some(scan) => Json(json!({"status": "success", "scan": scan})),
        None => Json(json!({"status": "error", "message": SCAN_NOT_FOUND})),
    }
}

/// Deeper paths under `/api/scans/` look up their last segment; anything
/// else is a plain 404.
async fn fallback(State(store): State<Arc<ResultStore>>, uri: Uri) -> Response {
    if uri.path().starts_with(SCANS_PREFIX) {
        return lookup(&store, &scan_id_from_path(uri.path())).into_response();
    }
    (StatusCode::NOT_FOUND, "Not Found").into_response()
}

/// OPTIONS on any path is answered here with an empty 200; the CORS
/// headers are added by the outer layers.
async fn preflight(req: Request, next: Next) -> Response {
    if req.method() != Method::OPTIONS {
        return next.run(req).await;
    }
    let mut response = StatusCode::OK.into_response();
    response
        .headers_mut()
        .insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
    response
}

/// HTTP listener serving [`router`].
pub struct QueryService {
    listener: TcpListener,
    store: Arc<ResultStore>,
    shutdown_signal: Arc<Notify>,
}

impl QueryService {
    pub async fn bind(addr: SocketAddr, store: Arc<ResultStore>) -> Result<Self> {
        let listener = TcpListener::bind(addr)
            .await
            .map_err(|e| RelayError::Bind {
                addr,
                reason: e.to_string(),
            })?;
        Ok(Self {
            listener,
            store,
            shutdown_signal: Arc::new(Notify::new()),
        })
    }

    pub fn local_addr(&self) -> Result<SocketAddr> {
        Ok(self.listener.local_addr()?)
    }

    /// Handle that triggers a graceful shutdown when notified.
    pub fn shutdown_handle(&self) -> Arc<Notify> {
        self.shutdown_signal.clone()
    }

    /// Serve requests until shutdown.
    pub async fn serve(self) -> Result<()> {
        let local_addr = self.local_addr()?;
        tracing::info!("web server started on http://{}", local_addr);

        let shutdown = self.shutdown_signal.clone();
        axum::serve(self.listener, router(self.store))
            .with_graceful_shutdown(async move { shutdown.notified().await })
            .await
            .map_err(|e| RelayError::Service {
                reason: format!("web server error: {}", e),
            })?;

        tracing::info!(addr = %local_addr, "web server stopped");
        Ok(())
    }
}
