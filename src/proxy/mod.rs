//! Caching reverse proxy
//!
//! Serves the vendor API paths from the local cache, filling it on a miss.
//! Clients steer each request with two headers, both `true` when absent:
//! `X-Cache-SkipOnHit` (answer from cache when possible) and
//! `X-Cache-WriteOnReturn` (persist fresh responses).
//!
//! Lifecycle: `Starting → Serving → ShuttingDown → Stopped`. Shutdown begins on
//! `/shutdown` or a termination signal and ends once connections drain or the
//! grace period runs out, whichever comes first.

use std::collections::HashMap;
use std::future::Future;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use axum::Router;
use axum::extract::{Path, Query, State};
use axum::http::{HeaderMap, StatusCode, header};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use log::{debug, info, warn};
use serde::Deserialize;
use tokio::net::TcpListener;
use tokio::sync::{oneshot, watch};

use crate::cache::{CacheControl, CachedClient, Endpoint, Params};
use crate::client::Transport;
use crate::error::{ApiError, CacheError, Error, Result};

pub const SKIP_ON_HIT_HEADER: &str = "X-Cache-SkipOnHit";
pub const WRITE_ON_RETURN_HEADER: &str = "X-Cache-WriteOnReturn";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProxyState {
    Starting,
    Serving,
    ShuttingDown,
    Stopped,
}

struct AppState<T: Transport> {
    client: Arc<CachedClient<T>>,
    shutdown_tx: Mutex<Option<oneshot::Sender<()>>>,
    export_chunk_size: u32,
}

/// HTTP front end for a [`CachedClient`]
pub struct CachingProxy<T: Transport + 'static> {
    client: Arc<CachedClient<T>>,
    grace: Duration,
    export_chunk_size: u32,
    state: Arc<watch::Sender<ProxyState>>,
}

impl<T: Transport + 'static> CachingProxy<T> {
    pub fn new(client: Arc<CachedClient<T>>, grace: Duration) -> Self {
        let (state, _) = watch::channel(ProxyState::Starting);
        Self {
            client,
            grace,
            export_chunk_size: 1000,
            state: Arc::new(state),
        }
    }

    /// Default `num_assets` for export requests without a body.
    pub fn with_export_chunk_size(mut self, size: u32) -> Self {
        self.export_chunk_size = size;
        self
    }

    /// Observe lifecycle transitions.
    pub fn state(&self) -> watch::Receiver<ProxyState> {
        self.state.subscribe()
    }

    /// Serve on `listener` until `/shutdown` is hit or `signal` resolves.
    pub async fn serve<F>(self, listener: TcpListener, signal: F) -> Result<()>
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let addr = listener.local_addr()?;
        let (shutdown_tx, shutdown_rx) = oneshot::channel::<()>();
        let app = router(Arc::new(AppState {
            client: Arc::clone(&self.client),
            shutdown_tx: Mutex::new(Some(shutdown_tx)),
            export_chunk_size: self.export_chunk_size,
        }));

        let (draining_tx, draining_rx) = oneshot::channel::<()>();
        let state = Arc::clone(&self.state);
        let trigger = async move {
            tokio::select! {
                _ = shutdown_rx => info!("Shutdown requested over HTTP"),
                _ = signal => info!("Termination signal received"),
            }
            state.send_replace(ProxyState::ShuttingDown);
            let _ = draining_tx.send(());
        };

        self.state.send_replace(ProxyState::Serving);
        info!("Caching proxy listening on http://{}", addr);

        let server = axum::serve(listener, app).with_graceful_shutdown(trigger);
        let mut server = tokio::spawn(async move { server.await });

        let grace = self.grace;
        let deadline = async move {
            match draining_rx.await {
                Ok(()) => tokio::time::sleep(grace).await,
                // Server ended before shutdown began
                Err(_) => std::future::pending::<()>().await,
            }
        };

        let outcome = tokio::select! {
            joined = &mut server => joined,
            _ = deadline => {
                warn!("Connections still open after {:?}; stopping anyway", grace);
                server.abort();
                Ok(Ok(()))
            }
        };

        self.state.send_replace(ProxyState::Stopped);
        info!("Caching proxy stopped");

        match outcome {
            Ok(Ok(())) => Ok(()),
            Ok(Err(e)) => Err(e.into()),
            Err(e) => Err(Error::Other(format!("Proxy server task failed: {}", e))),
        }
    }
}

/// Resolves on Ctrl-C or, on unix, SIGTERM.
pub async fn termination_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!("Failed to listen for Ctrl-C: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        use tokio::signal::unix::{SignalKind, signal};
        match signal(SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
            }
            Err(e) => {
                warn!("Failed to listen for SIGTERM: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };
    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}

fn router<T: Transport + 'static>(state: Arc<AppState<T>>) -> Router {
    Router::new()
        .route("/scans", get(scan_list::<T>))
        .route("/scans/:scan_id", get(scan_detail::<T>))
        .route("/scans/:scan_id/hosts/:host_id", get(host_detail::<T>))
        .route("/plugins/plugin/:plugin_id", get(plugin_detail::<T>))
        .route("/assets", get(asset_list::<T>))
        .route("/workbenches/assets/:asset_id/info", get(asset_detail::<T>))
        .route("/vulns/export", post(export_request::<T>))
        .route("/vulns/export/:export_id/status", get(export_status::<T>))
        .route(
            "/vulns/export/:export_id/chunks/:chunk_id",
            get(export_chunk::<T>),
        )
        .route("/shutdown", get(shutdown::<T>).post(shutdown::<T>))
        .with_state(state)
}

/// Read the per-request cache flags.
fn cache_control(headers: &HeaderMap) -> CacheControl {
    let flag = |name: &str| match headers.get(name).map(|v| v.to_str()) {
        None => true,
        Some(Ok(value)) => match value.trim().to_ascii_lowercase().parse::<bool>() {
            Ok(flag) => flag,
            Err(_) => {
                warn!("Ignoring {}: {:?} is not a boolean", name, value);
                true
            }
        },
        Some(Err(_)) => true,
    };

    CacheControl {
        skip_on_hit: flag(SKIP_ON_HIT_HEADER),
        write_on_return: flag(WRITE_ON_RETURN_HEADER),
    }
}

async fn respond<T: Transport + 'static>(
    state: &AppState<T>,
    endpoint: Endpoint,
    params: Params,
    headers: &HeaderMap,
) -> Response {
    let control = cache_control(headers);
    debug!("{} {:?} ({:?})", endpoint, params, control);

    match state.client.fetch_raw(endpoint, &params, control).await {
        Ok(body) => ([(header::CONTENT_TYPE, "application/json")], body).into_response(),
        Err(e) => error_response(e),
    }
}

/// Map a fetch failure onto an HTTP status.
fn status_for(error: &Error) -> StatusCode {
    match error {
        Error::Api(ApiError::Forbidden) => StatusCode::FORBIDDEN,
        Error::Api(ApiError::RateLimited(_)) => StatusCode::TOO_MANY_REQUESTS,
        Error::Api(_) => StatusCode::BAD_GATEWAY,
        Error::Cache(CacheError::NoClobber { .. }) => StatusCode::CONFLICT,
        Error::Cache(CacheError::Template { .. }) => StatusCode::BAD_REQUEST,
        Error::Cache(CacheError::Decode { .. }) => StatusCode::BAD_GATEWAY,
        _ => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

fn error_response(error: Error) -> Response {
    let status = status_for(&error);
    warn!("Proxy request failed ({}): {}", status, error);
    let body = serde_json::json!({ "error": error.to_string() });
    (status, axum::Json(body)).into_response()
}

async fn scan_list<T: Transport + 'static>(
    State(state): State<Arc<AppState<T>>>,
    headers: HeaderMap,
) -> Response {
    respond(&state, Endpoint::ScanList, Params::new(), &headers).await
}

async fn scan_detail<T: Transport + 'static>(
    State(state): State<Arc<AppState<T>>>,
    Path(scan_id): Path<String>,
    Query(query): Query<HashMap<String, String>>,
    headers: HeaderMap,
) -> Response {
    let params = Params::new().with("scan_id", scan_id);
    match query.get("history_id") {
        Some(history_id) => {
            let params = params.with("history_id", history_id);
            respond(&state, Endpoint::ScanHistory, params, &headers).await
        }
        None => respond(&state, Endpoint::ScanDetail, params, &headers).await,
    }
}

async fn host_detail<T: Transport + 'static>(
    State(state): State<Arc<AppState<T>>>,
    Path((scan_id, host_id)): Path<(String, String)>,
    Query(query): Query<HashMap<String, String>>,
    headers: HeaderMap,
) -> Response {
    let Some(history_id) = query.get("history_id") else {
        let body = serde_json::json!({ "error": "history_id query parameter is required" });
        return (StatusCode::BAD_REQUEST, axum::Json(body)).into_response();
    };
    let params = Params::new()
        .with("scan_id", scan_id)
        .with("host_id", host_id)
        .with("history_id", history_id);
    respond(&state, Endpoint::HostDetail, params, &headers).await
}

async fn plugin_detail<T: Transport + 'static>(
    State(state): State<Arc<AppState<T>>>,
    Path(plugin_id): Path<String>,
    headers: HeaderMap,
) -> Response {
    let params = Params::new().with("plugin_id", plugin_id);
    respond(&state, Endpoint::PluginDetail, params, &headers).await
}

async fn asset_list<T: Transport + 'static>(
    State(state): State<Arc<AppState<T>>>,
    headers: HeaderMap,
) -> Response {
    respond(&state, Endpoint::AssetList, Params::new(), &headers).await
}

async fn asset_detail<T: Transport + 'static>(
    State(state): State<Arc<AppState<T>>>,
    Path(asset_id): Path<String>,
    headers: HeaderMap,
) -> Response {
    let params = Params::new().with("asset_id", asset_id);
    respond(&state, Endpoint::AssetDetail, params, &headers).await
}

#[derive(Debug, Deserialize)]
struct ExportRequestBody {
    num_assets: Option<u32>,
}

async fn export_request<T: Transport + 'static>(
    State(state): State<Arc<AppState<T>>>,
    headers: HeaderMap,
    body: Option<axum::Json<ExportRequestBody>>,
) -> Response {
    let chunk_size = body
        .and_then(|axum::Json(b)| b.num_assets)
        .unwrap_or(state.export_chunk_size);
    let params = Params::new().with("chunk_size", chunk_size);
    respond(&state, Endpoint::VulnExportRequest, params, &headers).await
}

async fn export_status<T: Transport + 'static>(
    State(state): State<Arc<AppState<T>>>,
    Path(export_id): Path<String>,
    headers: HeaderMap,
) -> Response {
    let params = Params::new().with("export_id", export_id);
    respond(&state, Endpoint::VulnExportStatus, params, &headers).await
}

async fn export_chunk<T: Transport + 'static>(
    State(state): State<Arc<AppState<T>>>,
    Path((export_id, chunk_id)): Path<(String, String)>,
    headers: HeaderMap,
) -> Response {
    let params = Params::new()
        .with("export_id", export_id)
        .with("chunk_id", chunk_id);
    respond(&state, Endpoint::VulnExportChunk, params, &headers).await
}

async fn shutdown<T: Transport + 'static>(State(state): State<Arc<AppState<T>>>) -> Response {
    let sender = state
        .shutdown_tx
        .lock()
        .unwrap_or_else(|poisoned| poisoned.into_inner())
        .take();
    if let Some(tx) = sender {
        let _ = tx.send(());
    }
    axum::Json(serde_json::json!({ "status": "shutting down", "message": "Goodbye" }))
        .into_response()
}
