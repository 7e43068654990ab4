//! HTTP API for health checks, heartbeat ingest and Prometheus metrics

use crate::error::ServeError;
use crate::presenter::StatusPresenter;
use crate::reconciler::{Heartbeat, WireHeartbeat};
use axum::{
    extract::{Request, State},
    http::{header, HeaderMap, StatusCode},
    middleware::{self, Next},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use prometheus::{Encoder, TextEncoder};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio::time::Instant;
use tracing::{info, trace, warn};

/// Default path of the health endpoint
pub const DEFAULT_HEALTH_PATH: &str = "/_health";

/// Path heartbeats are posted to
pub const HEARTBEAT_PATH: &str = "/heartbeats";

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    pub presenter: StatusPresenter,
    pub heartbeats: mpsc::Sender<Heartbeat>,
}

impl AppState {
    pub fn new(presenter: StatusPresenter, heartbeats: mpsc::Sender<Heartbeat>) -> Self {
        Self {
            presenter,
            heartbeats,
        }
    }
}

/// Reply to a posted heartbeat
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IngestResponse {
    pub accepted: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
}

impl IngestResponse {
    fn accepted() -> Self {
        Self {
            accepted: true,
            reason: None,
        }
    }

    fn rejected(reason: impl Into<String>) -> Self {
        Self {
            accepted: false,
            reason: Some(reason.into()),
        }
    }
}

fn wants_json(headers: &HeaderMap) -> bool {
    headers
        .get_all(header::ACCEPT)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .flat_map(|v| v.split(','))
        .any(|media| {
            media
                .split(';')
                .next()
                .map(|m| m.trim().eq_ignore_ascii_case("application/json"))
                .unwrap_or(false)
        })
}

/// Health snapshot, JSON or text depending on the Accept header. Always 200.
async fn health(State(state): State<Arc<AppState>>, headers: HeaderMap) -> Response {
    if wants_json(&headers) {
        Json(state.presenter.view().await).into_response()
    } else {
        (
            StatusCode::OK,
            [(header::CONTENT_TYPE, "text/plain; charset=utf-8")],
            state.presenter.text().await,
        )
            .into_response()
    }
}

/// Queue a heartbeat for the reconciler
async fn ingest_heartbeat(
    State(state): State<Arc<AppState>>,
    Json(wire): Json<WireHeartbeat>,
) -> impl IntoResponse {
    let heartbeat = match Heartbeat::try_from(wire) {
        Ok(heartbeat) => heartbeat,
        Err(e) => {
            return (
                StatusCode::BAD_REQUEST,
                Json(IngestResponse::rejected(e.to_string())),
            )
        }
    };

    match state.heartbeats.send(heartbeat).await {
        Ok(()) => (StatusCode::ACCEPTED, Json(IngestResponse::accepted())),
        Err(_) => {
            warn!("Heartbeat dropped, reconciler is not running");
            (
                StatusCode::SERVICE_UNAVAILABLE,
                Json(IngestResponse::rejected("reconciler not running")),
            )
        }
    }
}

/// Prometheus metrics endpoint
async fn metrics() -> impl IntoResponse {
    let encoder = TextEncoder::new();
    let metric_families = prometheus::gather();
    let mut buffer = Vec::new();

    if let Err(e) = encoder.encode(&metric_families, &mut buffer) {
        warn!(error = %e, "Failed to encode metrics");
        return (
            StatusCode::INTERNAL_SERVER_ERROR,
            [(header::CONTENT_TYPE, "text/plain; charset=utf-8")],
            Vec::new(),
        );
    }

    (
        StatusCode::OK,
        [(header::CONTENT_TYPE, "text/plain; charset=utf-8")],
        buffer,
    )
}

/// Trace every request with its elapsed time
async fn log_request(request: Request, next: Next) -> Response {
    let path = request.uri().path().to_string();
    let start = Instant::now();
    let response = next.run(request).await;
    trace!(
        path = %path,
        status = response.status().as_u16(),
        elapsed_us = start.elapsed().as_micros() as u64,
        "Request served"
    );
    response
}

/// Create the API router
pub fn create_router(state: Arc<AppState>, health_path: &str) -> Router {
    Router::new()
        .route(health_path, get(health))
        .route(HEARTBEAT_PATH, post(ingest_heartbeat))
        .route("/metrics", get(metrics))
        .layer(middleware::from_fn(log_request))
        .with_state(state)
}

/// Bind `host:port` and serve the router until it fails.
///
/// `host` may be a hostname or an IP literal of either family.
pub async fn serve(host: &str, port: u16, router: Router) -> Result<(), ServeError> {
    let listener = tokio::net::TcpListener::bind((host, port))
        .await
        .map_err(|e| ServeError::bind(host, port, e))?;

    match listener.local_addr() {
        Ok(addr) => info!(addr = %addr, "Starting health endpoint"),
        Err(_) => info!(host = %host, port, "Starting health endpoint"),
    }

    axum::serve(listener, router)
        .await
        .map_err(ServeError::Serve)
}
