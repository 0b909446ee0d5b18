//! Health Check and Metrics Endpoint
//!
//! HTTP endpoint for health checks, hub status reporting, and Prometheus metrics.
//! Served on its own port so probes never compete with ingest traffic.
//!
//! # Endpoints
//!
//! - `GET /health` - Returns JSON health status
//! - `GET /healthz` - Kubernetes liveness probe (simple OK)
//! - `GET /readyz` - Kubernetes readiness probe (ready until shutdown starts)
//! - `GET /metrics` - Prometheus metrics in text format

use std::net::SocketAddr;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};

use axum::{Json, Router, extract::State, http::StatusCode, response::IntoResponse, routing::get};
use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;

use crate::application::services::{HistoryQueryService, IngestStats, IngestionService};
use crate::infrastructure::broadcast::{BroadcastHub, BroadcastStats, SharedBroadcastHub};
use crate::infrastructure::metrics::get_metrics_handle;

// =============================================================================
// Health Response Types
// =============================================================================

/// Health check response.
#[derive(Debug, Clone, Serialize)]
pub struct HealthResponse {
    /// Overall status.
    pub status: HealthStatus,
    /// Hub version.
    pub version: String,
    /// Server uptime in seconds.
    pub uptime_secs: u64,
    /// Current time.
    pub current_time: DateTime<Utc>,
    /// Live subscriber and fan-out counters.
    pub subscribers: BroadcastStats,
    /// History window occupancy.
    pub history: HistoryStatus,
    /// Ingestion counters.
    pub ingest: IngestStats,
    /// Alert rule in effect.
    pub alert_threshold_watts: f64,
    /// Silence after which consumers should treat a device as offline.
    pub offline_window_ms: u64,
}

/// Overall health status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum HealthStatus {
    /// Accepting readings.
    Healthy,
    /// Shutting down.
    Draining,
}

/// History window occupancy.
#[derive(Debug, Clone, Copy, Serialize)]
pub struct HistoryStatus {
    /// Readings currently held.
    pub length: usize,
    /// Maximum readings retained.
    pub capacity: usize,
}

// =============================================================================
// Health Server State
// =============================================================================

/// Shared state for the health server.
pub struct HealthServerState {
    version: String,
    started_at: Instant,
    ready: AtomicBool,
    ingestion: Arc<IngestionService<BroadcastHub>>,
    history: HistoryQueryService,
    hub: SharedBroadcastHub,
    offline_window: Duration,
}

impl HealthServerState {
    /// Create new health server state. Starts out ready.
    #[must_use]
    pub fn new(
        version: String,
        ingestion: Arc<IngestionService<BroadcastHub>>,
        history: HistoryQueryService,
        hub: SharedBroadcastHub,
        offline_window: Duration,
    ) -> Self {
        Self {
            version,
            started_at: Instant::now(),
            ready: AtomicBool::new(true),
            ingestion,
            history,
            hub,
            offline_window,
        }
    }

    /// Flip readiness off so load balancers stop routing here.
    pub fn mark_draining(&self) {
        self.ready.store(false, Ordering::Release);
    }

    fn is_ready(&self) -> bool {
        self.ready.load(Ordering::Acquire)
    }
}

// =============================================================================
// Health Server
// =============================================================================

/// Health check HTTP server.
pub struct HealthServer {
    port: u16,
    state: Arc<HealthServerState>,
    cancel: CancellationToken,
}

impl HealthServer {
    /// Create a new health server.
    #[must_use]
    pub const fn new(port: u16, state: Arc<HealthServerState>, cancel: CancellationToken) -> Self {
        Self {
            port,
            state,
            cancel,
        }
    }

    /// Run the health server until cancelled.
    ///
    /// # Errors
    ///
    /// Returns `HealthServerError` if binding fails or the HTTP server
    /// encounters a fatal error while running.
    pub async fn run(self) -> Result<(), HealthServerError> {
        let app = router(self.state);

        let addr = SocketAddr::from(([0, 0, 0, 0], self.port));
        let listener = TcpListener::bind(addr)
            .await
            .map_err(|e| HealthServerError::BindFailed(self.port, e.to_string()))?;

        tracing::info!(port = self.port, "Health server listening");

        axum::serve(listener, app)
            .with_graceful_shutdown(self.cancel.cancelled_owned())
            .await
            .map_err(|e| HealthServerError::ServerFailed(e.to_string()))?;

        tracing::info!("Health server stopped");
        Ok(())
    }
}

fn router(state: Arc<HealthServerState>) -> Router {
    Router::new()
        .route("/health", get(health_handler))
        .route("/healthz", get(liveness_handler))
        .route("/readyz", get(readiness_handler))
        .route("/metrics", get(metrics_handler))
        .with_state(state)
}

// =============================================================================
// HTTP Handlers
// =============================================================================

async fn health_handler(State(state): State<Arc<HealthServerState>>) -> impl IntoResponse {
    let response = build_health_response(&state);
    let status_code = match response.status {
        HealthStatus::Healthy => StatusCode::OK,
        HealthStatus::Draining => StatusCode::SERVICE_UNAVAILABLE,
    };
    (status_code, Json(response))
}

async fn liveness_handler() -> impl IntoResponse {
    (StatusCode::OK, "OK")
}

async fn readiness_handler(State(state): State<Arc<HealthServerState>>) -> impl IntoResponse {
    if state.is_ready() {
        (StatusCode::OK, "READY")
    } else {
        (StatusCode::SERVICE_UNAVAILABLE, "NOT READY")
    }
}

async fn metrics_handler() -> impl IntoResponse {
    get_metrics_handle().map_or_else(
        || {
            (
                StatusCode::SERVICE_UNAVAILABLE,
                [("content-type", "text/plain")],
                "Metrics not initialized".to_string(),
            )
        },
        |handle| {
            let body = handle.render();
            (
                StatusCode::OK,
                [("content-type", "text/plain; version=0.0.4; charset=utf-8")],
                body,
            )
        },
    )
}

#[allow(clippy::cast_possible_truncation)]
fn build_health_response(state: &HealthServerState) -> HealthResponse {
    let status = if state.is_ready() {
        HealthStatus::Healthy
    } else {
        HealthStatus::Draining
    };

    HealthResponse {
        status,
        version: state.version.clone(),
        uptime_secs: state.started_at.elapsed().as_secs(),
        current_time: Utc::now(),
        subscribers: state.hub.stats(),
        history: HistoryStatus {
            length: state.history.len(),
            capacity: state.history.capacity(),
        },
        ingest: state.ingestion.stats(),
        alert_threshold_watts: state.ingestion.evaluator().threshold_watts(),
        offline_window_ms: state.offline_window.as_millis() as u64,
    }
}

// =============================================================================
// Errors
// =============================================================================

/// Health server errors.
#[derive(Debug, thiserror::Error)]
pub enum HealthServerError {
    /// Failed to bind to port.
    #[error("failed to bind to port {0}: {1}")]
    BindFailed(u16, String),

    /// Server error.
    #[error("server error: {0}")]
    ServerFailed(String),
}

// =============================================================================
// Tests
// =============================================================================
