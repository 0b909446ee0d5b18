//! HTTP API
//!
//! The public surface of the hub.
//!
//! # Endpoints
//!
//! - `POST /api/energy` - Ingest one reading (`timestamp` optional)
//! - `GET /api/history` - Current history window, oldest first
//! - `GET /energyHub` - WebSocket upgrade for live reading/alert pushes

mod ws;

use std::net::SocketAddr;
use std::sync::Arc;

use axum::{
    Json, Router,
    extract::State,
    http::{HeaderValue, StatusCode},
    response::IntoResponse,
    routing::{get, post},
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;
use tower_http::cors::{AllowOrigin, Any, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::application::services::{HistoryQueryService, IngestionService};
use crate::domain::reading::{Reading, ValidationError};
use crate::infrastructure::broadcast::{BroadcastHub, SharedBroadcastHub};
use crate::infrastructure::metrics;

// =============================================================================
// Application State
// =============================================================================

/// Shared state for the API handlers.
#[derive(Clone)]
pub struct AppState {
    ingestion: Arc<IngestionService<BroadcastHub>>,
    history: HistoryQueryService,
    hub: SharedBroadcastHub,
}

impl AppState {
    /// Create new API state.
    #[must_use]
    pub const fn new(
        ingestion: Arc<IngestionService<BroadcastHub>>,
        history: HistoryQueryService,
        hub: SharedBroadcastHub,
    ) -> Self {
        Self {
            ingestion,
            history,
            hub,
        }
    }
}

/// Create the Axum router with all API endpoints.
///
/// An empty `allowed_origins` list permits any origin.
#[must_use]
pub fn create_router(state: AppState, allowed_origins: &[String]) -> Router {
    Router::new()
        .route("/api/energy", post(ingest_reading))
        .route("/api/history", get(get_history))
        .route("/energyHub", get(ws::ws_handler))
        .layer(cors_layer(allowed_origins))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

fn cors_layer(allowed_origins: &[String]) -> CorsLayer {
    let layer = CorsLayer::new().allow_methods(Any).allow_headers(Any);

    if allowed_origins.is_empty() {
        return layer.allow_origin(Any);
    }

    let origins: Vec<HeaderValue> = allowed_origins
        .iter()
        .filter_map(|origin| match HeaderValue::from_str(origin) {
            Ok(value) => Some(value),
            Err(e) => {
                tracing::warn!(origin = %origin, error = %e, "Ignoring invalid CORS origin");
                None
            }
        })
        .collect();

    layer.allow_origin(AllowOrigin::list(origins))
}

// =============================================================================
// Handlers
// =============================================================================

/// Reading payload as sent by producers.
///
/// A missing `deviceId` deserializes as empty and is then rejected by
/// validation; a missing `timestamp` is filled with the receive time.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IngestRequest {
    /// Device identifier.
    #[serde(default)]
    pub device_id: String,
    /// Consumption in watts.
    pub consumption_watts: f64,
    /// Sample time; defaults to receipt time.
    #[serde(default)]
    pub timestamp: Option<DateTime<Utc>>,
}

impl IngestRequest {
    /// Convert into a reading, stamping it with `received_at` if needed.
    #[must_use]
    pub fn into_reading(self, received_at: DateTime<Utc>) -> Reading {
        Reading::new(
            self.device_id,
            self.consumption_watts,
            self.timestamp.unwrap_or(received_at),
        )
    }
}

async fn ingest_reading(
    State(state): State<AppState>,
    Json(req): Json<IngestRequest>,
) -> Result<StatusCode, ApiError> {
    let reading = req.into_reading(Utc::now());

    tracing::info!(
        device_id = %reading.device_id,
        consumption_watts = reading.consumption_watts,
        timestamp = %reading.timestamp,
        "Received energy data"
    );

    if let Err(e) = state.ingestion.ingest(reading) {
        metrics::record_reading_rejected(e.code());
        return Err(ApiError::from(e));
    }

    metrics::record_reading_ingested();
    metrics::set_history_length(state.history.len());
    Ok(StatusCode::OK)
}

async fn get_history(State(state): State<AppState>) -> Json<Vec<Reading>> {
    Json(state.history.get_history())
}

// =============================================================================
// Errors
// =============================================================================

/// Error body returned to API clients.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorBody {
    /// Machine-readable error code.
    pub code: String,
    /// Human-readable description.
    pub message: String,
}

/// API error type.
#[derive(Debug)]
pub struct ApiError {
    status: StatusCode,
    body: ErrorBody,
}

impl From<ValidationError> for ApiError {
    fn from(error: ValidationError) -> Self {
        Self {
            status: StatusCode::BAD_REQUEST,
            body: ErrorBody {
                code: error.code().to_string(),
                message: error.to_string(),
            },
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> axum::response::Response {
        (self.status, Json(self.body)).into_response()
    }
}

// =============================================================================
// Server
// =============================================================================

/// API HTTP server.
pub struct ApiServer {
    port: u16,
    router: Router,
    cancel: CancellationToken,
}

impl ApiServer {
    /// Create a new API server.
    #[must_use]
    pub const fn new(port: u16, router: Router, cancel: CancellationToken) -> Self {
        Self {
            port,
            router,
            cancel,
        }
    }

    /// Run the API server until cancelled.
    ///
    /// # Errors
    ///
    /// Returns `ServerError` if binding fails or the HTTP server
    /// encounters a fatal error while running.
    pub async fn run(self) -> Result<(), ServerError> {
        let addr = SocketAddr::from(([0, 0, 0, 0], self.port));
        let listener = TcpListener::bind(addr)
            .await
            .map_err(|e| ServerError::BindFailed(self.port, e.to_string()))?;

        tracing::info!(port = self.port, "API server listening");

        axum::serve(listener, self.router)
            .with_graceful_shutdown(self.cancel.cancelled_owned())
            .await
            .map_err(|e| ServerError::ServerFailed(e.to_string()))?;

        tracing::info!("API server stopped");
        Ok(())
    }
}

/// HTTP server errors.
#[derive(Debug, thiserror::Error)]
pub enum ServerError {
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

#[cfg(test)]
mod tests {
    use axum::body::Body;
    use axum::http::{Request, header};
    use tower::ServiceExt;

    use super::*;
    use crate::domain::alert::AlertEvaluator;
    use crate::domain::history::HistoryStore;

    fn make_state(capacity: usize) -> AppState {
        let history = Arc::new(HistoryStore::new(capacity));
        let hub = Arc::new(BroadcastHub::with_defaults());
        let ingestion = Arc::new(IngestionService::new(
            Arc::clone(&history),
            AlertEvaluator::default(),
            Arc::clone(&hub),
        ));
        AppState::new(ingestion, HistoryQueryService::new(history), hub)
    }

    fn post_json(body: &str) -> Request<Body> {
        Request::builder()
            .method("POST")
            .uri("/api/energy")
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(body.to_string()))
            .unwrap()
    }

    #[test]
    fn missing_timestamp_uses_receipt_time() {
        let req: IngestRequest =
            serde_json::from_str(r#"{"deviceId":"Fridge001","consumptionWatts":80}"#).unwrap();
        let now = Utc::now();
        let reading = req.into_reading(now);
        assert_eq!(reading.timestamp, now);
        assert_eq!(reading.device_id, "Fridge001");
    }

    #[test]
    fn explicit_timestamp_is_kept() {
        let req: IngestRequest = serde_json::from_str(
            r#"{"deviceId":"Fridge001","consumptionWatts":80,"timestamp":"2025-03-01T12:00:00Z"}"#,
        )
        .unwrap();
        let reading = req.into_reading(Utc::now());
        assert_eq!(reading.timestamp.to_rfc3339(), "2025-03-01T12:00:00+00:00");
    }

    #[tokio::test]
    async fn ingest_returns_ok_with_empty_body() {
        let app = create_router(make_state(10), &[]);

        let response = app
            .oneshot(post_json(r#"{"deviceId":"Fridge001","consumptionWatts":80}"#))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let body = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        assert!(body.is_empty());
    }

    #[tokio::test]
    async fn invalid_reading_is_bad_request() {
        let state = make_state(10);
        let app = create_router(state.clone(), &[]);

        let response = app
            .oneshot(post_json(r#"{"deviceId":"Fridge001","consumptionWatts":-5}"#))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        let body = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        let error: ErrorBody = serde_json::from_slice(&body).unwrap();
        assert_eq!(error.code, "NEGATIVE_CONSUMPTION");
        assert!(state.history.is_empty());
    }

    #[tokio::test]
    async fn missing_device_id_is_bad_request() {
        let app = create_router(make_state(10), &[]);

        let response = app
            .oneshot(post_json(r#"{"consumptionWatts":10}"#))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn malformed_json_is_client_error() {
        let app = create_router(make_state(10), &[]);

        let response = app.oneshot(post_json("{not json")).await.unwrap();

        assert!(response.status().is_client_error());
    }

    #[tokio::test]
    async fn history_returns_ingested_readings_in_order() {
        let app = create_router(make_state(10), &[]);

        for watts in [80, 200] {
            let body = format!(
                r#"{{"deviceId":"Fridge001","consumptionWatts":{watts},"timestamp":"2025-03-01T12:00:0{}Z"}}"#,
                watts / 100
            );
            let response = app.clone().oneshot(post_json(&body)).await.unwrap();
            assert_eq!(response.status(), StatusCode::OK);
        }

        let response = app
            .oneshot(
                Request::builder()
                    .uri("/api/history")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let body = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        let history: Vec<Reading> = serde_json::from_slice(&body).unwrap();
        assert_eq!(history.len(), 2);
        assert_eq!(history[0].consumption_watts, 80.0);
        assert_eq!(history[1].consumption_watts, 200.0);
        assert!(history[0].timestamp < history[1].timestamp);
    }

    #[tokio::test]
    async fn cors_allow_list_echoes_allowed_origin() {
        let app = create_router(make_state(10), &["http://localhost:3000".to_string()]);

        let response = app
            .oneshot(
                Request::builder()
                    .uri("/api/history")
                    .header(header::ORIGIN, "http://localhost:3000")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(
            response.headers().get(header::ACCESS_CONTROL_ALLOW_ORIGIN),
            Some(&HeaderValue::from_static("http://localhost:3000"))
        );
    }
}
