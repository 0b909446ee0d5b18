//! Telemetry Hub Binary
//!
//! Starts the ingest API, the live push channel and the health server.
//!
//! # Usage
//!
//! ```bash
//! cargo run --bin telemetry-hub
//! ```
//!
//! # Environment Variables
//!
//! - `HUB_API_PORT`: Ingest/history/WebSocket port (default: 5252)
//! - `HUB_HEALTH_PORT`: Health check HTTP port (default: 8082)
//! - `HUB_HISTORY_CAPACITY`: Readings retained (default: 1000)
//! - `HUB_ALERT_THRESHOLD_WATTS`: Alert threshold (default: 170.0)
//! - `HUB_SUBSCRIBER_BUFFER`: Per-subscriber event buffer (default: 256)
//! - `HUB_OFFLINE_WINDOW_MS`: Offline hint for dashboards (default: 8000)
//! - `HUB_ALLOWED_ORIGINS`: Comma-separated CORS origins (default: any)
//! - `OTEL_ENABLED`: Export spans over OTLP (default: false)
//! - `OTEL_EXPORTER_OTLP_ENDPOINT`: OTLP endpoint (default: <http://localhost:4317>)
//! - `RUST_LOG`: Log level (default: info)

use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use telemetry_hub::infrastructure::telemetry;
use telemetry_hub::{
    AlertEvaluator, ApiServer, AppState, BroadcastConfig, BroadcastHub, HealthServer,
    HealthServerState, HistoryQueryService, HistoryStore, HubConfig, IngestionService,
    create_router, init_metrics,
};
use tokio::signal;
use tokio_util::sync::CancellationToken;

/// Graceful shutdown timeout.
const SHUTDOWN_TIMEOUT: Duration = Duration::from_secs(10);

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    load_dotenv();

    // Initialize telemetry (tracing + optional OTLP export)
    let _telemetry_guard = telemetry::init();

    tracing::info!("Starting Telemetry Hub");

    // Initialize Prometheus metrics
    let _metrics_handle = init_metrics();

    let config = HubConfig::from_env().context("invalid hub configuration")?;
    log_config(&config);

    let shutdown_token = CancellationToken::new();

    let history = Arc::new(HistoryStore::new(config.history.capacity));
    let hub = Arc::new(BroadcastHub::new(BroadcastConfig::from(
        config.broadcast.clone(),
    )));
    let ingestion = Arc::new(IngestionService::new(
        Arc::clone(&history),
        AlertEvaluator::new(config.alerts.threshold_watts),
        Arc::clone(&hub),
    ));
    let history_query = HistoryQueryService::new(history);

    // Initialize health server
    let health_state = Arc::new(HealthServerState::new(
        env!("CARGO_PKG_VERSION").to_string(),
        Arc::clone(&ingestion),
        history_query.clone(),
        Arc::clone(&hub),
        config.client.offline_window,
    ));
    let health_server = HealthServer::new(
        config.server.health_port,
        Arc::clone(&health_state),
        shutdown_token.clone(),
    );

    // Initialize API server
    let router = create_router(
        AppState::new(ingestion, history_query, hub),
        &config.server.allowed_origins,
    );
    let api_server = ApiServer::new(config.server.api_port, router, shutdown_token.clone());

    let health_handle = tokio::spawn(async move {
        if let Err(e) = health_server.run().await {
            tracing::error!(error = %e, "Health server error");
        }
    });

    let api_shutdown = shutdown_token.clone();
    let api_handle = tokio::spawn(async move {
        if let Err(e) = api_server.run().await {
            tracing::error!(error = %e, "API server error");
            // Nothing to serve without the API; bring the process down.
            api_shutdown.cancel();
        }
    });

    tracing::info!("Telemetry hub ready");

    await_shutdown(shutdown_token).await;
    health_state.mark_draining();

    let drained = tokio::time::timeout(SHUTDOWN_TIMEOUT, async {
        let _ = tokio::join!(api_handle, health_handle);
    })
    .await;
    if drained.is_err() {
        tracing::warn!(
            timeout_secs = SHUTDOWN_TIMEOUT.as_secs(),
            "Servers did not stop in time"
        );
    }

    tracing::info!("Telemetry hub stopped");
    Ok(())
}

/// Log the parsed configuration.
fn log_config(config: &HubConfig) {
    tracing::info!(
        api_port = config.server.api_port,
        health_port = config.server.health_port,
        history_capacity = config.history.capacity,
        alert_threshold_watts = config.alerts.threshold_watts,
        subscriber_buffer = config.broadcast.subscriber_buffer,
        "Configuration loaded"
    );
    tracing::debug!(
        allowed_origins = ?config.server.allowed_origins,
        offline_window_ms = config.client.offline_window.as_millis(),
        "Client settings"
    );
}

/// Load .env file from current directory or any ancestor directory.
fn load_dotenv() {
    if dotenvy::dotenv().is_ok() {
        return;
    }

    if let Ok(cwd) = std::env::current_dir() {
        let mut dir = cwd.as_path();
        while let Some(parent) = dir.parent() {
            let env_path = parent.join(".env");
            if env_path.exists() {
                let _ = dotenvy::from_path(&env_path);
                return;
            }
            dir = parent;
        }
    }
}

/// Wait for shutdown signal (SIGTERM or SIGINT) or an internal cancel.
#[allow(clippy::expect_used)]
async fn await_shutdown(shutdown_token: CancellationToken) {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("signal handler installation is critical for graceful shutdown");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("SIGTERM handler installation is critical for graceful shutdown")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {
            tracing::info!("Received Ctrl+C, initiating shutdown");
        }
        () = terminate => {
            tracing::info!("Received SIGTERM, initiating shutdown");
        }
        () = shutdown_token.cancelled() => {
            tracing::info!("Internal shutdown requested");
        }
    }

    shutdown_token.cancel();

    tracing::info!(
        timeout_secs = SHUTDOWN_TIMEOUT.as_secs(),
        "Graceful shutdown started"
    );
}
