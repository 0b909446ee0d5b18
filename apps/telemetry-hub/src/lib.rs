#![cfg_attr(
    test,
    allow(
        clippy::unwrap_used,
        clippy::expect_used,
        clippy::float_cmp,
        clippy::significant_drop_tightening,
        clippy::too_many_lines,
        clippy::needless_pass_by_value,
        clippy::cast_precision_loss,
        clippy::cast_possible_truncation,
        clippy::cast_possible_wrap,
        clippy::items_after_statements
    )
)]

//! Telemetry Hub - Home Energy Monitoring Backend
//!
//! Accepts power readings from household devices, keeps a bounded window
//! of recent readings, raises alerts on high consumption, and pushes
//! readings and alerts live to connected dashboards.
//!
//! # Layers (inside → outside)
//!
//! - **Domain**: Readings, the history window and the alert rule
//!   - `reading`: Reading type and validation
//!   - `history`: Bounded, insertion-ordered reading store
//!   - `alert`: Threshold evaluation
//!
//! - **Application**: Use cases and port definitions
//!   - `ports`: Outbound publisher interface
//!   - `services`: Ingestion and history query
//!
//! - **Infrastructure**: Adapters and external integrations
//!   - `broadcast`: Subscriber registry and fan-out
//!   - `http`: Ingest/history endpoints and WebSocket push
//!   - `config`: Environment configuration
//!   - `health`: Health check HTTP endpoint
//!   - `simulator`: Synthetic device producer
//!
//! # Data Flow
//!
//! ```text
//!                    ┌────────────┐
//! POST /api/energy ─►│ Ingestion  │──► History window ◄── GET /api/history
//!                    │  Service   │
//!                    └─────┬──────┘
//!                          │ reading, alert
//!                    ┌─────▼──────┐
//!                    │ Broadcast  │──► /energyHub client 1
//!                    │    Hub     │──► /energyHub client 2
//!                    └────────────┘──► /energyHub client N
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::pedantic)]

// =============================================================================
// Module Declarations
// =============================================================================

/// Domain layer - Core types with no I/O.
pub mod domain;

/// Application layer - Use cases and port definitions.
pub mod application;

/// Infrastructure layer - Adapters and external integrations.
pub mod infrastructure;

// =============================================================================
// Re-exports
// =============================================================================

// Domain types
pub use domain::alert::{Alert, AlertEvaluator};
pub use domain::history::{HistoryStore, SharedHistoryStore};
pub use domain::reading::{Reading, ValidationError};

// Application
pub use application::ports::TelemetryPublisher;
pub use application::services::{HistoryQueryService, IngestStats, IngestionService};

// Infrastructure config
pub use infrastructure::config::{
    AlertSettings, BroadcastSettings, ClientSettings, ConfigError, HistorySettings, HubConfig,
    ServerSettings,
};

// Broadcast hub
pub use infrastructure::broadcast::{
    BroadcastConfig, BroadcastHub, BroadcastStats, HubEvent, SharedBroadcastHub, Subscription,
    SubscriptionId,
};

// HTTP API
pub use infrastructure::http::{ApiServer, AppState, ServerError, create_router};

// Health server
pub use infrastructure::health::{HealthServer, HealthServerError, HealthServerState};

// Metrics
pub use infrastructure::metrics::init_metrics;

// Telemetry
pub use infrastructure::telemetry::{TelemetryConfig, TelemetryGuard, init as init_telemetry};
