//! Infrastructure Layer - Adapters and external integrations.
//!
//! This layer contains the concrete implementations of the port interfaces
//! defined in the application layer.

/// Subscriber registry and event fan-out.
pub mod broadcast;

/// Configuration loading.
pub mod config;

/// Health check HTTP endpoint.
pub mod health;

/// Ingest, history and live-push API.
pub mod http;

/// Prometheus metrics instrumentation.
pub mod metrics;

/// Synthetic reading producer.
pub mod simulator;

/// OpenTelemetry tracing integration.
pub mod telemetry;
