//! Domain Layer - Core telemetry types and business rules.
//!
//! This layer contains the reading model, the bounded history window and
//! the alert rule. Nothing here knows about HTTP, WebSockets or the
//! runtime; every type can be constructed directly in tests.

/// Telemetry readings and their validation rules.
pub mod reading;

/// Bounded, thread-safe history of recent readings.
pub mod history;

/// Threshold alert evaluation.
pub mod alert;
