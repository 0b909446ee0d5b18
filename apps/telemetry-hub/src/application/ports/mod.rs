//! Port Interfaces
//!
//! Defines the interfaces (ports) the application layer depends on,
//! following the Hexagonal Architecture pattern. Infrastructure adapters
//! implement these.
//!
//! ## Driven Ports (Outbound)
//!
//! - `TelemetryPublisher`: fan-out of readings and alerts to subscribers

use crate::domain::alert::Alert;
use crate::domain::reading::Reading;

/// Outbound delivery of ingested readings and derived alerts.
///
/// Publishing is best-effort: implementations absorb delivery failures and
/// never report them back to the caller.
#[cfg_attr(test, mockall::automock)]
pub trait TelemetryPublisher: Send + Sync {
    /// Deliver a reading to every current subscriber.
    fn publish_reading(&self, reading: Reading);

    /// Deliver an alert to every current subscriber.
    fn publish_alert(&self, alert: Alert);
}
