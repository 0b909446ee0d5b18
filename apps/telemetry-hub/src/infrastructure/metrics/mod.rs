//! Prometheus Metrics Module
//!
//! Exposes application metrics via Prometheus format for monitoring.
//!
//! # Metrics Categories
//!
//! - **Ingestion**: readings accepted and rejected, alerts raised
//! - **Fan-out**: events published and delivered, subscribers evicted
//! - **State**: connected subscribers, history window size
//!
//! # Integration
//!
//! Metrics are exposed at `/metrics` on the health server port. Until
//! [`init_metrics`] is called the recording functions are no-ops.

use std::sync::OnceLock;

use metrics::{counter, describe_counter, describe_gauge, gauge};
use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};

// =============================================================================
// Global Metrics Handle
// =============================================================================

static PROMETHEUS_HANDLE: OnceLock<PrometheusHandle> = OnceLock::new();

/// Initialize the Prometheus metrics recorder.
///
/// # Panics
///
/// Panics if another global recorder is already installed.
#[allow(clippy::expect_used)]
pub fn init_metrics() -> PrometheusHandle {
    PROMETHEUS_HANDLE
        .get_or_init(|| {
            let handle = PrometheusBuilder::new()
                .install_recorder()
                .expect("failed to install Prometheus recorder");

            register_metrics();
            handle
        })
        .clone()
}

/// Get the Prometheus handle for rendering metrics.
///
/// Returns `None` if metrics have not been initialized.
#[must_use]
pub fn get_metrics_handle() -> Option<PrometheusHandle> {
    PROMETHEUS_HANDLE.get().cloned()
}

// =============================================================================
// Metric Registration
// =============================================================================

fn register_metrics() {
    describe_counter!(
        "telemetry_hub_readings_ingested_total",
        "Readings accepted and stored"
    );
    describe_counter!(
        "telemetry_hub_readings_rejected_total",
        "Readings rejected by validation, by reason"
    );
    describe_counter!(
        "telemetry_hub_events_published_total",
        "Events handed to the broadcast hub, by kind"
    );
    describe_counter!(
        "telemetry_hub_events_delivered_total",
        "Events queued to individual subscribers, by kind"
    );
    describe_counter!(
        "telemetry_hub_subscribers_evicted_total",
        "Subscribers dropped after a failed delivery"
    );

    describe_gauge!(
        "telemetry_hub_subscribers",
        "Number of registered live subscribers"
    );
    describe_gauge!(
        "telemetry_hub_history_length",
        "Readings currently held in the history window"
    );
}

// =============================================================================
// Metric Recording Functions
// =============================================================================

/// Metric label for pushed event kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventKind {
    /// Reading update.
    Reading,
    /// Threshold alert.
    Alert,
}

impl EventKind {
    const fn as_str(self) -> &'static str {
        match self {
            Self::Reading => "reading",
            Self::Alert => "alert",
        }
    }
}

/// Record an accepted reading.
pub fn record_reading_ingested() {
    counter!("telemetry_hub_readings_ingested_total").increment(1);
}

/// Record a rejected reading.
pub fn record_reading_rejected(reason: &'static str) {
    counter!(
        "telemetry_hub_readings_rejected_total",
        "reason" => reason
    )
    .increment(1);
}

/// Record an event handed to the hub.
pub fn record_event_published(kind: EventKind) {
    counter!(
        "telemetry_hub_events_published_total",
        "kind" => kind.as_str()
    )
    .increment(1);
}

/// Record per-subscriber deliveries of one event.
pub fn record_events_delivered(kind: EventKind, count: u64) {
    counter!(
        "telemetry_hub_events_delivered_total",
        "kind" => kind.as_str()
    )
    .increment(count);
}

/// Record subscribers dropped after a failed delivery.
pub fn record_subscribers_evicted(count: u64) {
    counter!("telemetry_hub_subscribers_evicted_total").increment(count);
}

/// Update the connected subscriber gauge.
#[allow(clippy::cast_precision_loss)]
pub fn set_subscribers(count: usize) {
    gauge!("telemetry_hub_subscribers").set(count as f64);
}

/// Update the history length gauge.
#[allow(clippy::cast_precision_loss)]
pub fn set_history_length(len: usize) {
    gauge!("telemetry_hub_history_length").set(len as f64);
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn event_kind_as_str() {
        assert_eq!(EventKind::Reading.as_str(), "reading");
        assert_eq!(EventKind::Alert.as_str(), "alert");
    }

    #[test]
    fn recording_without_recorder_is_harmless() {
        record_reading_ingested();
        record_reading_rejected("EMPTY_DEVICE_ID");
        record_event_published(EventKind::Alert);
        set_subscribers(3);
    }
}
