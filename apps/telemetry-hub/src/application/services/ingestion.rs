//! Reading Ingestion
//!
//! Validate, store, evaluate, publish. The store append always happens
//! before the reading is published, so any subscriber that sees a pushed
//! reading can rely on a history query already containing it.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use crate::application::ports::TelemetryPublisher;
use crate::domain::alert::AlertEvaluator;
use crate::domain::history::SharedHistoryStore;
use crate::domain::reading::{Reading, ValidationError};

/// Orchestrates the ingestion of a single reading.
///
/// Safe to call concurrently; the history store and the publisher carry
/// their own synchronisation.
pub struct IngestionService<P> {
    history: SharedHistoryStore,
    evaluator: AlertEvaluator,
    publisher: Arc<P>,
    accepted: AtomicU64,
    rejected: AtomicU64,
    alerts: AtomicU64,
}

impl<P: TelemetryPublisher> IngestionService<P> {
    /// Create a new ingestion service.
    #[must_use]
    pub const fn new(
        history: SharedHistoryStore,
        evaluator: AlertEvaluator,
        publisher: Arc<P>,
    ) -> Self {
        Self {
            history,
            evaluator,
            publisher,
            accepted: AtomicU64::new(0),
            rejected: AtomicU64::new(0),
            alerts: AtomicU64::new(0),
        }
    }

    /// Ingest one reading.
    ///
    /// On success the reading has been appended to history and published,
    /// followed by an alert if it crossed the threshold. On failure nothing
    /// was stored or published.
    ///
    /// # Errors
    ///
    /// Returns [`ValidationError`] if the reading fails validation.
    pub fn ingest(&self, reading: Reading) -> Result<(), ValidationError> {
        if let Err(e) = reading.validate() {
            self.rejected.fetch_add(1, Ordering::Relaxed);
            tracing::debug!(
                device_id = %reading.device_id,
                consumption_watts = reading.consumption_watts,
                error = %e,
                "Rejected reading"
            );
            return Err(e);
        }

        tracing::debug!(
            device_id = %reading.device_id,
            consumption_watts = reading.consumption_watts,
            timestamp = %reading.timestamp,
            "Received reading"
        );

        self.history.append(reading.clone());
        self.accepted.fetch_add(1, Ordering::Relaxed);

        let alert = self.evaluator.evaluate(&reading);
        self.publisher.publish_reading(reading);

        if let Some(alert) = alert {
            self.alerts.fetch_add(1, Ordering::Relaxed);
            tracing::warn!(
                device_id = %alert.device_id,
                consumption_watts = alert.consumption_watts,
                threshold_watts = self.evaluator.threshold_watts(),
                "{}",
                alert.message
            );
            self.publisher.publish_alert(alert);
        }

        Ok(())
    }

    /// Counters since startup.
    #[must_use]
    pub fn stats(&self) -> IngestStats {
        IngestStats {
            accepted: self.accepted.load(Ordering::Relaxed),
            rejected: self.rejected.load(Ordering::Relaxed),
            alerts: self.alerts.load(Ordering::Relaxed),
        }
    }

    /// The alert rule in use.
    #[must_use]
    pub const fn evaluator(&self) -> &AlertEvaluator {
        &self.evaluator
    }
}

/// Ingestion counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, serde::Serialize)]
pub struct IngestStats {
    /// Readings stored and published.
    pub accepted: u64,
    /// Readings rejected by validation.
    pub rejected: u64,
    /// Alerts raised.
    pub alerts: u64,
}

// =============================================================================
// Tests
// =============================================================================
