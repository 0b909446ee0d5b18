//! High Consumption Alerts
//!
//! An [`Alert`] is derived from a single [`Reading`] whose consumption is
//! strictly above the configured threshold. Alerts are transient: they are
//! pushed to subscribers and never stored.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::reading::Reading;

/// Default alert threshold in watts.
pub const DEFAULT_ALERT_THRESHOLD_WATTS: f64 = 170.0;

// =============================================================================
// Alert
// =============================================================================

/// Notification that a device exceeded the consumption threshold.
///
/// On the wire the wattage is named `consumption`, matching what dashboard
/// clients already consume.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Alert {
    /// Human-readable alert text.
    pub message: String,
    /// Device that triggered the alert.
    pub device_id: String,
    /// Consumption of the triggering reading, in watts.
    #[serde(rename = "consumption")]
    pub consumption_watts: f64,
    /// Timestamp of the triggering reading.
    pub timestamp: DateTime<Utc>,
}

// =============================================================================
// Evaluator
// =============================================================================

/// Stateless threshold rule.
///
/// # Example
///
/// ```rust
/// use telemetry_hub::domain::alert::AlertEvaluator;
/// use telemetry_hub::domain::reading::Reading;
///
/// let evaluator = AlertEvaluator::default();
/// assert!(evaluator.evaluate(&Reading::now("Fridge001", 80.0)).is_none());
///
/// let alert = evaluator.evaluate(&Reading::now("Fridge001", 200.0)).unwrap();
/// assert_eq!(alert.message, "Fridge001 is consuming high energy: 200W!");
/// ```
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AlertEvaluator {
    threshold_watts: f64,
}

impl AlertEvaluator {
    /// Create an evaluator with the given threshold.
    #[must_use]
    pub const fn new(threshold_watts: f64) -> Self {
        Self { threshold_watts }
    }

    /// The configured threshold in watts.
    #[must_use]
    pub const fn threshold_watts(&self) -> f64 {
        self.threshold_watts
    }

    /// Produce an alert if the reading is strictly above the threshold.
    #[must_use]
    pub fn evaluate(&self, reading: &Reading) -> Option<Alert> {
        if reading.consumption_watts <= self.threshold_watts {
            return None;
        }

        Some(Alert {
            message: format!(
                "{} is consuming high energy: {}W!",
                reading.device_id, reading.consumption_watts
            ),
            device_id: reading.device_id.clone(),
            consumption_watts: reading.consumption_watts,
            timestamp: reading.timestamp,
        })
    }
}

impl Default for AlertEvaluator {
    fn default() -> Self {
        Self::new(DEFAULT_ALERT_THRESHOLD_WATTS)
    }
}

// =============================================================================
// Tests
// =============================================================================
