//! Telemetry Readings
//!
//! A [`Reading`] is one power-consumption sample reported by a household
//! device. Readings are validated once at ingestion and are never mutated
//! afterwards; the history window and every subscriber get their own copy.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

// =============================================================================
// Reading
// =============================================================================

/// A single power-consumption sample.
///
/// Serialized with camelCase keys (`deviceId`, `consumptionWatts`,
/// `timestamp`) to match the wire format used by producers and dashboards.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Reading {
    /// Opaque device identifier, e.g. `Fridge001`.
    pub device_id: String,
    /// Instantaneous consumption in watts.
    pub consumption_watts: f64,
    /// When the sample was taken (UTC).
    pub timestamp: DateTime<Utc>,
}

impl Reading {
    /// Create a new reading.
    #[must_use]
    pub fn new(
        device_id: impl Into<String>,
        consumption_watts: f64,
        timestamp: DateTime<Utc>,
    ) -> Self {
        Self {
            device_id: device_id.into(),
            consumption_watts,
            timestamp,
        }
    }

    /// Create a reading stamped with the current time.
    #[must_use]
    pub fn now(device_id: impl Into<String>, consumption_watts: f64) -> Self {
        Self::new(device_id, consumption_watts, Utc::now())
    }

    /// Check the reading against the ingestion rules.
    ///
    /// # Errors
    ///
    /// Returns [`ValidationError`] if the device id is blank or the
    /// consumption value is negative, NaN or infinite.
    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.device_id.trim().is_empty() {
            return Err(ValidationError::EmptyDeviceId);
        }

        if !self.consumption_watts.is_finite() {
            return Err(ValidationError::NonFiniteConsumption(
                self.consumption_watts,
            ));
        }

        if self.consumption_watts < 0.0 {
            return Err(ValidationError::NegativeConsumption(
                self.consumption_watts,
            ));
        }

        Ok(())
    }
}

// =============================================================================
// Errors
// =============================================================================

/// Reasons a reading is rejected at ingestion.
#[derive(Debug, Clone, Copy, PartialEq, thiserror::Error)]
pub enum ValidationError {
    /// The device id is empty or whitespace.
    #[error("device id must not be empty")]
    EmptyDeviceId,

    /// The consumption value is below zero.
    #[error("consumption must be non-negative, got {0}W")]
    NegativeConsumption(f64),

    /// The consumption value is NaN or infinite.
    #[error("consumption must be a finite number, got {0}")]
    NonFiniteConsumption(f64),
}

impl ValidationError {
    /// Stable machine-readable code for API responses.
    #[must_use]
    pub const fn code(&self) -> &'static str {
        match self {
            Self::EmptyDeviceId => "EMPTY_DEVICE_ID",
            Self::NegativeConsumption(_) => "NEGATIVE_CONSUMPTION",
            Self::NonFiniteConsumption(_) => "NON_FINITE_CONSUMPTION",
        }
    }
}

// =============================================================================
// Tests
// =============================================================================
