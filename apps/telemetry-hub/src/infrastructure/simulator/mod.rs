//! Device Simulator
//!
//! Synthetic producer that posts readings for a fixed set of household
//! devices to the hub's ingest endpoint.
//!
//! # Environment Variables
//!
//! - `SIMULATOR_TARGET_URL`: Ingest endpoint (default: <http://localhost:5252/api/energy>)
//! - `SIMULATOR_DEVICE_INTERVAL_MS`: Pause between devices (default: 2000)
//! - `SIMULATOR_ROUND_INTERVAL_MS`: Pause between rounds (default: 3000)
//! - `SIMULATOR_REQUEST_TIMEOUT_MS`: Per-request timeout (default: 5000)
//! - `SIMULATOR_RETRY_INITIAL_MS`: First retry delay (default: 500)
//! - `SIMULATOR_RETRY_MAX_MS`: Retry delay cap (default: 10000)
//! - `SIMULATOR_RETRY_MAX_ATTEMPTS`: Retries per reading, 0 = unlimited (default: 5)

mod backoff;

use std::time::Duration;

use rand::Rng;
use reqwest::{Client, StatusCode};
use tokio_util::sync::CancellationToken;

pub use backoff::{RetryConfig, RetryPolicy};

use crate::domain::reading::Reading;

/// Maximum deviation of a sample from its device's base load, in watts.
pub const SAMPLE_SPREAD_WATTS: f64 = 50.0;

// =============================================================================
// Devices
// =============================================================================

/// A simulated device with a nominal load.
#[derive(Debug, Clone, PartialEq)]
pub struct DeviceProfile {
    /// Identifier sent with each reading.
    pub device_id: String,
    /// Nominal consumption in watts.
    pub base_watts: f64,
}

impl DeviceProfile {
    /// Create a device profile.
    #[must_use]
    pub fn new(device_id: impl Into<String>, base_watts: f64) -> Self {
        Self {
            device_id: device_id.into(),
            base_watts,
        }
    }

    /// Draw one reading: base load plus uniform noise, never negative,
    /// rounded to whole watts and stamped now.
    pub fn sample<R: Rng + ?Sized>(&self, rng: &mut R) -> Reading {
        let noise = rng.random_range(-SAMPLE_SPREAD_WATTS..SAMPLE_SPREAD_WATTS);
        let watts = (self.base_watts + noise).max(0.0).round();
        Reading::now(self.device_id.clone(), watts)
    }
}

/// The stock household: a fridge, a washing machine and the lights.
#[must_use]
pub fn default_devices() -> Vec<DeviceProfile> {
    vec![
        DeviceProfile::new("Fridge001", 80.0),
        DeviceProfile::new("WashingMachine002", 120.0),
        DeviceProfile::new("Lights003", 50.0),
    ]
}

// =============================================================================
// Configuration
// =============================================================================

/// Simulator configuration.
#[derive(Debug, Clone)]
pub struct SimulatorConfig {
    /// Ingest endpoint.
    pub target_url: String,
    /// Pause after each device.
    pub device_interval: Duration,
    /// Pause after each full round.
    pub round_interval: Duration,
    /// Per-request timeout.
    pub request_timeout: Duration,
    /// Retry behavior for failed sends.
    pub retry: RetryConfig,
}

impl Default for SimulatorConfig {
    fn default() -> Self {
        Self {
            target_url: "http://localhost:5252/api/energy".to_string(),
            device_interval: Duration::from_millis(2000),
            round_interval: Duration::from_millis(3000),
            request_timeout: Duration::from_millis(5000),
            retry: RetryConfig::default(),
        }
    }
}

impl SimulatorConfig {
    /// Create configuration from environment variables.
    #[must_use]
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Create configuration from an arbitrary key lookup. Unparseable values
    /// keep their defaults.
    #[must_use]
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();
        let millis = |key: &str, default: Duration| {
            lookup(key)
                .and_then(|v| v.trim().parse::<u64>().ok())
                .map_or(default, Duration::from_millis)
        };

        let retry = RetryConfig {
            initial_delay: millis("SIMULATOR_RETRY_INITIAL_MS", defaults.retry.initial_delay),
            max_delay: millis("SIMULATOR_RETRY_MAX_MS", defaults.retry.max_delay),
            max_attempts: lookup("SIMULATOR_RETRY_MAX_ATTEMPTS")
                .and_then(|v| v.trim().parse().ok())
                .unwrap_or(defaults.retry.max_attempts),
            ..defaults.retry
        };

        Self {
            target_url: lookup("SIMULATOR_TARGET_URL")
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
                .unwrap_or(defaults.target_url),
            device_interval: millis("SIMULATOR_DEVICE_INTERVAL_MS", defaults.device_interval),
            round_interval: millis("SIMULATOR_ROUND_INTERVAL_MS", defaults.round_interval),
            request_timeout: millis("SIMULATOR_REQUEST_TIMEOUT_MS", defaults.request_timeout),
            retry,
        }
    }
}

// =============================================================================
// Client
// =============================================================================

/// HTTP client that posts readings with retry.
#[derive(Debug, Clone)]
pub struct EnergyClient {
    client: Client,
    target_url: String,
    retry: RetryConfig,
}

impl EnergyClient {
    /// Create a client from config.
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP client cannot be built.
    pub fn new(config: &SimulatorConfig) -> Result<Self, SimulatorError> {
        let client = Client::builder()
            .timeout(config.request_timeout)
            .build()
            .map_err(|e| SimulatorError::ClientBuild(e.to_string()))?;

        Ok(Self {
            client,
            target_url: config.target_url.clone(),
            retry: config.retry.clone(),
        })
    }

    /// Post one reading, retrying transport failures and retryable statuses.
    ///
    /// # Errors
    ///
    /// Returns `Rejected` if the hub refuses the reading, or
    /// `MaxRetriesExceeded` once the retry budget is spent.
    pub async fn send(&self, reading: &Reading) -> Result<(), SimulatorError> {
        let mut policy = RetryPolicy::new(self.retry.clone());

        loop {
            let failure = match self.client.post(&self.target_url).json(reading).send().await {
                Ok(response) => {
                    let status = response.status();
                    if status.is_success() {
                        return Ok(());
                    }
                    if !is_retryable(status) {
                        let body = response.text().await.unwrap_or_default();
                        return Err(SimulatorError::Rejected {
                            status: status.as_u16(),
                            body,
                        });
                    }
                    format!("status {status}")
                }
                Err(e) => e.to_string(),
            };

            let Some(delay) = policy.next_delay() else {
                return Err(SimulatorError::MaxRetriesExceeded {
                    attempts: policy.attempt_count(),
                    last_error: failure,
                });
            };

            tracing::warn!(
                device_id = %reading.device_id,
                error = %failure,
                delay_ms = delay.as_millis(),
                attempt = policy.attempt_count(),
                "Send failed, retrying"
            );
            tokio::time::sleep(delay).await;
        }
    }
}

const fn is_retryable(status: StatusCode) -> bool {
    matches!(status.as_u16(), 408 | 429 | 500..=599)
}

// =============================================================================
// Runner
// =============================================================================

/// Cycles through the devices until cancelled.
pub struct DeviceSimulator {
    config: SimulatorConfig,
    devices: Vec<DeviceProfile>,
    client: EnergyClient,
}

impl DeviceSimulator {
    /// Create a simulator for the given devices.
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP client cannot be built.
    pub fn new(
        config: SimulatorConfig,
        devices: Vec<DeviceProfile>,
    ) -> Result<Self, SimulatorError> {
        let client = EnergyClient::new(&config)?;
        Ok(Self {
            config,
            devices,
            client,
        })
    }

    /// Send readings round after round until `cancel` fires.
    pub async fn run(&self, cancel: CancellationToken) {
        tracing::info!(
            target_url = %self.config.target_url,
            devices = self.devices.len(),
            "Simulator started"
        );

        loop {
            for device in &self.devices {
                let reading = device.sample(&mut rand::rng());

                tokio::select! {
                    () = cancel.cancelled() => break,
                    result = self.client.send(&reading) => match result {
                        Ok(()) => tracing::info!(
                            device_id = %reading.device_id,
                            consumption_watts = reading.consumption_watts,
                            "Sent reading"
                        ),
                        Err(e) => tracing::error!(
                            device_id = %reading.device_id,
                            error = %e,
                            "Failed to send reading"
                        ),
                    },
                }

                if sleep_or_cancel(self.config.device_interval, &cancel).await {
                    break;
                }
            }

            if cancel.is_cancelled() || sleep_or_cancel(self.config.round_interval, &cancel).await
            {
                break;
            }
        }

        tracing::info!("Simulator stopped");
    }
}

/// Returns `true` if cancelled before the sleep finished.
async fn sleep_or_cancel(duration: Duration, cancel: &CancellationToken) -> bool {
    tokio::select! {
        () = cancel.cancelled() => true,
        () = tokio::time::sleep(duration) => false,
    }
}

// =============================================================================
// Errors
// =============================================================================

/// Simulator errors.
#[derive(Debug, thiserror::Error)]
pub enum SimulatorError {
    /// HTTP client could not be constructed.
    #[error("failed to build HTTP client: {0}")]
    ClientBuild(String),

    /// The hub answered with a non-retryable status.
    #[error("reading rejected with status {status}: {body}")]
    Rejected {
        /// HTTP status code.
        status: u16,
        /// Response body.
        body: String,
    },

    /// Gave up after repeated failures.
    #[error("gave up after {attempts} retries: {last_error}")]
    MaxRetriesExceeded {
        /// Retries made.
        attempts: u32,
        /// The final failure.
        last_error: String,
    },
}

// =============================================================================
// Tests
// =============================================================================
