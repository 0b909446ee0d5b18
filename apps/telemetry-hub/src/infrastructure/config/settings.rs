//! Hub Configuration Settings
//!
//! Configuration types for the hub, loaded from environment variables.
//! Unparseable values fall back to their defaults; values that parse but
//! are out of range are rejected.

use std::time::Duration;

use crate::domain::alert::DEFAULT_ALERT_THRESHOLD_WATTS;
use crate::domain::history::{DEFAULT_HISTORY_CAPACITY, MAX_HISTORY_CAPACITY};
use crate::infrastructure::broadcast::{DEFAULT_SUBSCRIBER_BUFFER, MAX_SUBSCRIBER_BUFFER};

/// Server port settings.
#[derive(Debug, Clone)]
pub struct ServerSettings {
    /// Ingest/history/WebSocket API port.
    pub api_port: u16,
    /// Health check HTTP port.
    pub health_port: u16,
    /// Origins allowed by CORS (empty = any origin).
    pub allowed_origins: Vec<String>,
}

impl Default for ServerSettings {
    fn default() -> Self {
        Self {
            api_port: 5252,
            health_port: 8082,
            allowed_origins: Vec::new(),
        }
    }
}

/// History window settings.
#[derive(Debug, Clone)]
pub struct HistorySettings {
    /// Maximum readings retained.
    pub capacity: usize,
}

impl Default for HistorySettings {
    fn default() -> Self {
        Self {
            capacity: DEFAULT_HISTORY_CAPACITY,
        }
    }
}

/// Alert rule settings.
#[derive(Debug, Clone)]
pub struct AlertSettings {
    /// Consumption above which an alert is raised, in watts.
    pub threshold_watts: f64,
}

impl Default for AlertSettings {
    fn default() -> Self {
        Self {
            threshold_watts: DEFAULT_ALERT_THRESHOLD_WATTS,
        }
    }
}

/// Broadcast hub settings.
#[derive(Debug, Clone)]
pub struct BroadcastSettings {
    /// Events buffered per subscriber before it is dropped as unresponsive.
    pub subscriber_buffer: usize,
}

impl Default for BroadcastSettings {
    fn default() -> Self {
        Self {
            subscriber_buffer: DEFAULT_SUBSCRIBER_BUFFER,
        }
    }
}

/// Hints published to consumers; not enforced by the hub.
#[derive(Debug, Clone)]
pub struct ClientSettings {
    /// Silence after which a dashboard should show a device as offline.
    pub offline_window: Duration,
}

impl Default for ClientSettings {
    fn default() -> Self {
        Self {
            offline_window: Duration::from_millis(8000),
        }
    }
}

/// Complete hub configuration.
#[derive(Debug, Clone, Default)]
pub struct HubConfig {
    /// Server port settings.
    pub server: ServerSettings,
    /// History window settings.
    pub history: HistorySettings,
    /// Alert rule settings.
    pub alerts: AlertSettings,
    /// Broadcast hub settings.
    pub broadcast: BroadcastSettings,
    /// Consumer-side hints.
    pub client: ClientSettings,
}

impl HubConfig {
    /// Create configuration from environment variables.
    ///
    /// # Errors
    ///
    /// Returns an error if a variable holds an out-of-range value.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Create configuration from an arbitrary key lookup.
    ///
    /// # Errors
    ///
    /// Returns an error if a value is out of range.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();

        let server = ServerSettings {
            api_port: parse_or(&lookup, "HUB_API_PORT", defaults.server.api_port),
            health_port: parse_or(&lookup, "HUB_HEALTH_PORT", defaults.server.health_port),
            allowed_origins: lookup("HUB_ALLOWED_ORIGINS")
                .map(|v| parse_list(&v))
                .unwrap_or_default(),
        };

        let capacity = parse_or(&lookup, "HUB_HISTORY_CAPACITY", defaults.history.capacity);
        if !(1..=MAX_HISTORY_CAPACITY).contains(&capacity) {
            return Err(ConfigError::InvalidValue {
                key: "HUB_HISTORY_CAPACITY",
                reason: format!("must be between 1 and {MAX_HISTORY_CAPACITY}, got {capacity}"),
            });
        }

        let threshold_watts = parse_or(
            &lookup,
            "HUB_ALERT_THRESHOLD_WATTS",
            defaults.alerts.threshold_watts,
        );
        if !threshold_watts.is_finite() || threshold_watts < 0.0 {
            return Err(ConfigError::InvalidValue {
                key: "HUB_ALERT_THRESHOLD_WATTS",
                reason: format!("must be a finite, non-negative number, got {threshold_watts}"),
            });
        }

        let subscriber_buffer = parse_or(
            &lookup,
            "HUB_SUBSCRIBER_BUFFER",
            defaults.broadcast.subscriber_buffer,
        );
        if !(1..=MAX_SUBSCRIBER_BUFFER).contains(&subscriber_buffer) {
            return Err(ConfigError::InvalidValue {
                key: "HUB_SUBSCRIBER_BUFFER",
                reason: format!(
                    "must be between 1 and {MAX_SUBSCRIBER_BUFFER}, got {subscriber_buffer}"
                ),
            });
        }

        let offline_window = lookup("HUB_OFFLINE_WINDOW_MS")
            .and_then(|v| v.trim().parse::<u64>().ok())
            .map_or(defaults.client.offline_window, Duration::from_millis);

        Ok(Self {
            server,
            history: HistorySettings { capacity },
            alerts: AlertSettings { threshold_watts },
            broadcast: BroadcastSettings { subscriber_buffer },
            client: ClientSettings { offline_window },
        })
    }
}

/// Configuration error.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// A variable parsed but is out of range.
    #[error("invalid value for {key}: {reason}")]
    InvalidValue {
        /// Variable name.
        key: &'static str,
        /// What is wrong with it.
        reason: String,
    },
}

fn parse_or<F, T>(lookup: &F, key: &str, default: T) -> T
where
    F: Fn(&str) -> Option<String>,
    T: std::str::FromStr,
{
    lookup(key)
        .and_then(|v| v.trim().parse().ok())
        .unwrap_or(default)
}

fn parse_list(value: &str) -> Vec<String> {
    value
        .split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(String::from)
        .collect()
}
