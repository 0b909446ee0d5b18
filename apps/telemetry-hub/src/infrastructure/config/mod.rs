//! Configuration Module
//!
//! Configuration loading for the hub service, from environment variables.

mod settings;

pub use settings::{
    AlertSettings, BroadcastSettings, ClientSettings, ConfigError, HistorySettings, HubConfig,
    ServerSettings,
};
