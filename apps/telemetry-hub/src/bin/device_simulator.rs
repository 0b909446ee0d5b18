//! Device Simulator Binary
//!
//! Posts synthetic readings for the stock household devices to a running
//! hub until interrupted.
//!
//! # Usage
//!
//! ```bash
//! cargo run --bin device-simulator
//! ```
//!
//! See `telemetry_hub::infrastructure::simulator` for the environment
//! variables it reads.

use telemetry_hub::infrastructure::simulator::{DeviceSimulator, SimulatorConfig, default_devices};
use telemetry_hub::{TelemetryConfig, infrastructure::telemetry};
use tokio_util::sync::CancellationToken;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let _ = dotenvy::dotenv();

    let _telemetry_guard = telemetry::init_with_config(
        TelemetryConfig::from_env().with_service_name("device-simulator"),
    );

    let config = SimulatorConfig::from_env();
    let simulator = DeviceSimulator::new(config, default_devices())?;

    let cancel = CancellationToken::new();
    let signal_cancel = cancel.clone();
    tokio::spawn(async move {
        match tokio::signal::ctrl_c().await {
            Ok(()) => {
                tracing::info!("Received Ctrl+C, stopping simulator");
                signal_cancel.cancel();
            }
            Err(e) => tracing::error!(error = %e, "Failed to install Ctrl+C handler"),
        }
    });

    simulator.run(cancel).await;
    Ok(())
}
