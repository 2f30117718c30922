//! # Rover Bridge
//!
//! Bridges the rover's serial protocol to structured sensor and command
//! events.
//!
//! Startup wires the pieces together: configuration, the serial link, the
//! dispatcher with its live handlers, the bus with its telemetry sink, and
//! the single-slot channels carrying velocity commands and scan snapshots
//! into the 20 Hz transport loop. Ctrl+C stops the loop, which releases the
//! handlers' bus senders; dropping the last local sender then winds down the
//! sink.

use anyhow::Result;
use std::path::Path;
use tracing::info;

mod bridge;
mod bus;
mod config;
mod error;
mod proto;
mod serial;
mod steering;
mod telemetry;

use bridge::{command_slot, register_handlers, snapshot_slot, TransportLoop};
use config::Config;
use serial::RoverLink;
use steering::CommandTranslator;

/// Configuration file consulted when present
const CONFIG_PATH: &str = "config/default.toml";

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(tracing::Level::INFO.into()),
        )
        .init();

    info!("Rover Bridge v{} starting...", env!("CARGO_PKG_VERSION"));

    let config = if Path::new(CONFIG_PATH).exists() {
        Config::load(CONFIG_PATH)?
    } else {
        info!("no {} found, using built-in defaults", CONFIG_PATH);
        Config::default()
    };

    // Opening the hardware link is the one fatal step: no port, no bridge.
    let port = RoverLink::open(&config.serial)?;
    info!("Rover link opened at: {}", port.device_path());

    let (bus_tx, bus_rx) = bus::channel();
    let event_log = if config.telemetry.enabled {
        Some(telemetry::EventLog::create(Path::new(&config.telemetry.log_dir))?)
    } else {
        None
    };
    let sink = tokio::spawn(telemetry::run_sink(bus_rx, event_log));

    let mut dispatcher = proto::dispatch::Dispatcher::new();
    register_handlers(&mut dispatcher, &bus_tx);

    // Senders for the outbound slots; external inputs (a teleop socket, a
    // scan source) would hold these. Kept alive here so the loop sees an
    // open, quiet channel until such an input exists.
    let (_cmd_tx, cmd_rx) = command_slot();
    let (_scan_tx, scan_rx) = snapshot_slot();

    let translator = CommandTranslator::new(Box::new(config.steering_curve()));
    let transport = TransportLoop::new(
        port,
        dispatcher,
        translator,
        cmd_rx,
        scan_rx,
        config.link.tick_hz,
    );

    // `run` consumes the loop, so the handlers' bus sender clones are gone
    // by the time it returns.
    transport.run().await;

    // Close the last bus sender so the sink drains and exits.
    drop(bus_tx);
    sink.await?;

    info!("Rover Bridge stopped");
    Ok(())
}
