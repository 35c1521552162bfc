//! # Power Logger
//!
//! Log and watch power telemetry streamed from an INA226 current sensor
//! over BLE.
//!
//! The binary wires the pipeline together and runs it until interrupted:
//!
//! 1. **Initialization**
//!    - Load configuration (TOML file, falling back to built-in defaults)
//!    - Set up logging to the console and a rolling file
//!    - Create the sample queue, output session, and BLE link
//!
//! 2. **Acquisition** (background task)
//!    - The connection manager connects to the sensor, subscribes to
//!      telemetry notifications, persists every valid sample, and hands
//!      it to the queue, retrying forever on any link failure
//!
//! 3. **Consumption** (main task)
//!    - The consumption loop drains the queue on a fixed cadence,
//!      maintains the sliding window, and redraws the live view
//!    - Ctrl+C stops both loops cleanly between cycles

use anyhow::Result;
use std::time::Duration;
use tokio::sync::watch;
use tracing::{info, warn};
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

use power_logger::config::Config;
use power_logger::display::{ConsumptionLoop, LiveView, TextDashboard};
use power_logger::link::BleLink;
use power_logger::manager::ConnectionManager;
use power_logger::queue::SampleQueue;
use power_logger::session::OutputSession;

/// Configuration file consulted at start; defaults apply when absent
const CONFIG_PATH: &str = "config/default.toml";

/// How long to wait for the connection manager to stop on shutdown
const MANAGER_STOP_TIMEOUT: Duration = Duration::from_secs(2);

#[tokio::main]
async fn main() -> Result<()> {
    let config = Config::load_or_default(CONFIG_PATH)?;
    let _log_guard = init_logging(&config.storage.log_dir);

    info!("Power Logger v{} starting...", env!("CARGO_PKG_VERSION"));
    info!(
        address = %config.link.device_address,
        characteristic = %config.link.characteristic_uuid,
        "sensor configuration"
    );

    let queue = SampleQueue::new();
    let session = OutputSession::new(&config.storage.log_dir, &config.storage.fallback_file);
    let link = BleLink::new(&config.link)?;

    let (shutdown_tx, shutdown_rx) = watch::channel(false);

    // Acquisition runs on its own task; the queue is the only thing the
    // two loops share
    let mut manager = ConnectionManager::new(link, queue.clone(), session, &config.link);
    let manager_shutdown = shutdown_rx.clone();
    let manager_task = tokio::spawn(async move { manager.run(manager_shutdown).await });

    let view: Option<Box<dyn LiveView>> = if config.display.live_view {
        Some(Box::new(TextDashboard::new()))
    } else {
        info!("live view disabled, echoing samples textually");
        None
    };
    let mut consumer = ConsumptionLoop::new(queue, config.display.window_size, view);

    let cadence = Duration::from_millis(config.display.redraw_interval_ms);
    info!(
        cadence_ms = config.display.redraw_interval_ms,
        window = config.display.window_size,
        "starting consumption loop"
    );
    info!("Press Ctrl+C to exit");

    tokio::select! {
        _ = consumer.run(cadence, shutdown_rx) => {}
        _ = tokio::signal::ctrl_c() => {
            info!("Received Ctrl+C, shutting down...");
        }
    }

    let _ = shutdown_tx.send(true);

    // Flush anything still queued so the window totals match the log
    consumer.run_cycle();

    if tokio::time::timeout(MANAGER_STOP_TIMEOUT, manager_task)
        .await
        .is_err()
    {
        warn!("connection manager did not stop in time");
    }

    Ok(())
}

fn init_logging(log_dir: &str) -> tracing_appender::non_blocking::WorkerGuard {
    let file_appender = tracing_appender::rolling::daily(log_dir, "power-logger.log");
    let (file_writer, guard) = tracing_appender::non_blocking(file_appender);

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(tracing::Level::INFO.into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .with(
            tracing_subscriber::fmt::layer()
                .with_writer(file_writer)
                .with_ansi(false),
        )
        .init();

    guard
}
