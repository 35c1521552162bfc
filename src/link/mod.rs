//! # Wireless Link Module
//!
//! Trait abstraction over the BLE transport so the connection manager
//! can be driven by a scripted link in tests.
//!
//! The real implementation, [`BleLink`], lives in [`ble`] and talks to
//! the sensor through `btleplug`.

use async_trait::async_trait;
use tokio::sync::mpsc;

use crate::error::Result;

pub mod ble;

pub use ble::BleLink;

/// Raw notification payload as delivered by the device.
pub type RawPayload = Vec<u8>;

/// Trait for the wireless telemetry link.
///
/// Implementations report failures through `Result` rather than hanging;
/// the connection manager treats every error as a cue to retry.
#[async_trait]
pub trait TelemetryLink: Send {
    /// Establish the connection to the device.
    async fn connect(&mut self) -> Result<()>;

    /// Whether the link currently reports a live connection.
    async fn is_connected(&mut self) -> bool;

    /// Subscribe to the telemetry notification channel.
    ///
    /// Returns a receiver yielding one raw payload per device
    /// notification. The channel closes when the link drops.
    async fn subscribe(&mut self) -> Result<mpsc::UnboundedReceiver<RawPayload>>;

    /// Tear down the connection. Failures are ignored; the caller is
    /// about to retry or exit anyway.
    async fn disconnect(&mut self);
}
