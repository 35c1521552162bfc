//! # BLE Link
//!
//! `btleplug`-backed implementation of [`TelemetryLink`].
//!
//! This module handles:
//! - Scanning for the sensor by its fixed Bluetooth address
//! - Connecting and discovering the telemetry service
//! - Subscribing to the notification characteristic
//! - Forwarding raw notification payloads into the manager's channel

use async_trait::async_trait;
use btleplug::api::{Central, Manager as _, Peripheral as _, ScanFilter};
use btleplug::platform::{Adapter, Manager, Peripheral};
use futures::StreamExt;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::config::LinkConfig;
use crate::error::{PowerLoggerError, Result};
use crate::link::{RawPayload, TelemetryLink};

/// How often the scan loop re-checks the discovered peripheral list
const SCAN_POLL_INTERVAL: Duration = Duration::from_millis(500);

/// BLE connection to the telemetry sensor.
///
/// One instance manages at most one peripheral at a time; the
/// connection manager drives the connect/subscribe/disconnect cycle.
pub struct BleLink {
    /// Device Bluetooth address, e.g. `20:6E:F1:6B:C2:AA`
    address: String,
    /// Notification characteristic carrying the telemetry stream
    characteristic: Uuid,
    scan_timeout: Duration,
    peripheral: Option<Peripheral>,
    forward_task: Option<JoinHandle<()>>,
}

impl std::fmt::Debug for BleLink {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BleLink")
            .field("address", &self.address)
            .field("characteristic", &self.characteristic)
            .finish_non_exhaustive()
    }
}

impl BleLink {
    /// Build a link for the device described by `config`.
    ///
    /// # Errors
    ///
    /// Returns error if the configured characteristic UUID does not
    /// parse.
    pub fn new(config: &LinkConfig) -> Result<Self> {
        let characteristic = Uuid::parse_str(&config.characteristic_uuid).map_err(|e| {
            PowerLoggerError::Link(format!(
                "invalid characteristic UUID {:?}: {}",
                config.characteristic_uuid, e
            ))
        })?;

        Ok(Self {
            address: config.device_address.clone(),
            characteristic,
            scan_timeout: Duration::from_secs(config.scan_timeout_s),
            peripheral: None,
            forward_task: None,
        })
    }

    /// Scan until the configured device shows up or the timeout expires.
    async fn find_peripheral(&self, adapter: &Adapter) -> Result<Peripheral> {
        let deadline = tokio::time::Instant::now() + self.scan_timeout;
        loop {
            let peripherals = adapter
                .peripherals()
                .await
                .map_err(|e| PowerLoggerError::Link(format!("peripheral listing failed: {}", e)))?;

            for peripheral in peripherals {
                if peripheral
                    .address()
                    .to_string()
                    .eq_ignore_ascii_case(&self.address)
                {
                    return Ok(peripheral);
                }
            }

            if tokio::time::Instant::now() >= deadline {
                return Err(PowerLoggerError::DeviceNotFound(self.address.clone()));
            }
            tokio::time::sleep(SCAN_POLL_INTERVAL).await;
        }
    }
}

#[async_trait]
impl TelemetryLink for BleLink {
    /// Scan for the sensor and connect to it.
    ///
    /// # Errors
    ///
    /// Returns error if no Bluetooth adapter is available, the device
    /// does not appear within the scan timeout, or the connection
    /// cannot be established.
    async fn connect(&mut self) -> Result<()> {
        let manager = Manager::new()
            .await
            .map_err(|e| PowerLoggerError::Link(format!("BLE manager init failed: {}", e)))?;

        let adapter = manager
            .adapters()
            .await
            .map_err(|e| PowerLoggerError::Link(format!("adapter listing failed: {}", e)))?
            .into_iter()
            .next()
            .ok_or_else(|| PowerLoggerError::Link("no Bluetooth adapter available".to_string()))?;

        debug!(address = %self.address, "scanning for sensor");
        adapter
            .start_scan(ScanFilter::default())
            .await
            .map_err(|e| PowerLoggerError::Link(format!("scan start failed: {}", e)))?;

        let found = self.find_peripheral(&adapter).await;
        if let Err(e) = adapter.stop_scan().await {
            debug!(error = %e, "failed to stop scan");
        }
        let peripheral = found?;

        peripheral
            .connect()
            .await
            .map_err(|e| PowerLoggerError::Link(format!("connect to {} failed: {}", self.address, e)))?;

        // The stack sometimes reports the connection late; retry the
        // explicit connect once before giving up on this cycle
        if !peripheral.is_connected().await.unwrap_or(false) {
            warn!(address = %self.address, "not connected after connect, retrying once");
            peripheral
                .connect()
                .await
                .map_err(|e| PowerLoggerError::Link(format!("reconnect attempt failed: {}", e)))?;
        }
        if !peripheral.is_connected().await.unwrap_or(false) {
            return Err(PowerLoggerError::Link(format!(
                "link to {} reports not connected after connect",
                self.address
            )));
        }

        peripheral
            .discover_services()
            .await
            .map_err(|e| PowerLoggerError::Link(format!("service discovery failed: {}", e)))?;

        info!(address = %self.address, "connected to sensor");
        self.peripheral = Some(peripheral);
        Ok(())
    }

    async fn is_connected(&mut self) -> bool {
        match &self.peripheral {
            Some(peripheral) => peripheral.is_connected().await.unwrap_or(false),
            None => false,
        }
    }

    /// Subscribe to the telemetry characteristic and start forwarding
    /// notification payloads.
    ///
    /// # Errors
    ///
    /// Returns error if called before [`connect`](Self::connect), the
    /// characteristic is missing from the discovered services, or the
    /// subscription fails.
    async fn subscribe(&mut self) -> Result<mpsc::UnboundedReceiver<RawPayload>> {
        let peripheral = self
            .peripheral
            .as_ref()
            .ok_or_else(|| PowerLoggerError::Link("subscribe called before connect".to_string()))?;

        let characteristic = peripheral
            .characteristics()
            .into_iter()
            .find(|c| c.uuid == self.characteristic)
            .ok_or_else(|| {
                PowerLoggerError::Link(format!(
                    "characteristic {} not found on device",
                    self.characteristic
                ))
            })?;

        peripheral
            .subscribe(&characteristic)
            .await
            .map_err(|e| PowerLoggerError::Link(format!("subscribe failed: {}", e)))?;

        let mut notifications = peripheral
            .notifications()
            .await
            .map_err(|e| PowerLoggerError::Link(format!("notification stream failed: {}", e)))?;

        let (tx, rx) = mpsc::unbounded_channel();
        let wanted = self.characteristic;
        let task = tokio::spawn(async move {
            while let Some(notification) = notifications.next().await {
                if notification.uuid != wanted {
                    continue;
                }
                if tx.send(notification.value).is_err() {
                    // Manager went away; nothing left to forward to
                    break;
                }
            }
            debug!("notification stream ended");
        });

        self.forward_task = Some(task);
        info!(characteristic = %self.characteristic, "notifications started");
        Ok(rx)
    }

    async fn disconnect(&mut self) {
        if let Some(task) = self.forward_task.take() {
            task.abort();
        }
        if let Some(peripheral) = self.peripheral.take() {
            if let Err(e) = peripheral.disconnect().await {
                debug!(error = %e, "disconnect failed");
            }
        }
    }
}
