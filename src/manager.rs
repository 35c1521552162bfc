//! # Connection Manager
//!
//! Owns the wireless link lifecycle and feeds the acquisition side of
//! the pipeline.
//!
//! The manager is an explicit state machine driven by a loop, so every
//! transition and its trigger condition is auditable in one place:
//!
//! - `Disconnected -> Connecting`: on loop start
//! - `Connecting -> Connected`: link confirmed and notifications live
//! - `Connecting -> Retrying`: connect or subscribe failed, or the link
//!   reported not-connected right after connecting
//! - `Connected -> Retrying`: liveness poll saw a dead link, or the
//!   notification stream ended
//! - `Retrying -> Connecting`: after a fixed backoff delay (constant,
//!   not exponential; device power cycling is the expected cause)
//!
//! There is no terminal state. The loop runs until the shutdown signal
//! fires; every link error is caught and demoted to a retry, and
//! parse or persistence failures never end a link session.

use std::time::Duration;

use tokio::sync::{mpsc, watch};
use tokio::time::MissedTickBehavior;
use tracing::{debug, info, warn};

use crate::config::LinkConfig;
use crate::error::{PowerLoggerError, Result};
use crate::frame::parse_frame;
use crate::link::{RawPayload, TelemetryLink};
use crate::queue::SampleQueue;
use crate::session::OutputSession;

/// Connection lifecycle states
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LinkState {
    Disconnected,
    Connecting,
    Connected,
    Retrying,
}

/// Long-lived owner of the wireless link.
///
/// For every raw payload the link delivers, the manager parses it,
/// appends the sample to the output session, then pushes it onto the
/// queue, in that order, so a sample is durably recorded before it can
/// be visualized. Rejected payloads are logged and dropped.
pub struct ConnectionManager<L: TelemetryLink> {
    link: L,
    queue: SampleQueue,
    session: OutputSession,
    reconnect_delay: Duration,
    liveness_interval: Duration,
    payloads: Option<mpsc::UnboundedReceiver<RawPayload>>,
}

impl<L: TelemetryLink> ConnectionManager<L> {
    pub fn new(link: L, queue: SampleQueue, session: OutputSession, config: &LinkConfig) -> Self {
        Self {
            link,
            queue,
            session,
            reconnect_delay: Duration::from_secs(config.reconnect_delay_s),
            liveness_interval: Duration::from_millis(config.liveness_poll_interval_ms),
            payloads: None,
        }
    }

    /// Drive the state machine until `shutdown` fires.
    ///
    /// Meant to run on its own task; the consumption loop never waits
    /// on it and vice versa.
    pub async fn run(&mut self, mut shutdown: watch::Receiver<bool>) {
        if *shutdown.borrow() {
            return;
        }

        let mut state = LinkState::Disconnected;
        info!("connection manager started");

        loop {
            let next = match state {
                LinkState::Disconnected => Some(LinkState::Connecting),
                LinkState::Connecting => self.connect_once().await,
                LinkState::Connected => self.serve_session(&mut shutdown).await,
                LinkState::Retrying => self.wait_backoff(&mut shutdown).await,
            };

            match next {
                Some(next) => {
                    if next != state {
                        debug!(from = ?state, to = ?next, "link state transition");
                    }
                    state = next;
                }
                None => {
                    self.link.disconnect().await;
                    info!("connection manager stopped");
                    return;
                }
            }
        }
    }

    /// One connection attempt. Failures are demoted to a retry, never
    /// propagated.
    async fn connect_once(&mut self) -> Option<LinkState> {
        match self.try_connect().await {
            Ok(payloads) => {
                self.payloads = Some(payloads);
                info!("link connected, notifications live");
                Some(LinkState::Connected)
            }
            Err(e) => {
                warn!(error = %e, "connection attempt failed");
                Some(LinkState::Retrying)
            }
        }
    }

    async fn try_connect(&mut self) -> Result<mpsc::UnboundedReceiver<RawPayload>> {
        self.link.connect().await?;
        if !self.link.is_connected().await {
            return Err(PowerLoggerError::Link(
                "link reports not connected after connect".to_string(),
            ));
        }
        self.link.subscribe().await
    }

    /// The connected wait-loop.
    ///
    /// The notification channel provides no explicit disconnect event in
    /// the general case, so liveness is also checked by polling the link
    /// on a fixed interval. Payload handling takes priority over the
    /// poll, and on teardown the channel is drained first, so samples
    /// that arrived before a disconnect are never lost.
    async fn serve_session(&mut self, shutdown: &mut watch::Receiver<bool>) -> Option<LinkState> {
        let Some(mut payloads) = self.payloads.take() else {
            return Some(LinkState::Retrying);
        };

        let mut liveness = tokio::time::interval(self.liveness_interval);
        liveness.set_missed_tick_behavior(MissedTickBehavior::Delay);
        liveness.reset();

        loop {
            tokio::select! {
                biased;
                _ = shutdown.changed() => {
                    self.drain_remaining(&mut payloads);
                    return None;
                }
                maybe_payload = payloads.recv() => match maybe_payload {
                    Some(raw) => self.handle_payload(&raw),
                    None => {
                        warn!("notification stream ended, scheduling reconnect");
                        self.link.disconnect().await;
                        return Some(LinkState::Retrying);
                    }
                },
                _ = liveness.tick() => {
                    if !self.link.is_connected().await {
                        warn!("link reports disconnected, scheduling reconnect");
                        self.drain_remaining(&mut payloads);
                        self.link.disconnect().await;
                        return Some(LinkState::Retrying);
                    }
                }
            }
        }
    }

    /// Process payloads the link already delivered before a teardown.
    fn drain_remaining(&mut self, payloads: &mut mpsc::UnboundedReceiver<RawPayload>) {
        while let Ok(raw) = payloads.try_recv() {
            self.handle_payload(&raw);
        }
    }

    fn handle_payload(&mut self, raw: &[u8]) {
        match parse_frame(raw) {
            Ok(sample) => {
                // Durably recorded before it can be visualized
                self.session.append(&sample);
                debug!(device_timestamp = %sample.device_timestamp, "sample saved");
                self.queue.push(sample);
            }
            Err(rejection) => warn!(%rejection, "dropped notification payload"),
        }
    }

    async fn wait_backoff(&mut self, shutdown: &mut watch::Receiver<bool>) -> Option<LinkState> {
        info!(
            delay_s = self.reconnect_delay.as_secs(),
            "waiting before reconnect"
        );
        tokio::select! {
            biased;
            _ = shutdown.changed() => None,
            _ = tokio::time::sleep(self.reconnect_delay) => Some(LinkState::Connecting),
        }
    }
}
