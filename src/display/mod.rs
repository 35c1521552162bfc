//! # Display Module
//!
//! The consumption side of the pipeline.
//!
//! This module handles:
//! - Draining the sample queue on a fixed cadence
//! - Maintaining the bounded sliding window of recent samples
//! - Driving the live view, or echoing samples textually when no view
//!   is configured (degraded mode)

use std::time::Duration;

use tokio::sync::watch;
use tokio::time::MissedTickBehavior;
use tracing::{debug, info};

use crate::queue::SampleQueue;

pub mod window;

pub use window::{ChannelMeans, SlidingWindow, Summary, WindowView};

/// Rendering backend for the live window.
///
/// Implementations receive a full [`WindowView`] per redraw; the loop
/// never issues a redraw for an idle cycle.
pub trait LiveView: Send {
    fn redraw(&mut self, view: &WindowView);
}

/// Fallback view that reports the window summary as log lines.
#[derive(Debug, Default)]
pub struct TextDashboard;

impl TextDashboard {
    pub fn new() -> Self {
        Self
    }
}

impl LiveView for TextDashboard {
    fn redraw(&mut self, view: &WindowView) {
        match &view.summary.means {
            Some(means) => info!(
                samples = view.summary.sample_count,
                "window: bus {:.3} V, shunt {:.3} mV, current {:.3} mA, power {:.3} mW",
                means.bus_voltage,
                means.shunt_voltage_mv,
                means.current_ma,
                means.power_mw
            ),
            None => info!("window: no samples"),
        }
    }
}

/// Drains the queue on its own schedule, independent of the connection
/// manager's cadence, and never blocks it.
pub struct ConsumptionLoop {
    queue: SampleQueue,
    window: SlidingWindow,
    view: Option<Box<dyn LiveView>>,
}

impl ConsumptionLoop {
    /// `view = None` selects the degraded textual mode: drained samples
    /// are emitted as one log line each instead of feeding a view.
    pub fn new(queue: SampleQueue, window_size: usize, view: Option<Box<dyn LiveView>>) -> Self {
        Self {
            queue,
            window: SlidingWindow::new(window_size),
            view,
        }
    }

    pub fn window(&self) -> &SlidingWindow {
        &self.window
    }

    /// One cadence cycle: drain, append to the window, redraw if
    /// anything arrived. Idle cycles are cheap no-ops.
    ///
    /// Returns the number of samples drained this cycle.
    pub fn run_cycle(&mut self) -> usize {
        let drained = self.queue.drain();
        let count = drained.len();

        match self.view.as_mut() {
            Some(view) => {
                for sample in drained {
                    self.window.push(sample);
                }
                if count > 0 {
                    view.redraw(&self.window.view());
                }
            }
            None => {
                for sample in drained {
                    info!("logged: {}", sample.log_record().join(","));
                }
            }
        }

        count
    }

    /// Run cycles at `cadence` until the shutdown signal fires.
    ///
    /// Cancellation is cooperative and lands between cycles, so no
    /// half-updated window state is ever observable.
    pub async fn run(&mut self, cadence: Duration, mut shutdown: watch::Receiver<bool>) {
        let mut ticker = tokio::time::interval(cadence);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                biased;
                _ = shutdown.changed() => {
                    debug!("consumption loop stopping");
                    break;
                }
                _ = ticker.tick() => {
                    self.run_cycle();
                }
            }
        }
    }
}
