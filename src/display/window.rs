//! Bounded recent-history buffer and the derived display series.

use crate::frame::Sample;
use chrono::{DateTime, Local};
use std::collections::VecDeque;

/// Bounded ordered sequence of the most recent samples.
///
/// Eviction is strict FIFO by arrival order, not by timestamp: once the
/// bound is exceeded, the oldest entries are dropped until the window is
/// back within bound.
#[derive(Debug)]
pub struct SlidingWindow {
    bound: usize,
    samples: VecDeque<Sample>,
}

impl SlidingWindow {
    pub fn new(bound: usize) -> Self {
        Self {
            bound,
            samples: VecDeque::with_capacity(bound),
        }
    }

    /// Append one sample, evicting the oldest entries past the bound.
    pub fn push(&mut self, sample: Sample) {
        self.samples.push_back(sample);
        while self.samples.len() > self.bound {
            self.samples.pop_front();
        }
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Sample> {
        self.samples.iter()
    }

    /// Arithmetic means of each measurement channel over the window,
    /// or `None` when the window is empty.
    pub fn means(&self) -> Option<ChannelMeans> {
        if self.samples.is_empty() {
            return None;
        }
        let n = self.samples.len() as f64;
        let mut means = ChannelMeans::default();
        for sample in &self.samples {
            means.bus_voltage += sample.bus_voltage;
            means.shunt_voltage_mv += sample.shunt_voltage_mv;
            means.current_ma += sample.current_ma;
            means.power_mw += sample.power_mw;
        }
        means.bus_voltage /= n;
        means.shunt_voltage_mv /= n;
        means.current_ma /= n;
        means.power_mw /= n;
        Some(means)
    }

    /// Recompute the display series from the current window contents.
    pub fn view(&self) -> WindowView {
        let mut view = WindowView {
            times: Vec::with_capacity(self.samples.len()),
            bus_voltage: Vec::with_capacity(self.samples.len()),
            shunt_voltage_mv: Vec::with_capacity(self.samples.len()),
            current_ma: Vec::with_capacity(self.samples.len()),
            power_mw: Vec::with_capacity(self.samples.len()),
            summary: Summary {
                sample_count: self.samples.len(),
                means: self.means(),
            },
        };
        for sample in &self.samples {
            view.times.push(sample.host_timestamp);
            view.bus_voltage.push(sample.bus_voltage);
            view.shunt_voltage_mv.push(sample.shunt_voltage_mv);
            view.current_ma.push(sample.current_ma);
            view.power_mw.push(sample.power_mw);
        }
        view
    }
}

/// Per-channel arithmetic means over the window
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ChannelMeans {
    pub bus_voltage: f64,
    pub shunt_voltage_mv: f64,
    pub current_ma: f64,
    pub power_mw: f64,
}

/// Textual summary block shown alongside the series
#[derive(Debug, Clone)]
pub struct Summary {
    pub sample_count: usize,
    pub means: Option<ChannelMeans>,
}

impl Summary {
    /// Render the summary the way the plot annotation shows it.
    pub fn render(&self) -> String {
        match &self.means {
            Some(means) => format!(
                "Samples: {}\nAvg BusV: {:.3}\nAvg Shunt mV: {:.3}\nAvg Current mA: {:.3}\nAvg Power mW: {:.3}",
                self.sample_count,
                means.bus_voltage,
                means.shunt_voltage_mv,
                means.current_ma,
                means.power_mw
            ),
            None => "No samples".to_string(),
        }
    }
}

/// One redraw request: four parallel numeric series, a time axis, and
/// the textual summary.
#[derive(Debug, Clone)]
pub struct WindowView {
    pub times: Vec<DateTime<Local>>,
    pub bus_voltage: Vec<f64>,
    pub shunt_voltage_mv: Vec<f64>,
    pub current_ma: Vec<f64>,
    pub power_mw: Vec<f64>,
    pub summary: Summary,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::frame::parse_frame;

    fn sample(tag: &str, bus: f64) -> Sample {
        parse_frame(format!("{},{},2.0,3.0,4.0", tag, bus).as_bytes()).unwrap()
    }

    #[test]
    fn test_window_keeps_exactly_the_last_bound_samples() {
        let bound = 5;
        let mut window = SlidingWindow::new(bound);
        for i in 0..(bound + 3) {
            window.push(sample(&format!("t{}", i), i as f64));
        }

        assert_eq!(window.len(), bound);
        let tags: Vec<&str> = window.iter().map(|s| s.device_timestamp.as_str()).collect();
        assert_eq!(tags, vec!["t3", "t4", "t5", "t6", "t7"]);
    }

    #[test]
    fn test_window_below_bound_keeps_everything() {
        let mut window = SlidingWindow::new(200);
        for i in 0..10 {
            window.push(sample(&format!("t{}", i), 1.0));
        }
        assert_eq!(window.len(), 10);
    }

    #[test]
    fn test_means_are_arithmetic_averages() {
        let mut window = SlidingWindow::new(10);
        window.push(parse_frame(b"a,10.0,1.0,100.0,1000.0").unwrap());
        window.push(parse_frame(b"b,20.0,3.0,300.0,3000.0").unwrap());

        let means = window.means().unwrap();
        assert_eq!(means.bus_voltage, 15.0);
        assert_eq!(means.shunt_voltage_mv, 2.0);
        assert_eq!(means.current_ma, 200.0);
        assert_eq!(means.power_mw, 2000.0);
    }

    #[test]
    fn test_means_track_evictions() {
        let mut window = SlidingWindow::new(2);
        window.push(sample("a", 1.0));
        window.push(sample("b", 2.0));
        window.push(sample("c", 4.0));

        // "a" evicted; mean over [2.0, 4.0]
        assert_eq!(window.means().unwrap().bus_voltage, 3.0);
    }

    #[test]
    fn test_empty_window_has_no_means() {
        let window = SlidingWindow::new(10);
        assert!(window.means().is_none());
        assert!(window.is_empty());
    }

    #[test]
    fn test_view_series_are_parallel() {
        let mut window = SlidingWindow::new(10);
        for i in 0..4 {
            window.push(sample(&format!("t{}", i), i as f64));
        }

        let view = window.view();
        assert_eq!(view.times.len(), 4);
        assert_eq!(view.bus_voltage.len(), 4);
        assert_eq!(view.shunt_voltage_mv.len(), 4);
        assert_eq!(view.current_ma.len(), 4);
        assert_eq!(view.power_mw.len(), 4);
        assert_eq!(view.summary.sample_count, 4);
        assert_eq!(view.bus_voltage, vec![0.0, 1.0, 2.0, 3.0]);
    }

    #[test]
    fn test_summary_render() {
        let summary = Summary {
            sample_count: 2,
            means: Some(ChannelMeans {
                bus_voltage: 12.0,
                shunt_voltage_mv: 1.5,
                current_ma: 300.0,
                power_mw: 3600.0,
            }),
        };
        let text = summary.render();
        assert!(text.starts_with("Samples: 2\n"));
        assert!(text.contains("Avg BusV: 12.000"));
        assert!(text.contains("Avg Power mW: 3600.000"));

        let empty = Summary { sample_count: 0, means: None };
        assert_eq!(empty.render(), "No samples");
    }
}
