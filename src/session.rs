//! # Output Session
//!
//! The durable log destination for one process run and its write
//! discipline.
//!
//! This module handles:
//! - Lazily choosing a timestamped session directory at first write
//! - Falling back to a shared file when that directory cannot be created
//! - Writing the fixed 6-column CSV header exactly once per file
//! - Appending one row per sample, open/write/release per call
//!
//! Nothing here is fatal: every failure is logged and demoted to a
//! skipped write, so the in-memory pipeline keeps running.

use crate::error::{PowerLoggerError, Result};
use crate::frame::Sample;
use chrono::Local;
use std::fs::{self, OpenOptions};
use std::path::{Path, PathBuf};
use tracing::{error, info, warn};

/// Fixed column header of the telemetry log
pub const LOG_HEADER: [&str; 6] = [
    "device_timestamp",
    "host_timestamp",
    "bus_voltage",
    "shunt_voltage_mV",
    "current_mA",
    "power_mW",
];

/// File name inside the per-run session directory
pub const DATA_FILE_NAME: &str = "data_log.csv";

/// Append-only CSV log destination for one run.
///
/// The destination is established lazily on the first append: a fresh
/// `<base_dir>/<YYYYmmdd_HHMMSS>/data_log.csv` when possible, otherwise
/// the shared fallback file directly under `base_dir`. If both fail the
/// append is skipped and establishment is retried on the next call.
///
/// # Examples
///
/// ```no_run
/// use power_logger::frame::parse_frame;
/// use power_logger::session::OutputSession;
///
/// let mut session = OutputSession::new("logs", "fallback_data_log.csv");
/// let sample = parse_frame(b"00:00:01,12.0,1.5,300.0,3600.0").unwrap();
/// session.append(&sample);
/// ```
#[derive(Debug)]
pub struct OutputSession {
    base_dir: PathBuf,
    fallback_file: String,
    destination: Option<PathBuf>,
}

impl OutputSession {
    pub fn new(base_dir: impl Into<PathBuf>, fallback_file: impl Into<String>) -> Self {
        Self {
            base_dir: base_dir.into(),
            fallback_file: fallback_file.into(),
            destination: None,
        }
    }

    /// Append one sample as a CSV row.
    ///
    /// Establishes the destination on first use. Any failure (directory
    /// creation, file I/O) is logged together with the offending row and
    /// swallowed; the caller never has to handle it.
    pub fn append(&mut self, sample: &Sample) {
        let Some(path) = self.establish() else {
            warn!(row = ?sample.log_record(), "no log destination, skipping row");
            return;
        };

        if let Err(e) = write_row(&path, sample) {
            error!(error = %e, row = ?sample.log_record(), "failed to append sample row");
        }
    }

    /// Where rows are currently being written, if a destination has been
    /// established.
    pub fn destination(&self) -> Option<&Path> {
        self.destination.as_deref()
    }

    fn establish(&mut self) -> Option<PathBuf> {
        if self.destination.is_none() {
            let stamp = Local::now().format("%Y%m%d_%H%M%S").to_string();
            let preferred = self.base_dir.join(stamp);
            self.establish_with(&preferred);
        }
        self.destination.clone()
    }

    /// Destination ladder: preferred session directory, then the shared
    /// fallback file, then nothing (retried on the next append).
    fn establish_with(&mut self, preferred_dir: &Path) {
        match fs::create_dir_all(preferred_dir) {
            Ok(()) => {
                let path = preferred_dir.join(DATA_FILE_NAME);
                info!(path = %path.display(), "session log established");
                self.destination = Some(path);
            }
            Err(e) => {
                warn!(
                    dir = %preferred_dir.display(),
                    error = %e,
                    "failed to create session directory, trying fallback"
                );
                match fs::create_dir_all(&self.base_dir) {
                    Ok(()) => {
                        let path = self.base_dir.join(&self.fallback_file);
                        warn!(path = %path.display(), "using fallback log file");
                        self.destination = Some(path);
                    }
                    Err(e) => {
                        error!(
                            dir = %self.base_dir.display(),
                            error = %e,
                            "failed to create fallback log destination"
                        );
                    }
                }
            }
        }
    }
}

/// Write one row, prefixed by the header iff the file is missing or
/// empty. The file handle is released before returning, so a crash can
/// corrupt at most one row.
fn write_row(path: &Path, sample: &Sample) -> Result<()> {
    let needs_header = fs::metadata(path).map(|m| m.len() == 0).unwrap_or(true);

    let file = OpenOptions::new().create(true).append(true).open(path)?;
    let mut writer = csv::WriterBuilder::new()
        .has_headers(false)
        .from_writer(file);

    if needs_header {
        writer
            .write_record(&LOG_HEADER)
            .map_err(|e| PowerLoggerError::Persistence(format!("header write failed: {}", e)))?;
    }
    writer
        .write_record(&sample.log_record())
        .map_err(|e| PowerLoggerError::Persistence(format!("row write failed: {}", e)))?;
    writer
        .flush()
        .map_err(|e| PowerLoggerError::Persistence(format!("flush failed: {}", e)))?;

    Ok(())
}
