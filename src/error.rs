//! # Error Types
//!
//! Custom error types for Power Logger using `thiserror`.

use thiserror::Error;

/// Main error type for Power Logger
#[derive(Debug, Error)]
pub enum PowerLoggerError {
    /// Wireless link errors (connect, subscribe, transport)
    #[error("link error: {0}")]
    Link(String),

    /// The configured sensor never showed up during a scan
    #[error("device not found: {0}")]
    DeviceNotFound(String),

    /// Durable log errors (directory creation, row append)
    #[error("persistence error: {0}")]
    Persistence(String),

    /// Configuration errors
    #[error("configuration error: {0}")]
    Config(#[from] toml::de::Error),

    /// I/O errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type alias for Power Logger
pub type Result<T> = std::result::Result<T, PowerLoggerError>;
