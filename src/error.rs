//! Error types for the neuroduino library.

use thiserror::Error;

/// The main error type for neuroduino operations.
#[derive(Debug, Error)]
pub enum Error {
    /// Serial port error.
    #[error("serial port error: {0}")]
    Serial(#[from] tokio_serial::Error),

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Frame encoding/decoding error.
    #[error("frame error: {0}")]
    Frame(#[from] FrameError),

    /// An endpoint could not be opened.
    #[error("failed to open {endpoint}: {reason}")]
    Open { endpoint: String, reason: String },

    /// A command argument was out of range. Nothing was written.
    #[error("invalid argument: {reason}")]
    InvalidArgument { reason: String },

    /// Discovery probed every candidate without finding the device.
    #[error("no device found after probing {probed} endpoint(s)")]
    NoDeviceFound { probed: usize },

    /// Connection is not established.
    #[error("not connected")]
    NotConnected,
}

/// Frame-specific errors.
#[derive(Debug, Error)]
pub enum FrameError {
    /// Received line is not valid UTF-8.
    #[error("line is not valid UTF-8: {0}")]
    InvalidUtf8(#[from] std::str::Utf8Error),

    /// Too many bytes arrived without a line delimiter.
    #[error("line too long: {size} bytes without delimiter (max {max})")]
    LineTooLong { size: usize, max: usize },
}

/// Result type alias for neuroduino operations.
pub type Result<T> = std::result::Result<T, Error>;
