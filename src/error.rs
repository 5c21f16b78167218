//! Error types for capture sessions.
//!
//! Every native failure is translated at its call site into a [`CaptureError`]
//! carrying the driver's own explanation of the status code. Nothing is retried
//! internally; the caller decides.
//!
//! ## Error Categories
//!
//! - **Lifecycle Errors**: driver start-up, opening and closing stream handles
//! - **Filter Errors**: NTPL statements rejected by the driver's parser
//! - **Packet Errors**: acquisition, release and length consistency failures
//! - **Statistics Errors**: port index outside the counter block
//! - **Configuration Errors**: unreadable or invalid YAML configuration
//! - **Task Errors**: the background capture task panicked
//!
//! ## Recovery and Retry
//!
//! ```rust
//! use ntcapture::CaptureError;
//!
//! let error = CaptureError::receive_failed("Timeout", true);
//! if error.is_retryable() {
//!     for suggestion in error.recovery_suggestions() {
//!         println!("  - {}", suggestion);
//!     }
//! }
//! ```

use std::path::PathBuf;
use thiserror::Error;

use crate::types::{FilterDiagnostics, StreamKind};

/// Result type alias for capture operations.
pub type Result<T, E = CaptureError> = std::result::Result<T, E>;

/// Main error type for capture operations.
#[derive(Error, Debug)]
#[non_exhaustive]
pub enum CaptureError {
    #[error("Driver initialisation failed: {message}")]
    DriverInit { message: String },

    #[error("{operation} requires an initialised driver")]
    NotInitialized { operation: &'static str },

    #[error("Failed to open {stream} stream: {message}")]
    HandleOpen { stream: StreamKind, message: String },

    #[error("Failed to close {stream} stream: {message}")]
    HandleClose { stream: StreamKind, message: String },

    #[error("{stream} stream is not open")]
    NotOpen { stream: StreamKind },

    #[error("NTPL statement rejected (code {code}): {message}", code = .diagnostics.code)]
    FilterSyntax { message: String, diagnostics: FilterDiagnostics },

    #[error("Malformed driver response: {details}")]
    MalformedResponse { details: String },

    #[error("Packet receive failed: {message}")]
    Receive { message: String, timed_out: bool },

    #[error("Packet buffer release failed: {message}")]
    Release { message: String },

    #[error("Destination buffer holds {capacity} bytes but the packet needs {needed}")]
    BufferTooSmall { needed: usize, capacity: usize },

    #[error("Inconsistent packet lengths: captured {captured}, wire {wire}")]
    InconsistentLength { captured: i64, wire: i64 },

    #[error("Statistics query failed: {message}")]
    StatsRead { message: String },

    #[error("Port {port} is out of range ({available} ports reported)")]
    PortOutOfRange { port: usize, available: usize },

    #[error("Configuration file error: {path}")]
    ConfigFile {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Invalid configuration: {details}")]
    Config { details: String },

    #[error("{feature} requires the `napatech` feature")]
    UnsupportedPlatform { feature: String },

    #[error("Capture task failed: {message}")]
    CaptureTask { message: String },
}

impl CaptureError {
    /// Returns whether this error is potentially recoverable through retry.
    pub fn is_retryable(&self) -> bool {
        match self {
            CaptureError::Receive { timed_out, .. } => *timed_out,
            CaptureError::Release { .. } => true,
            CaptureError::HandleOpen { .. } => true,
            CaptureError::HandleClose { .. } => false,
            CaptureError::FilterSyntax { .. } => false,
            CaptureError::DriverInit { .. } => false,
            CaptureError::NotInitialized { .. } => false,
            CaptureError::NotOpen { .. } => false,
            CaptureError::MalformedResponse { .. } => false,
            CaptureError::BufferTooSmall { .. } => false,
            CaptureError::InconsistentLength { .. } => true,
            CaptureError::StatsRead { .. } => true,
            CaptureError::PortOutOfRange { .. } => false,
            CaptureError::ConfigFile { .. } => false,
            CaptureError::Config { .. } => false,
            CaptureError::UnsupportedPlatform { .. } => false,
            CaptureError::CaptureTask { .. } => false,
        }
    }

    /// Returns suggested recovery actions for this error.
    pub fn recovery_suggestions(&self) -> Vec<&'static str> {
        match self {
            CaptureError::DriverInit { .. } => vec![
                "Check that the capture adapter is installed and detected",
                "Verify the driver service is running",
                "Check the library and driver versions match",
                "Run with sufficient privileges",
            ],
            CaptureError::NotInitialized { .. } => {
                vec!["Call init() before opening any stream"]
            }
            CaptureError::HandleOpen { .. } => vec![
                "Check the stream name",
                "Close the previous handle of this kind before reopening",
                "Submit a filter assigning the stream id before opening receive",
            ],
            CaptureError::HandleClose { .. } => vec![
                "Treat the handle as closed and reopen if needed",
                "Check the driver log for resource errors",
            ],
            CaptureError::NotOpen { .. } => {
                vec!["Open the stream before using it", "Check the handle was not closed"]
            }
            CaptureError::FilterSyntax { .. } => vec![
                "Correct the statement using the parser diagnostics",
                "Resubmit the corrected statement",
            ],
            CaptureError::MalformedResponse { .. } => vec![
                "Check the library and driver versions match",
                "Rebuild against the installed driver headers",
            ],
            CaptureError::Receive { .. } => vec![
                "Retry the receive if it timed out",
                "Check traffic reaches the assigned stream",
                "Verify the receive stream is still open",
            ],
            CaptureError::Release { .. } => vec![
                "Keep the delivered packet; its data is valid",
                "Reopen the receive stream if releases keep failing",
            ],
            CaptureError::BufferTooSmall { .. } => vec![
                "Grow the destination buffer to the maximum frame size",
                "Use receive_new() to allocate per packet",
            ],
            CaptureError::InconsistentLength { .. } => vec![
                "Skip the packet and continue receiving",
                "Check the driver descriptor format",
            ],
            CaptureError::StatsRead { .. } => {
                vec!["Retry the query", "Verify the statistics stream is still open"]
            }
            CaptureError::PortOutOfRange { .. } => {
                vec!["Use a port index below the reported port count"]
            }
            CaptureError::ConfigFile { .. } => {
                vec!["Check the file exists and is readable", "Check file permissions"]
            }
            CaptureError::Config { .. } => {
                vec!["Fix the configuration value", "Remove the key to use its default"]
            }
            CaptureError::UnsupportedPlatform { .. } => vec![
                "Rebuild with --features napatech",
                "Use the emulated driver for development",
            ],
            CaptureError::CaptureTask { .. } => {
                vec!["Check the log for the panic message", "Bootstrap a new session"]
            }
        }
    }

    /// The stream kind this error concerns, when there is one.
    pub fn stream_kind(&self) -> Option<StreamKind> {
        match self {
            CaptureError::HandleOpen { stream, .. }
            | CaptureError::HandleClose { stream, .. }
            | CaptureError::NotOpen { stream } => Some(*stream),
            CaptureError::FilterSyntax { .. } | CaptureError::MalformedResponse { .. } => {
                Some(StreamKind::Config)
            }
            CaptureError::Receive { .. }
            | CaptureError::Release { .. }
            | CaptureError::BufferTooSmall { .. }
            | CaptureError::InconsistentLength { .. } => Some(StreamKind::Receive),
            CaptureError::StatsRead { .. } | CaptureError::PortOutOfRange { .. } => {
                Some(StreamKind::Stats)
            }
            _ => None,
        }
    }

    /// Helper constructor for driver start-up failures.
    pub fn driver_init(message: impl Into<String>) -> Self {
        CaptureError::DriverInit { message: message.into() }
    }

    /// Helper constructor for handle open failures.
    pub fn open_failed(stream: StreamKind, message: impl Into<String>) -> Self {
        CaptureError::HandleOpen { stream, message: message.into() }
    }

    /// Helper constructor for handle close failures.
    pub fn close_failed(stream: StreamKind, message: impl Into<String>) -> Self {
        CaptureError::HandleClose { stream, message: message.into() }
    }

    /// Helper constructor for packet acquisition failures.
    pub fn receive_failed(message: impl Into<String>, timed_out: bool) -> Self {
        CaptureError::Receive { message: message.into(), timed_out }
    }

    /// Helper constructor for packet release failures.
    pub fn release_failed(message: impl Into<String>) -> Self {
        CaptureError::Release { message: message.into() }
    }

    /// Helper constructor for malformed driver responses.
    pub fn malformed(details: impl Into<String>) -> Self {
        CaptureError::MalformedResponse { details: details.into() }
    }

    /// Helper constructor for configuration errors.
    pub fn config(details: impl Into<String>) -> Self {
        CaptureError::Config { details: details.into() }
    }

    /// Helper constructor for features compiled out of this build.
    pub fn unsupported_platform(feature: impl Into<String>) -> Self {
        CaptureError::UnsupportedPlatform { feature: feature.into() }
    }

    /// Whether the error is an acquisition timeout.
    pub fn is_timeout(&self) -> bool {
        matches!(self, CaptureError::Receive { timed_out: true, .. })
    }
}

impl From<serde_yaml_ng::Error> for CaptureError {
    fn from(err: serde_yaml_ng::Error) -> Self {
        CaptureError::Config { details: err.to_string() }
    }
}
