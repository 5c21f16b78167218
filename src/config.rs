//! Capture configuration
//!
//! Stream names, the stream id and filter program used by
//! [`Session::bootstrap`](crate::Session::bootstrap), and the receive timeout.
//! Every key is optional in YAML:
//!
//! ```rust
//! use ntcapture::CaptureConfig;
//! use std::time::Duration;
//!
//! let config = CaptureConfig::from_yaml_str("port: 2\nreceive_timeout_ms: 250\n").unwrap();
//! assert_eq!(config.stream_id, 1);
//! assert_eq!(config.receive_timeout(), Duration::from_millis(250));
//! assert_eq!(config.program()[1], "Define FilterPort = Filter(Port==2)");
//! ```

use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

use crate::ntpl::port_program;
use crate::{CaptureError, Result};

/// Default bounded wait for one packet.
pub const DEFAULT_RECEIVE_TIMEOUT_MS: u64 = 1000;

/// Configuration for a capture session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct CaptureConfig {
    /// Name passed when opening the configuration stream
    pub config_stream: String,
    /// Name passed when opening the statistics stream
    pub stats_stream: String,
    /// Name passed when opening the receive stream
    pub receive_stream: String,
    /// Stream id the receive stream binds to
    pub stream_id: u32,
    /// Port captured by the default filter program
    pub port: u8,
    /// Bounded wait of each packet acquisition, in milliseconds
    pub receive_timeout_ms: u64,
    /// Whether bootstrap also opens the statistics stream
    pub open_stats: bool,
    /// Explicit NTPL program; empty selects the default port program
    pub filters: Vec<String>,
}

impl Default for CaptureConfig {
    fn default() -> Self {
        Self {
            config_stream: "config".to_string(),
            stats_stream: "stats".to_string(),
            receive_stream: "capture".to_string(),
            stream_id: 1,
            port: 0,
            receive_timeout_ms: DEFAULT_RECEIVE_TIMEOUT_MS,
            open_stats: false,
            filters: Vec::new(),
        }
    }
}

impl CaptureConfig {
    /// Parse and validate a YAML configuration.
    pub fn from_yaml_str(yaml: &str) -> Result<Self> {
        let config: CaptureConfig = serde_yaml_ng::from_str(yaml)?;
        config.validate()?;
        Ok(config)
    }

    /// Read, parse and validate a YAML configuration file.
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let yaml = std::fs::read_to_string(path)
            .map_err(|e| CaptureError::ConfigFile { path: path.to_path_buf(), source: e })?;
        Self::from_yaml_str(&yaml)
    }

    /// Check values the driver would otherwise reject later.
    pub fn validate(&self) -> Result<()> {
        for (key, name) in [
            ("config_stream", &self.config_stream),
            ("stats_stream", &self.stats_stream),
            ("receive_stream", &self.receive_stream),
        ] {
            if name.trim().is_empty() {
                return Err(CaptureError::config(format!("{} must not be empty", key)));
            }
        }

        if self.receive_timeout_ms == 0 {
            return Err(CaptureError::config("receive_timeout_ms must be greater than zero"));
        }

        if let Some(index) = self.filters.iter().position(|f| f.trim().is_empty()) {
            return Err(CaptureError::config(format!("filters[{}] is empty", index)));
        }

        Ok(())
    }

    pub fn receive_timeout(&self) -> Duration {
        Duration::from_millis(self.receive_timeout_ms)
    }

    /// NTPL statements to submit, in order.
    pub fn program(&self) -> Vec<String> {
        if self.filters.is_empty() {
            port_program(self.port, self.stream_id)
        } else {
            self.filters.clone()
        }
    }
}
