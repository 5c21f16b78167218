//! Typed capture session protocol for Napatech-style packet capture drivers.
//!
//! ntcapture drives a packet capture adapter through one explicit [`Session`]:
//! initialise the driver, load an NTPL filter program, receive packets with their
//! capture metadata, and read per-port RMON1 counters. Driver status codes are
//! translated into a typed [`CaptureError`] at every call site.
//!
//! # Features
//!
//! - **Handle lifecycle**: configuration, statistics and receive streams with local checks
//! - **NTPL loading**: structured parser diagnostics for rejected statements
//! - **Packet delivery**: owned, caller-buffer and zero-copy receive, released on every path
//! - **Async streams**: a cancellable [`PacketStream`](stream::PacketStream) over a capture task
//! - **Emulated driver**: the whole protocol without an adapter, for tests and development
//!
//! # Quick Start
//!
//! ```rust
//! use ntcapture::{CaptureConfig, EmulatedDriver, EmulatedFrame, Session};
//!
//! # fn main() -> ntcapture::Result<()> {
//! let config = CaptureConfig { port: 0, stream_id: 1, ..CaptureConfig::default() };
//! let (mut session, _) = Session::bootstrap(EmulatedDriver::new(), &config)?;
//! session.driver_mut().push_frame(1, EmulatedFrame::new(150_000_000, vec![0u8; 60]));
//!
//! let mut buffer = [0u8; 1522];
//! let delivery = session.receive_into(&mut buffer)?;
//! assert_eq!(delivery.payload, 60);
//! assert_eq!(delivery.info.since_epoch().as_millis(), 1500);
//! # Ok(())
//! # }
//! ```
//!
//! ## Streaming
//!
//! ```rust,no_run
//! use futures::StreamExt;
//! use ntcapture::stream::{StreamOptions, spawn_capture};
//! use ntcapture::{CaptureConfig, NtCapture};
//!
//! #[tokio::main]
//! async fn main() -> ntcapture::Result<()> {
//!     let (session, _) = NtCapture::native(&CaptureConfig::from_file("capture.yaml")?)?;
//!     let options = StreamOptions::default().with_limit(10);
//!     let mut packets = spawn_capture(session, options).into_stream();
//!
//!     while let Some(packet) = packets.next().await {
//!         let packet = packet?;
//!         println!("{} bytes at {:?}", packet.info.captured_length, packet.info.timestamp);
//!     }
//!     Ok(())
//! }
//! ```

// Core types and error handling
pub mod config;
mod error;
#[cfg_attr(any(test, feature = "benchmark"), path = "test_utils.rs")]
#[cfg(any(test, feature = "benchmark"))]
pub mod test_utils;
pub mod types;

// Protocol layers
pub mod driver;
pub mod drivers;
pub mod ntpl;
pub mod session;
pub mod stream;

// Core exports
pub use config::CaptureConfig;
pub use error::*;
pub use types::*;

// Protocol exports
pub use driver::{CaptureDriver, StatMode, Status};
pub use drivers::{EmulatedDriver, EmulatedFrame, NativeDriver};
pub use session::{PacketGuard, Session};

/// Entry point for bootstrapped capture sessions.
///
/// Both constructors run the configured bootstrap sequence and return the
/// session with the result of every submitted NTPL statement.
pub struct NtCapture;

impl NtCapture {
    /// Bootstrap a session on the Napatech driver.
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - The crate was built without the `napatech` feature
    /// - The driver cannot be initialised or a stream cannot be opened
    /// - An NTPL statement is rejected
    pub fn native(
        config: &CaptureConfig,
    ) -> Result<(Session<NativeDriver>, Vec<FilterProgramResult>)> {
        Session::bootstrap(NativeDriver::open()?, config)
    }

    /// Bootstrap a session on an in-memory driver.
    pub fn emulated(
        config: &CaptureConfig,
    ) -> Result<(Session<EmulatedDriver>, Vec<FilterProgramResult>)> {
        Session::bootstrap(EmulatedDriver::new(), config)
    }
}
