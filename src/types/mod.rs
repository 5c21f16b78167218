//! Core types for capture session data.
//!
//! - [`StreamKind`] names the three handle classes a session holds
//! - [`CaptureInfo`] carries per-packet metadata converted from the native descriptor
//! - [`Delivery`] pairs a received payload with a possible release warning
//! - [`Packet`] is the owned form forwarded by the async capture stream
//! - [`PortCounters`] / [`PortCounterSnapshot`] hold RMON1 port statistics
//! - [`FilterProgramResult`] / [`FilterDiagnostics`] describe NTPL outcomes
//!
//! ## Usage Example
//!
//! ```rust
//! use ntcapture::types::{CaptureInfo, ticks_to_duration};
//! use std::time::Duration;
//!
//! // 1.5 s after the epoch, 60 payload bytes behind a 16 byte descriptor
//! let info = CaptureInfo::from_native(150_000_000, 76, 64, 16).unwrap();
//! assert_eq!(info.captured_length, 60);
//! assert_eq!(info.since_epoch(), Duration::from_millis(1500));
//! assert_eq!(ticks_to_duration(100_000_000), Duration::from_secs(1));
//! ```

mod capture_info;
mod counters;
mod delivery;
mod filter;
mod stream_kind;

pub use capture_info::{
    CaptureInfo, NANOS_PER_TICK, TICKS_PER_SECOND, ticks_to_duration, ticks_to_system_time,
};
pub use counters::{MAX_FRAME_LEN, MIN_FRAME_LEN, PortCounterSnapshot, PortCounters};
pub use delivery::{Delivery, Packet};
pub use filter::{FilterDiagnostics, FilterProgramResult};
pub use stream_kind::StreamKind;
