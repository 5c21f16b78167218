//! Capture driver trait for native and emulated backends
//!
//! A [`CaptureDriver`] is the thin layer over the vendor runtime: every call maps to
//! one native primitive and reports failure as a raw [`Status`]. It holds no session
//! logic. Ordering, precondition checks, length validation and error translation all
//! live in [`Session`](crate::Session).

use std::fmt;
use std::time::Duration;

use crate::types::PortCounters;

/// Size of the descriptor header prefixed to every native packet buffer.
pub const NT_DESCRIPTOR_LEN: u32 = 16;

/// Raw status code returned by a native call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Status(pub i32);

impl Status {
    pub const SUCCESS: Status = Status(0);

    pub fn is_success(self) -> bool {
        self == Status::SUCCESS
    }
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:#010x}", self.0)
    }
}

/// Result of a native call: the value, or the failing status.
pub type DriverResult<T> = std::result::Result<T, Status>;

/// Opaque stream handle issued by the driver.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct RawHandle(pub u64);

/// Opaque token for one acquired packet buffer.
///
/// Valid from `acquire_packet` until the matching `release_packet`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct RawBuffer(pub u64);

/// Statistics query mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatMode {
    /// Read the accumulated counters
    Poll,
    /// Reset the accumulators; returned values are discarded
    Clear,
}

/// Driver response to an NTPL statement.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NtplReply {
    pub status: Status,
    /// Assigned identifier, meaningful only on success
    pub ntpl_id: u32,
    /// Raw parser error block, meaningful only on failure.
    /// Layout: three equal NUL-terminated text segments, then a big-endian i32.
    pub error_data: Vec<u8>,
}

impl NtplReply {
    pub fn accepted(ntpl_id: u32) -> Self {
        Self { status: Status::SUCCESS, ntpl_id, error_data: Vec::new() }
    }

    pub fn rejected(status: Status, error_data: Vec<u8>) -> Self {
        Self { status, ntpl_id: 0, error_data }
    }
}

/// Capability groups the session needs from a packet capture driver.
///
/// Implementations are single-owner: every mutating call takes `&mut self`, so a
/// driver cannot be used from two threads at once without external locking.
pub trait CaptureDriver: Send + 'static {
    /// Bytes of descriptor header included in the native captured length.
    const DESCRIPTOR_LEN: u32 = NT_DESCRIPTOR_LEN;

    /// Start the driver runtime.
    fn init(&mut self) -> DriverResult<()>;

    /// Shut the driver runtime down. Called once when an initialised session drops.
    fn done(&mut self) {}

    fn open_config(&mut self, name: &str) -> DriverResult<RawHandle>;
    fn close_config(&mut self, handle: RawHandle) -> DriverResult<()>;

    fn open_stats(&mut self, name: &str) -> DriverResult<RawHandle>;
    fn close_stats(&mut self, handle: RawHandle) -> DriverResult<()>;

    /// Open a packet receive stream on a stream id assigned by a prior NTPL statement.
    fn open_receive(&mut self, name: &str, stream_id: u32) -> DriverResult<RawHandle>;
    fn close_receive(&mut self, handle: RawHandle) -> DriverResult<()>;

    /// Submit one NTPL statement on an open configuration stream.
    fn submit_filter(&mut self, config: RawHandle, statement: &str) -> NtplReply;

    /// Wait up to `timeout` for the next packet buffer.
    fn acquire_packet(&mut self, receive: RawHandle, timeout: Duration)
    -> DriverResult<RawBuffer>;

    /// Native timestamp of an acquired buffer, in 10 ns ticks since the Unix epoch.
    fn packet_timestamp(&self, buffer: RawBuffer) -> u64;

    /// Native captured length, descriptor header included.
    fn packet_captured_length(&self, buffer: RawBuffer) -> u32;

    fn packet_wire_length(&self, buffer: RawBuffer) -> u32;

    /// Payload bytes past the descriptor header.
    ///
    /// Implementations must clamp `len` to the bytes the buffer actually holds;
    /// the session rejects a slice shorter than the captured length.
    fn packet_payload(&self, buffer: RawBuffer, len: usize) -> &[u8];

    /// Hand an acquired buffer back to the receive stream.
    fn release_packet(&mut self, receive: RawHandle, buffer: RawBuffer) -> DriverResult<()>;

    /// Query the statistics stream, returning one counter block per port.
    fn read_stats(&mut self, stats: RawHandle, mode: StatMode) -> DriverResult<Vec<PortCounters>>;

    /// Human-readable explanation of a status code.
    fn explain(&self, status: Status) -> String;

    /// Whether `status` is the driver's acquisition timeout.
    fn is_timeout(&self, _status: Status) -> bool {
        false
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_success() {
        assert!(Status::SUCCESS.is_success());
        assert!(!Status(0x2000_0001).is_success());
        assert_eq!(Status(0x2000_0001).to_string(), "0x20000001");
    }

    #[test]
    fn reply_constructors() {
        let ok = NtplReply::accepted(5);
        assert!(ok.status.is_success());
        assert_eq!(ok.ntpl_id, 5);

        let rejected = NtplReply::rejected(Status(7), vec![0; 4]);
        assert_eq!(rejected.ntpl_id, 0);
        assert_eq!(rejected.error_data.len(), 4);
    }
}
