//! In-memory capture driver
//!
//! Behaves like the native driver at the status-code level so sessions can be
//! exercised without an adapter: handles must be opened in order, receive streams
//! need an assigned stream id, acquired buffers must be released, and statistics
//! accumulate per port until cleared. Frames are queued per stream id by the test
//! or tool that owns the driver.
//!
//! The NTPL "parser" only recognises what it needs to track stream assignment:
//! `Delete` statements clear assignments and return id 0, statements containing
//! `streamid=<n>` assign stream `n`. Everything else is accepted unless registered
//! with [`EmulatedDriver::reject_statement`].

use std::collections::{HashMap, HashSet, VecDeque};
use std::time::Duration;
use tracing::{debug, trace};

use crate::driver::{
    CaptureDriver, DriverResult, NtplReply, RawBuffer, RawHandle, StatMode, Status,
};
use crate::ntpl::encode_error_block;
use crate::types::{FilterDiagnostics, PortCounters, StreamKind};

/// Status codes produced by the emulated driver.
pub mod status {
    use crate::driver::Status;

    pub const TIMEOUT: Status = Status(0x2000_0001);
    pub const NOT_INITIALIZED: Status = Status(0x2000_0002);
    pub const NO_DEVICE: Status = Status(0x2000_0003);
    pub const INVALID_HANDLE: Status = Status(0x2000_0004);
    pub const ALREADY_OPEN: Status = Status(0x2000_0005);
    pub const STREAM_NOT_ASSIGNED: Status = Status(0x2000_0006);
    pub const NTPL_PARSER: Status = Status(0x2000_0007);
    pub const INVALID_BUFFER: Status = Status(0x2000_0008);
    pub const GENERIC: Status = Status(0x2000_00ff);
}

/// Segment size of the emulated NTPL error block.
pub const EMULATED_SEGMENT_LEN: usize = 160;

/// Number of ports reported unless configured otherwise.
pub const EMULATED_PORTS: usize = 4;

/// Native call that can be made to fail once.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FailPoint {
    Init,
    OpenConfig,
    CloseConfig,
    OpenStats,
    CloseStats,
    OpenReceive,
    CloseReceive,
    Acquire,
    Release,
    ReadStats,
}

/// A frame waiting in an emulated receive queue.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EmulatedFrame {
    /// Native timestamp in 10 ns ticks
    pub ticks: u64,
    /// Port the frame arrived on, for statistics
    pub port: usize,
    /// Payload bytes past the descriptor
    pub payload: Vec<u8>,
    /// Original frame size on the wire
    pub wire_length: u32,
    /// Overrides the native captured length (descriptor included) when set
    pub native_captured: Option<u32>,
}

impl EmulatedFrame {
    /// Frame captured whole: wire length equals the payload length.
    pub fn new(ticks: u64, payload: impl Into<Vec<u8>>) -> Self {
        let payload = payload.into();
        let wire_length = payload.len() as u32;
        Self { ticks, port: 0, payload, wire_length, native_captured: None }
    }

    pub fn on_port(mut self, port: usize) -> Self {
        self.port = port;
        self
    }

    pub fn with_wire_length(mut self, wire_length: u32) -> Self {
        self.wire_length = wire_length;
        self
    }

    /// Report a native captured length that disagrees with the payload.
    pub fn with_native_captured(mut self, native_captured: u32) -> Self {
        self.native_captured = Some(native_captured);
        self
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum OpenStream {
    Config,
    Stats,
    Receive { stream_id: u32 },
}

impl OpenStream {
    fn kind(self) -> StreamKind {
        match self {
            OpenStream::Config => StreamKind::Config,
            OpenStream::Stats => StreamKind::Stats,
            OpenStream::Receive { .. } => StreamKind::Receive,
        }
    }
}

#[derive(Debug)]
struct InFlight {
    receive: RawHandle,
    frame: EmulatedFrame,
}

/// Capture driver emulated in memory.
#[derive(Debug)]
pub struct EmulatedDriver {
    initialized: bool,
    next_handle: u64,
    next_buffer: u64,
    next_ntpl_id: u32,
    open: HashMap<RawHandle, OpenStream>,
    assigned: HashSet<u32>,
    rejections: HashMap<String, FilterDiagnostics>,
    submitted: Vec<String>,
    segment_len: usize,
    queues: HashMap<u32, VecDeque<EmulatedFrame>>,
    in_flight: HashMap<RawBuffer, InFlight>,
    released: u64,
    counters: Vec<PortCounters>,
    failures: HashMap<FailPoint, Status>,
    idle_wait: Duration,
    repeat: bool,
}

impl Default for EmulatedDriver {
    fn default() -> Self {
        Self::new()
    }
}

impl EmulatedDriver {
    pub fn new() -> Self {
        Self {
            initialized: false,
            next_handle: 1,
            next_buffer: 1,
            next_ntpl_id: 1,
            open: HashMap::new(),
            assigned: HashSet::new(),
            rejections: HashMap::new(),
            submitted: Vec::new(),
            segment_len: EMULATED_SEGMENT_LEN,
            queues: HashMap::new(),
            in_flight: HashMap::new(),
            released: 0,
            counters: vec![PortCounters::default(); EMULATED_PORTS],
            failures: HashMap::new(),
            idle_wait: Duration::from_millis(1),
            repeat: false,
        }
    }

    /// Report `ports` ports from the statistics stream.
    pub fn with_ports(mut self, ports: usize) -> Self {
        self.counters = vec![PortCounters::default(); ports];
        self
    }

    /// Segment size of produced NTPL error blocks.
    pub fn with_segment_len(mut self, segment_len: usize) -> Self {
        self.segment_len = segment_len.max(1);
        self
    }

    /// Upper bound on how long an empty acquire blocks before timing out.
    pub fn with_idle_wait(mut self, idle_wait: Duration) -> Self {
        self.idle_wait = idle_wait;
        self
    }

    /// Requeue every delivered frame, producing an endless capture.
    pub fn repeating(mut self, repeat: bool) -> Self {
        self.repeat = repeat;
        self
    }

    /// Queue a frame for the receive stream bound to `stream_id`.
    pub fn push_frame(&mut self, stream_id: u32, frame: EmulatedFrame) {
        self.queues.entry(stream_id).or_default().push_back(frame);
    }

    /// Make the parser reject `statement` with `diagnostics`.
    pub fn reject_statement(
        &mut self,
        statement: impl Into<String>,
        diagnostics: FilterDiagnostics,
    ) {
        self.rejections.insert(statement.into(), diagnostics);
    }

    /// Make the next call at `point` fail with `status`.
    pub fn fail_next(&mut self, point: FailPoint, status: Status) {
        self.failures.insert(point, status);
    }

    /// Overwrite the accumulated counters of one port.
    pub fn set_port_counters(&mut self, port: usize, counters: PortCounters) {
        if let Some(slot) = self.counters.get_mut(port) {
            *slot = counters;
        }
    }

    pub fn is_initialized(&self) -> bool {
        self.initialized
    }

    /// Number of open handles of `kind`.
    pub fn open_count(&self, kind: StreamKind) -> usize {
        self.open.values().filter(|s| s.kind() == kind).count()
    }

    /// Buffers acquired and not yet released.
    pub fn in_flight(&self) -> usize {
        self.in_flight.len()
    }

    /// Buffers handed back so far, failed releases included.
    pub fn released(&self) -> u64 {
        self.released
    }

    /// Frames still queued for `stream_id`.
    pub fn queued(&self, stream_id: u32) -> usize {
        self.queues.get(&stream_id).map_or(0, VecDeque::len)
    }

    /// Every statement submitted, accepted or not.
    pub fn submitted(&self) -> &[String] {
        &self.submitted
    }

    pub fn is_assigned(&self, stream_id: u32) -> bool {
        self.assigned.contains(&stream_id)
    }

    fn take_failure(&mut self, point: FailPoint) -> DriverResult<()> {
        match self.failures.remove(&point) {
            Some(code) => {
                debug!(?point, %code, "Injected driver failure");
                Err(code)
            }
            None => Ok(()),
        }
    }

    fn require_init(&self) -> DriverResult<()> {
        if self.initialized { Ok(()) } else { Err(status::NOT_INITIALIZED) }
    }

    fn open_stream(&mut self, stream: OpenStream) -> DriverResult<RawHandle> {
        self.require_init()?;
        if self.open.values().any(|open| *open == stream) {
            return Err(status::ALREADY_OPEN);
        }
        let handle = RawHandle(self.next_handle);
        self.next_handle += 1;
        self.open.insert(handle, stream);
        Ok(handle)
    }

    fn close_stream(&mut self, handle: RawHandle, kind: StreamKind) -> DriverResult<()> {
        match self.open.get(&handle) {
            Some(stream) if stream.kind() == kind => {
                self.open.remove(&handle);
                self.in_flight.retain(|_, f| f.receive != handle);
                Ok(())
            }
            _ => Err(status::INVALID_HANDLE),
        }
    }

    fn require_stream(&self, handle: RawHandle, kind: StreamKind) -> DriverResult<OpenStream> {
        match self.open.get(&handle) {
            Some(stream) if stream.kind() == kind => Ok(*stream),
            _ => Err(status::INVALID_HANDLE),
        }
    }
}

/// Stream id of an `Assign[streamid=<n>]` statement.
fn assigned_stream_id(statement: &str) -> Option<u32> {
    let lower = statement.to_ascii_lowercase();
    let start = lower.find("streamid=")? + "streamid=".len();
    let digits: String = lower[start..].chars().take_while(char::is_ascii_digit).collect();
    digits.parse().ok()
}

impl CaptureDriver for EmulatedDriver {
    fn init(&mut self) -> DriverResult<()> {
        self.take_failure(FailPoint::Init)?;
        self.initialized = true;
        debug!("Emulated driver initialised");
        Ok(())
    }

    fn done(&mut self) {
        self.initialized = false;
        self.open.clear();
        self.in_flight.clear();
    }

    fn open_config(&mut self, _name: &str) -> DriverResult<RawHandle> {
        self.take_failure(FailPoint::OpenConfig)?;
        self.open_stream(OpenStream::Config)
    }

    fn close_config(&mut self, handle: RawHandle) -> DriverResult<()> {
        let closed = self.close_stream(handle, StreamKind::Config);
        self.take_failure(FailPoint::CloseConfig)?;
        closed
    }

    fn open_stats(&mut self, _name: &str) -> DriverResult<RawHandle> {
        self.take_failure(FailPoint::OpenStats)?;
        self.open_stream(OpenStream::Stats)
    }

    fn close_stats(&mut self, handle: RawHandle) -> DriverResult<()> {
        let closed = self.close_stream(handle, StreamKind::Stats);
        self.take_failure(FailPoint::CloseStats)?;
        closed
    }

    fn open_receive(&mut self, _name: &str, stream_id: u32) -> DriverResult<RawHandle> {
        self.take_failure(FailPoint::OpenReceive)?;
        self.require_init()?;
        if !self.assigned.contains(&stream_id) {
            return Err(status::STREAM_NOT_ASSIGNED);
        }
        self.open_stream(OpenStream::Receive { stream_id })
    }

    fn close_receive(&mut self, handle: RawHandle) -> DriverResult<()> {
        let closed = self.close_stream(handle, StreamKind::Receive);
        self.take_failure(FailPoint::CloseReceive)?;
        closed
    }

    fn submit_filter(&mut self, config: RawHandle, statement: &str) -> NtplReply {
        if let Err(code) = self.require_stream(config, StreamKind::Config) {
            return NtplReply::rejected(code, Vec::new());
        }

        self.submitted.push(statement.to_string());

        if let Some(diagnostics) = self.rejections.get(statement.trim()) {
            let block = encode_error_block(diagnostics, self.segment_len);
            return NtplReply::rejected(status::NTPL_PARSER, block);
        }

        if statement.trim_start().to_ascii_lowercase().starts_with("delete") {
            self.assigned.clear();
            return NtplReply::accepted(0);
        }

        if let Some(stream_id) = assigned_stream_id(statement) {
            self.assigned.insert(stream_id);
        }

        let id = self.next_ntpl_id;
        self.next_ntpl_id += 1;
        NtplReply::accepted(id)
    }

    fn acquire_packet(
        &mut self,
        receive: RawHandle,
        timeout: Duration,
    ) -> DriverResult<RawBuffer> {
        let stream_id = match self.require_stream(receive, StreamKind::Receive)? {
            OpenStream::Receive { stream_id } => stream_id,
            _ => return Err(status::INVALID_HANDLE),
        };
        self.take_failure(FailPoint::Acquire)?;

        let Some(frame) = self.queues.get_mut(&stream_id).and_then(VecDeque::pop_front) else {
            std::thread::sleep(timeout.min(self.idle_wait));
            return Err(status::TIMEOUT);
        };

        if self.repeat {
            self.push_frame(stream_id, frame.clone());
        }

        if let Some(counters) = self.counters.get_mut(frame.port) {
            counters.record_frame(&frame.payload, frame.wire_length as usize);
        }

        let buffer = RawBuffer(self.next_buffer);
        self.next_buffer += 1;
        trace!(buffer = buffer.0, stream_id, "Emulated packet acquired");
        self.in_flight.insert(buffer, InFlight { receive, frame });
        Ok(buffer)
    }

    fn packet_timestamp(&self, buffer: RawBuffer) -> u64 {
        self.in_flight.get(&buffer).map_or(0, |f| f.frame.ticks)
    }

    fn packet_captured_length(&self, buffer: RawBuffer) -> u32 {
        self.in_flight.get(&buffer).map_or(0, |f| {
            f.frame
                .native_captured
                .unwrap_or(f.frame.payload.len() as u32 + Self::DESCRIPTOR_LEN)
        })
    }

    fn packet_wire_length(&self, buffer: RawBuffer) -> u32 {
        self.in_flight.get(&buffer).map_or(0, |f| f.frame.wire_length)
    }

    fn packet_payload(&self, buffer: RawBuffer, len: usize) -> &[u8] {
        match self.in_flight.get(&buffer) {
            Some(f) => &f.frame.payload[..len.min(f.frame.payload.len())],
            None => &[],
        }
    }

    fn release_packet(&mut self, receive: RawHandle, buffer: RawBuffer) -> DriverResult<()> {
        match self.in_flight.get(&buffer) {
            Some(f) if f.receive == receive => {
                self.in_flight.remove(&buffer);
                self.released += 1;
            }
            _ => return Err(status::INVALID_BUFFER),
        }
        self.take_failure(FailPoint::Release)
    }

    fn read_stats(&mut self, stats: RawHandle, mode: StatMode) -> DriverResult<Vec<PortCounters>> {
        self.require_stream(stats, StreamKind::Stats)?;
        self.take_failure(FailPoint::ReadStats)?;

        match mode {
            StatMode::Poll => Ok(self.counters.clone()),
            StatMode::Clear => {
                let previous = self.counters.clone();
                self.counters.iter_mut().for_each(|c| *c = PortCounters::default());
                Ok(previous)
            }
        }
    }

    fn explain(&self, code: Status) -> String {
        let text = match code {
            s if s.is_success() => "Success",
            status::TIMEOUT => "Timeout waiting for packet",
            status::NOT_INITIALIZED => "Driver not initialised",
            status::NO_DEVICE => "No capture adapter found",
            status::INVALID_HANDLE => "Invalid stream handle",
            status::ALREADY_OPEN => "Stream already open",
            status::STREAM_NOT_ASSIGNED => "No filter assigns this stream id",
            status::NTPL_PARSER => "NTPL parser error",
            status::INVALID_BUFFER => "Invalid packet buffer",
            status::GENERIC => "General driver error",
            other => return format!("Unknown status {}", other),
        };
        text.to_string()
    }

    fn is_timeout(&self, code: Status) -> bool {
        code == status::TIMEOUT
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn initialised() -> EmulatedDriver {
        let mut driver = EmulatedDriver::new();
        driver.init().unwrap();
        driver
    }

    #[test]
    fn streams_require_init() {
        let mut driver = EmulatedDriver::new();
        assert_eq!(driver.open_config("config"), Err(status::NOT_INITIALIZED));
        driver.init().unwrap();
        assert!(driver.open_config("config").is_ok());
    }

    #[test]
    fn second_open_of_same_kind_is_rejected() {
        let mut driver = initialised();
        let first = driver.open_stats("stats").unwrap();
        assert_eq!(driver.open_stats("stats"), Err(status::ALREADY_OPEN));
        driver.close_stats(first).unwrap();
        assert!(driver.open_stats("stats").is_ok());
    }

    #[test]
    fn receive_requires_assignment() {
        let mut driver = initialised();
        let config = driver.open_config("config").unwrap();
        assert_eq!(driver.open_receive("rx", 4), Err(status::STREAM_NOT_ASSIGNED));

        let reply = driver.submit_filter(config, "Assign[streamid=4] = All");
        assert!(reply.status.is_success());
        assert!(reply.ntpl_id > 0);
        assert!(driver.open_receive("rx", 4).is_ok());
    }

    #[test]
    fn delete_clears_assignments_and_assigns_no_id() {
        let mut driver = initialised();
        let config = driver.open_config("config").unwrap();
        driver.submit_filter(config, "Assign[StreamId=2] = All");
        assert!(driver.is_assigned(2));

        let reply = driver.submit_filter(config, "Delete = ALL");
        assert_eq!(reply.ntpl_id, 0);
        assert!(!driver.is_assigned(2));
    }

    #[test]
    fn stream_id_parsing() {
        assert_eq!(assigned_stream_id("Assign[streamid=12;color=7] = All"), Some(12));
        assert_eq!(assigned_stream_id("Define f = Filter(Port==0)"), None);
    }

    #[test]
    fn acquire_times_out_on_empty_queue() {
        let mut driver = initialised().with_idle_wait(Duration::ZERO);
        let config = driver.open_config("config").unwrap();
        driver.submit_filter(config, "Assign[streamid=1] = All");
        let rx = driver.open_receive("rx", 1).unwrap();

        let err = driver.acquire_packet(rx, Duration::from_millis(1000)).unwrap_err();
        assert!(driver.is_timeout(err));
        assert_eq!(driver.explain(err), "Timeout waiting for packet");
    }

    #[test]
    fn payload_request_is_clamped_to_the_frame() {
        let mut driver = initialised();
        let config = driver.open_config("config").unwrap();
        driver.submit_filter(config, "Assign[streamid=1] = All");
        let rx = driver.open_receive("rx", 1).unwrap();
        driver.push_frame(1, EmulatedFrame::new(0, vec![7; 64]));

        let buffer = driver.acquire_packet(rx, Duration::ZERO).unwrap();
        assert_eq!(driver.packet_payload(buffer, 1 << 30).len(), 64);
        assert_eq!(driver.packet_payload(buffer, 10), &[7; 10]);
    }

    #[test]
    fn release_returns_buffer_even_when_failing() {
        let mut driver = initialised();
        let config = driver.open_config("config").unwrap();
        driver.submit_filter(config, "Assign[streamid=1] = All");
        let rx = driver.open_receive("rx", 1).unwrap();
        driver.push_frame(1, EmulatedFrame::new(0, vec![1, 2, 3]));

        let buffer = driver.acquire_packet(rx, Duration::ZERO).unwrap();
        assert_eq!(driver.in_flight(), 1);
        driver.fail_next(FailPoint::Release, status::GENERIC);
        assert_eq!(driver.release_packet(rx, buffer), Err(status::GENERIC));
        assert_eq!(driver.in_flight(), 0);
        assert_eq!(driver.released(), 1);
    }

    #[test]
    fn clear_zeroes_accumulators() {
        let mut driver = initialised().with_ports(2);
        let stats = driver.open_stats("stats").unwrap();
        driver.set_port_counters(1, PortCounters { pkts: 9, ..Default::default() });

        let polled = driver.read_stats(stats, StatMode::Poll).unwrap();
        assert_eq!(polled[1].pkts, 9);

        driver.read_stats(stats, StatMode::Clear).unwrap();
        let after = driver.read_stats(stats, StatMode::Poll).unwrap();
        assert!(after.iter().all(PortCounters::is_zero));
    }
}
