//! Napatech driver backend
//!
//! With the `napatech` feature, [`NativeDriver`] calls libntapi through the C
//! shim in `ntshim/`. Without it, [`NativeDriver::open`] always fails with
//! [`CaptureError::UnsupportedPlatform`](crate::CaptureError::UnsupportedPlatform).

#[cfg(feature = "napatech")]
mod ffi;

#[cfg(feature = "napatech")]
use {
    crate::driver::{
        CaptureDriver, DriverResult, NT_DESCRIPTOR_LEN, NtplReply, RawBuffer, RawHandle, StatMode,
        Status,
    },
    crate::ntpl::error_block_len,
    crate::types::PortCounters,
    crate::{CaptureError, Result},
    std::ffi::{CStr, CString},
    std::os::raw::{c_char, c_int, c_void},
    std::ptr,
    std::time::Duration,
    tracing::{debug, info},
};

/// Status reported locally when a name or statement contains a NUL byte.
#[cfg(feature = "napatech")]
pub const INTERIOR_NUL: Status = Status(-1);

#[cfg(feature = "napatech")]
const EXPLAIN_BUFFER_LEN: usize = 128;

/// Capture driver backed by libntapi.
#[cfg(feature = "napatech")]
#[derive(Debug)]
pub struct NativeDriver {
    segment_len: usize,
    max_ports: usize,
    timeout: Status,
}

#[cfg(feature = "napatech")]
impl NativeDriver {
    /// Load the driver constants from the linked library.
    ///
    /// Fails when the library's descriptor header size differs from the one this
    /// crate strips from captured lengths.
    pub fn open() -> Result<Self> {
        // SAFETY: constant getters with no preconditions
        let (descriptor_len, segment_len, max_ports, timeout) = unsafe {
            (
                ffi::ntshim_descriptor_len(),
                ffi::ntshim_ntpl_segment_len(),
                ffi::ntshim_max_ports(),
                ffi::ntshim_status_timeout(),
            )
        };

        if descriptor_len != NT_DESCRIPTOR_LEN {
            return Err(CaptureError::malformed(format!(
                "driver descriptor header is {} bytes, expected {}",
                descriptor_len, NT_DESCRIPTOR_LEN
            )));
        }

        info!(segment_len, max_ports, "Native capture driver loaded");

        Ok(Self {
            segment_len: segment_len as usize,
            max_ports: max_ports as usize,
            timeout: Status(timeout),
        })
    }
}

#[cfg(feature = "napatech")]
fn check(status: c_int) -> DriverResult<()> {
    if status == 0 { Ok(()) } else { Err(Status(status)) }
}

#[cfg(feature = "napatech")]
fn c_string(value: &str) -> DriverResult<CString> {
    CString::new(value).map_err(|_| INTERIOR_NUL)
}

#[cfg(feature = "napatech")]
fn as_ptr(handle: RawHandle) -> *mut c_void {
    handle.0 as usize as *mut c_void
}

#[cfg(feature = "napatech")]
fn open_with(
    name: &str,
    open: impl FnOnce(*mut *mut c_void, *const c_char) -> c_int,
) -> DriverResult<RawHandle> {
    let name = c_string(name)?;
    let mut handle: *mut c_void = ptr::null_mut();
    check(open(ptr::addr_of_mut!(handle), name.as_ptr()))?;
    Ok(RawHandle(handle as usize as u64))
}

#[cfg(feature = "napatech")]
impl From<ffi::Rmon1Counters> for PortCounters {
    fn from(c: ffi::Rmon1Counters) -> Self {
        Self {
            drop_events: c.drop_events,
            octets: c.octets,
            pkts: c.pkts,
            broadcast_pkts: c.broadcast_pkts,
            multicast_pkts: c.multicast_pkts,
            crc_align_errors: c.crc_align_errors,
            undersize_pkts: c.undersize_pkts,
            oversize_pkts: c.oversize_pkts,
            fragments: c.fragments,
            jabbers: c.jabbers,
            collisions: c.collisions,
            pkts_64_octets: c.pkts_64_octets,
            pkts_65_to_127_octets: c.pkts_65_to_127_octets,
            pkts_128_to_255_octets: c.pkts_128_to_255_octets,
            pkts_256_to_511_octets: c.pkts_256_to_511_octets,
            pkts_512_to_1023_octets: c.pkts_512_to_1023_octets,
            pkts_1024_to_1518_octets: c.pkts_1024_to_1518_octets,
        }
    }
}

// SAFETY (all blocks below): handles and buffers are pointers the library handed
// out and the session only passes back ones it has not closed or released.
#[cfg(feature = "napatech")]
impl CaptureDriver for NativeDriver {
    fn init(&mut self) -> DriverResult<()> {
        check(unsafe { ffi::ntshim_init() })
    }

    fn done(&mut self) {
        unsafe { ffi::ntshim_done() };
        debug!("Native capture driver shut down");
    }

    fn open_config(&mut self, name: &str) -> DriverResult<RawHandle> {
        open_with(name, |handle, name| unsafe { ffi::ntshim_config_open(handle, name) })
    }

    fn close_config(&mut self, handle: RawHandle) -> DriverResult<()> {
        check(unsafe { ffi::ntshim_config_close(as_ptr(handle)) })
    }

    fn open_stats(&mut self, name: &str) -> DriverResult<RawHandle> {
        open_with(name, |handle, name| unsafe { ffi::ntshim_stat_open(handle, name) })
    }

    fn close_stats(&mut self, handle: RawHandle) -> DriverResult<()> {
        check(unsafe { ffi::ntshim_stat_close(as_ptr(handle)) })
    }

    fn open_receive(&mut self, name: &str, stream_id: u32) -> DriverResult<RawHandle> {
        open_with(name, |handle, name| unsafe { ffi::ntshim_rx_open(handle, name, stream_id) })
    }

    fn close_receive(&mut self, handle: RawHandle) -> DriverResult<()> {
        check(unsafe { ffi::ntshim_rx_close(as_ptr(handle)) })
    }

    fn submit_filter(&mut self, config: RawHandle, statement: &str) -> NtplReply {
        let statement = match c_string(statement) {
            Ok(statement) => statement,
            Err(status) => return NtplReply::rejected(status, Vec::new()),
        };

        let mut ntpl_id = 0u32;
        let mut block = vec![0u8; error_block_len(self.segment_len)];
        let status = unsafe {
            ffi::ntshim_ntpl(
                as_ptr(config),
                statement.as_ptr(),
                &mut ntpl_id,
                block.as_mut_ptr(),
                block.len(),
            )
        };

        match check(status) {
            Ok(()) => NtplReply::accepted(ntpl_id),
            Err(status) => NtplReply::rejected(status, block),
        }
    }

    fn acquire_packet(
        &mut self,
        receive: RawHandle,
        timeout: Duration,
    ) -> DriverResult<RawBuffer> {
        let timeout_ms = timeout.as_millis().min(c_int::MAX as u128) as c_int;
        let mut buffer: *mut c_void = ptr::null_mut();
        check(unsafe { ffi::ntshim_rx_get(as_ptr(receive), &mut buffer, timeout_ms) })?;
        Ok(RawBuffer(buffer as usize as u64))
    }

    fn packet_timestamp(&self, buffer: RawBuffer) -> u64 {
        unsafe { ffi::ntshim_pkt_timestamp(buffer.0 as usize as *mut c_void) }
    }

    fn packet_captured_length(&self, buffer: RawBuffer) -> u32 {
        unsafe { ffi::ntshim_pkt_cap_length(buffer.0 as usize as *mut c_void) }
    }

    fn packet_wire_length(&self, buffer: RawBuffer) -> u32 {
        unsafe { ffi::ntshim_pkt_wire_length(buffer.0 as usize as *mut c_void) }
    }

    fn packet_payload(&self, buffer: RawBuffer, len: usize) -> &[u8] {
        let available = self.packet_captured_length(buffer).saturating_sub(NT_DESCRIPTOR_LEN);
        let len = len.min(available as usize);
        let data = unsafe { ffi::ntshim_pkt_l2_ptr(buffer.0 as usize as *mut c_void) };
        if data.is_null() || len == 0 {
            return &[];
        }
        // SAFETY: `len` is clamped to the descriptor's captured length minus the
        // header, which the driver guarantees is readable past the L2 pointer.
        // The slice borrows `self`, and release needs `&mut self`.
        unsafe { std::slice::from_raw_parts(data, len) }
    }

    fn release_packet(&mut self, receive: RawHandle, buffer: RawBuffer) -> DriverResult<()> {
        check(unsafe {
            ffi::ntshim_rx_release(as_ptr(receive), buffer.0 as usize as *mut c_void)
        })
    }

    fn read_stats(&mut self, stats: RawHandle, mode: StatMode) -> DriverResult<Vec<PortCounters>> {
        let clear = c_int::from(mode == StatMode::Clear);
        let mut blocks = vec![ffi::Rmon1Counters::default(); self.max_ports];
        let mut ports = 0u32;

        check(unsafe {
            ffi::ntshim_stat_read(
                as_ptr(stats),
                clear,
                blocks.as_mut_ptr(),
                blocks.len() as u32,
                &mut ports,
            )
        })?;

        blocks.truncate((ports as usize).min(self.max_ports));
        Ok(blocks.into_iter().map(PortCounters::from).collect())
    }

    fn explain(&self, status: Status) -> String {
        if status == INTERIOR_NUL {
            return "Argument contains an interior NUL byte".to_string();
        }

        let mut buffer = [0 as c_char; EXPLAIN_BUFFER_LEN];
        let capacity = (EXPLAIN_BUFFER_LEN - 1) as u32;
        unsafe { ffi::ntshim_explain(status.0, buffer.as_mut_ptr(), capacity) };
        buffer[EXPLAIN_BUFFER_LEN - 1] = 0;

        // SAFETY: the buffer is NUL-terminated above
        unsafe { CStr::from_ptr(buffer.as_ptr()) }.to_string_lossy().into_owned()
    }

    fn is_timeout(&self, status: Status) -> bool {
        status == self.timeout
    }
}

/// Placeholder for builds without the `napatech` feature. Cannot be constructed.
#[cfg(not(feature = "napatech"))]
#[derive(Debug)]
pub struct NativeDriver {
    never: std::convert::Infallible,
}

#[cfg(not(feature = "napatech"))]
impl NativeDriver {
    /// Always fails: the crate was built without the `napatech` feature.
    pub fn open() -> crate::Result<Self> {
        Err(crate::CaptureError::unsupported_platform("Native capture driver"))
    }
}

#[cfg(not(feature = "napatech"))]
mod unsupported {
    use super::NativeDriver;
    use crate::driver::{
        CaptureDriver, DriverResult, NtplReply, RawBuffer, RawHandle, StatMode, Status,
    };
    use crate::types::PortCounters;
    use std::time::Duration;

    impl CaptureDriver for NativeDriver {
        fn init(&mut self) -> DriverResult<()> {
            match self.never {}
        }

        fn open_config(&mut self, _: &str) -> DriverResult<RawHandle> {
            match self.never {}
        }

        fn close_config(&mut self, _: RawHandle) -> DriverResult<()> {
            match self.never {}
        }

        fn open_stats(&mut self, _: &str) -> DriverResult<RawHandle> {
            match self.never {}
        }

        fn close_stats(&mut self, _: RawHandle) -> DriverResult<()> {
            match self.never {}
        }

        fn open_receive(&mut self, _: &str, _: u32) -> DriverResult<RawHandle> {
            match self.never {}
        }

        fn close_receive(&mut self, _: RawHandle) -> DriverResult<()> {
            match self.never {}
        }

        fn submit_filter(&mut self, _: RawHandle, _: &str) -> NtplReply {
            match self.never {}
        }

        fn acquire_packet(&mut self, _: RawHandle, _: Duration) -> DriverResult<RawBuffer> {
            match self.never {}
        }

        fn packet_timestamp(&self, _: RawBuffer) -> u64 {
            match self.never {}
        }

        fn packet_captured_length(&self, _: RawBuffer) -> u32 {
            match self.never {}
        }

        fn packet_wire_length(&self, _: RawBuffer) -> u32 {
            match self.never {}
        }

        fn packet_payload(&self, _: RawBuffer, _: usize) -> &[u8] {
            match self.never {}
        }

        fn release_packet(&mut self, _: RawHandle, _: RawBuffer) -> DriverResult<()> {
            match self.never {}
        }

        fn read_stats(&mut self, _: RawHandle, _: StatMode) -> DriverResult<Vec<PortCounters>> {
            match self.never {}
        }

        fn explain(&self, _: Status) -> String {
            match self.never {}
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[cfg(not(feature = "napatech"))]
    #[test]
    fn open_without_feature_is_unsupported() {
        let err = NativeDriver::open().unwrap_err();
        assert!(matches!(err, crate::CaptureError::UnsupportedPlatform { .. }));
        assert!(err.to_string().contains("napatech"));
    }

    #[cfg(feature = "napatech")]
    #[test]
    fn rmon_blocks_map_field_for_field() {
        let raw =
            ffi::Rmon1Counters { pkts: 3, octets: 192, pkts_64_octets: 3, ..Default::default() };
        let counters = PortCounters::from(raw);
        assert_eq!(counters.pkts, 3);
        assert_eq!(counters.octets, 192);
        assert_eq!(counters.pkts_64_octets, 3);
        assert_eq!(counters.total_errors(), 0);
    }

    #[cfg(feature = "napatech")]
    #[test]
    fn interior_nul_is_rejected_before_the_driver() {
        assert_eq!(c_string("bad\0name").unwrap_err(), INTERIOR_NUL);
    }
}
