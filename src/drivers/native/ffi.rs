//! Raw declarations of the `ntshim` C layer over libntapi.
//!
//! Every `unsafe extern` item crossing into the vendor driver lives here. Handles
//! and packet buffers are opaque pointers owned by the driver.

use std::os::raw::{c_char, c_int, c_void};

/// RMON1 receive counters of one port, laid out as `ntshim_rmon1_t`.
#[repr(C)]
#[derive(Debug, Clone, Copy, Default)]
pub struct Rmon1Counters {
    pub drop_events: u64,
    pub octets: u64,
    pub pkts: u64,
    pub broadcast_pkts: u64,
    pub multicast_pkts: u64,
    pub crc_align_errors: u64,
    pub undersize_pkts: u64,
    pub oversize_pkts: u64,
    pub fragments: u64,
    pub jabbers: u64,
    pub collisions: u64,
    pub pkts_64_octets: u64,
    pub pkts_65_to_127_octets: u64,
    pub pkts_128_to_255_octets: u64,
    pub pkts_256_to_511_octets: u64,
    pub pkts_512_to_1023_octets: u64,
    pub pkts_1024_to_1518_octets: u64,
}

unsafe extern "C" {
    pub(crate) fn ntshim_init() -> c_int;
    pub(crate) fn ntshim_done();
    pub(crate) fn ntshim_explain(status: c_int, buf: *mut c_char, len: u32);
    pub(crate) fn ntshim_status_timeout() -> c_int;

    pub(crate) fn ntshim_descriptor_len() -> u32;
    pub(crate) fn ntshim_ntpl_segment_len() -> u32;
    pub(crate) fn ntshim_max_ports() -> u32;

    pub(crate) fn ntshim_config_open(handle: *mut *mut c_void, name: *const c_char) -> c_int;
    pub(crate) fn ntshim_config_close(handle: *mut c_void) -> c_int;
    pub(crate) fn ntshim_stat_open(handle: *mut *mut c_void, name: *const c_char) -> c_int;
    pub(crate) fn ntshim_stat_close(handle: *mut c_void) -> c_int;
    pub(crate) fn ntshim_rx_open(
        handle: *mut *mut c_void,
        name: *const c_char,
        stream_id: u32,
    ) -> c_int;
    pub(crate) fn ntshim_rx_close(handle: *mut c_void) -> c_int;

    pub(crate) fn ntshim_ntpl(
        config: *mut c_void,
        statement: *const c_char,
        ntpl_id: *mut u32,
        error_block: *mut u8,
        error_block_len: usize,
    ) -> c_int;

    pub(crate) fn ntshim_rx_get(rx: *mut c_void, buf: *mut *mut c_void, timeout_ms: c_int)
    -> c_int;
    pub(crate) fn ntshim_rx_release(rx: *mut c_void, buf: *mut c_void) -> c_int;
    pub(crate) fn ntshim_pkt_timestamp(buf: *mut c_void) -> u64;
    pub(crate) fn ntshim_pkt_cap_length(buf: *mut c_void) -> u32;
    pub(crate) fn ntshim_pkt_wire_length(buf: *mut c_void) -> u32;
    pub(crate) fn ntshim_pkt_l2_ptr(buf: *mut c_void) -> *const u8;

    pub(crate) fn ntshim_stat_read(
        stat: *mut c_void,
        clear: c_int,
        out: *mut Rmon1Counters,
        max_ports: u32,
        ports: *mut u32,
    ) -> c_int;
}
