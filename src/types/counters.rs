//! Per-port RMON1 counter types

use serde::{Deserialize, Serialize};

/// Shortest legal Ethernet frame, FCS included.
pub const MIN_FRAME_LEN: usize = 64;

/// Longest untagged Ethernet frame, FCS included.
pub const MAX_FRAME_LEN: usize = 1518;

/// RMON1 counter set reported for one port.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PortCounters {
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

impl PortCounters {
    /// Whether every counter is zero.
    pub fn is_zero(&self) -> bool {
        *self == PortCounters::default()
    }

    /// Sum of all error classes.
    pub fn total_errors(&self) -> u64 {
        self.crc_align_errors
            + self.undersize_pkts
            + self.oversize_pkts
            + self.fragments
            + self.jabbers
    }

    /// Account one good frame of `wire_length` bytes whose first bytes are `frame`.
    ///
    /// The destination MAC in `frame` classifies broadcast and multicast frames.
    pub fn record_frame(&mut self, frame: &[u8], wire_length: usize) {
        self.pkts += 1;
        self.octets += wire_length as u64;

        if let Some(dst) = frame.get(..6) {
            if dst.iter().all(|&b| b == 0xff) {
                self.broadcast_pkts += 1;
            } else if dst[0] & 0x01 != 0 {
                self.multicast_pkts += 1;
            }
        }

        match wire_length {
            0..MIN_FRAME_LEN => self.undersize_pkts += 1,
            MIN_FRAME_LEN => self.pkts_64_octets += 1,
            65..=127 => self.pkts_65_to_127_octets += 1,
            128..=255 => self.pkts_128_to_255_octets += 1,
            256..=511 => self.pkts_256_to_511_octets += 1,
            512..=1023 => self.pkts_512_to_1023_octets += 1,
            1024..=MAX_FRAME_LEN => self.pkts_1024_to_1518_octets += 1,
            _ => self.oversize_pkts += 1,
        }
    }
}

/// Immutable counter snapshot for one port, produced by a poll.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PortCounterSnapshot {
    /// Port index the counters were read from
    pub port: usize,
    /// Counter values at the time of the poll
    pub counters: PortCounters,
}

impl PortCounterSnapshot {
    pub fn new(port: usize, counters: PortCounters) -> Self {
        Self { port, counters }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const BROADCAST: [u8; 6] = [0xff; 6];
    const MULTICAST: [u8; 6] = [0x01, 0x00, 0x5e, 0x00, 0x00, 0x01];
    const UNICAST: [u8; 6] = [0x00, 0x1b, 0x21, 0x3a, 0x4f, 0x02];

    #[test]
    fn default_counters_are_zero() {
        assert!(PortCounters::default().is_zero());
    }

    #[test]
    fn frames_land_in_size_buckets() {
        let mut counters = PortCounters::default();
        for len in [40, 64, 100, 200, 300, 600, 1500, 9000] {
            counters.record_frame(&UNICAST, len);
        }

        assert_eq!(counters.pkts, 8);
        assert_eq!(counters.undersize_pkts, 1);
        assert_eq!(counters.pkts_64_octets, 1);
        assert_eq!(counters.pkts_65_to_127_octets, 1);
        assert_eq!(counters.pkts_128_to_255_octets, 1);
        assert_eq!(counters.pkts_256_to_511_octets, 1);
        assert_eq!(counters.pkts_512_to_1023_octets, 1);
        assert_eq!(counters.pkts_1024_to_1518_octets, 1);
        assert_eq!(counters.oversize_pkts, 1);
        assert_eq!(counters.total_errors(), 2);
    }

    #[test]
    fn destination_address_classifies_frames() {
        let mut counters = PortCounters::default();
        counters.record_frame(&BROADCAST, 64);
        counters.record_frame(&MULTICAST, 64);
        counters.record_frame(&UNICAST, 64);
        counters.record_frame(&[], 64);

        assert_eq!(counters.broadcast_pkts, 1);
        assert_eq!(counters.multicast_pkts, 1);
        assert_eq!(counters.octets, 256);
    }
}
