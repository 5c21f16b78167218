//! Per-packet capture metadata and native timestamp conversion

use serde::Serialize;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use crate::{CaptureError, Result};

/// Native timestamp resolution: one tick is 10 ns.
pub const NANOS_PER_TICK: u64 = 10;

/// Native ticks in one second.
pub const TICKS_PER_SECOND: u64 = 1_000_000_000 / NANOS_PER_TICK;

/// Convert a native 10 ns tick counter into time elapsed since the Unix epoch.
pub fn ticks_to_duration(ticks: u64) -> Duration {
    let secs = ticks / TICKS_PER_SECOND;
    // < 1e9, fits in u32
    let nanos = (ticks % TICKS_PER_SECOND) * NANOS_PER_TICK;
    Duration::new(secs, nanos as u32)
}

/// Convert a native 10 ns tick counter into a wall-clock timestamp.
pub fn ticks_to_system_time(ticks: u64) -> SystemTime {
    UNIX_EPOCH + ticks_to_duration(ticks)
}

/// Metadata for one received packet.
///
/// Produced once per successful receive and never mutated afterwards. Only
/// [`CaptureInfo::from_native`] builds one, so its lengths are always consistent.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[non_exhaustive]
pub struct CaptureInfo {
    /// When the adapter captured the packet
    pub timestamp: SystemTime,
    /// Raw native timestamp (10 ns ticks since 1970-01-01T00:00:00Z)
    pub ticks: u64,
    /// Bytes delivered to software, descriptor header excluded
    pub captured_length: usize,
    /// Size of the original frame on the wire, always >= `captured_length`
    pub wire_length: usize,
}

impl CaptureInfo {
    /// Build capture metadata from the raw descriptor values of a native buffer.
    ///
    /// `native_captured` includes the descriptor header of `descriptor_len` bytes.
    /// Lengths that cannot describe a real packet are rejected with
    /// [`CaptureError::InconsistentLength`].
    pub fn from_native(
        ticks: u64,
        native_captured: u32,
        wire_length: u32,
        descriptor_len: u32,
    ) -> Result<Self> {
        let captured = i64::from(native_captured) - i64::from(descriptor_len);
        let wire = i64::from(wire_length);

        if captured < 0 || captured > wire {
            return Err(CaptureError::InconsistentLength { captured, wire });
        }

        Ok(Self {
            timestamp: ticks_to_system_time(ticks),
            ticks,
            captured_length: captured as usize,
            wire_length: wire_length as usize,
        })
    }

    /// Time since the Unix epoch at 10 ns resolution.
    pub fn since_epoch(&self) -> Duration {
        ticks_to_duration(self.ticks)
    }

    /// Whether the adapter delivered fewer bytes than were on the wire.
    pub fn is_truncated(&self) -> bool {
        self.captured_length < self.wire_length
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn whole_second_conversion() {
        let ts = ticks_to_duration(100_000_000);
        assert_eq!(ts.as_secs(), 1);
        assert_eq!(ts.subsec_nanos(), 0);
        assert_eq!(ticks_to_system_time(100_000_000), UNIX_EPOCH + Duration::from_secs(1));
    }

    #[test]
    fn fractional_second_conversion() {
        let ts = ticks_to_duration(150_000_000);
        assert_eq!(ts, Duration::from_millis(1500));
    }

    #[test]
    fn zero_ticks_is_epoch() {
        assert_eq!(ticks_to_system_time(0), UNIX_EPOCH);
    }

    #[test]
    fn descriptor_is_excluded_from_captured_length() {
        let info = CaptureInfo::from_native(0, 16 + 60, 64, 16).unwrap();
        assert_eq!(info.captured_length, 60);
        assert_eq!(info.wire_length, 64);
        assert!(info.is_truncated());
    }

    #[test]
    fn zero_length_payload_is_valid() {
        let info = CaptureInfo::from_native(7, 16, 0, 16).unwrap();
        assert_eq!(info.captured_length, 0);
        assert!(!info.is_truncated());
    }

    #[test]
    fn captured_beyond_wire_is_rejected() {
        let err = CaptureInfo::from_native(0, 16 + 100, 64, 16).unwrap_err();
        assert!(matches!(err, CaptureError::InconsistentLength { captured: 100, wire: 64 }));
    }

    #[test]
    fn captured_below_descriptor_is_rejected() {
        let err = CaptureInfo::from_native(0, 8, 64, 16).unwrap_err();
        assert!(matches!(err, CaptureError::InconsistentLength { captured: -8, .. }));
    }

    proptest! {
        #[test]
        fn tick_conversion_is_exact(ticks in any::<u64>()) {
            let duration = ticks_to_duration(ticks);
            let back = duration.as_secs() as u128 * TICKS_PER_SECOND as u128
                + (duration.subsec_nanos() as u128 / NANOS_PER_TICK as u128);
            prop_assert_eq!(back, ticks as u128);
            prop_assert_eq!(duration.subsec_nanos() % NANOS_PER_TICK as u32, 0);
        }

        #[test]
        fn accepted_lengths_are_ordered(
            captured in 0u32..20_000u32,
            wire in 0u32..20_000u32,
        ) {
            match CaptureInfo::from_native(0, captured + 16, wire, 16) {
                Ok(info) => {
                    prop_assert!(info.captured_length <= info.wire_length);
                    prop_assert_eq!(info.captured_length, captured as usize);
                }
                Err(CaptureError::InconsistentLength { .. }) => prop_assert!(captured > wire),
                Err(other) => prop_assert!(false, "unexpected error {other}"),
            }
        }
    }
}
