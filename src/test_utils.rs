//! Fixture builders shared by unit tests and benchmarks
//!
//! Frames, NTPL error blocks and ready-to-receive sessions over the
//! [`EmulatedDriver`], so tests state only what differs from the reference
//! capture flow.

#![cfg(any(test, feature = "benchmark"))]

use crate::CaptureConfig;
use crate::drivers::emulated::{EmulatedDriver, EmulatedFrame};
use crate::ntpl::encode_error_block;
use crate::session::Session;
use crate::types::FilterDiagnostics;

/// Stream id used by [`ready_session`].
pub const TEST_STREAM_ID: u32 = 1;

/// Maximum untagged Ethernet frame size used by the reference capture tool.
pub const REFERENCE_BUFFER_LEN: usize = 1522;

/// NTPL error block with the given lines and code, `segment_len` bytes per line.
pub fn ntpl_error_block(lines: [&str; 3], code: i32, segment_len: usize) -> Vec<u8> {
    let diagnostics = FilterDiagnostics { lines: lines.map(str::to_string), code };
    encode_error_block(&diagnostics, segment_len)
}

/// Deterministic Ethernet frame of `len` bytes addressed to `dest`.
///
/// Bytes past the MAC header follow a counting pattern so copies are checkable.
pub fn ethernet_frame(dest: [u8; 6], len: usize) -> Vec<u8> {
    let mut frame: Vec<u8> = (0..len).map(|i| (i % 251) as u8).collect();
    let header = len.min(6);
    frame[..header].copy_from_slice(&dest[..header]);
    frame
}

/// Unicast frame of `len` bytes.
pub fn unicast_frame(len: usize) -> Vec<u8> {
    ethernet_frame([0x00, 0x1b, 0x21, 0x3c, 0x4d, 0x5e], len)
}

/// `count` unicast frames of `len` bytes, one second apart starting at the epoch.
pub fn frame_sequence(count: usize, len: usize) -> Vec<EmulatedFrame> {
    (0..count)
        .map(|i| {
            let mut payload = unicast_frame(len);
            if let Some(last) = payload.last_mut() {
                *last = i as u8;
            }
            EmulatedFrame::new(i as u64 * 100_000_000, payload)
        })
        .collect()
}

/// Session over `driver` bootstrapped with the default port program on
/// [`TEST_STREAM_ID`], statistics stream included.
///
/// Panics when bootstrap fails; intended for fixtures only.
pub fn ready_session(driver: EmulatedDriver) -> Session<EmulatedDriver> {
    let config =
        CaptureConfig { stream_id: TEST_STREAM_ID, open_stats: true, ..CaptureConfig::default() };
    match Session::bootstrap(driver, &config) {
        Ok((session, _)) => session,
        Err(err) => panic!("Emulated bootstrap failed: {err}"),
    }
}

/// Ready session with `frames` queued on [`TEST_STREAM_ID`].
pub fn session_with_frames(frames: Vec<EmulatedFrame>) -> Session<EmulatedDriver> {
    let mut session = ready_session(EmulatedDriver::new());
    for frame in frames {
        session.driver_mut().push_frame(TEST_STREAM_ID, frame);
    }
    session
}

/// Install a test-writer subscriber honouring `RUST_LOG`. Safe to call repeatedly.
#[cfg(test)]
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn frames_carry_destination_and_length() {
        let frame = ethernet_frame([0xff; 6], 64);
        assert_eq!(frame.len(), 64);
        assert_eq!(&frame[..6], &[0xff; 6]);
    }

    #[test]
    fn sequence_frames_are_distinct() {
        let frames = frame_sequence(3, 60);
        assert_eq!(frames.len(), 3);
        assert_ne!(frames[0].payload, frames[1].payload);
        assert_eq!(frames[2].ticks, 200_000_000);
    }

    #[test]
    fn ready_session_has_receive_and_stats_open() {
        let session = ready_session(EmulatedDriver::new());
        assert!(session.is_open(crate::StreamKind::Receive));
        assert!(session.is_open(crate::StreamKind::Stats));
    }
}
