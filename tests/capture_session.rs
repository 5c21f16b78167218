//! End-to-end capture flow through the public API on the emulated driver

use anyhow::Result;
use ntcapture::drivers::emulated::status;
use ntcapture::drivers::FailPoint;
use ntcapture::{
    CaptureConfig, CaptureError, EmulatedDriver, EmulatedFrame, NtCapture, Session, StreamKind,
};
use std::time::{Duration, UNIX_EPOCH};

const STREAM_ID: u32 = 1;

fn frame(len: usize, fill: u8) -> Vec<u8> {
    let mut data = vec![fill; len];
    data[..6].copy_from_slice(&[0x00, 0x0c, 0x29, 0x01, 0x02, 0x03]);
    data
}

#[test]
fn reference_capture_flow() -> Result<()> {
    let yaml = r#"
port: 0
stream_id: 1
open_stats: true
receive_timeout_ms: 50
"#;
    let config = CaptureConfig::from_yaml_str(yaml)?;
    let (mut session, results) = NtCapture::emulated(&config)?;

    assert_eq!(results.len(), 3);
    assert_eq!(results[0].id(), None);
    assert!(results[2].id().is_some());
    assert_eq!(session.receive_timeout(), Duration::from_millis(50));

    let sent: Vec<Vec<u8>> = (0..4u8).map(|i| frame(64 + usize::from(i) * 100, i)).collect();
    for (i, data) in sent.iter().enumerate() {
        let ticks = 100_000_000 * (i as u64 + 1);
        session.driver_mut().push_frame(STREAM_ID, EmulatedFrame::new(ticks, data.clone()));
    }

    let mut buffer = [0u8; 1522];
    for (i, expected) in sent.iter().enumerate() {
        let delivery = if i % 2 == 0 {
            let (info, bytes) = session.receive_new()?.into_result()?;
            assert_eq!(&bytes, expected);
            info
        } else {
            let (info, copied) = session.receive_into(&mut buffer)?.into_result()?;
            assert_eq!(&buffer[..copied], expected.as_slice());
            info
        };
        assert_eq!(delivery.timestamp, UNIX_EPOCH + Duration::from_secs(i as u64 + 1));
        assert_eq!(delivery.captured_length, expected.len());
    }

    let counters = session.read_port(0)?.counters;
    assert_eq!(counters.pkts, 4);
    assert_eq!(counters.octets, sent.iter().map(|f| f.len() as u64).sum::<u64>());

    session.clear()?;
    assert!(session.read_port(0)?.counters.is_zero());

    let err = session.receive_new().unwrap_err();
    assert!(err.is_timeout());
    Ok(())
}

#[test]
fn fail_fast_sequence_reports_first_error() -> Result<()> {
    let mut driver = EmulatedDriver::new();
    driver.fail_next(FailPoint::OpenConfig, status::NO_DEVICE);

    let err = Session::bootstrap(driver, &CaptureConfig::default()).err();
    match err {
        Some(CaptureError::HandleOpen { stream: StreamKind::Config, message }) => {
            assert_eq!(message, "No capture adapter found");
        }
        other => panic!("Expected HandleOpen for config, got {other:?}"),
    }
    Ok(())
}

#[test]
fn explicit_program_is_submitted_verbatim() -> Result<()> {
    let yaml = r#"
stream_id: 4
filters:
  - "Delete = ALL"
  - "Assign[streamid=4;color=7] = All"
"#;
    let config = CaptureConfig::from_yaml_str(yaml)?;
    let (session, _) = NtCapture::emulated(&config)?;

    assert_eq!(session.driver().submitted(), config.filters.as_slice());
    assert!(session.driver().is_assigned(4));
    Ok(())
}

#[test]
fn closed_handles_refuse_work() -> Result<()> {
    let (mut session, _) = NtCapture::emulated(&CaptureConfig::default())?;
    session.close_receive()?;
    session.close_config()?;

    assert!(matches!(session.receive_new(), Err(CaptureError::NotOpen { .. })));
    assert!(matches!(session.submit("Delete = ALL"), Err(CaptureError::NotOpen { .. })));
    assert!(session.is_initialized());
    Ok(())
}

#[cfg(not(feature = "napatech"))]
#[test]
fn native_backend_requires_feature() {
    assert!(matches!(
        ntcapture::NativeDriver::open(),
        Err(CaptureError::UnsupportedPlatform { .. })
    ));
    assert!(NtCapture::native(&CaptureConfig::default()).is_err());
}
