//! Benchmarks for the packet delivery path
//!
//! Compares the three receive entry points on an endless emulated capture:
//! - `receive_new`: one allocation per packet
//! - `receive_into`: copy into a reused 1522 byte buffer
//! - `receive_with`: zero-copy inspection of the driver buffer
//!
//! Platform: Cross-platform (emulated driver, CI-safe)

use criterion::{BenchmarkId, Criterion, Throughput, criterion_group, criterion_main};
use ntcapture::EmulatedDriver;
use ntcapture::test_utils::{
    REFERENCE_BUFFER_LEN, TEST_STREAM_ID, ready_session, unicast_frame,
};
use ntcapture::{EmulatedFrame, Session};
use std::hint::black_box;

const FRAME_SIZES: [usize; 3] = [64, 512, 1514];

fn endless_session(frame_len: usize) -> Session<EmulatedDriver> {
    let mut session = ready_session(EmulatedDriver::new().repeating(true));
    session
        .driver_mut()
        .push_frame(TEST_STREAM_ID, EmulatedFrame::new(0, unicast_frame(frame_len)));
    session
}

fn bench_receive_entry_points(c: &mut Criterion) {
    let mut group = c.benchmark_group("receive_path");

    for &len in &FRAME_SIZES {
        group.throughput(Throughput::Bytes(len as u64));

        let mut session = endless_session(len);
        group.bench_with_input(BenchmarkId::new("receive_new", len), &len, |b, _| {
            b.iter(|| black_box(session.receive_new().expect("receive failed")))
        });

        let mut session = endless_session(len);
        let mut buffer = [0u8; REFERENCE_BUFFER_LEN];
        group.bench_with_input(BenchmarkId::new("receive_into", len), &len, |b, _| {
            b.iter(|| black_box(session.receive_into(&mut buffer).expect("receive failed")))
        });

        let mut session = endless_session(len);
        group.bench_with_input(BenchmarkId::new("receive_with", len), &len, |b, _| {
            b.iter(|| {
                black_box(
                    session
                        .receive_with(|info, bytes| info.captured_length + bytes.len())
                        .expect("receive failed"),
                )
            })
        });
    }

    group.finish();
}

fn bench_timestamp_conversion(c: &mut Criterion) {
    c.bench_function("ticks_to_system_time", |b| {
        b.iter(|| ntcapture::ticks_to_system_time(black_box(170_000_000_012_345_678)))
    });
}

criterion_group!(benches, bench_receive_entry_points, bench_timestamp_conversion);
criterion_main!(benches);
