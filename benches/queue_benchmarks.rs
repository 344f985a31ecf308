//! Performance benchmarks for the playback core

use bytes::BytesMut;
use criterion::{black_box, criterion_group, criterion_main, Criterion};
use raop_audio::audio::{AudioOutputQueue, ChannelMode, StreamInfo};
use raop_audio::protocol::rtp::{NtpTime, SyncPacket, TimingResponse};
use raop_audio::testing::MockSink;

fn queue_enqueue(c: &mut Criterion) {
    c.bench_function("queue_enqueue", |b| {
        let stream = StreamInfo::raop_default();
        let queue = AudioOutputQueue::new(
            &stream,
            ChannelMode::Stereo,
            MockSink::new(stream.bytes_per_frame()),
        );

        let mut frame_time = 0u64;
        b.iter(|| {
            let samples = BytesMut::from(&[0u8; 1408][..]);
            queue.enqueue(black_box(frame_time), samples);

            frame_time += 352;
            // Stay inside the 10 s acceptance window
            if frame_time >= 352 * 1024 {
                queue.flush();
                frame_time = 0;
            }
        });
    });
}

fn timing_response_decode(c: &mut Criterion) {
    let response = TimingResponse {
        received_time: NtpTime::from_seconds(3_900_000_000.25),
        reference_time: NtpTime::from_seconds(3_900_000_000.0),
        send_time: NtpTime::from_seconds(3_900_000_000.26),
    }
    .encode(42);

    c.bench_function("timing_response_decode", |b| {
        b.iter(|| TimingResponse::decode(black_box(&response)).unwrap());
    });
}

fn sync_decode(c: &mut Criterion) {
    let sync = SyncPacket {
        extension: false,
        timestamp_minus_latency: 88200,
        time: NtpTime::from_seconds(3_900_000_000.5),
        timestamp: 99225,
    }
    .encode();

    c.bench_function("sync_decode", |b| {
        b.iter(|| SyncPacket::decode(black_box(&sync)).unwrap());
    });
}

fn ntp_seconds_roundtrip(c: &mut Criterion) {
    c.bench_function("ntp_seconds_roundtrip", |b| {
        b.iter(|| NtpTime::from_seconds(black_box(3_900_000_123.456)).as_seconds());
    });
}

criterion_group!(
    benches,
    queue_enqueue,
    timing_response_decode,
    sync_decode,
    ntp_seconds_roundtrip
);
criterion_main!(benches);
