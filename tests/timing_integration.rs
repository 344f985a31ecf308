//! Timing exchange over real UDP sockets

use std::sync::Arc;
use std::time::Duration;

use raop_audio::audio::{AudioClock, AudioOutputQueue, ChannelMode, StreamInfo};
use raop_audio::protocol::rtp::{NtpTime, SyncPacket, TimingRequest, TimingResponse};
use raop_audio::receiver::{TimingSynchronizer, UdpTimingPort};
use raop_audio::testing::MockSink;
use tokio::net::UdpSocket;
use tokio::time::timeout;

const RECV_TIMEOUT: Duration = Duration::from_secs(5);

#[tokio::test]
async fn test_timing_exchange_and_sync_retarget() {
    let stream = StreamInfo::raop_default();
    let sink = Arc::new(MockSink::new(stream.bytes_per_frame()));
    sink.set_frame_pace(Duration::from_micros(20));

    let queue = Arc::new(AudioOutputQueue::new(
        &stream,
        ChannelMode::Stereo,
        Arc::clone(&sink),
    ));
    queue.start().unwrap();

    let receiver_socket = Arc::new(UdpSocket::bind("127.0.0.1:0").await.unwrap());
    let sender_socket = UdpSocket::bind("127.0.0.1:0").await.unwrap();
    let sender_addr = sender_socket.local_addr().unwrap();

    let clock: Arc<dyn AudioClock> = queue.clone() as Arc<dyn AudioClock>;
    let synchronizer = TimingSynchronizer::new(clock);
    synchronizer.start(Arc::new(UdpTimingPort::new(
        Arc::clone(&receiver_socket),
        sender_addr,
    )));

    // Play the sender: answer the first probe with a clock 0.5 s ahead
    let mut buf = [0u8; 64];
    let (len, from) = timeout(RECV_TIMEOUT, sender_socket.recv_from(&mut buf))
        .await
        .unwrap()
        .unwrap();
    let request = TimingRequest::decode(&buf[..len]).unwrap();

    let remote_now = request.send_time.as_seconds() + 0.5;
    let response = TimingResponse {
        received_time: NtpTime::from_seconds(remote_now),
        reference_time: request.send_time,
        send_time: NtpTime::from_seconds(remote_now),
    };
    sender_socket
        .send_to(&response.encode(0), from)
        .await
        .unwrap();

    // Deliver the response the way the session demultiplexer would
    let (len, _) = timeout(RECV_TIMEOUT, receiver_socket.recv_from(&mut buf))
        .await
        .unwrap()
        .unwrap();
    synchronizer.timing_response_received(&TimingResponse::decode(&buf[..len]).unwrap());

    let offset = synchronizer.remote_seconds_offset().unwrap();
    assert!((offset - 0.5).abs() < 0.05, "offset {offset}");

    // A sync message in the remote timeline retargets the local clock
    let sync = SyncPacket {
        extension: true,
        timestamp_minus_latency: 10_000_000,
        time: NtpTime::from_seconds(queue.now_seconds_time() + 0.5),
        timestamp: 10_088_200,
    };
    synchronizer.sync_received(&SyncPacket::decode(&sync.encode()).unwrap());

    let line = queue.convert_frame_to_line_time(10_000_000) as i64;
    let now = queue.now_line_time() as i64;
    assert!(
        (line - now).abs() < 44_100,
        "retargeted frame should play about now: line {line}, head {now}"
    );

    synchronizer.stop();
    queue.close();
}
