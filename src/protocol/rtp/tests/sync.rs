use crate::protocol::rtp::packet::RtpDecodeError;
use crate::protocol::rtp::sync::SyncPacket;
use crate::protocol::rtp::timing::NtpTime;

#[test]
fn test_sync_roundtrip() {
    let packet = SyncPacket {
        extension: true,
        timestamp_minus_latency: 88200,
        time: NtpTime {
            seconds: 3_800_000_000,
            fraction: 0x4000_0000,
        },
        timestamp: 99225,
    };

    let decoded = SyncPacket::decode(&packet.encode()).unwrap();
    assert!(decoded.extension);
    assert_eq!(decoded.timestamp_minus_latency, 88200);
    assert_eq!(decoded.time, packet.time);
    assert_eq!(decoded.timestamp, 99225);
}

#[test]
fn test_sync_extension_bit_clear() {
    let packet = SyncPacket {
        extension: false,
        timestamp_minus_latency: 0,
        time: NtpTime::default(),
        timestamp: 0,
    };

    let data = packet.encode();
    assert_eq!(data[0], 0x80);
    assert!(!SyncPacket::decode(&data).unwrap().extension);
}

#[test]
fn test_sync_rejects_short_buffer() {
    let err = SyncPacket::decode(&[0x80, 0xD4, 0, 0]).unwrap_err();

    assert!(matches!(err, RtpDecodeError::BufferTooSmall { .. }));
}

#[test]
fn test_sync_rejects_timing_payload() {
    let mut data = SyncPacket {
        extension: false,
        timestamp_minus_latency: 1,
        time: NtpTime::default(),
        timestamp: 2,
    }
    .encode();
    data[1] = 0xD3;

    let err = SyncPacket::decode(&data).unwrap_err();
    assert!(matches!(err, RtpDecodeError::UnknownPayloadType(0x53)));
}
