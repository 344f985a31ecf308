//! Timing port packets and NTP time representation

use std::time::{SystemTime, UNIX_EPOCH};

use super::packet::{PayloadType, RtpDecodeError};

/// NTP timestamp (64-bit, seconds since 1900-01-01)
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct NtpTime {
    /// Seconds since the NTP epoch
    pub seconds: u32,
    /// Fractional seconds (1/2^32 of a second)
    pub fraction: u32,
}

impl NtpTime {
    /// NTP epoch offset from the Unix epoch (seconds from 1900 to 1970)
    pub const UNIX_OFFSET: u64 = 2_208_988_800;

    /// Create from the current system time
    #[must_use]
    pub fn now() -> Self {
        let unix = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap_or_default();

        #[allow(clippy::cast_possible_truncation)]
        let seconds = (unix.as_secs() + Self::UNIX_OFFSET) as u32;
        #[allow(clippy::cast_possible_truncation)]
        let fraction = ((u64::from(unix.subsec_nanos()) << 32) / 1_000_000_000) as u32;

        Self { seconds, fraction }
    }

    /// Create from seconds since 1900 as a double
    #[must_use]
    #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
    pub fn from_seconds(seconds: f64) -> Self {
        let whole = seconds.floor();
        Self {
            seconds: whole as u64 as u32,
            fraction: ((seconds - whole) * 4_294_967_296.0) as u32,
        }
    }

    /// Seconds since 1900 as a double
    #[must_use]
    pub fn as_seconds(&self) -> f64 {
        f64::from(self.seconds) + f64::from(self.fraction) / 4_294_967_296.0
    }

    /// Encode to 8 big-endian bytes
    #[must_use]
    pub fn encode(&self) -> [u8; 8] {
        let mut buf = [0u8; 8];
        buf[0..4].copy_from_slice(&self.seconds.to_be_bytes());
        buf[4..8].copy_from_slice(&self.fraction.to_be_bytes());
        buf
    }

    /// Decode from 8 big-endian bytes
    #[must_use]
    pub fn decode(buf: &[u8]) -> Self {
        Self {
            seconds: u32::from_be_bytes([buf[0], buf[1], buf[2], buf[3]]),
            fraction: u32::from_be_bytes([buf[4], buf[5], buf[6], buf[7]]),
        }
    }
}

/// Timing request packet (payload type 0x52)
///
/// Only `send_time` is populated by the requester; the other two fields are
/// zero placeholders filled in by the sender's response.
#[derive(Debug, Clone, Default)]
pub struct TimingRequest {
    /// Sender's arrival time (zero in requests)
    pub received_time: NtpTime,
    /// Sender's record of our original send (zero in requests)
    pub reference_time: NtpTime,
    /// Our transmit time
    pub send_time: NtpTime,
}

impl TimingRequest {
    /// Wire size including the RTP header
    pub const SIZE: usize = 32;

    /// Create a request carrying the given transmit time
    #[must_use]
    pub fn new(send_time: NtpTime) -> Self {
        Self {
            received_time: NtpTime::default(),
            reference_time: NtpTime::default(),
            send_time,
        }
    }

    /// Encode to bytes (including RTP header)
    #[must_use]
    pub fn encode(&self, sequence: u16) -> Vec<u8> {
        encode_timing(
            PayloadType::TimingRequest,
            sequence,
            &self.received_time,
            &self.reference_time,
            &self.send_time,
        )
    }

    /// Decode from bytes (including RTP header)
    ///
    /// # Errors
    /// Returns `RtpDecodeError` if the buffer is too small or carries a
    /// different payload type.
    pub fn decode(buf: &[u8]) -> Result<Self, RtpDecodeError> {
        let (received_time, reference_time, send_time) =
            decode_timing(buf, PayloadType::TimingRequest)?;
        Ok(Self {
            received_time,
            reference_time,
            send_time,
        })
    }
}

/// Timing response packet (payload type 0x53)
#[derive(Debug, Clone)]
pub struct TimingResponse {
    /// Time the sender received our request
    pub received_time: NtpTime,
    /// Echo of our request's transmit time
    pub reference_time: NtpTime,
    /// Time the sender transmitted this response
    pub send_time: NtpTime,
}

impl TimingResponse {
    /// Wire size including the RTP header
    pub const SIZE: usize = 32;

    /// Encode to bytes (including RTP header)
    #[must_use]
    pub fn encode(&self, sequence: u16) -> Vec<u8> {
        encode_timing(
            PayloadType::TimingResponse,
            sequence,
            &self.received_time,
            &self.reference_time,
            &self.send_time,
        )
    }

    /// Decode from bytes (including RTP header)
    ///
    /// # Errors
    /// Returns `RtpDecodeError` if the buffer is too small or carries a
    /// different payload type.
    pub fn decode(buf: &[u8]) -> Result<Self, RtpDecodeError> {
        let (received_time, reference_time, send_time) =
            decode_timing(buf, PayloadType::TimingResponse)?;
        Ok(Self {
            received_time,
            reference_time,
            send_time,
        })
    }
}

fn encode_timing(
    payload_type: PayloadType,
    sequence: u16,
    received: &NtpTime,
    reference: &NtpTime,
    send: &NtpTime,
) -> Vec<u8> {
    let mut buf = Vec::with_capacity(TimingRequest::SIZE);

    buf.push(0x80); // V=2
    buf.push(payload_type.marked());
    buf.extend_from_slice(&sequence.to_be_bytes());
    buf.extend_from_slice(&[0u8; 4]); // RTP timestamp, unused

    buf.extend_from_slice(&received.encode());
    buf.extend_from_slice(&reference.encode());
    buf.extend_from_slice(&send.encode());

    buf
}

fn decode_timing(
    buf: &[u8],
    expected: PayloadType,
) -> Result<(NtpTime, NtpTime, NtpTime), RtpDecodeError> {
    if buf.len() < TimingRequest::SIZE {
        return Err(RtpDecodeError::BufferTooSmall {
            needed: TimingRequest::SIZE,
            have: buf.len(),
        });
    }

    if PayloadType::from_byte(buf[1]) != Some(expected) {
        return Err(RtpDecodeError::UnknownPayloadType(buf[1] & 0x7F));
    }

    Ok((
        NtpTime::decode(&buf[8..16]),
        NtpTime::decode(&buf[16..24]),
        NtpTime::decode(&buf[24..32]),
    ))
}
