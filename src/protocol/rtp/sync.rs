//! Control port sync messages

use super::packet::{PayloadType, RtpDecodeError};
use super::timing::NtpTime;

/// Sync message (payload type 0x54)
///
/// Carries the sender's `(NTP-now, frame-now, frame-now-minus-latency)`
/// triple; the clock is retargeted from `time` and
/// `timestamp_minus_latency`.
#[derive(Debug, Clone)]
pub struct SyncPacket {
    /// Extension bit: set on the first sync after RECORD or a flush
    pub extension: bool,
    /// RTP frame the sender considers "now", minus the stream latency
    pub timestamp_minus_latency: u32,
    /// Sender's clock at transmission
    pub time: NtpTime,
    /// RTP frame the sender considers "now"
    pub timestamp: u32,
}

impl SyncPacket {
    /// Wire size including the RTP header
    pub const SIZE: usize = 20;

    /// Decode from bytes (including RTP header)
    ///
    /// # Errors
    /// Returns `RtpDecodeError` if the buffer is too small or carries a
    /// different payload type.
    pub fn decode(buf: &[u8]) -> Result<Self, RtpDecodeError> {
        if buf.len() < Self::SIZE {
            return Err(RtpDecodeError::BufferTooSmall {
                needed: Self::SIZE,
                have: buf.len(),
            });
        }

        if PayloadType::from_byte(buf[1]) != Some(PayloadType::Sync) {
            return Err(RtpDecodeError::UnknownPayloadType(buf[1] & 0x7F));
        }

        Ok(Self {
            extension: (buf[0] & 0x10) != 0,
            timestamp_minus_latency: u32::from_be_bytes([buf[4], buf[5], buf[6], buf[7]]),
            time: NtpTime::decode(&buf[8..16]),
            timestamp: u32::from_be_bytes([buf[16], buf[17], buf[18], buf[19]]),
        })
    }

    /// Encode to bytes (including RTP header)
    #[must_use]
    pub fn encode(&self) -> Vec<u8> {
        let mut buf = Vec::with_capacity(Self::SIZE);

        buf.push(0x80 | if self.extension { 0x10 } else { 0x00 });
        buf.push(PayloadType::Sync.marked());
        buf.extend_from_slice(&[0u8; 2]); // sequence, unused
        buf.extend_from_slice(&self.timestamp_minus_latency.to_be_bytes());
        buf.extend_from_slice(&self.time.encode());
        buf.extend_from_slice(&self.timestamp.to_be_bytes());

        buf
    }
}
