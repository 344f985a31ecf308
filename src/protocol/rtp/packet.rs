use thiserror::Error;

/// RTP payload types on the RAOP timing and control ports
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum PayloadType {
    /// Timing request (receiver → sender)
    TimingRequest = 0x52,
    /// Timing response (sender → receiver)
    TimingResponse = 0x53,
    /// Sync message (sender → receiver)
    Sync = 0x54,
}

impl PayloadType {
    /// Parse from the second header byte (marker bit masked off)
    #[must_use]
    pub fn from_byte(b: u8) -> Option<Self> {
        match b & 0x7F {
            0x52 => Some(Self::TimingRequest),
            0x53 => Some(Self::TimingResponse),
            0x54 => Some(Self::Sync),
            _ => None,
        }
    }

    /// Header byte value with the marker bit set
    #[must_use]
    pub fn marked(self) -> u8 {
        self as u8 | 0x80
    }
}

/// Errors that can occur while decoding RTP packets
#[derive(Debug, Error)]
pub enum RtpDecodeError {
    /// Buffer too small for the packet kind
    #[error("buffer too small: needed {needed}, have {have}")]
    BufferTooSmall {
        /// Bytes required
        needed: usize,
        /// Bytes available
        have: usize,
    },

    /// Payload type not handled by this port
    #[error("unknown payload type: {0:#04x}")]
    UnknownPayloadType(u8),
}
