//! RAOP RTP timing and control messages
//!
//! The timing port carries request/response probe pairs (payload types
//! 0x52/0x53); the control port carries sync messages (0x54) that retarget
//! the audio clock.

pub mod packet;
pub mod sync;
pub mod timing;

#[cfg(test)]
mod tests;

pub use packet::{PayloadType, RtpDecodeError};
pub use sync::SyncPacket;
pub use timing::{NtpTime, TimingRequest, TimingResponse};
