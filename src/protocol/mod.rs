//! Wire protocol support
//!
//! Only the RTP message kinds the playback core consumes live here;
//! RTSP signaling, cipher setup and packet framing are handled by the
//! embedding receiver.

pub mod rtp;
