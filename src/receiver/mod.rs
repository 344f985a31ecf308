//! Receiver-side timing integration
//!
//! Connects the RTP timing and control traffic to the audio clock.

pub mod timing;

#[cfg(test)]
mod tests;

pub use timing::{TimingPort, TimingSynchronizer, UdpTimingPort, TIME_REQUEST_INTERVAL};
