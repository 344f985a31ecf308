//! Audio playback core
//!
//! The output queue owns the device, schedules packets by frame time and
//! doubles as the receiver's [`AudioClock`].

pub mod average;
pub mod clock;
pub mod format;
pub mod queue;
pub mod sink;

#[cfg(test)]
mod tests;

pub use average::RunningExponentialAverage;
pub use clock::AudioClock;
pub use format::{AudioFormat, ChannelConfig, ChannelMode, SampleFormat, SampleRate, StreamInfo};
pub use queue::AudioOutputQueue;
pub use sink::{AudioSink, PlayState, SinkError};
