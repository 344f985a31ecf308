//! # raop-audio
//!
//! Core timing, buffering and playback engine for RAOP (`AirPlay` audio)
//! receivers: turns a jitter-prone stream of timestamped packets into a
//! continuous, sample-accurate PCM stream driven by the local device
//! clock.
//!
//! ## Features
//!
//! - Remote clock synchronization over RTP timing probes, weighted by
//!   measured transit asymmetry
//! - A monotonically corrected mapping between sender frame timestamps
//!   and the local playback position, retargeted on every sync message
//! - A time-keyed output queue that schedules packets to the sample,
//!   fills gaps with silence, drops stragglers and mutes across
//!   under-runs
//!
//! ## Example
//!
//! ```rust,no_run
//! use std::sync::Arc;
//!
//! use bytes::BytesMut;
//! use raop_audio::audio::{AudioClock, AudioOutputQueue, ChannelMode, StreamInfo};
//! use raop_audio::testing::MockSink;
//!
//! # fn example() -> std::io::Result<()> {
//! let stream = StreamInfo::raop_default();
//! let queue = Arc::new(AudioOutputQueue::new(
//!     &stream,
//!     ChannelMode::Stereo,
//!     MockSink::new(stream.bytes_per_frame()),
//! ));
//! queue.start()?;
//!
//! // Decoded packets land at their scheduled frame time
//! let frame_time = queue.next_frame_time();
//! queue.enqueue(frame_time, BytesMut::from(&[0u8; 1408][..]));
//!
//! queue.close();
//! # Ok(())
//! # }
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

/// Audio clock, sink abstraction and the output queue
pub mod audio;
/// Error types
pub mod error;
/// RTP message kinds the core consumes
pub mod protocol;
/// Timing synchronization
pub mod receiver;
/// Test doubles (mock sink, clock and timing port)
pub mod testing;

// Re-exports
pub use audio::clock::AudioClock;
pub use audio::format::{AudioFormat, ChannelMode, StreamInfo};
pub use audio::queue::AudioOutputQueue;
pub use audio::sink::{AudioSink, PlayState, SinkError};
pub use error::{RaopAudioError, Result};
pub use receiver::timing::TimingSynchronizer;
