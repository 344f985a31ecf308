//! Audio sink abstraction
//!
//! Device-facing capability the output queue drives: a blocking,
//! `AudioTrack`-style PCM line with a 32-bit playback head counter.
//! Implementations must be internally thread safe; the queue calls them
//! from the playback thread and from clock readers concurrently.

use thiserror::Error;

/// Errors from the audio sink
#[derive(Debug, Error)]
pub enum SinkError {
    /// A write was refused; the queue retries it
    #[error("sink write failed: {0}")]
    WriteFailed(String),

    /// The device is gone; the playback loop shuts the line down
    #[error("audio device lost: {0}")]
    DeviceLost(String),
}

impl SinkError {
    /// True when the playback loop should give up on the device
    #[must_use]
    pub fn is_fatal(&self) -> bool {
        matches!(self, Self::DeviceLost(_))
    }
}

/// Sink playback state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlayState {
    /// Line not started or stopped
    Stopped,
    /// Line consuming frames
    Playing,
    /// Line paused
    Paused,
}

/// Blocking PCM output line
pub trait AudioSink: Send + Sync {
    /// Start consuming frames
    fn play(&self);

    /// Stop the line; the head position may reset
    fn stop(&self);

    /// Release device resources; the sink is unusable afterwards
    fn release(&self);

    /// Append PCM bytes to the line.
    ///
    /// May accept fewer bytes than offered; `Ok(0)` means "try again".
    ///
    /// # Errors
    /// [`SinkError::WriteFailed`] is transient and retried by the caller;
    /// [`SinkError::DeviceLost`] aborts playback.
    fn write(&self, data: &[u8]) -> Result<usize, SinkError>;

    /// Set the line gain as a linear amplitude in [0.0, 1.0]
    fn set_volume(&self, volume: f32);

    /// Monotonic frame counter modulo 2^32, resettable on stop
    fn playback_head_position(&self) -> u32;

    /// Current playback state
    fn play_state(&self) -> PlayState;
}

impl<T: AudioSink + ?Sized> AudioSink for std::sync::Arc<T> {
    fn play(&self) {
        (**self).play();
    }

    fn stop(&self) {
        (**self).stop();
    }

    fn release(&self) {
        (**self).release();
    }

    fn write(&self, data: &[u8]) -> Result<usize, SinkError> {
        (**self).write(data)
    }

    fn set_volume(&self, volume: f32) {
        (**self).set_volume(volume);
    }

    fn playback_head_position(&self) -> u32 {
        (**self).playback_head_position()
    }

    fn play_state(&self) -> PlayState {
        (**self).play_state()
    }
}
