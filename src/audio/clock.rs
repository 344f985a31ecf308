//! Audio clock contract
//!
//! Three timelines meet here: *frame time* (sample index on the sender's
//! timeline), *line time* (sample index on the local device's output) and
//! *seconds time* (NTP-style seconds since 1900). The clock maintains the
//! offsets between them and lets sync messages retarget the mapping
//! mid-stream.

/// Source of truth mapping local sample position ↔ frame time ↔ seconds
/// time.
///
/// Implemented by [`AudioOutputQueue`](crate::audio::queue::AudioOutputQueue),
/// whose playback thread advances line time. All getters may be called
/// concurrently with playback; each call observes a consistent snapshot of
/// the offsets and the frame counter.
pub trait AudioClock: Send + Sync {
    /// Current device head position (sample index). Returns 0 while the
    /// device is not playing.
    fn now_line_time(&self) -> u64;

    /// Line time of the next sample to be written
    fn next_line_time(&self) -> u64;

    /// Frame time at the device head
    fn now_frame_time(&self) -> u64;

    /// Frame time of the next sample to be written
    fn next_frame_time(&self) -> u64;

    /// Seconds time at the device head
    fn now_seconds_time(&self) -> f64;

    /// Seconds time of the next sample to be written
    fn next_seconds_time(&self) -> f64;

    /// Seconds time at which the given frame time plays
    fn convert_frame_to_seconds_time(&self, frame_time: u64) -> f64;

    /// Line time at which the given frame time plays
    fn convert_frame_to_line_time(&self, frame_time: u64) -> u64;

    /// Retarget the frame-time mapping: the given frame time is declared to
    /// play at the given seconds time.
    ///
    /// A `seconds_time` of exactly 0.0 means "uncalibrated, best effort":
    /// the frame time is pinned to the current device head instead.
    fn set_frame_time(&self, frame_time: u64, seconds_time: f64);
}
