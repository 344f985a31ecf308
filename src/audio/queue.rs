//! Time-indexed audio output queue
//!
//! Packets are keyed by frame time and handed to the sink at their
//! scheduled line position; gaps are padded with silence, late packets are
//! skipped and the line is muted across under-runs. The queue also serves
//! as the receiver's [`AudioClock`].

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{SystemTime, UNIX_EPOCH};

use bytes::{Buf, BytesMut};
use parking_lot::Mutex;

use super::clock::AudioClock;
use super::format::{ChannelMode, StreamInfo};
use super::sink::{AudioSink, PlayState, SinkError};

/// NTP epoch offset added to local Unix seconds
pub const TIME_SINCE_1970: f64 = 2_208_988_800.0;

/// Furthest into the future a packet may schedule before it is rejected
pub const QUEUE_LENGTH_MAX_SECONDS: f64 = 10.0;

/// Device buffer length the queue asks sinks to provision
pub const BUFFER_SIZE_SECONDS: f64 = 0.05;

/// Scheduling slack below which a payload is written verbatim
pub const TIMING_PRECISION: f64 = 0.001;

const MUTE_VOLUME: f32 = 0.0;

/// Desired sink buffer size in bytes: the smallest power of two holding
/// [`BUFFER_SIZE_SECONDS`] of audio in the given stream format.
#[must_use]
#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
pub fn desired_buffer_bytes(stream: &StreamInfo) -> usize {
    #[allow(clippy::cast_precision_loss)]
    let bytes = BUFFER_SIZE_SECONDS * stream.sample_rate() * stream.bytes_per_frame() as f64;
    (bytes.ceil() as usize).next_power_of_two()
}

/// Mute / gap-warning state owned by the playback loop
#[derive(Debug)]
pub(crate) struct LineState {
    muted: bool,
    did_warn_gap: bool,
}

impl Default for LineState {
    fn default() -> Self {
        Self {
            muted: true,
            did_warn_gap: false,
        }
    }
}

/// Offsets and counters behind every clock read.
///
/// Guarded by one mutex so each reader observes the offsets and the frame
/// counter together.
#[derive(Debug)]
struct ClockState {
    /// Frames (real and silence) handed to the sink; the next line time
    line_frames_written: u64,
    /// Largest frame time seen by `enqueue`, diagnostic only
    latest_seen_frame_time: u64,
    /// Frame time corresponding to line time zero
    frame_time_offset: i64,
    /// Seconds time corresponding to line time zero
    seconds_time_offset: f64,
    /// User gain target
    requested_gain: f32,
    /// Gain last applied to the sink
    track_volume: f32,
    /// Previous raw 32-bit head position
    last_position: u64,
    /// Accumulated wrap corrections
    total_position: u64,
}

struct Inner<S> {
    sink: S,
    bytes_per_frame: usize,
    sample_rate: f64,
    packet_size_frames: usize,
    channel_mode: ChannelMode,
    /// One packet worth of prepared silence
    silence: Vec<u8>,
    /// Never transitions back to false
    closing: AtomicBool,
    /// Packet queue, indexed by frame time
    queue: Mutex<BTreeMap<u64, BytesMut>>,
    clock: Mutex<ClockState>,
}

/// Audio output queue.
///
/// Created from a stream description and a sink; [`start`](Self::start)
/// spawns the playback thread and blocks until the line is running, after
/// which all [`AudioClock`] reads return sensible values.
pub struct AudioOutputQueue<S> {
    inner: Arc<Inner<S>>,
    thread: Mutex<Option<JoinHandle<()>>>,
}

impl<S: AudioSink> AudioOutputQueue<S> {
    /// Create a queue over the given sink
    #[must_use]
    pub fn new(stream: &StreamInfo, channel_mode: ChannelMode, sink: S) -> Self {
        let bytes_per_frame = stream.bytes_per_frame();
        let packet_size_frames = stream.frames_per_packet;

        let mut silence = vec![0u8; stream.packet_bytes()];
        for (i, byte) in silence.iter_mut().enumerate() {
            *byte = if i % 2 == 0 { 0x80 } else { 0x00 };
        }

        Self {
            inner: Arc::new(Inner {
                sink,
                bytes_per_frame,
                sample_rate: stream.sample_rate(),
                packet_size_frames,
                channel_mode,
                silence,
                closing: AtomicBool::new(false),
                queue: Mutex::new(BTreeMap::new()),
                clock: Mutex::new(ClockState {
                    line_frames_written: 0,
                    latest_seen_frame_time: 0,
                    frame_time_offset: 0,
                    seconds_time_offset: 0.0,
                    requested_gain: 1.0,
                    track_volume: 0.0,
                    last_position: 0,
                    total_position: 0,
                }),
            }),
            thread: Mutex::new(None),
        }
    }

    /// Adds sample data to the queue.
    ///
    /// Returns false when the whole packet is already in the past, or when
    /// it schedules further than [`QUEUE_LENGTH_MAX_SECONDS`] ahead of the
    /// line (a timing anomaly). A packet re-sent for an already queued
    /// frame time replaces the earlier one.
    pub fn enqueue(&self, frame_time: u64, samples: BytesMut) -> bool {
        let inner = &*self.inner;

        #[allow(clippy::cast_precision_loss)]
        let packet_frames = samples.len() as f64 / inner.bytes_per_frame as f64;
        let packet_seconds = packet_frames / inner.sample_rate;

        // Delay between the last sample's playback time and the line end
        let delay = {
            let mut state = inner.clock.lock();
            state.latest_seen_frame_time = state.latest_seen_frame_time.max(frame_time);

            let line_time = convert_frame_to_line_time(&state, frame_time);
            #[allow(clippy::cast_precision_loss)]
            let ahead =
                (line_time as i64).wrapping_sub(state.line_frames_written as i64) as f64;
            (ahead + packet_frames) / inner.sample_rate
        };

        if delay < -packet_seconds {
            tracing::warn!(
                seconds_late = -delay,
                frame_time,
                "audio data arrived too late, dropping"
            );
            return false;
        }
        if delay > QUEUE_LENGTH_MAX_SECONDS {
            tracing::warn!(
                seconds_early = delay,
                frame_time,
                "audio data arrived too early, dropping"
            );
            return false;
        }

        inner.queue.lock().insert(frame_time, samples);
        true
    }

    /// Removes all queued sample data
    pub fn flush(&self) {
        self.inner.queue.lock().clear();
    }

    /// Sets the desired output gain; applied by the playback loop
    pub fn set_gain(&self, gain: f32) {
        self.inner.clock.lock().requested_gain = gain;
    }

    /// Returns the desired output gain
    #[must_use]
    pub fn get_gain(&self) -> f32 {
        self.inner.clock.lock().requested_gain
    }

    /// Largest frame time ever offered to `enqueue`
    #[must_use]
    pub fn latest_seen_frame_time(&self) -> u64 {
        self.inner.clock.lock().latest_seen_frame_time
    }

    /// Stops audio output. The playback thread mutes, stops and releases
    /// the sink before this returns.
    pub fn close(&self) {
        self.inner.closing.store(true, Ordering::Release);
        if let Some(handle) = self.thread.lock().take() {
            let _ = handle.join();
        }
    }
}

impl<S: AudioSink + 'static> AudioOutputQueue<S> {
    /// Start the playback thread and wait for the line to reach
    /// [`PlayState::Playing`]. The seconds-time origin is captured once,
    /// here, so clock reads after `start` returns are meaningful.
    ///
    /// # Errors
    /// Returns an error if the playback thread cannot be spawned.
    pub fn start(&self) -> std::io::Result<()> {
        let mut guard = self.thread.lock();
        if guard.is_some() {
            return Ok(());
        }

        let inner = Arc::clone(&self.inner);
        let handle = thread::Builder::new()
            .name("audio-enqueuer".into())
            .spawn(move || inner.run_playback())?;

        while !handle.is_finished() && self.inner.sink.play_state() != PlayState::Playing {
            thread::yield_now();
        }

        let now_unix = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap_or_default()
            .as_secs_f64();
        self.inner.clock.lock().seconds_time_offset = TIME_SINCE_1970 + now_unix;

        *guard = Some(handle);
        Ok(())
    }
}

#[cfg(test)]
impl<S: AudioSink> AudioOutputQueue<S> {
    /// Seed the clock for scheduling tests without starting the thread
    pub(crate) fn seed_clock(
        &self,
        line_frames_written: u64,
        frame_time_offset: i64,
        seconds_time_offset: f64,
    ) {
        let mut state = self.inner.clock.lock();
        state.line_frames_written = line_frames_written;
        state.frame_time_offset = frame_time_offset;
        state.seconds_time_offset = seconds_time_offset;
    }

    /// Run one playback-loop iteration synchronously
    pub(crate) fn run_cycle(&self, line: &mut LineState) -> Result<(), SinkError> {
        self.inner.playback_cycle(line)
    }

    pub(crate) fn queued_packets(&self) -> usize {
        self.inner.queue.lock().len()
    }
}

impl<S: AudioSink> AudioClock for AudioOutputQueue<S> {
    fn now_line_time(&self) -> u64 {
        let mut state = self.inner.clock.lock();
        self.inner.now_line_time_locked(&mut state)
    }

    fn next_line_time(&self) -> u64 {
        self.inner.clock.lock().line_frames_written
    }

    fn now_frame_time(&self) -> u64 {
        let mut state = self.inner.clock.lock();
        let now = self.inner.now_line_time_locked(&mut state);
        now.wrapping_add(state.frame_time_offset as u64)
    }

    fn next_frame_time(&self) -> u64 {
        let state = self.inner.clock.lock();
        state
            .line_frames_written
            .wrapping_add(state.frame_time_offset as u64)
    }

    #[allow(clippy::cast_precision_loss)]
    fn now_seconds_time(&self) -> f64 {
        let mut state = self.inner.clock.lock();
        let now = self.inner.now_line_time_locked(&mut state);
        state.seconds_time_offset + now as f64 / self.inner.sample_rate
    }

    #[allow(clippy::cast_precision_loss)]
    fn next_seconds_time(&self) -> f64 {
        let state = self.inner.clock.lock();
        state.seconds_time_offset + state.line_frames_written as f64 / self.inner.sample_rate
    }

    #[allow(clippy::cast_precision_loss)]
    fn convert_frame_to_seconds_time(&self, frame_time: u64) -> f64 {
        let state = self.inner.clock.lock();
        state.seconds_time_offset
            + (frame_time as i64).wrapping_sub(state.frame_time_offset) as f64
                / self.inner.sample_rate
    }

    fn convert_frame_to_line_time(&self, frame_time: u64) -> u64 {
        convert_frame_to_line_time(&self.inner.clock.lock(), frame_time)
    }

    #[allow(clippy::cast_possible_truncation)]
    fn set_frame_time(&self, frame_time: u64, seconds_time: f64) {
        let mut state = self.inner.clock.lock();

        let line_time = if seconds_time == 0.0 {
            // Uncalibrated sender clock: pin the frame to the device head
            self.inner.now_line_time_locked(&mut state) as i64
        } else {
            ((seconds_time - state.seconds_time_offset) * self.inner.sample_rate).round() as i64
        };

        let previous = state.frame_time_offset;
        state.frame_time_offset = (frame_time as i64).wrapping_sub(line_time);

        tracing::debug!(
            adjustment_frames = state.frame_time_offset.wrapping_sub(previous),
            behind_newest = state.latest_seen_frame_time.wrapping_sub(frame_time),
            "playback clock retargeted"
        );
    }
}

/// Line time at which `frame_time` plays, under the current epoch
fn convert_frame_to_line_time(state: &ClockState, frame_time: u64) -> u64 {
    frame_time.wrapping_sub(state.frame_time_offset as u64)
}

impl<S: AudioSink> Inner<S> {
    fn closing(&self) -> bool {
        self.closing.load(Ordering::Acquire)
    }

    /// Reconstruct the 64-bit device head from the sink's 32-bit counter.
    ///
    /// A drop from the top quarter of the range into the bottom quarter is
    /// a wrap and advances the accumulator by 2^32.
    fn now_line_time_locked(&self, state: &mut ClockState) -> u64 {
        if self.sink.play_state() != PlayState::Playing {
            return 0;
        }

        let pos = u64::from(self.sink.playback_head_position());
        if pos < state.last_position && pos < 0x7FFF_FFFF && state.last_position > 0x8000_0000 {
            state.total_position += 0x1_0000_0000;
        }
        state.last_position = pos;
        state.total_position + pos
    }

    fn run_playback(&self) {
        // Mute before starting the line to prevent clicks
        self.set_line_gain(MUTE_VOLUME);
        self.sink.play();

        let mut line = LineState::default();
        let mut result = Ok(());
        while !self.closing() {
            result = self.playback_cycle(&mut line);
            if result.is_err() {
                break;
            }
        }
        if let Err(e) = &result {
            tracing::error!(error = %e, "audio output thread died unexpectedly");
        }

        self.set_line_gain(MUTE_VOLUME);
        self.sink.stop();
        self.sink.release();
    }

    /// One playback-loop iteration: play the head packet if it is due,
    /// skip it if it is irrecoverably late, otherwise write one packet of
    /// silence.
    #[allow(clippy::cast_possible_wrap, clippy::float_cmp)]
    fn playback_cycle(&self, line: &mut LineState) -> Result<(), SinkError> {
        let front = self.queue.lock().first_key_value().map(|(k, _)| *k);

        if let Some(entry_frame_time) = front {
            let (entry_line_time, gap_frames) = {
                let state = self.clock.lock();
                let lt = convert_frame_to_line_time(&state, entry_frame_time);
                (
                    lt,
                    (lt as i64).wrapping_sub(state.line_frames_written as i64),
                )
            };

            if gap_frames < -(self.packet_size_frames as i64) {
                tracing::warn!(
                    frames_late = -gap_frames,
                    "audio data was scheduled for playback in the past, skipping"
                );
                self.queue.lock().remove(&entry_frame_time);
                return Ok(());
            }

            if gap_frames < self.packet_size_frames as i64 {
                // Negligible gap between packet and line end: play it
                line.did_warn_gap = false;

                if line.muted {
                    tracing::info!("audio data available, un-muting line");
                    line.muted = false;
                    self.apply_gain();
                } else if self.line_gain() != self.requested_gain() {
                    self.apply_gain();
                }

                let Some(mut buffer) = self.queue.lock().remove(&entry_frame_time) else {
                    // Flushed between peek and take
                    return Ok(());
                };

                let tail = buffer.len() % self.bytes_per_frame;
                if tail != 0 {
                    tracing::error!(
                        extra_bytes = tail,
                        "audio data contains a non-integral number of frames, ignoring tail"
                    );
                    let keep = buffer.len() - tail;
                    buffer.truncate(keep);
                }

                tracing::trace!(
                    frames = buffer.len() / self.bytes_per_frame,
                    line_time = entry_line_time,
                    "appending packet to the line"
                );
                return self.append_frames_at(&mut buffer, entry_line_time);
            }

            // Gap between packet and line end: pad with silence below
            if !line.did_warn_gap {
                line.did_warn_gap = true;
                tracing::warn!(
                    gap_frames,
                    packet_frames = self.packet_size_frames,
                    "audio data missing at the line end, writing silence"
                );
            }
        } else if !line.muted {
            line.muted = true;
            self.set_line_gain(MUTE_VOLUME);
            tracing::debug!("audio data ended, muting line");
        }

        self.append_silence(self.packet_size_frames as u64)
    }

    /// Append a payload so its first frame lands at `line_time`, inserting
    /// silence over gaps and trimming the overlapped head on drift.
    #[allow(clippy::cast_precision_loss, clippy::cast_possible_wrap, clippy::cast_sign_loss)]
    fn append_frames_at(
        &self,
        samples: &mut BytesMut,
        mut line_time: u64,
    ) -> Result<(), SinkError> {
        while !self.closing() {
            let end_line_time = self.clock.lock().line_frames_written;

            let timing_error_frames = (line_time as i64).wrapping_sub(end_line_time as i64);
            let timing_error_seconds = timing_error_frames as f64 / self.sample_rate;

            if timing_error_seconds.abs() <= TIMING_PRECISION {
                // Scheduled at the line end, within precision: append as is
                return self.append_frames(samples);
            }

            if timing_error_frames > 0 {
                // Scheduled after the line end: fill the gap with silence
                self.append_silence(timing_error_frames as u64)?;
            } else {
                // Scheduled before the line end: skip the overlapping head
                let skip = (-timing_error_frames) as u64 as usize * self.bytes_per_frame;
                if skip >= samples.len() {
                    tracing::warn!(
                        overlap_frames = -timing_error_frames,
                        "overlap swallowed the entire packet, dropping"
                    );
                    return Ok(());
                }
                samples.advance(skip);
                line_time = end_line_time;
            }
        }
        Ok(())
    }

    fn append_silence(&self, mut frames: u64) -> Result<(), SinkError> {
        while frames > 0 && !self.closing() {
            let length =
                frames.min(self.packet_size_frames as u64) as usize * self.bytes_per_frame;
            self.append_to_line(&self.silence[..length])?;
            frames = frames.saturating_sub(self.packet_size_frames as u64);
        }
        Ok(())
    }

    fn append_frames(&self, samples: &mut BytesMut) -> Result<(), SinkError> {
        remap_channels(self.channel_mode, self.bytes_per_frame, samples);
        self.append_to_line(samples)
    }

    /// Drive the payload into the sink, riding out short writes, until it
    /// is consumed or the queue is closing.
    fn append_to_line(&self, samples: &[u8]) -> Result<(), SinkError> {
        let mut off = 0;
        while off < samples.len() && !self.closing() {
            let remaining = samples.len() - off;
            match self.sink.write(&samples[off..]) {
                Ok(0) => continue,
                Ok(n) => {
                    if n < remaining {
                        tracing::warn!(accepted = n, offered = remaining, "sink short write");
                    }
                    off += n;
                }
                Err(e) if e.is_fatal() => return Err(e),
                Err(e) => {
                    tracing::warn!(error = %e, "sink write error");
                }
            }
        }

        let mut state = self.clock.lock();
        state.line_frames_written += (off / self.bytes_per_frame) as u64;
        tracing::trace!(line_end = state.line_frames_written, "line advanced");
        Ok(())
    }

    fn set_line_gain(&self, gain: f32) {
        self.sink.set_volume(gain);
        self.clock.lock().track_volume = gain;
    }

    fn line_gain(&self) -> f32 {
        self.clock.lock().track_volume
    }

    fn requested_gain(&self) -> f32 {
        self.clock.lock().requested_gain
    }

    fn apply_gain(&self) {
        let gain = self.requested_gain();
        self.set_line_gain(gain);
    }
}

/// Duplicate one channel over the other, in place, for 16-bit stereo
/// frames. Other frame layouts pass through untouched.
fn remap_channels(mode: ChannelMode, bytes_per_frame: usize, samples: &mut [u8]) {
    if bytes_per_frame != 4 {
        return;
    }
    match mode {
        ChannelMode::Stereo => {}
        ChannelMode::OnlyLeft => {
            for frame in samples.chunks_exact_mut(4) {
                frame[2] = frame[0];
                frame[3] = frame[1];
            }
        }
        ChannelMode::OnlyRight => {
            for frame in samples.chunks_exact_mut(4) {
                frame[0] = frame[2];
                frame[1] = frame[3];
            }
        }
    }
}
