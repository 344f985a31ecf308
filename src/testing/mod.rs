//! Test doubles for the playback core
//!
//! Used by the unit tests, the integration tests and the benchmarks:
//! a scripted [`MockSink`] standing in for the audio device, a
//! [`MockClock`] for driving the synchronizer without a running queue,
//! and a [`MockTimingPort`] capturing outgoing timing requests.

use std::collections::VecDeque;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;
use tokio::sync::Notify;

use crate::audio::clock::AudioClock;
use crate::audio::sink::{AudioSink, PlayState, SinkError};
use crate::receiver::timing::TimingPort;

/// One write accepted by a [`MockSink`]
#[derive(Debug, Clone)]
pub struct SinkWrite {
    /// Sink frame counter when the write began
    pub start_frame: u64,
    /// The accepted bytes
    pub data: Vec<u8>,
}

#[derive(Debug)]
struct MockSinkState {
    play_state: PlayState,
    released: bool,
    volumes: Vec<f32>,
    writes: Vec<SinkWrite>,
    frames_accepted: u64,
    head_script: VecDeque<u32>,
    max_chunk: Option<usize>,
    write_failures: VecDeque<SinkError>,
    frame_pace: Option<Duration>,
}

/// Scripted audio sink.
///
/// Accepts writes immediately (optionally chunked, paced or failed) and
/// reports a head position either following the frames accepted or from a
/// prepared script, which is how the counter-wrap behavior is exercised.
pub struct MockSink {
    bytes_per_frame: usize,
    state: Mutex<MockSinkState>,
}

impl MockSink {
    /// Create a sink for frames of the given size
    #[must_use]
    pub fn new(bytes_per_frame: usize) -> Self {
        Self {
            bytes_per_frame,
            state: Mutex::new(MockSinkState {
                play_state: PlayState::Stopped,
                released: false,
                volumes: Vec::new(),
                writes: Vec::new(),
                frames_accepted: 0,
                head_script: VecDeque::new(),
                max_chunk: None,
                write_failures: VecDeque::new(),
                frame_pace: None,
            }),
        }
    }

    /// Serve the given head positions, one per read, before falling back
    /// to the frames-accepted counter
    pub fn script_head_positions<I: IntoIterator<Item = u32>>(&self, positions: I) {
        self.state.lock().head_script.extend(positions);
    }

    /// Accept at most `bytes` per write, forcing the caller's short-write
    /// handling
    pub fn set_max_chunk(&self, bytes: usize) {
        self.state.lock().max_chunk = Some(bytes);
    }

    /// Fail the next write with the given error
    pub fn fail_next_write(&self, error: SinkError) {
        self.state.lock().write_failures.push_back(error);
    }

    /// Block each write roughly as long as a real line would take to
    /// consume it, scaled by `per_frame`
    pub fn set_frame_pace(&self, per_frame: Duration) {
        self.state.lock().frame_pace = Some(per_frame);
    }

    /// All writes accepted so far
    #[must_use]
    pub fn writes(&self) -> Vec<SinkWrite> {
        self.state.lock().writes.clone()
    }

    /// All accepted bytes, concatenated in write order
    #[must_use]
    pub fn written_bytes(&self) -> Vec<u8> {
        let state = self.state.lock();
        state
            .writes
            .iter()
            .flat_map(|w| w.data.iter().copied())
            .collect()
    }

    /// Total frames accepted
    #[must_use]
    pub fn frames_accepted(&self) -> u64 {
        self.state.lock().frames_accepted
    }

    /// Volume values in the order they were applied
    #[must_use]
    pub fn volumes(&self) -> Vec<f32> {
        self.state.lock().volumes.clone()
    }

    /// Whether `release` has been called
    #[must_use]
    pub fn released(&self) -> bool {
        self.state.lock().released
    }
}

impl AudioSink for MockSink {
    fn play(&self) {
        self.state.lock().play_state = PlayState::Playing;
    }

    fn stop(&self) {
        self.state.lock().play_state = PlayState::Stopped;
    }

    fn release(&self) {
        self.state.lock().released = true;
    }

    fn write(&self, data: &[u8]) -> Result<usize, SinkError> {
        let (chunk, pace) = {
            let mut state = self.state.lock();
            if let Some(error) = state.write_failures.pop_front() {
                return Err(error);
            }

            let chunk = state.max_chunk.map_or(data.len(), |m| m.min(data.len()));
            let start_frame = state.frames_accepted;
            state.writes.push(SinkWrite {
                start_frame,
                data: data[..chunk].to_vec(),
            });
            state.frames_accepted += (chunk / self.bytes_per_frame) as u64;
            (chunk, state.frame_pace)
        };

        if let Some(per_frame) = pace {
            #[allow(clippy::cast_possible_truncation)]
            std::thread::sleep(per_frame * (chunk / self.bytes_per_frame) as u32);
        }
        Ok(chunk)
    }

    fn set_volume(&self, volume: f32) {
        self.state.lock().volumes.push(volume);
    }

    fn playback_head_position(&self) -> u32 {
        let mut state = self.state.lock();
        if let Some(scripted) = state.head_script.pop_front() {
            return scripted;
        }
        #[allow(clippy::cast_possible_truncation)]
        let head = state.frames_accepted as u32;
        head
    }

    fn play_state(&self) -> PlayState {
        self.state.lock().play_state
    }
}

#[derive(Debug, Default)]
struct MockClockState {
    now_seconds: f64,
    retargets: Vec<(u64, f64)>,
}

/// Fixed-function clock for synchronizer tests
#[derive(Debug, Default)]
pub struct MockClock {
    state: Mutex<MockClockState>,
}

impl MockClock {
    /// Create a clock reading zero seconds
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the value `now_seconds_time` reports
    pub fn set_now_seconds(&self, seconds: f64) {
        self.state.lock().now_seconds = seconds;
    }

    /// `(frame_time, seconds_time)` pairs passed to `set_frame_time`
    #[must_use]
    pub fn retargets(&self) -> Vec<(u64, f64)> {
        self.state.lock().retargets.clone()
    }
}

impl AudioClock for MockClock {
    fn now_line_time(&self) -> u64 {
        0
    }

    fn next_line_time(&self) -> u64 {
        0
    }

    fn now_frame_time(&self) -> u64 {
        0
    }

    fn next_frame_time(&self) -> u64 {
        0
    }

    fn now_seconds_time(&self) -> f64 {
        self.state.lock().now_seconds
    }

    fn next_seconds_time(&self) -> f64 {
        self.state.lock().now_seconds
    }

    fn convert_frame_to_seconds_time(&self, _frame_time: u64) -> f64 {
        0.0
    }

    fn convert_frame_to_line_time(&self, frame_time: u64) -> u64 {
        frame_time
    }

    fn set_frame_time(&self, frame_time: u64, seconds_time: f64) {
        self.state.lock().retargets.push((frame_time, seconds_time));
    }
}

/// Timing port capturing outgoing requests
#[derive(Default)]
pub struct MockTimingPort {
    sent: Mutex<Vec<Vec<u8>>>,
    notify: Notify,
}

impl MockTimingPort {
    /// Create an empty port
    #[must_use]
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Datagrams sent so far
    #[must_use]
    pub fn sent(&self) -> Vec<Vec<u8>> {
        self.sent.lock().clone()
    }

    /// Wait until at least `count` datagrams have been sent
    pub async fn wait_for_sends(&self, count: usize) {
        loop {
            let notified = self.notify.notified();
            if self.sent.lock().len() >= count {
                return;
            }
            notified.await;
        }
    }
}

#[async_trait]
impl TimingPort for MockTimingPort {
    async fn send_timing_request(&self, datagram: &[u8]) -> std::io::Result<()> {
        self.sent.lock().push(datagram.to_vec());
        self.notify.notify_waiters();
        Ok(())
    }
}
