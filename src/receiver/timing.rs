//! Timing synchronization for the RAOP receiver
//!
//! Keeps a weighted estimate of the offset between the sender's clock and
//! the local audio clock by probing the timing port every few seconds, and
//! retargets the clock from that estimate whenever a sync message arrives.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;
use tokio::net::UdpSocket;
use tokio::sync::watch;

use crate::audio::average::RunningExponentialAverage;
use crate::audio::clock::AudioClock;
use crate::protocol::rtp::sync::SyncPacket;
use crate::protocol::rtp::timing::{NtpTime, TimingRequest, TimingResponse};

/// Interval between timing requests
pub const TIME_REQUEST_INTERVAL: Duration = Duration::from_millis(3000);

/// Transport the timing requester writes to
#[async_trait]
pub trait TimingPort: Send + Sync {
    /// Send one encoded timing request towards the sender
    async fn send_timing_request(&self, datagram: &[u8]) -> std::io::Result<()>;
}

/// The usual transport: the session's timing UDP socket
pub struct UdpTimingPort {
    socket: Arc<UdpSocket>,
    peer: SocketAddr,
}

impl UdpTimingPort {
    /// Create a port sending to the given peer
    #[must_use]
    pub fn new(socket: Arc<UdpSocket>, peer: SocketAddr) -> Self {
        Self { socket, peer }
    }
}

#[async_trait]
impl TimingPort for UdpTimingPort {
    async fn send_timing_request(&self, datagram: &[u8]) -> std::io::Result<()> {
        self.socket.send_to(datagram, self.peer).await.map(|_| ())
    }
}

struct Requester {
    shutdown: watch::Sender<bool>,
}

/// Remote clock synchronizer.
///
/// [`start`](Self::start) spawns the periodic requester; the embedding
/// receiver feeds incoming packets to
/// [`timing_response_received`](Self::timing_response_received) and
/// [`sync_received`](Self::sync_received).
pub struct TimingSynchronizer {
    clock: Arc<dyn AudioClock>,
    /// Exponential average smoothing the remote seconds offset
    remote_seconds_offset: Mutex<RunningExponentialAverage>,
    requester: Mutex<Option<Requester>>,
}

impl TimingSynchronizer {
    /// Create a synchronizer over the given clock
    #[must_use]
    pub fn new(clock: Arc<dyn AudioClock>) -> Self {
        Self {
            clock,
            remote_seconds_offset: Mutex::new(RunningExponentialAverage::new()),
            requester: Mutex::new(None),
        }
    }

    /// Start the timing requester if it is not already running.
    ///
    /// Must be called from within a tokio runtime.
    pub fn start(&self, port: Arc<dyn TimingPort>) {
        let mut guard = self.requester.lock();
        if guard.is_some() {
            return;
        }

        let (shutdown, shutdown_rx) = watch::channel(false);
        tokio::spawn(request_loop(Arc::clone(&self.clock), port, shutdown_rx));
        *guard = Some(Requester { shutdown });

        tracing::debug!("time synchronizer started");
    }

    /// Stop the timing requester; it exits at its next iteration boundary.
    /// A later [`start`](Self::start) spawns a fresh one.
    pub fn stop(&self) {
        if let Some(requester) = self.requester.lock().take() {
            let _ = requester.shutdown.send(true);
        }
    }

    /// Fold a timing response into the remote-offset estimate.
    ///
    /// The offset sample assumes request and response transit were
    /// symmetric; its weight is bounded by the measured total transit
    /// cost, peaking at 1e-3 for a free round trip and decaying
    /// hyperbolically past about a millisecond, so low-jitter probes
    /// dominate the average.
    pub fn timing_response_received(&self, response: &TimingResponse) {
        let local_receive = self.clock.now_seconds_time();

        let reference = response.reference_time.as_seconds();
        let received = response.received_time.as_seconds();
        let send_back = response.send_time.as_seconds();

        let local_seconds = 0.5 * (local_receive + reference);
        let remote_seconds = 0.5 * (received + send_back);
        let offset = remote_seconds - local_seconds;

        let local_interval = local_receive - reference;
        let remote_interval = send_back - received;
        let transmission_time = (local_interval - remote_interval).max(0.0);
        let weight = 1e-6 / (transmission_time + 1e-3);

        self.remote_seconds_offset.lock().add(offset, weight);
        tracing::trace!(offset, weight, "timing response received");
    }

    /// Retarget the audio clock from a sync message.
    ///
    /// With a synchronized offset the sync packet's transmission time can
    /// be corrected for; before the first timing response it is assumed to
    /// be zero.
    pub fn sync_received(&self, sync: &SyncPacket) {
        let offset = self.remote_seconds_offset.lock();

        if offset.is_empty() {
            tracing::warn!("times not yet synchronized, cannot correct sync packet latency");
            self.clock
                .set_frame_time(u64::from(sync.timestamp_minus_latency), 0.0);
        } else {
            let local_seconds = sync.time.as_seconds() - offset.get();
            self.clock
                .set_frame_time(u64::from(sync.timestamp_minus_latency), local_seconds);
        }
    }

    /// Current remote seconds offset, `None` before the first response
    #[must_use]
    pub fn remote_seconds_offset(&self) -> Option<f64> {
        let average = self.remote_seconds_offset.lock();
        (!average.is_empty()).then(|| average.get())
    }
}

async fn request_loop(
    clock: Arc<dyn AudioClock>,
    port: Arc<dyn TimingPort>,
    mut shutdown: watch::Receiver<bool>,
) {
    let mut sequence: u16 = rand::random();

    loop {
        let request = TimingRequest::new(NtpTime::from_seconds(clock.now_seconds_time()));
        if let Err(e) = port.send_timing_request(&request.encode(sequence)).await {
            tracing::warn!(error = %e, "failed to send timing request");
        }
        sequence = sequence.wrapping_add(1);

        tokio::select! {
            biased;
            _ = shutdown.changed() => break,
            () = tokio::time::sleep(TIME_REQUEST_INTERVAL) => {}
        }
    }

    tracing::debug!("time synchronizer stopped");
}
