//! Client-side control sender.
//!
//! Reads the shared [`SessionState`] once per tick and pushes one
//! 16-byte control packet to the server. Delivery is fire-and-forget: a
//! failed or lost packet is superseded by the next tick, so there is no
//! retry.

use std::net::SocketAddr;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};

use tokio::net::UdpSocket;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::control::codec::ControlCodec;
use crate::error::LinkError;
use crate::session_state::SessionState;

// ── ControlSenderConfig ──────────────────────────────────────────

/// Configuration for [`ControlSender`].
#[derive(Debug, Clone)]
pub struct ControlSenderConfig {
    /// Tick rate while the stick state is changing (Hz).
    pub rate_hz: u32,
    /// Re-send rate while the stick state is unchanged (Hz).
    /// `0` sends every tick regardless.
    pub idle_rate_hz: u32,
}

impl Default for ControlSenderConfig {
    fn default() -> Self {
        Self {
            rate_hz: 100,
            idle_rate_hz: 2,
        }
    }
}

impl ControlSenderConfig {
    fn tick_period(&self) -> Result<Duration, LinkError> {
        if self.rate_hz == 0 {
            return Err(LinkError::Config("control rate_hz must be at least 1".into()));
        }
        Ok(Duration::from_secs_f64(1.0 / self.rate_hz as f64))
    }

    fn idle_period(&self) -> Option<Duration> {
        (self.idle_rate_hz > 0 && self.idle_rate_hz < self.rate_hz)
            .then(|| Duration::from_secs_f64(1.0 / self.idle_rate_hz as f64))
    }
}

// ── SenderStats ──────────────────────────────────────────────────

/// Counters shared between the sender task and observers.
#[derive(Debug, Default)]
pub struct SenderStats {
    sent: AtomicU64,
    failed: AtomicU64,
}

impl SenderStats {
    /// Packets handed to the socket successfully.
    pub fn sent(&self) -> u64 {
        self.sent.load(Ordering::Relaxed)
    }

    /// Ticks skipped because the socket reported an error.
    pub fn failed(&self) -> u64 {
        self.failed.load(Ordering::Relaxed)
    }
}

// ── Outage ───────────────────────────────────────────────────────

/// Consecutive send failures since the last success.
#[derive(Debug, Default)]
struct Outage {
    failures: u64,
}

impl Outage {
    /// Count a failure. True for the first failure of an outage.
    fn record(&mut self) -> bool {
        self.failures += 1;
        self.failures == 1
    }

    /// Close the outage, returning how many sends it swallowed.
    fn end(&mut self) -> Option<u64> {
        (self.failures > 0).then(|| std::mem::take(&mut self.failures))
    }
}

// ── ControlSender ────────────────────────────────────────────────

/// Periodic, unreliable control-packet emitter.
pub struct ControlSender {
    socket: UdpSocket,
    target: SocketAddr,
    state: SessionState,
    tick: Duration,
    idle: Option<Duration>,
    stats: Arc<SenderStats>,
}

impl ControlSender {
    /// Wrap an ephemeral `socket` that will send to `target`.
    pub fn new(
        socket: UdpSocket,
        target: SocketAddr,
        state: SessionState,
        config: &ControlSenderConfig,
    ) -> Result<Self, LinkError> {
        Ok(Self {
            socket,
            target,
            state,
            tick: config.tick_period()?,
            idle: config.idle_period(),
            stats: Arc::new(SenderStats::default()),
        })
    }

    /// Shared counters.
    pub fn stats(&self) -> Arc<SenderStats> {
        Arc::clone(&self.stats)
    }

    /// The address packets are sent to.
    pub fn target(&self) -> SocketAddr {
        self.target
    }

    /// Run the send loop until `cancel` fires.
    pub async fn run(self, cancel: CancellationToken) {
        info!(target_addr = %self.target, tick = ?self.tick, "control sender started");

        let mut ticker = tokio::time::interval(self.tick);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

        let mut last_generation: Option<u64> = None;
        let mut last_sent = Instant::now();
        let mut outage = Outage::default();

        loop {
            tokio::select! {
                _ = cancel.cancelled() => break,
                _ = ticker.tick() => {}
            }

            let (sample, generation) = self.state.snapshot_with_generation();

            // Unchanged stick: only refresh at the idle rate.
            if let (Some(idle), Some(prev)) = (self.idle, last_generation) {
                if prev == generation && last_sent.elapsed() < idle {
                    continue;
                }
            }

            let packet = ControlCodec::encode(&sample);
            match self.socket.send_to(&packet, self.target).await {
                Ok(_) => {
                    self.stats.sent.fetch_add(1, Ordering::Relaxed);
                    last_generation = Some(generation);
                    last_sent = Instant::now();
                    if let Some(failed) = outage.end() {
                        info!(target_addr = %self.target, failed, "control send recovered");
                    }
                }
                Err(e) => {
                    self.stats.failed.fetch_add(1, Ordering::Relaxed);
                    // Warn once per outage; the rest only show in the counter.
                    if outage.record() {
                        warn!(target_addr = %self.target, "control send failed: {e}");
                    } else {
                        debug!(target_addr = %self.target, "control send failed: {e}");
                    }
                }
            }
        }

        debug!(sent = self.stats.sent(), failed = self.stats.failed(), "control sender stopped");
    }
}

// ── Tests ────────────────────────────────────────────────────────
