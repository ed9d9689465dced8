//! Server-side control receiver.
//!
//! Polls the bound control socket without blocking. Every well-formed
//! datagram is clamped channel by channel and written to the
//! [`OutputDevice`]; malformed datagrams are counted and dropped. When
//! the socket is empty the loop sleeps for `poll_interval` so an idle
//! link does not pin a core.

use std::io::ErrorKind;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::{Duration, Instant};

use tokio::net::UdpSocket;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, trace, warn};

use crate::axis::AxisSample;
use crate::control::codec::ControlCodec;
use crate::device::OutputDevice;

/// Receive buffer size. Larger than a control packet so that oversized
/// datagrams are seen in full and rejected instead of truncated to 16.
const RECV_BUFFER: usize = 1024;

// ── ControlReceiverConfig ────────────────────────────────────────

/// Configuration for [`ControlReceiver`].
#[derive(Debug, Clone)]
pub struct ControlReceiverConfig {
    /// Sleep between polls when no datagram is waiting.
    pub poll_interval: Duration,
}

impl Default for ControlReceiverConfig {
    fn default() -> Self {
        Self {
            poll_interval: Duration::from_millis(1),
        }
    }
}

// ── ControlDiagnostics ───────────────────────────────────────────

/// Last-applied sample and counters written by the receiver task.
#[derive(Debug, Default)]
pub struct ControlDiagnostics {
    last_applied: Mutex<Option<(AxisSample, Instant)>>,
    polls: AtomicU64,
    received: AtomicU64,
    applied: AtomicU64,
    malformed: AtomicU64,
    device_errors: AtomicU64,
    transport_errors: AtomicU64,
}

impl ControlDiagnostics {
    /// The most recent sample written to the device, if any.
    pub fn last_applied(&self) -> Option<AxisSample> {
        self.last_applied
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .map(|(s, _)| s)
    }

    /// Time since the last sample was applied.
    pub fn since_last_applied(&self) -> Option<Duration> {
        self.last_applied
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .map(|(_, at)| at.elapsed())
    }

    /// Read attempts on the socket, including empty ones.
    pub fn polls(&self) -> u64 {
        self.polls.load(Ordering::Relaxed)
    }

    /// Datagrams read from the socket.
    pub fn received(&self) -> u64 {
        self.received.load(Ordering::Relaxed)
    }

    /// Samples fully written to the device.
    pub fn applied(&self) -> u64 {
        self.applied.load(Ordering::Relaxed)
    }

    /// Datagrams dropped for having the wrong length.
    pub fn malformed(&self) -> u64 {
        self.malformed.load(Ordering::Relaxed)
    }

    /// Samples the device refused.
    pub fn device_errors(&self) -> u64 {
        self.device_errors.load(Ordering::Relaxed)
    }

    /// Socket errors other than would-block.
    pub fn transport_errors(&self) -> u64 {
        self.transport_errors.load(Ordering::Relaxed)
    }

    fn record_applied(&self, sample: AxisSample) {
        *self
            .last_applied
            .lock()
            .unwrap_or_else(PoisonError::into_inner) = Some((sample, Instant::now()));
        self.applied.fetch_add(1, Ordering::Relaxed);
    }
}

// ── ControlReceiver ──────────────────────────────────────────────

/// Polling control receiver that drives an output device.
pub struct ControlReceiver {
    socket: UdpSocket,
    device: Box<dyn OutputDevice>,
    poll_interval: Duration,
    diagnostics: Arc<ControlDiagnostics>,
}

impl ControlReceiver {
    /// Wrap an already-bound `socket`. The receiver takes exclusive
    /// ownership of `device`.
    pub fn new(
        socket: UdpSocket,
        device: Box<dyn OutputDevice>,
        config: &ControlReceiverConfig,
    ) -> Self {
        Self {
            socket,
            device,
            poll_interval: config.poll_interval,
            diagnostics: Arc::new(ControlDiagnostics::default()),
        }
    }

    /// Shared diagnostics handle.
    pub fn diagnostics(&self) -> Arc<ControlDiagnostics> {
        Arc::clone(&self.diagnostics)
    }

    /// Local address of the bound control socket.
    pub fn local_addr(&self) -> std::io::Result<SocketAddr> {
        self.socket.local_addr()
    }

    /// Run the poll loop until `cancel` fires. The device is dropped
    /// when this returns, so no write can follow shutdown.
    pub async fn run(mut self, cancel: CancellationToken) {
        info!(
            device = self.device.name(),
            poll = ?self.poll_interval,
            "control receiver started"
        );
        let mut buf = [0u8; RECV_BUFFER];

        while !cancel.is_cancelled() {
            self.diagnostics.polls.fetch_add(1, Ordering::Relaxed);
            match self.socket.try_recv_from(&mut buf) {
                Ok((len, peer)) => self.handle_datagram(&buf[..len], peer),
                Err(e) if e.kind() == ErrorKind::WouldBlock => {
                    tokio::select! {
                        _ = cancel.cancelled() => break,
                        _ = tokio::time::sleep(self.poll_interval) => {}
                    }
                }
                // Reported on some platforms after an ICMP port-unreachable.
                Err(e) if e.kind() == ErrorKind::ConnectionReset => {
                    trace!("control socket reset: {e}");
                }
                Err(e) => {
                    self.diagnostics
                        .transport_errors
                        .fetch_add(1, Ordering::Relaxed);
                    warn!("control receive failed: {e}");
                    tokio::select! {
                        _ = cancel.cancelled() => break,
                        _ = tokio::time::sleep(self.poll_interval) => {}
                    }
                }
            }
        }

        debug!(
            received = self.diagnostics.received(),
            applied = self.diagnostics.applied(),
            malformed = self.diagnostics.malformed(),
            "control receiver stopped"
        );
    }

    fn handle_datagram(&mut self, data: &[u8], peer: SocketAddr) {
        self.diagnostics.received.fetch_add(1, Ordering::Relaxed);

        let sample = match ControlCodec::decode(data) {
            Ok(s) => s.clamped(),
            Err(e) => {
                self.diagnostics.malformed.fetch_add(1, Ordering::Relaxed);
                debug!(%peer, "dropping datagram: {e}");
                return;
            }
        };

        match self.device.apply(&sample) {
            Ok(()) => {
                trace!(%peer, %sample, "applied");
                self.diagnostics.record_applied(sample);
            }
            Err(e) => {
                self.diagnostics.device_errors.fetch_add(1, Ordering::Relaxed);
                warn!(device = self.device.name(), "device write failed: {e}");
            }
        }
    }
}

// ── Tests ────────────────────────────────────────────────────────
