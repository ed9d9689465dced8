//! Rolling-window throughput meter for the video loops.
//!
//! Both the producer and the consumer record one sample per datagram
//! and report bytes/second and frames/second over the last window.

use std::collections::VecDeque;
use std::time::{Duration, Instant};

/// Rolling-window byte and frame rate meter.
pub struct ThroughputMeter {
    /// Samples: `(when, bytes)`.
    samples: VecDeque<(Instant, u64)>,
    window: Duration,
    /// Running total of bytes in the window.
    total_bytes: u64,
}

impl ThroughputMeter {
    /// Create a meter with a 1-second rolling window.
    pub fn new() -> Self {
        Self::with_window(Duration::from_secs(1))
    }

    pub fn with_window(window: Duration) -> Self {
        Self {
            samples: VecDeque::with_capacity(256),
            window,
            total_bytes: 0,
        }
    }

    /// Record one datagram of `bytes` at the current instant.
    pub fn record(&mut self, bytes: u64) {
        self.record_at(Instant::now(), bytes);
    }

    /// Record with an explicit timestamp (useful for testing).
    pub fn record_at(&mut self, when: Instant, bytes: u64) {
        self.samples.push_back((when, bytes));
        self.total_bytes += bytes;
        self.evict(when);
    }

    /// Throughput in bytes/second over the window.
    pub fn bytes_per_sec(&self) -> u64 {
        match self.span() {
            Some(span) => (self.total_bytes as f64 / span.as_secs_f64()) as u64,
            None => 0,
        }
    }

    /// Datagram rate over the window.
    pub fn per_sec(&self) -> f64 {
        match self.span() {
            Some(span) if self.samples.len() > 1 => {
                (self.samples.len() - 1) as f64 / span.as_secs_f64()
            }
            _ => 0.0,
        }
    }

    /// Number of samples currently in the window.
    pub fn sample_count(&self) -> usize {
        self.samples.len()
    }

    // ── Internal ─────────────────────────────────────────────────

    fn span(&self) -> Option<Duration> {
        let (first, _) = self.samples.front()?;
        let (last, _) = self.samples.back()?;
        let d = last.duration_since(*first);
        Some(if d.is_zero() { Duration::from_millis(1) } else { d })
    }

    fn evict(&mut self, now: Instant) {
        while let Some(&(ts, bytes)) = self.samples.front() {
            if now.duration_since(ts) > self.window {
                self.samples.pop_front();
                self.total_bytes = self.total_bytes.saturating_sub(bytes);
            } else {
                break;
            }
        }
    }
}

impl Default for ThroughputMeter {
    fn default() -> Self {
        Self::new()
    }
}

// ── Tests ────────────────────────────────────────────────────────
