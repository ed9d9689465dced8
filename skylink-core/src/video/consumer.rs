//! Client-side video consumer.
//!
//! Receives one compressed frame per datagram, decodes it and hands the
//! result to a [`DisplaySink`]. Undecodable datagrams are counted and
//! dropped. Statistics are published through a `tokio::sync::watch`
//! channel so a renderer or status line can read them without touching
//! the receive loop.

use tokio::net::UdpSocket;
use tokio::sync::watch;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::video::codec::FrameCodec;
use crate::video::frame::RawFrame;
use crate::video::throughput::ThroughputMeter;

/// Receive buffer: one maximal UDP datagram.
const RECV_BUFFER: usize = 65_536;

// ── DisplaySink ──────────────────────────────────────────────────

/// What the consumer should do after a frame has been shown.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SinkControl {
    Continue,
    /// The viewer was closed; end the video loop.
    Quit,
}

/// Downstream presenter of decoded frames.
pub trait DisplaySink: Send {
    fn show(&mut self, frame: RawFrame) -> SinkControl;
}

/// Publishes the newest frame through a watch channel.
pub struct WatchSink {
    tx: watch::Sender<Option<RawFrame>>,
}

impl WatchSink {
    pub fn new() -> (Self, watch::Receiver<Option<RawFrame>>) {
        let (tx, rx) = watch::channel(None);
        (Self { tx }, rx)
    }
}

impl DisplaySink for WatchSink {
    fn show(&mut self, frame: RawFrame) -> SinkControl {
        // Every receiver gone means nobody is watching any more.
        match self.tx.send(Some(frame)) {
            Ok(()) => SinkControl::Continue,
            Err(_) => SinkControl::Quit,
        }
    }
}

/// Discards frames. Useful when only the statistics matter.
#[derive(Debug, Default)]
pub struct NullSink;

impl DisplaySink for NullSink {
    fn show(&mut self, _frame: RawFrame) -> SinkControl {
        SinkControl::Continue
    }
}

// ── FrameStats ───────────────────────────────────────────────────

/// Receive-side statistics.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FrameStats {
    /// Frames per second over the last second.
    pub fps: f64,
    /// Frames decoded since start.
    pub total_frames: u64,
    /// Compressed bytes received since start.
    pub total_bytes: u64,
    /// Last frame width.
    pub width: u32,
    /// Last frame height.
    pub height: u32,
    /// Datagrams that failed to decode.
    pub decode_failures: u64,
}

// ── VideoConsumer ────────────────────────────────────────────────

/// Receive → decode → display loop.
pub struct VideoConsumer {
    socket: UdpSocket,
    codec: FrameCodec,
    sink: Box<dyn DisplaySink>,
    stats_tx: watch::Sender<FrameStats>,
    stats_rx: watch::Receiver<FrameStats>,
}

impl VideoConsumer {
    /// Wrap an already-bound receive `socket`.
    pub fn new(socket: UdpSocket, codec: FrameCodec, sink: Box<dyn DisplaySink>) -> Self {
        let (stats_tx, stats_rx) = watch::channel(FrameStats::default());
        Self {
            socket,
            codec,
            sink,
            stats_tx,
            stats_rx,
        }
    }

    /// A `watch::Receiver` that observes every statistics update.
    pub fn stats_receiver(&self) -> watch::Receiver<FrameStats> {
        self.stats_rx.clone()
    }

    /// Run the receive loop until `cancel` fires or the sink quits.
    pub async fn run(mut self, cancel: CancellationToken) {
        info!(codec = self.codec.codec_name(), "video consumer started");

        let mut buf = vec![0u8; RECV_BUFFER];
        let mut meter = ThroughputMeter::new();
        let mut stats = FrameStats::default();

        loop {
            let received = tokio::select! {
                _ = cancel.cancelled() => break,
                r = self.socket.recv_from(&mut buf) => r,
            };

            let n = match received {
                Ok((n, _from)) => n,
                Err(e) => {
                    // ICMP port-unreachable surfaces here on some platforms.
                    debug!(error = %e, "video receive error");
                    continue;
                }
            };

            stats.total_bytes += n as u64;
            let frame = match self.codec.decode(&buf[..n]) {
                Ok(f) => f,
                Err(e) => {
                    stats.decode_failures += 1;
                    warn!(error = %e, len = n, "discarding undecodable frame");
                    self.stats_tx.send_replace(stats.clone());
                    continue;
                }
            };

            meter.record(n as u64);
            stats.total_frames += 1;
            stats.fps = meter.per_sec();
            stats.width = frame.width;
            stats.height = frame.height;
            self.stats_tx.send_replace(stats.clone());

            if self.sink.show(frame) == SinkControl::Quit {
                info!("display closed, stopping video consumer");
                break;
            }
        }

        info!(
            frames = stats.total_frames,
            decode_failures = stats.decode_failures,
            "video consumer stopped"
        );
    }
}

// ── Tests ────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    use crate::video::codec::ZstdCodec;
    use crate::video::frame::PixelFormat;

    fn zstd() -> FrameCodec {
        FrameCodec::new(Box::new(ZstdCodec), 80)
    }

    /// Quits after `limit` frames.
    struct CountingSink {
        shown: usize,
        limit: usize,
    }

    impl DisplaySink for CountingSink {
        fn show(&mut self, _frame: RawFrame) -> SinkControl {
            self.shown += 1;
            if self.shown >= self.limit {
                SinkControl::Quit
            } else {
                SinkControl::Continue
            }
        }
    }

    #[tokio::test]
    async fn decodes_frames_and_skips_garbage() {
        let rx = UdpSocket::bind("127.0.0.1:0").await.unwrap();
        let addr = rx.local_addr().unwrap();
        let (sink, mut frames) = WatchSink::new();
        let consumer = VideoConsumer::new(rx, zstd(), Box::new(sink));
        let mut stats = consumer.stats_receiver();

        let cancel = CancellationToken::new();
        let task = tokio::spawn(consumer.run(cancel.clone()));

        let tx = UdpSocket::bind("127.0.0.1:0").await.unwrap();
        tx.send_to(&[0xFF; 32], addr).await.unwrap();
        let payload = zstd().encode(&RawFrame::black(64, 48, PixelFormat::Rgb8)).unwrap();
        tx.send_to(&payload, addr).await.unwrap();

        tokio::time::timeout(Duration::from_secs(2), frames.changed())
            .await
            .expect("no frame delivered")
            .unwrap();
        let frame = frames.borrow().clone().unwrap();
        assert_eq!((frame.width, frame.height), (64, 48));

        let s = stats.borrow_and_update().clone();
        assert_eq!(s.total_frames, 1);
        assert_eq!(s.decode_failures, 1);
        assert_eq!((s.width, s.height), (64, 48));

        cancel.cancel();
        task.await.unwrap();
    }

    #[tokio::test]
    async fn sink_quit_ends_loop() {
        let rx = UdpSocket::bind("127.0.0.1:0").await.unwrap();
        let addr = rx.local_addr().unwrap();
        let sink = CountingSink { shown: 0, limit: 2 };
        let consumer = VideoConsumer::new(rx, zstd(), Box::new(sink));
        let task = tokio::spawn(consumer.run(CancellationToken::new()));

        let tx = UdpSocket::bind("127.0.0.1:0").await.unwrap();
        let payload = zstd().encode(&RawFrame::black(16, 16, PixelFormat::Rgb8)).unwrap();
        for _ in 0..2 {
            tx.send_to(&payload, addr).await.unwrap();
        }

        tokio::time::timeout(Duration::from_secs(2), task)
            .await
            .expect("consumer ignored Quit")
            .unwrap();
    }

    #[tokio::test]
    async fn cancel_stops_idle_consumer() {
        let rx = UdpSocket::bind("127.0.0.1:0").await.unwrap();
        let consumer = VideoConsumer::new(rx, zstd(), Box::new(NullSink));
        let cancel = CancellationToken::new();
        let task = tokio::spawn(consumer.run(cancel.clone()));

        tokio::time::sleep(Duration::from_millis(20)).await;
        cancel.cancel();
        tokio::time::timeout(Duration::from_millis(50), task)
            .await
            .expect("consumer did not stop")
            .unwrap();
    }
}
