//! Server-side video producer.
//!
//! Pulls the newest frame from the [`CaptureSource`], scales it to the
//! transmission resolution, compresses it and sends it as a single
//! datagram. Frame work happens on a blocking worker thread; the async
//! task only sends. Frames whose payload does not fit in one datagram are
//! dropped; the next capture supersedes them.

use std::net::SocketAddr;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};

use tokio::net::UdpSocket;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::error::LinkError;
use crate::video::capture::CaptureSource;
use crate::video::codec::FrameCodec;
use crate::video::throughput::ThroughputMeter;

// ── VideoProducerConfig ──────────────────────────────────────────

/// Configuration for [`VideoProducer`].
#[derive(Debug, Clone)]
pub struct VideoProducerConfig {
    /// Transmission width. `0` keeps the captured size.
    pub width: u32,
    /// Transmission height. `0` keeps the captured size.
    pub height: u32,
    /// Rate requested from the capture source.
    pub target_fps: u32,
    /// Sleep when the capture source has nothing new.
    pub idle_interval: Duration,
}

impl Default for VideoProducerConfig {
    fn default() -> Self {
        Self {
            width: 480,
            height: 360,
            target_fps: 120,
            idle_interval: Duration::from_millis(1),
        }
    }
}

impl VideoProducerConfig {
    fn output_size(&self) -> Option<(u32, u32)> {
        (self.width > 0 && self.height > 0).then_some((self.width, self.height))
    }
}

// ── ProducerStats ────────────────────────────────────────────────

/// Counters shared between the producer task and observers.
#[derive(Debug, Default)]
pub struct ProducerStats {
    sent: AtomicU64,
    dropped_oversize: AtomicU64,
    encode_errors: AtomicU64,
    send_errors: AtomicU64,
    bytes: AtomicU64,
    bytes_per_sec: AtomicU64,
}

impl ProducerStats {
    /// Frames handed to the socket.
    pub fn sent(&self) -> u64 {
        self.sent.load(Ordering::Relaxed)
    }

    /// Frames dropped because the payload exceeded one datagram.
    pub fn dropped_oversize(&self) -> u64 {
        self.dropped_oversize.load(Ordering::Relaxed)
    }

    pub fn encode_errors(&self) -> u64 {
        self.encode_errors.load(Ordering::Relaxed)
    }

    pub fn send_errors(&self) -> u64 {
        self.send_errors.load(Ordering::Relaxed)
    }

    /// Total payload bytes sent.
    pub fn bytes(&self) -> u64 {
        self.bytes.load(Ordering::Relaxed)
    }

    /// Payload throughput over the last second.
    pub fn bytes_per_sec(&self) -> u64 {
        self.bytes_per_sec.load(Ordering::Relaxed)
    }
}

// ── VideoProducer ────────────────────────────────────────────────

/// Capture → compress → send loop.
///
/// The capture source must already be started; the producer stops it
/// when the loop ends.
pub struct VideoProducer {
    socket: UdpSocket,
    target: SocketAddr,
    capture: Box<dyn CaptureSource>,
    codec: FrameCodec,
    config: VideoProducerConfig,
    stats: Arc<ProducerStats>,
}

impl VideoProducer {
    pub fn new(
        socket: UdpSocket,
        target: SocketAddr,
        capture: Box<dyn CaptureSource>,
        codec: FrameCodec,
        config: VideoProducerConfig,
    ) -> Self {
        Self {
            socket,
            target,
            capture,
            codec,
            config,
            stats: Arc::new(ProducerStats::default()),
        }
    }

    /// Shared counters.
    pub fn stats(&self) -> Arc<ProducerStats> {
        Arc::clone(&self.stats)
    }

    /// Run the producer until `cancel` fires.
    ///
    /// Capture, scaling and compression run on a blocking worker; this
    /// task only moves finished payloads onto the socket, so the runtime
    /// thread is never held by frame work.
    pub async fn run(self, cancel: CancellationToken) {
        let Self {
            socket,
            target,
            capture,
            codec,
            config,
            stats,
        } = self;
        info!(
            target_addr = %target,
            capture = capture.name(),
            codec = codec.codec_name(),
            quality = codec.quality(),
            "video producer started"
        );

        let (tx, mut rx) = mpsc::channel::<Vec<u8>>(1);
        let worker = {
            let cancel = cancel.clone();
            let stats = Arc::clone(&stats);
            tokio::task::spawn_blocking(move || {
                encode_loop(capture, codec, config, stats, tx, cancel)
            })
        };

        let mut meter = ThroughputMeter::new();
        let mut last_report = Instant::now();

        loop {
            let payload = tokio::select! {
                _ = cancel.cancelled() => break,
                next = rx.recv() => match next {
                    Some(p) => p,
                    None => break,
                },
            };

            match socket.send_to(&payload, target).await {
                Ok(n) => {
                    stats.sent.fetch_add(1, Ordering::Relaxed);
                    stats.bytes.fetch_add(n as u64, Ordering::Relaxed);
                    meter.record(n as u64);
                }
                Err(e) => {
                    stats.send_errors.fetch_add(1, Ordering::Relaxed);
                    warn!(error = %e, "video send failed");
                }
            }

            if last_report.elapsed() >= Duration::from_secs(1) {
                let bps = meter.bytes_per_sec();
                stats.bytes_per_sec.store(bps, Ordering::Relaxed);
                debug!(fps = meter.per_sec(), bytes_per_sec = bps, "video throughput");
                last_report = Instant::now();
            }
        }

        // Closing the channel releases a worker parked on a full slot.
        drop(rx);
        if let Err(e) = worker.await {
            warn!("video capture worker failed: {e}");
        }
        info!(
            sent = stats.sent(),
            dropped = stats.dropped_oversize(),
            "video producer stopped"
        );
    }
}

/// Blocking half of the producer: latest frame → scale → compress,
/// handing each payload to the send loop. Stops the capture on exit.
fn encode_loop(
    mut capture: Box<dyn CaptureSource>,
    codec: FrameCodec,
    config: VideoProducerConfig,
    stats: Arc<ProducerStats>,
    tx: mpsc::Sender<Vec<u8>>,
    cancel: CancellationToken,
) {
    while !cancel.is_cancelled() {
        let Some(frame) = capture.latest_frame() else {
            std::thread::sleep(config.idle_interval);
            continue;
        };

        let frame = match config.output_size() {
            Some((w, h)) if (frame.width, frame.height) != (w, h) => frame.resize(w, h),
            _ => frame,
        };

        let payload = match codec.encode(&frame) {
            Ok(p) => p,
            Err(LinkError::FrameTooLarge { size, max }) => {
                stats.dropped_oversize.fetch_add(1, Ordering::Relaxed);
                debug!(size, max, "frame too large for one datagram, dropped");
                continue;
            }
            Err(e) => {
                stats.encode_errors.fetch_add(1, Ordering::Relaxed);
                warn!(error = %e, "frame encode failed");
                continue;
            }
        };

        if tx.blocking_send(payload).is_err() {
            break;
        }
    }
    capture.stop();
}

// ── Tests ────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::VecDeque;
    use std::sync::Mutex;
    use std::sync::atomic::{AtomicBool, AtomicUsize};

    use crate::video::codec::{ImageCodec, ZstdCodec};
    use crate::video::frame::{PixelFormat, RawFrame};

    /// Emits payloads of scripted sizes, tagged with their index.
    struct SizedCodec {
        sizes: Vec<usize>,
        next: AtomicUsize,
    }

    impl ImageCodec for SizedCodec {
        fn compress(&self, _frame: &RawFrame, _quality: u8) -> Result<Vec<u8>, LinkError> {
            let i = self.next.fetch_add(1, Ordering::SeqCst);
            let mut out = vec![0u8; self.sizes[i]];
            out[0] = i as u8;
            Ok(out)
        }

        fn decompress(&self, _data: &[u8]) -> Result<RawFrame, LinkError> {
            Err(LinkError::DecodeFailure("not used".into()))
        }

        fn name(&self) -> &'static str {
            "sized"
        }
    }

    /// Hands out a fixed queue of frames, then nothing.
    struct QueuedCapture {
        frames: VecDeque<RawFrame>,
        stopped: Arc<AtomicBool>,
    }

    impl CaptureSource for QueuedCapture {
        fn start(&mut self, _target_fps: u32) -> Result<(), LinkError> {
            Ok(())
        }

        fn latest_frame(&mut self) -> Option<RawFrame> {
            self.frames.pop_front()
        }

        fn stop(&mut self) {
            self.stopped.store(true, Ordering::SeqCst);
        }

        fn name(&self) -> &str {
            "queued"
        }
    }

    async fn recv_all(socket: &UdpSocket, window: Duration) -> Vec<Vec<u8>> {
        let mut got = Vec::new();
        let mut buf = vec![0u8; 65_536];
        while let Ok(Ok((n, _))) = tokio::time::timeout(window, socket.recv_from(&mut buf)).await {
            got.push(buf[..n].to_vec());
        }
        got
    }

    fn producer_with(
        socket: UdpSocket,
        target: SocketAddr,
        sizes: Vec<usize>,
        frame: RawFrame,
    ) -> (VideoProducer, Arc<AtomicBool>) {
        let stopped = Arc::new(AtomicBool::new(false));
        let capture = QueuedCapture {
            frames: std::iter::repeat_n(frame, sizes.len()).collect(),
            stopped: Arc::clone(&stopped),
        };
        let codec = FrameCodec::new(
            Box::new(SizedCodec {
                sizes,
                next: AtomicUsize::new(0),
            }),
            80,
        );
        let producer = VideoProducer::new(
            socket,
            target,
            Box::new(capture),
            codec,
            VideoProducerConfig::default(),
        );
        (producer, stopped)
    }

    #[tokio::test]
    async fn oversized_frame_is_skipped() {
        let rx = UdpSocket::bind("127.0.0.1:0").await.unwrap();
        let tx = UdpSocket::bind("127.0.0.1:0").await.unwrap();
        let frame = RawFrame::black(480, 360, PixelFormat::Bgra8);
        let (producer, stopped) =
            producer_with(tx, rx.local_addr().unwrap(), vec![100, 200, 70_000, 300], frame);
        let stats = producer.stats();

        let cancel = CancellationToken::new();
        let task = tokio::spawn(producer.run(cancel.clone()));

        let got = recv_all(&rx, Duration::from_millis(300)).await;
        cancel.cancel();
        task.await.unwrap();

        let tags: Vec<(u8, usize)> = got.iter().map(|p| (p[0], p.len())).collect();
        assert_eq!(tags, vec![(0, 100), (1, 200), (3, 300)]);
        assert_eq!(stats.sent(), 3);
        assert_eq!(stats.dropped_oversize(), 1);
        assert_eq!(stats.bytes(), 600);
        assert!(stopped.load(Ordering::SeqCst), "capture not stopped on exit");
    }

    #[tokio::test]
    async fn frames_are_scaled_before_encoding() {
        struct SizeRecorder(Arc<Mutex<Vec<(u32, u32)>>>);

        impl ImageCodec for SizeRecorder {
            fn compress(&self, frame: &RawFrame, _quality: u8) -> Result<Vec<u8>, LinkError> {
                self.0.lock().unwrap().push((frame.width, frame.height));
                Ok(vec![1, 2, 3])
            }

            fn decompress(&self, _data: &[u8]) -> Result<RawFrame, LinkError> {
                Err(LinkError::DecodeFailure("not used".into()))
            }

            fn name(&self) -> &'static str {
                "size-recorder"
            }
        }

        let rx = UdpSocket::bind("127.0.0.1:0").await.unwrap();
        let tx = UdpSocket::bind("127.0.0.1:0").await.unwrap();
        let seen = Arc::new(Mutex::new(Vec::new()));
        let capture = QueuedCapture {
            frames: VecDeque::from([RawFrame::black(1920, 1080, PixelFormat::Bgra8)]),
            stopped: Arc::new(AtomicBool::new(false)),
        };
        let producer = VideoProducer::new(
            tx,
            rx.local_addr().unwrap(),
            Box::new(capture),
            FrameCodec::new(Box::new(SizeRecorder(Arc::clone(&seen))), 80),
            VideoProducerConfig::default(),
        );

        let cancel = CancellationToken::new();
        let task = tokio::spawn(producer.run(cancel.clone()));
        let got = recv_all(&rx, Duration::from_millis(200)).await;
        cancel.cancel();
        task.await.unwrap();

        assert_eq!(got.len(), 1);
        assert_eq!(*seen.lock().unwrap(), vec![(480, 360)]);
    }

    /// Always has a fresh full-size frame ready.
    struct EndlessCapture(RawFrame);

    impl CaptureSource for EndlessCapture {
        fn start(&mut self, _target_fps: u32) -> Result<(), LinkError> {
            Ok(())
        }

        fn latest_frame(&mut self) -> Option<RawFrame> {
            Some(self.0.clone())
        }

        fn stop(&mut self) {}

        fn name(&self) -> &str {
            "endless"
        }
    }

    #[tokio::test(flavor = "current_thread")]
    async fn frame_work_leaves_runtime_free() {
        let rx = UdpSocket::bind("127.0.0.1:0").await.unwrap();
        let tx = UdpSocket::bind("127.0.0.1:0").await.unwrap();
        let producer = VideoProducer::new(
            tx,
            rx.local_addr().unwrap(),
            Box::new(EndlessCapture(RawFrame::black(960, 720, PixelFormat::Bgra8))),
            FrameCodec::new(Box::new(ZstdCodec), 80),
            VideoProducerConfig::default(),
        );
        let stats = producer.stats();
        let cancel = CancellationToken::new();
        let task = tokio::spawn(producer.run(cancel.clone()));

        let mut worst = Duration::ZERO;
        for _ in 0..40 {
            let before = Instant::now();
            tokio::time::sleep(Duration::from_millis(2)).await;
            worst = worst.max(before.elapsed());
        }
        cancel.cancel();
        task.await.unwrap();

        assert!(stats.sent() > 0, "no frames went out");
        assert!(worst < Duration::from_millis(50), "runtime held for {worst:?}");
    }

    #[tokio::test]
    async fn unreachable_target_is_not_fatal() {
        let tx = UdpSocket::bind("127.0.0.1:0").await.unwrap();
        // Nothing listens on the discard port of the loopback.
        let target: SocketAddr = "127.0.0.1:9".parse().unwrap();
        let frame = RawFrame::black(8, 8, PixelFormat::Rgb8);
        let (producer, _) = producer_with(tx, target, vec![10; 5], frame);
        let stats = producer.stats();

        let cancel = CancellationToken::new();
        let task = tokio::spawn(producer.run(cancel.clone()));
        tokio::time::sleep(Duration::from_millis(100)).await;
        cancel.cancel();
        tokio::time::timeout(Duration::from_millis(50), task)
            .await
            .expect("producer did not stop")
            .unwrap();

        assert_eq!(stats.sent() + stats.send_errors(), 5);
    }
}
