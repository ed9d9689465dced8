//! Capture source boundary.
//!
//! The video producer pulls frames through [`CaptureSource`]. The
//! accessor is non-blocking: it returns the newest frame if one arrived
//! since the last call, `None` otherwise. Screen grabbers and cameras
//! are plugged in by implementing the trait; [`SyntheticCapture`]
//! renders a moving test card and is what the server uses when no real
//! source is configured.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::thread::JoinHandle;
use std::time::{Duration, Instant};

use tracing::{debug, info};

use crate::error::LinkError;
use crate::video::frame::{PixelFormat, RawFrame};

// ── CaptureSource ────────────────────────────────────────────────

/// Upstream producer of raw frames.
///
/// Driven by exactly one task; implementations need not be `Sync`.
pub trait CaptureSource: Send {
    /// Begin producing frames at roughly `target_fps`.
    fn start(&mut self, target_fps: u32) -> Result<(), LinkError>;

    /// Newest frame since the previous call, without blocking.
    fn latest_frame(&mut self) -> Option<RawFrame>;

    /// Stop producing frames and release resources.
    fn stop(&mut self);

    /// Short name for logs.
    fn name(&self) -> &str;
}

/// Open an in-tree capture source by name (`"synthetic"`).
pub fn open_capture(kind: &str, width: u32, height: u32) -> Result<Box<dyn CaptureSource>, LinkError> {
    match kind.trim().to_ascii_lowercase().as_str() {
        "synthetic" => Ok(Box::new(SyntheticCapture::new(width, height))),
        other => Err(LinkError::DeviceInit(format!(
            "unknown capture source {other:?} (expected \"synthetic\")"
        ))),
    }
}

// ── SyntheticCapture ─────────────────────────────────────────────

/// Test-card generator running on its own thread.
///
/// Each frame is a dark vertical gradient with a bright bar that sweeps
/// left to right, so a receiver can see motion and measure frame rate.
pub struct SyntheticCapture {
    width: u32,
    height: u32,
    latest: Arc<Mutex<Option<RawFrame>>>,
    running: Arc<AtomicBool>,
    produced: Arc<AtomicU64>,
    worker: Option<JoinHandle<()>>,
}

impl SyntheticCapture {
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            width,
            height,
            latest: Arc::new(Mutex::new(None)),
            running: Arc::new(AtomicBool::new(false)),
            produced: Arc::new(AtomicU64::new(0)),
            worker: None,
        }
    }

    /// Frames rendered since start.
    pub fn produced(&self) -> u64 {
        self.produced.load(Ordering::Relaxed)
    }

    /// Render test-card frame number `n`.
    pub fn render(width: u32, height: u32, n: u64) -> RawFrame {
        let bpp = PixelFormat::Bgra8.bytes_per_pixel();
        let mut data = vec![0u8; width as usize * height as usize * bpp];
        let bar_w = (width / 16).max(1);
        let bar_x = if width == 0 { 0 } else { (n * 4 % width as u64) as u32 };

        for y in 0..height {
            let shade = (y * 96 / height) as u8;
            for x in 0..width {
                let i = (y as usize * width as usize + x as usize) * bpp;
                let in_bar = x >= bar_x && x < bar_x + bar_w;
                let px = if in_bar {
                    [0x20, 0xE0, 0x20, 0xFF]
                } else {
                    [shade, shade, shade, 0xFF]
                };
                data[i..i + bpp].copy_from_slice(&px);
            }
        }

        RawFrame {
            width,
            height,
            stride: width * bpp as u32,
            format: PixelFormat::Bgra8,
            data,
            timestamp: Instant::now(),
        }
    }
}

impl CaptureSource for SyntheticCapture {
    fn start(&mut self, target_fps: u32) -> Result<(), LinkError> {
        if target_fps == 0 {
            return Err(LinkError::DeviceInit("capture target_fps must be at least 1".into()));
        }
        if self.width == 0 || self.height == 0 {
            return Err(LinkError::DeviceInit(format!(
                "invalid capture size {}x{}",
                self.width, self.height
            )));
        }
        if self.worker.is_some() {
            return Ok(());
        }

        self.running.store(true, Ordering::SeqCst);
        let running = Arc::clone(&self.running);
        let latest = Arc::clone(&self.latest);
        let produced = Arc::clone(&self.produced);
        let (w, h) = (self.width, self.height);
        let interval = Duration::from_secs_f64(1.0 / target_fps as f64);

        let worker = std::thread::Builder::new()
            .name("synthetic-capture".into())
            .spawn(move || {
                let mut n = 0u64;
                while running.load(Ordering::SeqCst) {
                    let started = Instant::now();
                    let frame = SyntheticCapture::render(w, h, n);
                    *latest.lock().unwrap_or_else(PoisonError::into_inner) = Some(frame);
                    produced.fetch_add(1, Ordering::Relaxed);
                    n += 1;
                    if let Some(rest) = interval.checked_sub(started.elapsed()) {
                        std::thread::sleep(rest);
                    }
                }
            })
            .map_err(|e| LinkError::DeviceInit(format!("failed to spawn capture thread: {e}")))?;

        self.worker = Some(worker);
        info!(width = w, height = h, target_fps, "synthetic capture started");
        Ok(())
    }

    fn latest_frame(&mut self) -> Option<RawFrame> {
        self.latest
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take()
    }

    fn stop(&mut self) {
        self.running.store(false, Ordering::SeqCst);
        if let Some(worker) = self.worker.take() {
            let _ = worker.join();
            debug!(produced = self.produced(), "synthetic capture stopped");
        }
    }

    fn name(&self) -> &str {
        "synthetic"
    }
}

impl Drop for SyntheticCapture {
    fn drop(&mut self) {
        self.stop();
    }
}

// ── Tests ────────────────────────────────────────────────────────
