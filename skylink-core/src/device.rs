//! Output device boundary.
//!
//! The control receiver writes every decoded channel into an
//! [`OutputDevice`]. Real backends (virtual joysticks, flight
//! controllers, servo drivers) live outside this crate and only need to
//! implement [`OutputDevice::set_channel`]. Two in-tree devices are
//! provided:
//!
//! - [`TraceDevice`]: logs channel changes through `tracing`.
//! - [`RecordingDevice`]: keeps an in-memory history behind a shared
//!   handle, for diagnostics and tests.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use tracing::{debug, info};

use crate::axis::{AxisSample, Channel};
use crate::error::LinkError;

// ── OutputDevice ─────────────────────────────────────────────────

/// Consumer of decoded channel values.
///
/// Values passed to [`set_channel`](Self::set_channel) are already
/// clamped into `[AXIS_MIN, AXIS_MAX]`. A device is driven by exactly
/// one task, so implementations need not be `Sync`.
pub trait OutputDevice: Send {
    /// Write one channel.
    fn set_channel(&mut self, channel: Channel, value: i32) -> Result<(), LinkError>;

    /// Short human-readable name for logs.
    fn name(&self) -> &str;

    /// Write all four channels in wire order.
    fn apply(&mut self, sample: &AxisSample) -> Result<(), LinkError> {
        for channel in Channel::ALL {
            self.set_channel(channel, sample.get(channel))?;
        }
        Ok(())
    }
}

/// Open an in-tree device by name (`"trace"`, `"null"`).
///
/// Unknown names fail with [`LinkError::DeviceInit`]; callers treat that
/// as fatal.
pub fn open_device(kind: &str) -> Result<Box<dyn OutputDevice>, LinkError> {
    match kind.trim().to_ascii_lowercase().as_str() {
        "trace" => Ok(Box::new(TraceDevice::new())),
        "null" => Ok(Box::new(NullDevice)),
        other => Err(LinkError::DeviceInit(format!(
            "unknown output device {other:?} (expected \"trace\" or \"null\")"
        ))),
    }
}

// ── TraceDevice ──────────────────────────────────────────────────

/// Logs each channel whenever its value changes.
pub struct TraceDevice {
    current: AxisSample,
    writes: u64,
}

impl TraceDevice {
    pub fn new() -> Self {
        info!("trace output device opened");
        Self {
            current: AxisSample::centered(),
            writes: 0,
        }
    }

    /// Last value written to every channel.
    pub fn current(&self) -> AxisSample {
        self.current
    }

    /// Total number of channel writes.
    pub fn writes(&self) -> u64 {
        self.writes
    }
}

impl Default for TraceDevice {
    fn default() -> Self {
        Self::new()
    }
}

impl OutputDevice for TraceDevice {
    fn set_channel(&mut self, channel: Channel, value: i32) -> Result<(), LinkError> {
        self.writes += 1;
        if self.current.get(channel) != value {
            debug!(%channel, value, "channel changed");
            self.current.set(channel, value);
        }
        Ok(())
    }

    fn name(&self) -> &str {
        "trace"
    }
}

// ── NullDevice ───────────────────────────────────────────────────

/// Discards every write.
pub struct NullDevice;

impl OutputDevice for NullDevice {
    fn set_channel(&mut self, _channel: Channel, _value: i32) -> Result<(), LinkError> {
        Ok(())
    }

    fn name(&self) -> &str {
        "null"
    }
}

// ── RecordingDevice ──────────────────────────────────────────────

/// One recorded channel write.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChannelWrite {
    pub channel: Channel,
    pub value: i32,
}

/// Device that records every write into a shared log.
///
/// Clone a [`RecordingHandle`] before moving the device into the
/// receiver to inspect what was applied.
pub struct RecordingDevice {
    log: Arc<Mutex<Vec<ChannelWrite>>>,
}

/// Read side of a [`RecordingDevice`].
#[derive(Clone)]
pub struct RecordingHandle {
    log: Arc<Mutex<Vec<ChannelWrite>>>,
}

impl RecordingDevice {
    pub fn new() -> (Self, RecordingHandle) {
        let log = Arc::new(Mutex::new(Vec::new()));
        (
            Self {
                log: Arc::clone(&log),
            },
            RecordingHandle { log },
        )
    }
}

impl OutputDevice for RecordingDevice {
    fn set_channel(&mut self, channel: Channel, value: i32) -> Result<(), LinkError> {
        self.log
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(ChannelWrite { channel, value });
        Ok(())
    }

    fn name(&self) -> &str {
        "recording"
    }
}

impl RecordingHandle {
    fn lock(&self) -> MutexGuard<'_, Vec<ChannelWrite>> {
        self.log.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Every write so far, oldest first.
    pub fn writes(&self) -> Vec<ChannelWrite> {
        self.lock().clone()
    }

    /// Number of writes so far.
    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    /// Most recent value written to `channel`, if any.
    pub fn last(&self, channel: Channel) -> Option<i32> {
        self.lock()
            .iter()
            .rev()
            .find(|w| w.channel == channel)
            .map(|w| w.value)
    }

    /// Every value ever written to `channel`.
    pub fn values(&self, channel: Channel) -> Vec<i32> {
        self.lock()
            .iter()
            .filter(|w| w.channel == channel)
            .map(|w| w.value)
            .collect()
    }
}

// ── Tests ────────────────────────────────────────────────────────
