//! Terminal display sink.
//!
//! The client has no window; decoded frames are summarised through
//! `tracing` instead. A resolution change is logged at `info`, every
//! frame at `trace`.

use skylink_core::{DisplaySink, RawFrame, SinkControl};
use tracing::{info, trace};

/// Logs what would be shown.
#[derive(Debug, Default)]
pub struct StatusSink {
    size: Option<(u32, u32)>,
    frames: u64,
}

impl StatusSink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Frames shown so far.
    pub fn frames(&self) -> u64 {
        self.frames
    }

    /// Current stream resolution, once a frame has arrived.
    pub fn size(&self) -> Option<(u32, u32)> {
        self.size
    }
}

impl DisplaySink for StatusSink {
    fn show(&mut self, frame: RawFrame) -> SinkControl {
        self.frames += 1;
        let size = (frame.width, frame.height);
        if self.size != Some(size) {
            info!(width = size.0, height = size.1, "video stream resolution");
            self.size = Some(size);
        }
        trace!(
            frame = self.frames,
            latency = ?frame.timestamp.elapsed(),
            "frame shown"
        );
        SinkControl::Continue
    }
}
