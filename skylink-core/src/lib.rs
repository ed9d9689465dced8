//! # skylink-core
//!
//! Core library for the skylink remote stick-control and video link.
//!
//! This crate contains:
//! - **Axis model**: `AxisSample`, `Channel`, the `[1, 32768]` range and clamping
//! - **Control channel**: 16-byte `ControlCodec`, periodic `ControlSender`,
//!   polling `ControlReceiver` driving an `OutputDevice`
//! - **Video channel**: `CaptureSource`, size-bounded `FrameCodec`,
//!   `VideoProducer` and `VideoConsumer` with a `DisplaySink`
//! - **Session**: `LinkSession` owning sockets and loops for either side
//! - **Patterns**: calibration stick patterns written into a `SessionState`
//! - **Error**: `LinkError`, a typed `thiserror` error

pub mod axis;
pub mod control;
pub mod device;
pub mod error;
pub mod pattern;
pub mod session;
pub mod session_state;
pub mod task;
pub mod video;

// ── Re-exports for ergonomic usage ───────────────────────────────

pub use axis::{AXIS_MAX, AXIS_MID, AXIS_MIN, AxisSample, Channel, clamp_axis};
pub use control::{
    CONTROL_PACKET_SIZE, ControlCodec, ControlDiagnostics, ControlReceiver, ControlReceiverConfig,
    ControlSender, ControlSenderConfig, SenderStats,
};
pub use device::{NullDevice, OutputDevice, RecordingDevice, RecordingHandle, TraceDevice, open_device};
pub use error::LinkError;
pub use pattern::{Pattern, circle_sample, run_pattern};
pub use session::{ClientLinkConfig, LinkRole, LinkSession, ServerLinkConfig};
pub use session_state::SessionState;
pub use task::ChannelTasks;
pub use video::{
    CaptureSource, CodecKind, DisplaySink, FrameCodec, FrameStats, ImageCodec, MAX_VIDEO_PAYLOAD,
    NullSink, PixelFormat, ProducerStats, RawFrame, SinkControl, SyntheticCapture, VideoConsumer,
    VideoProducer, VideoProducerConfig, WatchSink, ZstdCodec, open_capture, open_codec,
};
