//! Video channel: server capture → client display.
//!
//! ```text
//! SERVER                                    CLIENT
//! ┌───────────────────┐                    ┌───────────────────┐
//! │ CaptureSource     │                    │ VideoConsumer     │
//! │   ↓ resize        │  UDP, 1 frame per  │   ↓ decode        │
//! │ FrameCodec        │  datagram (<65000) │ DisplaySink       │
//! │ VideoProducer     │ ─────────────────► │                   │
//! └───────────────────┘                    └───────────────────┘
//! ```
//!
//! No fragmentation and no reassembly: a frame that does not fit in a
//! single datagram is never sent.

pub mod capture;
pub mod codec;
pub mod consumer;
pub mod frame;
pub mod producer;
pub mod throughput;

pub use capture::{CaptureSource, SyntheticCapture, open_capture};
pub use codec::{CodecKind, FrameCodec, ImageCodec, MAX_VIDEO_PAYLOAD, ZstdCodec, open_codec};
#[cfg(feature = "jpeg")]
pub use codec::JpegCodec;
pub use consumer::{DisplaySink, FrameStats, NullSink, SinkControl, VideoConsumer, WatchSink};
pub use frame::{PixelFormat, RawFrame};
pub use producer::{ProducerStats, VideoProducer, VideoProducerConfig};
pub use throughput::ThroughputMeter;
