//! Domain-specific error types for the skylink link.
//!
//! Per-packet failures (`MalformedPacket`, `DecodeFailure`, `Transport`,
//! `FrameTooLarge`) are handled inside the task that owns the socket and
//! never escape it. Only initialisation failures propagate to the caller.

use thiserror::Error;

/// The canonical error type for the skylink link.
#[derive(Debug, Error)]
pub enum LinkError {
    // ── Wire Errors ──────────────────────────────────────────────
    /// A control datagram did not have the fixed packet length.
    #[error("malformed control packet: expected {expected} bytes, got {actual}")]
    MalformedPacket { expected: usize, actual: usize },

    /// A video payload could not be decompressed into a frame.
    #[error("frame decode failed: {0}")]
    DecodeFailure(String),

    /// A compressed frame does not fit in a single datagram.
    #[error("frame too large: {size} bytes (max {max})")]
    FrameTooLarge { size: usize, max: usize },

    // ── Transport Errors ─────────────────────────────────────────
    /// A socket send/receive/bind failed.
    #[error("transport error: {0}")]
    Transport(#[from] std::io::Error),

    // ── Boundary Errors ──────────────────────────────────────────
    /// The output device or capture source could not be initialised.
    #[error("device initialisation failed: {0}")]
    DeviceInit(String),

    /// The output device rejected a write.
    #[error("device error: {0}")]
    Device(String),

    /// Frame compression failed.
    #[error("frame encode failed: {0}")]
    EncodeFailure(String),

    /// A configuration value is unusable.
    #[error("invalid configuration: {0}")]
    Config(String),
}

impl LinkError {
    /// Whether this error must abort the process rather than skip one
    /// iteration of a channel loop.
    pub fn is_fatal(&self) -> bool {
        matches!(self, LinkError::DeviceInit(_) | LinkError::Config(_))
    }
}
