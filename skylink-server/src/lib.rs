//! # skylink-server
//!
//! Receives stick samples from the client and applies them to an
//! output device, while streaming captured video back over a second
//! UDP channel.
//!
//! Both channels are fire-and-forget: there is no handshake, so the
//! server may be started before or after the client.

pub mod config;
pub mod service;
