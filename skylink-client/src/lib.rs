//! # skylink-client
//!
//! Runs next to the operator. Streams stick samples from a shared
//! session state to the server at a fixed rate and consumes the video
//! feed coming back. The stick state is driven by a calibration
//! pattern selected on the command line or in the config file.

pub mod config;
pub mod display;
pub mod service;
