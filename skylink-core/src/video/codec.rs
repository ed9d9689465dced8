//! Frame compression for the video channel.
//!
//! [`ImageCodec`] is the boundary to the image compressor. Two codecs
//! ship in-tree:
//!
//! - [`ZstdCodec`]: lossless, always available.
//! - `JpegCodec`: libjpeg-turbo, behind the `jpeg` cargo feature.
//!
//! [`FrameCodec`] wraps a codec with a fixed quality and the
//! single-datagram size ceiling: a frame either fits in one UDP payload
//! or is rejected with [`LinkError::FrameTooLarge`].
//!
//! ## Zstd payload
//!
//! ```text
//! width:   u32  (4, LE)
//! height:  u32  (4, LE)
//! format:  u8   (1)   PixelFormat tag
//! body:    [u8]       zstd(tightly packed rows)
//! ```

use serde::{Deserialize, Serialize};

use crate::error::LinkError;
use crate::video::frame::{PixelFormat, RawFrame};

// ── Constants ────────────────────────────────────────────────────

/// Practical UDP payload ceiling. Encoded frames must be strictly
/// smaller than this.
pub const MAX_VIDEO_PAYLOAD: usize = 65_000;

/// Largest decompressed frame accepted from the wire (8K RGBA).
const MAX_DECODED_BYTES: usize = 7680 * 4320 * 4;

// ── ImageCodec ───────────────────────────────────────────────────

/// Compressor / decompressor for raw frames.
pub trait ImageCodec: Send {
    /// Compress `frame` at `quality` (1..=100).
    fn compress(&self, frame: &RawFrame, quality: u8) -> Result<Vec<u8>, LinkError>;

    /// Reconstruct a frame from a payload produced by [`compress`](Self::compress).
    fn decompress(&self, data: &[u8]) -> Result<RawFrame, LinkError>;

    /// Short name for logs.
    fn name(&self) -> &'static str;
}

/// Codec selector used by configuration files.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CodecKind {
    #[default]
    Zstd,
    Jpeg,
}

/// Instantiate the codec named by `kind`.
///
/// Selecting `jpeg` in a build without the `jpeg` feature is a
/// configuration error.
pub fn open_codec(kind: CodecKind) -> Result<Box<dyn ImageCodec>, LinkError> {
    match kind {
        CodecKind::Zstd => Ok(Box::new(ZstdCodec)),
        #[cfg(feature = "jpeg")]
        CodecKind::Jpeg => Ok(Box::new(jpeg::JpegCodec)),
        #[cfg(not(feature = "jpeg"))]
        CodecKind::Jpeg => Err(LinkError::Config(
            "jpeg codec requested but skylink-core was built without the `jpeg` feature".into(),
        )),
    }
}

// ── ZstdCodec ────────────────────────────────────────────────────

/// Lossless zstd codec with a small dimension header.
#[derive(Debug, Clone, Copy, Default)]
pub struct ZstdCodec;

impl ZstdCodec {
    const HEADER_SIZE: usize = 9;

    /// Map the 1..=100 quality slider onto a zstd level. Lower quality
    /// trades CPU for a smaller payload.
    fn level(quality: u8) -> i32 {
        let q = quality.clamp(1, 100) as i32;
        (1 + (100 - q) / 10).clamp(1, 19)
    }
}

impl ImageCodec for ZstdCodec {
    fn compress(&self, frame: &RawFrame, quality: u8) -> Result<Vec<u8>, LinkError> {
        if !frame.is_well_formed() {
            return Err(LinkError::EncodeFailure(format!(
                "frame buffer too small for {}x{}",
                frame.width, frame.height
            )));
        }
        let packed = frame.to_packed();
        let body = zstd::bulk::compress(&packed, Self::level(quality))
            .map_err(|e| LinkError::EncodeFailure(format!("zstd encode failed: {e}")))?;

        let mut out = Vec::with_capacity(Self::HEADER_SIZE + body.len());
        out.extend_from_slice(&frame.width.to_le_bytes());
        out.extend_from_slice(&frame.height.to_le_bytes());
        out.push(frame.format.tag());
        out.extend_from_slice(&body);
        Ok(out)
    }

    fn decompress(&self, data: &[u8]) -> Result<RawFrame, LinkError> {
        if data.len() < Self::HEADER_SIZE {
            return Err(LinkError::DecodeFailure(format!(
                "payload too short: {} < {}",
                data.len(),
                Self::HEADER_SIZE
            )));
        }
        let width = u32::from_le_bytes([data[0], data[1], data[2], data[3]]);
        let height = u32::from_le_bytes([data[4], data[5], data[6], data[7]]);
        let format = PixelFormat::from_tag(data[8])
            .ok_or_else(|| LinkError::DecodeFailure(format!("unknown pixel format {}", data[8])))?;

        let expected = (width as usize)
            .checked_mul(height as usize)
            .and_then(|n| n.checked_mul(format.bytes_per_pixel()))
            .filter(|&n| n <= MAX_DECODED_BYTES)
            .ok_or_else(|| LinkError::DecodeFailure(format!("implausible size {width}x{height}")))?;

        let pixels = zstd::bulk::decompress(&data[Self::HEADER_SIZE..], expected)
            .map_err(|e| LinkError::DecodeFailure(format!("zstd decode failed: {e}")))?;

        RawFrame::from_packed(width, height, format, pixels).ok_or_else(|| {
            LinkError::DecodeFailure(format!("pixel data does not match {width}x{height}"))
        })
    }

    fn name(&self) -> &'static str {
        "zstd"
    }
}

// ── JpegCodec ────────────────────────────────────────────────────

#[cfg(feature = "jpeg")]
mod jpeg {
    use super::*;
    use std::time::Instant;

    /// Lossy JPEG codec backed by libjpeg-turbo. Decodes to RGB.
    pub struct JpegCodec;

    impl ImageCodec for JpegCodec {
        fn compress(&self, frame: &RawFrame, quality: u8) -> Result<Vec<u8>, LinkError> {
            let format = match frame.format {
                PixelFormat::Bgra8 => turbojpeg::PixelFormat::BGRA,
                PixelFormat::Rgba8 => turbojpeg::PixelFormat::RGBA,
                PixelFormat::Rgb8 => turbojpeg::PixelFormat::RGB,
            };
            let image = turbojpeg::Image {
                pixels: frame.data.as_slice(),
                width: frame.width as usize,
                pitch: frame.stride as usize,
                height: frame.height as usize,
                format,
            };
            let jpeg = turbojpeg::compress(
                image,
                quality.clamp(1, 100) as i32,
                turbojpeg::Subsamp::Sub2x2,
            )
            .map_err(|e| LinkError::EncodeFailure(format!("turbojpeg encode failed: {e}")))?;
            Ok(jpeg.to_vec())
        }

        fn decompress(&self, data: &[u8]) -> Result<RawFrame, LinkError> {
            let image = turbojpeg::decompress(data, turbojpeg::PixelFormat::RGB)
                .map_err(|e| LinkError::DecodeFailure(format!("turbojpeg decode failed: {e}")))?;
            Ok(RawFrame {
                width: image.width as u32,
                height: image.height as u32,
                stride: image.pitch as u32,
                format: PixelFormat::Rgb8,
                data: image.pixels,
                timestamp: Instant::now(),
            })
        }

        fn name(&self) -> &'static str {
            "jpeg"
        }
    }
}

#[cfg(feature = "jpeg")]
pub use jpeg::JpegCodec;

// ── FrameCodec ───────────────────────────────────────────────────

/// Size-bounded frame codec used by both video loops.
pub struct FrameCodec {
    codec: Box<dyn ImageCodec>,
    quality: u8,
    max_payload: usize,
}

impl FrameCodec {
    /// Wrap `codec` at a fixed `quality` with the default datagram ceiling.
    pub fn new(codec: Box<dyn ImageCodec>, quality: u8) -> Self {
        Self {
            codec,
            quality: quality.clamp(1, 100),
            max_payload: MAX_VIDEO_PAYLOAD,
        }
    }

    /// Override the payload ceiling (never above [`MAX_VIDEO_PAYLOAD`]).
    pub fn with_max_payload(mut self, max_payload: usize) -> Self {
        self.max_payload = max_payload.min(MAX_VIDEO_PAYLOAD);
        self
    }

    pub fn quality(&self) -> u8 {
        self.quality
    }

    pub fn max_payload(&self) -> usize {
        self.max_payload
    }

    pub fn codec_name(&self) -> &'static str {
        self.codec.name()
    }

    /// Compress a frame into exactly one datagram payload.
    pub fn encode(&self, frame: &RawFrame) -> Result<Vec<u8>, LinkError> {
        let payload = self.codec.compress(frame, self.quality)?;
        if payload.len() >= self.max_payload {
            return Err(LinkError::FrameTooLarge {
                size: payload.len(),
                max: self.max_payload,
            });
        }
        Ok(payload)
    }

    /// Decompress one datagram payload.
    pub fn decode(&self, data: &[u8]) -> Result<RawFrame, LinkError> {
        self.codec.decompress(data)
    }
}

// ── Tests ────────────────────────────────────────────────────────
