//! Raw frame representation shared by capture, codec and display.

use std::time::Instant;

// ── PixelFormat ──────────────────────────────────────────────────

/// Pixel layout for raw frames.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PixelFormat {
    /// 4 bytes per pixel: Blue, Green, Red, Alpha.
    Bgra8,
    /// 4 bytes per pixel: Red, Green, Blue, Alpha.
    Rgba8,
    /// 3 bytes per pixel: Red, Green, Blue.
    Rgb8,
}

impl PixelFormat {
    /// Bytes consumed by a single pixel in this format.
    pub const fn bytes_per_pixel(self) -> usize {
        match self {
            PixelFormat::Bgra8 | PixelFormat::Rgba8 => 4,
            PixelFormat::Rgb8 => 3,
        }
    }

    /// Stable wire tag.
    pub const fn tag(self) -> u8 {
        match self {
            PixelFormat::Bgra8 => 0,
            PixelFormat::Rgba8 => 1,
            PixelFormat::Rgb8 => 2,
        }
    }

    pub const fn from_tag(tag: u8) -> Option<Self> {
        match tag {
            0 => Some(PixelFormat::Bgra8),
            1 => Some(PixelFormat::Rgba8),
            2 => Some(PixelFormat::Rgb8),
            _ => None,
        }
    }
}

// ── RawFrame ─────────────────────────────────────────────────────

/// An uncompressed image.
///
/// The `data` buffer holds `height` rows of `stride` bytes each.
/// `stride` may exceed `width * bytes_per_pixel` when the capture
/// source pads rows.
#[derive(Debug, Clone)]
pub struct RawFrame {
    pub width: u32,
    pub height: u32,
    /// Row pitch in **bytes**.
    pub stride: u32,
    pub format: PixelFormat,
    pub data: Vec<u8>,
    /// Monotonic capture timestamp.
    pub timestamp: Instant,
}

impl RawFrame {
    /// A tightly-packed frame wrapping `data`.
    ///
    /// Returns `None` if `data` is not exactly `width * height * bpp`.
    pub fn from_packed(width: u32, height: u32, format: PixelFormat, data: Vec<u8>) -> Option<Self> {
        let stride = width as usize * format.bytes_per_pixel();
        if data.len() != stride * height as usize {
            return None;
        }
        Some(Self {
            width,
            height,
            stride: stride as u32,
            format,
            data,
            timestamp: Instant::now(),
        })
    }

    /// A frame filled with a single pixel value.
    pub fn solid(width: u32, height: u32, format: PixelFormat, pixel: &[u8]) -> Self {
        let bpp = format.bytes_per_pixel();
        let mut data = Vec::with_capacity(width as usize * height as usize * bpp);
        for _ in 0..(width as usize * height as usize) {
            data.extend_from_slice(&pixel[..bpp]);
        }
        Self {
            width,
            height,
            stride: (width as usize * bpp) as u32,
            format,
            data,
            timestamp: Instant::now(),
        }
    }

    /// An all-black frame.
    pub fn black(width: u32, height: u32, format: PixelFormat) -> Self {
        Self::solid(width, height, format, &[0, 0, 0, 0xFF])
    }

    /// Bytes per tightly-packed row.
    pub fn row_len(&self) -> usize {
        self.width as usize * self.format.bytes_per_pixel()
    }

    /// Whether `data` is large enough for the declared geometry.
    pub fn is_well_formed(&self) -> bool {
        self.stride as usize >= self.row_len()
            && self.data.len() >= self.stride as usize * self.height as usize
    }

    /// Returns a row slice without padding.
    pub fn row(&self, y: u32) -> &[u8] {
        let start = y as usize * self.stride as usize;
        &self.data[start..start + self.row_len()]
    }

    /// Returns the pixel bytes at `(x, y)`.
    ///
    /// # Panics
    ///
    /// Panics if `(x, y)` is out of bounds.
    pub fn pixel(&self, x: u32, y: u32) -> &[u8] {
        let bpp = self.format.bytes_per_pixel();
        let offset = y as usize * self.stride as usize + x as usize * bpp;
        &self.data[offset..offset + bpp]
    }

    /// Pixel rows with padding stripped.
    pub fn to_packed(&self) -> Vec<u8> {
        if self.stride as usize == self.row_len() {
            return self.data[..self.row_len() * self.height as usize].to_vec();
        }
        let mut out = Vec::with_capacity(self.row_len() * self.height as usize);
        for y in 0..self.height {
            out.extend_from_slice(self.row(y));
        }
        out
    }

    /// Nearest-neighbour resample to `width × height`.
    ///
    /// Returns a clone when the size already matches.
    pub fn resize(&self, width: u32, height: u32) -> RawFrame {
        if width == self.width && height == self.height {
            return self.clone();
        }
        let bpp = self.format.bytes_per_pixel();
        let mut data = Vec::with_capacity(width as usize * height as usize * bpp);
        if self.width > 0 && self.height > 0 {
            for y in 0..height {
                let src_y = (y as u64 * self.height as u64 / height as u64) as u32;
                for x in 0..width {
                    let src_x = (x as u64 * self.width as u64 / width as u64) as u32;
                    data.extend_from_slice(self.pixel(src_x, src_y));
                }
            }
        } else {
            data.resize(width as usize * height as usize * bpp, 0);
        }
        RawFrame {
            width,
            height,
            stride: (width as usize * bpp) as u32,
            format: self.format,
            data,
            timestamp: self.timestamp,
        }
    }
}

// ── Tests ────────────────────────────────────────────────────────
