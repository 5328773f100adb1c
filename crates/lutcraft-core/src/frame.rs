//! Pixel buffer types for images in CPU memory.
//!
//! Buffers are tightly packed, row-major, top-to-bottom. The engine never
//! mutates a source buffer; every transform allocates a new one.

use crate::error::{LutCraftError, Result};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// Pixel format enumeration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum PixelFormat {
    /// 8-bit RGBA (32 bits per pixel)
    #[default]
    Rgba8,
    /// 8-bit RGB (24 bits per pixel)
    Rgb8,
}

impl PixelFormat {
    /// Bytes per pixel.
    pub fn bytes_per_pixel(self) -> usize {
        match self {
            Self::Rgba8 => 4,
            Self::Rgb8 => 3,
        }
    }

    /// Whether the format carries an alpha channel.
    pub fn has_alpha(self) -> bool {
        matches!(self, Self::Rgba8)
    }

    /// Calculate total bytes needed for an image of this format.
    pub fn frame_size(self, width: u32, height: u32) -> usize {
        width as usize * height as usize * self.bytes_per_pixel()
    }
}

/// An 8-bit image in CPU memory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PixelBuffer {
    /// Pixel format
    pub format: PixelFormat,
    /// Width in pixels
    pub width: u32,
    /// Height in pixels
    pub height: u32,
    data: Vec<u8>,
}

impl PixelBuffer {
    /// Create a zero-filled buffer with the given dimensions and format.
    pub fn new(width: u32, height: u32, format: PixelFormat) -> Self {
        Self {
            format,
            width,
            height,
            data: vec![0u8; format.frame_size(width, height)],
        }
    }

    /// Wrap existing pixel bytes. The length must match the dimensions exactly.
    pub fn from_raw(width: u32, height: u32, format: PixelFormat, data: Vec<u8>) -> Result<Self> {
        let expected = format.frame_size(width, height);
        if data.len() != expected {
            return Err(LutCraftError::InvalidBuffer(format!(
                "{}x{} {:?} needs {} bytes, got {}",
                width,
                height,
                format,
                expected,
                data.len()
            )));
        }
        Ok(Self {
            format,
            width,
            height,
            data,
        })
    }

    /// Raw pixel bytes.
    #[inline]
    pub fn data(&self) -> &[u8] {
        &self.data
    }

    /// Raw pixel bytes, mutable.
    #[inline]
    pub fn data_mut(&mut self) -> &mut [u8] {
        &mut self.data
    }

    /// Consume the buffer and return its bytes.
    pub fn into_raw(self) -> Vec<u8> {
        self.data
    }

    /// Number of pixels.
    #[inline]
    pub fn pixel_count(&self) -> usize {
        self.width as usize * self.height as usize
    }

    /// Bytes per row (no padding).
    #[inline]
    pub fn stride(&self) -> usize {
        self.width as usize * self.format.bytes_per_pixel()
    }

    /// Get a row of pixel data.
    #[inline]
    pub fn row(&self, y: u32) -> &[u8] {
        let start = y as usize * self.stride();
        &self.data[start..start + self.stride()]
    }

    /// Get a mutable row of pixel data.
    #[inline]
    pub fn row_mut(&mut self, y: u32) -> &mut [u8] {
        let stride = self.stride();
        let start = y as usize * stride;
        &mut self.data[start..start + stride]
    }

    /// Channels of the pixel at `(x, y)`.
    #[inline]
    pub fn pixel(&self, x: u32, y: u32) -> &[u8] {
        let bpp = self.format.bytes_per_pixel();
        let start = (y as usize * self.width as usize + x as usize) * bpp;
        &self.data[start..start + bpp]
    }

    /// Total memory usage of this buffer in bytes.
    pub fn memory_size(&self) -> usize {
        self.data.len()
    }

    /// Width divided by height, or 1.0 for an empty buffer.
    pub fn aspect_ratio(&self) -> f32 {
        if self.height == 0 {
            1.0
        } else {
            self.width as f32 / self.height as f32
        }
    }

    /// Return the pixels as tightly packed RGBA8, expanding RGB with opaque alpha.
    pub fn to_rgba8(&self) -> Vec<u8> {
        match self.format {
            PixelFormat::Rgba8 => self.data.clone(),
            PixelFormat::Rgb8 => {
                let mut out = Vec::with_capacity(self.pixel_count() * 4);
                for px in self.data.chunks_exact(3) {
                    out.extend_from_slice(&[px[0], px[1], px[2], 255]);
                }
                out
            }
        }
    }

    /// Create a test pattern image (color bars).
    pub fn test_pattern(width: u32, height: u32) -> Self {
        let mut frame = Self::new(width, height, PixelFormat::Rgba8);
        let colors: [[u8; 4]; 8] = [
            [255, 255, 255, 255], // White
            [255, 255, 0, 255],   // Yellow
            [0, 255, 255, 255],   // Cyan
            [0, 255, 0, 255],     // Green
            [255, 0, 255, 255],   // Magenta
            [255, 0, 0, 255],     // Red
            [0, 0, 255, 255],     // Blue
            [0, 0, 0, 255],       // Black
        ];

        for y in 0..height {
            let row = frame.row_mut(y);
            for x in 0..width {
                let i = (x * 4) as usize;
                let bar = (x * 8 / width.max(1)) as usize;
                row[i..i + 4].copy_from_slice(&colors[bar.min(7)]);
            }
        }

        frame
    }

    /// Create a gradient image covering many distinct RGB values.
    ///
    /// Red ramps along x, green along y, blue along the diagonal. Alpha varies
    /// so alpha-preservation can be checked.
    pub fn gradient(width: u32, height: u32) -> Self {
        let mut frame = Self::new(width, height, PixelFormat::Rgba8);
        let wx = (width.max(2) - 1) as f32;
        let hy = (height.max(2) - 1) as f32;
        for y in 0..height {
            let row = frame.row_mut(y);
            for x in 0..width {
                let i = (x * 4) as usize;
                row[i] = (x as f32 / wx * 255.0).round() as u8;
                row[i + 1] = (y as f32 / hy * 255.0).round() as u8;
                row[i + 2] = ((x + y) % 256) as u8;
                row[i + 3] = (255 - (x * 7 + y * 13) % 128) as u8;
            }
        }
        frame
    }
}

/// Arc-wrapped pixel buffer for shared ownership.
pub type SharedPixelBuffer = Arc<PixelBuffer>;
