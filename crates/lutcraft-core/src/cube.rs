//! The canonical in-memory 3D LUT.
//!
//! Every on-disk format decodes into a [`LutCube`]. Samples are stored as a
//! flat `N³ × 3` sequence of RGB floats with red varying fastest, so cell
//! `(r, g, b)` starts at `(b·N² + g·N + r) × 3`. This is also the texel order
//! of a 3D texture with `x = r`, `y = g`, `z = b`.

use crate::error::{LutCraftError, Result};

/// Smallest supported edge length.
pub const MIN_CUBE_SIZE: usize = 2;
/// Largest supported edge length.
pub const MAX_CUBE_SIZE: usize = 256;

/// An immutable 3D look-up table.
#[derive(Debug, Clone, PartialEq)]
pub struct LutCube {
    size: usize,
    samples: Vec<f32>,
    domain_min: [f32; 3],
    domain_max: [f32; 3],
}

impl LutCube {
    /// Build a cube from a flat red-fastest sample sequence.
    pub fn new(size: usize, samples: Vec<f32>) -> Result<Self> {
        if !(MIN_CUBE_SIZE..=MAX_CUBE_SIZE).contains(&size) {
            return Err(LutCraftError::InvalidCube(format!(
                "edge length {} outside {}..={}",
                size, MIN_CUBE_SIZE, MAX_CUBE_SIZE
            )));
        }
        let expected = size * size * size * 3;
        if samples.len() != expected {
            return Err(LutCraftError::InvalidCube(format!(
                "expected {} samples for size {}, got {}",
                expected,
                size,
                samples.len()
            )));
        }
        Ok(Self {
            size,
            samples,
            domain_min: [0.0; 3],
            domain_max: [1.0; 3],
        })
    }

    /// Replace the input domain. Each `max` must be strictly above its `min`.
    pub fn with_domain(mut self, min: [f32; 3], max: [f32; 3]) -> Result<Self> {
        for c in 0..3 {
            if !min[c].is_finite() || !max[c].is_finite() || max[c] <= min[c] {
                return Err(LutCraftError::InvalidCube(format!(
                    "empty domain on channel {}: [{}, {}]",
                    c, min[c], max[c]
                )));
            }
        }
        self.domain_min = min;
        self.domain_max = max;
        Ok(self)
    }

    /// Build a cube by evaluating `f(r, g, b)` for every cell index.
    pub fn from_fn<F>(size: usize, mut f: F) -> Result<Self>
    where
        F: FnMut(usize, usize, usize) -> [f32; 3],
    {
        let mut samples = Vec::with_capacity(size * size * size * 3);
        for b in 0..size {
            for g in 0..size {
                for r in 0..size {
                    samples.extend_from_slice(&f(r, g, b));
                }
            }
        }
        Self::new(size, samples)
    }

    /// The identity transform: cell `(r, g, b)` holds `(r, g, b) / (N − 1)`.
    pub fn identity(size: usize) -> Result<Self> {
        let n = size.saturating_sub(1).max(1) as f32;
        Self::from_fn(size, |r, g, b| [r as f32 / n, g as f32 / n, b as f32 / n])
    }

    /// Edge length `N`.
    #[inline]
    pub fn size(&self) -> usize {
        self.size
    }

    /// Flat red-fastest samples, `N³ × 3` floats.
    #[inline]
    pub fn samples(&self) -> &[f32] {
        &self.samples
    }

    /// Number of cells (`N³`).
    #[inline]
    pub fn cell_count(&self) -> usize {
        self.size * self.size * self.size
    }

    #[inline]
    pub fn domain_min(&self) -> [f32; 3] {
        self.domain_min
    }

    #[inline]
    pub fn domain_max(&self) -> [f32; 3] {
        self.domain_max
    }

    /// Whether the domain is the default `[0, 1]³`.
    pub fn has_default_domain(&self) -> bool {
        self.domain_min == [0.0; 3] && self.domain_max == [1.0; 3]
    }

    /// Offset of cell `(r, g, b)` into [`samples`](Self::samples).
    #[inline]
    pub fn offset(&self, r: usize, g: usize, b: usize) -> usize {
        (b * self.size * self.size + g * self.size + r) * 3
    }

    /// Output triple stored at cell `(r, g, b)`.
    #[inline]
    pub fn sample(&self, r: usize, g: usize, b: usize) -> [f32; 3] {
        let i = self.offset(r, g, b);
        [self.samples[i], self.samples[i + 1], self.samples[i + 2]]
    }

    /// Rescale an input value on channel `c` from the cube domain into `[0, 1]`.
    #[inline]
    pub fn normalize(&self, c: usize, value: f32) -> f32 {
        let range = self.domain_max[c] - self.domain_min[c];
        ((value - self.domain_min[c]) / range).clamp(0.0, 1.0)
    }

    /// Nearest cell index along one axis for a normalized coordinate.
    ///
    /// `round(t × (N − 1))` clamped to `[0, N − 1]`. NaN maps to 0.
    #[inline]
    pub fn nearest_index(&self, t: f32) -> usize {
        let n = (self.size - 1) as f32;
        ((t.clamp(0.0, 1.0) * n).round() as usize).min(self.size - 1)
    }

    /// Memory footprint of the samples in bytes.
    pub fn memory_size(&self) -> usize {
        self.samples.len() * std::mem::size_of::<f32>()
    }

    /// Samples as raw bytes in native float layout.
    pub fn as_bytes(&self) -> &[u8] {
        bytemuck::cast_slice(&self.samples)
    }
}
