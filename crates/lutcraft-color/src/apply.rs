//! Parallel CPU application of a cube to an 8-bit image.
//!
//! Lookup is nearest-neighbor: each channel maps to cell
//! `round(t × (N − 1))`. The GPU path filters trilinearly instead, so the two
//! differ slightly at cell boundaries.
//!
//! The pixel array is split into `lanes` contiguous ranges that run on the
//! worker pool with no shared mutable state. A pixel's output depends only on
//! its own input and the cube, so the lane count never changes the result.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use lutcraft_core::{LutCraftError, LutCube, PixelBuffer, PixelFormat};
use rayon::prelude::*;
use tracing::debug;

use crate::error::ApplyError;

/// Pixels processed between cancellation checks.
const CANCEL_CHECK_PIXELS: usize = 4096;

/// Handle for cancelling an in-flight transform.
#[derive(Debug, Clone)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    /// Create a new cancel handle.
    pub fn new() -> Self {
        Self(Arc::new(AtomicBool::new(false)))
    }

    /// Signal cancellation.
    pub fn cancel(&self) {
        self.0.store(true, Ordering::Relaxed);
    }

    /// Check if cancelled.
    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::Relaxed)
    }
}

impl Default for CancelToken {
    fn default() -> Self {
        Self::new()
    }
}

/// Fixed-size pool for CPU transforms and batch work.
pub struct WorkerPool {
    pool: rayon::ThreadPool,
}

impl WorkerPool {
    /// Create a pool with `threads` workers (0 = one per logical CPU).
    pub fn new(threads: usize) -> Result<Self, LutCraftError> {
        let threads = if threads == 0 { num_cpus::get() } else { threads };
        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(threads)
            .thread_name(|i| format!("lutcraft-worker-{}", i))
            .build()
            .map_err(|e| LutCraftError::Transform(format!("worker pool: {}", e)))?;
        debug!("started worker pool with {} threads", threads);
        Ok(Self { pool })
    }

    /// Number of worker threads.
    pub fn threads(&self) -> usize {
        self.pool.current_num_threads()
    }

    /// Run `f` inside the pool; nested rayon work uses the pool's workers.
    pub fn install<R, F>(&self, f: F) -> R
    where
        R: Send,
        F: FnOnce() -> R + Send,
    {
        self.pool.install(f)
    }

    /// Apply `cube` to `source`, one lane per worker.
    pub fn apply(
        &self,
        source: &PixelBuffer,
        cube: &LutCube,
        cancel: &CancelToken,
    ) -> Result<PixelBuffer, ApplyError> {
        let lanes = self.threads();
        self.install(|| apply_with_cancel(source, cube, lanes, cancel))
    }
}

impl std::fmt::Debug for WorkerPool {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WorkerPool")
            .field("threads", &self.threads())
            .finish()
    }
}

/// Apply `cube` to `source` using `lanes` contiguous ranges.
///
/// Runs on the current rayon pool. See [`WorkerPool::apply`] for the
/// pool-bound, cancellable form.
pub fn apply(source: &PixelBuffer, cube: &LutCube, lanes: usize) -> PixelBuffer {
    // A fresh token is never cancelled.
    apply_with_cancel(source, cube, lanes, &CancelToken::new())
        .unwrap_or_else(|_| PixelBuffer::new(source.width, source.height, source.format))
}

/// Apply `cube` to `source`, stopping early once `cancel` fires.
///
/// A cancelled transform returns [`ApplyError::Cancelled`] and its partial
/// output is dropped.
pub fn apply_with_cancel(
    source: &PixelBuffer,
    cube: &LutCube,
    lanes: usize,
    cancel: &CancelToken,
) -> Result<PixelBuffer, ApplyError> {
    debug_assert_eq!(
        cube.samples().len(),
        cube.cell_count() * 3,
        "cube sample count does not match its size"
    );

    let format = source.format;
    let bpp = format.bytes_per_pixel();
    let pixels = source.pixel_count();
    let mut out = PixelBuffer::new(source.width, source.height, format);
    if pixels == 0 {
        return Ok(out);
    }
    if cancel.is_cancelled() {
        return Err(ApplyError::Cancelled);
    }

    let lanes = lanes.clamp(1, pixels);
    let lane_bytes = pixels.div_ceil(lanes) * bpp;
    let table = IndexTable::new(cube);

    out.data_mut()
        .par_chunks_mut(lane_bytes)
        .zip(source.data().par_chunks(lane_bytes))
        .try_for_each(|(dst, src)| {
            for (dst, src) in dst
                .chunks_mut(CANCEL_CHECK_PIXELS * bpp)
                .zip(src.chunks(CANCEL_CHECK_PIXELS * bpp))
            {
                if cancel.is_cancelled() {
                    return Err(ApplyError::Cancelled);
                }
                for (d, s) in dst.chunks_exact_mut(bpp).zip(src.chunks_exact(bpp)) {
                    table.map_pixel(cube, s, d);
                }
            }
            Ok(())
        })?;

    Ok(out)
}

/// Apply `cube` to foreign pixel memory.
///
/// Fails with [`ApplyError::Precondition`] when `data` does not match the
/// stated dimensions.
pub fn apply_raw(
    data: &[u8],
    width: u32,
    height: u32,
    format: PixelFormat,
    cube: &LutCube,
    lanes: usize,
) -> Result<PixelBuffer, ApplyError> {
    let source = PixelBuffer::from_raw(width, height, format, data.to_vec())
        .map_err(|e| ApplyError::Precondition(e.to_string()))?;
    Ok(apply(&source, cube, lanes))
}

/// Per-channel byte → cell index tables for one cube.
struct IndexTable {
    index: [[u16; 256]; 3],
    last_offset: usize,
}

impl IndexTable {
    fn new(cube: &LutCube) -> Self {
        let mut index = [[0u16; 256]; 3];
        for (c, table) in index.iter_mut().enumerate() {
            for (byte, slot) in table.iter_mut().enumerate() {
                let t = cube.normalize(c, byte as f32 / 255.0);
                *slot = cube.nearest_index(t) as u16;
            }
        }
        Self {
            index,
            last_offset: cube.samples().len().saturating_sub(3),
        }
    }

    /// Map one pixel. `src` and `dst` are 3 or 4 bytes; alpha is copied.
    #[inline]
    fn map_pixel(&self, cube: &LutCube, src: &[u8], dst: &mut [u8]) {
        let r = self.index[0][src[0] as usize] as usize;
        let g = self.index[1][src[1] as usize] as usize;
        let b = self.index[2][src[2] as usize] as usize;
        // Only reachable past the end with a broken cube; clamp in release.
        let i = cube.offset(r, g, b).min(self.last_offset);
        let samples = cube.samples();
        dst[0] = to_byte(samples[i]);
        dst[1] = to_byte(samples[i + 1]);
        dst[2] = to_byte(samples[i + 2]);
        if src.len() == 4 {
            dst[3] = src[3];
        }
    }
}

/// Normalized float to byte: `round(v × 255)` clamped to `[0, 255]`.
#[inline]
pub fn to_byte(v: f32) -> u8 {
    (v * 255.0).round().clamp(0.0, 255.0) as u8
}

/// Map one RGB triple without building lookup tables.
pub fn apply_pixel(cube: &LutCube, rgb: [u8; 3]) -> [u8; 3] {
    let mut idx = [0usize; 3];
    for (c, slot) in idx.iter_mut().enumerate() {
        *slot = cube.nearest_index(cube.normalize(c, rgb[c] as f32 / 255.0));
    }
    cube.sample(idx[0], idx[1], idx[2]).map(to_byte)
}
