//! Image-encoded LUTs: a raster image that unwraps an `N × N × N` cube.
//!
//! The tiling geometry is not stored in the image, so it is supplied per
//! vendor through [`TileLayout`]. The edge length is always
//! `N = cube_root(width × height)`.

use lutcraft_core::LutCube;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::{malformed, ParseError};
use crate::lut::cube_root_exact;

/// How cube cells are arranged in the image.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum TileLayout {
    /// Pick a layout from the image dimensions.
    #[default]
    Auto,
    /// `N² × N`: one `N × N` tile per blue level, left to right.
    HorizontalStrip,
    /// `N × N²`: one `N × N` tile per blue level, top to bottom.
    VerticalStrip,
    /// `N × N` tiles, `columns` per row, blue level in row-major tile order.
    Grid { columns: u32 },
    /// Hald CLUT: square image whose raster order is the red-fastest cell order.
    Hald,
}

impl TileLayout {
    /// Resolve `Auto` and validate the layout against the image size.
    pub fn resolve(self, width: u32, height: u32) -> Result<(usize, TileLayout), ParseError> {
        let (w, h) = (width as usize, height as usize);
        let n = cube_root_exact(w * h).ok_or_else(|| {
            ParseError::Malformed(format!(
                "{}x{} image does not hold a whole cube",
                width, height
            ))
        })?;

        let layout = match self {
            TileLayout::Auto => {
                if w == n * n && h == n {
                    TileLayout::HorizontalStrip
                } else if w == n && h == n * n {
                    TileLayout::VerticalStrip
                } else if w == h {
                    let columns = integer_sqrt(n).ok_or_else(|| {
                        ParseError::UnsupportedVariant(format!(
                            "cannot infer tiling for a {}x{} image (N = {})",
                            width, height, n
                        ))
                    })?;
                    TileLayout::Grid {
                        columns: columns as u32,
                    }
                } else {
                    return Err(ParseError::UnsupportedVariant(format!(
                        "cannot infer tiling for a {}x{} image",
                        width, height
                    )));
                }
            }
            other => other,
        };

        let fits = match layout {
            TileLayout::HorizontalStrip => w == n * n && h == n,
            TileLayout::VerticalStrip => w == n && h == n * n,
            TileLayout::Grid { columns } => {
                let columns = columns as usize;
                columns > 0 && n % columns == 0 && w == columns * n && h == (n / columns) * n
            }
            TileLayout::Hald => w == h && integer_sqrt(n).is_some_and(|l| l * l * l == w),
            TileLayout::Auto => false,
        };
        if !fits {
            return Err(ParseError::Malformed(format!(
                "{:?} does not fit a {}x{} image (N = {})",
                layout, width, height, n
            )));
        }
        Ok((n, layout))
    }

    /// Image coordinates of cell `(r, g, b)` for an `n`-cube in a `width`-wide image.
    #[inline]
    fn pixel_of(self, n: usize, width: usize, r: usize, g: usize, b: usize) -> (usize, usize) {
        match self {
            TileLayout::HorizontalStrip => (b * n + r, g),
            TileLayout::VerticalStrip => (r, b * n + g),
            TileLayout::Grid { columns } => {
                let columns = columns as usize;
                ((b % columns) * n + r, (b / columns) * n + g)
            }
            TileLayout::Hald | TileLayout::Auto => {
                let i = (b * n + g) * n + r;
                (i % width, i / width)
            }
        }
    }

    /// Image dimensions needed to hold an `n`-cube in this layout.
    pub fn dimensions(self, n: usize) -> Option<(u32, u32)> {
        let (w, h) = match self {
            TileLayout::HorizontalStrip => (n * n, n),
            TileLayout::VerticalStrip => (n, n * n),
            TileLayout::Grid { columns } => {
                let columns = columns as usize;
                if columns == 0 || n % columns != 0 {
                    return None;
                }
                (columns * n, (n / columns) * n)
            }
            TileLayout::Hald => {
                let level = integer_sqrt(n)?;
                (level * level * level, level * level * level)
            }
            TileLayout::Auto => return None,
        };
        Some((w as u32, h as u32))
    }
}

/// Decode an encoded image (PNG, JPEG, ...) into a cube.
pub fn parse_image(bytes: &[u8], layout: TileLayout) -> Result<LutCube, ParseError> {
    let decoded = image::load_from_memory(bytes).map_err(|e| match e {
        image::ImageError::Unsupported(e) => ParseError::UnsupportedVariant(e.to_string()),
        other => ParseError::Malformed(other.to_string()),
    })?;
    let rgba = decoded.to_rgba8();
    let (width, height) = rgba.dimensions();
    decode_tiled(rgba.as_raw(), width, height, layout)
}

/// Redistribute tightly packed RGBA8 pixels into the canonical cube layout.
pub fn decode_tiled(
    rgba: &[u8],
    width: u32,
    height: u32,
    layout: TileLayout,
) -> Result<LutCube, ParseError> {
    if rgba.len() != width as usize * height as usize * 4 {
        return Err(ParseError::Malformed(format!(
            "{}x{} RGBA image needs {} bytes, got {}",
            width,
            height,
            width as usize * height as usize * 4,
            rgba.len()
        )));
    }
    let (n, layout) = layout.resolve(width, height)?;
    debug!("decoding {}x{} image LUT as {:?}, N = {}", width, height, layout, n);

    let w = width as usize;
    let mut samples = Vec::with_capacity(n * n * n * 3);
    for b in 0..n {
        for g in 0..n {
            for r in 0..n {
                let (x, y) = layout.pixel_of(n, w, r, g, b);
                let p = (y * w + x) * 4;
                samples.push(rgba[p] as f32 / 255.0);
                samples.push(rgba[p + 1] as f32 / 255.0);
                samples.push(rgba[p + 2] as f32 / 255.0);
            }
        }
    }
    LutCube::new(n, samples).map_err(malformed)
}

/// Unwrap a cube into an RGBA8 image using `layout`. Samples are quantized to 8 bits.
pub fn encode_tiled(cube: &LutCube, layout: TileLayout) -> Option<(u32, u32, Vec<u8>)> {
    let n = cube.size();
    let (width, height) = layout.dimensions(n)?;
    let w = width as usize;
    let mut rgba = vec![255u8; w * height as usize * 4];
    for b in 0..n {
        for g in 0..n {
            for r in 0..n {
                let (x, y) = layout.pixel_of(n, w, r, g, b);
                let p = (y * w + x) * 4;
                let rgb = cube.sample(r, g, b);
                for c in 0..3 {
                    rgba[p + c] = (rgb[c] * 255.0).round().clamp(0.0, 255.0) as u8;
                }
            }
        }
    }
    Some((width, height, rgba))
}

fn integer_sqrt(n: usize) -> Option<usize> {
    let root = (n as f64).sqrt().round() as usize;
    (root * root == n).then_some(root)
}
