//! Leica camera `.data` LUT dumps.
//!
//! These are raw 64³ tables of little-endian RGBA half floats, red fastest,
//! with no header. Alpha is ignored and values are clamped to `[0, 1]`.

use half::f16;
use lutcraft_core::LutCube;

use crate::error::{malformed, ParseError};

/// Edge length of every Leica `.data` table.
pub const LEICA_CUBE_SIZE: usize = 64;

const BYTES_PER_TEXEL: usize = 8;

/// Decode a Leica `.data` dump.
pub fn parse_leica_data(bytes: &[u8]) -> Result<LutCube, ParseError> {
    decode_rgba_f16(bytes, LEICA_CUBE_SIZE)
}

/// Decode `size³` RGBA half-float texels.
pub(crate) fn decode_rgba_f16(bytes: &[u8], size: usize) -> Result<LutCube, ParseError> {
    let cells = size * size * size;
    let needed = cells * BYTES_PER_TEXEL;
    if bytes.len() < needed {
        return Err(ParseError::Malformed(format!(
            "half-float LUT needs {} bytes, got {}",
            needed,
            bytes.len()
        )));
    }

    let mut samples = Vec::with_capacity(cells * 3);
    for texel in bytes[..needed].chunks_exact(BYTES_PER_TEXEL) {
        for c in 0..3 {
            let bits = u16::from_le_bytes([texel[c * 2], texel[c * 2 + 1]]);
            let v = f16::from_bits(bits).to_f32();
            samples.push(if v.is_nan() { 0.0 } else { v.clamp(0.0, 1.0) });
        }
    }
    LutCube::new(size, samples).map_err(malformed)
}
