//! Packed binary LUT format (`.bin`).
//!
//! Layout (all integers little-endian):
//!
//! | offset        | field                                  |
//! |---------------|----------------------------------------|
//! | `0x00..0x08`  | magic `".MS-LUT "`                     |
//! | `0x08..0x0C`  | version (`u32`, currently 1)           |
//! | `0x0C..0x10`  | edge length `N` (`u32`)                |
//! | `0x10`        | sample format (`u8`, 3 = `f32`)        |
//! | `0x28..0x30`  | data offset (`u64`, normally `0x40`)   |
//! | data offset   | `N³ × 3` little-endian `f32`, red fastest |

use lutcraft_core::{LutCube, MAX_CUBE_SIZE, MIN_CUBE_SIZE};

use crate::error::{malformed, ParseError};

/// File magic.
pub const MAGIC: &[u8; 8] = b".MS-LUT ";
/// The only header version understood.
pub const VERSION: u32 = 1;
/// Sample format hint for 32-bit floats.
pub const FORMAT_F32: u8 = 3;
/// Data offset written by [`encode_binary`].
pub const DATA_OFFSET: usize = 0x40;

const VERSION_AT: usize = 0x08;
const SIZE_AT: usize = 0x0C;
const FORMAT_AT: usize = 0x10;
const OFFSET_AT: usize = 0x28;
const HEADER_LEN: usize = 0x30;

/// Whether `bytes` start with the binary LUT magic.
pub fn is_binary_lut(bytes: &[u8]) -> bool {
    bytes.starts_with(MAGIC)
}

/// Decode a binary LUT.
pub fn parse_binary(bytes: &[u8]) -> Result<LutCube, ParseError> {
    if bytes.len() < HEADER_LEN {
        return Err(ParseError::Malformed(format!(
            "binary LUT header truncated: {} bytes",
            bytes.len()
        )));
    }
    if !is_binary_lut(bytes) {
        return Err(ParseError::Malformed("bad binary LUT magic".into()));
    }

    let version = read_u32(bytes, VERSION_AT);
    if version != VERSION {
        return Err(ParseError::UnsupportedVariant(format!(
            "binary LUT version {}",
            version
        )));
    }
    let format = bytes[FORMAT_AT];
    if format != FORMAT_F32 {
        return Err(ParseError::UnsupportedVariant(format!(
            "binary LUT sample format {}",
            format
        )));
    }

    let size = read_u32(bytes, SIZE_AT) as usize;
    if !(MIN_CUBE_SIZE..=MAX_CUBE_SIZE).contains(&size) {
        return Err(ParseError::Malformed(format!("binary LUT size {}", size)));
    }
    let offset = usize::try_from(read_u64(bytes, OFFSET_AT))
        .map_err(|_| ParseError::Malformed("data offset overflows".into()))?;
    if offset < HEADER_LEN {
        return Err(ParseError::Malformed(format!(
            "data offset {:#x} overlaps header",
            offset
        )));
    }

    let byte_len = size * size * size * 3 * 4;
    let end = offset
        .checked_add(byte_len)
        .ok_or_else(|| ParseError::Malformed("data length overflows".into()))?;
    let payload = bytes.get(offset..end).ok_or_else(|| {
        ParseError::Malformed(format!(
            "expected {} data bytes at {:#x}, file has {}",
            byte_len,
            offset,
            bytes.len()
        ))
    })?;

    let samples = payload
        .chunks_exact(4)
        .map(|b| f32::from_le_bytes([b[0], b[1], b[2], b[3]]))
        .collect();
    LutCube::new(size, samples).map_err(malformed)
}

/// Encode a cube in the binary layout. The input domain is not represented.
pub fn encode_binary(cube: &LutCube) -> Vec<u8> {
    let mut out = vec![0u8; DATA_OFFSET];
    out[..8].copy_from_slice(MAGIC);
    out[VERSION_AT..VERSION_AT + 4].copy_from_slice(&VERSION.to_le_bytes());
    out[SIZE_AT..SIZE_AT + 4].copy_from_slice(&(cube.size() as u32).to_le_bytes());
    out[FORMAT_AT] = FORMAT_F32;
    out[OFFSET_AT..OFFSET_AT + 8].copy_from_slice(&(DATA_OFFSET as u64).to_le_bytes());

    out.reserve(cube.samples().len() * 4);
    for v in cube.samples() {
        out.extend_from_slice(&v.to_le_bytes());
    }
    out
}

fn read_u32(bytes: &[u8], at: usize) -> u32 {
    u32::from_le_bytes([bytes[at], bytes[at + 1], bytes[at + 2], bytes[at + 3]])
}

fn read_u64(bytes: &[u8], at: usize) -> u64 {
    let mut buf = [0u8; 8];
    buf.copy_from_slice(&bytes[at..at + 8]);
    u64::from_le_bytes(buf)
}
