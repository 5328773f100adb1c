//! LutCraft Color - LUT decoding and CPU application.
//!
//! Decoders for `.cube` text, `.MS-LUT ` binary, image-encoded and Leica
//! half-float LUTs, plus the parallel nearest-neighbor CPU transform engine.

pub mod apply;
pub mod binary;
pub mod error;
pub mod image_lut;
pub mod leica;
pub mod lut;
pub mod parser;
pub mod source;

pub use apply::{apply, apply_raw, apply_with_cancel, CancelToken, WorkerPool};
pub use binary::{encode_binary, parse_binary};
pub use error::{ApplyError, ParseError};
pub use image_lut::{decode_tiled, encode_tiled, parse_image, TileLayout};
pub use leica::parse_leica_data;
pub use lut::{parse_cube_text, to_cube_text};
pub use parser::{LayoutRules, LutFormat, LutParser};
pub use source::{AssetSource, FsAssetSource, MemoryAssetSource};
