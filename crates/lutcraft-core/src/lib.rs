//! LutCraft Core - Foundation types for the LUT engine
//!
//! This crate provides the fundamental types shared by every other crate:
//! - The canonical 3D LUT cube (`LutCube`)
//! - CPU pixel buffers and pixel formats
//! - The workspace-wide error type

pub mod cube;
pub mod error;
pub mod frame;

pub use cube::{LutCube, MAX_CUBE_SIZE, MIN_CUBE_SIZE};
pub use error::{LutCraftError, Result};
pub use frame::{PixelBuffer, PixelFormat, SharedPixelBuffer};
