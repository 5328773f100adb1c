//! Error types for LutCraft.

use thiserror::Error;

/// Main error type for LutCraft operations.
///
/// Subsystem crates keep their own precise error enums and convert into this
/// one at crate boundaries.
#[derive(Error, Debug)]
pub enum LutCraftError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid cube: {0}")]
    InvalidCube(String),

    #[error("Invalid pixel buffer: {0}")]
    InvalidBuffer(String),

    #[error("LUT parse error: {0}")]
    Parse(String),

    #[error("Transform error: {0}")]
    Transform(String),

    #[error("GPU error: {0}")]
    Gpu(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Operation cancelled")]
    Cancelled,
}

/// Result type alias for LutCraft operations.
pub type Result<T> = std::result::Result<T, LutCraftError>;
