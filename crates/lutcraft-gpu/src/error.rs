//! Errors raised by the GPU pipeline driver.

use lutcraft_core::LutCraftError;
use thiserror::Error;

/// Failures while creating or driving GPU resources.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum GpuError {
    #[error("No suitable GPU adapter found")]
    NoAdapter,

    #[error("Failed to create device: {0}")]
    Device(String),

    #[error("Shader compilation failed: {0}")]
    ShaderCompile(String),

    /// The rendering context is gone or was never created.
    #[error("GPU resources are not available")]
    ResourceLost,

    #[error("Invalid upload: {0}")]
    InvalidUpload(String),
}

impl From<GpuError> for LutCraftError {
    fn from(err: GpuError) -> Self {
        LutCraftError::Gpu(err.to_string())
    }
}
