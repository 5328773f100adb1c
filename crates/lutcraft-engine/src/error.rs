//! Engine-level error type.

use lutcraft_color::{ApplyError, ParseError};
use lutcraft_core::LutCraftError;
use lutcraft_gpu::GpuError;
use thiserror::Error;

/// Errors returned by [`LutEngine`](crate::LutEngine) entry points.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum EngineError {
    #[error(transparent)]
    Parse(#[from] ParseError),

    #[error(transparent)]
    Apply(#[from] ApplyError),

    #[error(transparent)]
    Gpu(#[from] GpuError),

    /// A thumbnail was requested before any source image was set.
    #[error("No source image set")]
    NoSource,
}

impl From<EngineError> for LutCraftError {
    fn from(err: EngineError) -> Self {
        match err {
            EngineError::Parse(e) => e.into(),
            EngineError::Apply(e) => e.into(),
            EngineError::Gpu(e) => e.into(),
            EngineError::NoSource => LutCraftError::Transform("No source image set".into()),
        }
    }
}

pub type EngineResult<T> = std::result::Result<T, EngineError>;
