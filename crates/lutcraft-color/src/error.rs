//! Parser and transform errors.

use lutcraft_core::LutCraftError;
use thiserror::Error;

/// Failure to decode a LUT asset. A failed parse never yields a partial cube.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ParseError {
    #[error("LUT asset not found: {0}")]
    NotFound(String),
    #[error("malformed LUT: {0}")]
    Malformed(String),
    #[error("unsupported LUT variant: {0}")]
    UnsupportedVariant(String),
}

/// Failure of a CPU transform.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ApplyError {
    #[error("transform cancelled")]
    Cancelled,
    #[error("precondition violated: {0}")]
    Precondition(String),
}

impl From<ParseError> for LutCraftError {
    fn from(err: ParseError) -> Self {
        LutCraftError::Parse(err.to_string())
    }
}

impl From<ApplyError> for LutCraftError {
    fn from(err: ApplyError) -> Self {
        match err {
            ApplyError::Cancelled => LutCraftError::Cancelled,
            ApplyError::Precondition(msg) => LutCraftError::Transform(msg),
        }
    }
}

/// Convert a cube construction failure into a parse failure.
pub(crate) fn malformed(err: LutCraftError) -> ParseError {
    ParseError::Malformed(err.to_string())
}
