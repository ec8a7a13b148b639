//! Error types for tensor operations

use crate::dtype::DType;
use thiserror::Error;

/// Tensor errors
#[derive(Debug, Error)]
pub enum TensorError {
    /// Two operands disagree on element count
    #[error("{op}: element count mismatch ({left} vs {right})")]
    ShapeMismatch {
        op: &'static str,
        left: usize,
        right: usize,
    },

    /// A shape is not valid for the requested operation
    #[error("Invalid shape: {0}")]
    InvalidShape(String),

    /// Element type code with no known dtype
    #[error("Unsupported tensor type code: {0}")]
    UnsupportedType(i32),

    /// Known dtype that has no backing storage
    #[error("No storage for tensor type {}", .0.name())]
    UnsupportedStorage(DType),

    /// Malformed tensor file
    #[error("Tensor codec error: {0}")]
    Codec(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type for tensor operations
pub type Result<T> = std::result::Result<T, TensorError>;
