//! Error types for the image model and transformation families.

use thiserror::Error;

/// Errors raised by grids, images and transformations.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum CoreError {
    /// Two grids or buffers that must agree in shape do not.
    #[error("Shape mismatch: expected {expected:?}, got {actual:?}")]
    ShapeMismatch {
        expected: Vec<usize>,
        actual: Vec<usize>,
    },

    /// A grid size that cannot hold samples (zero-sized axis, overflow).
    #[error("Invalid size: {0}")]
    InvalidSize(String),

    /// Tensor data could not be moved to or from the host.
    #[error("Tensor data error: {0}")]
    TensorData(String),

    /// A parameter outside its admissible range.
    #[error("Invalid parameter: {0}")]
    InvalidParameter(String),
}

/// Result type for core operations.
pub type Result<T> = std::result::Result<T, CoreError>;

impl CoreError {
    /// Create a shape mismatch error from any two slices.
    pub fn shape_mismatch(expected: &[usize], actual: &[usize]) -> Self {
        Self::ShapeMismatch {
            expected: expected.to_vec(),
            actual: actual.to_vec(),
        }
    }

    /// Create an invalid size error.
    pub fn invalid_size(msg: impl Into<String>) -> Self {
        Self::InvalidSize(msg.into())
    }

    /// Create an invalid parameter error.
    pub fn invalid_parameter(msg: impl Into<String>) -> Self {
        Self::InvalidParameter(msg.into())
    }
}
