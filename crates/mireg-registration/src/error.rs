//! Error types for registration operations.
//!
//! The taxonomy separates errors that are fatal before any iteration
//! (configuration), errors that abort a level (contract violations), and
//! conditions that are reported alongside a best-effort result
//! (non-convergence).

use mireg_core::CoreError;
use thiserror::Error;

/// Main error type for registration operations.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum RegistrationError {
    /// Inconsistent or invalid setup, detected before any iteration.
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// A component broke an invariant (e.g. a NaN cost).
    #[error("Contract violation: {0}")]
    ContractViolation(String),

    /// An iterative solver did not reach its tolerance.
    #[error("Non-convergence: {0}")]
    NonConvergence(String),

    /// Cooperative cancellation was observed.
    #[error("Registration cancelled")]
    Cancelled,

    /// Shape mismatch.
    #[error("Shape mismatch: expected {expected:?}, got {actual:?}")]
    ShapeMismatch {
        expected: Vec<usize>,
        actual: Vec<usize>,
    },

    /// Error from the image model or a transformation.
    #[error(transparent)]
    Core(#[from] CoreError),
}

/// Result type for registration operations.
pub type Result<T> = std::result::Result<T, RegistrationError>;

impl RegistrationError {
    /// Create a configuration error.
    pub fn configuration(msg: impl Into<String>) -> Self {
        Self::Configuration(msg.into())
    }

    /// Create a contract violation error.
    pub fn contract_violation(msg: impl Into<String>) -> Self {
        Self::ContractViolation(msg.into())
    }

    /// Create a non-convergence error.
    pub fn non_convergence(msg: impl Into<String>) -> Self {
        Self::NonConvergence(msg.into())
    }

    /// Create a shape mismatch error from any two slices.
    pub fn shape_mismatch(expected: &[usize], actual: &[usize]) -> Self {
        Self::ShapeMismatch {
            expected: expected.to_vec(),
            actual: actual.to_vec(),
        }
    }

    /// True for errors that must abort the whole run.
    pub fn is_fatal(&self) -> bool {
        !matches!(self, Self::NonConvergence(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_creation() {
        let err = RegistrationError::configuration("unknown cost 'foo'");
        assert!(matches!(err, RegistrationError::Configuration(_)));
        assert!(err.is_fatal());
        assert!(!RegistrationError::non_convergence("sor").is_fatal());
    }

    #[test]
    fn test_error_display() {
        let err = RegistrationError::contract_violation("cost is NaN");
        assert_eq!(err.to_string(), "Contract violation: cost is NaN");
        assert_eq!(RegistrationError::Cancelled.to_string(), "Registration cancelled");
    }

    #[test]
    fn test_core_error_conversion() {
        let core = CoreError::shape_mismatch(&[4, 4], &[2, 2]);
        let err: RegistrationError = core.clone().into();
        assert_eq!(err, RegistrationError::Core(core));
        assert!(err.to_string().contains("expected"));
    }
}
