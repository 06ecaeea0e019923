//! Error types for loss oracles and optimizers.
//!
//! Oracle errors are configuration problems (shape mismatches, bad labels)
//! and are never caught inside a step rule: they surface unchanged through
//! [`OptimizerError::Oracle`] to the caller of the run loop.

use thiserror::Error;

/// Errors that can occur while evaluating a loss oracle.
#[derive(Debug, Clone, Error)]
pub enum OracleError {
    /// Dimension mismatch between a vector and the oracle's data.
    #[error("Dimension mismatch: expected {expected}, got {actual}")]
    DimensionMismatch {
        /// Expected dimensions
        expected: String,
        /// Actual dimensions
        actual: String,
    },

    /// The label vector could not be normalized to {0, 1}.
    #[error("Invalid labels: {reason}")]
    InvalidLabels {
        /// Description of the offending labels
        reason: String,
    },

    /// A parameter of the oracle is out of its valid range.
    #[error("Invalid parameter: {reason}")]
    InvalidParameter {
        /// Description of the invalid parameter
        reason: String,
    },

    /// Numerical instability detected.
    #[error("Numerical instability detected: {reason}")]
    NumericalError {
        /// Description of the numerical issue
        reason: String,
    },

    /// Method not implemented by this oracle.
    #[error("Feature not implemented: {feature}")]
    NotImplemented {
        /// Name of the unimplemented feature
        feature: String,
    },
}

impl OracleError {
    /// Create a DimensionMismatch error.
    pub fn dimension_mismatch<S1, S2>(expected: S1, actual: S2) -> Self
    where
        S1: std::fmt::Display,
        S2: std::fmt::Display,
    {
        Self::DimensionMismatch {
            expected: expected.to_string(),
            actual: actual.to_string(),
        }
    }

    /// Create an InvalidLabels error.
    pub fn invalid_labels<S: Into<String>>(reason: S) -> Self {
        Self::InvalidLabels {
            reason: reason.into(),
        }
    }

    /// Create an InvalidParameter error.
    pub fn invalid_parameter<S: Into<String>>(reason: S) -> Self {
        Self::InvalidParameter {
            reason: reason.into(),
        }
    }

    /// Create a NumericalError with a custom reason.
    pub fn numerical_error<S: Into<String>>(reason: S) -> Self {
        Self::NumericalError {
            reason: reason.into(),
        }
    }

    /// Create a NotImplemented error for a specific feature.
    pub fn not_implemented<S: Into<String>>(feature: S) -> Self {
        Self::NotImplemented {
            feature: feature.into(),
        }
    }
}

/// Errors that can occur during optimization.
#[derive(Debug, Clone, Error)]
pub enum OptimizerError {
    /// Invalid optimizer configuration, raised before the first step.
    #[error("Invalid optimizer configuration: {reason} ({parameter} = {value})")]
    InvalidConfiguration {
        /// Description of the configuration error
        reason: String,
        /// Name of the invalid parameter
        parameter: String,
        /// Value that was invalid
        value: String,
    },

    /// Unrecoverable numerical failure inside a step.
    #[error("Numerical failure at iteration {iteration}: {reason}")]
    NumericalError {
        /// Iteration at which the failure occurred
        iteration: usize,
        /// The violated invariant
        reason: String,
    },

    /// Line search failed to find an acceptable point.
    #[error("Line search failed after {iterations} trials: {reason}")]
    LineSearchFailed {
        /// Description of why the line search failed
        reason: String,
        /// Number of trial steps attempted
        iterations: usize,
        /// Last step size tried
        last_step_size: f64,
    },

    /// Propagated oracle error.
    #[error("Loss oracle failed: {0}")]
    Oracle(#[from] OracleError),
}

impl OptimizerError {
    /// Create an InvalidConfiguration error.
    pub fn invalid_configuration<S1, S2, S3>(reason: S1, parameter: S2, value: S3) -> Self
    where
        S1: Into<String>,
        S2: Into<String>,
        S3: Into<String>,
    {
        Self::InvalidConfiguration {
            reason: reason.into(),
            parameter: parameter.into(),
            value: value.into(),
        }
    }

    /// Create a NumericalError naming the iteration and the violated invariant.
    pub fn numerical_error<S: Into<String>>(iteration: usize, reason: S) -> Self {
        Self::NumericalError {
            iteration,
            reason: reason.into(),
        }
    }

    /// Create a LineSearchFailed error.
    pub fn line_search_failed<S: Into<String>>(
        reason: S,
        iterations: usize,
        last_step_size: f64,
    ) -> Self {
        Self::LineSearchFailed {
            reason: reason.into(),
            iterations,
            last_step_size,
        }
    }
}

/// Result type alias for oracle operations.
pub type Result<T> = std::result::Result<T, OracleError>;

/// Result type alias for optimizer operations.
pub type OptimizerResult<T> = std::result::Result<T, OptimizerError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_creation() {
        let err = OracleError::dimension_mismatch(5, 3);
        assert!(matches!(err, OracleError::DimensionMismatch { .. }));
        assert_eq!(err.to_string(), "Dimension mismatch: expected 5, got 3");

        let err = OracleError::invalid_labels("found values {3, 7}");
        assert_eq!(err.to_string(), "Invalid labels: found values {3, 7}");
    }

    #[test]
    fn test_optimizer_error_context() {
        let err = OptimizerError::invalid_configuration(
            "either a smoothness bound or an initial Hessian estimate is required",
            "L",
            "None",
        );
        if let OptimizerError::InvalidConfiguration {
            reason,
            parameter,
            value,
        } = &err
        {
            assert!(reason.contains("smoothness"));
            assert_eq!(parameter, "L");
            assert_eq!(value, "None");
        } else {
            panic!("Expected InvalidConfiguration variant");
        }
        assert!(err.to_string().starts_with("Invalid optimizer configuration"));

        let err = OptimizerError::numerical_error(12, "s^T B s vanished");
        assert!(err.to_string().contains("iteration 12"));
    }

    #[test]
    fn test_oracle_error_propagation() {
        let oracle_err = OracleError::dimension_mismatch(4, 2);
        let optimizer_err: OptimizerError = oracle_err.into();

        assert!(matches!(optimizer_err, OptimizerError::Oracle(_)));
        assert!(optimizer_err.to_string().contains("Loss oracle failed"));
        assert!(optimizer_err.to_string().contains("expected 4, got 2"));
    }
}
