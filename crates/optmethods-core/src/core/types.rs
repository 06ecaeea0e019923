//! Type definitions and aliases for convex optimization.
//!
//! This module provides the scalar trait shared by every oracle and step
//! rule, together with the dense vector and matrix aliases used for
//! iterates, gradients and Hessian estimates.

use nalgebra::{Dyn, OMatrix, OVector, RealField, Scalar as NalgebraScalar};
use num_traits::{Float, FromPrimitive};
use std::fmt::{Debug, Display};

/// Trait for scalar types used in optimization (f32 or f64).
///
/// This trait combines all the numeric traits required by the loss oracles
/// and the step rules.
pub trait Scalar:
    NalgebraScalar
    + RealField
    + Float
    + FromPrimitive
    + Display
    + Debug
    + Default
    + Copy
    + Send
    + Sync
    + 'static
{
    /// Machine epsilon for this scalar type.
    const EPSILON: Self;

    /// Default tolerance for gradient norm convergence.
    const DEFAULT_GRADIENT_TOLERANCE: Self;

    /// Tolerance used when comparing symmetric matrices entrywise.
    const SYMMETRY_TOLERANCE: Self;

    /// Minimum value for line search step size.
    const MIN_STEP_SIZE: Self;

    /// Convert from f64 (for constants).
    ///
    /// # Panics
    ///
    /// Panics if the conversion fails. Use `try_from_f64` for a non-panicking version.
    fn from_f64(v: f64) -> Self {
        <Self as FromPrimitive>::from_f64(v).expect("Failed to convert from f64")
    }

    /// Try to convert from f64.
    fn try_from_f64(v: f64) -> Option<Self> {
        <Self as FromPrimitive>::from_f64(v)
    }

    /// Convert to f64 (for logging/display).
    ///
    /// # Panics
    ///
    /// Panics if the conversion fails.
    fn to_f64(self) -> f64 {
        num_traits::cast(self).expect("Failed to convert to f64")
    }

    /// Convert from usize (for iteration and sample counts).
    ///
    /// # Panics
    ///
    /// Panics if the conversion fails.
    fn from_usize(v: usize) -> Self {
        <Self as FromPrimitive>::from_usize(v).expect("Failed to convert from usize")
    }
}

impl Scalar for f32 {
    const EPSILON: Self = f32::EPSILON;
    const DEFAULT_GRADIENT_TOLERANCE: Self = 1e-5;
    const SYMMETRY_TOLERANCE: Self = 1e-5;
    const MIN_STEP_SIZE: Self = 1e-10;
}

impl Scalar for f64 {
    const EPSILON: Self = f64::EPSILON;
    const DEFAULT_GRADIENT_TOLERANCE: Self = 1e-8;
    const SYMMETRY_TOLERANCE: Self = 1e-10;
    const MIN_STEP_SIZE: Self = 1e-16;
}

/// Type alias for a dynamically-sized matrix.
pub type DMatrix<T> = OMatrix<T, Dyn, Dyn>;

/// Type alias for a dynamically-sized vector.
pub type DVector<T> = OVector<T, Dyn>;

/// Numerical constants shared across the crate.
pub mod constants {
    /// Dimension above which the exact smoothness constant is replaced by
    /// the average-smoothness estimate.
    pub const MAX_SMOOTHNESS_DIM: usize = 1000;

    /// Number of leading iterations always recorded in the trace.
    pub const SAVE_FIRST_ITERATIONS: usize = 5;

    /// Relative tolerance used by the pseudo-inverse of an initial Hessian estimate.
    pub const PSEUDO_INVERSE_EPS: f64 = 1e-12;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_scalar_conversions() {
        assert_eq!(<f64 as Scalar>::from_f64(0.25), 0.25);
        assert_eq!(<f32 as Scalar>::from_usize(7), 7.0_f32);
        assert_eq!(<f32 as Scalar>::to_f64(0.5_f32), 0.5);
        assert!(<f64 as Scalar>::try_from_f64(f64::NAN).is_some());
    }

    #[test]
    fn test_tolerances_are_ordered() {
        assert!(<f64 as Scalar>::MIN_STEP_SIZE < <f64 as Scalar>::DEFAULT_GRADIENT_TOLERANCE);
        assert!(<f32 as Scalar>::MIN_STEP_SIZE < <f32 as Scalar>::DEFAULT_GRADIENT_TOLERANCE);
    }
}
