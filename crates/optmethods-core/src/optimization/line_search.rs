//! Line search strategies.
//!
//! A line search replaces a fixed step with an accepted point. Two calling
//! conventions are supported by every strategy:
//!
//! - **directional**: [`LineSearch::search_direction`] takes the current
//!   point `x` and a descent direction `d` and explores `x + α d`;
//! - **two-point**: [`LineSearch::search_between`] takes the current point
//!   and a proposed point and explores `x + t (x_proposed - x)` for
//!   `t ∈ (0, 1]`.
//!
//! Gradient descent uses the first shape, BFGS the second.
//!
//! # Armijo Condition (Sufficient Decrease)
//!
//! A trial step `α` along `d` is accepted when
//!
//! ```text
//! f(x + α d) ≤ f(x) + c₁ α ⟨∇f(x), d⟩
//! ```
//!
//! with `0 < c₁ < 1` (typically `10⁻⁴`).

use crate::{
    error::{OptimizerError, OptimizerResult},
    loss::LossOracle,
    types::{DVector, Scalar},
};
use std::fmt::Debug;

/// Outcome of a successful line search.
#[derive(Debug, Clone)]
pub struct LineSearchOutcome<T: Scalar> {
    /// The accepted point
    pub point: DVector<T>,
    /// The accepted step size along the explored direction
    pub step_size: T,
    /// Objective value at the accepted point
    pub value: T,
    /// Number of trial points evaluated
    pub trials: usize,
}

/// Parameters for backtracking line searches.
#[derive(Debug, Clone)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct LineSearchParams<T: Scalar> {
    /// First trial step of the directional search
    pub initial_step_size: T,

    /// Smallest step tried before declaring failure
    pub min_step_size: T,

    /// Maximum number of trial points
    pub max_iterations: usize,

    /// Armijo parameter c₁ ∈ (0,1)
    pub c1: T,

    /// Backtracking reduction factor ρ ∈ (0,1)
    pub rho: T,
}

impl<T: Scalar> Default for LineSearchParams<T> {
    fn default() -> Self {
        Self {
            initial_step_size: T::one(),
            min_step_size: T::MIN_STEP_SIZE,
            max_iterations: 50,
            c1: <T as Scalar>::from_f64(1e-4),
            rho: <T as Scalar>::from_f64(0.5),
        }
    }
}

impl<T: Scalar> LineSearchParams<T> {
    /// Validates the parameters.
    ///
    /// # Errors
    ///
    /// Returns `InvalidConfiguration` if step sizes are not positive, if
    /// `c1` or `rho` fall outside `(0, 1)`, or if no trial is allowed.
    pub fn validate(&self) -> OptimizerResult<()> {
        if self.initial_step_size <= T::zero() {
            return Err(OptimizerError::invalid_configuration(
                "initial step size must be positive",
                "initial_step_size",
                self.initial_step_size.to_string(),
            ));
        }
        if self.min_step_size <= T::zero() {
            return Err(OptimizerError::invalid_configuration(
                "minimum step size must be positive",
                "min_step_size",
                self.min_step_size.to_string(),
            ));
        }
        if self.c1 <= T::zero() || self.c1 >= T::one() {
            return Err(OptimizerError::invalid_configuration(
                "Armijo constant must be in (0, 1)",
                "c1",
                self.c1.to_string(),
            ));
        }
        if self.rho <= T::zero() || self.rho >= T::one() {
            return Err(OptimizerError::invalid_configuration(
                "backtracking factor must be in (0, 1)",
                "rho",
                self.rho.to_string(),
            ));
        }
        if self.max_iterations == 0 {
            return Err(OptimizerError::invalid_configuration(
                "at least one trial is required",
                "max_iterations",
                "0",
            ));
        }
        Ok(())
    }
}

/// Pluggable line search strategy supporting both calling conventions.
pub trait LineSearch<T: Scalar>: Debug {
    /// Human-readable name of the strategy.
    fn name(&self) -> &str;

    /// Searches along `direction` from `x`.
    fn search_direction(
        &mut self,
        loss: &dyn LossOracle<T>,
        x: &DVector<T>,
        direction: &DVector<T>,
    ) -> OptimizerResult<LineSearchOutcome<T>>;

    /// Searches on the segment from `x_old` towards `x_proposed`.
    fn search_between(
        &mut self,
        loss: &dyn LossOracle<T>,
        x_old: &DVector<T>,
        x_proposed: &DVector<T>,
    ) -> OptimizerResult<LineSearchOutcome<T>>;
}

/// Backtracking line search enforcing the Armijo condition.
#[derive(Debug, Clone)]
pub struct ArmijoBacktracking<T: Scalar> {
    params: LineSearchParams<T>,
}

impl<T: Scalar> Default for ArmijoBacktracking<T> {
    fn default() -> Self {
        Self {
            params: LineSearchParams::default(),
        }
    }
}

impl<T: Scalar> ArmijoBacktracking<T> {
    /// Creates a backtracking line search with default parameters.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a backtracking line search with custom parameters.
    pub fn with_params(params: LineSearchParams<T>) -> OptimizerResult<Self> {
        params.validate()?;
        Ok(Self { params })
    }

    /// Returns the parameters.
    pub fn params(&self) -> &LineSearchParams<T> {
        &self.params
    }

    fn backtrack(
        &self,
        loss: &dyn LossOracle<T>,
        x: &DVector<T>,
        direction: &DVector<T>,
        initial_step: T,
    ) -> OptimizerResult<LineSearchOutcome<T>> {
        let value0 = loss.value(x)?;
        let slope = loss.gradient(x)?.dot(direction);
        // Zero slope: stationary point or zero direction; x is kept.
        if slope == T::zero() {
            return Ok(LineSearchOutcome {
                point: x.clone(),
                step_size: T::zero(),
                value: value0,
                trials: 0,
            });
        }
        if slope > T::zero() {
            return Err(OptimizerError::line_search_failed(
                "not a descent direction",
                0,
                initial_step.to_f64(),
            ));
        }

        let mut alpha = initial_step;
        for trial in 1..=self.params.max_iterations {
            let candidate = x + direction * alpha;
            let value = loss.value(&candidate)?;
            if value <= value0 + self.params.c1 * alpha * slope {
                return Ok(LineSearchOutcome {
                    point: candidate,
                    step_size: alpha,
                    value,
                    trials: trial,
                });
            }
            alpha *= self.params.rho;
            if alpha < self.params.min_step_size {
                return Err(OptimizerError::line_search_failed(
                    "step size underflow",
                    trial,
                    alpha.to_f64(),
                ));
            }
        }

        Err(OptimizerError::line_search_failed(
            "sufficient decrease not reached",
            self.params.max_iterations,
            alpha.to_f64(),
        ))
    }
}

impl<T: Scalar> LineSearch<T> for ArmijoBacktracking<T> {
    fn name(&self) -> &str {
        "Armijo backtracking"
    }

    fn search_direction(
        &mut self,
        loss: &dyn LossOracle<T>,
        x: &DVector<T>,
        direction: &DVector<T>,
    ) -> OptimizerResult<LineSearchOutcome<T>> {
        self.backtrack(loss, x, direction, self.params.initial_step_size)
    }

    fn search_between(
        &mut self,
        loss: &dyn LossOracle<T>,
        x_old: &DVector<T>,
        x_proposed: &DVector<T>,
    ) -> OptimizerResult<LineSearchOutcome<T>> {
        let direction = x_proposed - x_old;
        self.backtrack(loss, x_old, &direction, T::one())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Result;
    use approx::assert_relative_eq;

    /// f(x) = ‖x‖²
    #[derive(Debug)]
    struct SquaredNorm;

    impl LossOracle<f64> for SquaredNorm {
        fn dim(&self) -> usize {
            2
        }

        fn value(&self, x: &DVector<f64>) -> Result<f64> {
            Ok(x.norm_squared())
        }

        fn gradient(&self, x: &DVector<f64>) -> Result<DVector<f64>> {
            Ok(x * 2.0)
        }

        fn smoothness(&self) -> Result<f64> {
            Ok(2.0)
        }
    }

    #[test]
    fn test_directional_search_halves_until_decrease() {
        let mut ls = ArmijoBacktracking::new();
        let x = DVector::from_vec(vec![1.0, 0.0]);
        let d = DVector::from_vec(vec![-2.0, 0.0]);
        // α = 1 lands on (-1, 0) with the same value; α = 0.5 reaches the minimum.
        let outcome = ls.search_direction(&SquaredNorm, &x, &d).unwrap();
        assert_relative_eq!(outcome.step_size, 0.5);
        assert_relative_eq!(outcome.value, 0.0);
        assert_eq!(outcome.trials, 2);
    }

    #[test]
    fn test_two_point_search_accepts_good_proposal() {
        let mut ls = ArmijoBacktracking::new();
        let x_old = DVector::from_vec(vec![1.0, 1.0]);
        let proposal = DVector::from_vec(vec![0.0, 0.0]);
        let outcome = ls.search_between(&SquaredNorm, &x_old, &proposal).unwrap();
        assert_eq!(outcome.point, proposal);
        assert_relative_eq!(outcome.step_size, 1.0);
    }

    #[test]
    fn test_two_point_search_shrinks_overshooting_proposal() {
        let mut ls = ArmijoBacktracking::new();
        let x_old = DVector::from_vec(vec![1.0, 0.0]);
        let proposal = DVector::from_vec(vec![-3.0, 0.0]);
        let outcome = ls.search_between(&SquaredNorm, &x_old, &proposal).unwrap();
        assert!(outcome.value < 1.0);
        assert!(outcome.step_size < 1.0);
    }

    #[test]
    fn test_ascent_direction_is_rejected() {
        let mut ls = ArmijoBacktracking::new();
        let x = DVector::from_vec(vec![1.0, 0.0]);
        let d = DVector::from_vec(vec![1.0, 0.0]);
        let err = ls.search_direction(&SquaredNorm, &x, &d).unwrap_err();
        assert!(matches!(err, OptimizerError::LineSearchFailed { .. }));
    }

    #[test]
    fn test_stationary_point_keeps_iterate() {
        let mut ls = ArmijoBacktracking::new();
        let origin = DVector::from_vec(vec![0.0, 0.0]);
        let d = DVector::from_vec(vec![-1.0, 0.5]);
        let outcome = ls.search_direction(&SquaredNorm, &origin, &d).unwrap();
        assert_eq!(outcome.point, origin);
        assert_eq!(outcome.step_size, 0.0);
        assert_eq!(outcome.trials, 0);

        let x = DVector::from_vec(vec![1.0, 2.0]);
        let outcome = ls.search_between(&SquaredNorm, &x, &x).unwrap();
        assert_eq!(outcome.point, x);
        assert_relative_eq!(outcome.value, 5.0);
    }

    #[test]
    fn test_params_validation() {
        let params = LineSearchParams::<f64> {
            c1: 1.5,
            ..LineSearchParams::default()
        };
        assert!(ArmijoBacktracking::with_params(params).is_err());

        let params = LineSearchParams::<f64> {
            rho: 0.0,
            ..LineSearchParams::default()
        };
        assert!(params.validate().is_err());
        assert!(LineSearchParams::<f64>::default().validate().is_ok());
    }
}
