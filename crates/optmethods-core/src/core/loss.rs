//! Loss-oracle interface for optimization algorithms.
//!
//! A loss oracle wraps a fixed dataset and answers value, gradient, Hessian
//! and stochastic-gradient queries together with smoothness estimates. Every
//! step rule talks to its objective only through [`LossOracle`], so any
//! oracle satisfying the contract is interchangeable.
//!
//! Oracles are immutable apart from internal caches. A cache is single-writer
//! state: an oracle instance must not be shared between concurrent runs.

use crate::{
    error::{OracleError, Result},
    regularizer::Regularizer,
    types::{DMatrix, DVector, Scalar},
};
use rand::RngCore;
use std::cell::Cell;
use std::fmt::Debug;

/// Trait for loss oracles over a fixed dataset.
pub trait LossOracle<T: Scalar>: Debug {
    /// Dimension of the decision variable.
    fn dim(&self) -> usize;

    /// Number of summands for finite-sum objectives (1 otherwise).
    fn n_samples(&self) -> usize {
        1
    }

    /// Regularized objective at `x`.
    fn value(&self, x: &DVector<T>) -> Result<T>;

    /// Full gradient at `x`, including the ℓ₂ term.
    ///
    /// The ℓ₁ term, if any, is left to [`LossOracle::regularizer`].
    fn gradient(&self, x: &DVector<T>) -> Result<DVector<T>>;

    /// Full dense Hessian at `x`.
    ///
    /// # Default Implementation
    ///
    /// Returns `NotImplemented`. Override for second-order methods.
    fn hessian(&self, _x: &DVector<T>) -> Result<DMatrix<T>> {
        Err(OracleError::not_implemented("hessian"))
    }

    /// Gradient restricted to the samples `idx`, averaged over `idx.len()`.
    ///
    /// # Default Implementation
    ///
    /// Returns `NotImplemented`: only finite-sum oracles can answer it.
    fn stochastic_gradient(&self, _x: &DVector<T>, _idx: &[usize]) -> Result<DVector<T>> {
        Err(OracleError::not_implemented("stochastic_gradient"))
    }

    /// Upper bound on the Lipschitz constant of the gradient.
    fn smoothness(&self) -> Result<T>;

    /// Smoothness bound of the worst single summand.
    fn max_smoothness(&self) -> Result<T> {
        self.smoothness()
    }

    /// Mean smoothness bound over the summands.
    fn average_smoothness(&self) -> Result<T> {
        self.smoothness()
    }

    /// Smoothness of mini-batch stochastic gradients drawn without replacement.
    ///
    /// # Default Implementation
    ///
    /// Interpolates between [`LossOracle::max_smoothness`] at `batch_size = 1`
    /// and [`LossOracle::smoothness`] at `batch_size = n`.
    fn batch_smoothness(&self, batch_size: usize) -> Result<T> {
        let n = self.n_samples();
        if batch_size == 0 || batch_size > n {
            return Err(OracleError::invalid_parameter(format!(
                "batch size {} must lie in [1, {}]",
                batch_size, n
            )));
        }
        let l_max = self.max_smoothness()?;
        if n == 1 {
            return Ok(l_max);
        }
        let l = self.smoothness()?;
        let n_t = <T as Scalar>::from_usize(n);
        let b_t = <T as Scalar>::from_usize(batch_size);
        let denom = b_t * (n_t - T::one());
        Ok(n_t * (b_t - T::one()) / denom * l + (n_t - b_t) / denom * l_max)
    }

    /// Proximal (non-smooth) part of the objective, if any.
    fn regularizer(&self) -> Option<&Regularizer<T>> {
        None
    }

    /// Norm used by convergence checks.
    fn norm(&self, x: &DVector<T>) -> T {
        x.norm()
    }

    /// Verifies that `x` has the oracle's dimension.
    fn check_dimension(&self, x: &DVector<T>) -> Result<()> {
        if x.len() != self.dim() {
            return Err(OracleError::dimension_mismatch(self.dim(), x.len()));
        }
        Ok(())
    }
}

/// Oracle adapter counting the evaluations forwarded to the wrapped oracle.
///
/// The run loop wraps the caller's oracle in one of these to report
/// evaluation counts in its result.
#[derive(Debug)]
pub struct CountingOracle<'a, T: Scalar> {
    inner: &'a dyn LossOracle<T>,
    value_calls: Cell<usize>,
    gradient_calls: Cell<usize>,
    stochastic_gradient_calls: Cell<usize>,
    hessian_calls: Cell<usize>,
}

impl<'a, T: Scalar> CountingOracle<'a, T> {
    /// Wraps `inner` with zeroed counters.
    pub fn new(inner: &'a dyn LossOracle<T>) -> Self {
        Self {
            inner,
            value_calls: Cell::new(0),
            gradient_calls: Cell::new(0),
            stochastic_gradient_calls: Cell::new(0),
            hessian_calls: Cell::new(0),
        }
    }

    /// Number of `value` calls.
    pub fn value_calls(&self) -> usize {
        self.value_calls.get()
    }

    /// Number of full `gradient` calls.
    pub fn gradient_calls(&self) -> usize {
        self.gradient_calls.get()
    }

    /// Number of `stochastic_gradient` calls.
    pub fn stochastic_gradient_calls(&self) -> usize {
        self.stochastic_gradient_calls.get()
    }

    /// Number of `hessian` calls.
    pub fn hessian_calls(&self) -> usize {
        self.hessian_calls.get()
    }

    fn bump(counter: &Cell<usize>) {
        counter.set(counter.get() + 1);
    }
}

impl<T: Scalar> LossOracle<T> for CountingOracle<'_, T> {
    fn dim(&self) -> usize {
        self.inner.dim()
    }

    fn n_samples(&self) -> usize {
        self.inner.n_samples()
    }

    fn value(&self, x: &DVector<T>) -> Result<T> {
        Self::bump(&self.value_calls);
        self.inner.value(x)
    }

    fn gradient(&self, x: &DVector<T>) -> Result<DVector<T>> {
        Self::bump(&self.gradient_calls);
        self.inner.gradient(x)
    }

    fn hessian(&self, x: &DVector<T>) -> Result<DMatrix<T>> {
        Self::bump(&self.hessian_calls);
        self.inner.hessian(x)
    }

    fn stochastic_gradient(&self, x: &DVector<T>, idx: &[usize]) -> Result<DVector<T>> {
        Self::bump(&self.stochastic_gradient_calls);
        self.inner.stochastic_gradient(x, idx)
    }

    fn smoothness(&self) -> Result<T> {
        self.inner.smoothness()
    }

    fn max_smoothness(&self) -> Result<T> {
        self.inner.max_smoothness()
    }

    fn average_smoothness(&self) -> Result<T> {
        self.inner.average_smoothness()
    }

    fn batch_smoothness(&self, batch_size: usize) -> Result<T> {
        self.inner.batch_smoothness(batch_size)
    }

    fn regularizer(&self) -> Option<&Regularizer<T>> {
        self.inner.regularizer()
    }

    fn norm(&self, x: &DVector<T>) -> T {
        self.inner.norm(x)
    }
}

/// Draws `batch_size` sample indices out of `n`.
///
/// Without replacement the indices are distinct; `batch_size` must then not
/// exceed `n`.
pub fn sample_batch(
    rng: &mut dyn RngCore,
    n: usize,
    batch_size: usize,
    replace: bool,
) -> Result<Vec<usize>> {
    use rand::Rng;

    if n == 0 {
        return Err(OracleError::invalid_parameter("cannot sample from an empty dataset"));
    }
    if replace {
        Ok((0..batch_size).map(|_| rng.gen_range(0..n)).collect())
    } else if batch_size > n {
        Err(OracleError::invalid_parameter(format!(
            "cannot draw {} distinct samples out of {}",
            batch_size, n
        )))
    } else {
        Ok(rand::seq::index::sample(rng, n, batch_size).into_vec())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::{rngs::StdRng, SeedableRng};
    use std::collections::HashSet;

    #[derive(Debug)]
    struct ScaledNorm {
        dim: usize,
    }

    impl LossOracle<f64> for ScaledNorm {
        fn dim(&self) -> usize {
            self.dim
        }

        fn n_samples(&self) -> usize {
            4
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

        fn max_smoothness(&self) -> Result<f64> {
            Ok(8.0)
        }
    }

    #[test]
    fn test_defaults() {
        let loss = ScaledNorm { dim: 3 };
        let x = DVector::from_vec(vec![1.0, 2.0, 3.0]);
        assert!(matches!(loss.hessian(&x), Err(OracleError::NotImplemented { .. })));
        assert!(matches!(
            loss.stochastic_gradient(&x, &[0]),
            Err(OracleError::NotImplemented { .. })
        ));
        assert!(loss.regularizer().is_none());
        assert!(loss.check_dimension(&x).is_ok());
        assert!(matches!(
            loss.check_dimension(&DVector::zeros(2)),
            Err(OracleError::DimensionMismatch { .. })
        ));
    }

    #[test]
    fn test_batch_smoothness_interpolates() {
        let loss = ScaledNorm { dim: 1 };
        assert_eq!(loss.batch_smoothness(1).unwrap(), 8.0);
        assert_eq!(loss.batch_smoothness(4).unwrap(), 2.0);
        let mid = loss.batch_smoothness(2).unwrap();
        assert!(mid > 2.0 && mid < 8.0);
        assert!(loss.batch_smoothness(0).is_err());
        assert!(loss.batch_smoothness(5).is_err());
    }

    #[test]
    fn test_sample_batch_without_replacement_is_distinct() {
        let mut rng = StdRng::seed_from_u64(42);
        let idx = sample_batch(&mut rng, 10, 10, false).unwrap();
        let unique: HashSet<_> = idx.iter().copied().collect();
        assert_eq!(unique.len(), 10);
        assert!(sample_batch(&mut rng, 3, 4, false).is_err());
    }

    #[test]
    fn test_sample_batch_with_replacement_stays_in_range() {
        let mut rng = StdRng::seed_from_u64(7);
        let idx = sample_batch(&mut rng, 3, 50, true).unwrap();
        assert_eq!(idx.len(), 50);
        assert!(idx.iter().all(|&i| i < 3));
    }

    #[test]
    fn test_counting_oracle_forwards_and_counts() {
        let loss = ScaledNorm { dim: 2 };
        let counted = CountingOracle::new(&loss);
        let x = DVector::from_vec(vec![1.0, 1.0]);
        assert_eq!(counted.value(&x).unwrap(), 2.0);
        let _ = counted.gradient(&x).unwrap();
        let _ = counted.gradient(&x).unwrap();
        assert!(counted.hessian(&x).is_err());
        assert_eq!(counted.value_calls(), 1);
        assert_eq!(counted.gradient_calls(), 2);
        assert_eq!(counted.hessian_calls(), 1);
        assert_eq!(counted.stochastic_gradient_calls(), 0);
        assert_eq!(counted.batch_smoothness(1).unwrap(), 8.0);
    }
}
