//! Test oracles and synthetic datasets.
//!
//! Available under the `test-utils` feature so that downstream crates can
//! exercise their step rules on problems with known structure.

use crate::{
    error::{OracleError, Result},
    loss::LossOracle,
    types::{DMatrix, DVector, Scalar},
};
use num_traits::Float;
use rand::{rngs::StdRng, Rng, SeedableRng};
use rand_distr::{Bernoulli, Distribution, StandardNormal};

/// Quadratic objective `f(x) = ½ xᵗ A x − bᵗ x` with a symmetric `A`.
///
/// `A` may be indefinite, which makes the oracle useful for exercising
/// curvature safeguards.
#[derive(Debug, Clone)]
pub struct QuadraticLoss<T: Scalar> {
    a: DMatrix<T>,
    b: DVector<T>,
    smoothness: T,
}

impl<T: Scalar> QuadraticLoss<T> {
    /// Creates a quadratic from a symmetric matrix and a linear term.
    pub fn new(a: DMatrix<T>, b: DVector<T>) -> Result<Self> {
        if !a.is_square() {
            return Err(OracleError::invalid_parameter("quadratic form must be square"));
        }
        if a.nrows() != b.len() {
            return Err(OracleError::dimension_mismatch(a.nrows(), b.len()));
        }
        if (&a - a.transpose()).amax() > T::SYMMETRY_TOLERANCE {
            return Err(OracleError::invalid_parameter("quadratic form must be symmetric"));
        }
        let smoothness = a
            .clone()
            .symmetric_eigenvalues()
            .iter()
            .fold(T::zero(), |acc, &ev| Float::max(acc, Float::abs(ev)));
        Ok(Self { a, b, smoothness })
    }

    /// `f(x) = ½ Σ dᵢ xᵢ²`.
    pub fn diagonal(diag: &[T]) -> Self {
        let d = DVector::from_column_slice(diag);
        let smoothness = d
            .iter()
            .fold(T::zero(), |acc, &v| Float::max(acc, Float::abs(v)));
        Self {
            a: DMatrix::from_diagonal(&d),
            b: DVector::zeros(diag.len()),
            smoothness,
        }
    }

    /// `f(x) = ½ scale ‖x‖²`; a negative scale gives a concave objective.
    pub fn isotropic(dim: usize, scale: T) -> Self {
        Self::diagonal(&vec![scale; dim])
    }

    /// The matrix `A`.
    pub fn matrix(&self) -> &DMatrix<T> {
        &self.a
    }
}

impl<T: Scalar> LossOracle<T> for QuadraticLoss<T> {
    fn dim(&self) -> usize {
        self.b.len()
    }

    fn value(&self, x: &DVector<T>) -> Result<T> {
        self.check_dimension(x)?;
        let half = <T as Scalar>::from_f64(0.5);
        Ok(half * x.dot(&(&self.a * x)) - self.b.dot(x))
    }

    fn gradient(&self, x: &DVector<T>) -> Result<DVector<T>> {
        self.check_dimension(x)?;
        Ok(&self.a * x - &self.b)
    }

    fn hessian(&self, x: &DVector<T>) -> Result<DMatrix<T>> {
        self.check_dimension(x)?;
        Ok(self.a.clone())
    }

    fn smoothness(&self) -> Result<T> {
        Ok(self.smoothness)
    }
}

/// Gaussian features with labels given by the sign of a hidden hyperplane.
///
/// Returns the `n × dim` design matrix and labels in `{0, 1}`.
pub fn separable_dataset(n: usize, dim: usize, seed: u64) -> (DMatrix<f64>, DVector<f64>) {
    let mut rng = StdRng::seed_from_u64(seed);
    let w: DVector<f64> = DVector::from_fn(dim, |_, _| rng.sample(StandardNormal));
    let a: DMatrix<f64> = DMatrix::from_fn(n, dim, |_, _| rng.sample(StandardNormal));
    let b = (&a * &w).map(|z| if z > 0.0 { 1.0 } else { 0.0 });
    (a, b)
}

/// Same as [`separable_dataset`] with each label flipped with probability
/// `flip_probability`.
pub fn noisy_dataset(
    n: usize,
    dim: usize,
    flip_probability: f64,
    seed: u64,
) -> Result<(DMatrix<f64>, DVector<f64>)> {
    let flip = Bernoulli::new(flip_probability)
        .map_err(|e| OracleError::invalid_parameter(format!("flip probability: {}", e)))?;
    let (a, mut b) = separable_dataset(n, dim, seed);
    let mut rng = StdRng::seed_from_u64(seed.wrapping_add(1));
    for label in b.iter_mut() {
        if flip.sample(&mut rng) {
            *label = 1.0 - *label;
        }
    }
    Ok((a, b))
}

/// Standard normal vector.
pub fn random_point(dim: usize, seed: u64) -> DVector<f64> {
    let mut rng = StdRng::seed_from_u64(seed);
    DVector::from_fn(dim, |_, _| rng.sample(StandardNormal))
}
