//! Logistic-regression oracle.
//!
//! Minimizes
//!
//! ```text
//! f(x) = 1/n Σ_i [ (1 - b_i) a_iᵗx - logsig(a_iᵗx) ] + l1‖x‖₁ + l2/2‖x‖²
//! ```
//!
//! with labels `b_i ∈ {0, 1}`. The last product `A x` is kept in an explicit
//! cache cell so that value, gradient and Hessian queries at the same point
//! share one matrix-vector product.

use crate::{
    core::{
        data_matrix::DataMatrix,
        error::{OracleError, Result},
        loss::LossOracle,
        regularizer::Regularizer,
        types::{constants::MAX_SMOOTHNESS_DIM, DMatrix, DVector, Scalar},
    },
};
use num_traits::Float;
use std::cell::RefCell;

/// Numerically stable `log(1 / (1 + exp(-x)))`.
///
/// Piecewise evaluation avoids both overflow of `exp(-x)` for very negative
/// inputs and cancellation in `log1p` for very positive ones.
pub fn logsig<T: Scalar>(x: T) -> T {
    let lo = <T as Scalar>::from_f64(-33.0);
    let mid = <T as Scalar>::from_f64(-18.0);
    let hi = <T as Scalar>::from_f64(37.0);
    if x < lo {
        x
    } else if x < mid {
        x - Float::exp(x)
    } else if x < hi {
        -Float::ln_1p(Float::exp(-x))
    } else {
        -Float::exp(-x)
    }
}

/// Numerically stable logistic sigmoid `1 / (1 + exp(-x))`.
pub fn sigmoid<T: Scalar>(x: T) -> T {
    if x >= T::zero() {
        T::one() / (T::one() + Float::exp(-x))
    } else {
        let e = Float::exp(x);
        e / (T::one() + e)
    }
}

/// Cache cell holding the last argument of `A x` and its product.
#[derive(Debug, Clone)]
struct MatVecCache<T: Scalar> {
    x_last: Option<DVector<T>>,
    product: Option<DVector<T>>,
    hits: usize,
    misses: usize,
}

impl<T: Scalar> Default for MatVecCache<T> {
    fn default() -> Self {
        Self {
            x_last: None,
            product: None,
            hits: 0,
            misses: 0,
        }
    }
}

/// Logistic-regression loss oracle over a data matrix `A` and labels `b`.
#[derive(Debug, Clone)]
pub struct LogisticRegression<T: Scalar, M: DataMatrix<T> = DMatrix<T>> {
    a: M,
    b: DVector<T>,
    regularizer: Regularizer<T>,
    store_mat_vec_prod: bool,
    max_smoothness_dim: usize,
    use_eigen_if_large: bool,
    cache: RefCell<MatVecCache<T>>,
}

impl<T: Scalar, M: DataMatrix<T>> LogisticRegression<T, M> {
    /// Creates an unregularized oracle.
    ///
    /// Labels in `{0, 1}`, `{-1, 1}` or `{1, 2}` are accepted and normalized
    /// to `{0, 1}`.
    ///
    /// # Errors
    ///
    /// Returns `DimensionMismatch` if `b` does not have one entry per row of
    /// `a`, and `InvalidLabels` for any other label set.
    pub fn new(a: M, b: DVector<T>) -> Result<Self> {
        if b.len() != a.n_samples() {
            return Err(OracleError::dimension_mismatch(
                format!("{} labels", a.n_samples()),
                format!("{} labels", b.len()),
            ));
        }
        if a.n_samples() == 0 {
            return Err(OracleError::invalid_parameter("dataset has no samples"));
        }
        let b = normalize_labels(b)?;
        Ok(Self {
            a,
            b,
            regularizer: Regularizer::default(),
            store_mat_vec_prod: true,
            max_smoothness_dim: MAX_SMOOTHNESS_DIM,
            use_eigen_if_large: false,
            cache: RefCell::new(MatVecCache::default()),
        })
    }

    /// Sets the ℓ₁ and ℓ₂ coefficients.
    pub fn with_regularization(mut self, l1: T, l2: T) -> Result<Self> {
        if l1 < T::zero() || l2 < T::zero() {
            return Err(OracleError::invalid_parameter(format!(
                "regularization coefficients must be non-negative, got l1 = {}, l2 = {}",
                l1, l2
            )));
        }
        self.regularizer = Regularizer::new(l1, l2);
        Ok(self)
    }

    /// Enables or disables the matrix-vector product cache.
    pub fn with_mat_vec_cache(mut self, enabled: bool) -> Self {
        self.store_mat_vec_prod = enabled;
        self.reset_cache();
        self
    }

    /// Dimension from which [`LossOracle::smoothness`] falls back to the
    /// average-smoothness estimate.
    pub fn with_max_smoothness_dim(mut self, dim: usize) -> Self {
        self.max_smoothness_dim = dim;
        self
    }

    /// Forces the exact eigenvalue computation regardless of dimension.
    pub fn with_eigen_if_large(mut self, enabled: bool) -> Self {
        self.use_eigen_if_large = enabled;
        self
    }

    /// The data matrix.
    pub fn data(&self) -> &M {
        &self.a
    }

    /// The normalized labels.
    pub fn labels(&self) -> &DVector<T> {
        &self.b
    }

    /// ℓ₁ coefficient.
    pub fn l1(&self) -> T {
        self.regularizer.l1
    }

    /// ℓ₂ coefficient.
    pub fn l2(&self) -> T {
        self.regularizer.l2
    }

    /// Returns `A x`, recomputing only when `x` differs from the cached argument.
    ///
    /// Equality is exact: any change in any coordinate invalidates the cache.
    pub fn mat_vec_product(&self, x: &DVector<T>) -> Result<DVector<T>> {
        self.check_dimension(x)?;
        if !self.store_mat_vec_prod {
            return Ok(self.a.mul_vec(x));
        }

        let mut guard = self.cache.borrow_mut();
        let cache = &mut *guard;
        let valid = cache.x_last.as_ref().is_some_and(|last| last == x);
        if valid {
            if let Some(product) = &cache.product {
                cache.hits += 1;
                return Ok(product.clone());
            }
        }

        cache.misses += 1;
        let product = self.a.mul_vec(x);
        cache.x_last = Some(x.clone());
        cache.product = Some(product.clone());
        Ok(product)
    }

    /// Cache statistics as `(hits, misses)`.
    pub fn cache_stats(&self) -> (usize, usize) {
        let cache = self.cache.borrow();
        (cache.hits, cache.misses)
    }

    /// Clears the cached product and its statistics.
    pub fn reset_cache(&self) {
        *self.cache.borrow_mut() = MatVecCache::default();
    }

    /// Fraction of non-zero entries of `x`.
    pub fn density(&self, x: &DVector<T>) -> f64 {
        if x.is_empty() {
            return 0.0;
        }
        x.iter().filter(|v| **v != T::zero()).count() as f64 / x.len() as f64
    }

    fn n_t(&self) -> T {
        <T as Scalar>::from_usize(self.a.n_samples())
    }
}

impl<T: Scalar, M: DataMatrix<T>> LossOracle<T> for LogisticRegression<T, M> {
    fn dim(&self) -> usize {
        self.a.n_features()
    }

    fn n_samples(&self) -> usize {
        self.a.n_samples()
    }

    fn value(&self, x: &DVector<T>) -> Result<T> {
        let z = self.mat_vec_product(x)?;
        let total = z
            .iter()
            .zip(self.b.iter())
            .fold(T::zero(), |acc, (&zi, &bi)| acc + (T::one() - bi) * zi - logsig(zi));
        let value = total / self.n_t() + self.regularizer.value(x);
        if !Float::is_finite(value) {
            return Err(OracleError::numerical_error(format!(
                "non-finite loss value {}",
                value
            )));
        }
        Ok(value)
    }

    fn gradient(&self, x: &DVector<T>) -> Result<DVector<T>> {
        let z = self.mat_vec_product(x)?;
        let residual = DVector::from_iterator(
            z.len(),
            z.iter().zip(self.b.iter()).map(|(&zi, &bi)| sigmoid(zi) - bi),
        );
        let mut grad = self.a.tr_mul_vec(&residual) / self.n_t();
        grad.axpy(self.regularizer.l2, x, T::one());
        Ok(grad)
    }

    fn hessian(&self, x: &DVector<T>) -> Result<DMatrix<T>> {
        let z = self.mat_vec_product(x)?;
        let weights = z.map(|zi| {
            let s = sigmoid(zi);
            s * (T::one() - s)
        });
        let dim = self.dim();
        Ok(self.a.weighted_gram(&weights) / self.n_t()
            + DMatrix::identity(dim, dim) * self.regularizer.l2)
    }

    fn stochastic_gradient(&self, x: &DVector<T>, idx: &[usize]) -> Result<DVector<T>> {
        self.check_dimension(x)?;
        if idx.is_empty() {
            return Err(OracleError::invalid_parameter("empty sample batch"));
        }
        let n = self.a.n_samples();
        if let Some(&bad) = idx.iter().find(|&&i| i >= n) {
            return Err(OracleError::invalid_parameter(format!(
                "sample index {} out of range for {} samples",
                bad, n
            )));
        }

        let z = self.a.rows_mul_vec(idx, x);
        let residuals: Vec<T> = z
            .iter()
            .zip(idx.iter())
            .map(|(&zi, &i)| sigmoid(zi) - self.b[i])
            .collect();
        let batch = <T as Scalar>::from_usize(idx.len());
        let mut grad = self.a.rows_tr_mul_vec(idx, &residuals) / batch;
        grad.axpy(self.regularizer.l2, x, T::one());
        Ok(grad)
    }

    fn smoothness(&self) -> Result<T> {
        let dim = self.dim();
        if dim < self.max_smoothness_dim || self.use_eigen_if_large {
            let ones = DVector::from_element(self.a.n_samples(), T::one());
            let covariance = self.a.weighted_gram(&ones) / self.n_t();
            let largest = covariance.symmetric_eigenvalues().max();
            Ok(<T as Scalar>::from_f64(0.25) * largest + self.regularizer.l2)
        } else {
            log::warn!(
                "dimension {} is too large for the eigenvalues of the covariance matrix; \
                 returning the average-smoothness estimate (enable use_eigen_if_large to compute anyway)",
                dim
            );
            self.average_smoothness()
        }
    }

    fn max_smoothness(&self) -> Result<T> {
        let max_squared = self.a.row_squared_norms().max();
        Ok(<T as Scalar>::from_f64(0.25) * max_squared + self.regularizer.l2)
    }

    fn average_smoothness(&self) -> Result<T> {
        let mean_squared = self.a.row_squared_norms().mean();
        Ok(<T as Scalar>::from_f64(0.25) * mean_squared + self.regularizer.l2)
    }

    fn regularizer(&self) -> Option<&Regularizer<T>> {
        self.regularizer.is_proximal().then_some(&self.regularizer)
    }
}

fn normalize_labels<T: Scalar>(b: DVector<T>) -> Result<DVector<T>> {
    let two = <T as Scalar>::from_f64(2.0);
    let in_set = |set: &[T]| b.iter().all(|v| set.contains(v));

    if in_set(&[T::zero(), T::one()]) {
        Ok(b)
    } else if in_set(&[-T::one(), T::one()]) {
        Ok(b.map(|v| (v + T::one()) / two))
    } else if in_set(&[T::one(), two]) {
        Ok(b.map(|v| v - T::one()))
    } else {
        Err(OracleError::invalid_labels(
            "expected labels in {0, 1}, {-1, 1} or {1, 2}",
        ))
    }
}
