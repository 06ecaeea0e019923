//! Data-matrix abstraction consumed by finite-sum oracles.
//!
//! Oracles never touch the storage of the design matrix directly; they go
//! through [`DataMatrix`], which exposes only the products they need. The
//! dense `nalgebra` matrix is the provided backend. [`CountingMatrix`]
//! records how many full matrix-vector products were performed, which is
//! how cache behavior is observed in tests.

use crate::types::{DMatrix, DVector, Scalar};
use std::cell::Cell;
use std::fmt::Debug;

/// Linear-algebra primitives over an `n × dim` design matrix `A`.
pub trait DataMatrix<T: Scalar>: Debug {
    /// Number of rows (samples).
    fn n_samples(&self) -> usize;

    /// Number of columns (features).
    fn n_features(&self) -> usize;

    /// Computes `A x`, a vector of length `n_samples`.
    fn mul_vec(&self, x: &DVector<T>) -> DVector<T>;

    /// Computes `A[rows] x`, one entry per requested row.
    fn rows_mul_vec(&self, rows: &[usize], x: &DVector<T>) -> Vec<T>;

    /// Computes `Aᵗ v`, a vector of length `n_features`.
    fn tr_mul_vec(&self, v: &DVector<T>) -> DVector<T>;

    /// Computes `Σ_k weights[k] · a_{rows[k]}`, i.e. `A[rows]ᵗ weights`.
    fn rows_tr_mul_vec(&self, rows: &[usize], weights: &[T]) -> DVector<T>;

    /// Computes `Aᵗ diag(weights) A`.
    fn weighted_gram(&self, weights: &DVector<T>) -> DMatrix<T>;

    /// Squared Euclidean norm of every row.
    fn row_squared_norms(&self) -> DVector<T>;

    /// Fraction of non-zero entries.
    fn density(&self) -> f64;
}

impl<T: Scalar> DataMatrix<T> for DMatrix<T> {
    fn n_samples(&self) -> usize {
        self.nrows()
    }

    fn n_features(&self) -> usize {
        self.ncols()
    }

    fn mul_vec(&self, x: &DVector<T>) -> DVector<T> {
        self * x
    }

    fn rows_mul_vec(&self, rows: &[usize], x: &DVector<T>) -> Vec<T> {
        rows.iter().map(|&i| self.row(i).transpose().dot(x)).collect()
    }

    fn tr_mul_vec(&self, v: &DVector<T>) -> DVector<T> {
        self.tr_mul(v)
    }

    fn rows_tr_mul_vec(&self, rows: &[usize], weights: &[T]) -> DVector<T> {
        let mut out = DVector::zeros(self.ncols());
        for (&i, &w) in rows.iter().zip(weights.iter()) {
            out.axpy(w, &self.row(i).transpose(), T::one());
        }
        out
    }

    fn weighted_gram(&self, weights: &DVector<T>) -> DMatrix<T> {
        let mut weighted = self.clone();
        for (i, &w) in weights.iter().enumerate() {
            weighted.row_mut(i).scale_mut(w);
        }
        self.tr_mul(&weighted)
    }

    fn row_squared_norms(&self) -> DVector<T> {
        DVector::from_iterator(self.nrows(), self.row_iter().map(|row| row.norm_squared()))
    }

    fn density(&self) -> f64 {
        if self.is_empty() {
            return 0.0;
        }
        let nnz = self.iter().filter(|v| **v != T::zero()).count();
        nnz as f64 / self.len() as f64
    }
}

/// Wrapper counting the full products `A x` performed by the inner matrix.
#[derive(Debug, Clone)]
pub struct CountingMatrix<M> {
    inner: M,
    mul_vec_calls: Cell<usize>,
}

impl<M> CountingMatrix<M> {
    /// Wraps a data matrix with a zeroed counter.
    pub fn new(inner: M) -> Self {
        Self {
            inner,
            mul_vec_calls: Cell::new(0),
        }
    }

    /// Number of `mul_vec` calls so far.
    pub fn mul_vec_calls(&self) -> usize {
        self.mul_vec_calls.get()
    }

    /// Resets the counter to zero.
    pub fn reset_count(&self) {
        self.mul_vec_calls.set(0);
    }

    /// Returns the wrapped matrix.
    pub fn inner(&self) -> &M {
        &self.inner
    }
}

impl<T: Scalar, M: DataMatrix<T>> DataMatrix<T> for CountingMatrix<M> {
    fn n_samples(&self) -> usize {
        self.inner.n_samples()
    }

    fn n_features(&self) -> usize {
        self.inner.n_features()
    }

    fn mul_vec(&self, x: &DVector<T>) -> DVector<T> {
        self.mul_vec_calls.set(self.mul_vec_calls.get() + 1);
        self.inner.mul_vec(x)
    }

    fn rows_mul_vec(&self, rows: &[usize], x: &DVector<T>) -> Vec<T> {
        self.inner.rows_mul_vec(rows, x)
    }

    fn tr_mul_vec(&self, v: &DVector<T>) -> DVector<T> {
        self.inner.tr_mul_vec(v)
    }

    fn rows_tr_mul_vec(&self, rows: &[usize], weights: &[T]) -> DVector<T> {
        self.inner.rows_tr_mul_vec(rows, weights)
    }

    fn weighted_gram(&self, weights: &DVector<T>) -> DMatrix<T> {
        self.inner.weighted_gram(weights)
    }

    fn row_squared_norms(&self) -> DVector<T> {
        self.inner.row_squared_norms()
    }

    fn density(&self) -> f64 {
        self.inner.density()
    }
}
