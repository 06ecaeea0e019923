//! Elastic-net regularization and its proximal operator.

use crate::types::{DVector, Scalar};
use num_traits::Float;

/// Regularizer `l1·‖x‖₁ + l2/2·‖x‖²`.
///
/// The smooth `l2` part is folded into oracle gradients; the `l1` part is
/// handled exactly through [`Regularizer::prox`].
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Regularizer<T: Scalar> {
    /// Coefficient of the non-smooth ℓ₁ term
    pub l1: T,
    /// Coefficient of the smooth ℓ₂ term
    pub l2: T,
}

impl<T: Scalar> Default for Regularizer<T> {
    fn default() -> Self {
        Self {
            l1: T::zero(),
            l2: T::zero(),
        }
    }
}

impl<T: Scalar> Regularizer<T> {
    /// Creates a regularizer with the given coefficients.
    pub fn new(l1: T, l2: T) -> Self {
        Self { l1, l2 }
    }

    /// Returns `true` if the ℓ₁ term is active, i.e. a proximal step is needed.
    pub fn is_proximal(&self) -> bool {
        self.l1 > T::zero()
    }

    /// Value of the full regularizer at `x`.
    pub fn value(&self, x: &DVector<T>) -> T {
        let half = <T as Scalar>::from_f64(0.5);
        self.l1 * x.lp_norm(1) + self.l2 * half * x.norm_squared()
    }

    /// Proximal operator of `lr · l1·‖·‖₁`: componentwise soft-thresholding.
    pub fn prox(&self, x: &DVector<T>, lr: T) -> DVector<T> {
        let threshold = self.l1 * lr;
        x.map(|xi| soft_threshold(xi, threshold))
    }
}

fn soft_threshold<T: Scalar>(x: T, threshold: T) -> T {
    let shrunk = Float::abs(x) - threshold;
    if shrunk > T::zero() {
        Float::signum(x) * shrunk
    } else {
        T::zero()
    }
}
