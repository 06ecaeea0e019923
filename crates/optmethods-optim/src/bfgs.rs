//! Broyden–Fletcher–Goldfarb–Shanno quasi-Newton method.
//!
//! BFGS keeps a dense estimate `H ≈ ∇²f(x)⁻¹` and moves along the
//! preconditioned direction `d = −H ∇f(x)`. After each step the curvature
//! pair
//!
//! ```text
//! s = x_{k+1} − x_k,    y = ∇f(x_{k+1}) − ∇f(x_k)
//! ```
//!
//! updates the estimate with the inverse BFGS formula
//!
//! ```text
//! H ← H + (sᵗy + yᵗHy)(s sᵗ)/(sᵗy)² − (H y sᵗ + s yᵗH)/(sᵗy)
//! ```
//!
//! The update is only applied when the curvature condition `yᵗs > 0` holds;
//! otherwise it is skipped and the previous positive-definite estimate is
//! kept.
//!
//! # Initial Estimate
//!
//! Either a smoothness bound `L` (giving `H₀ = I/L`) or an initial Hessian
//! estimate `B₀` (giving `H₀ = B₀⁺`) must be provided. The forward estimate
//! `B` can additionally be tracked with the rank-2 update
//! `B ← B + yyᵗ/(yᵗs) − (Bs)(Bs)ᵗ/(sᵗBs)`.
//!
//! ## References
//!
//! - Nocedal & Wright, "Numerical Optimization", Chapter 6

use log::warn;
use num_traits::Float;
use optmethods_core::{
    error::{OptimizerError, OptimizerResult},
    line_search::LineSearch,
    loss::LossOracle,
    optimizer::{RunState, StepRule},
    types::{constants::PSEUDO_INVERSE_EPS, DMatrix, DVector, Scalar},
};

/// Configuration for BFGS.
#[derive(Debug, Clone)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct BfgsConfig<T>
where
    T: Scalar,
{
    /// Upper bound `L` on the smoothness constant
    pub smoothness: Option<T>,

    /// Initial Hessian estimate `B₀`; takes precedence over `smoothness`
    pub hess_estimate: Option<DMatrix<T>>,

    /// Step length along the preconditioned direction
    pub lr: T,

    /// Also track the forward Hessian estimate `B`
    pub store_hess_estimate: bool,
}

impl<T> Default for BfgsConfig<T>
where
    T: Scalar,
{
    fn default() -> Self {
        Self {
            smoothness: None,
            hess_estimate: None,
            lr: T::one(),
            store_hess_estimate: false,
        }
    }
}

impl<T> BfgsConfig<T>
where
    T: Scalar,
{
    /// Creates a configuration without a curvature scale.
    ///
    /// Set one with [`BfgsConfig::with_smoothness`] or
    /// [`BfgsConfig::with_hess_estimate`] before use.
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the smoothness bound `L`.
    pub fn with_smoothness(mut self, smoothness: T) -> Self {
        self.smoothness = Some(smoothness);
        self
    }

    /// Sets the initial Hessian estimate.
    pub fn with_hess_estimate(mut self, hess_estimate: DMatrix<T>) -> Self {
        self.hess_estimate = Some(hess_estimate);
        self
    }

    /// Sets the step length.
    pub fn with_learning_rate(mut self, lr: T) -> Self {
        self.lr = lr;
        self
    }

    /// Tracks the forward Hessian estimate.
    pub fn with_store_hess_estimate(mut self, store: bool) -> Self {
        self.store_hess_estimate = store;
        self
    }

    /// Validates the configuration.
    ///
    /// # Errors
    ///
    /// Returns `InvalidConfiguration` if neither a smoothness bound nor a
    /// Hessian estimate is set, if the bound is not positive, if the estimate
    /// is not square, or if the step length is not positive.
    pub fn validate(&self) -> OptimizerResult<()> {
        match (&self.hess_estimate, self.smoothness) {
            (None, None) => {
                return Err(OptimizerError::invalid_configuration(
                    "either a smoothness bound or an initial Hessian estimate is required",
                    "smoothness",
                    "none",
                ))
            }
            (Some(h), _) if !h.is_square() => {
                return Err(OptimizerError::invalid_configuration(
                    "Hessian estimate must be square",
                    "hess_estimate",
                    format!("{}x{}", h.nrows(), h.ncols()),
                ))
            }
            (None, Some(l)) if !(l > T::zero() && Float::is_finite(l)) => {
                return Err(OptimizerError::invalid_configuration(
                    "smoothness bound must be positive and finite",
                    "smoothness",
                    l.to_string(),
                ))
            }
            _ => {}
        }
        if !(self.lr > T::zero() && Float::is_finite(self.lr)) {
            return Err(OptimizerError::invalid_configuration(
                "learning rate must be positive and finite",
                "lr",
                self.lr.to_string(),
            ));
        }
        Ok(())
    }
}

/// BFGS step rule.
#[derive(Debug)]
pub struct Bfgs<T>
where
    T: Scalar,
{
    config: BfgsConfig<T>,
    line_search: Option<Box<dyn LineSearch<T>>>,
    /// Inverse Hessian estimate `H`
    b_inv: Option<DMatrix<T>>,
    /// Forward Hessian estimate `B`, when tracked
    b: Option<DMatrix<T>>,
    /// Inverse updates skipped because `yᵗs ≤ 0`
    skipped_updates: usize,
}

impl<T> Bfgs<T>
where
    T: Scalar,
{
    /// Creates a new BFGS step rule.
    ///
    /// # Errors
    ///
    /// Returns `InvalidConfiguration` if the configuration is invalid, in
    /// particular if no curvature scale is given.
    pub fn new(config: BfgsConfig<T>) -> OptimizerResult<Self> {
        config.validate()?;
        Ok(Self {
            config,
            line_search: None,
            b_inv: None,
            b: None,
            skipped_updates: 0,
        })
    }

    /// Attaches a two-point line search refining each proposal.
    pub fn with_line_search<L>(mut self, line_search: L) -> Self
    where
        L: LineSearch<T> + 'static,
    {
        self.line_search = Some(Box::new(line_search));
        self
    }

    /// Returns the configuration.
    pub fn config(&self) -> &BfgsConfig<T> {
        &self.config
    }

    /// Current inverse Hessian estimate.
    pub fn inverse_hessian(&self) -> Option<&DMatrix<T>> {
        self.b_inv.as_ref()
    }

    /// Current forward Hessian estimate, if tracked.
    pub fn hessian_estimate(&self) -> Option<&DMatrix<T>> {
        self.b.as_ref()
    }

    /// Number of inverse updates skipped in the current run.
    pub fn skipped_updates(&self) -> usize {
        self.skipped_updates
    }

    fn initial_estimates(&self, dim: usize) -> OptimizerResult<(DMatrix<T>, Option<DMatrix<T>>)> {
        if let Some(h) = &self.config.hess_estimate {
            if h.nrows() != dim {
                return Err(OptimizerError::invalid_configuration(
                    format!("Hessian estimate must be {}x{}", dim, dim),
                    "hess_estimate",
                    format!("{}x{}", h.nrows(), h.ncols()),
                ));
            }
            let pinv = h
                .clone()
                .pseudo_inverse(<T as Scalar>::from_f64(PSEUDO_INVERSE_EPS))
                .map_err(|e| {
                    OptimizerError::invalid_configuration(
                        "Hessian estimate cannot be pseudo-inverted",
                        "hess_estimate",
                        e,
                    )
                })?;
            let half = <T as Scalar>::from_f64(0.5);
            let b_inv = (&pinv + pinv.transpose()) * half;
            let b = self.config.store_hess_estimate.then(|| h.clone());
            return Ok((b_inv, b));
        }

        let l = self.config.smoothness.ok_or_else(|| {
            OptimizerError::invalid_configuration(
                "either a smoothness bound or an initial Hessian estimate is required",
                "smoothness",
                "none",
            )
        })?;
        let b_inv = DMatrix::identity(dim, dim) / l;
        let b = self
            .config
            .store_hess_estimate
            .then(|| DMatrix::identity(dim, dim) * l);
        Ok((b_inv, b))
    }
}

impl<T> StepRule<T> for Bfgs<T>
where
    T: Scalar,
{
    fn name(&self) -> &str {
        "BFGS"
    }

    fn init_run(&mut self, loss: &dyn LossOracle<T>, state: &mut RunState<T>) -> OptimizerResult<()> {
        self.config.validate()?;
        let (b_inv, b) = self.initial_estimates(loss.dim())?;
        self.b_inv = Some(b_inv);
        self.b = b;
        self.skipped_updates = 0;
        state.grad = Some(loss.gradient(&state.x)?);
        Ok(())
    }

    fn step(&mut self, loss: &dyn LossOracle<T>, state: &mut RunState<T>) -> OptimizerResult<()> {
        let b_inv = self.b_inv.as_mut().ok_or_else(|| {
            OptimizerError::invalid_configuration(
                "inverse Hessian not initialized; init_run was not called",
                "b_inv",
                "unresolved",
            )
        })?;
        let grad = match &state.grad {
            Some(grad) => grad.clone(),
            None => loss.gradient(&state.x)?,
        };

        let direction = preconditioned_direction(b_inv, &grad);
        let proposal = &state.x + direction * self.config.lr;
        let x_new = match self.line_search.as_mut() {
            Some(line_search) => line_search.search_between(loss, &state.x, &proposal)?.point,
            None => proposal,
        };

        let grad_new = loss.gradient(&x_new)?;
        let s = &x_new - &state.x;
        let y = &grad_new - &grad;
        let y_s = y.dot(&s);

        if let Some(b) = self.b.as_mut() {
            let b_s = &*b * &s;
            let s_b_s = s.dot(&b_s);
            if y_s == T::zero() || s_b_s == T::zero() {
                return Err(OptimizerError::numerical_error(
                    state.it,
                    format!(
                        "degenerate curvature pair in Hessian estimate update (yᵗs = {}, sᵗBs = {})",
                        y_s, s_b_s
                    ),
                ));
            }
            *b += &y * y.transpose() / y_s - &b_s * b_s.transpose() / s_b_s;
        }

        if y_s > T::zero() {
            let b_inv_y = &*b_inv * &y;
            let y_b_inv_y = y.dot(&b_inv_y);
            let ss_coef = (y_s + y_b_inv_y) / (y_s * y_s);
            *b_inv += &s * s.transpose() * ss_coef
                - (&b_inv_y * s.transpose() + &s * b_inv_y.transpose()) / y_s;
        } else {
            self.skipped_updates += 1;
            warn!(
                "[BFGS] curvature condition failed at iteration {} (yᵗs = {}), keeping inverse Hessian estimate",
                state.it, y_s
            );
        }

        state.x = x_new;
        state.grad = Some(grad_new);
        Ok(())
    }
}

/// Direction `−H g` for a given inverse Hessian estimate.
pub fn preconditioned_direction<T: Scalar>(b_inv: &DMatrix<T>, grad: &DVector<T>) -> DVector<T> {
    -(b_inv * grad)
}
