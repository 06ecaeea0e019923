//! Loss oracles, line searches and the optimizer run loop.
//!
//! This crate provides the building blocks shared by every optimization
//! algorithm in the workspace: the loss-oracle contract, the reference
//! regularized logistic-regression oracle, line searches, and a generic run
//! loop that drives a pluggable step rule.
//!
//! # Key Concepts
//!
//! - **Loss oracles**: answer value, gradient, Hessian and stochastic-gradient
//!   queries over a fixed dataset, together with smoothness estimates
//! - **Regularizers**: a smooth ℓ₂ term folded into gradients and an ℓ₁ term
//!   handled by a proximal step
//! - **Step rules**: the per-iteration update of an algorithm
//! - **Convergence traces**: checkpoints recorded during a run
//!
//! # Modules
//!
//! - [`data_matrix`]: Design-matrix abstraction
//! - [`error`]: Error types for oracles and optimizers
//! - [`line_search`]: Line search algorithms
//! - [`logistic_regression`]: Regularized logistic-regression oracle
//! - [`loss`]: Loss-oracle interface
//! - [`optimizer`]: Run loop, stopping criteria and results
//! - [`regularizer`]: Elastic-net regularizer and its prox
//! - [`trace`]: Convergence traces
//! - [`types`]: Scalar trait, type aliases and constants

pub mod core;
pub mod losses;
pub mod optimization;

#[cfg(any(test, feature = "test-utils"))]
pub mod utils;

pub use self::core::{data_matrix, error, loss, regularizer, types};
pub use self::losses::logistic_regression;
pub use self::optimization::{line_search, optimizer, trace};

// Re-export commonly used items at the crate root
pub use error::{OptimizerError, OptimizerResult, OracleError, Result};

/// Prelude module for convenient imports.
///
/// # Example
/// ```
/// use optmethods_core::prelude::*;
/// ```
pub mod prelude {
    pub use crate::data_matrix::{CountingMatrix, DataMatrix};
    pub use crate::error::{OptimizerError, OptimizerResult, OracleError, Result};
    pub use crate::line_search::{
        ArmijoBacktracking, LineSearch, LineSearchOutcome, LineSearchParams,
    };
    pub use crate::logistic_regression::LogisticRegression;
    pub use crate::loss::{sample_batch, CountingOracle, LossOracle};
    pub use crate::optimizer::{
        OptimizationResult, Optimizer, RunState, StepRule, StoppingCriterion, TerminationReason,
    };
    pub use crate::regularizer::Regularizer;
    pub use crate::trace::{ConvergenceTrace, TraceCadence, TraceConfig, TraceEntry};
    pub use crate::types::{constants, DMatrix, DVector, Scalar};
}
