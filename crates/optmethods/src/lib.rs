//! First-order and quasi-Newton methods for regularized convex optimization.
//!
//! This crate re-exports the loss oracles and run loop of `optmethods-core`
//! together with the step rules of `optmethods-optim`.
//!
//! # Quick Start
//!
//! ```rust
//! use optmethods::prelude::*;
//!
//! # fn main() -> OptimizerResult<()> {
//! let a = DMatrix::from_row_slice(4, 2, &[1.0, 0.5, -1.0, 2.0, 0.3, -0.7, 2.0, 1.0]);
//! let b = DVector::from_vec(vec![1.0, 0.0, 0.0, 1.0]);
//! let loss = LogisticRegression::new(a, b)?.with_regularization(0.0, 0.1)?;
//!
//! let mut optimizer = Optimizer::new(GradientDescent::new(GradientDescentConfig::new()))
//!     .with_stopping_criterion(
//!         StoppingCriterion::new()
//!             .with_max_iterations(1000)
//!             .with_gradient_tolerance(1e-6),
//!     );
//! let result = optimizer.run(&loss, DVector::zeros(2))?;
//! assert!(result.converged);
//! # Ok(())
//! # }
//! ```

pub use optmethods_core as core;
pub use optmethods_optim as optim;

pub use nalgebra;

pub use optmethods_core::{
    data_matrix, error, line_search, logistic_regression, loss, optimizer, regularizer, trace,
    types,
};

#[cfg(feature = "test-utils")]
pub use optmethods_core::utils;

pub use optmethods_optim::{bfgs, gd, ig};

/// Prelude module for convenient imports.
pub mod prelude {
    pub use optmethods_core::prelude::*;
    pub use optmethods_optim::{
        Bfgs, BfgsConfig, GradientDescent, GradientDescentConfig, IncrementalGradient,
        IncrementalGradientConfig,
    };
}
