//! Step rules for smooth and composite convex optimization.
//!
//! This crate provides the algorithms driven by the run loop of
//! `optmethods-core`. Each one implements [`StepRule`] and is wrapped in an
//! [`Optimizer`] to run.
//!
//! # Available Step Rules
//!
//! - **Gradient Descent**: full-batch steepest descent with `lr = 1/L` by
//!   default and an optional directional line search
//! - **Incremental Gradient**: cyclic mini-batch gradients with a decaying
//!   step size and an ℓ₁ proximal step
//! - **BFGS**: quasi-Newton method with a dense inverse Hessian estimate
//!
//! # Examples
//!
//! ```rust
//! use optmethods_optim::{Bfgs, BfgsConfig};
//! use optmethods_core::optimizer::{Optimizer, StoppingCriterion};
//!
//! let rule = Bfgs::<f64>::new(BfgsConfig::new().with_smoothness(1.0)).unwrap();
//! let optimizer = Optimizer::new(rule).with_stopping_criterion(
//!     StoppingCriterion::new()
//!         .with_max_iterations(1000)
//!         .with_gradient_tolerance(1e-6),
//! );
//!
//! // Run optimization (loss and x0 defined elsewhere)
//! // let result = optimizer.run(&loss, x0)?;
//! # let _ = optimizer;
//! ```

pub mod bfgs;
pub mod gd;
pub mod ig;

// Re-export main step rules for convenience
pub use bfgs::{Bfgs, BfgsConfig};
pub use gd::{GradientDescent, GradientDescentConfig};
pub use ig::{IncrementalGradient, IncrementalGradientConfig};

// Re-export commonly used items from core
pub use optmethods_core::optimizer::{Optimizer, StepRule};
