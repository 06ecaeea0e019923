//! Concrete loss oracles.

pub mod logistic_regression;

pub use logistic_regression::*;
