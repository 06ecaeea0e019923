//! Core traits and types for loss oracles.

pub mod data_matrix;
pub mod error;
pub mod loss;
pub mod regularizer;
pub mod types;

// Re-export core types
pub use data_matrix::*;
pub use error::*;
pub use loss::*;
pub use regularizer::*;
pub use types::*;
