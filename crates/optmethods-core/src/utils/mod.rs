//! Utility functions and helper types.

pub mod test_utils;

pub use test_utils::*;
