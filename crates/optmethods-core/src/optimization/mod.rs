//! Optimization framework: run loop, line searches and traces.

pub mod line_search;
pub mod optimizer;
pub mod trace;

pub use line_search::*;
pub use optimizer::*;
pub use trace::*;
