//! Convergence traces recorded during a run.
//!
//! The run loop records a [`TraceEntry`] at checkpoints chosen by a
//! [`TraceConfig`]: the first few iterations always, then every step, every
//! epoch, or every `k` iterations. The final iterate is always recorded.

use crate::{
    error::{OptimizerError, OptimizerResult},
    types::{DVector, Scalar},
};
use std::time::Duration;

/// How often checkpoints are taken after the first iterations.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum TraceCadence {
    /// After every step
    EveryStep,
    /// Whenever an epoch completes
    EveryEpoch,
    /// Every `k` iterations
    EveryIterations(usize),
}

/// Trace recording options.
#[derive(Debug, Clone)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct TraceConfig {
    /// Checkpoint cadence
    pub cadence: TraceCadence,
    /// Store a copy of the iterate at every checkpoint
    pub store_iterates: bool,
    /// Evaluate the objective at every checkpoint
    pub record_values: bool,
    /// Number of leading iterations that are always recorded
    pub save_first_iterations: usize,
}

impl Default for TraceConfig {
    fn default() -> Self {
        Self {
            cadence: TraceCadence::EveryEpoch,
            store_iterates: false,
            record_values: true,
            save_first_iterations: crate::types::constants::SAVE_FIRST_ITERATIONS,
        }
    }
}

impl TraceConfig {
    /// Creates the default configuration.
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the checkpoint cadence.
    pub fn with_cadence(mut self, cadence: TraceCadence) -> Self {
        self.cadence = cadence;
        self
    }

    /// Enables or disables storing iterates.
    pub fn with_iterates(mut self, store: bool) -> Self {
        self.store_iterates = store;
        self
    }

    /// Enables or disables objective evaluation at checkpoints.
    pub fn with_values(mut self, record: bool) -> Self {
        self.record_values = record;
        self
    }

    /// Sets how many leading iterations are always recorded.
    pub fn with_save_first_iterations(mut self, count: usize) -> Self {
        self.save_first_iterations = count;
        self
    }

    /// Validates the configuration.
    pub fn validate(&self) -> OptimizerResult<()> {
        if self.cadence == TraceCadence::EveryIterations(0) {
            return Err(OptimizerError::invalid_configuration(
                "trace interval must be positive",
                "cadence",
                "EveryIterations(0)",
            ));
        }
        Ok(())
    }

    /// Returns `true` if iteration `it` is a checkpoint.
    pub fn is_checkpoint(&self, it: usize, steps_per_epoch: usize) -> bool {
        if it <= self.save_first_iterations {
            return true;
        }
        match self.cadence {
            TraceCadence::EveryStep => true,
            TraceCadence::EveryEpoch => steps_per_epoch > 0 && it % steps_per_epoch == 0,
            TraceCadence::EveryIterations(k) => k > 0 && it % k == 0,
        }
    }
}

/// One recorded checkpoint.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct TraceEntry<T: Scalar> {
    /// Iteration counter at the checkpoint
    pub iteration: usize,
    /// Finished epochs at the checkpoint
    pub epoch: usize,
    /// Wall-clock time since the run started
    pub elapsed: Duration,
    /// Objective value, if recorded
    pub value: Option<T>,
    /// Norm of the last full gradient, if one is available
    pub gradient_norm: Option<T>,
    /// Copy of the iterate, if requested
    pub point: Option<DVector<T>>,
}

/// Ordered sequence of checkpoints.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct ConvergenceTrace<T: Scalar> {
    entries: Vec<TraceEntry<T>>,
}

impl<T: Scalar> Default for ConvergenceTrace<T> {
    fn default() -> Self {
        Self {
            entries: Vec::new(),
        }
    }
}

impl<T: Scalar> ConvergenceTrace<T> {
    /// Creates an empty trace.
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends a checkpoint.
    pub fn push(&mut self, entry: TraceEntry<T>) {
        self.entries.push(entry);
    }

    /// Removes every checkpoint.
    pub fn clear(&mut self) {
        self.entries.clear();
    }

    /// Number of recorded checkpoints.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// True if nothing was recorded.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Returns the recorded checkpoints in order.
    pub fn entries(&self) -> &[TraceEntry<T>] {
        &self.entries
    }

    /// Returns the last checkpoint.
    pub fn last(&self) -> Option<&TraceEntry<T>> {
        self.entries.last()
    }

    /// Recorded iteration counters.
    pub fn iterations(&self) -> Vec<usize> {
        self.entries.iter().map(|e| e.iteration).collect()
    }

    /// `(iteration, value)` pairs for checkpoints with a recorded value.
    pub fn values(&self) -> Vec<(usize, T)> {
        self.entries
            .iter()
            .filter_map(|e| e.value.map(|v| (e.iteration, v)))
            .collect()
    }

    /// `(iteration, gradient norm)` pairs for checkpoints with a gradient.
    pub fn gradient_norms(&self) -> Vec<(usize, T)> {
        self.entries
            .iter()
            .filter_map(|e| e.gradient_norm.map(|g| (e.iteration, g)))
            .collect()
    }

    /// Stored iterates.
    pub fn iterates(&self) -> Vec<(usize, &DVector<T>)> {
        self.entries
            .iter()
            .filter_map(|e| e.point.as_ref().map(|p| (e.iteration, p)))
            .collect()
    }
}
