//! Generic run loop shared by every step rule.
//!
//! An [`Optimizer`] owns the iterate, the run counters and the convergence
//! trace. The per-iteration update is delegated to a [`StepRule`], so gradient
//! descent, incremental gradient and BFGS all run through the same loop:
//!
//! 1. **Initialization**: validate the configuration, check `x₀` against the
//!    oracle dimension, reset counters, let the rule resolve its defaults
//! 2. **Step**: the rule advances `x` by exactly one iteration
//! 3. **Bookkeeping**: increment `it`, derive `finished_epochs`, record a
//!    checkpoint when due
//! 4. **Termination**: checked after every step
//!
//! Rules that only make sense at epoch granularity report it through
//! [`StepRule::finishes_epochs`]; the iteration and time budgets then wait for
//! the current epoch to complete.
//!
//! # Examples
//!
//! ```rust,ignore
//! let criterion = StoppingCriterion::new()
//!     .with_gradient_tolerance(1e-6)
//!     .with_max_iterations(5000);
//! let mut optimizer = Optimizer::new(GradientDescent::new(GradientDescentConfig::new()))
//!     .with_stopping_criterion(criterion);
//! let result = optimizer.run(&loss, DVector::zeros(loss.dim()))?;
//! println!("{:?} after {} iterations", result.termination_reason, result.iterations);
//! ```

use crate::{
    error::{OptimizerError, OptimizerResult},
    loss::{CountingOracle, LossOracle},
    optimization::trace::{ConvergenceTrace, TraceConfig, TraceEntry},
    types::{DVector, Scalar},
};
use log::{debug, info};
use num_traits::Float;
use std::fmt::Debug;
use std::time::{Duration, Instant};

/// Summary of a finished run.
#[derive(Debug, Clone)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct OptimizationResult<T: Scalar> {
    /// Final iterate
    pub point: DVector<T>,

    /// Objective value at the final iterate
    pub value: T,

    /// Norm of the full gradient at the final iterate
    pub gradient_norm: Option<T>,

    /// Number of completed steps
    pub iterations: usize,

    /// Number of completed epochs
    pub finished_epochs: usize,

    /// Objective evaluations, checkpoints included
    pub function_evaluations: usize,

    /// Full gradient evaluations
    pub gradient_evaluations: usize,

    /// Stochastic gradient evaluations
    pub stochastic_gradient_evaluations: usize,

    /// Wall-clock time of the run
    pub duration: Duration,

    /// Condition that stopped the run
    pub termination_reason: TerminationReason,

    /// True if the gradient tolerance was met
    pub converged: bool,
}

impl<T: Scalar> OptimizationResult<T> {
    /// Creates a new optimization result.
    pub fn new(
        point: DVector<T>,
        value: T,
        iterations: usize,
        duration: Duration,
        termination_reason: TerminationReason,
    ) -> Self {
        Self {
            point,
            value,
            gradient_norm: None,
            iterations,
            finished_epochs: 0,
            function_evaluations: 0,
            gradient_evaluations: 0,
            stochastic_gradient_evaluations: 0,
            duration,
            termination_reason,
            converged: termination_reason == TerminationReason::Converged,
        }
    }

    /// Sets the gradient norm at the final point.
    pub fn with_gradient_norm(mut self, norm: T) -> Self {
        self.gradient_norm = Some(norm);
        self
    }

    /// Sets the number of finished epochs.
    pub fn with_finished_epochs(mut self, epochs: usize) -> Self {
        self.finished_epochs = epochs;
        self
    }

    /// Copies the evaluation counts of a counting oracle.
    pub fn with_evaluations(mut self, counts: &CountingOracle<'_, T>) -> Self {
        self.function_evaluations = counts.value_calls();
        self.gradient_evaluations = counts.gradient_calls();
        self.stochastic_gradient_evaluations = counts.stochastic_gradient_calls();
        self
    }
}

/// Reasons for a run to stop.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum TerminationReason {
    /// Gradient norm fell below the tolerance
    Converged,
    /// Iteration budget exhausted
    MaxIterations,
    /// Epoch budget exhausted
    MaxEpochs,
    /// Wall-clock budget exhausted
    MaxTime,
}

/// Termination conditions of a run.
///
/// Every configured condition is checked after each step; the first one that
/// holds stops the run. At least one condition must be set.
#[derive(Debug, Clone)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct StoppingCriterion<T: Scalar> {
    /// Maximum number of steps
    pub max_iterations: Option<usize>,

    /// Maximum number of full passes over the data
    pub max_epochs: Option<usize>,

    /// Maximum wall-clock time, checked between steps
    pub max_time: Option<Duration>,

    /// Stop when the gradient norm drops below this value
    pub gradient_tolerance: Option<T>,
}

impl<T: Scalar> Default for StoppingCriterion<T> {
    fn default() -> Self {
        Self {
            max_iterations: Some(1000),
            max_epochs: None,
            max_time: None,
            gradient_tolerance: None,
        }
    }
}

impl<T: Scalar> StoppingCriterion<T> {
    /// Creates a new stopping criterion with default values.
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the maximum number of iterations.
    pub fn with_max_iterations(mut self, max_iter: usize) -> Self {
        self.max_iterations = Some(max_iter);
        self
    }

    /// Removes the iteration budget.
    pub fn without_max_iterations(mut self) -> Self {
        self.max_iterations = None;
        self
    }

    /// Sets the maximum number of epochs.
    pub fn with_max_epochs(mut self, max_epochs: usize) -> Self {
        self.max_epochs = Some(max_epochs);
        self
    }

    /// Sets the maximum optimization time.
    pub fn with_max_time(mut self, max_time: Duration) -> Self {
        self.max_time = Some(max_time);
        self
    }

    /// Sets the gradient tolerance.
    pub fn with_gradient_tolerance(mut self, tol: T) -> Self {
        self.gradient_tolerance = Some(tol);
        self
    }

    /// Validates the criterion.
    ///
    /// # Errors
    ///
    /// Returns `InvalidConfiguration` if no condition is set, if a budget is
    /// zero, or if the tolerance is not a positive finite number.
    pub fn validate(&self) -> OptimizerResult<()> {
        if self.max_iterations.is_none()
            && self.max_epochs.is_none()
            && self.max_time.is_none()
            && self.gradient_tolerance.is_none()
        {
            return Err(OptimizerError::invalid_configuration(
                "at least one termination condition is required",
                "stopping_criterion",
                "none",
            ));
        }
        if self.max_iterations == Some(0) {
            return Err(OptimizerError::invalid_configuration(
                "iteration budget must be positive",
                "max_iterations",
                "0",
            ));
        }
        if self.max_epochs == Some(0) {
            return Err(OptimizerError::invalid_configuration(
                "epoch budget must be positive",
                "max_epochs",
                "0",
            ));
        }
        if let Some(tol) = self.gradient_tolerance {
            if !(tol > T::zero() && Float::is_finite(tol)) {
                return Err(OptimizerError::invalid_configuration(
                    "gradient tolerance must be positive and finite",
                    "gradient_tolerance",
                    tol.to_string(),
                ));
            }
        }
        Ok(())
    }
}

/// Per-run state owned by the optimizer and advanced by the step rule.
#[derive(Debug, Clone)]
pub struct RunState<T: Scalar> {
    /// Current iterate
    pub x: DVector<T>,

    /// Full gradient at `x`, when the step rule keeps one
    ///
    /// Rules setting it must refresh it whenever they move `x`; the trace and
    /// the gradient tolerance read it as `∇f(x)`.
    pub grad: Option<DVector<T>>,

    /// Number of completed steps
    pub it: usize,

    /// `it / steps_per_epoch`
    pub finished_epochs: usize,

    /// Steps forming one full pass over the data
    pub steps_per_epoch: usize,

    /// Epoch budget of the run, for rules whose defaults depend on it
    pub epoch_budget: Option<usize>,

    /// True if the oracle exposes a proximal regularizer
    pub use_prox: bool,
}

impl<T: Scalar> RunState<T> {
    /// Fresh state at iteration zero.
    pub fn new(x0: DVector<T>, use_prox: bool, epoch_budget: Option<usize>) -> Self {
        Self {
            x: x0,
            grad: None,
            it: 0,
            finished_epochs: 0,
            steps_per_epoch: 1,
            epoch_budget,
            use_prox,
        }
    }

    /// True if the step about to run is the last one of its epoch.
    pub fn is_epoch_end(&self) -> bool {
        self.it % self.steps_per_epoch == self.steps_per_epoch - 1
    }

    /// True if the completed steps form whole epochs.
    pub fn at_epoch_boundary(&self) -> bool {
        self.it % self.steps_per_epoch == 0
    }
}

/// Per-iteration update of an optimization algorithm.
///
/// The optimizer calls [`StepRule::init_run`] once after resetting the run
/// state and then [`StepRule::step`] repeatedly. The optimizer increments the
/// iteration counter; a rule only advances `x` and its own auxiliary state.
pub trait StepRule<T: Scalar>: Debug {
    /// Returns the algorithm name.
    fn name(&self) -> &str;

    /// Resolves defaults that depend on the oracle.
    ///
    /// Rules processing the data in several steps per epoch set
    /// `state.steps_per_epoch` here.
    fn init_run(&mut self, loss: &dyn LossOracle<T>, state: &mut RunState<T>)
        -> OptimizerResult<()>;

    /// Advances `state.x` by exactly one iteration.
    fn step(&mut self, loss: &dyn LossOracle<T>, state: &mut RunState<T>) -> OptimizerResult<()>;

    /// Returns `true` if iteration and time budgets must wait for the end of
    /// the current epoch.
    fn finishes_epochs(&self) -> bool {
        false
    }

    /// Returns `true` if `state.grad` holds a full gradient after each step.
    ///
    /// Rules returning `false` are checked against the gradient tolerance at
    /// epoch boundaries with a freshly computed full gradient.
    fn uses_full_gradient(&self) -> bool {
        true
    }
}

/// Run loop driving a step rule.
#[derive(Debug)]
pub struct Optimizer<T: Scalar, R: StepRule<T>> {
    rule: R,
    stopping: StoppingCriterion<T>,
    trace_config: TraceConfig,
    trace: ConvergenceTrace<T>,
    state: Option<RunState<T>>,
    started: Option<Instant>,
}

impl<T: Scalar, R: StepRule<T>> Optimizer<T, R> {
    /// Creates an optimizer with default stopping and trace configuration.
    pub fn new(rule: R) -> Self {
        Self {
            rule,
            stopping: StoppingCriterion::default(),
            trace_config: TraceConfig::default(),
            trace: ConvergenceTrace::new(),
            state: None,
            started: None,
        }
    }

    /// Sets the stopping criterion.
    pub fn with_stopping_criterion(mut self, stopping: StoppingCriterion<T>) -> Self {
        self.stopping = stopping;
        self
    }

    /// Sets the trace configuration.
    pub fn with_trace_config(mut self, trace_config: TraceConfig) -> Self {
        self.trace_config = trace_config;
        self
    }

    /// Returns the step rule.
    pub fn rule(&self) -> &R {
        &self.rule
    }

    /// Returns the step rule mutably, e.g. to reconfigure it between runs.
    pub fn rule_mut(&mut self) -> &mut R {
        &mut self.rule
    }

    /// Returns the stopping criterion.
    pub fn stopping_criterion(&self) -> &StoppingCriterion<T> {
        &self.stopping
    }

    /// Checkpoints of the current or last run.
    ///
    /// The trace survives a failed run up to the last completed checkpoint.
    pub fn trace(&self) -> &ConvergenceTrace<T> {
        &self.trace
    }

    /// State of the current or last run.
    pub fn state(&self) -> Option<&RunState<T>> {
        self.state.as_ref()
    }

    /// Current iterate, if a run was initialized.
    pub fn x(&self) -> Option<&DVector<T>> {
        self.state.as_ref().map(|s| &s.x)
    }

    fn elapsed(&self) -> Duration {
        self.started.map(|t| t.elapsed()).unwrap_or_default()
    }

    /// Prepares a run from `x0`.
    ///
    /// Resets counters and the trace, lets the step rule resolve its
    /// defaults, and records the starting point.
    ///
    /// # Errors
    ///
    /// Returns `InvalidConfiguration` for invalid stopping or trace settings,
    /// `DimensionMismatch` if `x0` does not match the oracle dimension, and
    /// any error raised by the step rule's own initialization.
    pub fn init_run(&mut self, loss: &dyn LossOracle<T>, x0: DVector<T>) -> OptimizerResult<()> {
        self.stopping.validate()?;
        self.trace_config.validate()?;
        loss.check_dimension(&x0)?;

        self.trace.clear();
        self.state = None;

        let use_prox = loss.regularizer().is_some_and(|r| r.is_proximal());
        let mut state = RunState::new(x0, use_prox, self.stopping.max_epochs);
        self.rule.init_run(loss, &mut state)?;
        if state.steps_per_epoch == 0 {
            return Err(OptimizerError::invalid_configuration(
                "an epoch must contain at least one step",
                "steps_per_epoch",
                "0",
            ));
        }

        debug!(
            "[{}] starting run: dim {}, {} step(s) per epoch, proximal {}",
            self.rule.name(),
            loss.dim(),
            state.steps_per_epoch,
            state.use_prox
        );

        self.state = Some(state);
        self.started = Some(Instant::now());
        self.checkpoint(loss)
    }

    /// Performs one step of the rule and updates the counters.
    ///
    /// # Errors
    ///
    /// Returns `InvalidConfiguration` if called before [`Optimizer::init_run`],
    /// `NumericalError` if the iterate stops being finite, and any error of
    /// the step rule.
    pub fn step(&mut self, loss: &dyn LossOracle<T>) -> OptimizerResult<()> {
        let state = self.state.as_mut().ok_or_else(|| {
            OptimizerError::invalid_configuration(
                "init_run must be called before step",
                "state",
                "uninitialized",
            )
        })?;

        self.rule.step(loss, state)?;
        state.it += 1;
        state.finished_epochs = state.it / state.steps_per_epoch;

        if state.x.iter().any(|v| !Float::is_finite(*v)) {
            return Err(OptimizerError::numerical_error(
                state.it,
                "iterate is not finite",
            ));
        }
        Ok(())
    }

    /// Runs the rule from `x0` until a termination condition holds.
    ///
    /// # Errors
    ///
    /// Propagates configuration, oracle and numerical errors. The trace keeps
    /// every checkpoint recorded before the failure.
    pub fn run(
        &mut self,
        loss: &dyn LossOracle<T>,
        x0: DVector<T>,
    ) -> OptimizerResult<OptimizationResult<T>> {
        let counted = CountingOracle::new(loss);
        self.init_run(&counted, x0)?;

        let reason = loop {
            self.step(&counted)?;
            let gradient_norm = self.termination_gradient_norm(&counted)?;
            if self.checkpoint_due() {
                self.checkpoint(&counted)?;
            }
            if let Some(reason) = self.check_termination(gradient_norm) {
                break reason;
            }
        };

        let last_recorded = self.trace.last().map(|e| e.iteration);
        if last_recorded != self.state.as_ref().map(|s| s.it) {
            self.checkpoint(&counted)?;
        }

        self.finish(&counted, reason)
    }

    fn checkpoint_due(&self) -> bool {
        self.state.as_ref().is_some_and(|s| {
            self.trace_config
                .is_checkpoint(s.it, s.steps_per_epoch)
        })
    }

    fn checkpoint(&mut self, loss: &dyn LossOracle<T>) -> OptimizerResult<()> {
        let elapsed = self.elapsed();
        let Some(state) = self.state.as_ref() else {
            return Ok(());
        };

        let value = if self.trace_config.record_values {
            Some(loss.value(&state.x)?)
        } else {
            None
        };
        let gradient_norm = if self.rule.uses_full_gradient() {
            state.grad.as_ref().map(|g| loss.norm(g))
        } else {
            None
        };
        let point = self.trace_config.store_iterates.then(|| state.x.clone());

        debug!(
            "[{}] it {} | epoch {} | f {:?} | grad {:?}",
            self.rule.name(),
            state.it,
            state.finished_epochs,
            value,
            gradient_norm
        );

        self.trace.push(TraceEntry {
            iteration: state.it,
            epoch: state.finished_epochs,
            elapsed,
            value,
            gradient_norm,
            point,
        });
        Ok(())
    }

    /// Gradient norm for the tolerance test, if one is due after this step.
    fn termination_gradient_norm(&self, loss: &dyn LossOracle<T>) -> OptimizerResult<Option<T>> {
        if self.stopping.gradient_tolerance.is_none() {
            return Ok(None);
        }
        let Some(state) = self.state.as_ref() else {
            return Ok(None);
        };

        if self.rule.uses_full_gradient() {
            Ok(state.grad.as_ref().map(|g| loss.norm(g)))
        } else if state.at_epoch_boundary() {
            let grad = loss.gradient(&state.x)?;
            Ok(Some(loss.norm(&grad)))
        } else {
            Ok(None)
        }
    }

    fn check_termination(&self, gradient_norm: Option<T>) -> Option<TerminationReason> {
        let state = self.state.as_ref()?;

        if let (Some(tol), Some(norm)) = (self.stopping.gradient_tolerance, gradient_norm) {
            if norm < tol {
                return Some(TerminationReason::Converged);
            }
        }
        if let Some(max_epochs) = self.stopping.max_epochs {
            if state.finished_epochs >= max_epochs {
                return Some(TerminationReason::MaxEpochs);
            }
        }

        if self.rule.finishes_epochs() && !state.at_epoch_boundary() {
            return None;
        }
        if let Some(max_iterations) = self.stopping.max_iterations {
            if state.it >= max_iterations {
                return Some(TerminationReason::MaxIterations);
            }
        }
        if let Some(max_time) = self.stopping.max_time {
            if self.elapsed() >= max_time {
                return Some(TerminationReason::MaxTime);
            }
        }
        None
    }

    fn finish(
        &self,
        loss: &CountingOracle<'_, T>,
        reason: TerminationReason,
    ) -> OptimizerResult<OptimizationResult<T>> {
        let state = self.state.as_ref().ok_or_else(|| {
            OptimizerError::invalid_configuration("run state missing", "state", "uninitialized")
        })?;

        let value = loss.value(&state.x)?;
        let gradient_norm = loss.norm(&loss.gradient(&state.x)?);
        let duration = self.elapsed();

        info!(
            "[{}] {:?} after {} iterations ({} epochs), f = {}, |grad| = {}",
            self.rule.name(),
            reason,
            state.it,
            state.finished_epochs,
            value,
            gradient_norm
        );

        Ok(
            OptimizationResult::new(state.x.clone(), value, state.it, duration, reason)
                .with_gradient_norm(gradient_norm)
                .with_finished_epochs(state.finished_epochs)
                .with_evaluations(loss),
        )
    }
}
