//! Gradient descent.
//!
//! Full-batch steepest descent with a fixed learning rate:
//!
//! ```text
//! x_{k+1} = x_k − lr · ∇f(x_k)
//! ```
//!
//! Without an explicit learning rate the step rule uses `lr = 1/L`, where `L`
//! is the oracle's smoothness estimate. For convex `L`-smooth objectives this
//! choice gives a non-increasing sequence of objective values.
//!
//! When a line search is attached, it is invoked with the current point and
//! the direction `−∇f(x_k)`, and the point it accepts replaces the fixed step.
//! Gradient descent targets smooth losses: no proximal step is applied.

use num_traits::Float;
use optmethods_core::{
    error::{OptimizerError, OptimizerResult},
    line_search::LineSearch,
    loss::LossOracle,
    optimizer::{RunState, StepRule},
    types::Scalar,
};

/// Configuration for gradient descent.
#[derive(Debug, Clone)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct GradientDescentConfig<T>
where
    T: Scalar,
{
    /// Fixed learning rate; `None` resolves to `1/L` at the start of a run
    pub lr: Option<T>,
}

impl<T> Default for GradientDescentConfig<T>
where
    T: Scalar,
{
    fn default() -> Self {
        Self { lr: None }
    }
}

impl<T> GradientDescentConfig<T>
where
    T: Scalar,
{
    /// Creates a configuration using the smoothness-derived learning rate.
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets a fixed learning rate.
    pub fn with_learning_rate(mut self, lr: T) -> Self {
        self.lr = Some(lr);
        self
    }

    /// Validates the configuration.
    pub fn validate(&self) -> OptimizerResult<()> {
        if let Some(lr) = self.lr {
            validate_learning_rate(lr)?;
        }
        Ok(())
    }
}

fn validate_learning_rate<T: Scalar>(lr: T) -> OptimizerResult<()> {
    if lr > T::zero() && Float::is_finite(lr) {
        Ok(())
    } else {
        Err(OptimizerError::invalid_configuration(
            "learning rate must be positive and finite",
            "lr",
            lr.to_string(),
        ))
    }
}

/// Gradient descent step rule.
#[derive(Debug)]
pub struct GradientDescent<T>
where
    T: Scalar,
{
    config: GradientDescentConfig<T>,
    line_search: Option<Box<dyn LineSearch<T>>>,
    /// Learning rate resolved for the current run
    lr: Option<T>,
    /// Step accepted by the line search on the last iteration
    last_step_size: Option<T>,
}

impl<T> GradientDescent<T>
where
    T: Scalar,
{
    /// Creates a new gradient descent step rule.
    pub fn new(config: GradientDescentConfig<T>) -> Self {
        Self {
            config,
            line_search: None,
            lr: None,
            last_step_size: None,
        }
    }

    /// Attaches a directional line search.
    pub fn with_line_search<L>(mut self, line_search: L) -> Self
    where
        L: LineSearch<T> + 'static,
    {
        self.line_search = Some(Box::new(line_search));
        self
    }

    /// Returns the configuration.
    pub fn config(&self) -> &GradientDescentConfig<T> {
        &self.config
    }

    /// Learning rate of the current run, once resolved.
    pub fn learning_rate(&self) -> Option<T> {
        self.lr
    }

    /// Step size accepted by the line search on the last iteration.
    pub fn last_step_size(&self) -> Option<T> {
        self.last_step_size
    }
}

impl<T> StepRule<T> for GradientDescent<T>
where
    T: Scalar,
{
    fn name(&self) -> &str {
        "Gradient Descent"
    }

    fn init_run(&mut self, loss: &dyn LossOracle<T>, state: &mut RunState<T>) -> OptimizerResult<()> {
        self.config.validate()?;
        let lr = match self.config.lr {
            Some(lr) => lr,
            None => T::one() / loss.smoothness()?,
        };
        validate_learning_rate(lr)?;
        self.lr = Some(lr);
        self.last_step_size = None;
        state.grad = Some(loss.gradient(&state.x)?);
        Ok(())
    }

    /// Leaves `∇f` at the new iterate in `state.grad`, so the next step and
    /// the tolerance test reuse it.
    fn step(&mut self, loss: &dyn LossOracle<T>, state: &mut RunState<T>) -> OptimizerResult<()> {
        let grad = match state.grad.take() {
            Some(grad) => grad,
            None => loss.gradient(&state.x)?,
        };

        match self.line_search.as_mut() {
            Some(line_search) => {
                let direction = -&grad;
                let outcome = line_search.search_direction(loss, &state.x, &direction)?;
                state.x = outcome.point;
                self.last_step_size = Some(outcome.step_size);
            }
            None => {
                let lr = self.lr.ok_or_else(|| {
                    OptimizerError::invalid_configuration(
                        "learning rate not resolved; init_run was not called",
                        "lr",
                        "unresolved",
                    )
                })?;
                state.x.axpy(-lr, &grad, T::one());
            }
        }

        state.grad = Some(loss.gradient(&state.x)?);
        Ok(())
    }
}
