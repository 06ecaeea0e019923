//! Incremental gradient with cyclic sampling.
//!
//! Processes a finite-sum objective `f(x) = 1/n Σᵢ fᵢ(x)` in a fixed cyclic
//! order: each step takes the next `batch_size` indices after the cursor,
//! wrapping around `n`, and moves along their averaged gradient. One epoch is
//! `⌈n / batch_size⌉` steps.
//!
//! # Step-Size Schedule
//!
//! ```text
//! lr = min( 1 / (1/lr0 + c · max(0, epoch − e₀)^p), lr_max )
//! ```
//!
//! where `c = lr_decay_coef`, `p = lr_decay_power` and `e₀ =
//! epoch_start_decay`. A negative candidate is treated as unbounded, leaving
//! `lr_max` as the only cap.
//!
//! # Proximal Step
//!
//! When the oracle carries an ℓ₁ regularizer, its prox is applied after every
//! step if `prox_every_it` is set, otherwise once at the end of each epoch
//! with the accumulated step `lr · steps_per_epoch`.
//!
//! The run loop lets this rule finish its current epoch before honoring the
//! iteration or time budget.

use log::debug;
use num_traits::Float;
use optmethods_core::{
    error::{OptimizerError, OptimizerResult},
    loss::LossOracle,
    optimizer::{RunState, StepRule},
    types::Scalar,
};

/// Configuration for the incremental gradient method.
#[derive(Debug, Clone)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct IncrementalGradientConfig<T>
where
    T: Scalar,
{
    /// Apply the prox after every step instead of once per epoch
    pub prox_every_it: bool,

    /// Initial learning rate; `None` resolves to `1/L_b` for the batch size
    pub lr0: Option<T>,

    /// Upper bound on the learning rate
    pub lr_max: T,

    /// Decay coefficient `c`
    pub lr_decay_coef: T,

    /// Decay exponent `p`
    pub lr_decay_power: T,

    /// First epoch of the decay; `None` resolves from the epoch budget
    pub epoch_start_decay: Option<usize>,

    /// Number of samples per step
    pub batch_size: usize,
}

impl<T> Default for IncrementalGradientConfig<T>
where
    T: Scalar,
{
    fn default() -> Self {
        Self {
            prox_every_it: false,
            lr0: None,
            lr_max: <T as Float>::infinity(),
            lr_decay_coef: T::zero(),
            lr_decay_power: T::one(),
            epoch_start_decay: None,
            batch_size: 1,
        }
    }
}

impl<T> IncrementalGradientConfig<T>
where
    T: Scalar,
{
    /// Creates a new configuration with default parameters.
    pub fn new() -> Self {
        Self::default()
    }

    /// Applies the prox after every step.
    pub fn with_prox_every_it(mut self, enabled: bool) -> Self {
        self.prox_every_it = enabled;
        self
    }

    /// Sets the initial learning rate.
    pub fn with_lr0(mut self, lr0: T) -> Self {
        self.lr0 = Some(lr0);
        self
    }

    /// Sets the learning rate cap.
    pub fn with_lr_max(mut self, lr_max: T) -> Self {
        self.lr_max = lr_max;
        self
    }

    /// Sets the decay coefficient and exponent.
    pub fn with_decay(mut self, coef: T, power: T) -> Self {
        self.lr_decay_coef = coef;
        self.lr_decay_power = power;
        self
    }

    /// Sets the first epoch of the decay.
    pub fn with_epoch_start_decay(mut self, epoch: usize) -> Self {
        self.epoch_start_decay = Some(epoch);
        self
    }

    /// Sets the batch size.
    pub fn with_batch_size(mut self, batch_size: usize) -> Self {
        self.batch_size = batch_size;
        self
    }

    /// Validates the configuration.
    pub fn validate(&self) -> OptimizerResult<()> {
        if self.batch_size == 0 {
            return Err(OptimizerError::invalid_configuration(
                "batch size must be positive",
                "batch_size",
                "0",
            ));
        }
        if let Some(lr0) = self.lr0 {
            if !(lr0 > T::zero() && Float::is_finite(lr0)) {
                return Err(OptimizerError::invalid_configuration(
                    "initial learning rate must be positive and finite",
                    "lr0",
                    lr0.to_string(),
                ));
            }
        }
        if !(self.lr_max > T::zero()) {
            return Err(OptimizerError::invalid_configuration(
                "learning rate cap must be positive",
                "lr_max",
                self.lr_max.to_string(),
            ));
        }
        if !Float::is_finite(self.lr_decay_coef) || !Float::is_finite(self.lr_decay_power) {
            return Err(OptimizerError::invalid_configuration(
                "decay parameters must be finite",
                "lr_decay_coef",
                self.lr_decay_coef.to_string(),
            ));
        }
        Ok(())
    }
}

/// Incremental gradient step rule.
#[derive(Debug)]
pub struct IncrementalGradient<T>
where
    T: Scalar,
{
    config: IncrementalGradientConfig<T>,
    /// Next sample index, in `[0, n)`
    cursor: usize,
    lr0: Option<T>,
    epoch_start_decay: usize,
    lr: Option<T>,
}

impl<T> IncrementalGradient<T>
where
    T: Scalar,
{
    /// Creates a new incremental gradient step rule.
    pub fn new(config: IncrementalGradientConfig<T>) -> Self {
        Self {
            config,
            cursor: 0,
            lr0: None,
            epoch_start_decay: 0,
            lr: None,
        }
    }

    /// Returns the configuration.
    pub fn config(&self) -> &IncrementalGradientConfig<T> {
        &self.config
    }

    /// Index of the next sample to be processed.
    pub fn cursor(&self) -> usize {
        self.cursor
    }

    /// Initial learning rate of the current run, once resolved.
    pub fn lr0(&self) -> Option<T> {
        self.lr0
    }

    /// First decaying epoch of the current run.
    pub fn epoch_start_decay(&self) -> usize {
        self.epoch_start_decay
    }

    /// Learning rate used by the last step.
    pub fn learning_rate(&self) -> Option<T> {
        self.lr
    }

    /// Learning rate after `finished_epochs` full epochs.
    pub fn scheduled_learning_rate(&self, finished_epochs: usize) -> OptimizerResult<T> {
        let lr0 = self.lr0.ok_or_else(|| {
            OptimizerError::invalid_configuration(
                "initial learning rate not resolved; init_run was not called",
                "lr0",
                "unresolved",
            )
        })?;

        let elapsed = finished_epochs.saturating_sub(self.epoch_start_decay);
        let decay = self.config.lr_decay_coef
            * Float::powf(<T as Scalar>::from_usize(elapsed), self.config.lr_decay_power);
        let mut candidate = T::one() / (T::one() / lr0 + decay);
        if candidate < T::zero() {
            candidate = <T as Float>::infinity();
        }
        Ok(Float::min(candidate, self.config.lr_max))
    }
}

impl<T> StepRule<T> for IncrementalGradient<T>
where
    T: Scalar,
{
    fn name(&self) -> &str {
        "Incremental Gradient"
    }

    fn init_run(&mut self, loss: &dyn LossOracle<T>, state: &mut RunState<T>) -> OptimizerResult<()> {
        self.config.validate()?;
        let n = loss.n_samples();
        if self.config.batch_size > n {
            return Err(OptimizerError::invalid_configuration(
                format!("batch size exceeds the {} available samples", n),
                "batch_size",
                self.config.batch_size.to_string(),
            ));
        }

        state.steps_per_epoch = n.div_ceil(self.config.batch_size);

        let lr0 = match self.config.lr0 {
            Some(lr0) => lr0,
            None => T::one() / loss.batch_smoothness(self.config.batch_size)?,
        };
        self.lr0 = Some(lr0);
        self.epoch_start_decay = match (self.config.epoch_start_decay, state.epoch_budget) {
            (Some(epoch), _) => epoch,
            (None, Some(budget)) => 1 + budget / 40,
            (None, None) => 0,
        };
        self.cursor = 0;
        self.lr = None;

        debug!(
            "[{}] lr0 = {}, decay from epoch {}, {} steps per epoch",
            self.name(),
            lr0,
            self.epoch_start_decay,
            state.steps_per_epoch
        );
        Ok(())
    }

    fn step(&mut self, loss: &dyn LossOracle<T>, state: &mut RunState<T>) -> OptimizerResult<()> {
        let n = loss.n_samples();
        let batch: Vec<usize> = (0..self.config.batch_size)
            .map(|k| (self.cursor + k) % n)
            .collect();
        self.cursor = (self.cursor + self.config.batch_size) % n;

        let grad = loss.stochastic_gradient(&state.x, &batch)?;

        let lr = self.scheduled_learning_rate(state.finished_epochs)?;
        if !Float::is_finite(lr) {
            return Err(OptimizerError::numerical_error(
                state.it,
                "step size is unbounded; set a finite lr_max",
            ));
        }
        self.lr = Some(lr);
        state.x.axpy(-lr, &grad, T::one());

        if state.use_prox {
            if let Some(regularizer) = loss.regularizer() {
                if self.config.prox_every_it {
                    state.x = regularizer.prox(&state.x, lr);
                } else if state.is_epoch_end() {
                    let epoch_lr = lr * <T as Scalar>::from_usize(state.steps_per_epoch);
                    state.x = regularizer.prox(&state.x, epoch_lr);
                }
            }
        }
        Ok(())
    }

    fn finishes_epochs(&self) -> bool {
        true
    }

    fn uses_full_gradient(&self) -> bool {
        false
    }
}
