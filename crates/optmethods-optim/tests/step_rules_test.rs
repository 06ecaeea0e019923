//! End-to-end tests of the step rules on regularized logistic regression.

use approx::assert_relative_eq;
use optmethods_core::{
    error::Result,
    line_search::ArmijoBacktracking,
    logistic_regression::LogisticRegression,
    loss::LossOracle,
    optimizer::{Optimizer, StoppingCriterion, TerminationReason},
    regularizer::Regularizer,
    trace::{TraceCadence, TraceConfig},
    types::{DMatrix, DVector},
    utils::{noisy_dataset, separable_dataset},
};
use optmethods_optim::{
    Bfgs, BfgsConfig, GradientDescent, GradientDescentConfig, IncrementalGradient,
    IncrementalGradientConfig,
};
use std::cell::RefCell;

fn logistic_problem() -> LogisticRegression<f64> {
    let (a, b) = separable_dataset(100, 5, 2024);
    LogisticRegression::new(a, b)
        .unwrap()
        .with_regularization(0.0, 0.1)
        .unwrap()
}

/// Forwards to an inner oracle and records every stochastic batch.
#[derive(Debug)]
struct RecordingOracle {
    inner: LogisticRegression<f64>,
    batches: RefCell<Vec<Vec<usize>>>,
}

impl RecordingOracle {
    fn new(inner: LogisticRegression<f64>) -> Self {
        Self {
            inner,
            batches: RefCell::new(Vec::new()),
        }
    }
}

impl LossOracle<f64> for RecordingOracle {
    fn dim(&self) -> usize {
        self.inner.dim()
    }

    fn n_samples(&self) -> usize {
        self.inner.n_samples()
    }

    fn value(&self, x: &DVector<f64>) -> Result<f64> {
        self.inner.value(x)
    }

    fn gradient(&self, x: &DVector<f64>) -> Result<DVector<f64>> {
        self.inner.gradient(x)
    }

    fn stochastic_gradient(&self, x: &DVector<f64>, idx: &[usize]) -> Result<DVector<f64>> {
        self.batches.borrow_mut().push(idx.to_vec());
        self.inner.stochastic_gradient(x, idx)
    }

    fn smoothness(&self) -> Result<f64> {
        self.inner.smoothness()
    }

    fn max_smoothness(&self) -> Result<f64> {
        self.inner.max_smoothness()
    }

    fn regularizer(&self) -> Option<&Regularizer<f64>> {
        self.inner.regularizer()
    }
}

#[test]
fn test_gradient_descent_converges_on_logistic_regression() {
    let loss = logistic_problem();
    let mut optimizer = Optimizer::new(GradientDescent::new(GradientDescentConfig::new()))
        .with_stopping_criterion(
            StoppingCriterion::new()
                .with_max_iterations(5000)
                .with_gradient_tolerance(1e-6),
        )
        .with_trace_config(TraceConfig::new().with_cadence(TraceCadence::EveryStep));

    let result = optimizer.run(&loss, DVector::zeros(5)).unwrap();

    assert_eq!(result.termination_reason, TerminationReason::Converged);
    assert!(result.iterations < 5000);
    assert!(result.gradient_norm.unwrap() < 1e-6);

    let values = optimizer.trace().values();
    for pair in values.windows(2) {
        assert!(pair[1].1 <= pair[0].1 + 1e-15);
    }
}

#[test]
fn test_bfgs_needs_fewer_iterations_than_gradient_descent() {
    let loss = logistic_problem();
    let criterion = StoppingCriterion::new()
        .with_max_iterations(5000)
        .with_gradient_tolerance(1e-6);

    let mut gd = Optimizer::new(GradientDescent::new(GradientDescentConfig::new()))
        .with_stopping_criterion(criterion.clone());
    let gd_result = gd.run(&loss, DVector::zeros(5)).unwrap();

    let smoothness = loss.smoothness().unwrap();
    let rule = Bfgs::new(BfgsConfig::new().with_smoothness(smoothness)).unwrap();
    let mut bfgs = Optimizer::new(rule).with_stopping_criterion(criterion);
    let bfgs_result = bfgs.run(&loss, DVector::zeros(5)).unwrap();

    assert_eq!(bfgs_result.termination_reason, TerminationReason::Converged);
    assert!(bfgs_result.iterations < gd_result.iterations);
    assert_relative_eq!(bfgs_result.value, gd_result.value, epsilon = 1e-9);
}

#[test]
fn test_bfgs_with_line_search_converges() {
    let loss = logistic_problem();
    let rule = Bfgs::new(BfgsConfig::new().with_smoothness(loss.smoothness().unwrap()))
        .unwrap()
        .with_line_search(ArmijoBacktracking::new());
    let mut optimizer = Optimizer::new(rule).with_stopping_criterion(
        StoppingCriterion::new()
            .with_max_iterations(500)
            .with_gradient_tolerance(1e-6),
    );

    let result = optimizer.run(&loss, DVector::zeros(5)).unwrap();
    assert!(result.converged);
    assert_eq!(optimizer.rule().skipped_updates(), 0);
}

#[test]
fn test_incremental_gradient_visits_each_sample_once_per_epoch() {
    let (a, b) = separable_dataset(10, 3, 5);
    let inner = LogisticRegression::new(a, b).unwrap();
    let loss = RecordingOracle::new(inner);
    let rule = IncrementalGradient::new(IncrementalGradientConfig::new().with_batch_size(2));
    let mut optimizer = Optimizer::new(rule).with_stopping_criterion(
        StoppingCriterion::new()
            .without_max_iterations()
            .with_max_epochs(3),
    );

    let result = optimizer.run(&loss, DVector::zeros(3)).unwrap();
    assert_eq!(result.iterations, 15);

    let batches = loss.batches.borrow();
    assert_eq!(batches.len(), 15);
    for epoch in batches.chunks(5) {
        let mut seen: Vec<usize> = epoch.iter().flatten().copied().collect();
        seen.sort_unstable();
        assert_eq!(seen, (0..10).collect::<Vec<_>>());
    }
    assert_eq!(batches[0], vec![0, 1]);
    assert_eq!(batches[4], vec![8, 9]);
}

#[test]
fn test_incremental_gradient_finishes_epoch_past_iteration_budget() {
    let (a, b) = separable_dataset(10, 3, 9);
    let loss = LogisticRegression::new(a, b).unwrap();
    // ⌈10 / 3⌉ = 4 steps per epoch; the last batch wraps around.
    let rule = IncrementalGradient::new(IncrementalGradientConfig::new().with_batch_size(3));
    let mut optimizer = Optimizer::new(rule)
        .with_stopping_criterion(StoppingCriterion::new().with_max_iterations(5));

    let result = optimizer.run(&loss, DVector::zeros(3)).unwrap();

    assert_eq!(result.termination_reason, TerminationReason::MaxIterations);
    assert_eq!(result.iterations, 8);
    assert_eq!(result.finished_epochs, 2);
    assert_eq!(optimizer.rule().cursor(), (8 * 3) % 10);
}

#[test]
fn test_incremental_gradient_decreases_loss_over_epochs() {
    let (a, b) = noisy_dataset(60, 4, 0.1, 17).unwrap();
    let loss = LogisticRegression::new(a, b)
        .unwrap()
        .with_regularization(0.0, 0.05)
        .unwrap();
    let rule = IncrementalGradient::new(
        IncrementalGradientConfig::new()
            .with_batch_size(6)
            .with_decay(0.5, 1.0),
    );
    let mut optimizer = Optimizer::new(rule).with_stopping_criterion(
        StoppingCriterion::new()
            .without_max_iterations()
            .with_max_epochs(40),
    );

    let x0 = DVector::zeros(4);
    let initial = loss.value(&x0).unwrap();
    let result = optimizer.run(&loss, x0).unwrap();

    assert_eq!(result.termination_reason, TerminationReason::MaxEpochs);
    assert_eq!(result.finished_epochs, 40);
    assert!(result.value < initial);
    assert_eq!(result.gradient_evaluations, 1);
    assert_eq!(result.stochastic_gradient_evaluations, 400);
}

#[test]
fn test_proximal_incremental_gradient_produces_sparse_solution() {
    // Only the first feature carries signal; a strong ℓ₁ term zeroes the rest.
    let (informative, b) = separable_dataset(40, 1, 31);
    let (noise, _) = separable_dataset(40, 3, 32);
    let a = DMatrix::from_fn(40, 4, |i, j| {
        if j == 0 {
            informative[(i, 0)]
        } else {
            0.01 * noise[(i, j - 1)]
        }
    });
    let loss = LogisticRegression::new(a, b)
        .unwrap()
        .with_regularization(0.05, 0.0)
        .unwrap();

    for prox_every_it in [false, true] {
        let rule = IncrementalGradient::new(
            IncrementalGradientConfig::new()
                .with_batch_size(4)
                .with_prox_every_it(prox_every_it),
        );
        let mut optimizer = Optimizer::new(rule).with_stopping_criterion(
            StoppingCriterion::new()
                .without_max_iterations()
                .with_max_epochs(30),
        );
        let result = optimizer.run(&loss, DVector::zeros(4)).unwrap();

        assert_ne!(result.point[0], 0.0);
        for j in 1..4 {
            assert_eq!(result.point[j], 0.0);
        }
    }
}

#[test]
fn test_dimension_mismatch_propagates_from_every_rule() {
    let loss = logistic_problem();
    let x0 = DVector::zeros(4);

    let mut gd = Optimizer::new(GradientDescent::new(GradientDescentConfig::new()));
    assert!(gd.run(&loss, x0.clone()).is_err());

    let mut ig = Optimizer::new(IncrementalGradient::new(IncrementalGradientConfig::new()));
    assert!(ig.run(&loss, x0.clone()).is_err());

    let rule = Bfgs::new(BfgsConfig::new().with_smoothness(1.0)).unwrap();
    let mut bfgs = Optimizer::new(rule);
    assert!(bfgs.run(&loss, x0).is_err());
}
