//! Integration tests for the logistic-regression oracle and its cache.

use approx::assert_relative_eq;
use optmethods_core::{
    data_matrix::CountingMatrix,
    logistic_regression::{logsig, LogisticRegression},
    loss::{sample_batch, LossOracle},
    types::{DMatrix, DVector},
};
use proptest::prelude::*;
use rand::{rngs::StdRng, Rng, SeedableRng};
use rand_distr::StandardNormal;

fn random_point(dim: usize, seed: u64) -> DVector<f64> {
    let mut rng = StdRng::seed_from_u64(seed);
    DVector::from_fn(dim, |_, _| rng.sample(StandardNormal))
}

/// Gaussian features labelled by a random hyperplane.
fn separable_dataset(n: usize, dim: usize, seed: u64) -> (DMatrix<f64>, DVector<f64>) {
    let mut rng = StdRng::seed_from_u64(seed);
    let a = DMatrix::from_fn(n, dim, |_, _| rng.sample(StandardNormal));
    let w = random_point(dim, seed.wrapping_mul(31));
    let b = (&a * &w).map(|z| if z > 0.0 { 1.0 } else { 0.0 });
    (a, b)
}

fn counting_problem(l2: f64) -> LogisticRegression<f64, CountingMatrix<DMatrix<f64>>> {
    let (a, b) = separable_dataset(30, 4, 1);
    LogisticRegression::new(CountingMatrix::new(a), b)
        .unwrap()
        .with_regularization(0.0, l2)
        .unwrap()
}

#[test]
fn test_value_and_gradient_share_one_product() {
    let loss = counting_problem(0.1);
    let x = random_point(4, 2);

    let _ = loss.value(&x).unwrap();
    let _ = loss.gradient(&x).unwrap();
    let _ = loss.value(&x).unwrap();

    assert_eq!(loss.data().mul_vec_calls(), 1);
    assert_eq!(loss.cache_stats(), (2, 1));
}

#[test]
fn test_new_point_recomputes_product() {
    let loss = counting_problem(0.0);
    let x = random_point(4, 3);
    let mut y = x.clone();
    y[0] += 1e-9;

    let gx = loss.gradient(&x).unwrap();
    let gy = loss.gradient(&y).unwrap();
    assert_eq!(loss.data().mul_vec_calls(), 2);
    assert_relative_eq!(gx, gy, epsilon = 1e-6);
}

#[test]
fn test_disabled_cache_always_recomputes() {
    let loss = counting_problem(0.0).with_mat_vec_cache(false);
    let x = random_point(4, 4);
    for _ in 0..3 {
        let _ = loss.value(&x).unwrap();
    }
    assert_eq!(loss.data().mul_vec_calls(), 3);
}

#[test]
fn test_stochastic_gradients_average_to_full_gradient() {
    let (a, b) = separable_dataset(12, 3, 8);
    let loss = LogisticRegression::new(a, b)
        .unwrap()
        .with_regularization(0.0, 0.2)
        .unwrap();
    let x = random_point(3, 9);

    let mean = (0..12)
        .map(|i| loss.stochastic_gradient(&x, &[i]).unwrap())
        .fold(DVector::zeros(3), |acc, g| acc + g)
        / 12.0;
    assert_relative_eq!(mean, loss.gradient(&x).unwrap(), epsilon = 1e-12);

    let mut rng = StdRng::seed_from_u64(10);
    let idx = sample_batch(&mut rng, 12, 12, false).unwrap();
    assert_relative_eq!(
        loss.stochastic_gradient(&x, &idx).unwrap(),
        loss.gradient(&x).unwrap(),
        epsilon = 1e-12
    );
}

#[test]
fn test_smoothness_estimates_are_ordered() {
    let (a, b) = separable_dataset(50, 6, 12);
    let loss = LogisticRegression::new(a, b).unwrap();

    let l = loss.smoothness().unwrap();
    let l_avg = loss.average_smoothness().unwrap();
    let l_max = loss.max_smoothness().unwrap();

    assert!(l <= l_avg + 1e-12);
    assert!(l_avg <= l_max);
    assert_relative_eq!(loss.batch_smoothness(1).unwrap(), l_max, epsilon = 1e-12);
    assert_relative_eq!(loss.batch_smoothness(50).unwrap(), l, epsilon = 1e-12);
}

#[cfg(feature = "serde")]
#[test]
fn test_trace_round_trips_through_json() {
    use optmethods_core::trace::{ConvergenceTrace, TraceEntry};
    use pretty_assertions::assert_eq;
    use std::time::Duration;

    let mut trace = ConvergenceTrace::new();
    trace.push(TraceEntry {
        iteration: 0,
        epoch: 0,
        elapsed: Duration::from_micros(15),
        value: Some(0.693),
        gradient_norm: None,
        point: Some(DVector::from_vec(vec![0.0, 1.0])),
    });

    let json = serde_json::to_string(&trace).unwrap();
    let restored: ConvergenceTrace<f64> = serde_json::from_str(&json).unwrap();
    assert_eq!(restored, trace);
}

proptest! {
    #[test]
    fn prop_logsig_is_negative_and_increasing(x in -800.0f64..800.0, dx in 1e-3f64..10.0) {
        let lo = logsig(x);
        let hi = logsig(x + dx);
        prop_assert!(lo.is_finite());
        prop_assert!(lo <= 0.0);
        prop_assert!(hi >= lo);
    }
}
