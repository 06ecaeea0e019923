use approx::assert_relative_eq;
use optmethods::prelude::*;
use optmethods_core::utils::QuadraticLoss;

#[test]
fn test_step_rules_agree_on_quadratic_minimizer() {
    let a = DMatrix::from_row_slice(2, 2, &[3.0, 0.5, 0.5, 1.0]);
    let b = DVector::from_vec(vec![1.0, -1.0]);
    let loss = QuadraticLoss::new(a.clone(), b.clone()).unwrap();
    let expected = a.lu().solve(&b).unwrap();
    let criterion = StoppingCriterion::new()
        .with_max_iterations(2000)
        .with_gradient_tolerance(1e-10);

    let mut gd = Optimizer::new(GradientDescent::new(GradientDescentConfig::new()))
        .with_stopping_criterion(criterion.clone());
    let gd_point = gd.run(&loss, DVector::zeros(2)).unwrap().point;

    let rule = Bfgs::new(BfgsConfig::new().with_smoothness(loss.smoothness().unwrap())).unwrap();
    let mut bfgs = Optimizer::new(rule).with_stopping_criterion(criterion);
    let bfgs_point = bfgs.run(&loss, DVector::zeros(2)).unwrap().point;

    assert_relative_eq!(gd_point, expected, epsilon = 1e-8);
    assert_relative_eq!(bfgs_point, expected, epsilon = 1e-8);
}

#[test]
fn test_failed_run_keeps_trace() {
    let loss = QuadraticLoss::isotropic(2, 1.0);
    let rule = Bfgs::new(
        BfgsConfig::new()
            .with_smoothness(1.0)
            .with_store_hess_estimate(true),
    )
    .unwrap();
    let mut optimizer = Optimizer::new(rule);

    let err = optimizer.run(&loss, DVector::zeros(2)).unwrap_err();
    assert!(matches!(err, OptimizerError::NumericalError { iteration: 0, .. }));
    assert_eq!(optimizer.trace().iterations(), vec![0]);
}
