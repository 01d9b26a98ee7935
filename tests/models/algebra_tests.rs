//! Tests for combining models
//!
//! Composite models share one parameter set, so constraint expressions can
//! link parameters of different components.

use approx::assert_relative_eq;
use ndarray::{array, Array1};
use qef_rs::model::{evaluate, FnModel, Model};
use qef_rs::models::peak::{gaussian, lorentzian};
use qef_rs::models::{
    add, divide, multiply, subtract, CompositeModel, ConstantModel, GaussianModel,
    LorentzianModel, Operation,
};
use qef_rs::parameters::{ParamHint, Parameters};
use qef_rs::QefError;

use crate::test_helpers::assert_arrays_close;

fn elastic_plus_quasielastic() -> CompositeModel {
    let peaks = add(
        GaussianModel::new().with_prefix("el_"),
        LorentzianModel::new().with_prefix("qe_"),
    )
    .unwrap();
    add(peaks, ConstantModel::new().with_prefix("bg_")).unwrap()
}

#[test]
fn test_nested_sum_evaluates_each_component() {
    let model = elastic_plus_quasielastic();
    assert_eq!(model.name(), "((gaussian[el_] + lorentzian[qe_]) + constant[bg_])");

    let mut params = model.make_params().unwrap();
    params.set_value("el_amplitude", 2.0).unwrap();
    params.set_value("el_sigma", 0.05).unwrap();
    params.set_value("qe_amplitude", 0.5).unwrap();
    params.set_value("qe_sigma", 0.2).unwrap();
    params.set_value("bg_c", 0.01).unwrap();

    let x = Array1::linspace(-1.0, 1.0, 41);
    let expected = gaussian(&x, 2.0, 0.0, 0.05) + lorentzian(&x, 0.5, 0.0, 0.2) + 0.01;
    assert_arrays_close(&evaluate(&model, &params, &x).unwrap(), &expected, 1e-12, 1e-15);

    let parts = model.eval_components(&params.evaluate().unwrap(), &x).unwrap();
    let prefixes: Vec<&str> = parts.iter().map(|(p, _)| p.as_str()).collect();
    assert_eq!(prefixes, vec!["el_", "qe_", "bg_"]);
    let sum = parts.iter().fold(Array1::zeros(x.len()), |acc, (_, y)| acc + y);
    assert_arrays_close(&sum, &expected, 1e-12, 1e-15);
}

#[test]
fn test_constraint_across_components() {
    let model = elastic_plus_quasielastic();
    let mut params = model.make_params().unwrap();

    // the two lines share a center
    params.set_expr("qe_center", Some("el_center")).unwrap();
    params.set_value("el_center", 0.1).unwrap();

    let values = params.evaluate().unwrap();
    assert_eq!(values.get("qe_center").unwrap(), 0.1);
    assert_eq!(params.dependents("el_center"), vec!["qe_center"]);

    let x = array![0.1];
    let y = model.eval(&params, &x).unwrap();
    let peak = 1.0 / (2.0 * std::f64::consts::PI).sqrt() + 1.0 / std::f64::consts::PI;
    assert_relative_eq!(y[0], peak, max_relative = 1e-12);
}

#[test]
fn test_all_operations() {
    let x = array![1.0, 2.0, 4.0];
    let line = |prefix: &str| {
        FnModel::new("ramp", &["k"], |x, args| {
            let k = args.get("k")?;
            Ok(x.mapv(|v| k * v))
        })
        .with_prefix(prefix)
    };
    let cases = [
        (Operation::Add, array![3.0, 6.0, 12.0]),
        (Operation::Subtract, array![-1.0, -2.0, -4.0]),
        (Operation::Multiply, array![2.0, 8.0, 32.0]),
        (Operation::Divide, array![0.5, 0.5, 0.5]),
    ];

    for (op, expected) in cases {
        let model = CompositeModel::new(Box::new(line("a_")), Box::new(line("b_")), op).unwrap();
        let mut params = model.make_params().unwrap();
        params.set_value("a_k", 1.0).unwrap();
        params.set_value("b_k", 2.0).unwrap();
        assert_eq!(model.eval(&params, &x).unwrap(), expected, "{}", op);
    }

    assert!(subtract(line("a_"), line("b_")).is_ok());
    assert!(multiply(line("a_"), line("b_")).is_ok());
    assert!(divide(line("a_"), line("a_")).is_err());
}

#[test]
fn test_collision_is_fatal() {
    let err = add(
        GaussianModel::new().with_prefix("p_"),
        LorentzianModel::new().with_prefix("p_"),
    )
    .unwrap_err();
    match err {
        QefError::ParameterCollision { names } => {
            assert!(names.contains(&"p_sigma".to_string()));
            assert!(names.contains(&"p_fwhm".to_string()));
        }
        other => panic!("expected a collision, got {:?}", other),
    }
}

#[test]
fn test_guess_per_component_then_merge() {
    let x = Array1::linspace(-2.0, 2.0, 401);
    let y = lorentzian(&x, 3.0, 0.2, 0.1) + 0.05;

    let peak = LorentzianModel::new().with_prefix("qe_");
    let background = ConstantModel::new().with_prefix("bg_");
    let model = add(peak.clone(), background.clone()).unwrap();
    assert!(matches!(model.guess(&y, &x), Err(QefError::NotImplemented(_))));

    let mut params: Parameters = peak.guess(&y, &x).unwrap();
    params.extend(background.guess(&y, &x).unwrap()).unwrap();

    assert_eq!(params.len(), model.make_params().unwrap().len());
    assert_relative_eq!(params.get("qe_center").unwrap().value(), 0.2, epsilon = 0.02);
    assert!(model.eval(&params, &x).is_ok());
}

#[test]
fn test_boxed_models_clone_independently() {
    let mut model: Box<dyn Model> = Box::new(elastic_plus_quasielastic());
    let copy = model.clone();

    model
        .set_param_hint("qe_sigma", ParamHint::new().value(0.3))
        .unwrap();
    assert_eq!(model.make_params().unwrap().get("qe_sigma").unwrap().value(), 0.3);
    assert_eq!(copy.make_params().unwrap().get("qe_sigma").unwrap().value(), 1.0);
    assert_eq!(format!("{:?}", copy), format!("Model({})", copy.name()));
}

#[test]
fn test_residual_shape_mismatch() {
    let model = GaussianModel::new();
    let params = model.make_params().unwrap();
    let x = array![0.0, 1.0, 2.0];
    assert!(matches!(
        model.residuals(&params, &x, &array![1.0]),
        Err(QefError::ShapeMismatch(_))
    ));
}
