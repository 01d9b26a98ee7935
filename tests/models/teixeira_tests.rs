//! Tests for the jump-diffusion water model

use approx::assert_relative_eq;
use ndarray::Array1;
use qef_rs::constants::HBAR;
use qef_rs::model::Model;
use qef_rs::models::peak::lorentzian;
use qef_rs::models::{ModelRegistry, TeixeiraWaterModel};
use qef_rs::parameters::ParamHint;

fn hwhm(q: f64, tau: f64, diff: f64) -> f64 {
    let dq2 = diff * q * q;
    HBAR * dq2 / (1.0 + tau * dq2)
}

#[test]
fn test_lineshape_is_a_lorentzian_of_derived_width() {
    let model = TeixeiraWaterModel::new(0.5).with_prefix("w_");
    let mut params = model.make_params().unwrap();
    params.set_value("w_amplitude", 3.0).unwrap();
    params.set_value("w_center", 0.01).unwrap();
    params.set_value("w_tau", 1.25).unwrap();
    params.set_value("w_diff", 0.3).unwrap();

    let e = Array1::linspace(-1.0, 1.0, 201);
    let y = model.eval(&params, &e).unwrap();
    let expected = lorentzian(&e, 3.0, 0.01, hwhm(0.5, 1.25, 0.3));
    for (a, b) in y.iter().zip(expected.iter()) {
        assert_relative_eq!(*a, *b, max_relative = 1e-12);
    }
}

#[test]
fn test_width_saturates_at_large_q() {
    let (tau, diff) = (2.0, 0.5);
    let widths: Vec<f64> = [0.2, 0.5, 1.0, 2.0, 30.0]
        .iter()
        .map(|&q| {
            let values = TeixeiraWaterModel::new(q)
                .make_params()
                .and_then(|mut p| {
                    p.set_value("tau", tau)?;
                    p.set_value("diff", diff)?;
                    Ok(p.evaluate()?)
                })
                .unwrap();
            values.get("sigma").unwrap()
        })
        .collect();

    assert!(widths.windows(2).all(|w| w[1] > w[0]));
    assert_relative_eq!(widths[4], HBAR / tau, max_relative = 0.01);
    // Fickian regime at small q
    assert_relative_eq!(widths[0], HBAR * diff * 0.04, max_relative = 0.05);
}

#[test]
fn test_hints_bound_tau_and_diff() {
    let mut model = TeixeiraWaterModel::new(0.5);
    let params = model.make_params().unwrap();
    assert_eq!(params.get("tau").unwrap().min(), 0.0);
    assert_eq!(params.get("diff").unwrap().min(), 0.0);
    assert_eq!(
        params.varying_names(),
        vec!["amplitude", "center", "tau", "diff"]
    );

    model.set_param_hint("tau", ParamHint::new().vary(false)).unwrap();
    let params = model.make_params().unwrap();
    assert_eq!(params.varying_names(), vec!["amplitude", "center", "diff"]);
}

#[test]
fn test_registry_instance_takes_q_later() {
    let registry = ModelRegistry::with_builtin_models();
    let model = registry.create("teixeira_water", "w_").unwrap();
    let values = model.make_params().unwrap().evaluate().unwrap();
    assert_eq!(values.get("w_sigma").unwrap(), 0.0);

    let mut model = TeixeiraWaterModel::new(0.0).with_prefix("w_");
    model.set_q(1.5).unwrap();
    assert_eq!(model.q(), 1.5);
    let values = model.make_params().unwrap().evaluate().unwrap();
    assert_relative_eq!(
        values.get("w_sigma").unwrap(),
        hwhm(1.5, 1.0, 1.0),
        max_relative = 1e-12
    );
}
