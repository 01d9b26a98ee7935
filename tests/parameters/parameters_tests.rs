//! Integration tests for the Parameters collection
//!
//! These tests verify that the Parameters collection behaves correctly in various scenarios.

use approx::assert_relative_eq;
use qef_rs::parameters::{ParamUpdate, Parameter, ParameterError, Parameters};
use qef_rs::QefError;

#[test]
fn test_parameters_basic_operations() {
    // Create an empty parameters collection
    let mut params = Parameters::new();
    assert_eq!(params.len(), 0);
    assert!(params.is_empty());

    // Add parameters
    params.add(Parameter::new("amplitude", 10.0)).unwrap();
    params.add_param("center", 5.0).unwrap();
    params
        .add_param_with_bounds("sigma", 2.0, 0.1, 10.0)
        .unwrap();

    assert_eq!(params.len(), 3);
    assert_eq!(params.names(), vec!["amplitude", "center", "sigma"]);

    // Names are unique
    assert!(matches!(
        params.add_param("center", 1.0),
        Err(ParameterError::DuplicateName { ref name }) if name == "center"
    ));
    assert_eq!(params.len(), 3);

    // Get a parameter that doesn't exist
    assert!(params.get("nonexistent").is_none());
    assert!(matches!(
        params.set_value("nonexistent", 1.0),
        Err(ParameterError::ParameterNotFound { .. })
    ));

    // Remove a parameter, keeping the order of the others
    let param = params.remove("amplitude").unwrap();
    assert_eq!(param.value(), 10.0);
    assert_eq!(params.names(), vec!["center", "sigma"]);
    params.set_value("sigma", 3.0).unwrap();
    assert_eq!(params.get("sigma").unwrap().value(), 3.0);
}

#[test]
fn test_parameters_varying_fixed() {
    let mut params = Parameters::new();
    params.add_param("amplitude", 10.0).unwrap();
    params.add_param("center", 5.0).unwrap();
    params.add_param("sigma", 2.0).unwrap();
    params.add_param_with_expr("fwhm", 0.0, "2.3548200 * sigma").unwrap();

    // Expression-backed parameters neither vary nor count as fixed
    assert_eq!(params.varying_names(), vec!["amplitude", "center", "sigma"]);
    assert!(params.fixed().is_empty());

    params.set_vary("center", false).unwrap();
    assert_eq!(params.varying_names(), vec!["amplitude", "sigma"]);
    assert_eq!(params.fixed()[0].name(), "center");

    assert!(matches!(
        params.set_vary("fwhm", true),
        Err(ParameterError::ExpressionAndVary { .. })
    ));
}

#[test]
fn test_atomic_updates() {
    let mut params = Parameters::new();
    params
        .add_param_with_bounds("sigma", 1.0, 0.0, 2.0)
        .unwrap();

    // A batch with one invalid field changes nothing
    let err = params
        .set("sigma", ParamUpdate::new().max(5.0).value(-1.0))
        .unwrap_err();
    assert!(matches!(err, ParameterError::OutOfBounds { .. }));
    let sigma = params.get("sigma").unwrap();
    assert_eq!(sigma.value(), 1.0);
    assert_eq!(sigma.max(), 2.0);

    // A valid batch is applied as a whole
    params
        .set("sigma", ParamUpdate::new().max(5.0).value(4.0).vary(false))
        .unwrap();
    let sigma = params.get("sigma").unwrap();
    assert_eq!(sigma.value(), 4.0);
    assert_eq!(sigma.max(), 5.0);
    assert!(!sigma.vary());

    // Narrowing the bounds clamps the value
    params.set_bounds("sigma", 0.0, 3.0).unwrap();
    assert_eq!(params.get("sigma").unwrap().value(), 3.0);
}

#[test]
fn test_expression_tracking_and_detaching() {
    let mut params = Parameters::new();
    params.add_param("a", 1.0).unwrap();
    params.add_param_with_expr("b", 0.0, "2*a").unwrap();

    for a in [0.5, 3.0, -7.25] {
        params.set_value("a", a).unwrap();
        assert_eq!(params.evaluate().unwrap().get("b").unwrap(), 2.0 * a);
    }

    // store the derived value, then detach
    params.update_expressions().unwrap();
    params.set_expr("b", Some("")).unwrap();
    params.set_value("a", 100.0).unwrap();
    assert_eq!(params.evaluate().unwrap().get("b").unwrap(), -14.5);
}

#[test]
fn test_three_parameter_cycle() {
    let mut params = Parameters::new();
    params.add_param("a", 1.0).unwrap();
    params.add_param("b", 2.0).unwrap();
    params.add_param("c", 3.0).unwrap();
    params.set_expr("a", Some("b")).unwrap();
    params.set_expr("b", Some("c")).unwrap();
    params.set_expr("c", Some("a")).unwrap();

    match params.evaluate() {
        Err(ParameterError::CyclicConstraint { names }) => {
            let mut sorted = names.clone();
            sorted.sort();
            assert_eq!(sorted, vec!["a", "b", "c"]);
        }
        other => panic!("expected a cycle, got {:?}", other),
    }

    // The set stays usable once the cycle is broken
    params.set_expr("c", None).unwrap();
    params.set_value("c", 4.0).unwrap();
    let values = params.evaluate().unwrap();
    assert_eq!(values.get("a").unwrap(), 4.0);
}

#[test]
fn test_undefined_variable_and_model_error_wrapping() {
    let mut params = Parameters::new();
    params.add_param_with_expr("b", 0.0, "missing * 2").unwrap();

    let err: QefError = params.evaluate().unwrap_err().into();
    assert!(format!("{}", err).contains("missing"));
    assert!(err.cycle().is_none());
}

#[test]
fn test_extend_is_all_or_nothing() {
    let mut left = Parameters::new();
    left.add_param("g_center", 0.0).unwrap();

    let mut right = Parameters::new();
    right.add_param("l_center", 1.0).unwrap();
    right.add_param("g_center", 2.0).unwrap();

    assert!(left.extend(right).is_err());
    assert_eq!(left.names(), vec!["g_center"]);

    let mut right = Parameters::new();
    right.add_param("l_center", 1.0).unwrap();
    left.extend(right).unwrap();
    assert_eq!(left.names(), vec!["g_center", "l_center"]);
}

#[test]
fn test_parameters_reset() {
    let mut params = Parameters::new();
    params.add_param("amplitude", 10.0).unwrap();
    params.add_param("center", 5.0).unwrap();

    params.set_value("amplitude", 15.0).unwrap();
    params.set_value("center", 7.5).unwrap();
    params.reset();

    assert_eq!(params.get("amplitude").unwrap().value(), 10.0);
    assert_eq!(params.get("center").unwrap().value(), 5.0);
}

#[test]
fn test_parameters_bounds_handling() {
    let mut params = Parameters::new();
    params
        .add_param_with_bounds("amplitude", 10.0, 0.0, 20.0)
        .unwrap();
    params
        .add_param_with_bounds("center", 5.0, 0.0, 10.0)
        .unwrap();

    // Internal values differ from external values due to the bounds transform
    let internal = params.varying_internal_values().unwrap();
    assert_eq!(internal.len(), 2);
    assert_ne!(internal[1], 5.0);

    // Round-trip preserves values
    let same = params.with_internal_values(&internal).unwrap();
    assert_relative_eq!(same.get("amplitude").unwrap().value(), 10.0, epsilon = 1e-10);
    assert_relative_eq!(same.get("center").unwrap().value(), 5.0, epsilon = 1e-10);

    // Any internal value maps into the bounds
    for x in [-10.0, -1.0, 0.0, 1.0, 10.0] {
        let moved = params.with_internal_values(&[x, x]).unwrap();
        let amplitude = moved.get("amplitude").unwrap().value();
        let center = moved.get("center").unwrap().value();
        assert!((0.0..=20.0).contains(&amplitude));
        assert!((0.0..=10.0).contains(&center));
    }

    // The original set is untouched, and the count must match
    assert_eq!(params.get("center").unwrap().value(), 5.0);
    assert!(matches!(
        params.with_internal_values(&[0.0]),
        Err(QefError::ShapeMismatch(_))
    ));
}

#[test]
fn test_check_bounds_after_evaluation() {
    let mut params = Parameters::new();
    params.add_param("a", 1.0).unwrap();
    params.add_param_with_expr("b", 0.0, "10 * a").unwrap();
    params.set_bounds("b", 0.0, 5.0).unwrap();

    let values = params.evaluate().unwrap();
    assert!(matches!(
        params.check_bounds(&values),
        Err(ParameterError::OutOfBounds { ref name, value, .. }) if name == "b" && value == 10.0
    ));

    params.set_value("a", 0.25).unwrap();
    let values = params.evaluate().unwrap();
    assert!(params.check_bounds(&values).is_ok());
}

#[test]
fn test_json_with_infinite_bounds() {
    let mut params = Parameters::new();
    params
        .add_param_with_bounds("sigma", 0.5, 0.0, f64::INFINITY)
        .unwrap();
    params.add_param_with_expr("fwhm", 0.0, "2 * sigma").unwrap();

    let json = params.to_json().unwrap();
    assert!(json.contains("null"));

    let back = Parameters::from_json(&json).unwrap();
    assert_eq!(back.names(), params.names());
    assert_eq!(back.get("sigma").unwrap().max(), f64::INFINITY);
    assert_eq!(back.get("fwhm").unwrap().expr(), Some("2 * sigma"));
    assert_eq!(back.evaluate().unwrap().get("fwhm").unwrap(), 1.0);
}
