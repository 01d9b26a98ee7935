//! Integration tests for a single Parameter
//!
//! Covers manual control versus expression control, bound clamping and the
//! JSON form.

use approx::assert_relative_eq;
use qef_rs::parameters::{Parameter, ParameterError};
use serde_json::json;

#[test]
fn test_set_value_detaches_expression() {
    let mut fwhm = Parameter::with_expr("l_fwhm", 0.2, "2 * l_sigma").unwrap();
    assert!(!fwhm.vary());

    fwhm.set_value(0.3).unwrap();
    assert!(fwhm.expr().is_none());
    assert_eq!(fwhm.get_value(), 0.3);
    // manual control does not turn varying back on
    assert!(!fwhm.vary());
    fwhm.set_vary(true).unwrap();
    assert!(fwhm.vary());
}

#[test]
fn test_expression_and_vary_exclude_each_other() {
    let mut center = Parameter::new("qe_center", 0.0);
    center.set_expr(Some("el_center")).unwrap();
    assert!(!center.vary());

    assert_eq!(
        center.set_vary(true),
        Err(ParameterError::ExpressionAndVary {
            name: "qe_center".to_string()
        })
    );
    assert_eq!(center.expr(), Some("el_center"));
    // fixing stays allowed
    center.set_vary(false).unwrap();
}

#[test]
fn test_clearing_expression_keeps_vary() {
    for clear in [None, Some(""), Some("   ")] {
        let mut p = Parameter::with_expr("b", 0.0, "2*a").unwrap();
        p.set_expr(clear).unwrap();
        assert!(p.expr().is_none());
        assert!(!p.vary());
    }

    let mut p = Parameter::new("b", 1.0);
    p.set_expr(None).unwrap();
    assert!(p.vary());
}

#[test]
fn test_rejected_changes_leave_parameter_alone() {
    let mut p = Parameter::with_bounds("sigma", 0.1, 0.0, 1.0).unwrap();

    let err = p.set_value(-0.5).unwrap_err();
    assert!(matches!(err, ParameterError::OutOfBounds { value, .. } if value == -0.5));
    assert_eq!(p.value(), 0.1);

    assert!(matches!(
        p.set_expr(Some("a +")),
        Err(ParameterError::InvalidExpression { .. })
    ));
    assert!(p.expr().is_none());
    assert!(p.vary());

    assert!(p.set_bounds(2.0, 1.0).is_err());
    assert_eq!((p.min(), p.max()), (0.0, 1.0));
}

#[test]
fn test_set_bounds_clamps_value() {
    let mut p = Parameter::new("amplitude", 5.0);
    p.set_bounds(0.0, 2.0).unwrap();
    assert_eq!(p.value(), 2.0);

    p.set_min(3.0).unwrap_err();
    p.set_max(10.0).unwrap();
    p.set_min(3.0).unwrap();
    assert_eq!(p.value(), 3.0);
    assert_eq!(p.init_value(), 5.0);

    // reset goes back to the initial value inside the current bounds
    p.set_value(7.0).unwrap();
    p.reset();
    assert_eq!(p.value(), 5.0);

    // an expression-backed value is left to the owning set
    let mut derived = Parameter::with_expr("height", 8.0, "amplitude / 2").unwrap();
    derived.set_bounds(0.0, 1.0).unwrap();
    assert_eq!(derived.value(), 8.0);
}

#[test]
fn test_internal_coordinates_stay_in_bounds() {
    let p = Parameter::with_bounds("tau", 1.25, 0.0, f64::INFINITY).unwrap();
    let internal = p.to_internal().unwrap();
    assert_relative_eq!(p.from_internal(internal), 1.25, epsilon = 1e-12);

    for x in [-1e3, -3.0, 0.0, 3.0, 1e3] {
        assert!(p.from_internal(x) >= 0.0);
    }
}

#[test]
fn test_json_writes_infinite_bounds_as_null() {
    let mut p = Parameter::with_bounds("w_diff", 0.3, 0.0, f64::INFINITY).unwrap();
    p.set_stderr(Some(0.01));

    let value = serde_json::to_value(&p).unwrap();
    assert_eq!(value["bounds"], json!({ "min": 0.0, "max": null }));
    assert_eq!(value["expr"], json!(null));
    assert_eq!(value["stderr"], json!(0.01));

    let back: Parameter = serde_json::from_value(value).unwrap();
    assert_eq!(back, p);
    assert_eq!(back.max(), f64::INFINITY);

    let unbounded: Parameter =
        serde_json::from_value(json!({ "name": "c", "value": 1.0, "init_value": 1.0, "vary": true }))
            .unwrap();
    assert_eq!(unbounded.min(), f64::NEG_INFINITY);
    assert!(unbounded.expr().is_none());
}
