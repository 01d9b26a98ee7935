//! Tests for constraint-expression parsing and evaluation

use approx::assert_relative_eq;
use qef_rs::parameters::expression::{
    EvaluationContext, Expression, ExpressionError, SimpleContext,
};
use qef_rs::parameters::Parameters;
use std::collections::HashMap;

fn context(vars: &[(&str, f64)]) -> SimpleContext {
    let mut ctx = SimpleContext::new();
    for (name, value) in vars {
        ctx.set_variable(name, *value);
    }
    ctx
}

#[test]
fn test_expression_parsing() {
    assert!(Expression::parse("42").unwrap().variables().is_empty());
    assert_eq!(Expression::parse("x").unwrap().variables(), vec!["x"]);
    assert_eq!(Expression::parse("x + x + x").unwrap().variables(), vec!["x"]);
    assert_eq!(
        Expression::parse("(l_sigma + g_sigma) * (z - 1) / w").unwrap().variables(),
        vec!["g_sigma", "l_sigma", "w", "z"]
    );
    assert_eq!(Expression::parse("max(a, b, c)").unwrap().variables().len(), 3);

    // whitespace and unary minus
    assert!(Expression::parse("  (  x  +  y  )  *  z  ").is_ok());
    assert!(Expression::parse("x + (-y)").is_ok());
    assert!(Expression::parse("-2 * x").is_ok());

    // invalid input
    for bad in ["", "x +", "x + (y", "@#$%", "2 x"] {
        assert!(
            matches!(Expression::parse(bad), Err(ExpressionError::ParseError { .. })),
            "{:?} should not parse",
            bad
        );
    }
    assert!(matches!(
        Expression::parse("unknown_func(x)"),
        Err(ExpressionError::UndefinedFunction { ref name }) if name == "unknown_func"
    ));
}

#[test]
fn test_expression_evaluation_simple() {
    let ctx = context(&[("x", 2.0), ("y", 3.0)]);
    let eval = |s: &str| Expression::parse(s).unwrap().evaluate(&ctx).unwrap();

    assert_eq!(eval("-x"), -2.0);
    assert_eq!(eval("x - y"), -1.0);
    assert_eq!(eval("y / x"), 1.5);
    assert_eq!(eval("x^2 + y**2"), 13.0);
    assert_eq!(eval("2 * (x + y)"), 10.0);
    assert_eq!(eval("(x + y) * (x - y)"), -5.0);

    // left associativity
    assert_eq!(eval("8 - x - y"), 3.0);
    assert_eq!(eval("12 / x / y"), 2.0);
    // precedence
    assert_eq!(eval("1 + x * y^2"), 19.0);
}

#[test]
fn test_expression_evaluation_functions() {
    let ctx = context(&[("x", 2.0), ("y", 3.0), ("z", 4.0)]);
    let eval = |s: &str| Expression::parse(s).unwrap().evaluate(&ctx).unwrap();

    assert_relative_eq!(eval("sin(x)^2 + cos(x)^2"), 1.0, epsilon = 1e-12);
    assert_relative_eq!(eval("tan(x)"), 2.0_f64.tan(), epsilon = 1e-12);
    assert_relative_eq!(eval("log(exp(x))"), 2.0, epsilon = 1e-12);
    assert_relative_eq!(eval("ln(y)"), 3.0_f64.ln(), epsilon = 1e-12);
    assert_relative_eq!(eval("log10(z)"), 4.0_f64.log10(), epsilon = 1e-12);
    assert_eq!(eval("sqrt(z)"), 2.0);
    assert_eq!(eval("abs(-x)"), 2.0);
    assert_eq!(eval("max(x, y, z)"), 4.0);
    assert_eq!(eval("min(x, y, z)"), 2.0);

    // constants, unless shadowed
    assert_relative_eq!(eval("2 * pi"), std::f64::consts::TAU, epsilon = 1e-12);
    assert_eq!(eval("inf"), f64::INFINITY);
    let shadowed = context(&[("pi", 3.0)]);
    assert_eq!(Expression::parse("pi").unwrap().evaluate(&shadowed).unwrap(), 3.0);
}

#[test]
fn test_expression_evaluation_errors() {
    let ctx = context(&[("x", 2.0)]);

    match Expression::parse("y").unwrap().evaluate(&ctx) {
        Err(ExpressionError::UndefinedVariable { name }) => assert_eq!(name, "y"),
        other => panic!("Expected UndefinedVariable error, got {:?}", other),
    }
    assert_eq!(
        Expression::parse("x / 0").unwrap().evaluate(&ctx),
        Err(ExpressionError::DivisionByZero)
    );
    assert!(matches!(
        Expression::parse("sin(x, x)").unwrap().evaluate(&ctx),
        Err(ExpressionError::InvalidOperation { .. })
    ));
    assert!(matches!(
        Expression::parse("max(x)").unwrap().evaluate(&ctx),
        Err(ExpressionError::InvalidOperation { .. })
    ));
}

#[test]
fn test_expression_context_implementations() {
    let mut map = HashMap::new();
    map.insert("a".to_string(), 4.0);
    assert!(map.has_variable("a"));
    assert!(map.get_variable("b").is_err());

    let ctx = SimpleContext::with_variables(map);
    assert_eq!(Expression::parse("a / 2").unwrap().evaluate(&ctx).unwrap(), 2.0);

    // A parameter set is a context of its stored values
    let mut params = Parameters::new();
    params.add_param("l_sigma", 0.25).unwrap();
    let expr = Expression::parse("2 * l_sigma").unwrap();
    assert_eq!(expr.evaluate(&params).unwrap(), 0.5);
}

#[test]
fn test_rename_and_display() {
    let expr = Expression::parse("0.3183099 * amplitude / max(1e-15, sigma)").unwrap();

    let mapping: HashMap<String, String> = [("amplitude", "l_amplitude"), ("sigma", "l_sigma")]
        .iter()
        .map(|(a, b)| (a.to_string(), b.to_string()))
        .collect();
    let renamed = expr.rename_variables(&mapping);
    assert_eq!(renamed.variables(), vec!["l_amplitude", "l_sigma"]);

    // Display re-emits a parseable, equivalent expression
    let reparsed = Expression::parse(&renamed.to_string()).unwrap();
    let ctx = context(&[("l_amplitude", 2.0), ("l_sigma", 0.5)]);
    assert_relative_eq!(
        reparsed.evaluate(&ctx).unwrap(),
        renamed.evaluate(&ctx).unwrap(),
        epsilon = 1e-15
    );
}
