//! Tests for building models by name

use ndarray::Array1;
use qef_rs::model::{FnModel, Model};
use qef_rs::models::{CompositeModel, ModelRegistry, Operation};
use qef_rs::QefError;

#[test]
fn test_builtin_names_are_sorted_and_explicit() {
    assert!(ModelRegistry::new().names().is_empty());

    let registry = ModelRegistry::with_builtin_models();
    assert_eq!(
        registry.names(),
        vec![
            "constant",
            "delta_dirac",
            "gaussian",
            "linear",
            "lorentzian",
            "teixeira_water"
        ]
    );
}

#[test]
fn test_registry_models_combine() {
    let registry = ModelRegistry::with_builtin_models();
    let elastic = registry.create("delta_dirac", "el_").unwrap();
    let background = registry.create("linear", "bg_").unwrap();

    let model = CompositeModel::new(elastic, background, Operation::Add).unwrap();
    let params = model.make_params().unwrap();
    assert_eq!(
        params.names(),
        vec!["el_amplitude", "el_center", "bg_slope", "bg_intercept"]
    );
}

#[test]
fn test_factories_see_the_prefix() {
    let mut registry = ModelRegistry::new();
    registry.register("flat", |prefix| {
        if prefix.is_empty() {
            return Err(QefError::InvalidInput("flat needs a prefix".to_string()));
        }
        let model = FnModel::new("flat", &["level"], |x, args| {
            Ok(Array1::from_elem(x.len(), args.get("level")?))
        })
        .with_prefix(prefix);
        Ok(Box::new(model))
    });

    assert!(registry.create("flat", "").is_err());
    let model = registry.create("flat", "f_").unwrap();
    assert_eq!(model.param_names(), vec!["f_level"]);
    assert!(matches!(
        registry.create("flatt", "f_"),
        Err(QefError::UnknownModel(_))
    ));

    // later registrations replace earlier ones
    registry.register("flat", |prefix| {
        Ok(Box::new(qef_rs::models::constant_model(prefix)))
    });
    assert_eq!(registry.create("flat", "f_").unwrap().name(), "constant[f_]");
    assert!(format!("{:?}", registry).contains("flat"));
}
