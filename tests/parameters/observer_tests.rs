//! Tests for parameter change notifications
//!
//! An editor mirrors the set through change events and publishes its edits
//! back through the set's setters.

use qef_rs::parameters::{
    ChangeSource, FieldValue, ParamField, ParameterChange, Parameters,
};
use std::collections::HashMap;
use std::sync::mpsc;
use std::sync::{Arc, Mutex};

/// A read-only view of parameter values, kept current by notifications.
#[derive(Default)]
struct EditorView {
    values: HashMap<String, f64>,
    events: usize,
}

fn attach_view(params: &mut Parameters) -> Arc<Mutex<EditorView>> {
    let view = Arc::new(Mutex::new(EditorView::default()));
    {
        let mut v = view.lock().unwrap();
        for p in params.iter() {
            v.values.insert(p.name().to_string(), p.value());
        }
    }
    let sink = Arc::clone(&view);
    params.subscribe(move |change: &ParameterChange| {
        let mut v = sink.lock().unwrap();
        v.events += 1;
        if let (ParamField::Value, FieldValue::Float(value)) = (change.field, &change.new) {
            v.values.insert(change.name.clone(), *value);
        }
    });
    view
}

#[test]
fn test_view_follows_setters_and_expressions() {
    let mut params = Parameters::new();
    params.add_param("l_sigma", 0.1).unwrap();
    params.add_param_with_expr("l_fwhm", 0.0, "2 * l_sigma").unwrap();
    let view = attach_view(&mut params);

    params.set_value("l_sigma", 0.3).unwrap();
    params.update_expressions().unwrap();

    let v = view.lock().unwrap();
    assert_eq!(v.values["l_sigma"], 0.3);
    assert_eq!(v.values["l_fwhm"], 0.6);
    assert_eq!(v.events, 2);
}

#[test]
fn test_rejected_edit_is_silent() {
    let mut params = Parameters::new();
    params
        .add_param_with_bounds("tau", 1.0, 0.0, 10.0)
        .unwrap();
    let view = attach_view(&mut params);

    assert!(params.set_value("tau", -1.0).is_err());
    assert!(params.set_expr("tau", Some("2 *")).is_err());
    // setting a field to its current value commits nothing
    params.set_value("tau", 1.0).unwrap();

    assert_eq!(view.lock().unwrap().events, 0);
}

#[test]
fn test_editor_intents_go_through_setters() {
    let mut params = Parameters::new();
    params.add_param("center", 0.0).unwrap();

    let (tx, rx) = mpsc::channel::<ParameterChange>();
    let tx = Mutex::new(tx);
    params.subscribe(move |change: &ParameterChange| {
        tx.lock().unwrap().send(change.clone()).unwrap();
    });

    // a "user" edit in the editor becomes a setter call on the set
    let intent = 0.25;
    params.set_value("center", intent).unwrap();

    let event = rx.try_recv().unwrap();
    assert_eq!(event.name, "center");
    assert_eq!(event.old, FieldValue::Float(0.0));
    assert_eq!(event.new, FieldValue::Float(0.25));
    assert_eq!(event.source, ChangeSource::Setter);
    assert!(rx.try_recv().is_err());
}

#[test]
fn test_fit_results_are_reported_as_fit_changes() {
    let mut params = Parameters::new();
    params.add_param("amplitude", 1.0).unwrap();
    params.add_param("center", 0.0).unwrap();

    let log = Arc::new(Mutex::new(Vec::new()));
    let sink = Arc::clone(&log);
    let id = params.subscribe(move |change: &ParameterChange| {
        sink.lock().unwrap().push((change.name.clone(), change.field, change.source));
    });

    let mut fitted = params.clone();
    assert_eq!(fitted.observer_count(), 0);
    fitted.set_value("amplitude", 2.0).unwrap();
    fitted.set_stderr("amplitude", Some(0.1)).unwrap();

    params.update_from(&fitted);
    assert_eq!(
        *log.lock().unwrap(),
        vec![
            ("amplitude".to_string(), ParamField::Value, ChangeSource::Fit),
            ("amplitude".to_string(), ParamField::Stderr, ChangeSource::Fit),
        ]
    );

    assert!(params.unsubscribe(id));
    params.set_value("center", 1.0).unwrap();
    assert_eq!(log.lock().unwrap().len(), 2);
}
