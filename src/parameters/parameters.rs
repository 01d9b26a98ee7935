//! Parameters collection implementation
//!
//! This module provides the [`Parameters`] set: an insertion-ordered,
//! name-unique collection of [`Parameter`]s with dependency-ordered expression
//! evaluation, atomic setters and change notification.

use crate::error::{QefError, Result as QefResult};
use crate::parameters::expression::{EvaluationContext, Expression, ExpressionError};
use crate::parameters::observer::{
    ChangeSource, FieldValue, ObserverId, Observers, ParamField, ParameterChange,
    ParameterObserver,
};
use crate::parameters::parameter::{Parameter, ParameterError};
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, VecDeque};
use std::fmt;
use std::fs;
use std::path::Path;
use std::sync::Arc;

/// Resolved numeric value of every parameter in a set
///
/// Produced by [`Parameters::evaluate`]; models read their arguments from it.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ParamValues(HashMap<String, f64>);

impl ParamValues {
    pub fn new() -> Self {
        Self::default()
    }

    /// Value of `name`, or `ParameterNotFound`
    pub fn get(&self, name: &str) -> Result<f64, ParameterError> {
        self.0
            .get(name)
            .copied()
            .ok_or_else(|| ParameterError::ParameterNotFound {
                name: name.to_string(),
            })
    }

    pub fn insert(&mut self, name: &str, value: f64) {
        self.0.insert(name.to_string(), value);
    }

    pub fn contains(&self, name: &str) -> bool {
        self.0.contains_key(name)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &f64)> {
        self.0.iter()
    }
}

impl FromIterator<(String, f64)> for ParamValues {
    fn from_iter<I: IntoIterator<Item = (String, f64)>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}

impl EvaluationContext for ParamValues {
    fn get_variable(&self, name: &str) -> Result<f64, ExpressionError> {
        self.0
            .get(name)
            .copied()
            .ok_or_else(|| ExpressionError::UndefinedVariable {
                name: name.to_string(),
            })
    }

    fn has_variable(&self, name: &str) -> bool {
        self.0.contains_key(name)
    }
}

/// A batch of field changes applied atomically by [`Parameters::set`]
///
/// # Examples
///
/// ```
/// use qef_rs::parameters::{ParamUpdate, Parameters};
///
/// let mut params = Parameters::new();
/// params.add_param("sigma", 1.0).unwrap();
/// params
///     .set("sigma", ParamUpdate::new().min(0.0).max(5.0).value(2.0))
///     .unwrap();
/// assert_eq!(params.get("sigma").unwrap().value(), 2.0);
/// ```
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ParamUpdate {
    pub value: Option<f64>,
    pub min: Option<f64>,
    pub max: Option<f64>,
    pub vary: Option<bool>,
    /// `Some(None)` or `Some(Some(""))` removes the expression
    pub expr: Option<Option<String>>,
}

impl ParamUpdate {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn value(mut self, value: f64) -> Self {
        self.value = Some(value);
        self
    }

    pub fn min(mut self, min: f64) -> Self {
        self.min = Some(min);
        self
    }

    pub fn max(mut self, max: f64) -> Self {
        self.max = Some(max);
        self
    }

    pub fn vary(mut self, vary: bool) -> Self {
        self.vary = Some(vary);
        self
    }

    pub fn expr(mut self, expr: &str) -> Self {
        self.expr = Some(Some(expr.to_string()));
        self
    }

    pub fn clear_expr(mut self) -> Self {
        self.expr = Some(None);
        self
    }

    /// Apply to a parameter; bounds first, then value, expression and vary.
    fn apply(&self, param: &mut Parameter) -> Result<(), ParameterError> {
        if self.min.is_some() || self.max.is_some() {
            let min = self.min.unwrap_or_else(|| param.min());
            let max = self.max.unwrap_or_else(|| param.max());
            param.set_bounds(min, max)?;
        }
        if let Some(value) = self.value {
            param.set_value(value)?;
        }
        if let Some(expr) = &self.expr {
            param.set_expr(expr.as_deref())?;
        }
        if let Some(vary) = self.vary {
            param.set_vary(vary)?;
        }
        Ok(())
    }
}

/// An ordered, name-unique collection of parameters
///
/// Cloning yields an independent deep copy without observers.
#[derive(Serialize, Deserialize)]
#[serde(try_from = "ParametersRepr", into = "ParametersRepr")]
pub struct Parameters {
    params: Vec<Parameter>,
    index: HashMap<String, usize>,
    observers: Observers,
}

/// Alias naming the collection by its role
pub type ParameterSet = Parameters;

#[derive(Serialize, Deserialize)]
struct ParametersRepr {
    params: Vec<Parameter>,
}

impl TryFrom<ParametersRepr> for Parameters {
    type Error = ParameterError;

    fn try_from(repr: ParametersRepr) -> Result<Self, Self::Error> {
        let mut params = Parameters::new();
        for param in repr.params {
            params.add(param)?;
        }
        Ok(params)
    }
}

impl From<Parameters> for ParametersRepr {
    fn from(params: Parameters) -> Self {
        Self {
            params: params.params,
        }
    }
}

impl Clone for Parameters {
    fn clone(&self) -> Self {
        Self {
            params: self.params.clone(),
            index: self.index.clone(),
            observers: Observers::default(),
        }
    }
}

impl fmt::Debug for Parameters {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Parameters")
            .field("params", &self.params)
            .field("observers", &self.observers)
            .finish()
    }
}

impl Default for Parameters {
    fn default() -> Self {
        Self::new()
    }
}

impl Parameters {
    /// Create a new empty parameters collection
    pub fn new() -> Self {
        Self {
            params: Vec::new(),
            index: HashMap::new(),
            observers: Observers::default(),
        }
    }

    /// Add a parameter; fails with `DuplicateName` if the name is taken
    ///
    /// # Examples
    ///
    /// ```
    /// use qef_rs::parameters::{Parameter, Parameters, ParameterError};
    ///
    /// let mut params = Parameters::new();
    /// params.add(Parameter::new("amplitude", 10.0)).unwrap();
    /// assert!(matches!(
    ///     params.add(Parameter::new("amplitude", 1.0)),
    ///     Err(ParameterError::DuplicateName { .. })
    /// ));
    /// ```
    pub fn add(&mut self, param: Parameter) -> Result<(), ParameterError> {
        if self.index.contains_key(param.name()) {
            return Err(ParameterError::DuplicateName {
                name: param.name().to_string(),
            });
        }

        self.index.insert(param.name().to_string(), self.params.len());
        self.params.push(param);
        Ok(())
    }

    /// Add a free, unbounded parameter
    pub fn add_param(&mut self, name: &str, value: f64) -> Result<(), ParameterError> {
        self.add(Parameter::new(name, value))
    }

    /// Add a bounded parameter
    pub fn add_param_with_bounds(
        &mut self,
        name: &str,
        value: f64,
        min: f64,
        max: f64,
    ) -> Result<(), ParameterError> {
        self.add(Parameter::with_bounds(name, value, min, max)?)
    }

    /// Add an expression-backed parameter
    pub fn add_param_with_expr(
        &mut self,
        name: &str,
        value: f64,
        expr: &str,
    ) -> Result<(), ParameterError> {
        self.add(Parameter::with_expr(name, value, expr)?)
    }

    /// Merge another set into this one
    ///
    /// Nothing is merged if any name clashes.
    pub fn extend(&mut self, other: Parameters) -> Result<(), ParameterError> {
        if let Some(clash) = other.params.iter().find(|p| self.contains(p.name())) {
            return Err(ParameterError::DuplicateName {
                name: clash.name().to_string(),
            });
        }

        for param in other.params {
            self.add(param)?;
        }
        Ok(())
    }

    pub fn get(&self, name: &str) -> Option<&Parameter> {
        self.index.get(name).map(|&i| &self.params[i])
    }

    pub fn contains(&self, name: &str) -> bool {
        self.index.contains_key(name)
    }

    /// Remove a parameter, keeping the order of the others
    pub fn remove(&mut self, name: &str) -> Option<Parameter> {
        let position = self.index.remove(name)?;
        let removed = self.params.remove(position);
        self.rebuild_index();
        Some(removed)
    }

    fn rebuild_index(&mut self) {
        self.index = self
            .params
            .iter()
            .enumerate()
            .map(|(i, p)| (p.name().to_string(), i))
            .collect();
    }

    pub fn len(&self) -> usize {
        self.params.len()
    }

    pub fn is_empty(&self) -> bool {
        self.params.is_empty()
    }

    /// Parameter names in insertion order
    pub fn names(&self) -> Vec<String> {
        self.params.iter().map(|p| p.name().to_string()).collect()
    }

    /// Iterate over parameters in insertion order
    pub fn iter(&self) -> impl Iterator<Item = &Parameter> {
        self.params.iter()
    }

    /// Parameters varied by the optimizer
    pub fn varying(&self) -> Vec<&Parameter> {
        self.params.iter().filter(|p| p.vary()).collect()
    }

    pub fn varying_names(&self) -> Vec<String> {
        self.varying().iter().map(|p| p.name().to_string()).collect()
    }

    /// Parameters held fixed (neither varied nor expression-backed)
    pub fn fixed(&self) -> Vec<&Parameter> {
        self.params
            .iter()
            .filter(|p| !p.vary() && p.expr().is_none())
            .collect()
    }

    // Setters ------------------------------------------------------------

    /// Apply `update` to the named parameter
    ///
    /// The update is applied to a copy and committed only if every field is
    /// valid, so a failed call leaves the set untouched. Observers are told
    /// about every field that actually changed.
    pub fn set(&mut self, name: &str, update: ParamUpdate) -> Result<(), ParameterError> {
        let position = self.position(name)?;

        let mut candidate = self.params[position].clone();
        update.apply(&mut candidate)?;

        let changes = field_changes(&self.params[position], &candidate, ChangeSource::Setter);
        self.params[position] = candidate;
        self.observers.notify(&changes);
        Ok(())
    }

    pub fn set_value(&mut self, name: &str, value: f64) -> Result<(), ParameterError> {
        self.set(name, ParamUpdate::new().value(value))
    }

    pub fn set_min(&mut self, name: &str, min: f64) -> Result<(), ParameterError> {
        self.set(name, ParamUpdate::new().min(min))
    }

    pub fn set_max(&mut self, name: &str, max: f64) -> Result<(), ParameterError> {
        self.set(name, ParamUpdate::new().max(max))
    }

    pub fn set_bounds(&mut self, name: &str, min: f64, max: f64) -> Result<(), ParameterError> {
        self.set(name, ParamUpdate::new().min(min).max(max))
    }

    pub fn set_vary(&mut self, name: &str, vary: bool) -> Result<(), ParameterError> {
        self.set(name, ParamUpdate::new().vary(vary))
    }

    /// Set or clear (`None` or `""`) the expression of a parameter
    pub fn set_expr(&mut self, name: &str, expr: Option<&str>) -> Result<(), ParameterError> {
        let update = match expr {
            Some(text) => ParamUpdate::new().expr(text),
            None => ParamUpdate::new().clear_expr(),
        };
        self.set(name, update)
    }

    pub fn set_stderr(&mut self, name: &str, stderr: Option<f64>) -> Result<(), ParameterError> {
        let position = self.position(name)?;
        let mut candidate = self.params[position].clone();
        candidate.set_stderr(stderr);
        self.commit(position, candidate, ChangeSource::Setter);
        Ok(())
    }

    /// Copy values and standard errors from a best-fit set
    ///
    /// Names missing from either set are skipped.
    pub fn update_from(&mut self, fitted: &Parameters) {
        let mut changes = Vec::new();
        for position in 0..self.params.len() {
            let Some(source) = fitted.get(self.params[position].name()) else {
                continue;
            };
            let mut candidate = self.params[position].clone();
            candidate.set_derived_value(source.value());
            candidate.set_stderr(source.stderr());
            changes.extend(field_changes(
                &self.params[position],
                &candidate,
                ChangeSource::Fit,
            ));
            self.params[position] = candidate;
        }
        self.observers.notify(&changes);
    }

    /// Restore the initial value of every parameter without an expression
    pub fn reset(&mut self) {
        let mut changes = Vec::new();
        for param in self.params.iter_mut().filter(|p| p.expr().is_none()) {
            let before = param.clone();
            param.reset();
            changes.extend(field_changes(&before, param, ChangeSource::Reset));
        }
        self.observers.notify(&changes);
    }

    fn commit(&mut self, position: usize, candidate: Parameter, source: ChangeSource) {
        let changes = field_changes(&self.params[position], &candidate, source);
        self.params[position] = candidate;
        self.observers.notify(&changes);
    }

    fn position(&self, name: &str) -> Result<usize, ParameterError> {
        self.index
            .get(name)
            .copied()
            .ok_or_else(|| ParameterError::ParameterNotFound {
                name: name.to_string(),
            })
    }

    // Observers ----------------------------------------------------------

    /// Register a callback invoked after every committed change
    ///
    /// # Examples
    ///
    /// ```
    /// use qef_rs::parameters::{ParameterChange, Parameters};
    /// use std::sync::{Arc, Mutex};
    ///
    /// let seen = Arc::new(Mutex::new(Vec::new()));
    /// let sink = Arc::clone(&seen);
    ///
    /// let mut params = Parameters::new();
    /// params.add_param("a", 1.0).unwrap();
    /// params.subscribe(move |change: &ParameterChange| {
    ///     sink.lock().unwrap().push(change.name.clone());
    /// });
    /// params.set_value("a", 2.0).unwrap();
    /// assert_eq!(*seen.lock().unwrap(), vec!["a".to_string()]);
    /// ```
    pub fn subscribe<O>(&mut self, observer: O) -> ObserverId
    where
        O: ParameterObserver + 'static,
    {
        self.observers.subscribe(Arc::new(observer))
    }

    /// Remove an observer; returns false if the id was unknown
    pub fn unsubscribe(&mut self, id: ObserverId) -> bool {
        self.observers.unsubscribe(id)
    }

    pub fn observer_count(&self) -> usize {
        self.observers.len()
    }

    // Expressions --------------------------------------------------------

    /// Direct dependencies of a parameter: the set members its expression uses
    pub fn dependencies(&self, name: &str) -> Result<Vec<String>, ParameterError> {
        let position = self.position(name)?;
        let vars = match self.params[position].parsed_expr()? {
            Some(expr) => expr.variables(),
            None => Vec::new(),
        };
        Ok(vars.into_iter().filter(|v| self.contains(v)).collect())
    }

    /// Parameters whose expression references `name` directly
    pub fn dependents(&self, name: &str) -> Vec<String> {
        self.params
            .iter()
            .filter(|p| {
                matches!(p.parsed_expr(), Ok(Some(expr)) if expr.variables().iter().any(|v| v == name))
            })
            .map(|p| p.name().to_string())
            .collect()
    }

    /// Resolve the value of every parameter
    ///
    /// Parameters without an expression contribute their stored value.
    /// Expression-backed parameters are evaluated after everything they
    /// reference; a dependency cycle fails with `CyclicConstraint` listing
    /// its members in order. The set itself is not modified.
    pub fn evaluate(&self) -> Result<ParamValues, ParameterError> {
        let mut values = ParamValues::new();
        let mut pending: Vec<(usize, Expression)> = Vec::new();

        for (i, param) in self.params.iter().enumerate() {
            match param.parsed_expr()? {
                Some(expr) => pending.push((i, expr)),
                None => values.insert(param.name(), param.value()),
            }
        }

        if pending.is_empty() {
            return Ok(values);
        }

        // Edges between expression-backed parameters only; everything else
        // is already resolved.
        let slot: HashMap<&str, usize> = pending
            .iter()
            .enumerate()
            .map(|(slot, (i, _))| (self.params[*i].name(), slot))
            .collect();
        let deps: Vec<Vec<usize>> = pending
            .iter()
            .map(|(_, expr)| {
                expr.variables()
                    .iter()
                    .filter_map(|v| slot.get(v.as_str()).copied())
                    .collect()
            })
            .collect();

        let mut in_degree: Vec<usize> = deps.iter().map(Vec::len).collect();
        let mut dependents = vec![Vec::new(); pending.len()];
        for (slot, slot_deps) in deps.iter().enumerate() {
            for &dep in slot_deps {
                dependents[dep].push(slot);
            }
        }

        let mut ready: VecDeque<usize> = (0..pending.len()).filter(|&s| in_degree[s] == 0).collect();
        let mut order = Vec::with_capacity(pending.len());

        while let Some(current) = ready.pop_front() {
            let (i, expr) = &pending[current];
            let name = self.params[*i].name();
            let value = expr
                .evaluate(&values)
                .map_err(|source| ParameterError::ExpressionEvaluation {
                    name: name.to_string(),
                    source,
                })?;
            values.insert(name, value);
            order.push(name);

            for &next in &dependents[current] {
                in_degree[next] -= 1;
                if in_degree[next] == 0 {
                    ready.push_back(next);
                }
            }
        }

        if order.len() < pending.len() {
            let cycle = find_cycle(&deps, &in_degree)
                .into_iter()
                .map(|slot| self.params[pending[slot].0].name().to_string())
                .collect();
            return Err(ParameterError::CyclicConstraint { names: cycle });
        }

        tracing::trace!(order = ?order, "evaluated constraint expressions");
        Ok(values)
    }

    /// Evaluate expressions and store the derived values in the set
    pub fn update_expressions(&mut self) -> Result<ParamValues, ParameterError> {
        let values = self.evaluate()?;

        let mut changes = Vec::new();
        for param in self.params.iter_mut().filter(|p| p.expr().is_some()) {
            let before = param.clone();
            param.set_derived_value(values.get(param.name())?);
            changes.extend(field_changes(&before, param, ChangeSource::Expression));
        }
        self.observers.notify(&changes);

        Ok(values)
    }

    /// Check evaluated values against each parameter's bounds
    ///
    /// Reports the first offending parameter in insertion order; values are
    /// never clamped.
    pub fn check_bounds(&self, values: &ParamValues) -> Result<(), ParameterError> {
        for param in &self.params {
            let value = values.get(param.name())?;
            if !param.bounds().is_within_bounds(value) {
                return Err(ParameterError::OutOfBounds {
                    name: param.name().to_string(),
                    value,
                    min: param.min(),
                    max: param.max(),
                });
            }
        }
        Ok(())
    }

    // Optimizer interface -------------------------------------------------

    /// Internal (unbounded) coordinates of the varying parameters, in order
    pub fn varying_internal_values(&self) -> Result<Vec<f64>, ParameterError> {
        self.params
            .iter()
            .filter(|p| p.vary())
            .map(Parameter::to_internal)
            .collect()
    }

    /// Copy of the set with the varying parameters moved to `internal`
    pub fn with_internal_values(&self, internal: &[f64]) -> QefResult<Parameters> {
        let nvarys = self.params.iter().filter(|p| p.vary()).count();
        if internal.len() != nvarys {
            return Err(QefError::ShapeMismatch(format!(
                "expected {} internal values, got {}",
                nvarys,
                internal.len()
            )));
        }

        let mut updated = self.clone();
        for (param, &x) in updated.params.iter_mut().filter(|p| p.vary()).zip(internal) {
            let value = param.from_internal(x);
            param.set_derived_value(value);
        }

        Ok(updated)
    }

    // Serialization ---------------------------------------------------------

    /// Serialize to a pretty-printed JSON string
    pub fn to_json(&self) -> QefResult<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// Parse a set from JSON produced by [`Parameters::to_json`]
    pub fn from_json(json: &str) -> QefResult<Self> {
        Ok(serde_json::from_str(json)?)
    }

    pub fn save_json<P: AsRef<Path>>(&self, path: P) -> QefResult<()> {
        fs::write(path, self.to_json()?)?;
        Ok(())
    }

    pub fn load_json<P: AsRef<Path>>(path: P) -> QefResult<Self> {
        let contents = fs::read_to_string(path)?;
        Self::from_json(&contents)
    }
}

impl EvaluationContext for Parameters {
    fn get_variable(&self, name: &str) -> Result<f64, ExpressionError> {
        self.get(name)
            .map(Parameter::value)
            .ok_or_else(|| ExpressionError::UndefinedVariable {
                name: name.to_string(),
            })
    }

    fn has_variable(&self, name: &str) -> bool {
        self.contains(name)
    }
}

impl<'a> IntoIterator for &'a Parameters {
    type Item = &'a Parameter;
    type IntoIter = std::slice::Iter<'a, Parameter>;

    fn into_iter(self) -> Self::IntoIter {
        self.params.iter()
    }
}

/// Walk unresolved dependencies until a node repeats and return the loop.
fn find_cycle(deps: &[Vec<usize>], in_degree: &[usize]) -> Vec<usize> {
    let unresolved = |slot: usize| in_degree[slot] > 0;
    let Some(start) = (0..deps.len()).find(|&s| unresolved(s)) else {
        return Vec::new();
    };

    let mut path = vec![start];
    let mut current = start;
    loop {
        // An unresolved node always has an unresolved dependency.
        let Some(&next) = deps[current].iter().find(|&&d| unresolved(d)) else {
            return path;
        };
        if let Some(pos) = path.iter().position(|&s| s == next) {
            return path.split_off(pos);
        }
        path.push(next);
        current = next;
    }
}

fn field_changes(old: &Parameter, new: &Parameter, source: ChangeSource) -> Vec<ParameterChange> {
    let mut changes = Vec::new();
    let mut push = |field, old_value: FieldValue, new_value: FieldValue| {
        if old_value != new_value {
            changes.push(ParameterChange {
                name: new.name().to_string(),
                field,
                old: old_value,
                new: new_value,
                source,
            });
        }
    };

    push(
        ParamField::Value,
        FieldValue::Float(old.value()),
        FieldValue::Float(new.value()),
    );
    push(
        ParamField::Min,
        FieldValue::Float(old.min()),
        FieldValue::Float(new.min()),
    );
    push(
        ParamField::Max,
        FieldValue::Float(old.max()),
        FieldValue::Float(new.max()),
    );
    push(
        ParamField::Vary,
        FieldValue::Bool(old.vary()),
        FieldValue::Bool(new.vary()),
    );
    push(
        ParamField::Expr,
        FieldValue::Text(old.expr().map(str::to_string)),
        FieldValue::Text(new.expr().map(str::to_string)),
    );
    push(
        ParamField::Stderr,
        FieldValue::Optional(old.stderr()),
        FieldValue::Optional(new.stderr()),
    );

    changes
}
