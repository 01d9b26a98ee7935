//! Model trait and basic model implementations.
//!
//! A model is a pure function of an independent variable and a set of named
//! parameters. Models own no parameter values: every evaluation receives the
//! caller's [`Parameters`] (or the [`ParamValues`] resolved from them), so one
//! model graph can be evaluated against many parameter sets.
//!
//! Each model owns a prefix. The parameter `sigma` of a model with prefix
//! `l_` is named `l_sigma` in every parameter set, which keeps names unique
//! when models are combined.

use crate::error::{QefError, Result};
use crate::parameters::{Expression, ParamHint, ParamHints, ParamValues, Parameter, Parameters};
use ndarray::Array1;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

/// A trait representing a model that can be fit to data.
pub trait Model: Send + Sync {
    /// Prefix prepended to every parameter name of this model.
    fn prefix(&self) -> &str;

    /// Name of the independent variable (usually `"x"` or `"e"`).
    fn independent_var(&self) -> &str;

    /// Prefixed names of the parameters the function takes, in declaration order.
    fn param_names(&self) -> Vec<String>;

    /// Evaluates the model for already-resolved parameter values.
    ///
    /// # Arguments
    ///
    /// * `values` - Resolved values, keyed by prefixed name
    /// * `x` - The independent variable values
    fn eval_values(&self, values: &ParamValues, x: &Array1<f64>) -> Result<Array1<f64>>;

    /// Builds a fresh parameter set from the declared names and hints.
    fn make_params(&self) -> Result<Parameters>;

    /// Merges a hint into the defaults used by `make_params`.
    ///
    /// `name` may be given with or without the model's prefix.
    fn set_param_hint(&mut self, name: &str, hint: ParamHint) -> Result<()>;

    /// Estimates initial parameter values from observed data.
    ///
    /// # Arguments
    ///
    /// * `y` - The observed dependent variable values
    /// * `x` - The independent variable values
    fn guess(&self, y: &Array1<f64>, x: &Array1<f64>) -> Result<Parameters>;

    /// Clones the model behind a box.
    fn clone_box(&self) -> Box<dyn Model>;

    /// Short human-readable description.
    fn name(&self) -> String;

    /// Evaluates each leaf model separately, keyed by prefix.
    fn eval_components(
        &self,
        values: &ParamValues,
        x: &Array1<f64>,
    ) -> Result<Vec<(String, Array1<f64>)>> {
        Ok(vec![(self.prefix().to_string(), self.eval_values(values, x)?)])
    }

    /// Evaluates the model: resolves constraint expressions, then the function.
    fn eval(&self, params: &Parameters, x: &Array1<f64>) -> Result<Array1<f64>> {
        let values = params.evaluate()?;
        self.eval_values(&values, x)
    }

    /// Calculates the residuals `y - model`.
    fn residuals(&self, params: &Parameters, x: &Array1<f64>, y: &Array1<f64>) -> Result<Array1<f64>> {
        let y_pred = self.eval(params, x)?;

        if y.len() != y_pred.len() {
            return Err(QefError::ShapeMismatch(format!(
                "Expected {} observed values, got {}",
                y_pred.len(),
                y.len()
            )));
        }

        Ok(y - &y_pred)
    }

    /// True if `name` is one of the parameters `make_params` would create.
    fn has_param(&self, name: &str) -> bool {
        self.make_params()
            .map(|params| params.contains(name))
            .unwrap_or(false)
    }
}

impl Clone for Box<dyn Model> {
    fn clone(&self) -> Self {
        self.clone_box()
    }
}

impl fmt::Debug for dyn Model {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Model({})", self.name())
    }
}

/// Evaluates `model` over `x` with the given parameters.
///
/// This is the function an optimizer calls repeatedly.
pub fn evaluate(model: &dyn Model, params: &Parameters, x: &Array1<f64>) -> Result<Array1<f64>> {
    model.eval(params, x)
}

/// Declared parameters, prefix, independent variable and hints of a leaf model.
#[derive(Debug, Clone, PartialEq)]
pub struct ModelSignature {
    prefix: String,
    independent_var: String,
    params: Vec<String>,
    hints: ParamHints,
}

impl ModelSignature {
    /// Creates a signature with no prefix and independent variable `x`.
    pub fn new(params: &[&str]) -> Self {
        Self {
            prefix: String::new(),
            independent_var: "x".to_string(),
            params: params.iter().map(|p| p.to_string()).collect(),
            hints: ParamHints::new(),
        }
    }

    pub fn with_prefix(mut self, prefix: &str) -> Self {
        self.prefix = prefix.to_string();
        self
    }

    pub fn with_independent_var(mut self, name: &str) -> Self {
        self.independent_var = name.to_string();
        self
    }

    /// Adds a hint; its expression is checked when parameters are made.
    pub fn with_hint(mut self, name: &str, hint: ParamHint) -> Self {
        self.hints.set(name, hint);
        self
    }

    pub fn prefix(&self) -> &str {
        &self.prefix
    }

    pub fn set_prefix(&mut self, prefix: &str) {
        self.prefix = prefix.to_string();
    }

    pub fn independent_var(&self) -> &str {
        &self.independent_var
    }

    /// Declared base names
    pub fn base_names(&self) -> &[String] {
        &self.params
    }

    pub fn hints(&self) -> &ParamHints {
        &self.hints
    }

    pub fn prefixed(&self, base: &str) -> String {
        format!("{}{}", self.prefix, base)
    }

    pub fn param_names(&self) -> Vec<String> {
        self.params.iter().map(|p| self.prefixed(p)).collect()
    }

    fn base_name<'a>(&self, name: &'a str) -> &'a str {
        if self.prefix.is_empty() {
            return name;
        }
        name.strip_prefix(self.prefix.as_str()).unwrap_or(name)
    }

    /// Merges `hint` into the hint for `name` (prefixed or base name).
    pub fn set_hint(&mut self, name: &str, hint: ParamHint) -> Result<()> {
        if let Some(expr) = &hint.expr {
            if !expr.trim().is_empty() {
                Expression::parse(expr)?;
            }
        }
        let base = self.base_name(name).to_string();
        self.hints.set(&base, hint);
        Ok(())
    }

    /// Rewrites a hint expression from base names to prefixed names.
    fn prefix_expression(&self, expr: &str) -> Result<String> {
        if self.prefix.is_empty() {
            return Ok(expr.to_string());
        }

        let mapping: HashMap<String, String> = self
            .params
            .iter()
            .map(String::as_str)
            .chain(self.hints.iter().map(|(name, _)| name))
            .map(|base| (base.to_string(), self.prefixed(base)))
            .collect();

        Ok(Expression::parse(expr)?.rename_variables(&mapping).to_string())
    }

    /// Creates one parameter per declared name, then one per hint-only name.
    pub fn make_params(&self) -> Result<Parameters> {
        let mut params = Parameters::new();
        let empty = ParamHint::default();

        let hint_only = self
            .hints
            .iter()
            .map(|(name, _)| name)
            .filter(|name| !self.params.iter().any(|p| p == name));

        for base in self.params.iter().map(String::as_str).chain(hint_only) {
            let hint = self.hints.get(base).unwrap_or(&empty);
            let mut param = Parameter::with_bounds(
                &self.prefixed(base),
                hint.value.unwrap_or(0.0),
                hint.min.unwrap_or(f64::NEG_INFINITY),
                hint.max.unwrap_or(f64::INFINITY),
            )?;
            if let Some(vary) = hint.vary {
                param.set_vary(vary)?;
            }
            if let Some(expr) = hint.expr.as_deref().filter(|e| !e.trim().is_empty()) {
                param.set_expr(Some(&self.prefix_expression(expr)?))?;
            }
            params.add(param)?;
        }

        Ok(params)
    }

    /// `make_params` with the given base-name values, clamped into their bounds.
    pub fn guess_params(&self, guesses: &[(&str, f64)]) -> Result<Parameters> {
        let mut params = self.make_params()?;
        for (base, value) in guesses {
            let name = self.prefixed(base);
            let bounds = *params
                .get(&name)
                .ok_or_else(|| QefError::InvalidInput(format!("no parameter '{}'", name)))?
                .bounds();
            params.set_value(&name, bounds.clamp(*value))?;
        }
        Ok(params)
    }
}

/// Arguments of a leaf model function: resolved values seen through the prefix.
#[derive(Debug, Clone, Copy)]
pub struct ModelArgs<'a> {
    values: &'a ParamValues,
    signature: &'a ModelSignature,
}

impl<'a> ModelArgs<'a> {
    pub fn new(values: &'a ParamValues, signature: &'a ModelSignature) -> Self {
        Self { values, signature }
    }

    /// Value of the parameter with base name `base`
    pub fn get(&self, base: &str) -> Result<f64> {
        Ok(self.values.get(&self.signature.prefixed(base))?)
    }
}

/// A leaf model: a function over `x` plus its signature.
///
/// Every `ModelFunction` is a [`Model`].
pub trait ModelFunction: Clone + Send + Sync + 'static {
    fn signature(&self) -> &ModelSignature;

    fn signature_mut(&mut self) -> &mut ModelSignature;

    /// Short name of the lineshape, e.g. `"gaussian"`.
    fn kind(&self) -> &str;

    fn function(&self, x: &Array1<f64>, args: &ModelArgs<'_>) -> Result<Array1<f64>>;

    /// Heuristic initial values; models without one report `NotImplemented`.
    fn initial_guess(&self, _y: &Array1<f64>, _x: &Array1<f64>) -> Result<Parameters> {
        Err(QefError::NotImplemented(format!(
            "{} model has no guess heuristic",
            self.kind()
        )))
    }
}

impl<T: ModelFunction> Model for T {
    fn prefix(&self) -> &str {
        self.signature().prefix()
    }

    fn independent_var(&self) -> &str {
        self.signature().independent_var()
    }

    fn param_names(&self) -> Vec<String> {
        self.signature().param_names()
    }

    fn eval_values(&self, values: &ParamValues, x: &Array1<f64>) -> Result<Array1<f64>> {
        let out = self.function(x, &ModelArgs::new(values, self.signature()))?;
        if out.len() != x.len() {
            return Err(QefError::ShapeMismatch(format!(
                "{} returned {} values for {} samples",
                self.name(),
                out.len(),
                x.len()
            )));
        }
        Ok(out)
    }

    fn make_params(&self) -> Result<Parameters> {
        self.signature().make_params()
    }

    fn set_param_hint(&mut self, name: &str, hint: ParamHint) -> Result<()> {
        self.signature_mut().set_hint(name, hint)
    }

    fn guess(&self, y: &Array1<f64>, x: &Array1<f64>) -> Result<Parameters> {
        if x.len() != y.len() {
            return Err(QefError::ShapeMismatch(format!(
                "x has {} samples but y has {}",
                x.len(),
                y.len()
            )));
        }
        if x.is_empty() {
            return Err(QefError::InvalidInput("cannot guess from empty data".to_string()));
        }
        self.initial_guess(y, x)
    }

    fn clone_box(&self) -> Box<dyn Model> {
        Box::new(self.clone())
    }

    fn name(&self) -> String {
        match self.prefix() {
            "" => self.kind().to_string(),
            prefix => format!("{}[{}]", self.kind(), prefix),
        }
    }
}

/// Signature of the closure wrapped by [`FnModel`]
pub type ModelFn = Arc<dyn Fn(&Array1<f64>, &ModelArgs<'_>) -> Result<Array1<f64>> + Send + Sync>;

/// Signature of an optional [`FnModel`] guess closure
pub type GuessFn =
    Arc<dyn Fn(&ModelSignature, &Array1<f64>, &Array1<f64>) -> Result<Parameters> + Send + Sync>;

/// A model built from a closure.
///
/// # Examples
///
/// ```
/// use ndarray::array;
/// use qef_rs::model::{FnModel, Model};
///
/// let model = FnModel::new("line", &["slope", "intercept"], |x, args| {
///     let slope = args.get("slope")?;
///     let intercept = args.get("intercept")?;
///     Ok(x.mapv(|v| slope * v + intercept))
/// })
/// .with_prefix("bg_");
///
/// let mut params = model.make_params().unwrap();
/// params.set_value("bg_slope", 2.0).unwrap();
/// let y = model.eval(&params, &array![0.0, 1.0]).unwrap();
/// assert_eq!(y, array![0.0, 2.0]);
/// ```
#[derive(Clone)]
pub struct FnModel {
    kind: String,
    signature: ModelSignature,
    func: ModelFn,
    guess: Option<GuessFn>,
}

impl FnModel {
    pub fn new<F>(kind: &str, params: &[&str], func: F) -> Self
    where
        F: Fn(&Array1<f64>, &ModelArgs<'_>) -> Result<Array1<f64>> + Send + Sync + 'static,
    {
        Self {
            kind: kind.to_string(),
            signature: ModelSignature::new(params),
            func: Arc::new(func),
            guess: None,
        }
    }

    pub fn with_prefix(mut self, prefix: &str) -> Self {
        self.signature.set_prefix(prefix);
        self
    }

    pub fn with_independent_var(mut self, name: &str) -> Self {
        self.signature = self.signature.with_independent_var(name);
        self
    }

    pub fn with_hint(mut self, name: &str, hint: ParamHint) -> Self {
        self.signature = self.signature.with_hint(name, hint);
        self
    }

    pub fn with_guess<G>(mut self, guess: G) -> Self
    where
        G: Fn(&ModelSignature, &Array1<f64>, &Array1<f64>) -> Result<Parameters>
            + Send
            + Sync
            + 'static,
    {
        self.guess = Some(Arc::new(guess));
        self
    }
}

impl fmt::Debug for FnModel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FnModel")
            .field("kind", &self.kind)
            .field("signature", &self.signature)
            .field("has_guess", &self.guess.is_some())
            .finish()
    }
}

impl ModelFunction for FnModel {
    fn signature(&self) -> &ModelSignature {
        &self.signature
    }

    fn signature_mut(&mut self) -> &mut ModelSignature {
        &mut self.signature
    }

    fn kind(&self) -> &str {
        &self.kind
    }

    fn function(&self, x: &Array1<f64>, args: &ModelArgs<'_>) -> Result<Array1<f64>> {
        (self.func)(x, args)
    }

    fn initial_guess(&self, y: &Array1<f64>, x: &Array1<f64>) -> Result<Parameters> {
        match &self.guess {
            Some(guess) => guess(&self.signature, y, x),
            None => Err(QefError::NotImplemented(format!(
                "{} model has no guess heuristic",
                self.kind
            ))),
        }
    }
}
