//! Model algebra: combining two models into one.
//!
//! A [`CompositeModel`] evaluates both children over the same samples with
//! the same parameter values and combines the results elementwise. The
//! children's prefixed parameter names must be disjoint, so the composite's
//! parameter set is simply the union of theirs. Composites nest freely.

use crate::error::{QefError, Result};
use crate::model::Model;
use crate::parameters::{ParamHint, ParamValues, ParameterError, Parameters};
use ndarray::Array1;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Elementwise operation combining the outputs of two models.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Operation {
    Add,
    Subtract,
    Multiply,
    Divide,
}

impl Operation {
    pub fn apply(&self, left: &Array1<f64>, right: &Array1<f64>) -> Array1<f64> {
        match self {
            Operation::Add => left + right,
            Operation::Subtract => left - right,
            Operation::Multiply => left * right,
            Operation::Divide => left / right,
        }
    }

    pub fn symbol(&self) -> &'static str {
        match self {
            Operation::Add => "+",
            Operation::Subtract => "-",
            Operation::Multiply => "*",
            Operation::Divide => "/",
        }
    }
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.symbol())
    }
}

/// Union of both models' parameters.
///
/// # Errors
///
/// `ParameterCollision` listing every name the two sets share, and
/// `InvalidInput` when the models use different independent variables.
pub(crate) fn merge_params(left: &dyn Model, right: &dyn Model) -> Result<Parameters> {
    if left.independent_var() != right.independent_var() {
        return Err(QefError::InvalidInput(format!(
            "independent variables differ: '{}' and '{}'",
            left.independent_var(),
            right.independent_var()
        )));
    }

    let mut params = left.make_params()?;
    let other = right.make_params()?;

    let collisions: Vec<String> = other
        .names()
        .into_iter()
        .filter(|name| params.contains(name))
        .collect();
    if !collisions.is_empty() {
        return Err(QefError::ParameterCollision { names: collisions });
    }

    params.extend(other)?;
    Ok(params)
}

/// Forwards a hint to whichever child owns `name`.
pub(crate) fn forward_hint(
    left: &mut dyn Model,
    right: &mut dyn Model,
    name: &str,
    hint: ParamHint,
) -> Result<()> {
    if left.has_param(name) {
        left.set_param_hint(name, hint)
    } else if right.has_param(name) {
        right.set_param_hint(name, hint)
    } else {
        Err(ParameterError::ParameterNotFound {
            name: name.to_string(),
        }
        .into())
    }
}

pub(crate) fn check_same_length(
    left: &Array1<f64>,
    right: &Array1<f64>,
    context: &str,
) -> Result<()> {
    if left.len() != right.len() {
        return Err(QefError::ShapeMismatch(format!(
            "{}: {} and {} samples",
            context,
            left.len(),
            right.len()
        )));
    }
    Ok(())
}

/// Two models combined by an elementwise [`Operation`].
#[derive(Debug, Clone)]
pub struct CompositeModel {
    left: Box<dyn Model>,
    right: Box<dyn Model>,
    op: Operation,
}

impl CompositeModel {
    /// Combines two models.
    ///
    /// # Errors
    ///
    /// `ParameterCollision` if the children share a prefixed parameter name,
    /// `InvalidInput` if their independent variables differ.
    pub fn new(left: Box<dyn Model>, right: Box<dyn Model>, op: Operation) -> Result<Self> {
        merge_params(left.as_ref(), right.as_ref())?;
        tracing::debug!(
            left = %left.name(),
            right = %right.name(),
            op = %op,
            "created composite model"
        );
        Ok(Self { left, right, op })
    }

    pub fn left(&self) -> &dyn Model {
        self.left.as_ref()
    }

    pub fn right(&self) -> &dyn Model {
        self.right.as_ref()
    }

    pub fn operation(&self) -> Operation {
        self.op
    }
}

impl Model for CompositeModel {
    fn prefix(&self) -> &str {
        ""
    }

    fn independent_var(&self) -> &str {
        self.left.independent_var()
    }

    fn param_names(&self) -> Vec<String> {
        let mut names = self.left.param_names();
        names.extend(self.right.param_names());
        names
    }

    fn eval_values(&self, values: &ParamValues, x: &Array1<f64>) -> Result<Array1<f64>> {
        let left = self.left.eval_values(values, x)?;
        let right = self.right.eval_values(values, x)?;
        check_same_length(&left, &right, "composite operands differ in length")?;
        Ok(self.op.apply(&left, &right))
    }

    fn make_params(&self) -> Result<Parameters> {
        merge_params(self.left.as_ref(), self.right.as_ref())
    }

    fn set_param_hint(&mut self, name: &str, hint: ParamHint) -> Result<()> {
        forward_hint(self.left.as_mut(), self.right.as_mut(), name, hint)
    }

    /// Composite guesses are left to the caller: guess each component and
    /// merge the sets with [`Parameters::extend`].
    fn guess(&self, _y: &Array1<f64>, _x: &Array1<f64>) -> Result<Parameters> {
        Err(QefError::NotImplemented(format!(
            "guess for composite model {}",
            self.name()
        )))
    }

    fn clone_box(&self) -> Box<dyn Model> {
        Box::new(self.clone())
    }

    fn name(&self) -> String {
        format!("({} {} {})", self.left.name(), self.op, self.right.name())
    }

    fn eval_components(
        &self,
        values: &ParamValues,
        x: &Array1<f64>,
    ) -> Result<Vec<(String, Array1<f64>)>> {
        let mut components = self.left.eval_components(values, x)?;
        components.extend(self.right.eval_components(values, x)?);
        Ok(components)
    }
}

/// `left + right`
pub fn add<L: Model + 'static, R: Model + 'static>(left: L, right: R) -> Result<CompositeModel> {
    CompositeModel::new(Box::new(left), Box::new(right), Operation::Add)
}

/// `left - right`
pub fn subtract<L: Model + 'static, R: Model + 'static>(
    left: L,
    right: R,
) -> Result<CompositeModel> {
    CompositeModel::new(Box::new(left), Box::new(right), Operation::Subtract)
}

/// `left * right`
pub fn multiply<L: Model + 'static, R: Model + 'static>(
    left: L,
    right: R,
) -> Result<CompositeModel> {
    CompositeModel::new(Box::new(left), Box::new(right), Operation::Multiply)
}

/// `left / right`
pub fn divide<L: Model + 'static, R: Model + 'static>(left: L, right: R) -> Result<CompositeModel> {
    CompositeModel::new(Box::new(left), Box::new(right), Operation::Divide)
}
