//! Parameter definition and implementation
//!
//! This module provides the Parameter struct, the building block of the
//! parameter system. A parameter is a named scalar with bounds, a free/fixed
//! flag and an optional defining expression over other parameters.

use crate::parameters::bounds::{Bounds, BoundsError, BoundsTransform};
use crate::parameters::expression::{Expression, ExpressionError};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors that can occur when working with parameters
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ParameterError {
    #[error("Parameter '{name}' already exists")]
    DuplicateName { name: String },

    #[error("Parameter '{name}' not found")]
    ParameterNotFound { name: String },

    #[error("Value {value} of parameter '{name}' is outside bounds [{min}, {max}]")]
    OutOfBounds {
        name: String,
        value: f64,
        min: f64,
        max: f64,
    },

    #[error("Cyclic constraint between parameters: {}", names.join(" -> "))]
    CyclicConstraint { names: Vec<String> },

    #[error("Parameter '{name}' cannot have both an expression and be varied")]
    ExpressionAndVary { name: String },

    #[error("Invalid expression for parameter '{name}': {source}")]
    InvalidExpression {
        name: String,
        source: ExpressionError,
    },

    #[error("Cannot evaluate expression for parameter '{name}': {source}")]
    ExpressionEvaluation {
        name: String,
        source: ExpressionError,
    },

    #[error(transparent)]
    Bounds(#[from] BoundsError),

    #[error(transparent)]
    Expression(#[from] ExpressionError),
}

/// A named fit parameter
///
/// Invariant: `min <= value <= max` for every parameter that is not backed by
/// an expression, and an expression-backed parameter never varies.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Parameter {
    name: String,
    value: f64,
    init_value: f64,
    #[serde(default)]
    bounds: Bounds,
    vary: bool,
    #[serde(default)]
    expr: Option<String>,
    #[serde(default)]
    stderr: Option<f64>,
}

impl Parameter {
    /// Create a new free, unbounded parameter
    ///
    /// # Examples
    ///
    /// ```
    /// use qef_rs::parameters::parameter::Parameter;
    ///
    /// let param = Parameter::new("amplitude", 10.0);
    /// assert_eq!(param.name(), "amplitude");
    /// assert_eq!(param.value(), 10.0);
    /// assert!(param.vary());
    /// ```
    pub fn new(name: &str, value: f64) -> Self {
        Self {
            name: name.to_string(),
            value,
            init_value: value,
            bounds: Bounds::default(),
            vary: true,
            expr: None,
            stderr: None,
        }
    }

    /// Create a new parameter with bounds; the value is clamped into them
    ///
    /// # Examples
    ///
    /// ```
    /// use qef_rs::parameters::parameter::Parameter;
    ///
    /// let param = Parameter::with_bounds("sigma", -1.0, 0.0, f64::INFINITY).unwrap();
    /// assert_eq!(param.value(), 0.0);
    /// assert_eq!(param.min(), 0.0);
    /// ```
    pub fn with_bounds(name: &str, value: f64, min: f64, max: f64) -> Result<Self, ParameterError> {
        let bounds = Bounds::new(min, max)?;
        let value = bounds.clamp(value);

        Ok(Self {
            bounds,
            init_value: value,
            ..Self::new(name, value)
        })
    }

    /// Create a parameter whose value is derived from an expression
    ///
    /// The expression is validated here but evaluated by the owning set.
    ///
    /// # Examples
    ///
    /// ```
    /// use qef_rs::parameters::parameter::Parameter;
    ///
    /// let param = Parameter::with_expr("fwhm", 0.0, "2 * sigma").unwrap();
    /// assert!(!param.vary());
    /// assert_eq!(param.expr(), Some("2 * sigma"));
    /// ```
    pub fn with_expr(name: &str, value: f64, expr: &str) -> Result<Self, ParameterError> {
        let mut param = Self::new(name, value);
        param.set_expr(Some(expr))?;
        Ok(param)
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Current stored value
    ///
    /// For an expression-backed parameter this is the value from the last
    /// `Parameters::update_expressions` pass.
    pub fn value(&self) -> f64 {
        self.value
    }

    /// Accessor paired with [`Parameter::set_value`]
    pub fn get_value(&self) -> f64 {
        self.value
    }

    /// Set the value under manual control
    ///
    /// A value outside the bounds is rejected without mutation. Setting the
    /// value of an expression-backed parameter detaches the expression; `vary`
    /// keeps its current setting.
    pub fn set_value(&mut self, value: f64) -> Result<(), ParameterError> {
        if !self.bounds.is_within_bounds(value) {
            return Err(ParameterError::OutOfBounds {
                name: self.name.clone(),
                value,
                min: self.bounds.min,
                max: self.bounds.max,
            });
        }

        self.expr = None;
        self.value = value;
        Ok(())
    }

    /// Store a value computed from the expression, bypassing bound checks
    pub(crate) fn set_derived_value(&mut self, value: f64) {
        self.value = value;
    }

    /// Value captured at construction, used by `reset`
    pub fn init_value(&self) -> f64 {
        self.init_value
    }

    /// Restore the initial value, clamped into the current bounds
    pub fn reset(&mut self) {
        self.value = self.bounds.clamp(self.init_value);
    }

    pub fn vary(&self) -> bool {
        self.vary
    }

    /// Set whether the parameter is varied during optimization
    ///
    /// An expression-backed parameter cannot vary.
    pub fn set_vary(&mut self, vary: bool) -> Result<(), ParameterError> {
        if vary && self.expr.is_some() {
            return Err(ParameterError::ExpressionAndVary {
                name: self.name.clone(),
            });
        }

        self.vary = vary;
        Ok(())
    }

    pub fn min(&self) -> f64 {
        self.bounds.min
    }

    pub fn max(&self) -> f64 {
        self.bounds.max
    }

    pub fn bounds(&self) -> &Bounds {
        &self.bounds
    }

    /// Set both bounds; the current value is clamped into the new range
    pub fn set_bounds(&mut self, min: f64, max: f64) -> Result<(), ParameterError> {
        let bounds = Bounds::new(min, max)?;
        self.bounds = bounds;
        if self.expr.is_none() {
            self.value = bounds.clamp(self.value);
        }
        Ok(())
    }

    pub fn set_min(&mut self, min: f64) -> Result<(), ParameterError> {
        self.set_bounds(min, self.bounds.max)
    }

    pub fn set_max(&mut self, max: f64) -> Result<(), ParameterError> {
        self.set_bounds(self.bounds.min, max)
    }

    /// Expression defining this parameter, if any
    pub fn expr(&self) -> Option<&str> {
        self.expr.as_deref()
    }

    /// Set or clear the defining expression
    ///
    /// A non-empty expression is parsed and turns `vary` off. `None` or an
    /// empty string restores manual control and leaves `vary` untouched.
    pub fn set_expr(&mut self, expr: Option<&str>) -> Result<(), ParameterError> {
        match expr.map(str::trim).filter(|e| !e.is_empty()) {
            Some(text) => {
                Expression::parse(text).map_err(|source| ParameterError::InvalidExpression {
                    name: self.name.clone(),
                    source,
                })?;
                self.expr = Some(text.to_string());
                self.vary = false;
            }
            None => self.expr = None,
        }
        Ok(())
    }

    /// Parsed form of the expression
    pub fn parsed_expr(&self) -> Result<Option<Expression>, ParameterError> {
        self.expr
            .as_deref()
            .map(|text| {
                Expression::parse(text).map_err(|source| ParameterError::InvalidExpression {
                    name: self.name.clone(),
                    source,
                })
            })
            .transpose()
    }

    /// Standard error (set after fitting)
    pub fn stderr(&self) -> Option<f64> {
        self.stderr
    }

    pub fn set_stderr(&mut self, stderr: Option<f64>) {
        self.stderr = stderr;
    }

    /// Create a bounds transform for this parameter
    pub fn bounds_transform(&self) -> BoundsTransform {
        BoundsTransform::new(self.bounds)
    }

    /// Convert the value to the optimizer's unbounded coordinate
    pub fn to_internal(&self) -> Result<f64, ParameterError> {
        Ok(self.bounds_transform().to_internal(self.value)?)
    }

    /// Convert an optimizer coordinate back to a bounded value
    pub fn from_internal(&self, internal_value: f64) -> f64 {
        self.bounds_transform().to_external(internal_value)
    }
}
