//! # Parameter System
//!
//! Named fit parameters with bounds, free/fixed flags and constraint
//! expressions, collected into an ordered [`Parameters`] set.
//!
//! ## Core Components
//!
//! - [`Parameter`]: a named scalar with value, bounds, vary flag and optional expression
//! - [`Parameters`]: the ordered set; atomic setters, dependency-ordered
//!   expression evaluation and change observers
//! - [`Bounds`] and [`BoundsTransform`]: bounds and the optimizer's unbounded coordinates
//! - [`Expression`]: the constraint-expression parser and evaluator
//! - [`ParamHint`]: per-model parameter defaults
//!
//! ## Example Usage
//!
//! ```rust
//! use qef_rs::parameters::Parameters;
//!
//! let mut params = Parameters::new();
//! params.add_param("a", 1.0).unwrap();
//! params.add_param_with_bounds("sigma", 0.5, 0.0, f64::INFINITY).unwrap();
//! params.add_param_with_expr("b", 0.0, "2 * a").unwrap();
//!
//! let values = params.evaluate().unwrap();
//! assert_eq!(values.get("b").unwrap(), 2.0);
//!
//! params.set_value("a", 4.0).unwrap();
//! assert_eq!(params.evaluate().unwrap().get("b").unwrap(), 8.0);
//! ```

pub mod bounds;
pub mod expression;
pub mod hints;
pub mod observer;
pub mod parameter;
pub mod parameters;


pub use bounds::{Bounds, BoundsError, BoundsTransform};
pub use expression::{EvaluationContext, Expression, ExpressionError, SimpleContext};
pub use hints::{ParamHint, ParamHints};
pub use observer::{
    ChangeSource, FieldValue, ObserverId, ParamField, ParameterChange, ParameterObserver,
};
pub use parameter::{Parameter, ParameterError};
pub use parameters::{ParamUpdate, ParamValues, ParameterSet, Parameters};
