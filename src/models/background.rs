//! Flat and linear background models.

use crate::error::{QefError, Result};
use crate::model::{ModelArgs, ModelFunction, ModelSignature};
use crate::parameters::{ParamHint, Parameters};
use crate::utils::numeric::linear_regression;
use ndarray::Array1;

/// A constant background `c`.
#[derive(Debug, Clone)]
pub struct ConstantModel {
    signature: ModelSignature,
}

impl ConstantModel {
    pub fn new() -> Self {
        Self {
            signature: ModelSignature::new(&["c"]).with_hint("c", ParamHint::new().value(0.0)),
        }
    }

    pub fn with_prefix(mut self, prefix: &str) -> Self {
        self.signature.set_prefix(prefix);
        self
    }
}

impl Default for ConstantModel {
    fn default() -> Self {
        Self::new()
    }
}

impl ModelFunction for ConstantModel {
    fn signature(&self) -> &ModelSignature {
        &self.signature
    }

    fn signature_mut(&mut self) -> &mut ModelSignature {
        &mut self.signature
    }

    fn kind(&self) -> &str {
        "constant"
    }

    fn function(&self, x: &Array1<f64>, args: &ModelArgs<'_>) -> Result<Array1<f64>> {
        Ok(Array1::from_elem(x.len(), args.get("c")?))
    }

    /// Mean of the data
    fn initial_guess(&self, y: &Array1<f64>, _x: &Array1<f64>) -> Result<Parameters> {
        let mean = y
            .mean()
            .ok_or_else(|| QefError::InvalidInput("cannot guess from empty data".to_string()))?;
        self.signature.guess_params(&[("c", mean)])
    }
}

/// A straight line `slope * x + intercept`.
#[derive(Debug, Clone)]
pub struct LinearModel {
    signature: ModelSignature,
}

impl LinearModel {
    pub fn new() -> Self {
        Self {
            signature: ModelSignature::new(&["slope", "intercept"])
                .with_hint("slope", ParamHint::new().value(1.0))
                .with_hint("intercept", ParamHint::new().value(0.0)),
        }
    }

    pub fn with_prefix(mut self, prefix: &str) -> Self {
        self.signature.set_prefix(prefix);
        self
    }
}

impl Default for LinearModel {
    fn default() -> Self {
        Self::new()
    }
}

impl ModelFunction for LinearModel {
    fn signature(&self) -> &ModelSignature {
        &self.signature
    }

    fn signature_mut(&mut self) -> &mut ModelSignature {
        &mut self.signature
    }

    fn kind(&self) -> &str {
        "linear"
    }

    fn function(&self, x: &Array1<f64>, args: &ModelArgs<'_>) -> Result<Array1<f64>> {
        let slope = args.get("slope")?;
        let intercept = args.get("intercept")?;
        Ok(x.mapv(|v| slope * v + intercept))
    }

    fn initial_guess(&self, y: &Array1<f64>, x: &Array1<f64>) -> Result<Parameters> {
        let (slope, intercept) = linear_regression(x, y)?;
        self.signature
            .guess_params(&[("slope", slope), ("intercept", intercept)])
    }
}
