//! Dirac delta on a sampled grid.
//!
//! The model is zero everywhere except at the grid point closest to
//! `center`, where it equals `amplitude / dx`. Dividing by the grid spacing
//! keeps the integral over the grid equal to `amplitude`, which makes the
//! delta the identity of [`crate::operators::Convolve`].

use crate::error::{QefError, Result};
use crate::model::{ModelArgs, ModelFunction, ModelSignature};
use crate::parameters::{ParamHint, Parameters};
use crate::utils::numeric::{argmax, argmin, uniform_spacing};
use ndarray::Array1;

/// Samples of a delta of integrated intensity `amplitude` at `center`.
pub fn delta_dirac(x: &Array1<f64>, amplitude: f64, center: f64) -> Result<Array1<f64>> {
    let dx = uniform_spacing(x)?;
    let mut y = Array1::zeros(x.len());
    if let Some(i) = argmin(&x.mapv(|v| (v - center).abs())) {
        y[i] = amplitude / dx;
    }
    Ok(y)
}

#[derive(Debug, Clone)]
pub struct DeltaDiracModel {
    signature: ModelSignature,
}

impl DeltaDiracModel {
    pub fn new() -> Self {
        Self {
            signature: ModelSignature::new(&["amplitude", "center"])
                .with_hint("amplitude", ParamHint::new().value(1.0))
                .with_hint("center", ParamHint::new().value(0.0)),
        }
    }

    pub fn with_prefix(mut self, prefix: &str) -> Self {
        self.signature.set_prefix(prefix);
        self
    }
}

impl Default for DeltaDiracModel {
    fn default() -> Self {
        Self::new()
    }
}

impl ModelFunction for DeltaDiracModel {
    fn signature(&self) -> &ModelSignature {
        &self.signature
    }

    fn signature_mut(&mut self) -> &mut ModelSignature {
        &mut self.signature
    }

    fn kind(&self) -> &str {
        "delta_dirac"
    }

    fn function(&self, x: &Array1<f64>, args: &ModelArgs<'_>) -> Result<Array1<f64>> {
        delta_dirac(x, args.get("amplitude")?, args.get("center")?)
    }

    /// `center` at the maximum of `y`, `amplitude = max(y) / dx`.
    fn initial_guess(&self, y: &Array1<f64>, x: &Array1<f64>) -> Result<Parameters> {
        let i_max =
            argmax(y).ok_or_else(|| QefError::InvalidInput("no finite samples".to_string()))?;
        let dx = uniform_spacing(x)?;
        self.signature
            .guess_params(&[("amplitude", y[i_max] / dx), ("center", x[i_max])])
    }
}
