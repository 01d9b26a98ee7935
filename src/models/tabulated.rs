//! Models built from tabulated samples.
//!
//! A [`TabulatedModel`] turns discrete `(x, y)` samples into a continuous
//! function `amplitude * interpolant(x - center)`. The interpolant is built
//! once and shared behind an `Arc`, so clones (one per parallel fit, say)
//! read the same samples without copying them.

use crate::error::{QefError, Result};
use crate::model::{ModelArgs, ModelFunction, ModelSignature};
use crate::parameters::{ParamHint, Parameters};
use crate::utils::interpolate::{ExtrapolationPolicy, LinearInterpolator};
use crate::utils::numeric::argmax;
use ndarray::Array1;
use std::sync::Arc;

#[derive(Debug, Clone)]
pub struct TabulatedModel {
    signature: ModelSignature,
    interpolator: Arc<LinearInterpolator>,
}

impl TabulatedModel {
    /// Builds the model from samples; unsorted samples are sorted by `x`.
    ///
    /// # Errors
    ///
    /// `InterpolationDomain` on duplicate `x` values, mismatched lengths or
    /// fewer than two samples.
    pub fn new(x: &Array1<f64>, y: &Array1<f64>, policy: ExtrapolationPolicy) -> Result<Self> {
        let xs: Vec<f64> = x.iter().copied().collect();
        let ys: Vec<f64> = y.iter().copied().collect();
        let interpolator = LinearInterpolator::new(&xs, &ys, policy)?;
        Ok(Self::from_interpolator(Arc::new(interpolator)))
    }

    /// Wraps an existing interpolant, sharing its samples.
    pub fn from_interpolator(interpolator: Arc<LinearInterpolator>) -> Self {
        Self {
            signature: ModelSignature::new(&["amplitude", "center"])
                .with_hint("amplitude", ParamHint::new().value(1.0).min(0.0))
                .with_hint("center", ParamHint::new().value(0.0)),
            interpolator,
        }
    }

    /// A resolution function: `amplitude = 1` and `center = 0`, both fixed.
    pub fn resolution(
        x: &Array1<f64>,
        y: &Array1<f64>,
        policy: ExtrapolationPolicy,
    ) -> Result<Self> {
        let mut model = Self::new(x, y, policy)?;
        model
            .signature
            .set_hint("amplitude", ParamHint::new().value(1.0).vary(false))?;
        model
            .signature
            .set_hint("center", ParamHint::new().value(0.0).vary(false))?;
        Ok(model)
    }

    pub fn with_prefix(mut self, prefix: &str) -> Self {
        self.signature.set_prefix(prefix);
        self
    }

    pub fn interpolator(&self) -> &Arc<LinearInterpolator> {
        &self.interpolator
    }

    pub fn policy(&self) -> ExtrapolationPolicy {
        self.interpolator.policy()
    }
}

impl ModelFunction for TabulatedModel {
    fn signature(&self) -> &ModelSignature {
        &self.signature
    }

    fn signature_mut(&mut self) -> &mut ModelSignature {
        &mut self.signature
    }

    fn kind(&self) -> &str {
        "tabulated"
    }

    fn function(&self, x: &Array1<f64>, args: &ModelArgs<'_>) -> Result<Array1<f64>> {
        let amplitude = args.get("amplitude")?;
        let center = args.get("center")?;
        Ok(x.mapv(|v| amplitude * self.interpolator.at(v - center)))
    }

    /// Anchors the guess on the highest observed sample.
    ///
    /// `center` is placed at the position of the maximum and `amplitude`
    /// rescales the interpolant's reference height there to the observed
    /// maximum. This is a starting point for the optimizer, not an exact
    /// recovery of the true values.
    fn initial_guess(&self, y: &Array1<f64>, x: &Array1<f64>) -> Result<Parameters> {
        let i_max =
            argmax(y).ok_or_else(|| QefError::InvalidInput("no finite samples".to_string()))?;
        let x_at_max = x[i_max];

        // amplitude = 1, center = x_at_max evaluated at x_at_max
        let reference = self.interpolator.at(0.0);
        if reference == 0.0 || !reference.is_finite() {
            return Err(QefError::InvalidInput(format!(
                "tabulated reference height at zero shift is {}",
                reference
            )));
        }

        self.signature
            .guess_params(&[("amplitude", y[i_max] / reference), ("center", x_at_max)])
    }
}
