//! Peak models for fitting data.
//!
//! Area-normalized Gaussian and Lorentzian lineshapes. Both declare
//! `amplitude` (integrated intensity), `center` and `sigma`, plus the derived
//! parameters `fwhm` and `height`.

use crate::error::Result;
use crate::model::{ModelArgs, ModelFunction, ModelSignature};
use crate::parameters::{ParamHint, Parameters};
use crate::utils::numeric::guess_from_peak;
use ndarray::Array1;
use std::f64::consts::PI;

/// Smallest width used when evaluating a lineshape
pub(crate) const TINY: f64 = 1.0e-15;

/// FWHM of a Gaussian in units of sigma, `2·sqrt(2·ln 2)`
pub const GAUSSIAN_FWHM_FACTOR: f64 = 2.354_820_0;

fn peak_signature(fwhm_expr: &str, height_expr: &str) -> ModelSignature {
    ModelSignature::new(&["amplitude", "center", "sigma"])
        .with_hint("amplitude", ParamHint::new().value(1.0))
        .with_hint("center", ParamHint::new().value(0.0))
        .with_hint("sigma", ParamHint::new().value(1.0).min(0.0))
        .with_hint("fwhm", ParamHint::new().expr(fwhm_expr))
        .with_hint("height", ParamHint::new().expr(height_expr))
}

/// `amplitude / (σ·√(2π)) · exp(-(x - center)² / (2σ²))`
pub fn gaussian(x: &Array1<f64>, amplitude: f64, center: f64, sigma: f64) -> Array1<f64> {
    let sigma = sigma.max(TINY);
    let norm = amplitude / (sigma * (2.0 * PI).sqrt());
    x.mapv(|v| norm * (-(v - center).powi(2) / (2.0 * sigma * sigma)).exp())
}

/// `amplitude / π · σ / ((x - center)² + σ²)`
pub fn lorentzian(x: &Array1<f64>, amplitude: f64, center: f64, sigma: f64) -> Array1<f64> {
    let sigma = sigma.max(TINY);
    x.mapv(|v| amplitude / PI * sigma / ((v - center).powi(2) + sigma * sigma))
}

/// A Gaussian peak model.
///
/// The Full Width at Half Maximum (FWHM) is related to sigma by:
/// FWHM = 2 * sqrt(2 * ln(2)) * sigma ≈ 2.3548 * sigma
#[derive(Debug, Clone)]
pub struct GaussianModel {
    signature: ModelSignature,
}

impl GaussianModel {
    pub fn new() -> Self {
        Self {
            signature: peak_signature(
                "2.3548200 * sigma",
                "0.3989423 * amplitude / max(1e-15, sigma)",
            ),
        }
    }

    pub fn with_prefix(mut self, prefix: &str) -> Self {
        self.signature.set_prefix(prefix);
        self
    }
}

impl Default for GaussianModel {
    fn default() -> Self {
        Self::new()
    }
}

impl ModelFunction for GaussianModel {
    fn signature(&self) -> &ModelSignature {
        &self.signature
    }

    fn signature_mut(&mut self) -> &mut ModelSignature {
        &mut self.signature
    }

    fn kind(&self) -> &str {
        "gaussian"
    }

    fn function(&self, x: &Array1<f64>, args: &ModelArgs<'_>) -> Result<Array1<f64>> {
        Ok(gaussian(
            x,
            args.get("amplitude")?,
            args.get("center")?,
            args.get("sigma")?,
        ))
    }

    fn initial_guess(&self, y: &Array1<f64>, x: &Array1<f64>) -> Result<Parameters> {
        let peak = guess_from_peak(y, x, 1.0)?;
        self.signature.guess_params(&[
            ("amplitude", peak.amplitude),
            ("center", peak.center),
            ("sigma", peak.sigma),
        ])
    }
}

/// A Lorentzian peak model.
///
/// `sigma` is the half width at half maximum, so FWHM = 2 * sigma.
#[derive(Debug, Clone)]
pub struct LorentzianModel {
    signature: ModelSignature,
}

impl LorentzianModel {
    pub fn new() -> Self {
        Self {
            signature: peak_signature(
                "2 * sigma",
                "0.3183099 * amplitude / max(1e-15, sigma)",
            ),
        }
    }

    pub fn with_prefix(mut self, prefix: &str) -> Self {
        self.signature.set_prefix(prefix);
        self
    }
}

impl Default for LorentzianModel {
    fn default() -> Self {
        Self::new()
    }
}

impl ModelFunction for LorentzianModel {
    fn signature(&self) -> &ModelSignature {
        &self.signature
    }

    fn signature_mut(&mut self) -> &mut ModelSignature {
        &mut self.signature
    }

    fn kind(&self) -> &str {
        "lorentzian"
    }

    fn function(&self, x: &Array1<f64>, args: &ModelArgs<'_>) -> Result<Array1<f64>> {
        Ok(lorentzian(
            x,
            args.get("amplitude")?,
            args.get("center")?,
            args.get("sigma")?,
        ))
    }

    fn initial_guess(&self, y: &Array1<f64>, x: &Array1<f64>) -> Result<Parameters> {
        let peak = guess_from_peak(y, x, 1.25)?;
        self.signature.guess_params(&[
            ("amplitude", peak.amplitude),
            ("center", peak.center),
            ("sigma", peak.sigma),
        ])
    }
}
