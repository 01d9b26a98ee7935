//! Jump-diffusion model of Teixeira et al. (Phys. Rev. A 31, 1913, 1985).
//!
//! A Lorentzian whose half width depends on the momentum transfer `q`:
//!
//! `Γ = ħ·D·q² / (1 + D·q²·τ)`
//!
//! `tau` (residence time, ps) and `diff` (diffusion coefficient) are the fit
//! parameters; `sigma` is derived from them through a constraint expression.

use crate::constants::HBAR;
use crate::error::{QefError, Result};
use crate::model::{ModelArgs, ModelFunction, ModelSignature};
use crate::models::peak::lorentzian;
use crate::parameters::{ParamHint, Parameters};
use crate::utils::numeric::guess_from_peak;
use ndarray::Array1;

#[derive(Debug, Clone)]
pub struct TeixeiraWaterModel {
    signature: ModelSignature,
    q: f64,
}

impl TeixeiraWaterModel {
    /// Creates the model for momentum transfer `q`.
    pub fn new(q: f64) -> Self {
        let signature = ModelSignature::new(&["amplitude", "center", "sigma"])
            .with_hint("amplitude", ParamHint::new().value(1.0))
            .with_hint("center", ParamHint::new().value(0.0))
            .with_hint("tau", ParamHint::new().value(1.0).min(0.0))
            .with_hint("diff", ParamHint::new().value(1.0).min(0.0))
            .with_hint("sigma", ParamHint::new().expr(&Self::hwhm_expr(q)))
            .with_hint("fwhm", ParamHint::new().expr("2 * sigma"))
            .with_hint(
                "height",
                ParamHint::new().expr("0.3183099 * amplitude / max(1e-15, sigma)"),
            );
        Self { signature, q }
    }

    pub fn with_prefix(mut self, prefix: &str) -> Self {
        self.signature.set_prefix(prefix);
        self
    }

    pub fn q(&self) -> f64 {
        self.q
    }

    /// Changes the momentum transfer and the `sigma` expression with it.
    pub fn set_q(&mut self, q: f64) -> Result<()> {
        self.q = q;
        self.signature
            .set_hint("sigma", ParamHint::new().expr(&Self::hwhm_expr(q)))
    }

    /// Half width at half maximum in base parameter names.
    fn hwhm_expr(q: f64) -> String {
        let q2 = q * q;
        format!(
            "{hbar} * diff * {q2} / (1 + tau * diff * {q2})",
            hbar = HBAR,
            q2 = q2
        )
    }
}

impl ModelFunction for TeixeiraWaterModel {
    fn signature(&self) -> &ModelSignature {
        &self.signature
    }

    fn signature_mut(&mut self) -> &mut ModelSignature {
        &mut self.signature
    }

    fn kind(&self) -> &str {
        "teixeira_water"
    }

    fn function(&self, x: &Array1<f64>, args: &ModelArgs<'_>) -> Result<Array1<f64>> {
        Ok(lorentzian(
            x,
            args.get("amplitude")?,
            args.get("center")?,
            args.get("sigma")?,
        ))
    }

    /// Lorentzian guess, assuming `D·q²` and `1/τ` have the same value.
    fn initial_guess(&self, y: &Array1<f64>, x: &Array1<f64>) -> Result<Parameters> {
        if self.q == 0.0 {
            return Err(QefError::InvalidInput(
                "cannot guess the diffusion coefficient at q = 0".to_string(),
            ));
        }
        let peak = guess_from_peak(y, x, 1.25)?;
        if peak.sigma <= 0.0 {
            return Err(QefError::InvalidInput(format!(
                "peak width estimate {} is not positive",
                peak.sigma
            )));
        }

        let tau = HBAR / (2.0 * peak.sigma);
        let diff = 1.0 / (self.q * self.q * tau);
        self.signature.guess_params(&[
            ("amplitude", peak.amplitude),
            ("center", peak.center),
            ("tau", tau),
            ("diff", diff),
        ])
    }
}
