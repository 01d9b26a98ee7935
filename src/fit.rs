//! # Model Fitting
//!
//! Fits a [`Model`] to observed data with the bundled Levenberg-Marquardt
//! minimizer.
//!
//! The optimizer works on the internal (unbounded) coordinates of the varying
//! parameters; [`ModelProblem`] maps them back through each parameter's bounds
//! transform and resolves constraint expressions before every evaluation.
//!
//! ```no_run
//! use ndarray::Array1;
//! use qef_rs::fit::fit;
//! use qef_rs::model::Model;
//! use qef_rs::models::LorentzianModel;
//!
//! let x = Array1::linspace(-1.0, 1.0, 201);
//! let y = qef_rs::models::peak::lorentzian(&x, 2.0, 0.1, 0.05);
//!
//! let model = LorentzianModel::new();
//! let params = model.guess(&y, &x).unwrap();
//! let result = fit(&model, &params, &x, &y).unwrap();
//! println!("{}", result);
//! ```

use ndarray::{Array1, Array2};
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::error::{QefError, Result};
use crate::lm::{LevenbergMarquardt, LmConfig};
use crate::model::Model;
use crate::parameters::Parameters;
use crate::problem::Problem;
use crate::uncertainty;

/// Options of a fit.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FitConfig {
    /// Minimizer settings
    pub lm: LmConfig,

    /// Estimate the covariance matrix and standard errors. Default: true
    pub calc_uncertainties: bool,
}

impl Default for FitConfig {
    fn default() -> Self {
        Self {
            lm: LmConfig::default(),
            calc_uncertainties: true,
        }
    }
}

/// Adapts a model, a parameter set and data to the [`Problem`] trait.
///
/// The problem's parameters are the internal coordinates of the varying
/// parameters, in the order of [`Parameters::varying_names`]. Residuals are
/// `(y - model) · weights`.
pub struct ModelProblem<'a> {
    model: &'a dyn Model,
    params: &'a Parameters,
    x: &'a Array1<f64>,
    y: &'a Array1<f64>,
    weights: Option<&'a Array1<f64>>,
    nvarys: usize,
}

impl<'a> ModelProblem<'a> {
    /// # Errors
    ///
    /// `ShapeMismatch` if `x` and `y` differ in length, `InvalidInput` if no
    /// parameter varies.
    pub fn new(
        model: &'a dyn Model,
        params: &'a Parameters,
        x: &'a Array1<f64>,
        y: &'a Array1<f64>,
    ) -> Result<Self> {
        if x.len() != y.len() {
            return Err(QefError::ShapeMismatch(format!(
                "Expected x and y data to have the same length, got {} and {}",
                x.len(),
                y.len()
            )));
        }

        let nvarys = params.varying().len();
        if nvarys == 0 {
            return Err(QefError::InvalidInput(format!(
                "no varying parameters to fit {}",
                model.name()
            )));
        }

        Ok(Self {
            model,
            params,
            x,
            y,
            weights: None,
            nvarys,
        })
    }

    /// Multiplies each residual by the matching weight, usually `1 / error`.
    pub fn with_weights(mut self, weights: &'a Array1<f64>) -> Result<Self> {
        if weights.len() != self.y.len() {
            return Err(QefError::ShapeMismatch(format!(
                "Expected {} weights, got {}",
                self.y.len(),
                weights.len()
            )));
        }
        self.weights = Some(weights);
        Ok(self)
    }

    pub fn nvarys(&self) -> usize {
        self.nvarys
    }

    pub fn ndata(&self) -> usize {
        self.y.len()
    }

    /// Internal coordinates of the starting point.
    pub fn initial_values(&self) -> Result<Array1<f64>> {
        Ok(Array1::from(self.params.varying_internal_values()?))
    }

    /// The parameter set at the given internal coordinates.
    pub fn parameters_at(&self, internal: &Array1<f64>) -> Result<Parameters> {
        self.params.with_internal_values(&internal.to_vec())
    }

    /// Unweighted model values at `params`.
    pub fn model_values(&self, params: &Parameters) -> Result<Array1<f64>> {
        let y_pred = self.model.eval(params, self.x)?;
        if y_pred.len() != self.y.len() {
            return Err(QefError::ShapeMismatch(format!(
                "{} returned {} values for {} samples",
                self.model.name(),
                y_pred.len(),
                self.y.len()
            )));
        }
        Ok(y_pred)
    }

    fn weighted_residuals(&self, y_pred: &Array1<f64>) -> Array1<f64> {
        let residuals = self.y - y_pred;
        match self.weights {
            Some(w) => residuals * w,
            None => residuals,
        }
    }
}

impl Problem for ModelProblem<'_> {
    fn eval(&self, params: &Array1<f64>) -> Result<Array1<f64>> {
        let current = self.parameters_at(params)?;
        let y_pred = self.model_values(&current)?;
        Ok(self.weighted_residuals(&y_pred))
    }

    fn parameter_count(&self) -> usize {
        self.nvarys
    }

    fn residual_count(&self) -> usize {
        self.y.len()
    }
}

/// Outcome of a fit.
#[derive(Debug, Clone)]
pub struct FitResult {
    /// Best-fit parameters, with expressions resolved and standard errors set
    pub params: Parameters,

    /// Whether the minimizer reported convergence
    pub success: bool,

    /// A message describing the result
    pub message: String,

    /// Number of function evaluations
    pub nfev: usize,

    /// Number of iterations performed
    pub iterations: usize,

    /// Number of data points
    pub ndata: usize,

    /// Number of varying parameters
    pub nvarys: usize,

    /// Degrees of freedom, `ndata - nvarys`
    pub nfree: usize,

    /// Sum of squared (weighted) residuals
    pub chisqr: f64,

    /// Reduced chi-square, `chisqr / nfree`
    pub redchi: f64,

    /// Akaike information criterion
    pub aic: f64,

    /// Bayesian information criterion
    pub bic: f64,

    /// Weighted residuals at the solution
    pub residuals: Array1<f64>,

    /// Model values at the solution
    pub best_fit: Array1<f64>,

    /// Covariance of the varying parameters, in the order of `var_names`
    pub covariance: Option<Array2<f64>>,

    /// Names of the varying parameters
    pub var_names: Vec<String>,
}

impl FitResult {
    /// Correlation matrix of the varying parameters, if the covariance exists.
    pub fn correlation(&self) -> Option<Array2<f64>> {
        self.covariance.as_ref().map(uncertainty::correlation_matrix)
    }

    /// Best-fit value of a parameter.
    pub fn value(&self, name: &str) -> Option<f64> {
        self.params.get(name).map(|p| p.value())
    }

    /// Standard error of a parameter.
    pub fn stderr(&self, name: &str) -> Option<f64> {
        self.params.get(name).and_then(|p| p.stderr())
    }
}

impl fmt::Display for FitResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "[[Fit Statistics]]")?;
        writeln!(f, "    success            = {}", self.success)?;
        writeln!(f, "    message            = {}", self.message)?;
        writeln!(f, "    # function evals   = {}", self.nfev)?;
        writeln!(f, "    # data points      = {}", self.ndata)?;
        writeln!(f, "    # variables        = {}", self.nvarys)?;
        writeln!(f, "    chi-square         = {:.6e}", self.chisqr)?;
        writeln!(f, "    reduced chi-square = {:.6e}", self.redchi)?;
        writeln!(f, "    Akaike info crit   = {:.4}", self.aic)?;
        writeln!(f, "    Bayesian info crit = {:.4}", self.bic)?;
        writeln!(f, "[[Variables]]")?;
        for param in &self.params {
            let detail = match (param.expr(), param.vary(), param.stderr()) {
                (Some(expr), _, Some(err)) => format!("+/- {:.6e} == '{}'", err, expr),
                (Some(expr), _, None) => format!("== '{}'", expr),
                (None, true, Some(err)) => format!("+/- {:.6e}", err),
                (None, true, None) => "+/- n/a".to_string(),
                (None, false, _) => "(fixed)".to_string(),
            };
            writeln!(f, "    {:<14} {:>14.7e} {}", param.name(), param.value(), detail)?;
        }
        Ok(())
    }
}

/// Fits `model` to `(x, y)` starting from `params` with default settings.
pub fn fit(
    model: &dyn Model,
    params: &Parameters,
    x: &Array1<f64>,
    y: &Array1<f64>,
) -> Result<FitResult> {
    fit_with_config(model, params, x, y, &FitConfig::default())
}

/// Fits `model` to `(x, y)` starting from `params`.
///
/// The caller's parameter set is not modified; the best-fit set is returned
/// in [`FitResult::params`].
pub fn fit_with_config(
    model: &dyn Model,
    params: &Parameters,
    x: &Array1<f64>,
    y: &Array1<f64>,
    config: &FitConfig,
) -> Result<FitResult> {
    let problem = ModelProblem::new(model, params, x, y)?;
    run(problem, config)
}

/// Fits with residuals multiplied by `weights`.
pub fn fit_weighted(
    model: &dyn Model,
    params: &Parameters,
    x: &Array1<f64>,
    y: &Array1<f64>,
    weights: &Array1<f64>,
    config: &FitConfig,
) -> Result<FitResult> {
    let problem = ModelProblem::new(model, params, x, y)?.with_weights(weights)?;
    run(problem, config)
}

fn run(problem: ModelProblem<'_>, config: &FitConfig) -> Result<FitResult> {
    let ndata = problem.ndata();
    let nvarys = problem.nvarys();
    let var_names = problem.params.varying_names();
    tracing::debug!(
        model = %problem.model.name(),
        ndata,
        nvarys,
        "starting fit"
    );

    let mut lm_config = config.lm.clone();
    lm_config.calc_jacobian = lm_config.calc_jacobian || config.calc_uncertainties;
    let optimizer = LevenbergMarquardt::with_config(lm_config);
    let result = optimizer.minimize(&problem, problem.initial_values()?)?;

    let mut best = problem.parameters_at(&result.params)?;
    best.update_expressions()?;
    let best_fit = problem.model_values(&best)?;
    let residuals = problem.weighted_residuals(&best_fit);
    let chisqr = residuals.iter().map(|r| r * r).sum::<f64>();

    let nfree = ndata.saturating_sub(nvarys);
    let redchi = chisqr / nfree.max(1) as f64;
    let (aic, bic) = information_criteria(chisqr, ndata, nvarys);

    let covariance = match (&result.jacobian, config.calc_uncertainties) {
        (Some(jacobian), true) => {
            match external_covariance(&best, &result.params, jacobian, chisqr) {
                Ok(covar) => Some(covar),
                Err(err) => {
                    tracing::warn!(error = %err, "could not estimate uncertainties");
                    None
                }
            }
        }
        _ => None,
    };

    for name in &var_names {
        best.set_stderr(name, None)?;
    }
    if let Some(covar) = &covariance {
        let errors = uncertainty::standard_errors(covar);
        for (name, err) in var_names.iter().zip(errors.iter()) {
            best.set_stderr(name, Some(*err))?;
        }
        match uncertainty::propagate_to_expressions(&best, covar) {
            Ok(derived) => {
                for (name, err) in derived {
                    best.set_stderr(&name, Some(err))?;
                }
            }
            Err(err) => tracing::warn!(error = %err, "could not propagate uncertainties"),
        }
    }

    tracing::debug!(
        success = result.success,
        iterations = result.iterations,
        nfev = result.func_evals,
        chisqr,
        "finished fit"
    );

    Ok(FitResult {
        params: best,
        success: result.success,
        message: result.message,
        nfev: result.func_evals,
        iterations: result.iterations,
        ndata,
        nvarys,
        nfree,
        chisqr,
        redchi,
        aic,
        bic,
        residuals,
        best_fit,
        covariance,
        var_names,
    })
}

/// Covariance of the varying parameters in external coordinates.
fn external_covariance(
    best: &Parameters,
    internal: &Array1<f64>,
    jacobian: &Array2<f64>,
    chisqr: f64,
) -> Result<Array2<f64>> {
    let covar = uncertainty::covariance_matrix(jacobian, chisqr)?;
    let gradients: Vec<f64> = best
        .varying()
        .iter()
        .zip(internal.iter())
        .map(|(param, &x)| param.bounds_transform().external_gradient(x))
        .collect();
    uncertainty::to_external_covariance(&covar, &gradients)
}

fn information_criteria(chisqr: f64, ndata: usize, nvarys: usize) -> (f64, f64) {
    let n = ndata as f64;
    let k = nvarys as f64;
    let neg2_log_likel = n * (chisqr.max(f64::MIN_POSITIVE) / n).ln();
    (neg2_log_likel + 2.0 * k, neg2_log_likel + n.ln() * k)
}
