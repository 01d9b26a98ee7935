//! # Covariance and Standard Errors
//!
//! Uncertainties of best-fit parameters from the Jacobian at the solution.
//!
//! The covariance matrix is estimated as `covar = redchi · inv(JᵀJ)`, where
//! `J` is the Jacobian of the residuals and `redchi` the reduced chi-square.
//! Standard errors are the square roots of its diagonal. Errors of
//! constraint-expression parameters are propagated linearly:
//! `σ² = gᵀ · covar · g` with `g` the numerical gradient of the expression.

use ndarray::{Array1, Array2};

use crate::error::{QefError, Result};
use crate::lm::algorithm::cholesky_solve;
use crate::parameters::Parameters;

/// Inverse of a symmetric positive definite matrix.
///
/// # Errors
///
/// `InvalidInput` if the matrix is not square or singular.
pub fn invert_symmetric(matrix: &Array2<f64>) -> Result<Array2<f64>> {
    let n = matrix.nrows();
    if matrix.ncols() != n {
        return Err(QefError::InvalidInput(format!(
            "cannot invert a {}x{} matrix",
            n,
            matrix.ncols()
        )));
    }

    let mut inverse = Array2::zeros((n, n));
    for j in 0..n {
        let mut unit = Array1::zeros(n);
        unit[j] = 1.0;
        let column = cholesky_solve(matrix, &unit).ok_or_else(|| {
            QefError::InvalidInput("matrix is singular or not positive definite".to_string())
        })?;
        inverse.column_mut(j).assign(&column);
    }
    Ok(inverse)
}

/// Calculate the covariance matrix from the Jacobian at the solution.
///
/// # Arguments
///
/// * `jacobian` - Jacobian of the residuals, `ndata × nvarys`
/// * `chisqr` - Sum of squared residuals at the solution
pub fn covariance_matrix(jacobian: &Array2<f64>, chisqr: f64) -> Result<Array2<f64>> {
    let (ndata, nvarys) = jacobian.dim();
    let nfree = ndata.saturating_sub(nvarys).max(1);
    let redchi = chisqr / nfree as f64;

    let jtj = jacobian.t().dot(jacobian);
    Ok(invert_symmetric(&jtj)? * redchi)
}

/// Carries a covariance matrix from internal (unbounded) to external coordinates.
///
/// `gradients[i]` is the derivative of external value `i` with respect to its
/// internal value.
pub fn to_external_covariance(covar: &Array2<f64>, gradients: &[f64]) -> Result<Array2<f64>> {
    let n = covar.nrows();
    if gradients.len() != n || covar.ncols() != n {
        return Err(QefError::ShapeMismatch(format!(
            "{} gradients for a {}x{} covariance matrix",
            gradients.len(),
            n,
            covar.ncols()
        )));
    }
    Ok(Array2::from_shape_fn((n, n), |(i, j)| {
        covar[[i, j]] * gradients[i] * gradients[j]
    }))
}

/// Standard errors from the diagonal of a covariance matrix.
pub fn standard_errors(covar: &Array2<f64>) -> Array1<f64> {
    covar.diag().mapv(|v| v.max(0.0).sqrt())
}

/// Correlation matrix: `covar[i,j] / sqrt(covar[i,i] · covar[j,j])`.
pub fn correlation_matrix(covar: &Array2<f64>) -> Array2<f64> {
    let sigma = standard_errors(covar);
    Array2::from_shape_fn(covar.dim(), |(i, j)| {
        if i == j {
            1.0
        } else if sigma[i] > 0.0 && sigma[j] > 0.0 {
            covar[[i, j]] / (sigma[i] * sigma[j])
        } else {
            0.0
        }
    })
}

/// Standard errors of the expression parameters of `params`.
///
/// `covar` is the external covariance of the varying parameters, in the order
/// of [`Parameters::varying_names`].
pub fn propagate_to_expressions(
    params: &Parameters,
    covar: &Array2<f64>,
) -> Result<Vec<(String, f64)>> {
    let varying = params.varying_names();
    if covar.dim() != (varying.len(), varying.len()) {
        return Err(QefError::ShapeMismatch(format!(
            "covariance is {:?} for {} varying parameters",
            covar.dim(),
            varying.len()
        )));
    }

    let derived: Vec<String> = params
        .iter()
        .filter(|p| p.expr().is_some())
        .map(|p| p.name().to_string())
        .collect();
    if derived.is_empty() {
        return Ok(Vec::new());
    }

    let base = params.evaluate()?;
    let mut gradients = Array2::zeros((derived.len(), varying.len()));

    for (j, name) in varying.iter().enumerate() {
        let param = params
            .get(name)
            .ok_or_else(|| QefError::InvalidInput(format!("no parameter '{}'", name)))?;
        let value = param.value();
        let mut step = 1e-8 * value.abs().max(1.0);
        if !param.bounds().is_within_bounds(value + step) {
            step = -step;
        }

        let mut shifted = params.clone();
        shifted.set_value(name, value + step)?;
        let values = shifted.evaluate()?;

        for (i, d) in derived.iter().enumerate() {
            gradients[[i, j]] = (values.get(d)? - base.get(d)?) / step;
        }
    }

    Ok(derived
        .into_iter()
        .enumerate()
        .map(|(i, name)| {
            let g = gradients.row(i);
            let variance = g.dot(&covar.dot(&g));
            (name, variance.max(0.0).sqrt())
        })
        .collect())
}
