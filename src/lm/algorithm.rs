//! Implementation of the Levenberg-Marquardt algorithm.
//!
//! Each iteration solves the damped normal equations
//! `(JᵀJ + λ·diag(JᵀJ)) δ = -Jᵀr` with a Cholesky factorization. Accepted
//! steps shrink λ, rejected ones grow it; the search gives up once λ reaches
//! its configured maximum.

use ndarray::{Array1, Array2};
use std::fmt;

use crate::error::{QefError, Result};
use crate::problem::Problem;
use crate::utils::finite_difference;

use super::config::LmConfig;

/// Result of the Levenberg-Marquardt optimization.
#[derive(Debug, Clone)]
pub struct LmResult {
    /// Optimized parameter values
    pub params: Array1<f64>,

    /// Residuals at the solution
    pub residuals: Array1<f64>,

    /// Sum of squared residuals
    pub cost: f64,

    /// Number of iterations performed
    pub iterations: usize,

    /// Number of function evaluations
    pub func_evals: usize,

    /// Whether the optimization succeeded
    pub success: bool,

    /// A message describing the result
    pub message: String,

    /// The Jacobian matrix at the solution (if requested)
    pub jacobian: Option<Array2<f64>>,
}

impl fmt::Display for LmResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Optimization Result:")?;
        writeln!(f, "  Success: {}", self.success)?;
        writeln!(f, "  Message: {}", self.message)?;
        writeln!(f, "  Cost: {:.6e}", self.cost)?;
        writeln!(f, "  Iterations: {}", self.iterations)?;
        writeln!(f, "  Function evaluations: {}", self.func_evals)?;
        writeln!(f, "  Parameters: {:?}", self.params)?;
        Ok(())
    }
}

/// Status of the iteration.
enum IterationStatus {
    /// Converged successfully
    Converged(String),

    /// Failed to converge
    Failed(String),
}

/// The Levenberg-Marquardt optimizer.
#[derive(Debug, Clone, Default)]
pub struct LevenbergMarquardt {
    config: LmConfig,
}

impl LevenbergMarquardt {
    /// Create a new Levenberg-Marquardt optimizer with default configuration.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a new Levenberg-Marquardt optimizer with the given configuration.
    pub fn with_config(config: LmConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &LmConfig {
        &self.config
    }

    pub fn with_max_iterations(mut self, max_iterations: usize) -> Self {
        self.config.max_iterations = max_iterations;
        self
    }

    pub fn with_ftol(mut self, ftol: f64) -> Self {
        self.config.ftol = ftol;
        self
    }

    pub fn with_xtol(mut self, xtol: f64) -> Self {
        self.config.xtol = xtol;
        self
    }

    pub fn with_gtol(mut self, gtol: f64) -> Self {
        self.config.gtol = gtol;
        self
    }

    pub fn with_lambda(mut self, lambda: f64) -> Self {
        self.config.initial_lambda = lambda;
        self
    }

    pub fn with_lambda_up_factor(mut self, factor: f64) -> Self {
        self.config.lambda_up_factor = factor;
        self
    }

    pub fn with_lambda_down_factor(mut self, factor: f64) -> Self {
        self.config.lambda_down_factor = factor;
        self
    }

    pub fn with_epsilon(mut self, epsilon: f64) -> Self {
        self.config.epsilon = epsilon;
        self
    }

    pub fn with_calc_jacobian(mut self, calc_jacobian: bool) -> Self {
        self.config.calc_jacobian = calc_jacobian;
        self
    }

    fn jacobian<P: Problem + ?Sized>(
        &self,
        problem: &P,
        params: &Array1<f64>,
        residuals: &Array1<f64>,
    ) -> Result<Array2<f64>> {
        if problem.has_custom_jacobian() {
            problem.jacobian(params)
        } else {
            finite_difference::jacobian_at(problem, params, residuals, Some(self.config.epsilon))
        }
    }

    /// Minimize the sum of squared residuals for the given problem.
    ///
    /// # Arguments
    ///
    /// * `problem` - The problem to solve
    /// * `initial_params` - Initial guess for the parameter values
    ///
    /// # Returns
    ///
    /// * `Result<LmResult>` - The result of the optimization. Running out of
    ///   iterations or damping is reported through `success`, not as an error.
    pub fn minimize<P: Problem + ?Sized>(
        &self,
        problem: &P,
        initial_params: Array1<f64>,
    ) -> Result<LmResult> {
        let n_params = problem.parameter_count();
        if initial_params.len() != n_params {
            return Err(QefError::ShapeMismatch(format!(
                "Expected {} parameters, got {}",
                n_params,
                initial_params.len()
            )));
        }

        let mut params = initial_params;
        let mut lambda = self.config.initial_lambda;

        let mut residuals = problem.eval(&params)?;
        let mut func_evals = 1;
        if residuals.len() != problem.residual_count() {
            return Err(QefError::ShapeMismatch(format!(
                "Expected {} residuals, got {}",
                problem.residual_count(),
                residuals.len()
            )));
        }
        let mut cost = sum_of_squares(&residuals);
        if !cost.is_finite() {
            return Err(QefError::FunctionEvaluation(
                "residuals are not finite at the initial parameters".to_string(),
            ));
        }

        let mut iterations = 0;
        let status = loop {
            if iterations >= self.config.max_iterations {
                break IterationStatus::Failed(format!(
                    "Maximum iterations ({}) reached",
                    self.config.max_iterations
                ));
            }

            let jac = self.jacobian(problem, &params, &residuals)?;
            if !problem.has_custom_jacobian() {
                func_evals += n_params;
            }

            let gradient = jac.t().dot(&residuals);
            let gradient_norm = gradient.iter().fold(0.0_f64, |m, g| m.max(g.abs()));
            if gradient_norm <= self.config.gtol {
                break IterationStatus::Converged(format!(
                    "Gradient convergence: |g| = {:.2e} <= {:.2e}",
                    gradient_norm, self.config.gtol
                ));
            }

            let jtj = jac.t().dot(&jac);
            let neg_gradient = -&gradient;

            // Inner loop: raise lambda until a step lowers the cost.
            let accepted = loop {
                if let Some(step) = solve_damped(&jtj, &neg_gradient, lambda) {
                    let new_params = &params + &step;
                    let new_residuals = problem.eval(&new_params)?;
                    func_evals += 1;
                    let new_cost = sum_of_squares(&new_residuals);

                    if new_cost.is_finite() && new_cost < cost {
                        break Some((step, new_params, new_residuals, new_cost));
                    }
                    tracing::trace!(lambda, cost, new_cost, "rejected step");
                }

                if lambda >= self.config.max_lambda {
                    break None;
                }
                lambda = (lambda * self.config.lambda_up_factor).min(self.config.max_lambda);
            };

            let Some((step, new_params, new_residuals, new_cost)) = accepted else {
                break IterationStatus::Failed(
                    "Failed to decrease cost, and lambda reached maximum".to_string(),
                );
            };

            let step_norm = l2_norm(&step);
            let param_norm = l2_norm(&params);
            let cost_change = cost - new_cost;

            params = new_params;
            residuals = new_residuals;
            let old_cost = cost;
            cost = new_cost;
            lambda = (lambda * self.config.lambda_down_factor).max(self.config.min_lambda);
            iterations += 1;

            if cost_change <= self.config.ftol * old_cost {
                break IterationStatus::Converged(format!(
                    "Cost convergence: |df|/|f| = {:.2e} <= {:.2e}",
                    cost_change / old_cost.max(f64::MIN_POSITIVE),
                    self.config.ftol
                ));
            }
            if step_norm <= self.config.xtol * (param_norm + self.config.xtol) {
                break IterationStatus::Converged(format!(
                    "Parameter convergence: |dx|/|x| = {:.2e} <= {:.2e}",
                    step_norm / param_norm.max(f64::MIN_POSITIVE),
                    self.config.xtol
                ));
            }
        };

        let (success, message) = match status {
            IterationStatus::Converged(message) => (true, message),
            IterationStatus::Failed(message) => (false, message),
        };

        let jacobian = if self.config.calc_jacobian {
            Some(self.jacobian(problem, &params, &residuals)?)
        } else {
            None
        };

        Ok(LmResult {
            params,
            residuals,
            cost,
            iterations,
            func_evals,
            success,
            message,
            jacobian,
        })
    }
}

fn sum_of_squares(residuals: &Array1<f64>) -> f64 {
    residuals.iter().map(|r| r.powi(2)).sum()
}

fn l2_norm(v: &Array1<f64>) -> f64 {
    v.iter().map(|x| x * x).sum::<f64>().sqrt()
}

/// Solves `(A + λ·diag(A)) x = b` for symmetric positive semi-definite `A`.
///
/// Returns `None` if the damped matrix is not positive definite.
fn solve_damped(a: &Array2<f64>, b: &Array1<f64>, lambda: f64) -> Option<Array1<f64>> {
    let mut damped = a.clone();
    for i in 0..a.nrows() {
        damped[[i, i]] += lambda * a[[i, i]].max(f64::EPSILON);
    }
    cholesky_solve(&damped, b)
}

/// Solves `A x = b` through the Cholesky factorization `A = L Lᵀ`.
pub(crate) fn cholesky_solve(a: &Array2<f64>, b: &Array1<f64>) -> Option<Array1<f64>> {
    let l = cholesky(a)?;
    let n = b.len();

    // L y = b
    let mut y = Array1::zeros(n);
    for i in 0..n {
        let mut sum = b[i];
        for k in 0..i {
            sum -= l[[i, k]] * y[k];
        }
        y[i] = sum / l[[i, i]];
    }

    // Lᵀ x = y
    let mut x = Array1::zeros(n);
    for i in (0..n).rev() {
        let mut sum = y[i];
        for k in i + 1..n {
            sum -= l[[k, i]] * x[k];
        }
        x[i] = sum / l[[i, i]];
    }

    x.iter().all(|v: &f64| v.is_finite()).then_some(x)
}

/// Lower-triangular Cholesky factor, `None` unless `a` is positive definite.
pub(crate) fn cholesky(a: &Array2<f64>) -> Option<Array2<f64>> {
    let n = a.nrows();
    if a.ncols() != n {
        return None;
    }

    let mut l = Array2::<f64>::zeros((n, n));
    for i in 0..n {
        for j in 0..=i {
            let mut sum = a[[i, j]];
            for k in 0..j {
                sum -= l[[i, k]] * l[[j, k]];
            }

            if i == j {
                if sum <= 0.0 || !sum.is_finite() {
                    return None;
                }
                l[[i, j]] = sum.sqrt();
            } else {
                l[[i, j]] = sum / l[[j, j]];
            }
        }
    }
    Some(l)
}
