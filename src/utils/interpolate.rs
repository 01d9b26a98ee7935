//! Piecewise-linear interpolation over tabulated samples.
//!
//! For `x` between samples `(xᵢ, yᵢ)` and `(xᵢ₊₁, yᵢ₊₁)`:
//! `y(x) = yᵢ + (yᵢ₊₁ - yᵢ) · (x - xᵢ) / (xᵢ₊₁ - xᵢ)`.
//! Outside the sampled range the [`ExtrapolationPolicy`] decides.

use crate::error::{QefError, Result};
use ndarray::Array1;
use serde::{Deserialize, Serialize};

/// What an interpolant returns outside `[x_min, x_max]`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExtrapolationPolicy {
    /// Extend the first and last segments linearly
    Extrapolate,
    /// Hold the boundary sample values
    #[default]
    Clamp,
}

/// A piecewise-linear interpolant with strictly increasing abscissae.
#[derive(Debug, Clone, PartialEq)]
pub struct LinearInterpolator {
    x: Vec<f64>,
    y: Vec<f64>,
    policy: ExtrapolationPolicy,
}

impl LinearInterpolator {
    /// Builds the interpolant, sorting the samples by `x`.
    ///
    /// # Errors
    ///
    /// `InterpolationDomain` if the arrays differ in length, hold fewer than
    /// two samples, contain non-finite values or repeat an `x` value.
    pub fn new(x: &[f64], y: &[f64], policy: ExtrapolationPolicy) -> Result<Self> {
        if x.len() != y.len() {
            return Err(QefError::InterpolationDomain(format!(
                "x has {} samples but y has {}",
                x.len(),
                y.len()
            )));
        }
        if x.len() < 2 {
            return Err(QefError::InterpolationDomain(
                "at least two samples are required".to_string(),
            ));
        }
        if x.iter().chain(y).any(|v| !v.is_finite()) {
            return Err(QefError::InterpolationDomain(
                "samples must be finite".to_string(),
            ));
        }

        let mut pairs: Vec<(f64, f64)> = x.iter().copied().zip(y.iter().copied()).collect();
        pairs.sort_by(|a, b| a.0.total_cmp(&b.0));

        if let Some(w) = pairs.windows(2).find(|w| w[0].0 == w[1].0) {
            return Err(QefError::InterpolationDomain(format!(
                "duplicate x value {}",
                w[0].0
            )));
        }

        let (x, y) = pairs.into_iter().unzip();
        Ok(Self { x, y, policy })
    }

    pub fn policy(&self) -> ExtrapolationPolicy {
        self.policy
    }

    pub fn x(&self) -> &[f64] {
        &self.x
    }

    pub fn y(&self) -> &[f64] {
        &self.y
    }

    /// Sampled range `(x_min, x_max)`
    pub fn domain(&self) -> (f64, f64) {
        (self.x[0], self.x[self.x.len() - 1])
    }

    /// Interpolated value at `x`.
    pub fn at(&self, x: f64) -> f64 {
        if x.is_nan() {
            return f64::NAN;
        }

        let n = self.x.len();
        let (x_min, x_max) = self.domain();
        if self.policy == ExtrapolationPolicy::Clamp {
            if x <= x_min {
                return self.y[0];
            }
            if x >= x_max {
                return self.y[n - 1];
            }
        }

        // Segment i spans x[i]..x[i + 1]; edge segments also cover extrapolation.
        let i = self.x.partition_point(|&xi| xi <= x).clamp(1, n - 1) - 1;
        let t = (x - self.x[i]) / (self.x[i + 1] - self.x[i]);
        self.y[i] + (self.y[i + 1] - self.y[i]) * t
    }

    /// Interpolated values at every point of `x`.
    pub fn eval(&self, x: &Array1<f64>) -> Array1<f64> {
        x.mapv(|v| self.at(v))
    }
}
