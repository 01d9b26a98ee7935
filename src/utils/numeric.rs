//! Small numeric helpers shared by the models.

use crate::error::{QefError, Result};
use ndarray::Array1;

/// Grid spacing `(x[n-1] - x[0]) / (n - 1)` of a uniformly sampled array.
pub fn uniform_spacing(x: &Array1<f64>) -> Result<f64> {
    let n = x.len();
    if n < 2 {
        return Err(QefError::InvalidInput(format!(
            "grid spacing needs at least two samples, got {}",
            n
        )));
    }
    Ok((x[n - 1] - x[0]) / (n - 1) as f64)
}

/// Index of the first maximum, ignoring NaN.
pub fn argmax(values: &Array1<f64>) -> Option<usize> {
    values
        .iter()
        .enumerate()
        .filter(|(_, v)| !v.is_nan())
        .fold(None, |best: Option<(usize, f64)>, (i, &v)| match best {
            Some((_, b)) if b >= v => best,
            _ => Some((i, v)),
        })
        .map(|(i, _)| i)
}

/// Index of the first minimum, ignoring NaN.
pub fn argmin(values: &Array1<f64>) -> Option<usize> {
    argmax(&values.mapv(|v| -v))
}

pub fn is_strictly_increasing(x: &Array1<f64>) -> bool {
    x.iter().zip(x.iter().skip(1)).all(|(a, b)| b > a)
}

/// Initial amplitude, center and width of a single peak.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PeakGuess {
    pub amplitude: f64,
    pub center: f64,
    pub sigma: f64,
}

/// Estimates a peak from the samples above half maximum.
///
/// The center is the mean of those abscissae and `sigma` half their span;
/// with two or fewer samples above half maximum the center falls back to
/// the position of the maximum and `sigma` to a sixth of the x range. The
/// amplitude is `3·(max - min)·sigma·amplitude_scale`.
pub fn guess_from_peak(
    y: &Array1<f64>,
    x: &Array1<f64>,
    amplitude_scale: f64,
) -> Result<PeakGuess> {
    if x.len() != y.len() {
        return Err(QefError::ShapeMismatch(format!(
            "x has {} samples but y has {}",
            x.len(),
            y.len()
        )));
    }

    let mut pairs: Vec<(f64, f64)> = x.iter().copied().zip(y.iter().copied()).collect();
    pairs.sort_by(|a, b| a.0.total_cmp(&b.0));
    let xs: Array1<f64> = pairs.iter().map(|p| p.0).collect();
    let ys: Array1<f64> = pairs.iter().map(|p| p.1).collect();

    let i_max = argmax(&ys)
        .ok_or_else(|| QefError::InvalidInput("no finite samples to guess from".to_string()))?;
    let max_y = ys[i_max];
    let min_y = ys.iter().copied().filter(|v| !v.is_nan()).fold(f64::INFINITY, f64::min);
    let min_x = xs[0];
    let max_x = xs[xs.len() - 1];

    let height = (max_y - min_y) * 3.0;
    let mut center = xs[i_max];
    let mut sigma = (max_x - min_x) / 6.0;

    let half_max = (max_y + min_y) / 2.0;
    let above: Vec<f64> = xs
        .iter()
        .zip(ys.iter())
        .filter(|(_, yv)| **yv > half_max)
        .map(|(&xv, _)| xv)
        .collect();
    if above.len() > 2 {
        sigma = (above[above.len() - 1] - above[0]) / 2.0;
        center = above.iter().sum::<f64>() / above.len() as f64;
    }

    Ok(PeakGuess {
        amplitude: height * sigma * amplitude_scale,
        center,
        sigma,
    })
}

/// Ordinary least-squares line `(slope, intercept)` through the samples.
pub fn linear_regression(x: &Array1<f64>, y: &Array1<f64>) -> Result<(f64, f64)> {
    if x.len() != y.len() {
        return Err(QefError::ShapeMismatch(format!(
            "x has {} samples but y has {}",
            x.len(),
            y.len()
        )));
    }
    let n = x.len() as f64;
    let (mean_x, mean_y) = match (x.mean(), y.mean()) {
        (Some(mx), Some(my)) => (mx, my),
        _ => return Err(QefError::InvalidInput("no samples to regress".to_string())),
    };

    let sxx: f64 = x.iter().map(|v| (v - mean_x).powi(2)).sum();
    if sxx == 0.0 || n < 2.0 {
        return Ok((0.0, mean_y));
    }
    let sxy: f64 = x
        .iter()
        .zip(y.iter())
        .map(|(xv, yv)| (xv - mean_x) * (yv - mean_y))
        .sum();

    let slope = sxy / sxx;
    Ok((slope, mean_y - slope * mean_x))
}
