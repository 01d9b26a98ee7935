//! Convolution of a physical model with an instrumental resolution.
//!
//! The resolution width is assumed independent of energy. For energies `e`
//! with spacing `de`:
//!
//! `(model ⊗ resolution)[n] = de · Σₘ model[m] · resolution[n - m]`
//!
//! The model is evaluated on a symmetrically extended energy range so the
//! finite sums do not truncate it at the edges of `e`.

use crate::error::{QefError, Result};
use crate::model::Model;
use crate::models::composite::{check_same_length, forward_hint, merge_params};
use crate::parameters::{ParamHint, ParamValues, Parameters};
use crate::utils::numeric::uniform_spacing;
use ndarray::{concatenate, Array1, Axis};

/// Extends `e` by mirroring its positive part below `min(e)` and its
/// negative part above `max(e)`.
///
/// The result is `2n - 1` samples long when `e` contains zero, `2n`
/// otherwise.
pub fn extend_domain(e: &Array1<f64>) -> Result<Array1<f64>> {
    if e.is_empty() {
        return Ok(e.clone());
    }
    let min = e.iter().copied().fold(f64::INFINITY, f64::min);
    let max = e.iter().copied().fold(f64::NEG_INFINITY, f64::max);

    let neg_e: Array1<f64> = e.iter().rev().filter(|v| **v > 0.0).map(|v| min - v).collect();
    let pos_e: Array1<f64> = e.iter().rev().filter(|v| **v < 0.0).map(|v| max - v).collect();

    concatenate(Axis(0), &[neg_e.view(), e.view(), pos_e.view()])
        .map_err(|err| QefError::ShapeMismatch(format!("cannot extend energy grid: {}", err)))
}

/// Discrete convolution keeping only the positions of full overlap.
///
/// The result has `len(long) - len(short) + 1` samples, where `long` is the
/// longer of the two inputs. An empty input yields an empty result.
pub fn convolve_valid(signal: &Array1<f64>, kernel: &Array1<f64>) -> Array1<f64> {
    let (long, short) = if signal.len() >= kernel.len() {
        (signal, kernel)
    } else {
        (kernel, signal)
    };
    if short.is_empty() {
        return Array1::zeros(0);
    }

    let ns = short.len();
    let n_out = long.len() - ns + 1;
    Array1::from_shape_fn(n_out, |j| {
        short
            .iter()
            .enumerate()
            .map(|(i, s)| s * long[j + ns - 1 - i])
            .sum()
    })
}

/// Resolution ⊗ model, evaluated on the caller's energy grid.
#[derive(Debug, Clone)]
pub struct Convolve {
    resolution: Box<dyn Model>,
    model: Box<dyn Model>,
}

impl Convolve {
    /// # Errors
    ///
    /// `ParameterCollision` if the two models share a prefixed parameter
    /// name, `InvalidInput` if their independent variables differ.
    pub fn new(resolution: Box<dyn Model>, model: Box<dyn Model>) -> Result<Self> {
        merge_params(resolution.as_ref(), model.as_ref())?;
        tracing::debug!(
            resolution = %resolution.name(),
            model = %model.name(),
            "created convolution"
        );
        Ok(Self { resolution, model })
    }

    pub fn resolution(&self) -> &dyn Model {
        self.resolution.as_ref()
    }

    pub fn model(&self) -> &dyn Model {
        self.model.as_ref()
    }

    /// Convolves model samples on the extended grid with resolution samples
    /// on `e`, trimming to `n` samples.
    fn convolve_to_grid(
        &self,
        model_data: &Array1<f64>,
        res_data: &Array1<f64>,
        n: usize,
        de: f64,
    ) -> Result<Array1<f64>> {
        let mut c = convolve_valid(model_data, res_data) * de;

        // Without a sample at zero the extended grid has 2n points and the
        // valid region one more than `e`.
        if c.len() == n + 1 {
            tracing::trace!(len = c.len(), "dropping trailing convolution sample");
            c = c.slice(ndarray::s![..n]).to_owned();
        }

        if c.len() != n {
            return Err(QefError::ConvolutionShape {
                expected: n,
                found: c.len(),
            });
        }
        Ok(c)
    }

    /// Resolution samples on `e`, the extended grid and the spacing.
    fn prepare(
        &self,
        values: &ParamValues,
        e: &Array1<f64>,
    ) -> Result<(Array1<f64>, Array1<f64>, f64)> {
        let de = uniform_spacing(e)?;
        let res_data = self.resolution.eval_values(values, e)?;
        check_same_length(&res_data, e, "resolution output and energies differ")?;
        Ok((res_data, extend_domain(e)?, de))
    }
}

impl Model for Convolve {
    fn prefix(&self) -> &str {
        ""
    }

    fn independent_var(&self) -> &str {
        self.resolution.independent_var()
    }

    fn param_names(&self) -> Vec<String> {
        let mut names = self.resolution.param_names();
        names.extend(self.model.param_names());
        names
    }

    fn eval_values(&self, values: &ParamValues, e: &Array1<f64>) -> Result<Array1<f64>> {
        let (res_data, extended, de) = self.prepare(values, e)?;
        let model_data = self.model.eval_values(values, &extended)?;
        check_same_length(&model_data, &extended, "model output and extended grid differ")?;
        self.convolve_to_grid(&model_data, &res_data, e.len(), de)
    }

    fn make_params(&self) -> Result<Parameters> {
        merge_params(self.resolution.as_ref(), self.model.as_ref())
    }

    fn set_param_hint(&mut self, name: &str, hint: ParamHint) -> Result<()> {
        forward_hint(self.resolution.as_mut(), self.model.as_mut(), name, hint)
    }

    fn guess(&self, _y: &Array1<f64>, _x: &Array1<f64>) -> Result<Parameters> {
        Err(QefError::NotImplemented(format!(
            "guess for convolution {}",
            self.name()
        )))
    }

    fn clone_box(&self) -> Box<dyn Model> {
        Box::new(self.clone())
    }

    fn name(&self) -> String {
        format!("convolve({}, {})", self.resolution.name(), self.model.name())
    }

    /// Each component of the physical model convolved with the resolution.
    fn eval_components(
        &self,
        values: &ParamValues,
        e: &Array1<f64>,
    ) -> Result<Vec<(String, Array1<f64>)>> {
        let (res_data, extended, de) = self.prepare(values, e)?;
        self.model
            .eval_components(values, &extended)?
            .into_iter()
            .map(|(prefix, data)| {
                check_same_length(&data, &extended, "component output and extended grid differ")?;
                Ok((prefix, self.convolve_to_grid(&data, &res_data, e.len(), de)?))
            })
            .collect()
    }
}

/// `resolution ⊗ model`
pub fn convolve<R, M>(resolution: R, model: M) -> Result<Convolve>
where
    R: Model + 'static,
    M: Model + 'static,
{
    Convolve::new(Box::new(resolution), Box::new(model))
}
