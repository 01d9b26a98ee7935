//! Independent fits of many spectra.
//!
//! Each spectrum is fitted with its own model graph and parameter set, built
//! by a caller-supplied closure, so no mutable state is shared between fits.
//! Read-only data such as tabulated resolution samples can be shared by
//! building every model from the same `Arc<LinearInterpolator>`.
//!
//! Spectra carrying errors `e` are fitted with weights `1 / e`.

#[cfg(feature = "parallel")]
use rayon::prelude::*;

use crate::data::Spectrum;
use crate::error::Result;
use crate::fit::{fit_weighted, fit_with_config, FitConfig, FitResult};
use crate::model::Model;
use crate::parameters::Parameters;

/// Fits one spectrum with a freshly built model and parameter set.
pub fn fit_spectrum<F>(
    index: usize,
    spectrum: &Spectrum,
    config: &FitConfig,
    build: &F,
) -> Result<FitResult>
where
    F: Fn(usize, &Spectrum) -> Result<(Box<dyn Model>, Parameters)>,
{
    let (model, params) = build(index, spectrum)?;
    match spectrum.weights() {
        Some(weights) => fit_weighted(
            model.as_ref(),
            &params,
            &spectrum.x,
            &spectrum.y,
            &weights,
            config,
        ),
        None => fit_with_config(model.as_ref(), &params, &spectrum.x, &spectrum.y, config),
    }
}

/// Fits every spectrum in turn; results are in input order.
pub fn fit_spectra<F>(spectra: &[Spectrum], config: &FitConfig, build: F) -> Vec<Result<FitResult>>
where
    F: Fn(usize, &Spectrum) -> Result<(Box<dyn Model>, Parameters)>,
{
    spectra
        .iter()
        .enumerate()
        .map(|(i, spectrum)| fit_spectrum(i, spectrum, config, &build))
        .collect()
}

/// Fits every spectrum on the rayon thread pool; results are in input order.
///
/// A failing fit does not affect the others.
#[cfg(feature = "parallel")]
pub fn fit_spectra_parallel<F>(
    spectra: &[Spectrum],
    config: &FitConfig,
    build: F,
) -> Vec<Result<FitResult>>
where
    F: Fn(usize, &Spectrum) -> Result<(Box<dyn Model>, Parameters)> + Sync,
{
    tracing::debug!(
        spectra = spectra.len(),
        threads = rayon::current_num_threads(),
        "fitting spectra in parallel"
    );
    spectra
        .par_iter()
        .enumerate()
        .map(|(i, spectrum)| fit_spectrum(i, spectrum, config, &build))
        .collect()
}
