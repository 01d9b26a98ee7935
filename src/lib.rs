//! # qef-rs
//!
//! `qef-rs` builds and fits composite models of quasi-elastic scattering
//! spectra.
//!
//! The library provides:
//! - A parameter system with bounds, constraint expressions and change observers
//! - Analytic lineshapes (Gaussian, Lorentzian, jump diffusion), backgrounds,
//!   a Dirac delta and tabulated models
//! - Model algebra (`+ - * /`) and convolution with an instrumental resolution
//! - A bundled Levenberg-Marquardt minimizer with standard errors, and
//!   independent per-spectrum fits on a thread pool
//!
//! ## Basic Usage
//!
//! ```no_run
//! use ndarray::Array1;
//! use qef_rs::model::Model;
//! use qef_rs::models::{DeltaDiracModel, LorentzianModel};
//! use qef_rs::operators::convolve;
//!
//! let model = convolve(
//!     DeltaDiracModel::new().with_prefix("r_"),
//!     LorentzianModel::new().with_prefix("l_"),
//! )
//! .unwrap();
//! let mut params = model.make_params().unwrap();
//! params.set_value("l_sigma", 0.1).unwrap();
//!
//! let e = Array1::linspace(-1.0, 1.0, 201);
//! let y = model.eval(&params, &e).unwrap();
//! # #[cfg(feature = "lm")]
//! let result = qef_rs::fit::fit(&model, &params, &e, &y).unwrap();
//! ```

pub mod constants;
pub mod data;
pub mod error;
pub mod model;
pub mod models;
pub mod operators;
pub mod parameters;
pub mod utils;

#[cfg(feature = "lm")]
pub mod problem;

#[cfg(feature = "lm")]
pub mod lm;

#[cfg(feature = "lm")]
pub mod fit;

#[cfg(feature = "lm")]
pub mod uncertainty;

#[cfg(feature = "lm")]
pub mod parallel;

// Re-exports for convenience
pub use data::{Spectrum, SpectrumSet};
pub use error::{QefError, Result};
pub use model::{evaluate, Model};
pub use operators::{convolve, Convolve};
pub use parameters::{Parameter, ParameterSet, Parameters};

#[cfg(feature = "lm")]
pub use fit::{fit, fit_with_config, FitConfig, FitResult};

#[cfg(feature = "lm")]
pub use lm::LevenbergMarquardt;

#[cfg(feature = "lm")]
pub use problem::Problem;

#[cfg(feature = "parallel")]
pub use parallel::fit_spectra_parallel;

/// Version of the library
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
