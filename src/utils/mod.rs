//! Utility functions and helpers for the qef-rs library.

#[cfg(feature = "lm")]
pub mod finite_difference;
pub mod interpolate;
pub mod numeric;

pub use interpolate::{ExtrapolationPolicy, LinearInterpolator};
pub use numeric::{argmax, argmin, guess_from_peak, uniform_spacing, PeakGuess};
