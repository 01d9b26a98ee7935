//! Operators combining models beyond elementwise algebra.

pub mod convolve;

pub use convolve::{convolve, convolve_valid, extend_domain, Convolve};
