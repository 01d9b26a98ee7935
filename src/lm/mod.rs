//! Levenberg-Marquardt algorithm implementation.
//!
//! This module provides the nonlinear least-squares minimizer used by
//! [`crate::fit`]. It works on any [`crate::problem::Problem`].

pub mod algorithm;
pub mod config;

pub use algorithm::{LevenbergMarquardt, LmResult};
pub use config::LmConfig;
