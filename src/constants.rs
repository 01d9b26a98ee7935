//! Physical constants in the units of quasi-elastic spectra (meV, ps).

/// Planck constant divided by the elementary charge, in meV·ps.
pub const PLANCK_CONSTANT: f64 = 6.626_070_15e-34 / 1.602_176_634e-19 * 1e15;

/// Reduced Planck constant, in meV·ps.
pub const HBAR: f64 = PLANCK_CONSTANT / (2.0 * std::f64::consts::PI);
