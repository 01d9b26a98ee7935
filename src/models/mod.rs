//! Built-in model implementations for quasi-elastic spectra.
//!
//! This module provides the lineshapes (Gaussian, Lorentzian, jump
//! diffusion), backgrounds, the Dirac delta, tabulated models, the model
//! algebra and the name-to-factory registry.

pub mod background;
pub mod composite;
pub mod delta_dirac;
pub mod peak;
pub mod registry;
pub mod tabulated;
pub mod teixeira;

pub use background::{ConstantModel, LinearModel};
pub use composite::{add, divide, multiply, subtract, CompositeModel, Operation};
pub use delta_dirac::DeltaDiracModel;
pub use peak::{GaussianModel, LorentzianModel};
pub use registry::{ModelFactory, ModelRegistry};
pub use tabulated::TabulatedModel;
pub use teixeira::TeixeiraWaterModel;

/// Create a Gaussian peak model with the given prefix
pub fn gaussian_model(prefix: &str) -> GaussianModel {
    GaussianModel::new().with_prefix(prefix)
}

/// Create a Lorentzian peak model with the given prefix
pub fn lorentzian_model(prefix: &str) -> LorentzianModel {
    LorentzianModel::new().with_prefix(prefix)
}

/// Create a flat background with the given prefix
pub fn constant_model(prefix: &str) -> ConstantModel {
    ConstantModel::new().with_prefix(prefix)
}
