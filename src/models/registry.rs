//! Name-to-factory table of model constructors.
//!
//! The registry holds exactly what was registered on it: built-in models are
//! added by an explicit call to [`ModelRegistry::register_builtin_models`]
//! (or [`ModelRegistry::with_builtin_models`]), never discovered implicitly.

use crate::error::{QefError, Result};
use crate::model::Model;
use crate::models::{
    ConstantModel, DeltaDiracModel, GaussianModel, LinearModel, LorentzianModel,
    TeixeiraWaterModel,
};
use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

/// Builds a model with the given prefix
pub type ModelFactory = Arc<dyn Fn(&str) -> Result<Box<dyn Model>> + Send + Sync>;

#[derive(Clone, Default)]
pub struct ModelRegistry {
    factories: BTreeMap<String, ModelFactory>,
}

impl ModelRegistry {
    /// An empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// A registry holding the built-in analytic models.
    pub fn with_builtin_models() -> Self {
        let mut registry = Self::new();
        registry.register_builtin_models();
        registry
    }

    /// Registers `gaussian`, `lorentzian`, `constant`, `linear`,
    /// `delta_dirac` and `teixeira_water` (at `q = 0`; use
    /// [`TeixeiraWaterModel::set_q`] on a concrete instance).
    ///
    /// Tabulated models need samples and are built directly.
    pub fn register_builtin_models(&mut self) {
        self.register("gaussian", |prefix| {
            Ok(Box::new(GaussianModel::new().with_prefix(prefix)))
        });
        self.register("lorentzian", |prefix| {
            Ok(Box::new(LorentzianModel::new().with_prefix(prefix)))
        });
        self.register("constant", |prefix| {
            Ok(Box::new(ConstantModel::new().with_prefix(prefix)))
        });
        self.register("linear", |prefix| {
            Ok(Box::new(LinearModel::new().with_prefix(prefix)))
        });
        self.register("delta_dirac", |prefix| {
            Ok(Box::new(DeltaDiracModel::new().with_prefix(prefix)))
        });
        self.register("teixeira_water", |prefix| {
            Ok(Box::new(TeixeiraWaterModel::new(0.0).with_prefix(prefix)))
        });
    }

    /// Adds or replaces the factory for `name`.
    pub fn register<F>(&mut self, name: &str, factory: F)
    where
        F: Fn(&str) -> Result<Box<dyn Model>> + Send + Sync + 'static,
    {
        tracing::debug!(model = name, "registered model factory");
        self.factories.insert(name.to_string(), Arc::new(factory));
    }

    pub fn unregister(&mut self, name: &str) -> bool {
        self.factories.remove(name).is_some()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.factories.contains_key(name)
    }

    /// Registered names, sorted
    pub fn names(&self) -> Vec<String> {
        self.factories.keys().cloned().collect()
    }

    /// Creates the model registered as `name` with the given prefix.
    pub fn create(&self, name: &str, prefix: &str) -> Result<Box<dyn Model>> {
        let factory = self
            .factories
            .get(name)
            .ok_or_else(|| QefError::UnknownModel(name.to_string()))?;
        factory(prefix)
    }
}

impl fmt::Debug for ModelRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ModelRegistry")
            .field("models", &self.names())
            .finish()
    }
}
