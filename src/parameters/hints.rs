//! Per-model parameter hints
//!
//! A model declares defaults for its parameters (initial value, bounds, vary
//! flag, expression) as hints keyed by base name. Hints are turned into real
//! parameters by `Model::make_params`.

use serde::{Deserialize, Serialize};

/// Default settings for one parameter; unset fields keep their previous value
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ParamHint {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub min: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub vary: Option<bool>,
    /// Expression written in base (unprefixed) names
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expr: Option<String>,
}

impl ParamHint {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn value(mut self, value: f64) -> Self {
        self.value = Some(value);
        self
    }

    pub fn min(mut self, min: f64) -> Self {
        self.min = Some(min);
        self
    }

    pub fn max(mut self, max: f64) -> Self {
        self.max = Some(max);
        self
    }

    pub fn vary(mut self, vary: bool) -> Self {
        self.vary = Some(vary);
        self
    }

    pub fn expr(mut self, expr: &str) -> Self {
        self.expr = Some(expr.to_string());
        self
    }

    /// Overwrite the fields that `other` sets
    pub fn merge(&mut self, other: &ParamHint) {
        if other.value.is_some() {
            self.value = other.value;
        }
        if other.min.is_some() {
            self.min = other.min;
        }
        if other.max.is_some() {
            self.max = other.max;
        }
        if other.vary.is_some() {
            self.vary = other.vary;
        }
        if other.expr.is_some() {
            self.expr = other.expr.clone();
        }
    }
}

/// Ordered hint table keyed by base name
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ParamHints {
    entries: Vec<(String, ParamHint)>,
}

impl ParamHints {
    pub fn new() -> Self {
        Self::default()
    }

    /// Merge `hint` into the entry for `name`, creating it if needed
    pub fn set(&mut self, name: &str, hint: ParamHint) {
        match self.entries.iter_mut().find(|(n, _)| n == name) {
            Some((_, existing)) => existing.merge(&hint),
            None => self.entries.push((name.to_string(), hint)),
        }
    }

    pub fn get(&self, name: &str) -> Option<&ParamHint> {
        self.entries.iter().find(|(n, _)| n == name).map(|(_, h)| h)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &ParamHint)> {
        self.entries.iter().map(|(n, h)| (n.as_str(), h))
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
