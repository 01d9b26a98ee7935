//! Observed spectra.
//!
//! A data loader hands over `{x, y, e, q}`: one energy axis shared by one or
//! more spectra, optional errors and one momentum transfer per spectrum.
//! [`SpectrumSet`] deserializes that layout from JSON, where `y` and `e` may
//! be a single array or an array of arrays, and checks that `x` is strictly
//! increasing and every spectrum matches its length.

use ndarray::Array1;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

use crate::error::{QefError, Result};
use crate::utils::numeric::is_strictly_increasing;

/// One spectrum: intensities `y` (with optional errors `e`) over `x`.
#[derive(Debug, Clone, PartialEq)]
pub struct Spectrum {
    pub x: Array1<f64>,
    pub y: Array1<f64>,
    pub e: Option<Array1<f64>>,
    /// Momentum transfer
    pub q: Option<f64>,
}

impl Spectrum {
    /// # Errors
    ///
    /// `InvalidInput` if `x` is not strictly increasing, `ShapeMismatch` if
    /// `y` or `e` differ in length from `x`.
    pub fn new(
        x: Array1<f64>,
        y: Array1<f64>,
        e: Option<Array1<f64>>,
        q: Option<f64>,
    ) -> Result<Self> {
        check_axis(&x)?;
        check_length(&x, &y, "y")?;
        if let Some(e) = &e {
            check_length(&x, e, "e")?;
        }
        Ok(Self { x, y, e, q })
    }

    pub fn len(&self) -> usize {
        self.x.len()
    }

    pub fn is_empty(&self) -> bool {
        self.x.is_empty()
    }

    /// Fit weights `1 / e`, if errors are present.
    ///
    /// Zero or non-finite errors get weight zero.
    pub fn weights(&self) -> Option<Array1<f64>> {
        self.e.as_ref().map(|e| {
            e.mapv(|v| {
                if v.is_finite() && v != 0.0 {
                    1.0 / v.abs()
                } else {
                    0.0
                }
            })
        })
    }
}

/// Several spectra over one shared axis.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "SpectrumSetRepr", into = "SpectrumSetRepr")]
pub struct SpectrumSet {
    x: Array1<f64>,
    y: Vec<Array1<f64>>,
    e: Option<Vec<Array1<f64>>>,
    q: Vec<f64>,
}

#[derive(Serialize, Deserialize)]
#[serde(untagged)]
enum Columns {
    One(Vec<f64>),
    Many(Vec<Vec<f64>>),
}

impl Columns {
    fn into_arrays(self) -> Vec<Array1<f64>> {
        match self {
            Columns::One(v) => vec![Array1::from(v)],
            Columns::Many(vs) => vs.into_iter().map(Array1::from).collect(),
        }
    }
}

#[derive(Serialize, Deserialize)]
struct SpectrumSetRepr {
    x: Vec<f64>,
    y: Columns,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    e: Option<Columns>,
    #[serde(default)]
    q: Vec<f64>,
}

impl TryFrom<SpectrumSetRepr> for SpectrumSet {
    type Error = QefError;

    fn try_from(repr: SpectrumSetRepr) -> Result<Self> {
        SpectrumSet::new(
            Array1::from(repr.x),
            repr.y.into_arrays(),
            repr.e.map(Columns::into_arrays),
            repr.q,
        )
    }
}

impl From<SpectrumSet> for SpectrumSetRepr {
    fn from(set: SpectrumSet) -> Self {
        let to_vecs = |arrays: Vec<Array1<f64>>| {
            Columns::Many(arrays.into_iter().map(|a| a.to_vec()).collect())
        };
        Self {
            x: set.x.to_vec(),
            y: to_vecs(set.y),
            e: set.e.map(to_vecs),
            q: set.q,
        }
    }
}

impl SpectrumSet {
    /// # Errors
    ///
    /// `InvalidInput` if `x` is not strictly increasing, `ShapeMismatch` if a
    /// spectrum or error array differs in length from `x`, or if `e` or a
    /// non-empty `q` does not have one entry per spectrum.
    pub fn new(
        x: Array1<f64>,
        y: Vec<Array1<f64>>,
        e: Option<Vec<Array1<f64>>>,
        q: Vec<f64>,
    ) -> Result<Self> {
        check_axis(&x)?;
        for yi in &y {
            check_length(&x, yi, "y")?;
        }
        if let Some(e) = &e {
            if e.len() != y.len() {
                return Err(QefError::ShapeMismatch(format!(
                    "{} error arrays for {} spectra",
                    e.len(),
                    y.len()
                )));
            }
            for ei in e {
                check_length(&x, ei, "e")?;
            }
        }
        if !q.is_empty() && q.len() != y.len() {
            return Err(QefError::ShapeMismatch(format!(
                "{} q values for {} spectra",
                q.len(),
                y.len()
            )));
        }
        Ok(Self { x, y, e, q })
    }

    pub fn from_json(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }

    pub fn load_json<P: AsRef<Path>>(path: P) -> Result<Self> {
        let contents = fs::read_to_string(path)?;
        Self::from_json(&contents)
    }

    pub fn x(&self) -> &Array1<f64> {
        &self.x
    }

    pub fn q(&self) -> &[f64] {
        &self.q
    }

    /// Number of spectra
    pub fn len(&self) -> usize {
        self.y.len()
    }

    pub fn is_empty(&self) -> bool {
        self.y.is_empty()
    }

    /// The spectrum at `index`, with its own copy of the axis.
    pub fn spectrum(&self, index: usize) -> Option<Spectrum> {
        let y = self.y.get(index)?.clone();
        Some(Spectrum {
            x: self.x.clone(),
            y,
            e: self.e.as_ref().map(|e| e[index].clone()),
            q: self.q.get(index).copied(),
        })
    }

    pub fn spectra(&self) -> Vec<Spectrum> {
        (0..self.len()).filter_map(|i| self.spectrum(i)).collect()
    }
}

fn check_axis(x: &Array1<f64>) -> Result<()> {
    if !is_strictly_increasing(x) {
        return Err(QefError::InvalidInput(
            "x must be strictly increasing".to_string(),
        ));
    }
    Ok(())
}

fn check_length(x: &Array1<f64>, other: &Array1<f64>, what: &str) -> Result<()> {
    if other.len() != x.len() {
        return Err(QefError::ShapeMismatch(format!(
            "{} has {} samples, x has {}",
            what,
            other.len(),
            x.len()
        )));
    }
    Ok(())
}
