//! Parameter space definitions: names, bounds, and integer rounding for each
//! decision variable a problem exposes to the optimizer.

use ndarray::{Array1, ArrayView1};

use crate::error::ConfigError;

/// The bounds and kind of a single decision variable.
#[derive(Debug, Clone, PartialEq)]
pub struct ParameterSpec {
    pub name: String,
    pub lower: f64,
    pub upper: f64,
    pub is_integer: bool,
}

impl ParameterSpec {
    pub fn new(name: impl Into<String>, lower: f64, upper: f64, is_integer: bool) -> Self {
        Self {
            name: name.into(),
            lower,
            upper,
            is_integer,
        }
    }

    pub fn continuous(name: impl Into<String>, lower: f64, upper: f64) -> Self {
        Self::new(name, lower, upper, false)
    }

    pub fn integer(name: impl Into<String>, lower: f64, upper: f64) -> Self {
        Self::new(name, lower, upper, true)
    }

    /// Clips `value` to `[lower, upper]`, rounding to the nearest integer
    /// first when this parameter is integer-valued.
    pub fn clamp(&self, value: f64) -> f64 {
        let v = if self.is_integer {
            value.round()
        } else {
            value
        };
        v.clamp(self.lower, self.upper)
    }
}

/// The full decision-variable space of a problem: an ordered list of
/// [`ParameterSpec`]s, with name-to-index lookup.
#[derive(Debug, Clone)]
pub struct ParameterSpace {
    specs: Vec<ParameterSpec>,
}

impl ParameterSpace {
    pub fn new(specs: Vec<ParameterSpec>) -> Result<Self, ConfigError> {
        if specs.is_empty() {
            return Err(ConfigError::EmptyParameterSpace);
        }
        for spec in &specs {
            if !(spec.lower < spec.upper) {
                return Err(ConfigError::InvalidBounds {
                    name: spec.name.clone(),
                    lower: spec.lower,
                    upper: spec.upper,
                });
            }
        }
        Ok(Self { specs })
    }

    pub fn dim(&self) -> usize {
        self.specs.len()
    }

    pub fn specs(&self) -> &[ParameterSpec] {
        &self.specs
    }

    pub fn names(&self) -> Vec<&str> {
        self.specs.iter().map(|s| s.name.as_str()).collect()
    }

    pub fn index_of(&self, name: &str) -> Option<usize> {
        self.specs.iter().position(|s| s.name == name)
    }

    pub fn lower_bounds(&self) -> Array1<f64> {
        Array1::from_iter(self.specs.iter().map(|s| s.lower))
    }

    pub fn upper_bounds(&self) -> Array1<f64> {
        Array1::from_iter(self.specs.iter().map(|s| s.upper))
    }

    pub fn integer_mask(&self) -> Array1<bool> {
        Array1::from_iter(self.specs.iter().map(|s| s.is_integer))
    }

    /// Clamps (and rounds integer dimensions of) a candidate vector in place.
    pub fn clamp_row(&self, row: ArrayView1<f64>) -> Array1<f64> {
        Array1::from_iter(
            row.iter()
                .zip(self.specs.iter())
                .map(|(&v, spec)| spec.clamp(v)),
        )
    }
}
