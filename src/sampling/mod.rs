//! Quasi-random sampling primitives over the unit hypercube.
//!
//! Both samplers share the same contract: `sample(n, d) -> n x d matrix in
//! `[0, 1]^d``. Callers rescale columns to a parameter space's bounds
//! themselves (see [`crate::space::ParameterSpace`]).

pub mod glp;
pub mod latin_hypercube;

pub use glp::GoodLatticePointSampler;
pub use latin_hypercube::LatinHypercubeSampler;

use ndarray::Array2;

use crate::random::RandomGenerator;

/// A sampler producing points in `[0, 1]^d`.
pub trait Sampler {
    fn sample(&self, n: usize, d: usize, rng: &mut impl RandomGenerator) -> Array2<f64>;
}

/// Which sampler seeds a problem's initial batch, selected by
/// `initial_method` in `DistOptimizerConfig`/`StrategyConfig`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InitialMethod {
    Glp,
    LatinHypercube,
}

impl Default for InitialMethod {
    fn default() -> Self {
        Self::Glp
    }
}

/// Rescales a unit-cube sample to `[lb, ub]` column-wise.
pub fn rescale(unit_sample: &Array2<f64>, lower: &[f64], upper: &[f64]) -> Array2<f64> {
    let mut out = unit_sample.clone();
    for mut row in out.rows_mut() {
        for (j, v) in row.iter_mut().enumerate() {
            *v = *v * (upper[j] - lower[j]) + lower[j];
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    #[test]
    fn test_rescale() {
        let unit = array![[0.0, 1.0], [0.5, 0.5]];
        let rescaled = rescale(&unit, &[0.0, -10.0], &[10.0, 10.0]);
        assert_eq!(rescaled, array![[0.0, 10.0], [5.0, 0.0]]);
    }
}
