//! Polynomial mutation, global-bound formula: a per-gene coin flip against
//! `mutation_rate` decides whether the draw falls on the "low" or "high"
//! branch of the delta formula, applied against the gene's own
//! `[lb, ub]` range. Rewritten from Deb's per-gene-bound PM variant this
//! module used before, to match the simpler global formula the embedded
//! NSGA-II kernel is specified to use.

use ndarray::{Array1, Array2};

use crate::random::RandomGenerator;

#[derive(Debug, Clone)]
pub struct PolynomialMutation {
    /// Per-gene mutation chance.
    pub mutation_rate: f64,
    /// Distribution index (`mum`).
    pub distribution_index: f64,
}

impl PolynomialMutation {
    pub fn new(mutation_rate: f64, distribution_index: f64) -> Self {
        Self {
            mutation_rate,
            distribution_index,
        }
    }

    /// Produces `n_children` mutated copies of `parent`, one per row.
    pub fn mutate(
        &self,
        parent: &Array1<f64>,
        lb: &Array1<f64>,
        ub: &Array1<f64>,
        n_children: usize,
        rng: &mut impl RandomGenerator,
    ) -> Array2<f64> {
        let n = parent.len();
        let mut children = Array2::<f64>::zeros((n_children, n));
        let mum = self.distribution_index;

        for c in 0..n_children {
            for j in 0..n {
                let u = rng.gen_probability();
                let delta = if u < self.mutation_rate {
                    (2.0 * u).powf(1.0 / (mum + 1.0)) - 1.0
                } else {
                    1.0 - (2.0 * (1.0 - u)).powf(1.0 / (mum + 1.0))
                };
                let value = parent[j] + (ub[j] - lb[j]) * delta;
                children[[c, j]] = value.clamp(lb[j], ub[j]);
            }
        }
        children
    }
}
