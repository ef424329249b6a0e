//! Simulated binary crossover (SBX), global-bound formula: a single `beta`
//! exponent computed from the crossover distribution index `mu`, applied
//! identically to every gene (as opposed to the per-bound-aware beta this
//! module used before the rewrite). Children are clipped component-wise to
//! `[lb, ub]`.

use ndarray::{Array1, Array2};

use crate::random::RandomGenerator;

#[derive(Debug, Clone)]
pub struct SBXCrossover {
    /// Distribution index (`mu`) controlling offspring spread.
    pub distribution_index: f64,
}

impl SBXCrossover {
    pub fn new(distribution_index: f64) -> Self {
        Self { distribution_index }
    }

    /// Produces `n_children` candidate offspring pairs from one parent pair.
    /// `n_children` is 1 unless a feasibility model (component E) is in use,
    /// in which case a pool of candidates is generated so the feasibility
    /// model can pick the most informative one.
    pub fn crossover(
        &self,
        parent1: &Array1<f64>,
        parent2: &Array1<f64>,
        lb: &Array1<f64>,
        ub: &Array1<f64>,
        n_children: usize,
        rng: &mut impl RandomGenerator,
    ) -> (Array2<f64>, Array2<f64>) {
        let n = parent1.len();
        assert_eq!(n, parent2.len(), "parents must be the same length");

        let mut children1 = Array2::<f64>::zeros((n_children, n));
        let mut children2 = Array2::<f64>::zeros((n_children, n));
        let mu = self.distribution_index;

        for c in 0..n_children {
            for j in 0..n {
                let u = rng.gen_probability();
                let beta = if u <= 0.5 {
                    (2.0 * u).powf(1.0 / (mu + 1.0))
                } else {
                    (1.0 / (2.0 * (1.0 - u))).powf(1.0 / (mu + 1.0))
                };
                let child1 = 0.5 * ((1.0 - beta) * parent1[j] + (1.0 + beta) * parent2[j]);
                let child2 = 0.5 * ((1.0 + beta) * parent1[j] + (1.0 - beta) * parent2[j]);
                children1[[c, j]] = child1.clamp(lb[j], ub[j]);
                children2[[c, j]] = child2.clamp(lb[j], ub[j]);
            }
        }
        (children1, children2)
    }
}
