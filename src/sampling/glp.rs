//! Good lattice point (GLP) sampling: a deterministic rank-1 lattice of the
//! Korobov form. Candidate generator vectors `h = (1, g, g^2 mod n, ...)`
//! are tried for a bounded number of iterations and the one minimizing
//! centered L2 discrepancy is kept, so the result is reproducible given
//! `(n, d, seed)`.

use ndarray::Array2;

use crate::random::RandomGenerator;
use crate::sampling::Sampler;

#[derive(Debug, Clone)]
pub struct GoodLatticePointSampler {
    pub maxiter: usize,
}

impl Default for GoodLatticePointSampler {
    fn default() -> Self {
        Self { maxiter: 5 }
    }
}

impl GoodLatticePointSampler {
    pub fn new(maxiter: usize) -> Self {
        Self {
            maxiter: maxiter.max(1),
        }
    }

    /// Builds the lattice point set for generator base `g` modulo `n`.
    fn lattice_for_generator(n: usize, d: usize, g: u64) -> Array2<f64> {
        let n64 = n as u64;
        let mut h = vec![1u64; d];
        for j in 1..d {
            h[j] = (h[j - 1] * g) % n64;
        }
        let mut out = Array2::<f64>::zeros((n, d));
        for i in 0..n {
            for j in 0..d {
                let point = ((i as u64 + 1) * h[j]) % n64;
                out[[i, j]] = point as f64 / n as f64;
            }
        }
        out
    }

    /// Centered L2 discrepancy (Hickernell, 1998); lower is more uniform.
    fn centered_l2_discrepancy(points: &Array2<f64>) -> f64 {
        let n = points.nrows() as f64;
        let d = points.ncols();

        let term1 = (13.0_f64 / 12.0).powi(d as i32);

        let mut term2 = 0.0;
        for row in points.rows() {
            let mut prod = 1.0;
            for &x in row.iter() {
                let a = (x - 0.5).abs();
                prod *= 1.0 + 0.5 * a - 0.5 * a * a;
            }
            term2 += prod;
        }
        term2 *= 2.0 / n;

        let mut term3 = 0.0;
        for row_i in points.rows() {
            for row_k in points.rows() {
                let mut prod = 1.0;
                for (&xi, &xk) in row_i.iter().zip(row_k.iter()) {
                    let ai = (xi - 0.5).abs();
                    let ak = (xk - 0.5).abs();
                    prod *= 1.0 + 0.5 * ai + 0.5 * ak - 0.5 * (xi - xk).abs();
                }
                term3 += prod;
            }
        }
        term3 /= n * n;

        term1 - term2 + term3
    }
}

impl Sampler for GoodLatticePointSampler {
    fn sample(&self, n: usize, d: usize, rng: &mut impl RandomGenerator) -> Array2<f64> {
        if n == 0 || d == 0 {
            return Array2::zeros((n, d));
        }

        let mut best: Option<(f64, Array2<f64>)> = None;
        let mut tried = std::collections::HashSet::new();
        let mut attempts = 0usize;
        while attempts < self.maxiter && tried.len() < n.max(1) {
            let g = 1 + rng.gen_range_usize(0, n.max(1)) as u64;
            if !tried.insert(g) {
                continue;
            }
            attempts += 1;
            let candidate = Self::lattice_for_generator(n, d, g);
            let discrepancy = Self::centered_l2_discrepancy(&candidate);
            if best.as_ref().is_none_or(|(best_d, _)| discrepancy < *best_d) {
                best = Some((discrepancy, candidate));
            }
        }
        best.map(|(_, points)| points)
            .unwrap_or_else(|| Self::lattice_for_generator(n, d, 1))
    }
}
