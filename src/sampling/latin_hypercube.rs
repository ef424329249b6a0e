//! Latin hypercube sampling: each column is an independent random
//! permutation of the stratified midpoints `(i + U) / n`.

use ndarray::Array2;

use crate::random::RandomGenerator;
use crate::sampling::Sampler;

#[derive(Debug, Clone, Default)]
pub struct LatinHypercubeSampler;

impl LatinHypercubeSampler {
    pub fn new() -> Self {
        Self
    }
}

impl Sampler for LatinHypercubeSampler {
    fn sample(&self, n: usize, d: usize, rng: &mut impl RandomGenerator) -> Array2<f64> {
        let mut out = Array2::<f64>::zeros((n, d));
        let mut perm: Vec<usize> = (0..n).collect();
        for col in 0..d {
            rng.shuffle_vec_usize(&mut perm);
            for (row, &i) in perm.iter().enumerate() {
                let u = rng.gen_range_f64(0.0, 1.0);
                out[[row, col]] = (i as f64 + u) / n as f64;
            }
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::random::StdRandomGenerator;
    use rand::SeedableRng;
    use rand::rngs::StdRng;

    #[test]
    fn test_samples_lie_in_unit_cube() {
        let mut rng = StdRandomGenerator::new(StdRng::seed_from_u64(7));
        let sample = LatinHypercubeSampler::new().sample(20, 3, &mut rng);
        assert_eq!(sample.shape(), &[20, 3]);
        for &v in sample.iter() {
            assert!((0.0..=1.0).contains(&v));
        }
    }

    #[test]
    fn test_each_column_is_a_stratified_permutation() {
        let mut rng = StdRandomGenerator::new(StdRng::seed_from_u64(11));
        let n = 10;
        let sample = LatinHypercubeSampler::new().sample(n, 2, &mut rng);
        for col in 0..2 {
            let mut strata: Vec<usize> = sample
                .column(col)
                .iter()
                .map(|&v| (v * n as f64).floor() as usize)
                .collect();
            strata.sort_unstable();
            assert_eq!(strata, (0..n).collect::<Vec<_>>());
        }
    }
}
