//! Unified RNG abstraction used by sampling, crossover, mutation, selection,
//! SCE-UA and every other stochastic component in this crate.
//!
//! The [`RandomGenerator`] trait is a thin façade over `rand` so operator
//! code doesn't have to juggle the underlying engine directly, and so tests
//! can swap in [`NoopRandomGenerator`] when a code path never actually draws
//! a random number but the trait bound still needs satisfying.

use rand::prelude::IndexedRandom;
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::{Rng, RngCore, SeedableRng};
use rand_distr::{Distribution, StandardNormal};

/// A trait defining a unified interface for generating random values,
/// used across genetic operators and algorithms.
pub trait RandomGenerator {
    type R: RngCore + Rng;

    /// Generates a random `usize` in the range `[min, max)` using the underlying RNG.
    fn gen_range_usize(&mut self, min: usize, max: usize) -> usize {
        self.rng().random_range(min..max)
    }

    /// Generates a random `f64` in the range `[min, max)` using the underlying RNG.
    fn gen_range_f64(&mut self, min: f64, max: f64) -> f64 {
        self.rng().random_range(min..max)
    }

    /// Generates a random `usize` using the underlying RNG.
    fn gen_usize(&mut self) -> usize {
        self.rng().random_range(usize::MIN..usize::MAX)
    }

    /// Generates a random boolean value with probability `p` of being `true`.
    fn gen_bool(&mut self, p: f64) -> bool {
        self.rng().random_bool(p)
    }

    /// Generates a random probability as an `f64` in the range `[0.0, 1.0)`.
    fn gen_probability(&mut self) -> f64 {
        self.rng().random::<f64>()
    }

    /// Draws a standard-normal sample, used by the Gaussian-process surrogate's
    /// restart/jitter logic.
    fn gen_standard_normal(&mut self) -> f64 {
        StandardNormal.sample(self.rng())
    }

    fn shuffle_vec(&mut self, vector: &mut Vec<f64>) {
        vector.shuffle(self.rng())
    }

    fn shuffle_vec_usize(&mut self, vector: &mut Vec<usize>) {
        vector.shuffle(self.rng())
    }

    fn choose_usize<'a>(&mut self, vector: &'a [usize]) -> Option<&'a usize> {
        vector.choose(self.rng())
    }

    /// Returns a mutable reference to the underlying RNG implementing `RngCore`.
    fn rng(&mut self) -> &mut Self::R;
}

/// The production implementation of `RandomGenerator`, backed by `StdRng`.
#[derive(Debug, Clone)]
pub struct StdRandomGenerator {
    rng: StdRng,
}

impl StdRandomGenerator {
    pub fn new(rng: StdRng) -> Self {
        Self { rng }
    }

    pub fn new_from_seed(seed: Option<u64>) -> Self {
        let rng = seed.map_or_else(|| StdRng::from_rng(&mut rand::rng()), StdRng::seed_from_u64);
        Self { rng }
    }
}

impl RandomGenerator for StdRandomGenerator {
    type R = StdRng;
    fn rng(&mut self) -> &mut StdRng {
        &mut self.rng
    }
}

/// A dummy RNG that panics on every draw. Used to build a `RandomGenerator`
/// implementation for unit tests that need the trait bound but never
/// actually exercise randomness on the path under test.
pub struct TestDummyRng;

impl RngCore for TestDummyRng {
    fn next_u32(&mut self) -> u32 {
        unimplemented!("TestDummyRng does not generate random values")
    }

    fn next_u64(&mut self) -> u64 {
        unimplemented!("TestDummyRng does not generate random values")
    }

    fn fill_bytes(&mut self, _dest: &mut [u8]) {
        unimplemented!("TestDummyRng does not generate random values")
    }
}

pub struct NoopRandomGenerator {
    dummy: TestDummyRng,
}

impl Default for NoopRandomGenerator {
    fn default() -> Self {
        Self::new()
    }
}

impl NoopRandomGenerator {
    pub fn new() -> Self {
        Self {
            dummy: TestDummyRng,
        }
    }
}

impl RandomGenerator for NoopRandomGenerator {
    type R = TestDummyRng;
    fn rng(&mut self) -> &mut TestDummyRng {
        &mut self.dummy
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;
    use rand::rngs::StdRng;

    #[test]
    fn test_gen_range_usize() {
        let seed = [42u8; 32];
        let mut rng = StdRandomGenerator::new(StdRng::from_seed(seed));

        let min = 10;
        let max = 20;
        let value = rng.gen_range_usize(min, max);

        assert!(
            value >= min && value < max,
            "gen_range_usize produced {} which is not in [{}, {})",
            value,
            min,
            max
        );
    }

    #[test]
    fn test_gen_range_f64() {
        let seed = [42u8; 32];
        let mut rng = StdRandomGenerator::new(StdRng::from_seed(seed));

        let min = 3.0;
        let max = 10.0;
        let value = rng.gen_range_f64(min, max);

        assert!(
            value >= min && value < max,
            "gen_range_f64 produced {} which is not in [{}, {})",
            value,
            min,
            max
        );
    }

    #[test]
    fn test_gen_bool() {
        let seed = [42u8; 32];
        let mut rng = StdRandomGenerator::new(StdRng::from_seed(seed));

        assert!(rng.gen_bool(1.0), "gen_bool(1.0) did not return true");
        assert!(!rng.gen_bool(0.0), "gen_bool(0.0) did not return false");
    }

    #[test]
    fn test_gen_probability() {
        let seed = [42u8; 32];
        let mut rng = StdRandomGenerator::new(StdRng::from_seed(seed));

        let prob = rng.gen_probability();
        assert!(
            (0.0..1.0).contains(&prob),
            "gen_probability produced {} which is not in [0, 1)",
            prob
        );
    }
}
