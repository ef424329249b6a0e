//! Geometric-probability tournament selection: candidates are ranked by
//! `(rank, -crowding_distance)` and drawn into the mating pool without
//! replacement, weighted so the best-ranked candidate is most likely to be
//! picked first, `p * (1 - p)^i` for the i-th best with `p = 0.5`.

use crate::random::RandomGenerator;

#[derive(Debug, Clone)]
pub struct GeometricTournamentSelection {
    /// Bernoulli parameter of the geometric weighting; the original system
    /// fixes this at `0.5`.
    pub p: f64,
}

impl Default for GeometricTournamentSelection {
    fn default() -> Self {
        Self { p: 0.5 }
    }
}

impl GeometricTournamentSelection {
    pub fn new(p: f64) -> Self {
        Self { p }
    }

    /// Selects `pool_size` distinct indices out of `0..rank.len()`, weighted
    /// by rank (ascending) then crowding distance (descending).
    pub fn select(
        &self,
        rank: &[usize],
        crowding: &[f64],
        pool_size: usize,
        rng: &mut impl RandomGenerator,
    ) -> Vec<usize> {
        let n = rank.len();
        assert_eq!(n, crowding.len());
        assert!(pool_size <= n);

        let mut order: Vec<usize> = (0..n).collect();
        order.sort_by(|&a, &b| {
            rank[a]
                .cmp(&rank[b])
                .then(crowding[b].partial_cmp(&crowding[a]).unwrap())
        });

        let mut weights: Vec<f64> = (0..n)
            .map(|i| self.p * (1.0 - self.p).powi(i as i32))
            .collect();
        let mut remaining = order;
        let mut pool = Vec::with_capacity(pool_size);

        for _ in 0..pool_size {
            let total: f64 = weights.iter().sum();
            let mut target = rng.gen_range_f64(0.0, total);
            let mut chosen = remaining.len() - 1;
            for (i, &w) in weights.iter().enumerate() {
                if target < w {
                    chosen = i;
                    break;
                }
                target -= w;
            }
            pool.push(remaining.remove(chosen));
            weights.remove(chosen);
        }
        pool
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::random::StdRandomGenerator;
    use rand::SeedableRng;
    use rand::rngs::StdRng;

    #[test]
    fn test_select_returns_distinct_indices_within_range() {
        let rank = vec![0, 1, 0, 2, 1];
        let crowding = vec![1.0, 2.0, f64::INFINITY, 0.5, 3.0];
        let sel = GeometricTournamentSelection::default();
        let mut rng = StdRandomGenerator::new(StdRng::seed_from_u64(5));
        let pool = sel.select(&rank, &crowding, 3, &mut rng);
        assert_eq!(pool.len(), 3);
        let mut sorted = pool.clone();
        sorted.sort_unstable();
        sorted.dedup();
        assert_eq!(sorted.len(), 3);
        for &idx in &pool {
            assert!(idx < rank.len());
        }
    }

    #[test]
    fn test_full_pool_returns_all_indices() {
        let rank = vec![0, 0, 1];
        let crowding = vec![1.0, 2.0, 1.0];
        let sel = GeometricTournamentSelection::default();
        let mut rng = StdRandomGenerator::new(StdRng::seed_from_u64(9));
        let mut pool = sel.select(&rank, &crowding, 3, &mut rng);
        pool.sort_unstable();
        assert_eq!(pool, vec![0, 1, 2]);
    }
}
