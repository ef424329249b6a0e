//! Core data structures that flow through sampling, the inner NSGA-II kernel,
//! and the surrogate-evaluation loop: [`Individual`] and [`Population`].
//!
//! Every problem handled by this crate is multi-objective with an optional
//! constraint vector, so unlike a general-purpose genetic-algorithm library
//! there is no single-objective/0-D fitness case to support: fitness and
//! constraints are always `Array2<f64>` (rows are individuals, columns are
//! objectives/constraints).

use ndarray::{Array1, Array2, ArrayView1, ArrayView2, Axis, concatenate};

/// A single individual's genes, fitness vector, and constraint vector,
/// borrowed from the owning [`Population`].
#[derive(Debug, Clone)]
pub struct Individual<'a> {
    pub genes: ArrayView1<'a, f64>,
    pub fitness: ArrayView1<'a, f64>,
    pub constraints: ArrayView1<'a, f64>,
    pub rank: Option<usize>,
    pub survival_score: Option<f64>,
    pub constraint_violation_total: Option<f64>,
}

impl<'a> Individual<'a> {
    pub fn new(
        genes: ArrayView1<'a, f64>,
        fitness: ArrayView1<'a, f64>,
        constraints: ArrayView1<'a, f64>,
    ) -> Self {
        // A constraint vector is feasible when every component is > 0 (the
        // convention used throughout this crate); violation magnitude is the
        // sum of how far below zero the infeasible components fall.
        let constraint_violation_total = if constraints.is_empty() {
            None
        } else {
            Some(constraints.iter().copied().map(|v| (-v).max(0.0)).sum())
        };
        Self {
            genes,
            fitness,
            constraints,
            rank: None,
            survival_score: None,
            constraint_violation_total,
        }
    }

    pub fn new_unconstrained(genes: ArrayView1<'a, f64>, fitness: ArrayView1<'a, f64>) -> Self {
        Self {
            genes,
            fitness,
            constraints: ArrayView1::from(&[]),
            rank: None,
            survival_score: None,
            constraint_violation_total: None,
        }
    }

    /// An individual is feasible when it carries no constraints, or when the
    /// sum of its positive constraint violations is zero.
    pub fn is_feasible(&self) -> bool {
        match self.constraint_violation_total {
            Some(val) => val == 0.0,
            None => true,
        }
    }
}

/// A collection of individuals sharing the same gene/fitness/constraint
/// shapes: genes `(n, n_params)`, fitness `(n, n_objectives)`, constraints
/// `(n, n_constraints)` (possibly zero columns).
#[derive(Debug, Clone)]
pub struct Population {
    pub genes: Array2<f64>,
    pub fitness: Array2<f64>,
    pub constraints: Array2<f64>,
    pub rank: Option<Array1<usize>>,
    pub survival_score: Option<Array1<f64>>,
    pub constraint_violation_totals: Option<Array1<f64>>,
}

impl Population {
    const CONSTRAINT_VIOLATION_TOLERANCE: f64 = 1e-6;

    pub fn new(genes: Array2<f64>, fitness: Array2<f64>, constraints: Array2<f64>) -> Self {
        let constraint_violation_totals = if constraints.ncols() == 0 {
            None
        } else {
            let mut totals = constraints.mapv(|x| (-x).max(0.0)).sum_axis(Axis(1));
            totals.mapv_inplace(|v| (v - Self::CONSTRAINT_VIOLATION_TOLERANCE).max(0.0));
            Some(totals)
        };
        Self {
            genes,
            fitness,
            constraints,
            rank: None,
            survival_score: None,
            constraint_violation_totals,
        }
    }

    pub fn new_unconstrained(genes: Array2<f64>, fitness: Array2<f64>) -> Self {
        let n = genes.nrows();
        Self {
            genes,
            fitness,
            constraints: Array2::zeros((n, 0)),
            rank: None,
            survival_score: None,
            constraint_violation_totals: None,
        }
    }

    pub fn get(&self, idx: usize) -> Individual<'_> {
        let genes = self.genes.row(idx);
        let fitness = self.fitness.row(idx);
        let constraints = self.constraints.row(idx);
        let rank = self.rank.as_ref().map(|r| r[idx]);
        let survival_score = self.survival_score.as_ref().map(|s| s[idx]);
        let constraint_violation_total =
            self.constraint_violation_totals.as_ref().map(|cv| cv[idx]);
        Individual {
            genes,
            fitness,
            constraints,
            rank,
            survival_score,
            constraint_violation_total,
        }
    }

    /// Returns a new `Population` containing only the individuals at the
    /// specified indices, in the given order.
    pub fn selected(&self, indices: &[usize]) -> Self {
        let genes = self.genes.select(Axis(0), indices);
        let fitness = self.fitness.select(Axis(0), indices);
        let constraints = self.constraints.select(Axis(0), indices);
        let rank = self.rank.as_ref().map(|r| r.select(Axis(0), indices));
        let constraint_violation_totals = self
            .constraint_violation_totals
            .as_ref()
            .map(|r| r.select(Axis(0), indices));
        let survival_score = self
            .survival_score
            .as_ref()
            .map(|ss| ss.select(Axis(0), indices));
        Population {
            genes,
            fitness,
            constraints,
            rank,
            survival_score,
            constraint_violation_totals,
        }
    }

    pub fn len(&self) -> usize {
        self.genes.nrows()
    }

    pub fn is_empty(&self) -> bool {
        self.genes.nrows() == 0
    }

    /// Returns the rank-0 (non-dominated) subset. If ranks have not been
    /// computed yet, returns the whole population.
    pub fn best(&self) -> Self {
        if let Some(ranks) = &self.rank {
            let indices: Vec<usize> = ranks
                .iter()
                .enumerate()
                .filter_map(|(i, &r)| if r == 0 { Some(i) } else { None })
                .collect();
            self.selected(&indices)
        } else {
            self.clone()
        }
    }

    pub fn set_survival_score(&mut self, score: Array1<f64>) {
        self.survival_score = Some(score);
    }

    pub fn set_rank(&mut self, rank: Array1<usize>) {
        self.rank = Some(rank);
    }

    pub fn genes_view(&self) -> ArrayView2<'_, f64> {
        self.genes.view()
    }

    pub fn fitness_view(&self) -> ArrayView2<'_, f64> {
        self.fitness.view()
    }

    /// Concatenates two populations row-wise. Both must agree on whether
    /// rank/survival_score/constraint_violation_totals are present.
    pub fn merge(population1: &Population, population2: &Population) -> Population {
        let merged_genes = concatenate(
            Axis(0),
            &[population1.genes.view(), population2.genes.view()],
        )
        .expect("failed to merge genes");

        let merged_fitness = concatenate(
            Axis(0),
            &[population1.fitness.view(), population2.fitness.view()],
        )
        .expect("failed to merge fitness");

        let merged_constraints = concatenate(
            Axis(0),
            &[
                population1.constraints.view(),
                population2.constraints.view(),
            ],
        )
        .expect("failed to merge constraints");

        let merged_rank = match (&population1.rank, &population2.rank) {
            (Some(r1), Some(r2)) => {
                Some(concatenate(Axis(0), &[r1.view(), r2.view()]).expect("failed to merge rank"))
            }
            (None, None) => None,
            _ => panic!("mismatched population rank: one is set and the other is None"),
        };

        let merged_total_cv = match (
            &population1.constraint_violation_totals,
            &population2.constraint_violation_totals,
        ) {
            (Some(r1), Some(r2)) => Some(
                concatenate(Axis(0), &[r1.view(), r2.view()])
                    .expect("failed to merge constraint violation totals"),
            ),
            (None, None) => None,
            _ => panic!(
                "mismatched population constraint violation totals: one is set and the other is None"
            ),
        };

        let merged_survival_score = match (&population1.survival_score, &population2.survival_score)
        {
            (Some(s1), Some(s2)) => Some(
                concatenate(Axis(0), &[s1.view(), s2.view()])
                    .expect("failed to merge survival scores"),
            ),
            (None, None) => None,
            _ => panic!("mismatched population survival scores: one is set and the other is None"),
        };

        Population {
            genes: merged_genes,
            fitness: merged_fitness,
            constraints: merged_constraints,
            rank: merged_rank,
            survival_score: merged_survival_score,
            constraint_violation_totals: merged_total_cv,
        }
    }
}

/// A vector of per-rank fronts, as produced by non-dominated sorting.
pub type Fronts = Vec<Population>;

/// Flattens a vector of fronts into a single population, preserving order.
pub(crate) trait FrontsExt {
    fn to_population(self) -> Population;
}

impl FrontsExt for Vec<Population> {
    fn to_population(self) -> Population {
        self.into_iter()
            .reduce(|pop1, pop2| Population::merge(&pop1, &pop2))
            .expect("cannot flatten an empty vector of fronts")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    #[test]
    fn test_individual_is_feasible() {
        let genes_ind1 = array![1.0, 2.0];
        let fitness_ind1 = array![0.5, 1.0];
        let ind1 = Individual::new_unconstrained(genes_ind1.view(), fitness_ind1.view());
        assert!(ind1.is_feasible());

        let genes_ind2 = array![1.0, 2.0];
        let fitness_ind2 = array![0.5, 1.0];
        let constraints_ind2 = array![1.0, 0.1];
        let ind2 = Individual::new(
            genes_ind2.view(),
            fitness_ind2.view(),
            constraints_ind2.view(),
        );
        assert!(
            ind2.is_feasible(),
            "all-positive constraint components are feasible"
        );

        let genes_ind3 = array![1.0, 2.0];
        let fitness_ind3 = array![0.5, 1.0];
        let constraints_ind3 = array![-1.0, 0.0];
        let ind3 = Individual::new(
            genes_ind3.view(),
            fitness_ind3.view(),
            constraints_ind3.view(),
        );
        assert!(
            !ind3.is_feasible(),
            "a non-positive constraint component is infeasible"
        );
    }

    #[test]
    fn test_population_new_get_selected_len() {
        let genes = array![[1.0, 2.0], [3.0, 4.0]];
        let fitness = array![[0.5, 1.0], [1.5, 2.0]];
        let rank = array![0, 1];
        let mut pop = Population::new_unconstrained(genes.clone(), fitness.clone());
        pop.set_rank(rank);

        assert_eq!(pop.len(), 2);

        let ind0 = pop.get(0);
        assert_eq!(ind0.genes, genes.row(0).to_owned());
        assert_eq!(ind0.fitness, fitness.row(0).to_owned());
        assert_eq!(ind0.rank, Some(0));

        let selected = pop.selected(&[1]);
        assert_eq!(selected.len(), 1);
        let ind_selected = selected.get(0);
        assert_eq!(ind_selected.genes, array![3.0, 4.0]);
        assert_eq!(ind_selected.fitness, array![1.5, 2.0]);
        assert_eq!(ind_selected.rank, Some(1));
    }

    #[test]
    fn test_population_best_with_rank() {
        let genes = array![[1.0, 2.0], [3.0, 4.0], [5.0, 6.0]];
        let fitness = array![[0.5, 1.0], [1.5, 2.0], [2.5, 3.0]];
        let rank = array![0, 1, 0];
        let mut pop = Population::new_unconstrained(genes, fitness);
        pop.set_rank(rank);
        let best = pop.best();
        assert_eq!(best.len(), 2);
        for i in 0..best.len() {
            assert_eq!(best.get(i).rank, Some(0));
        }
    }

    #[test]
    fn test_population_best_without_rank() {
        let genes = array![[1.0, 2.0], [3.0, 4.0]];
        let fitness = array![[0.5, 1.0], [1.5, 2.0]];
        let pop = Population::new_unconstrained(genes.clone(), fitness.clone());
        let best = pop.best();
        assert_eq!(best.len(), pop.len());
    }

    #[test]
    fn test_population_merge() {
        let genes1 = array![[1.0, 2.0], [3.0, 4.0]];
        let fitness1 = array![[0.5, 1.0], [1.5, 2.0]];
        let rank1 = array![0, 0];
        let mut pop1 = Population::new_unconstrained(genes1, fitness1);
        pop1.set_rank(rank1);

        let genes2 = array![[5.0, 6.0], [7.0, 8.0]];
        let fitness2 = array![[2.5, 3.0], [3.5, 4.0]];
        let rank2 = array![1, 1];
        let mut pop2 = Population::new_unconstrained(genes2, fitness2);
        pop2.set_rank(rank2);

        let merged = Population::merge(&pop1, &pop2);
        assert_eq!(merged.len(), 4);
        let expected_genes = array![[1.0, 2.0], [3.0, 4.0], [5.0, 6.0], [7.0, 8.0]];
        assert_eq!(merged.genes, expected_genes);
        let expected_rank = Some(array![0, 0, 1, 1]);
        assert_eq!(merged.rank, expected_rank);
    }

    #[test]
    fn test_fronts_ext_to_population() {
        let genes1 = array![[1.0, 2.0], [3.0, 4.0]];
        let fitness1 = array![[0.5, 1.0], [1.5, 2.0]];
        let pop1 = Population::new_unconstrained(genes1, fitness1);

        let genes2 = array![[5.0, 6.0], [7.0, 8.0]];
        let fitness2 = array![[2.5, 3.0], [3.5, 4.0]];
        let pop2 = Population::new_unconstrained(genes2, fitness2);

        let fronts = vec![pop1.clone(), pop2.clone()];
        let merged = fronts.to_population();
        assert_eq!(merged.len(), 4);
    }

    #[test]
    #[should_panic(expected = "mismatched population survival scores")]
    fn test_population_merge_mismatched_survival_score() {
        let genes1 = array![[1.0, 2.0]];
        let fitness1 = array![[0.5, 1.0]];
        let mut pop1 = Population::new_unconstrained(genes1, fitness1);
        pop1.set_survival_score(array![0.1]);

        let genes2 = array![[3.0, 4.0]];
        let fitness2 = array![[1.5, 2.0]];
        let pop2 = Population::new_unconstrained(genes2, fitness2);

        Population::merge(&pop1, &pop2);
    }
}
