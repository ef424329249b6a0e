//! NSGA-II kernel (component D): the inner evolutionary optimizer run
//! against either the real objective function or, inside the epoch driver
//! (component G), the Gaussian-process surrogate. Grounded in
//! `dmosopt.NSGA2.optimization` and its helpers.

use derive_builder::Builder;
use ndarray::{Array1, Array2, ArrayView1, Axis, stack};
use rayon::prelude::*;

use crate::feasibility::{FeasibilityModel, select_feasible_child, select_feasible_children};
use crate::genetic::Population;
use crate::non_dominated_sort::{build_fronts, crowding_distance, fast_non_dominated_sort};
use crate::operators::crossover::SBXCrossover;
use crate::operators::mutation::PolynomialMutation;
use crate::operators::selection::GeometricTournamentSelection;
use crate::random::RandomGenerator;
use crate::sampling::{Sampler, rescale};
use crate::sampling::latin_hypercube::LatinHypercubeSampler;
use crate::termination::Termination;

/// The function this kernel searches over: either the real (expensive)
/// objective or a fitted surrogate standing in for it. `Sync` so
/// [`evaluate_rows`] can evaluate a batch of individuals in parallel.
pub trait ObjectiveModel: Sync {
    fn evaluate(&self, x: ArrayView1<f64>) -> Array1<f64>;
}

#[derive(Debug, Clone, Builder)]
#[builder(pattern = "owned")]
pub struct Nsga2Config {
    #[builder(default = "100")]
    pub pop: usize,
    #[builder(default = "100")]
    pub gen: usize,
    #[builder(default = "0.9")]
    pub crossover_rate: f64,
    #[builder(default = "0.2")]
    pub mutation_rate: f64,
    #[builder(default = "1.0")]
    pub di_crossover: f64,
    #[builder(default = "20.0")]
    pub di_mutation: f64,
}

impl Nsga2Config {
    fn poolsize(&self) -> usize {
        (self.pop as f64 / 2.0).round() as usize
    }
}

#[derive(Debug, Clone)]
pub struct Nsga2Result {
    pub best_x: Array2<f64>,
    pub best_y: Array2<f64>,
    pub all_x: Array2<f64>,
    pub all_y: Array2<f64>,
}

/// Computes per-row rank and crowding distance without reordering `fitness`,
/// so the result lines up with the caller's own row indices.
fn rank_and_crowding(fitness: ndarray::ArrayView2<f64>) -> (Vec<usize>, Vec<f64>) {
    let n = fitness.nrows();
    let index_fronts = fast_non_dominated_sort(fitness);
    let mut rank = vec![0usize; n];
    let mut crowd = vec![0.0f64; n];
    for (r, front) in index_fronts.iter().enumerate() {
        let front_fitness = fitness.select(Axis(0), front);
        let d = crowding_distance(front_fitness.view());
        for (k, &idx) in front.iter().enumerate() {
            rank[idx] = r;
            crowd[idx] = d[k];
        }
    }
    (rank, crowd)
}

/// Reorders `population` by rank ascending, then by descending crowding
/// distance within each rank, matching `dmosopt.NSGA2.sortMO`. Sets `rank`
/// and repurposes `survival_score` to hold each row's crowding distance.
fn sort_mo(population: &Population) -> Population {
    let fronts = build_fronts(population);
    let sorted_fronts: Vec<Population> = fronts
        .into_iter()
        .map(|front| {
            let d = crowding_distance(front.fitness_view());
            let mut order: Vec<usize> = (0..front.len()).collect();
            order.sort_by(|&a, &b| d[b].partial_cmp(&d[a]).unwrap());
            let mut reordered = front.selected(&order);
            let sorted_d: Array1<f64> = Array1::from_iter(order.iter().map(|&i| d[i]));
            reordered.set_survival_score(sorted_d);
            reordered
        })
        .collect();

    sorted_fronts
        .into_iter()
        .reduce(|a, b| Population::merge(&a, &b))
        .expect("population must be non-empty")
}

fn initial_population(
    lb: &Array1<f64>,
    ub: &Array1<f64>,
    pop: usize,
    rng: &mut impl RandomGenerator,
) -> Array2<f64> {
    let d = lb.len();
    let unit = LatinHypercubeSampler.sample(pop, d, rng);
    rescale(
        &unit,
        lb.as_slice().expect("lb must be contiguous"),
        ub.as_slice().expect("ub must be contiguous"),
    )
}

/// Evaluates every row of `x` against `model`, one call per individual.
/// Individuals are independent, so this runs across the rayon pool — the
/// same parallel-per-individual evaluation the epoch driver relies on when
/// this kernel runs against the fitted surrogate instead of the real
/// objective.
fn evaluate_rows(model: &impl ObjectiveModel, x: &Array2<f64>) -> Array2<f64> {
    let rows: Vec<Array1<f64>> = x
        .axis_iter(Axis(0))
        .collect::<Vec<_>>()
        .into_par_iter()
        .map(|r| model.evaluate(r))
        .collect();
    let views: Vec<_> = rows.iter().map(|r| r.view()).collect();
    stack(Axis(0), &views).expect("evaluate_rows: ragged objective output")
}

/// Runs the NSGA-II inner optimizer against `model` for `config.gen`
/// generations starting from a fresh Latin-hypercube sample.
pub fn optimize(
    model: &impl ObjectiveModel,
    lb: &Array1<f64>,
    ub: &Array1<f64>,
    config: &Nsga2Config,
    feasibility: Option<&dyn FeasibilityModel>,
    mut termination: Option<&mut dyn Termination>,
    rng: &mut impl RandomGenerator,
) -> Nsga2Result {
    let poolsize = config.poolsize().max(2);
    let selector = GeometricTournamentSelection::default();
    let crossover = SBXCrossover::new(config.di_crossover);
    let mutation = PolynomialMutation::new(config.mutation_rate, config.di_mutation);

    let init_x = initial_population(lb, ub, config.pop, rng);
    let init_y = evaluate_rows(model, &init_x);

    let mut population = sort_mo(&Population::new_unconstrained(init_x.clone(), init_y.clone()));

    let mut all_x_rows: Vec<Array2<f64>> = vec![init_x];
    let mut all_y_rows: Vec<Array2<f64>> = vec![init_y];

    for generation in 1..=config.gen {
        let (rank, crowd) = rank_and_crowding(population.fitness_view());
        let pool = selector.select(&rank, &crowd, poolsize, rng);

        let mut children_genes: Vec<Array1<f64>> = Vec::with_capacity(config.pop);
        let mut children_fitness: Vec<Array1<f64>> = Vec::with_capacity(config.pop);

        while children_genes.len() < config.pop.saturating_sub(1) {
            if rng.gen_probability() < config.crossover_rate {
                let mut idx = [0usize; 2];
                loop {
                    idx[0] = rng.gen_range_usize(0, pool.len());
                    idx[1] = rng.gen_range_usize(0, pool.len());
                    if idx[0] != idx[1] {
                        break;
                    }
                }
                let parent1 = population.genes.row(pool[idx[0]]).to_owned();
                let parent2 = population.genes.row(pool[idx[1]]).to_owned();
                let n_children = if feasibility.is_some() { poolsize } else { 1 };
                let (pool1, pool2) =
                    crossover.crossover(&parent1, &parent2, lb, ub, n_children, rng);

                let (child1, child2) = match feasibility {
                    Some(fsb) => {
                        let selected = select_feasible_children(fsb, &[pool1, pool2], rng);
                        (selected[0].clone(), selected[1].clone())
                    }
                    None => (pool1.row(0).to_owned(), pool2.row(0).to_owned()),
                };

                let y1 = model.evaluate(child1.view());
                let y2 = model.evaluate(child2.view());
                children_genes.push(child1);
                children_fitness.push(y1);
                children_genes.push(child2);
                children_fitness.push(y2);
            } else {
                let idx = rng.gen_range_usize(0, pool.len());
                let parent = population.genes.row(pool[idx]).to_owned();
                let n_children = if feasibility.is_some() { poolsize } else { 1 };
                let candidates = mutation.mutate(&parent, lb, ub, n_children, rng);

                let child = match feasibility {
                    Some(fsb) => select_feasible_child(fsb, &candidates, rng),
                    None => candidates.row(0).to_owned(),
                };

                let y = model.evaluate(child.view());
                children_genes.push(child);
                children_fitness.push(y);
            }
        }

        let children_x = stack(
            Axis(0),
            &children_genes.iter().map(|r| r.view()).collect::<Vec<_>>(),
        )
        .expect("children_x: ragged gene vectors");
        let children_y = stack(
            Axis(0),
            &children_fitness.iter().map(|r| r.view()).collect::<Vec<_>>(),
        )
        .expect("children_y: ragged objective vectors");

        all_x_rows.push(children_x.clone());
        all_y_rows.push(children_y.clone());

        let children_population = Population::new_unconstrained(children_x, children_y);
        let bare_population =
            Population::new_unconstrained(population.genes.clone(), population.fitness.clone());
        let merged = Population::merge(&bare_population, &children_population);
        let sorted = sort_mo(&merged);
        let keep: Vec<usize> = (0..config.pop.min(sorted.len())).collect();
        population = sorted.selected(&keep);

        if let Some(term) = termination.as_mut() {
            if term.should_stop(generation, population.genes_view(), population.fitness_view()) {
                break;
            }
        }
    }

    let all_x_views: Vec<_> = all_x_rows.iter().map(|r| r.view()).collect();
    let all_y_views: Vec<_> = all_y_rows.iter().map(|r| r.view()).collect();
    let all_x = ndarray::concatenate(Axis(0), &all_x_views).expect("concatenate all_x");
    let all_y = ndarray::concatenate(Axis(0), &all_y_views).expect("concatenate all_y");

    Nsga2Result {
        best_x: population.genes,
        best_y: population.fitness,
        all_x,
        all_y,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::random::StdRandomGenerator;
    use ndarray::array;
    use rand::SeedableRng;
    use rand::rngs::StdRng;

    struct Zdt1;

    impl ObjectiveModel for Zdt1 {
        fn evaluate(&self, x: ArrayView1<f64>) -> Array1<f64> {
            let f1 = x[0];
            let n = x.len() as f64;
            let g = 1.0 + 9.0 * x.iter().skip(1).sum::<f64>() / (n - 1.0);
            let f2 = g * (1.0 - (f1 / g).sqrt());
            array![f1, f2]
        }
    }

    #[test]
    fn test_optimize_improves_over_initial_population() {
        let lb = Array1::from(vec![0.0; 5]);
        let ub = Array1::from(vec![1.0; 5]);
        let config = Nsga2Config {
            pop: 20,
            gen: 10,
            crossover_rate: 0.9,
            mutation_rate: 0.2,
            di_crossover: 1.0,
            di_mutation: 20.0,
        };
        let mut rng = StdRandomGenerator::new(StdRng::seed_from_u64(11));
        let result = Zdt1.evaluate(Array1::from(vec![0.5; 5]).view());
        assert_eq!(result.len(), 2);

        let model = Zdt1;
        let out = optimize(&model, &lb, &ub, &config, None, None, &mut rng);
        assert_eq!(out.best_x.ncols(), 5);
        assert_eq!(out.best_y.ncols(), 2);
        assert_eq!(out.best_x.nrows(), 20);

        let final_min_f2 = out
            .best_y
            .column(1)
            .iter()
            .cloned()
            .fold(f64::INFINITY, f64::min);
        assert!(final_min_f2.is_finite());
    }

    #[test]
    fn test_sort_mo_orders_by_rank_then_crowding() {
        let genes = array![[0.0], [1.0], [2.0], [3.0]];
        let fitness = array![[0.0, 1.0], [1.0, 0.0], [0.5, 0.5], [10.0, 10.0]];
        let population = Population::new_unconstrained(genes, fitness);
        let sorted = sort_mo(&population);
        let ranks = sorted.rank.unwrap();
        for w in ranks.windows(2) {
            assert!(w[0] <= w[1]);
        }
    }
}
