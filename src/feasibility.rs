//! Feasibility model (component E): an optional predictor that, given a
//! batch of candidate genes, returns a per-constraint signed margin and
//! distance score. Used to pick the most promising child out of a pool of
//! candidates produced by crossover/mutation when the pool size is greater
//! than one. Modeled on `dmosopt.NSGA2.feasibility_selection` /
//! `crossover_feasibility_selection`.

use ndarray::{Array1, Array2, Axis};

use crate::random::RandomGenerator;

/// Predicts feasibility margins for candidate points.
///
/// A point is feasible when every component of its margin row is `> 0`,
/// matching the constraint-satisfaction convention used throughout this
/// crate. The accompanying distance row scores how far into the feasible
/// region each candidate lies; larger is more robustly feasible.
pub trait FeasibilityModel {
    fn predict(&self, x: &Array2<f64>) -> (Array2<f64>, Array2<f64>);
}

fn row_all_positive(row: ndarray::ArrayView1<f64>) -> bool {
    row.iter().all(|&v| v > 0.0)
}

/// Picks the single most informative child out of `children`: the
/// feasible candidate with the largest summed distance, or a uniform
/// random candidate when none are predicted feasible.
pub fn select_feasible_child(
    model: &dyn FeasibilityModel,
    children: &Array2<f64>,
    rng: &mut impl RandomGenerator,
) -> Array1<f64> {
    let (margin, distance) = model.predict(children);
    let feasible_rows: Vec<usize> = (0..margin.nrows())
        .filter(|&i| row_all_positive(margin.row(i)))
        .collect();

    if feasible_rows.is_empty() {
        let idx = rng.gen_range_usize(0, children.nrows());
        return children.row(idx).to_owned();
    }

    let best = feasible_rows
        .iter()
        .copied()
        .max_by(|&a, &b| {
            let sa: f64 = distance.row(a).sum();
            let sb: f64 = distance.row(b).sum();
            sa.partial_cmp(&sb).unwrap()
        })
        .unwrap();
    children.row(best).to_owned()
}

/// Applies [`select_feasible_child`] independently to each pool in
/// `children_pools`, returning one selected child per pool — used for the
/// two candidate pools a crossover step produces.
pub fn select_feasible_children(
    model: &dyn FeasibilityModel,
    children_pools: &[Array2<f64>],
    rng: &mut impl RandomGenerator,
) -> Vec<Array1<f64>> {
    children_pools
        .iter()
        .map(|pool| select_feasible_child(model, pool, rng))
        .collect()
}

/// Sums a distance matrix's rows, used by tests and callers that want the
/// raw per-candidate score outside of selection.
pub fn summed_distance(distance: &Array2<f64>) -> Array1<f64> {
    distance.sum_axis(Axis(1))
}
