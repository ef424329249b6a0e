//! MO-ASMO epoch driver (component G): fit a fresh surrogate on accumulated
//! history, search it with the inner NSGA-II kernel, then hand back the most
//! diverse candidates for real evaluation. Grounded in
//! `dmosopt.MOASMO.optimization`/`xinit`/`onestep`/`get_best`.

use log::info;
use ndarray::{Array1, Array2, ArrayView2, Axis};

use crate::error::SurrogateFitError;
use crate::feasibility::FeasibilityModel;
use crate::non_dominated_sort::{crowding_distance, fast_non_dominated_sort};
use crate::nsga2::{self, Nsga2Config, ObjectiveModel};
use crate::random::RandomGenerator;
use crate::sampling::glp::GoodLatticePointSampler;
use crate::sampling::latin_hypercube::LatinHypercubeSampler;
use crate::sampling::{InitialMethod, Sampler, rescale};
use crate::space::ParameterSpace;
use crate::surrogate::{Surrogate, SurrogateOptions};
use crate::termination::Termination;

/// Wraps a fitted [`Surrogate`] so it can stand in for the real objective
/// inside the inner NSGA-II kernel.
struct SurrogateModel<'a> {
    surrogate: &'a Surrogate,
}

impl ObjectiveModel for SurrogateModel<'_> {
    fn evaluate(&self, x: ndarray::ArrayView1<f64>) -> Array1<f64> {
        let row = x.insert_axis(Axis(0));
        self.surrogate.predict(row).row(0).to_owned()
    }
}

/// One completed MO-ASMO epoch: the surrogate's predicted Pareto front, and
/// the subset of it selected for real evaluation next.
#[derive(Debug, Clone)]
pub struct EpochResult {
    /// Rank-0 front of the surrogate-optimized population.
    pub best_x: Array2<f64>,
    pub best_y: Array2<f64>,
    /// The full accumulated surrogate-side search trace (every generation).
    pub all_x: Array2<f64>,
    pub all_y: Array2<f64>,
    /// The most diverse `N_resample` points from `best_x`/`best_y`, to be
    /// dispatched for real evaluation.
    pub x_resample: Array2<f64>,
    pub y_resample: Array2<f64>,
}

/// Runs one MO-ASMO epoch against accumulated history `(x, y)` for a single
/// problem: fit a surrogate, search it, then pick the `⌊pop ·
/// resample_fraction⌋` most diverse rank-0 points by crowding distance.
#[allow(clippy::too_many_arguments)]
pub fn epoch(
    space: &ParameterSpace,
    x: ArrayView2<f64>,
    y: ArrayView2<f64>,
    nsga2_config: &Nsga2Config,
    resample_fraction: f64,
    surrogate_options: &SurrogateOptions,
    feasibility: Option<&dyn FeasibilityModel>,
    termination: Option<&mut dyn Termination>,
    rng: &mut impl RandomGenerator,
) -> Result<EpochResult, SurrogateFitError> {
    let surrogate = Surrogate::fit(space, x, y, surrogate_options, rng)?;
    let model = SurrogateModel {
        surrogate: &surrogate,
    };

    let lb = space.lower_bounds();
    let ub = space.upper_bounds();
    let result = nsga2::optimize(
        &model,
        &lb,
        &ub,
        nsga2_config,
        feasibility,
        termination,
        rng,
    );

    let fronts = fast_non_dominated_sort(result.best_y.view());
    let rank0 = fronts.first().cloned().unwrap_or_default();
    let best_x = result.best_x.select(Axis(0), &rank0);
    let best_y = result.best_y.select(Axis(0), &rank0);

    let n_resample = ((nsga2_config.pop as f64) * resample_fraction).floor() as usize;
    let n_resample = n_resample.min(best_x.nrows());

    let distance = crowding_distance(best_y.view());
    let mut order: Vec<usize> = (0..best_y.nrows()).collect();
    order.sort_by(|&a, &b| distance[b].partial_cmp(&distance[a]).unwrap());
    let pick: Vec<usize> = order.into_iter().take(n_resample).collect();

    info!(
        "epoch: fit surrogate on {} points, rank-0 front has {} points, resampling {}",
        x.nrows(),
        best_x.nrows(),
        pick.len()
    );

    let x_resample = best_x.select(Axis(0), &pick);
    let y_resample = best_y.select(Axis(0), &pick);

    Ok(EpochResult {
        best_x,
        best_y,
        all_x: result.all_x,
        all_y: result.all_y,
        x_resample,
        y_resample,
    })
}

/// Builds the `Ninit = n_initial * d` GLP-seeded initial sample, already
/// rescaled to `space`'s bounds. Matches `dmosopt.MOASMO.xinit`: `n_previous`
/// subtracts points already drawn (e.g. from restored history), returning
/// `None` once the quota is already met.
pub fn initial_sample(
    space: &ParameterSpace,
    n_initial: usize,
    n_previous: usize,
    maxiter: usize,
    method: InitialMethod,
    rng: &mut impl RandomGenerator,
) -> Option<Array2<f64>> {
    let d = space.dim();
    let n_total = n_initial.saturating_mul(d);
    let n_remaining = n_total.saturating_sub(n_previous);
    if n_remaining == 0 {
        return None;
    }

    let unit = match method {
        InitialMethod::Glp => GoodLatticePointSampler::new(maxiter).sample(n_remaining, d, rng),
        InitialMethod::LatinHypercube => LatinHypercubeSampler.sample(n_remaining, d, rng),
    };
    let lb = space.lower_bounds();
    let ub = space.upper_bounds();
    Some(rescale(
        &unit,
        lb.as_slice().expect("lower bounds must be contiguous"),
        ub.as_slice().expect("upper bounds must be contiguous"),
    ))
}

/// Extracts the rank-0 (non-dominated) subset of an arbitrary accumulated
/// `(x, y)` pair, with an optional parallel `f` (feature) array selected by
/// the same row mask. Matches `dmosopt.MOASMO.get_best`, usable outside of a
/// [`crate::strategy::PerProblemStrategy`] for ad hoc analysis.
pub fn get_best(
    x: ArrayView2<f64>,
    y: ArrayView2<f64>,
    f: Option<ArrayView2<f64>>,
) -> (Array2<f64>, Array2<f64>, Option<Array2<f64>>) {
    let fronts = fast_non_dominated_sort(y);
    let rank0 = fronts.first().cloned().unwrap_or_default();
    let best_x = x.select(Axis(0), &rank0);
    let best_y = y.select(Axis(0), &rank0);
    let best_f = f.map(|f| f.select(Axis(0), &rank0));
    (best_x, best_y, best_f)
}
