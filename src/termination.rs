//! Termination predicate (component F): tracks a rolling window of
//! generation-to-generation spread in both decision and objective space,
//! declaring convergence once both fall under configured tolerances for
//! `nth_gen` consecutive checks, or when a generation budget is exhausted.

use derive_builder::Builder;
use ndarray::ArrayView2;

/// Average per-column range (`max - min`) across an `(n x d)` matrix. Used
/// as the diversity metric for both decision-variable and objective
/// spread, matching crowding distance's own range-based normalization.
fn mean_column_spread(m: ArrayView2<f64>) -> f64 {
    if m.nrows() == 0 {
        return 0.0;
    }
    let ncols = m.ncols();
    if ncols == 0 {
        return 0.0;
    }
    let mut total = 0.0;
    for col in m.columns() {
        let min = col.iter().cloned().fold(f64::INFINITY, f64::min);
        let max = col.iter().cloned().fold(f64::NEG_INFINITY, f64::max);
        total += max - min;
    }
    total / ncols as f64
}

pub trait Termination {
    /// Records one generation's population and decides whether the run
    /// should stop. `generation` is 1-indexed.
    fn should_stop(&mut self, generation: usize, x: ArrayView2<f64>, y: ArrayView2<f64>) -> bool;

    fn reset(&mut self);
}

#[derive(Debug, Clone, Builder)]
#[builder(pattern = "owned")]
pub struct TerminationConfig {
    #[builder(default = "1e-6")]
    pub x_tol: f64,
    #[builder(default = "1e-6")]
    pub f_tol: f64,
    /// Number of consecutive converged checks required before stopping.
    #[builder(default = "5")]
    pub nth_gen: usize,
    #[builder(default = "200")]
    pub n_max_gen: usize,
    /// Width of the rolling spread window.
    #[builder(default = "10")]
    pub n_last: usize,
}

impl Default for TerminationConfig {
    fn default() -> Self {
        Self {
            x_tol: 1e-6,
            f_tol: 1e-6,
            nth_gen: 5,
            n_max_gen: 200,
            n_last: 10,
        }
    }
}

/// Default [`Termination`] implementation: a sliding window of the last
/// `n_last` generations' `(x spread, f spread)`, with a streak counter of
/// how many consecutive checks fell under tolerance.
#[derive(Debug, Clone)]
pub struct DefaultTermination {
    config: TerminationConfig,
    window: Vec<(f64, f64)>,
    converged_streak: usize,
}

impl DefaultTermination {
    pub fn new(config: TerminationConfig) -> Self {
        Self {
            config,
            window: Vec::new(),
            converged_streak: 0,
        }
    }
}

impl Termination for DefaultTermination {
    fn should_stop(&mut self, generation: usize, x: ArrayView2<f64>, y: ArrayView2<f64>) -> bool {
        if generation >= self.config.n_max_gen {
            return true;
        }

        let x_spread = mean_column_spread(x);
        let f_spread = mean_column_spread(y);
        self.window.push((x_spread, f_spread));
        if self.window.len() > self.config.n_last {
            self.window.remove(0);
        }

        if self.window.len() < self.config.n_last {
            self.converged_streak = 0;
            return false;
        }

        let (avg_x, avg_f) = {
            let n = self.window.len() as f64;
            let sum_x: f64 = self.window.iter().map(|(x, _)| x).sum();
            let sum_f: f64 = self.window.iter().map(|(_, f)| f).sum();
            (sum_x / n, sum_f / n)
        };

        if avg_x < self.config.x_tol && avg_f < self.config.f_tol {
            self.converged_streak += 1;
        } else {
            self.converged_streak = 0;
        }

        self.converged_streak >= self.config.nth_gen
    }

    fn reset(&mut self) {
        self.window.clear();
        self.converged_streak = 0;
    }
}
