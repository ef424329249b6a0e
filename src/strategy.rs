//! Per-problem strategy (component H): the FIFO request queue and
//! append-only evaluation history that sits between the distributed
//! scheduler (component I) and the MO-ASMO epoch driver (component G).
//! Grounded in `dmosopt.dmosopt.OptStrategy`/`anyclose`.

use std::collections::VecDeque;

use derive_builder::Builder;
use ndarray::{Array1, Array2, Axis, stack};

use crate::error::{ConfigError, ShapeError, StrategyError};
use crate::moasmo::{self, EpochResult};
use crate::nsga2::Nsga2Config;
use crate::random::StdRandomGenerator;
use crate::sampling::InitialMethod;
use crate::space::ParameterSpace;
use crate::surrogate::SurrogateOptions;
use crate::termination::{DefaultTermination, Termination, TerminationConfig};

/// A structured feature record: `(name, value)` pairs keyed by the
/// problem's declared `feature_dtypes` names.
pub type FeatureRecord = Vec<(String, f64)>;

/// One completed, persisted evaluation.
#[derive(Debug, Clone)]
pub struct EvaluationEntry {
    pub epoch: u64,
    pub x: Array1<f64>,
    pub y: Array1<f64>,
    pub f: Option<FeatureRecord>,
    pub c: Option<Array1<f64>>,
    pub y_pred: Option<Array1<f64>>,
}

/// A point awaiting real evaluation, with the surrogate's prediction (if
/// any) attached for comparison once it completes.
#[derive(Debug, Clone)]
pub struct EvaluationRequest {
    pub x: Array1<f64>,
    pub y_pred: Option<Array1<f64>>,
}

/// Per-problem knobs controlling both the initial sample and every
/// subsequent MO-ASMO epoch.
#[derive(Debug, Clone, Builder)]
#[builder(pattern = "owned")]
pub struct StrategyConfig {
    #[builder(default = "10")]
    pub n_initial: usize,
    #[builder(default = "5")]
    pub initial_maxiter: usize,
    #[builder(default = "InitialMethod::Glp")]
    pub initial_method: InitialMethod,
    #[builder(default = "100")]
    pub population_size: usize,
    #[builder(default = "100")]
    pub num_generations: usize,
    #[builder(default = "0.25")]
    pub resample_fraction: f64,
    #[builder(default = "0.9")]
    pub crossover_rate: f64,
    /// Defaults to `1 / dim` when left unset, matching
    /// `dmosopt.MOASMO.optimization`'s own default.
    #[builder(default = "None", setter(strip_option))]
    pub mutation_rate: Option<f64>,
    #[builder(default = "1.0")]
    pub di_crossover: f64,
    #[builder(default = "20.0")]
    pub di_mutation: f64,
    #[builder(default = "SurrogateOptions::default()")]
    pub surrogate_options: SurrogateOptions,
    #[builder(default = "TerminationConfig::default()")]
    pub termination_conditions: TerminationConfig,
}

impl StrategyConfig {
    fn validate(&self) -> Result<(), ConfigError> {
        if self.population_size == 0 {
            return Err(ConfigError::InvalidPopulationSize(self.population_size));
        }
        if !(self.resample_fraction > 0.0 && self.resample_fraction <= 1.0) {
            return Err(ConfigError::InvalidResampleFraction(self.resample_fraction));
        }
        Ok(())
    }

    fn nsga2_config(&self, dim: usize) -> Nsga2Config {
        Nsga2Config {
            pop: self.population_size,
            gen: self.num_generations,
            crossover_rate: self.crossover_rate,
            mutation_rate: self.mutation_rate.unwrap_or(1.0 / dim as f64),
            di_crossover: self.di_crossover,
            di_mutation: self.di_mutation,
        }
    }
}

/// `rtol = atol = 1e-4` row-wise closeness, matching
/// `dmosopt.dmosopt.anyclose`: `true` when `row` is within tolerance of any
/// row already in `existing`.
fn anyclose(row: &Array1<f64>, existing: &Array2<f64>) -> bool {
    const RTOL: f64 = 1e-4;
    const ATOL: f64 = 1e-4;
    existing.rows().into_iter().any(|candidate| {
        row.iter()
            .zip(candidate.iter())
            .all(|(&a, &b)| (a - b).abs() <= ATOL + RTOL * b.abs())
    })
}

/// Drives one problem's optimization: holds the append-only evaluation
/// history, the FIFO request queue, and the RNG used to seed initial
/// samples and each epoch's surrogate search.
pub struct PerProblemStrategy {
    space: ParameterSpace,
    n_objectives: usize,
    n_constraints: usize,
    config: StrategyConfig,
    history: Vec<EvaluationEntry>,
    pending: VecDeque<EvaluationRequest>,
    completed: Vec<EvaluationEntry>,
    next_epoch: u64,
    rng: StdRandomGenerator,
}

impl PerProblemStrategy {
    /// Creates a fresh strategy with an empty history, seeding the pending
    /// queue with `n_initial * dim` initial-sample requests.
    pub fn new(
        space: ParameterSpace,
        n_objectives: usize,
        n_constraints: usize,
        config: StrategyConfig,
        rng: StdRandomGenerator,
    ) -> Result<Self, StrategyError> {
        Self::new_from_history(space, n_objectives, n_constraints, config, Vec::new(), rng)
    }

    /// Creates a strategy seeded with persisted `history` (e.g. restored
    /// from storage). Initial-sample requests falling within `(rtol, atol)
    /// = (1e-4, 1e-4)` of an existing history entry are dropped
    /// (`anyclose`), matching a restart that resumes rather than
    /// re-samples.
    pub fn new_from_history(
        space: ParameterSpace,
        n_objectives: usize,
        n_constraints: usize,
        config: StrategyConfig,
        history: Vec<EvaluationEntry>,
        mut rng: StdRandomGenerator,
    ) -> Result<Self, StrategyError> {
        config.validate()?;

        let n_previous = history.len();
        let existing_x = if n_previous == 0 {
            Array2::<f64>::zeros((0, space.dim()))
        } else {
            let views: Vec<_> = history.iter().map(|e| e.x.view()).collect();
            stack(Axis(0), &views).map_err(|_| {
                StrategyError::Shape(ShapeError::ColumnMismatch {
                    expected: space.dim(),
                    actual: 0,
                })
            })?
        };

        let xinit = moasmo::initial_sample(
            &space,
            config.n_initial,
            n_previous,
            config.initial_maxiter,
            config.initial_method,
            &mut rng,
        );

        let mut pending = VecDeque::new();
        if let Some(xinit) = xinit {
            for row in xinit.rows() {
                let row = space.clamp_row(row);
                if n_previous == 0 || !anyclose(&row, &existing_x) {
                    pending.push_back(EvaluationRequest {
                        x: row,
                        y_pred: None,
                    });
                }
            }
        }

        Ok(Self {
            space,
            n_objectives,
            n_constraints,
            config,
            history,
            pending,
            completed: Vec::new(),
            next_epoch: 0,
            rng,
        })
    }

    /// Pops the next pending request, FIFO.
    pub fn get_next_request(&mut self) -> Option<EvaluationRequest> {
        self.pending.pop_front()
    }

    /// Records a completed evaluation against the current epoch. Verifies
    /// `x`/`y`/`c` shapes against the declared space/objectives/constraints;
    /// a mismatch is reported as an error and the entry is not recorded.
    pub fn complete_request(
        &mut self,
        x: Array1<f64>,
        y: Array1<f64>,
        f: Option<FeatureRecord>,
        c: Option<Array1<f64>>,
        y_pred: Option<Array1<f64>>,
    ) -> Result<(), StrategyError> {
        if x.len() != self.space.dim() {
            return Err(StrategyError::Shape(ShapeError::ColumnMismatch {
                expected: self.space.dim(),
                actual: x.len(),
            }));
        }
        if y.len() != self.n_objectives {
            return Err(StrategyError::Shape(ShapeError::ColumnMismatch {
                expected: self.n_objectives,
                actual: y.len(),
            }));
        }
        if let Some(c) = &c {
            if c.len() != self.n_constraints {
                return Err(StrategyError::Shape(ShapeError::ColumnMismatch {
                    expected: self.n_constraints,
                    actual: c.len(),
                }));
            }
        }

        self.completed.push(EvaluationEntry {
            epoch: self.next_epoch,
            x,
            y,
            f,
            c,
            y_pred,
        });
        Ok(())
    }

    /// Integrates every completed entry into history, then runs one
    /// MO-ASMO epoch (component G) and enqueues its resample set as the
    /// next batch of pending requests.
    pub fn step(&mut self) -> Result<Option<EpochResult>, StrategyError> {
        if !self.completed.is_empty() {
            self.history.append(&mut self.completed);
        }
        self.next_epoch += 1;

        if self.history.is_empty() {
            return Ok(None);
        }

        let x_views: Vec<_> = self.history.iter().map(|e| e.x.view()).collect();
        let y_views: Vec<_> = self.history.iter().map(|e| e.y.view()).collect();
        let x = stack(Axis(0), &x_views).expect("history rows share dim");
        let y = stack(Axis(0), &y_views).expect("history rows share n_objectives");

        let nsga2_config = self.config.nsga2_config(self.space.dim());
        let mut termination = DefaultTermination::new(self.config.termination_conditions.clone());

        let result = moasmo::epoch(
            &self.space,
            x.view(),
            y.view(),
            &nsga2_config,
            self.config.resample_fraction,
            &self.config.surrogate_options,
            None,
            Some(&mut termination as &mut dyn Termination),
            &mut self.rng,
        )?;

        for (row, pred) in result.x_resample.rows().into_iter().zip(result.y_resample.rows()) {
            self.pending.push_back(EvaluationRequest {
                x: self.space.clamp_row(row),
                y_pred: Some(pred.to_owned()),
            });
        }

        Ok(Some(result))
    }

    /// The rank-0 subset of history, optionally filtered to feasible
    /// entries (`c_i > 0` in every component).
    pub fn get_best_evals(&self, feasible_only: bool) -> (Array2<f64>, Array2<f64>) {
        if self.history.is_empty() {
            return (
                Array2::zeros((0, self.space.dim())),
                Array2::zeros((0, self.n_objectives)),
            );
        }

        let rows: Vec<&EvaluationEntry> = self
            .history
            .iter()
            .filter(|e| {
                if !feasible_only {
                    return true;
                }
                match &e.c {
                    Some(c) => c.iter().all(|&v| v > 0.0),
                    None => true,
                }
            })
            .collect();

        if rows.is_empty() {
            return (
                Array2::zeros((0, self.space.dim())),
                Array2::zeros((0, self.n_objectives)),
            );
        }

        let x_views: Vec<_> = rows.iter().map(|e| e.x.view()).collect();
        let y_views: Vec<_> = rows.iter().map(|e| e.y.view()).collect();
        let x = stack(Axis(0), &x_views).expect("filtered rows share dim");
        let y = stack(Axis(0), &y_views).expect("filtered rows share n_objectives");

        let (best_x, best_y, _) = moasmo::get_best(x.view(), y.view(), None);
        (best_x, best_y)
    }

    /// The full accumulated `(x, y)` history, optionally including
    /// features.
    pub fn get_evals(&self) -> (Array2<f64>, Array2<f64>) {
        if self.history.is_empty() {
            return (
                Array2::zeros((0, self.space.dim())),
                Array2::zeros((0, self.n_objectives)),
            );
        }
        let x_views: Vec<_> = self.history.iter().map(|e| e.x.view()).collect();
        let y_views: Vec<_> = self.history.iter().map(|e| e.y.view()).collect();
        (
            stack(Axis(0), &x_views).expect("history rows share dim"),
            stack(Axis(0), &y_views).expect("history rows share n_objectives"),
        )
    }

    pub fn history(&self) -> &[EvaluationEntry] {
        &self.history
    }

    /// Entries reported via `complete_request` since the last `step()`, not
    /// yet folded into `history`. The scheduler persists these and computes
    /// surrogate MAE from them before calling `step()`.
    pub fn completed(&self) -> &[EvaluationEntry] {
        &self.completed
    }

    /// `true` while at least one request is still queued, i.e. the epoch
    /// cannot close yet.
    pub fn has_pending(&self) -> bool {
        !self.pending.is_empty()
    }

    pub fn space(&self) -> &ParameterSpace {
        &self.space
    }
}
