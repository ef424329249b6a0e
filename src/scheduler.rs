//! Distributed scheduler (component I): the single-threaded, cooperative
//! event loop that pumps a worker pool through the per-epoch
//! DISPATCH/DRAIN/END-OF-EPOCH state machine of `spec.md` §4.I, fanning
//! completions out to each problem's [`PerProblemStrategy`] and persisting
//! them through a [`StorageAdapter`]. Grounded in `dmosopt.dmosopt.DistOptimizer`'s
//! controller loop.

use std::collections::HashMap;
use std::path::PathBuf;

use derive_builder::Builder;
use log::{info, warn};
use ndarray::Array1;

use crate::error::SchedulerError;
use crate::storage::{ProblemParameters, StorageAdapter};
use crate::strategy::{EvaluationRequest, FeatureRecord, PerProblemStrategy, StrategyConfig};
use crate::space::ParameterSpace;

pub type ProblemId = String;
pub type TaskId = u64;

/// One problem's realized objective result: objectives, and optionally
/// features/constraints, matching the `(y, f, c)` union in `spec.md` §6.
#[derive(Debug, Clone)]
pub struct ObjectiveResult {
    pub y: Array1<f64>,
    pub f: Option<FeatureRecord>,
    pub c: Option<Array1<f64>>,
}

/// One batched task's arguments: one candidate `x` per problem sharing the
/// task, keyed by problem id.
pub type TaskArgs = HashMap<ProblemId, Array1<f64>>;

/// One batched task's outcome: a result (or failure message) per problem.
pub type TaskOutcome = HashMap<ProblemId, Result<ObjectiveResult, String>>;

/// The transport-layer boundary this crate treats as an external
/// collaborator (`spec.md` §1's "deliberately out of scope" worker/transport
/// layer). Implementations own the actual RPC/process-pool mechanics; the
/// scheduler only calls these five methods.
pub trait WorkerPool {
    /// Worker ids currently idle and able to accept a task.
    fn ready_workers(&self) -> Vec<usize>;
    /// Submits one batched task to `worker`, returning its task id.
    fn submit_call(&mut self, worker: usize, args: TaskArgs) -> TaskId;
    /// Blocks until at least one task has a result pending.
    fn recv(&mut self);
    /// Drains every currently-available completion without blocking.
    fn probe_all_next_results(&mut self) -> Vec<(TaskId, TaskOutcome)>;
    /// A short diagnostic string for logging.
    fn info(&self) -> String;
    /// Hands every worker a one-time initialization hook for `problem_id`
    /// (its fixed parameters), called once when the problem is registered.
    /// Pools that bake problem setup into construction can leave this as
    /// the default no-op.
    fn init_problem(&mut self, _problem_id: &str, _problem_parameters: &ProblemParameters) {}
}

/// The programmatic configuration surface a CLI or notebook would build and
/// hand to the scheduler for one problem, matching every recognized key of
/// `spec.md` §6 except `obj_fun`/`obj_fun_name` (replaced by a worker-pool
/// side resolution, per `spec.md` §9 — no runtime code evaluation here).
#[derive(Debug, Clone, Builder)]
#[builder(pattern = "owned")]
pub struct DistOptimizerConfig {
    pub opt_id: String,
    pub space: ParameterSpace,
    pub objective_names: Vec<String>,
    #[builder(default = "Vec::new()")]
    pub feature_names: Vec<String>,
    #[builder(default = "Vec::new()")]
    pub constraint_names: Vec<String>,
    #[builder(default = "HashMap::new()")]
    pub problem_parameters: ProblemParameters,
    pub strategy: StrategyConfig,
    #[builder(default = "10")]
    pub n_epochs: u64,
    #[builder(default = "false")]
    pub save: bool,
    #[builder(default = "None", setter(strip_option))]
    pub file_path: Option<PathBuf>,
    #[builder(default = "true")]
    pub save_eval: bool,
    #[builder(default = "false")]
    pub save_surrogate_eval: bool,
    #[builder(default = "HashMap::new()")]
    pub metadata: HashMap<String, String>,
}

/// The explicit map of live problems the scheduler owns, replacing the
/// original's process-global `opt_id`-keyed registry (`spec.md` §9).
pub type ProblemRegistry = HashMap<ProblemId, PerProblemStrategy>;

/// Drives the epoch state machine across every registered problem. Holds no
/// reference back to any individual strategy's internals beyond the plain
/// `EvaluationRequest` records it hands to the worker pool and gets back —
/// strategies know nothing about the scheduler (`spec.md` §9).
pub struct Scheduler<W: WorkerPool> {
    pool: W,
    strategies: ProblemRegistry,
    storage: Option<StorageAdapter>,
    in_flight: HashMap<TaskId, HashMap<ProblemId, EvaluationRequest>>,
    n_epochs: u64,
    epoch_count: u64,
    save_eval: bool,
    save_surrogate_eval: bool,
}

impl<W: WorkerPool> Scheduler<W> {
    /// Builds the scheduler and fires each registered problem's one-time
    /// `WorkerPool::init_problem` hook (`spec.md` §9), keyed by `problem_id`
    /// against `problem_parameters` (missing entries init with an empty map).
    pub fn new(
        mut pool: W,
        strategies: ProblemRegistry,
        problem_parameters: HashMap<ProblemId, ProblemParameters>,
        storage: Option<StorageAdapter>,
        n_epochs: u64,
        save_eval: bool,
        save_surrogate_eval: bool,
    ) -> Self {
        for pid in strategies.keys() {
            let params = problem_parameters.get(pid).cloned().unwrap_or_default();
            pool.init_problem(pid, &params);
        }

        Self {
            pool,
            strategies,
            storage,
            in_flight: HashMap::new(),
            n_epochs,
            epoch_count: 0,
            save_eval,
            save_surrogate_eval,
        }
    }

    pub fn epoch_count(&self) -> u64 {
        self.epoch_count
    }

    pub fn strategies(&self) -> &ProblemRegistry {
        &self.strategies
    }

    pub fn storage(&self) -> Option<&StorageAdapter> {
        self.storage.as_ref()
    }

    /// Runs epochs until `n_epochs` have completed.
    pub fn run(&mut self) -> Result<(), SchedulerError> {
        while self.epoch_count < self.n_epochs {
            self.run_epoch()?;
        }
        Ok(())
    }

    /// Runs exactly one epoch: DISPATCH/DRAIN until every request queue is
    /// empty and no task is in flight, then the END-OF-EPOCH barrier
    /// (persist, log surrogate MAE, `step()`).
    pub fn run_epoch(&mut self) -> Result<(), SchedulerError> {
        loop {
            self.dispatch();
            self.drain();
            if self.in_flight.is_empty() && !self.any_pending() {
                break;
            }
        }
        self.end_of_epoch()
    }

    fn any_pending(&self) -> bool {
        self.strategies.values().any(|s| s.has_pending())
    }

    /// DISPATCH: while workers are ready and some problem has a pending
    /// request, submit one batched task per ready worker carrying one `x`
    /// per problem that still has something queued.
    fn dispatch(&mut self) {
        while self.any_pending() {
            let worker = match self.pool.ready_workers().into_iter().next() {
                Some(w) => w,
                None => break,
            };

            let mut args: TaskArgs = HashMap::new();
            let mut requests: HashMap<ProblemId, EvaluationRequest> = HashMap::new();
            for (pid, strategy) in self.strategies.iter_mut() {
                if let Some(request) = strategy.get_next_request() {
                    args.insert(pid.clone(), request.x.clone());
                    requests.insert(pid.clone(), request);
                }
            }

            if args.is_empty() {
                break;
            }

            let task_id = self.pool.submit_call(worker, args);
            self.in_flight.insert(task_id, requests);
        }
    }

    /// DRAIN: block on `recv()`, then drain every completion non-blockingly,
    /// completing the affected problem's strategy for each.
    fn drain(&mut self) {
        if self.in_flight.is_empty() {
            return;
        }
        self.pool.recv();
        for (task_id, outcome) in self.pool.probe_all_next_results() {
            let Some(requests) = self.in_flight.remove(&task_id) else {
                warn!("scheduler: received completion for unknown task {task_id}");
                continue;
            };
            for (pid, result) in outcome {
                let Some(request) = requests.get(&pid) else {
                    warn!("scheduler: task {task_id} returned unrequested problem {pid}");
                    continue;
                };
                match result {
                    Ok(objective) => {
                        if let Some(strategy) = self.strategies.get_mut(&pid) {
                            if let Err(e) = strategy.complete_request(
                                request.x.clone(),
                                objective.y,
                                objective.f,
                                objective.c,
                                request.y_pred.clone(),
                            ) {
                                warn!("scheduler: problem {pid} rejected completion: {e}");
                            }
                        }
                    }
                    Err(msg) => {
                        warn!("scheduler: problem {pid} task {task_id} failed: {msg}");
                    }
                }
            }
        }
    }

    /// END-OF-EPOCH: persist this epoch's completions, log per-problem
    /// surrogate MAE, then call `step()` to enqueue the next epoch's
    /// requests.
    fn end_of_epoch(&mut self) -> Result<(), SchedulerError> {
        for (pid, strategy) in self.strategies.iter() {
            let completed = strategy.completed();

            if self.save_eval {
                if let Some(storage) = self.storage.as_mut() {
                    storage.save_evals(pid, completed)?;
                }
            }

            let predicted: Vec<_> = completed.iter().filter(|e| e.y_pred.is_some()).collect();
            if !predicted.is_empty() {
                let m = predicted[0].y.len();
                let mut mae = Array1::<f64>::zeros(m);
                for entry in &predicted {
                    let pred = entry.y_pred.as_ref().expect("filtered above");
                    for j in 0..m {
                        mae[j] += (entry.y[j] - pred[j]).abs();
                    }
                }
                mae.mapv_inplace(|v| v / predicted.len() as f64);
                info!("scheduler: problem {pid} surrogate MAE = {mae:?}");

                if self.save_surrogate_eval {
                    if let Some(storage) = self.storage.as_mut() {
                        storage.save_surrogate_eval(pid, self.epoch_count, &mae)?;
                    }
                }
            }
        }

        for strategy in self.strategies.values_mut() {
            strategy.step()?;
        }
        self.epoch_count += 1;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::random::StdRandomGenerator;
    use crate::space::ParameterSpec;
    use crate::strategy::StrategyConfigBuilder;
    use ndarray::array;

    fn two_dim_space() -> ParameterSpace {
        ParameterSpace::new(vec![
            ParameterSpec::continuous("x0", 0.0, 1.0),
            ParameterSpec::continuous("x1", 0.0, 1.0),
        ])
        .unwrap()
    }

    /// A deterministic, synchronous worker pool for tests: one worker,
    /// always ready, that resolves every task the instant it is submitted
    /// so `recv`/`probe_all_next_results` have something to drain on the
    /// very next call.
    struct ImmediateWorkerPool {
        next_task_id: TaskId,
        pending_results: Vec<(TaskId, TaskOutcome)>,
        initialized: Vec<(String, ProblemParameters)>,
    }

    impl ImmediateWorkerPool {
        fn new() -> Self {
            Self {
                next_task_id: 0,
                pending_results: Vec::new(),
                initialized: Vec::new(),
            }
        }
    }

    impl WorkerPool for ImmediateWorkerPool {
        fn ready_workers(&self) -> Vec<usize> {
            vec![0]
        }

        fn submit_call(&mut self, _worker: usize, args: TaskArgs) -> TaskId {
            let task_id = self.next_task_id;
            self.next_task_id += 1;
            let mut outcome = TaskOutcome::new();
            for (pid, x) in args {
                let y = array![x[0], x[1]];
                outcome.insert(pid, Ok(ObjectiveResult { y, f: None, c: None }));
            }
            self.pending_results.push((task_id, outcome));
            task_id
        }

        fn recv(&mut self) {}

        fn probe_all_next_results(&mut self) -> Vec<(TaskId, TaskOutcome)> {
            std::mem::take(&mut self.pending_results)
        }

        fn info(&self) -> String {
            "immediate-test-pool".to_string()
        }

        fn init_problem(&mut self, problem_id: &str, problem_parameters: &ProblemParameters) {
            self.initialized
                .push((problem_id.to_string(), problem_parameters.clone()));
        }
    }

    fn strategy(n_initial: usize) -> PerProblemStrategy {
        let config = StrategyConfigBuilder::default()
            .n_initial(n_initial)
            .population_size(10)
            .num_generations(2)
            .resample_fraction(0.5)
            .build()
            .unwrap();
        let rng = StdRandomGenerator::new_from_seed(Some(7));
        PerProblemStrategy::new(two_dim_space(), 2, 0, config, rng).unwrap()
    }

    #[test]
    fn test_new_initializes_every_registered_problem_once() {
        let mut strategies = ProblemRegistry::new();
        strategies.insert("p0".to_string(), strategy(1));
        strategies.insert("p1".to_string(), strategy(1));

        let mut problem_parameters = HashMap::new();
        let mut p0_params = ProblemParameters::new();
        p0_params.insert("alpha".to_string(), 0.5);
        problem_parameters.insert("p0".to_string(), p0_params.clone());

        let scheduler = Scheduler::new(
            ImmediateWorkerPool::new(),
            strategies,
            problem_parameters,
            None,
            1,
            false,
            false,
        );

        let mut initialized = scheduler.pool.initialized.clone();
        initialized.sort_by(|a, b| a.0.cmp(&b.0));
        assert_eq!(
            initialized,
            vec![
                ("p0".to_string(), p0_params),
                ("p1".to_string(), ProblemParameters::new()),
            ]
        );
    }

    #[test]
    fn test_run_epoch_drains_all_initial_requests() {
        let mut strategies = ProblemRegistry::new();
        strategies.insert("p0".to_string(), strategy(1));

        let mut scheduler = Scheduler::new(
            ImmediateWorkerPool::new(),
            strategies,
            HashMap::new(),
            None,
            1,
            false,
            false,
        );
        scheduler.run_epoch().unwrap();

        assert_eq!(scheduler.epoch_count(), 1);
        let p0 = &scheduler.strategies()["p0"];
        // n_initial=1 * dim=2 initial points, all completed into history.
        assert_eq!(p0.history().len(), 2);
        // step() enqueued a fresh resample batch: floor(10*0.5) = 5.
        assert!(p0.has_pending());
    }

    #[test]
    fn test_run_drives_multiple_epochs() {
        let mut strategies = ProblemRegistry::new();
        strategies.insert("p0".to_string(), strategy(1));

        let mut scheduler = Scheduler::new(
            ImmediateWorkerPool::new(),
            strategies,
            HashMap::new(),
            None,
            3,
            false,
            false,
        );
        scheduler.run().unwrap();

        assert_eq!(scheduler.epoch_count(), 3);
    }

    #[test]
    fn test_persists_completions_when_storage_present() {
        let mut strategies = ProblemRegistry::new();
        strategies.insert("p0".to_string(), strategy(1));

        let path = std::env::temp_dir().join(format!(
            "moasmo_scheduler_test_{}.bin",
            std::process::id()
        ));
        let mut storage = StorageAdapter::new("opt-test", &path);
        storage.register_problem(
            "p0",
            &two_dim_space(),
            vec!["y0".to_string(), "y1".to_string()],
            vec![],
            vec![],
            HashMap::new(),
        );

        let mut scheduler = Scheduler::new(
            ImmediateWorkerPool::new(),
            strategies,
            HashMap::new(),
            Some(storage),
            1,
            true,
            false,
        );
        scheduler.run_epoch().unwrap();

        let history = scheduler
            .storage()
            .unwrap()
            .load_history("p0")
            .unwrap();
        assert_eq!(history.len(), 2);

        let _ = std::fs::remove_file(&path);
    }
}
