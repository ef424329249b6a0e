//! Storage adapter (component J): an append-only evaluation log grouped by
//! `(opt_id, problem_id)`, backed by `serde` + `bincode` rather than the
//! original's HDF5 file (no HDF5 crate is available in this stack). Schema
//! mirrors `spec.md` §6's hierarchical layout: name→index enumerations for
//! parameters/objectives/features/constraints, a fixed parameter-space
//! record, and one append-only log of entries per problem id, plus a
//! sibling log of optional surrogate-prediction traces.

use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};

use ndarray::Array1;
use serde::{Deserialize, Serialize};

use crate::error::StorageError;
use crate::space::{ParameterSpace, ParameterSpec};
use crate::strategy::{EvaluationEntry, FeatureRecord};

/// A name→index lookup, self-describing the columns of a stored matrix.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Enumeration {
    names: Vec<String>,
}

impl Enumeration {
    pub fn new(names: Vec<String>) -> Self {
        Self { names }
    }

    pub fn names(&self) -> &[String] {
        &self.names
    }

    pub fn index_of(&self, name: &str) -> Option<usize> {
        self.names.iter().position(|n| n == name)
    }

    pub fn len(&self) -> usize {
        self.names.len()
    }

    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }
}

/// Serializable mirror of a single [`ParameterSpec`].
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ParameterSpaceRecord {
    pub names: Vec<String>,
    pub lower: Vec<f64>,
    pub upper: Vec<f64>,
    pub is_integer: Vec<bool>,
}

impl ParameterSpaceRecord {
    pub fn from_space(space: &ParameterSpace) -> Self {
        let specs = space.specs();
        Self {
            names: specs.iter().map(|s| s.name.clone()).collect(),
            lower: specs.iter().map(|s| s.lower).collect(),
            upper: specs.iter().map(|s| s.upper).collect(),
            is_integer: specs.iter().map(|s| s.is_integer).collect(),
        }
    }

    pub fn to_space(&self) -> Result<ParameterSpace, StorageError> {
        if self.names.len() != self.lower.len()
            || self.names.len() != self.upper.len()
            || self.names.len() != self.is_integer.len()
        {
            return Err(StorageError::Corrupt(
                "parameter space record has mismatched column lengths".to_string(),
            ));
        }
        let specs: Vec<ParameterSpec> = (0..self.names.len())
            .map(|i| ParameterSpec::new(self.names[i].clone(), self.lower[i], self.upper[i], self.is_integer[i]))
            .collect();
        ParameterSpace::new(specs)
            .map_err(|e| StorageError::Corrupt(format!("restored parameter space is invalid: {e}")))
    }
}

/// A fixed key→value map of problem-specific constants, carried alongside
/// the parameter space (e.g. a problem index within a batch of siblings).
pub type ProblemParameters = HashMap<String, f64>;

/// Serializable mirror of [`EvaluationEntry`]: parallel columns instead of
/// an `ndarray`/feature-record pair, keyed by the problem's enumerations.
#[derive(Debug, Clone, Serialize, Deserialize)]
struct EvaluationRecord {
    epoch: u64,
    parameters: Vec<f64>,
    objectives: Vec<f64>,
    features: Option<Vec<f64>>,
    constraints: Option<Vec<f64>>,
    predictions: Option<Vec<f64>>,
}

/// One problem's append-only log: its enumerations, fixed parameters, and
/// every evaluation recorded so far.
#[derive(Debug, Clone, Serialize, Deserialize)]
struct ProblemLog {
    parameter_space: ParameterSpaceRecord,
    objective_enum: Enumeration,
    feature_enum: Enumeration,
    constraint_enum: Enumeration,
    problem_parameters: ProblemParameters,
    entries: Vec<EvaluationRecord>,
}

/// One recorded surrogate-prediction trace, matching the `surrogate_evals`
/// group named in `spec.md` §6: per-epoch mean absolute error between a
/// problem's predicted and realized objectives.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SurrogateEvalRecord {
    pub problem_id: String,
    pub epoch: u64,
    pub mae: Vec<f64>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct Store {
    opt_id: String,
    problems: HashMap<String, ProblemLog>,
    surrogate_evals: Vec<SurrogateEvalRecord>,
}

/// Append-only binary log for one `opt_id`, grouped by `problem_id`.
/// Every mutating call rewrites the whole file in one open/write/close,
/// matching the "no concurrent writers" resource model of `spec.md` §5 —
/// the log is logically append-only (in-memory entries are only ever
/// pushed, never edited or removed) even though each flush re-serializes
/// the full store rather than streaming a byte-level append.
pub struct StorageAdapter {
    file_path: PathBuf,
    store: Store,
}

impl StorageAdapter {
    /// Creates a fresh, empty adapter for `opt_id`, persisting to `file_path`.
    pub fn new(opt_id: impl Into<String>, file_path: impl Into<PathBuf>) -> Self {
        Self {
            file_path: file_path.into(),
            store: Store {
                opt_id: opt_id.into(),
                problems: HashMap::new(),
                surrogate_evals: Vec::new(),
            },
        }
    }

    /// Loads a previously persisted store from `file_path`.
    pub fn load(file_path: impl Into<PathBuf>) -> Result<Self, StorageError> {
        let file_path = file_path.into();
        let bytes = fs::read(&file_path)?;
        let store: Store = bincode::deserialize(&bytes)?;
        Ok(Self { file_path, store })
    }

    pub fn opt_id(&self) -> &str {
        &self.store.opt_id
    }

    pub fn problem_ids(&self) -> Vec<&str> {
        self.store.problems.keys().map(|s| s.as_str()).collect()
    }

    /// Registers a problem's schema. Idempotent: re-registering the same
    /// `problem_id` replaces its enumerations but keeps any already-logged
    /// entries (the enumerations are assumed stable across a restart).
    pub fn register_problem(
        &mut self,
        problem_id: impl Into<String>,
        space: &ParameterSpace,
        objective_names: Vec<String>,
        feature_names: Vec<String>,
        constraint_names: Vec<String>,
        problem_parameters: ProblemParameters,
    ) {
        let problem_id = problem_id.into();
        let entries = self
            .store
            .problems
            .get(&problem_id)
            .map(|log| log.entries.clone())
            .unwrap_or_default();
        self.store.problems.insert(
            problem_id,
            ProblemLog {
                parameter_space: ParameterSpaceRecord::from_space(space),
                objective_enum: Enumeration::new(objective_names),
                feature_enum: Enumeration::new(feature_names),
                constraint_enum: Enumeration::new(constraint_names),
                problem_parameters,
                entries,
            },
        );
    }

    /// Appends `entries` to `problem_id`'s log and flushes the whole store
    /// to disk in one open/write/close.
    pub fn save_evals(
        &mut self,
        problem_id: &str,
        entries: &[EvaluationEntry],
    ) -> Result<(), StorageError> {
        let log = self
            .store
            .problems
            .get_mut(problem_id)
            .ok_or_else(|| StorageError::UnknownProblem(problem_id.to_string()))?;

        for entry in entries {
            let features = entry.f.as_ref().map(|f| f.iter().map(|(_, v)| *v).collect());
            let constraints = entry.c.as_ref().map(|c| c.to_vec());
            let predictions = entry.y_pred.as_ref().map(|p| p.to_vec());
            log.entries.push(EvaluationRecord {
                epoch: entry.epoch,
                parameters: entry.x.to_vec(),
                objectives: entry.y.to_vec(),
                features,
                constraints,
                predictions,
            });
        }

        self.flush()
    }

    /// Appends one surrogate-prediction trace record and flushes.
    pub fn save_surrogate_eval(
        &mut self,
        problem_id: &str,
        epoch: u64,
        mae: &Array1<f64>,
    ) -> Result<(), StorageError> {
        self.store.surrogate_evals.push(SurrogateEvalRecord {
            problem_id: problem_id.to_string(),
            epoch,
            mae: mae.to_vec(),
        });
        self.flush()
    }

    /// Reconstructs `problem_id`'s full evaluation history as
    /// [`EvaluationEntry`] values, in the order they were appended, for
    /// seeding [`crate::strategy::PerProblemStrategy::new_from_history`].
    pub fn load_history(&self, problem_id: &str) -> Result<Vec<EvaluationEntry>, StorageError> {
        let log = self
            .store
            .problems
            .get(problem_id)
            .ok_or_else(|| StorageError::UnknownProblem(problem_id.to_string()))?;

        log.entries
            .iter()
            .map(|record| {
                let x = Array1::from(record.parameters.clone());
                let y = Array1::from(record.objectives.clone());
                let f: Option<FeatureRecord> = record.features.as_ref().map(|values| {
                    log.feature_enum
                        .names()
                        .iter()
                        .cloned()
                        .zip(values.iter().cloned())
                        .collect()
                });
                let c = record.constraints.clone().map(Array1::from);
                let y_pred = record.predictions.clone().map(Array1::from);
                Ok(EvaluationEntry {
                    epoch: record.epoch,
                    x,
                    y,
                    f,
                    c,
                    y_pred,
                })
            })
            .collect()
    }

    pub fn parameter_space(&self, problem_id: &str) -> Result<ParameterSpace, StorageError> {
        let log = self
            .store
            .problems
            .get(problem_id)
            .ok_or_else(|| StorageError::UnknownProblem(problem_id.to_string()))?;
        log.parameter_space.to_space()
    }

    pub fn objective_enum(&self, problem_id: &str) -> Result<&Enumeration, StorageError> {
        Ok(&self
            .store
            .problems
            .get(problem_id)
            .ok_or_else(|| StorageError::UnknownProblem(problem_id.to_string()))?
            .objective_enum)
    }

    fn flush(&self) -> Result<(), StorageError> {
        let bytes = bincode::serialize(&self.store)?;
        if let Some(parent) = self.file_path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
        }
        fs::write(&self.file_path, bytes)?;
        Ok(())
    }

    pub fn file_path(&self) -> &Path {
        &self.file_path
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::space::ParameterSpec;
    use ndarray::array;

    fn space() -> ParameterSpace {
        ParameterSpace::new(vec![
            ParameterSpec::continuous("x0", 0.0, 1.0),
            ParameterSpec::continuous("x1", 0.0, 1.0),
        ])
        .unwrap()
    }

    fn tmp_path(name: &str) -> PathBuf {
        std::env::temp_dir().join(format!("moasmo_storage_test_{name}_{}.bin", std::process::id()))
    }

    #[test]
    fn test_round_trip_save_and_load() {
        let path = tmp_path("round_trip");
        let mut storage = StorageAdapter::new("opt-1", &path);
        storage.register_problem(
            "p0",
            &space(),
            vec!["f1".to_string(), "f2".to_string()],
            vec![],
            vec![],
            HashMap::new(),
        );

        let entries = vec![
            EvaluationEntry {
                epoch: 0,
                x: array![0.1, 0.2],
                y: array![1.0, 2.0],
                f: None,
                c: None,
                y_pred: None,
            },
            EvaluationEntry {
                epoch: 0,
                x: array![0.3, 0.4],
                y: array![3.0, 4.0],
                f: None,
                c: None,
                y_pred: Some(array![2.9, 4.1]),
            },
        ];
        storage.save_evals("p0", &entries).unwrap();

        let reloaded = StorageAdapter::load(&path).unwrap();
        let history = reloaded.load_history("p0").unwrap();
        assert_eq!(history.len(), 2);
        assert_eq!(history[1].x, array![0.3, 0.4]);
        assert_eq!(history[1].y_pred, Some(array![2.9, 4.1]));

        let restored_space = reloaded.parameter_space("p0").unwrap();
        assert_eq!(restored_space.dim(), 2);

        let _ = fs::remove_file(&path);
    }

    #[test]
    fn test_save_evals_unknown_problem_errors() {
        let path = tmp_path("unknown_problem");
        let mut storage = StorageAdapter::new("opt-1", &path);
        let result = storage.save_evals("missing", &[]);
        assert!(matches!(result, Err(StorageError::UnknownProblem(_))));
    }

    #[test]
    fn test_enumeration_index_of() {
        let e = Enumeration::new(vec!["a".to_string(), "b".to_string()]);
        assert_eq!(e.index_of("b"), Some(1));
        assert_eq!(e.index_of("c"), None);
    }
}
