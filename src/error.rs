//! Error types. Leaf errors are derived with `thiserror`; errors that
//! aggregate several leaf kinds (the scheduler, the per-problem strategy)
//! follow the teacher's hand-written `Display`/`From` pattern instead, since
//! `thiserror`'s derive doesn't compose as cleanly once a variant itself
//! needs to wrap more than one unrelated leaf type.

use std::{error::Error, fmt};

use thiserror::Error;

/// Errors raised while constructing a [`crate::space::ParameterSpace`] or
/// other static configuration.
#[derive(Debug, Error, PartialEq)]
pub enum ConfigError {
    #[error("parameter space must contain at least one parameter")]
    EmptyParameterSpace,
    #[error("parameter {name:?} has invalid bounds [{lower}, {upper}]")]
    InvalidBounds { name: String, lower: f64, upper: f64 },
    #[error("population size must be positive, got {0}")]
    InvalidPopulationSize(usize),
    #[error("resample fraction must lie in (0, 1], got {0}")]
    InvalidResampleFraction(f64),
}

/// Errors raised when array shapes disagree with the problem's declared
/// dimensionality.
#[derive(Debug, Error, PartialEq)]
pub enum ShapeError {
    #[error("expected {expected} columns, got {actual}")]
    ColumnMismatch { expected: usize, actual: usize },
    #[error("expected {expected} rows, got {actual}")]
    RowMismatch { expected: usize, actual: usize },
    #[error("empty array where at least one row was required")]
    Empty,
}

/// Errors raised while fitting or evaluating the Gaussian-process surrogate.
#[derive(Debug, Error)]
pub enum SurrogateFitError {
    #[error("surrogate requires at least {min} training points, got {actual}")]
    InsufficientData { min: usize, actual: usize },
    #[error("shape mismatch while fitting surrogate: {0}")]
    Shape(#[from] ShapeError),
    #[error("covariance matrix was not positive definite after jitter retries")]
    CholeskyFailed,
    #[error("SCE-UA hyperparameter search failed to produce a finite objective")]
    HyperparameterSearchFailed,
}

/// Errors raised by the append-only storage adapter.
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("failed to (de)serialize storage record: {0}")]
    Encoding(#[from] bincode::Error),
    #[error("unknown problem id {0}")]
    UnknownProblem(String),
    #[error("storage log is corrupt: {0}")]
    Corrupt(String),
}

/// Errors surfaced by [`crate::strategy::PerProblemStrategy`].
#[derive(Debug)]
pub enum StrategyError {
    Config(ConfigError),
    Shape(ShapeError),
    Surrogate(SurrogateFitError),
    /// A completion was reported for an `x` that was never requested.
    UnknownRequest(String),
}

impl fmt::Display for StrategyError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StrategyError::Config(e) => write!(f, "configuration error: {e}"),
            StrategyError::Shape(e) => write!(f, "shape error: {e}"),
            StrategyError::Surrogate(e) => write!(f, "surrogate error: {e}"),
            StrategyError::UnknownRequest(msg) => write!(f, "unknown request: {msg}"),
        }
    }
}

impl From<ConfigError> for StrategyError {
    fn from(e: ConfigError) -> Self {
        StrategyError::Config(e)
    }
}

impl From<ShapeError> for StrategyError {
    fn from(e: ShapeError) -> Self {
        StrategyError::Shape(e)
    }
}

impl From<SurrogateFitError> for StrategyError {
    fn from(e: SurrogateFitError) -> Self {
        StrategyError::Surrogate(e)
    }
}

impl Error for StrategyError {}

/// Errors surfaced by [`crate::scheduler::Scheduler`], aggregating strategy,
/// storage, and transport-layer (worker pool) failures.
#[derive(Debug)]
pub enum SchedulerError {
    Strategy(StrategyError),
    Storage(StorageError),
    /// The worker transport reported a failure (e.g. a worker panicked).
    Worker(String),
    UnknownProblem(String),
}

impl fmt::Display for SchedulerError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SchedulerError::Strategy(e) => write!(f, "strategy error: {e}"),
            SchedulerError::Storage(e) => write!(f, "storage error: {e}"),
            SchedulerError::Worker(msg) => write!(f, "worker error: {msg}"),
            SchedulerError::UnknownProblem(msg) => write!(f, "unknown problem: {msg}"),
        }
    }
}

impl From<StrategyError> for SchedulerError {
    fn from(e: StrategyError) -> Self {
        SchedulerError::Strategy(e)
    }
}

impl From<StorageError> for SchedulerError {
    fn from(e: StorageError) -> Self {
        SchedulerError::Storage(e)
    }
}

impl Error for SchedulerError {}
