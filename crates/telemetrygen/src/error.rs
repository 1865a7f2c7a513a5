//! Error types for log generation.

use crate::sink::ExportError;
use thiserror::Error;

/// Invalid generation parameters, reported before any worker starts.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ConfigError {
    /// Neither a record count nor a duration was given.
    #[error("either `logs` or `duration` must be greater than 0")]
    NothingToGenerate,

    /// The worker pool would be empty.
    #[error("worker count must be at least 1")]
    NoWorkers,

    /// The emission rate is negative or not a finite number.
    #[error("rate must be a finite, non-negative number of records per second, got {0}")]
    InvalidRate(f64),

    /// A `key=value` attribute could not be parsed.
    #[error("invalid attribute `{0}`, expected key=value")]
    InvalidAttribute(String),

    /// A duration string could not be parsed.
    #[error("invalid duration `{0}`, expected e.g. 500ms, 30s, 5m or 1h")]
    InvalidDuration(String),
}

/// Failure of a rate limiter token wait.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum PacingError {
    /// The wait was abandoned because the run is being aborted.
    #[error("rate limiter wait was cancelled")]
    Cancelled,
}

/// Errors that end a generation run.
#[derive(Debug, Error)]
pub enum GenerateError {
    /// The configuration was rejected.
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// A worker's sink export failed.
    #[error("worker {worker}: exporter failed: {source}")]
    Export {
        worker: usize,
        #[source]
        source: ExportError,
    },

    /// A worker's token wait failed.
    #[error("worker {worker}: limiter wait failed: {source}")]
    Pacing {
        worker: usize,
        #[source]
        source: PacingError,
    },

    /// A worker task panicked or was cancelled by the runtime.
    #[error("worker task failed: {0}")]
    WorkerPanicked(String),
}

impl GenerateError {
    /// Index of the worker that reported this error, if any.
    pub fn worker(&self) -> Option<usize> {
        match self {
            Self::Export { worker, .. } | Self::Pacing { worker, .. } => Some(*worker),
            Self::Config(_) | Self::WorkerPanicked(_) => None,
        }
    }

    /// Returns `true` for the secondary error a worker reports when it is
    /// interrupted by another worker's failure.
    pub fn is_cancellation(&self) -> bool {
        matches!(
            self,
            Self::Pacing {
                source: PacingError::Cancelled,
                ..
            }
        )
    }
}
