use hifitime::Epoch;
use thiserror::Error;

use crate::identifiers::{SatId, SourceId, TypeId};

/// Errors raised while validating or applying a [crate::cfg::Config].
#[derive(Debug, Clone, Error, PartialEq)]
pub enum ConfigError {
    #[error("mandatory option missing: {0}")]
    MissingOption(&'static str),
    #[error("malformed option {0}: {1}")]
    MalformedOption(&'static str, String),
    #[error("conflicting options: {0}")]
    Conflict(String),
}

/// Errors raised while a satellite's data is missing a required [TypeId].
#[derive(Debug, Clone, Error, PartialEq)]
#[error("type {0:?} missing in map")]
pub struct TypeMissingInMap(pub TypeId);

/// Per-satellite / per-epoch lookup failures. These are recoverable: the
/// caller drops the satellite for this epoch and continues (see spec.md §7).
#[derive(Debug, Clone, Error, PartialEq)]
pub enum LookupError {
    #[error("sat id not found: {0:?}")]
    SatIDNotFound(SatId),
    #[error("source id not found: {0:?}")]
    SourceIDNotFound(SourceId),
    #[error("bias not found for {0:?}/{1:?}")]
    BiasNotFound(SatId, TypeId),
    #[error(transparent)]
    TypeMissing(#[from] TypeMissingInMap),
}

/// Errors raised by the observation-processing pipeline.
#[derive(Debug, Clone, Error, PartialEq)]
pub enum PipelineError {
    /// Epoch falls outside the configured time window, or off the sampling
    /// grid. Recoverable: the epoch is silently skipped.
    #[error("epoch {0} decimated")]
    EpochDecimated(Epoch),
    /// Fewer than the configured minimum number of satellites survived
    /// selection/filtering.
    #[error("epoch {0}: insufficient observations ({1} sv)")]
    InsufficientObservations(Epoch, usize),
    #[error(transparent)]
    Lookup(#[from] LookupError),
    /// Out-of-order or duplicate epoch arrival (spec.md §5 ordering guarantee).
    #[error("epoch {0} is not monotonically increasing (last was {1})")]
    EpochNotMonotonic(Epoch, Epoch),
    #[error(transparent)]
    Filter(#[from] FilterError),
}

/// Errors raised by the Kalman filter time/measurement update.
#[derive(Debug, Clone, Error, PartialEq)]
pub enum FilterError {
    /// Matrix ill-conditioning during the measurement update. The filter
    /// falls back to sequential scalar updates (spec.md §7 NumericalFailure).
    #[error("numerical failure inverting innovation covariance @{0}")]
    NumericalFailure(Epoch),
    #[error("empty equation set @{0}")]
    EmptyEquationSet(Epoch),
}

/// Errors raised by the ambiguity-resolution stage.
#[derive(Debug, Clone, Error, PartialEq)]
pub enum AmbiguityError {
    #[error("no reference satellite available for system at {0}")]
    NoReferenceSatellite(Epoch),
    #[error("LAMBDA decorrelation failed: {0}")]
    Decorrelation(String),
    #[error("ratio test failed: {0:.3} <= threshold")]
    RatioTestFailed(f64),
}

/// Top level error returned by [crate::solver::Solver::run].
#[derive(Debug, Clone, Error, PartialEq)]
pub enum Error {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error(transparent)]
    Pipeline(#[from] PipelineError),
    #[error(transparent)]
    Filter(#[from] FilterError),
    #[error(transparent)]
    Ambiguity(#[from] AmbiguityError),
}
