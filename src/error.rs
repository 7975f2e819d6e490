use thiserror::Error;

use crate::grid::Pos;

/// Errors surfaced by simulation commands.
///
/// Validation failures are rejected at the call that introduced them and never
/// corrupt previously committed state.
#[derive(Debug, Error)]
pub enum Error {
    #[error("Grid dimensions {width}x{height} are outside the supported range [3, 500]")]
    InvalidDimensions { width: i32, height: i32 },

    #[error("Cell rows do not match the declared {width}x{height} dimensions")]
    MalformedGrid { width: i32, height: i32 },

    #[error("Grid must contain exactly one start cell (found {0})")]
    StartCount(usize),

    #[error("Grid must contain exactly one target cell (found {0})")]
    TargetCount(usize),

    #[error("Target is not reachable from start")]
    TargetUnreachable,

    #[error("Edit would remove the last {0} cell")]
    ProtectedCell(&'static str),

    #[error("Position {0} is outside the grid")]
    OutOfBounds(Pos),

    #[error("Hyperparameter `{name}` = {value} must be in the interval [{min}, {max}]")]
    HyperparameterRange {
        name: &'static str,
        value: f64,
        min: f64,
        max: f64,
    },

    #[error("Allowed action set must not be empty")]
    NoAllowedActions,

    #[error("No simulation configured; call setup first")]
    NotConfigured,

    #[error("Grid cannot be edited while the simulation is running; pause first")]
    EditWhileRunning,

    #[error("Unknown cell kind: {0:?}")]
    UnknownCell(String),

    #[error("Wire codec error: {0}")]
    Codec(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, Error>;
