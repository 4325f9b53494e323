// Engine error types.
//
// Two failure shapes exist: a request that cannot be processed at all
// (fail-fast, caller bug) and an operator that failed during a generation
// phase (isolated per operator; surfaced as an error only under the strict
// failure policy). Candidate validation failures are never errors — invalid
// candidates are dropped silently and reported through the diagnostics sink.

use serde::{Deserialize, Serialize};
use thiserror::Error;

pub type Result<T> = std::result::Result<T, EngineError>;

/// Top-level engine error.
#[derive(Error, Debug)]
pub enum EngineError {
    /// The request itself is malformed (empty role, bar number zero).
    /// Non-recoverable; the caller must fix the request.
    #[error("invalid request: {0}")]
    InvalidRequest(String),

    /// An operator failed during a generation phase. Raised only under
    /// `FailurePolicy::Strict`; the default policy records the failure to
    /// diagnostics and continues with the remaining operators.
    #[error("operator '{operator}' failed during {phase}: {message}")]
    Operator {
        operator: String,
        phase: OperatorPhase,
        message: String,
    },
}

/// A failure raised inside an operator implementation.
///
/// Operators report domain problems (missing harmony data, malformed
/// pattern tables) as plain messages; the harness attributes them to the
/// operator and phase.
#[derive(Error, Debug, Clone)]
#[error("{0}")]
pub struct OperatorError(pub String);

impl From<String> for OperatorError {
    fn from(message: String) -> Self {
        OperatorError(message)
    }
}

impl From<&str> for OperatorError {
    fn from(message: &str) -> Self {
        OperatorError(message.to_string())
    }
}

/// Which operator phase produced a failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum OperatorPhase {
    Candidates,
    Removals,
}

impl std::fmt::Display for OperatorPhase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            OperatorPhase::Candidates => write!(f, "candidate generation"),
            OperatorPhase::Removals => write!(f, "removal generation"),
        }
    }
}
