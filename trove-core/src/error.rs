use crate::Operator;
use thiserror::Error;

/// Failures raised by the mapping layer.
///
/// Driver errors travel as `anyhow::Error`; the session attaches
/// [`OrmError::SqlExecution`] as context so `downcast_ref::<OrmError>()` finds it.
#[derive(Debug, Error)]
pub enum OrmError {
    #[error("Mapping error: {0}")]
    Mapping(String),

    #[error("The meta-model is locked, cannot {0}")]
    ModelFrozen(String),

    #[error("Operator {operator:?} cannot compare column `{column}` with a null value")]
    UnsupportedNullComparison { operator: Operator, column: String },

    #[error("Unsupported operator: {0}")]
    UnsupportedOperator(String),

    #[error("Illegal SQL statement: {sql}\nBound values: [{values}]")]
    SqlExecution { sql: String, values: String },

    #[error("Session state error: {0}")]
    SessionState(String),

    #[error("Ambiguous result: {0}")]
    AmbiguousResult(String),

    #[error("Sequence error: {0}")]
    Sequence(String),
}

impl OrmError {
    pub fn mapping(msg: impl Into<String>) -> Self {
        Self::Mapping(msg.into())
    }

    pub fn model_frozen(msg: impl Into<String>) -> Self {
        Self::ModelFrozen(msg.into())
    }

    pub fn unsupported_operator(msg: impl Into<String>) -> Self {
        Self::UnsupportedOperator(msg.into())
    }

    pub fn session_state(msg: impl Into<String>) -> Self {
        Self::SessionState(msg.into())
    }

    pub fn sequence(msg: impl Into<String>) -> Self {
        Self::Sequence(msg.into())
    }

    /// True when the session must be rolled back after this error.
    pub fn is_execution_failure(&self) -> bool {
        matches!(self, Self::SqlExecution { .. })
    }
}
