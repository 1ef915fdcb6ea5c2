use thiserror::Error;

use crate::condition::{ConditionType, Operator};

pub type BranchingResult<T> = Result<T, BranchingError>;

/// Failure to evaluate a single condition against a contact context.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ConditionError {
    #[error("operator `{operator}` is not supported by {kind} condition `{condition_id}`")]
    UnsupportedOperator {
        condition_id: String,
        kind: ConditionType,
        operator: Operator,
    },

    #[error("context has no `{field}` section required by condition `{condition_id}`")]
    MissingContextField {
        condition_id: String,
        field: &'static str,
    },

    #[error("value `{value}` of condition `{condition_id}` is not a number")]
    InvalidNumericValue { condition_id: String, value: String },

    #[error("condition `{condition_id}` has no {field} configured")]
    IncompleteCondition {
        condition_id: String,
        field: &'static str,
    },
}

impl ConditionError {
    /// Id of the condition that failed.
    pub fn condition_id(&self) -> &str {
        match self {
            ConditionError::UnsupportedOperator { condition_id, .. }
            | ConditionError::MissingContextField { condition_id, .. }
            | ConditionError::InvalidNumericValue { condition_id, .. }
            | ConditionError::IncompleteCondition { condition_id, .. } => condition_id,
        }
    }
}

#[derive(Error, Debug, Clone, PartialEq)]
pub enum BranchingError {
    #[error("branch `{branch_id}` could not be evaluated at condition `{condition_id}`: {source}")]
    Evaluation {
        branch_id: String,
        condition_id: String,
        #[source]
        source: ConditionError,
    },

    #[error("score index {index} is out of range for {len} scores")]
    IndexOutOfRange { index: usize, len: usize },

    #[error("journey `{0}` not found")]
    JourneyNotFound(String),

    #[error("node `{0}` not found")]
    NodeNotFound(String),

    #[error("branch `{0}` not found")]
    BranchNotFound(String),

    #[error("cannot connect node `{0}` to itself")]
    SelfConnection(String),

    #[error("cannot connect two trigger nodes (`{from}` -> `{to}`)")]
    TriggerToTrigger { from: String, to: String },

    #[error("a connection already exists between `{0}` and `{1}`")]
    DuplicateConnection(String, String),

    #[error("branch `{0}` leaves a trigger and cannot carry conditions")]
    ConditionsNotAllowed(String),

    #[error("priorities leaving node `{node_id}` are not a dense 1..{count} permutation: {found:?}")]
    PriorityInvariant {
        node_id: String,
        count: usize,
        found: Vec<u32>,
    },
}

/// Failure to parse one of the textual condition encodings.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ParseError {
    #[error("unknown operator `{0}`")]
    UnknownOperator(String),

    #[error("unknown condition type `{0}`")]
    UnknownConditionType(String),

    #[error("malformed sub-condition `{0}`, expected `field/operator/value`")]
    MalformedSubMatch(String),
}
