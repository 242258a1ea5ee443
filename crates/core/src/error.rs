use crate::types::SegmentId;
use thiserror::Error;

pub type SegmentResult<T> = Result<T, SegmentError>;

/// Top-level error surfaced by every segmentation operation.
#[derive(Error, Debug)]
pub enum SegmentError {
    #[error(transparent)]
    Validation(#[from] ValidationError),

    /// Missing, or owned by another organization. Callers cannot tell
    /// which.
    #[error("Segment not found: {segment_id}")]
    NotFound { segment_id: SegmentId },

    #[error(transparent)]
    Evaluation(#[from] EvaluationError),
}

/// Rejected criteria or request parameters. Carries the offending
/// condition id whenever one can be attributed.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error(
    "Validation error{}: {}",
    .condition_id.as_ref().map(|id| format!(" in condition '{id}'")).unwrap_or_default(),
    .kind
)]
pub struct ValidationError {
    pub condition_id: Option<String>,
    pub kind: ValidationErrorKind,
}

impl ValidationError {
    pub fn new(kind: ValidationErrorKind) -> Self {
        Self {
            condition_id: None,
            kind,
        }
    }

    pub fn for_condition(condition_id: impl Into<String>, kind: ValidationErrorKind) -> Self {
        Self {
            condition_id: Some(condition_id.into()),
            kind,
        }
    }
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ValidationErrorKind {
    #[error("criteria must contain at least one condition")]
    EmptyConditions,

    #[error("criteria exceed the maximum of {max} conditions")]
    TooManyConditions { max: usize },

    #[error("unknown field '{0}'")]
    UnknownField(String),

    #[error("unknown operator '{0}'")]
    UnknownOperator(String),

    #[error("operator '{operator}' is not allowed for field '{field}'")]
    OperatorNotAllowed { field: String, operator: String },

    #[error("value must not be empty")]
    EmptyValue,

    #[error("'{0}' is not a valid date")]
    InvalidDate(String),

    #[error("page limit must be at least 1")]
    EmptyPage,

    #[error("page limit {requested} exceeds the maximum of {max}")]
    PageTooLarge { requested: usize, max: usize },

    #[error("invalid segment name: {0}")]
    InvalidName(String),
}

/// Failure while turning stored criteria into results, or while talking to
/// storage.
#[derive(Error, Debug)]
pub enum EvaluationError {
    /// Persisted criteria no longer validate against the current registry.
    #[error("Stored criteria are no longer valid: {0}")]
    StaleCriteria(ValidationError),

    #[error("Field '{0}' is not registered")]
    UnregisteredField(String),

    #[error("Storage error: {0}")]
    Storage(String),

    #[error("Internal evaluation error: {0}")]
    Internal(String),
}
