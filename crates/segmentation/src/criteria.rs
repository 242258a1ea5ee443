//! The persisted, loosely-typed condition list and the validated, typed
//! condition group produced from it.

use serde::{Deserialize, Serialize};

use crate::registry::{FieldDescriptor, Operator, TypedValue};

/// Per-condition combination tag. Persisted and round-tripped, but the
/// compiler ANDs every condition regardless of its value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum LogicalOperator {
    And,
    Or,
}

/// One condition exactly as authored or stored. Nothing here is trusted
/// until it has been through the validator.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawCondition {
    pub id: String,
    pub field: String,
    pub operator: String,
    #[serde(default)]
    pub value: String,
    #[serde(default)]
    pub logical_operator: Option<LogicalOperator>,
}

impl RawCondition {
    pub fn new(
        id: impl Into<String>,
        field: impl Into<String>,
        operator: impl Into<String>,
        value: impl Into<String>,
    ) -> Self {
        Self {
            id: id.into(),
            field: field.into(),
            operator: operator.into(),
            value: value.into(),
            logical_operator: None,
        }
    }
}

/// Persisted criteria shape: `{ "conditions": [...] }`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SegmentCriteria {
    #[serde(default)]
    pub conditions: Vec<RawCondition>,
}

impl SegmentCriteria {
    pub fn new(conditions: Vec<RawCondition>) -> Self {
        Self { conditions }
    }

    pub fn is_empty(&self) -> bool {
        self.conditions.is_empty()
    }
}

/// A validated condition. The field descriptor is a snapshot of the
/// registry entry at validation time.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Condition {
    pub id: String,
    pub field: FieldDescriptor,
    pub operator: Operator,
    pub value: TypedValue,
    pub logical_operator: Option<LogicalOperator>,
}

/// Ordered, non-empty sequence of validated conditions. Only the validator
/// can build one.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConditionGroup {
    conditions: Vec<Condition>,
}

impl ConditionGroup {
    pub(crate) fn new(conditions: Vec<Condition>) -> Self {
        debug_assert!(!conditions.is_empty());
        Self { conditions }
    }

    pub fn conditions(&self) -> &[Condition] {
        &self.conditions
    }

    pub fn len(&self) -> usize {
        self.conditions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.conditions.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Condition> {
        self.conditions.iter()
    }
}
