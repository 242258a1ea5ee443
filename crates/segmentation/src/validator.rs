//! Condition validator — turns raw conditions into a typed
//! [`ConditionGroup`], failing fast on the first offending condition.

use audience_core::{ValidationError, ValidationErrorKind};
use std::sync::Arc;
use tracing::{debug, warn};

use crate::criteria::{Condition, ConditionGroup, LogicalOperator, RawCondition};
use crate::registry::{DateValue, FieldRegistry, Operator, TypedValue, ValueType};

pub struct ConditionValidator {
    registry: Arc<FieldRegistry>,
    max_conditions: usize,
}

impl ConditionValidator {
    pub fn new(registry: Arc<FieldRegistry>, max_conditions: usize) -> Self {
        Self {
            registry,
            max_conditions,
        }
    }

    pub fn registry(&self) -> &FieldRegistry {
        &self.registry
    }

    /// Validate a raw condition list. Order and content of the output
    /// mirror the input exactly.
    pub fn validate(&self, raw: &[RawCondition]) -> Result<ConditionGroup, ValidationError> {
        let result = self.check(raw);
        if let Err(e) = &result {
            warn!(
                condition_id = e.condition_id.as_deref().unwrap_or("-"),
                error = %e.kind,
                "Criteria rejected"
            );
            metrics::counter!("segments.validation_errors").increment(1);
        }
        result
    }

    /// Re-check persisted criteria. Same rules as [`validate`](Self::validate),
    /// but a failure here is a stale segment, not a client error, so it is
    /// left to the caller to log and count.
    pub fn revalidate(&self, raw: &[RawCondition]) -> Result<ConditionGroup, ValidationError> {
        self.check(raw)
    }

    fn check(&self, raw: &[RawCondition]) -> Result<ConditionGroup, ValidationError> {
        if raw.is_empty() {
            return Err(ValidationError::new(ValidationErrorKind::EmptyConditions));
        }
        if raw.len() > self.max_conditions {
            return Err(ValidationError::new(ValidationErrorKind::TooManyConditions {
                max: self.max_conditions,
            }));
        }

        let conditions = raw
            .iter()
            .map(|c| self.check_condition(c))
            .collect::<Result<Vec<_>, _>>()?;

        if conditions
            .iter()
            .any(|c| c.logical_operator == Some(LogicalOperator::Or))
        {
            debug!("OR tags present; conditions are combined with AND");
        }

        Ok(ConditionGroup::new(conditions))
    }

    fn check_condition(&self, raw: &RawCondition) -> Result<Condition, ValidationError> {
        let fail = |kind| ValidationError::for_condition(raw.id.clone(), kind);

        let field = self
            .registry
            .lookup(&raw.field)
            .map_err(|e| fail(ValidationErrorKind::UnknownField(e.0)))?;

        let operator: Operator = raw
            .operator
            .parse()
            .map_err(|_| fail(ValidationErrorKind::UnknownOperator(raw.operator.clone())))?;

        if !field.value_type.allows(operator) {
            return Err(fail(ValidationErrorKind::OperatorNotAllowed {
                field: field.name.clone(),
                operator: raw.operator.clone(),
            }));
        }

        if raw.value.trim().is_empty() {
            return Err(fail(ValidationErrorKind::EmptyValue));
        }

        let value = field.value_type.parse(&raw.value).ok_or_else(|| match field.value_type {
            ValueType::Date => fail(ValidationErrorKind::InvalidDate(raw.value.clone())),
            ValueType::String => fail(ValidationErrorKind::EmptyValue),
        })?;

        // `on` selects a calendar day; a time or offset would shift it.
        if let TypedValue::Date(DateValue { day: None, .. }) = value {
            if operator == Operator::On {
                return Err(fail(ValidationErrorKind::InvalidDate(raw.value.clone())));
            }
        }

        Ok(Condition {
            id: raw.id.clone(),
            field: field.clone(),
            operator,
            value,
            logical_operator: raw.logical_operator,
        })
    }
}
