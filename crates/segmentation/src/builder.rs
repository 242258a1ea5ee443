//! Criteria builder — fluent API for constructing segment criteria.

use crate::criteria::{LogicalOperator, RawCondition, SegmentCriteria};
use crate::registry::Operator;

#[derive(Debug, Default)]
pub struct CriteriaBuilder {
    conditions: Vec<RawCondition>,
}

impl CriteriaBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a condition. Ids are assigned in order (`c1`, `c2`, ...).
    pub fn condition(mut self, field: impl Into<String>, operator: Operator, value: impl Into<String>) -> Self {
        let id = format!("c{}", self.conditions.len() + 1);
        let mut raw = RawCondition::new(id, field, operator.as_str(), value);
        if !self.conditions.is_empty() {
            raw.logical_operator = Some(LogicalOperator::And);
        }
        self.conditions.push(raw);
        self
    }

    pub fn equals(self, field: impl Into<String>, value: impl Into<String>) -> Self {
        self.condition(field, Operator::Equals, value)
    }

    pub fn not_equals(self, field: impl Into<String>, value: impl Into<String>) -> Self {
        self.condition(field, Operator::NotEquals, value)
    }

    pub fn contains(self, field: impl Into<String>, value: impl Into<String>) -> Self {
        self.condition(field, Operator::Contains, value)
    }

    pub fn starts_with(self, field: impl Into<String>, value: impl Into<String>) -> Self {
        self.condition(field, Operator::StartsWith, value)
    }

    pub fn ends_with(self, field: impl Into<String>, value: impl Into<String>) -> Self {
        self.condition(field, Operator::EndsWith, value)
    }

    pub fn on(self, field: impl Into<String>, date: impl Into<String>) -> Self {
        self.condition(field, Operator::On, date)
    }

    pub fn before(self, field: impl Into<String>, date: impl Into<String>) -> Self {
        self.condition(field, Operator::Before, date)
    }

    pub fn after(self, field: impl Into<String>, date: impl Into<String>) -> Self {
        self.condition(field, Operator::After, date)
    }

    pub fn build(self) -> SegmentCriteria {
        SegmentCriteria::new(self.conditions)
    }
}
