//! Predicate compiler — turns a validated [`ConditionGroup`] into a
//! tenant-scoped [`Predicate`] that a contact store can execute.
//!
//! String comparisons are case-insensitive for every string operator,
//! including `notEquals`, which is the exact negation of `equals` over
//! non-null values. Dates compare in UTC.

use audience_core::{Contact, ContactAttribute, ContactId, EvaluationError, OrganizationId};
use chrono::{DateTime, Utc};
use std::collections::BTreeSet;
use std::ops::Bound;
use std::sync::Arc;

use crate::criteria::{Condition, ConditionGroup};
use crate::registry::{FieldRegistry, Operator, TypedValue, ValueType};

/// How clauses combine. Only conjunction exists; mixed AND/OR grouping has
/// no defined semantics yet.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Combinator {
    All,
}

/// The contact attribute a clause reads, with its SQL column.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldRef {
    pub name: String,
    pub attribute: ContactAttribute,
    pub column: &'static str,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TextMatch {
    Equals,
    Contains,
    StartsWith,
    EndsWith,
}

impl TextMatch {
    fn test(&self, haystack: &str, needle: &str) -> bool {
        match self {
            TextMatch::Equals => haystack == needle,
            TextMatch::Contains => haystack.contains(needle),
            TextMatch::StartsWith => haystack.starts_with(needle),
            TextMatch::EndsWith => haystack.ends_with(needle),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Clause {
    /// Positive string match; null never matches. `needle` is case-folded.
    Text {
        field: FieldRef,
        mode: TextMatch,
        needle: String,
    },
    /// Field is non-null and differs from `needle` (case-folded).
    NotEquals { field: FieldRef, needle: String },
    /// Timestamp lies within the given bounds; null never matches.
    Timestamp {
        field: FieldRef,
        lower: Bound<DateTime<Utc>>,
        upper: Bound<DateTime<Utc>>,
    },
    /// Contact id is one of an explicit member list.
    Members(BTreeSet<ContactId>),
}

impl Clause {
    pub fn matches(&self, contact: &Contact) -> bool {
        match self {
            Clause::Text {
                field,
                mode,
                needle,
            } => contact
                .text(field.attribute)
                .is_some_and(|v| mode.test(&fold(v), needle)),
            Clause::NotEquals { field, needle } => contact
                .text(field.attribute)
                .is_some_and(|v| fold(v) != *needle),
            Clause::Timestamp {
                field,
                lower,
                upper,
            } => contact
                .timestamp(field.attribute)
                .is_some_and(|ts| within(ts, lower, upper)),
            Clause::Members(ids) => ids.contains(&contact.id),
        }
    }
}

fn fold(s: &str) -> String {
    s.to_lowercase()
}

fn within(ts: DateTime<Utc>, lower: &Bound<DateTime<Utc>>, upper: &Bound<DateTime<Utc>>) -> bool {
    let above = match lower {
        Bound::Included(b) => ts >= *b,
        Bound::Excluded(b) => ts > *b,
        Bound::Unbounded => true,
    };
    let below = match upper {
        Bound::Included(b) => ts <= *b,
        Bound::Excluded(b) => ts < *b,
        Bound::Unbounded => true,
    };
    above && below
}

/// Compiled, executable criteria. The organization scope is part of the
/// type: there is no way to build a `Predicate` without one, and it is
/// always checked before any clause.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Predicate {
    organization_id: OrganizationId,
    combinator: Combinator,
    clauses: Vec<Clause>,
}

impl Predicate {
    pub fn organization_id(&self) -> OrganizationId {
        self.organization_id
    }

    pub fn combinator(&self) -> Combinator {
        self.combinator
    }

    pub fn clauses(&self) -> &[Clause] {
        &self.clauses
    }

    pub fn matches(&self, contact: &Contact) -> bool {
        if contact.organization_id != self.organization_id {
            return false;
        }
        match self.combinator {
            Combinator::All => self.clauses.iter().all(|c| c.matches(contact)),
        }
    }
}

pub struct PredicateCompiler {
    registry: Arc<FieldRegistry>,
}

impl PredicateCompiler {
    pub fn new(registry: Arc<FieldRegistry>) -> Self {
        Self { registry }
    }

    /// Compile a validated group for `organization_id`. Fields are
    /// re-resolved against the registry; any drift since validation is an
    /// error, never a partially built predicate.
    pub fn compile(
        &self,
        group: &ConditionGroup,
        organization_id: OrganizationId,
    ) -> Result<Predicate, EvaluationError> {
        let clauses = group
            .iter()
            .map(|c| self.compile_condition(c))
            .collect::<Result<Vec<_>, _>>()?;

        Ok(Predicate {
            organization_id,
            combinator: Combinator::All,
            clauses,
        })
    }

    /// Predicate over an explicit member list (static segments).
    pub fn compile_members(
        &self,
        members: &[ContactId],
        organization_id: OrganizationId,
    ) -> Predicate {
        Predicate {
            organization_id,
            combinator: Combinator::All,
            clauses: vec![Clause::Members(members.iter().copied().collect())],
        }
    }

    fn compile_condition(&self, condition: &Condition) -> Result<Clause, EvaluationError> {
        let descriptor = self
            .registry
            .lookup(&condition.field.name)
            .map_err(|e| EvaluationError::UnregisteredField(e.0))?;

        let field = FieldRef {
            name: descriptor.name.clone(),
            attribute: descriptor.attribute,
            column: descriptor.column,
        };

        match (descriptor.value_type, condition.operator, &condition.value) {
            (ValueType::String, Operator::NotEquals, TypedValue::Text(v)) => Ok(Clause::NotEquals {
                field,
                needle: fold(v),
            }),
            (ValueType::String, op, TypedValue::Text(v)) => {
                let mode = match op {
                    Operator::Equals => TextMatch::Equals,
                    Operator::Contains => TextMatch::Contains,
                    Operator::StartsWith => TextMatch::StartsWith,
                    Operator::EndsWith => TextMatch::EndsWith,
                    other => return Err(mismatch(condition, other)),
                };
                Ok(Clause::Text {
                    field,
                    mode,
                    needle: fold(v),
                })
            }
            (ValueType::Date, op, TypedValue::Date(d)) => {
                let (lower, upper) = match op {
                    Operator::On => {
                        let day = d.day.ok_or_else(|| mismatch(condition, op))?;
                        let start = day
                            .and_hms_opt(0, 0, 0)
                            .map(|t| t.and_utc())
                            .ok_or_else(|| mismatch(condition, op))?;
                        // The last representable day has no successor.
                        let end = day
                            .succ_opt()
                            .and_then(|next| next.and_hms_opt(0, 0, 0))
                            .map_or(Bound::Unbounded, |t| Bound::Excluded(t.and_utc()));
                        (Bound::Included(start), end)
                    }
                    Operator::Before => (Bound::Unbounded, Bound::Excluded(d.instant)),
                    Operator::After => (Bound::Excluded(d.instant), Bound::Unbounded),
                    other => return Err(mismatch(condition, other)),
                };
                Ok(Clause::Timestamp {
                    field,
                    lower,
                    upper,
                })
            }
            (_, op, _) => Err(mismatch(condition, op)),
        }
    }
}

fn mismatch(condition: &Condition, operator: Operator) -> EvaluationError {
    EvaluationError::Internal(format!(
        "condition '{}' cannot apply '{}' to field '{}' as currently registered",
        condition.id, operator, condition.field.name
    ))
}
