//! Field type registry — the single source of truth for which contact
//! fields can be filtered, what type their values have, and which
//! operators apply to them.

use audience_core::ContactAttribute;
use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ValueType {
    String,
    Date,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Operator {
    Equals,
    NotEquals,
    Contains,
    StartsWith,
    EndsWith,
    On,
    Before,
    After,
}

const STRING_OPERATORS: &[Operator] = &[
    Operator::Equals,
    Operator::Contains,
    Operator::StartsWith,
    Operator::EndsWith,
    Operator::NotEquals,
];

const DATE_OPERATORS: &[Operator] = &[Operator::On, Operator::Before, Operator::After];

impl Operator {
    pub fn as_str(&self) -> &'static str {
        match self {
            Operator::Equals => "equals",
            Operator::NotEquals => "notEquals",
            Operator::Contains => "contains",
            Operator::StartsWith => "startsWith",
            Operator::EndsWith => "endsWith",
            Operator::On => "on",
            Operator::Before => "before",
            Operator::After => "after",
        }
    }
}

impl fmt::Display for Operator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("unknown operator '{0}'")]
pub struct UnknownOperator(pub String);

impl FromStr for Operator {
    type Err = UnknownOperator;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        [STRING_OPERATORS, DATE_OPERATORS]
            .concat()
            .into_iter()
            .find(|op| op.as_str() == s)
            .ok_or_else(|| UnknownOperator(s.to_string()))
    }
}

/// A date value parsed from criteria. `instant` is the boundary for
/// `before`/`after`. `day` is set only when the value was a plain calendar
/// date, and is the only form `on` accepts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DateValue {
    pub day: Option<NaiveDate>,
    pub instant: DateTime<Utc>,
}

/// A condition value after parsing through its field's value type.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TypedValue {
    Text(String),
    Date(DateValue),
}

impl ValueType {
    pub fn allowed_operators(&self) -> &'static [Operator] {
        match self {
            ValueType::String => STRING_OPERATORS,
            ValueType::Date => DATE_OPERATORS,
        }
    }

    pub fn allows(&self, operator: Operator) -> bool {
        self.allowed_operators().contains(&operator)
    }

    /// Parse a raw criteria value. Returns `None` if the value does not
    /// fit this type; callers must reject rather than skip.
    pub fn parse(&self, raw: &str) -> Option<TypedValue> {
        match self {
            ValueType::String => Some(TypedValue::Text(raw.to_string())),
            ValueType::Date => parse_date(raw.trim()).map(TypedValue::Date),
        }
    }
}

/// Accepts `YYYY-MM-DD` (midnight UTC), RFC 3339, or a naive
/// `YYYY-MM-DDTHH:MM:SS` taken as UTC. Date-times carry no calendar day:
/// a time or offset would make the day ambiguous.
fn parse_date(raw: &str) -> Option<DateValue> {
    if let Ok(day) = NaiveDate::parse_from_str(raw, "%Y-%m-%d") {
        return Some(DateValue {
            day: Some(day),
            instant: day.and_hms_opt(0, 0, 0)?.and_utc(),
        });
    }
    if let Ok(instant) = DateTime::parse_from_rfc3339(raw) {
        return Some(DateValue {
            day: None,
            instant: instant.with_timezone(&Utc),
        });
    }
    for format in ["%Y-%m-%dT%H:%M:%S", "%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S"] {
        if let Ok(naive) = NaiveDateTime::parse_from_str(raw, format) {
            return Some(DateValue {
                day: None,
                instant: naive.and_utc(),
            });
        }
    }
    None
}

/// Declaration of one filterable field.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FieldDescriptor {
    pub name: String,
    pub value_type: ValueType,
    #[serde(skip)]
    pub attribute: ContactAttribute,
    /// Column name used when rendering predicates to SQL.
    #[serde(skip)]
    pub column: &'static str,
}

impl FieldDescriptor {
    pub fn new(
        name: impl Into<String>,
        value_type: ValueType,
        attribute: ContactAttribute,
        column: &'static str,
    ) -> Self {
        Self {
            name: name.into(),
            value_type,
            attribute,
            column,
        }
    }

    pub fn allowed_operators(&self) -> &'static [Operator] {
        self.value_type.allowed_operators()
    }
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("field '{0}' is not registered")]
pub struct FieldNotFound(pub String);

/// Registry entry as served to authoring clients.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FieldDescription {
    pub name: String,
    pub value_type: ValueType,
    pub allowed_operators: Vec<Operator>,
}

/// Immutable once built; share it behind an `Arc`.
#[derive(Debug, Clone)]
pub struct FieldRegistry {
    fields: BTreeMap<String, FieldDescriptor>,
}

impl FieldRegistry {
    pub fn empty() -> Self {
        Self {
            fields: BTreeMap::new(),
        }
    }

    /// The standard contact fields.
    pub fn contacts() -> Self {
        [
            ("email", ValueType::String, ContactAttribute::Email, "email"),
            ("firstName", ValueType::String, ContactAttribute::FirstName, "first_name"),
            ("lastName", ValueType::String, ContactAttribute::LastName, "last_name"),
            ("companyName", ValueType::String, ContactAttribute::CompanyName, "company_name"),
            ("jobTitle", ValueType::String, ContactAttribute::JobTitle, "job_title"),
            ("source", ValueType::String, ContactAttribute::Source, "source"),
            ("createdAt", ValueType::Date, ContactAttribute::CreatedAt, "created_at"),
        ]
        .into_iter()
        .fold(Self::empty(), |registry, (name, value_type, attribute, column)| {
            registry.with_field(FieldDescriptor::new(name, value_type, attribute, column))
        })
    }

    pub fn with_field(mut self, descriptor: FieldDescriptor) -> Self {
        self.fields.insert(descriptor.name.clone(), descriptor);
        self
    }

    pub fn without_field(mut self, name: &str) -> Self {
        self.fields.remove(name);
        self
    }

    pub fn lookup(&self, name: &str) -> Result<&FieldDescriptor, FieldNotFound> {
        self.fields
            .get(name)
            .ok_or_else(|| FieldNotFound(name.to_string()))
    }

    pub fn describe(&self) -> Vec<FieldDescription> {
        self.fields
            .values()
            .map(|f| FieldDescription {
                name: f.name.clone(),
                value_type: f.value_type,
                allowed_operators: f.allowed_operators().to_vec(),
            })
            .collect()
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }
}

impl Default for FieldRegistry {
    fn default() -> Self {
        Self::contacts()
    }
}
