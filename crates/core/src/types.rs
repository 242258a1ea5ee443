use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use uuid::Uuid;

pub type ContactId = Uuid;
pub type SegmentId = Uuid;

/// Tenant identifier. Only ever produced by the tenant resolver upstream of
/// the segmentation core, never parsed out of criteria content.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct OrganizationId(Uuid);

impl OrganizationId {
    pub fn new(id: Uuid) -> Self {
        Self(id)
    }

    pub fn random() -> Self {
        Self(Uuid::new_v4())
    }

    pub fn as_uuid(&self) -> Uuid {
        self.0
    }
}

impl fmt::Display for OrganizationId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

/// A contact record owned by exactly one organization.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Contact {
    pub id: ContactId,
    pub organization_id: OrganizationId,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub first_name: Option<String>,
    #[serde(default)]
    pub last_name: Option<String>,
    #[serde(default)]
    pub company_name: Option<String>,
    #[serde(default)]
    pub job_title: Option<String>,
    #[serde(default)]
    pub source: Option<String>,
    pub created_at: DateTime<Utc>,
    /// Free-form fields; never filterable.
    #[serde(default)]
    pub custom_fields: HashMap<String, serde_json::Value>,
}

/// Typed attribute slots of a [`Contact`] that filtering can address.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ContactAttribute {
    Email,
    FirstName,
    LastName,
    CompanyName,
    JobTitle,
    Source,
    CreatedAt,
}

impl Contact {
    pub fn new(organization_id: OrganizationId, created_at: DateTime<Utc>) -> Self {
        Self {
            id: Uuid::new_v4(),
            organization_id,
            email: None,
            first_name: None,
            last_name: None,
            company_name: None,
            job_title: None,
            source: None,
            created_at,
            custom_fields: HashMap::new(),
        }
    }

    /// Value of a string attribute. Timestamp attributes yield `None`.
    pub fn text(&self, attribute: ContactAttribute) -> Option<&str> {
        match attribute {
            ContactAttribute::Email => self.email.as_deref(),
            ContactAttribute::FirstName => self.first_name.as_deref(),
            ContactAttribute::LastName => self.last_name.as_deref(),
            ContactAttribute::CompanyName => self.company_name.as_deref(),
            ContactAttribute::JobTitle => self.job_title.as_deref(),
            ContactAttribute::Source => self.source.as_deref(),
            ContactAttribute::CreatedAt => None,
        }
    }

    /// Value of a timestamp attribute. String attributes yield `None`.
    pub fn timestamp(&self, attribute: ContactAttribute) -> Option<DateTime<Utc>> {
        match attribute {
            ContactAttribute::CreatedAt => Some(self.created_at),
            _ => None,
        }
    }
}

/// A window over an ordered membership list.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Page {
    pub offset: usize,
    pub limit: usize,
}

impl Page {
    pub fn new(offset: usize, limit: usize) -> Self {
        Self { offset, limit }
    }

    pub fn first(limit: usize) -> Self {
        Self { offset: 0, limit }
    }
}
