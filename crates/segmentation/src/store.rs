//! Segment store — named, persisted segments and their evaluation.
//! Stored criteria are re-validated against the current registry on every
//! evaluation, never trusted as-is.

use audience_core::{
    ContactId, EvaluationError, OrganizationId, Page, SegmentError, SegmentId, SegmentResult,
    ValidationError, ValidationErrorKind,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::info;
use uuid::Uuid;

use crate::compiler::{Predicate, PredicateCompiler};
use crate::criteria::SegmentCriteria;
use crate::evaluator::{MemberPage, MembershipEvaluator};
use crate::repository::SegmentRepository;
use crate::validator::ConditionValidator;

const MAX_NAME_LEN: usize = 255;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SegmentType {
    /// Explicit member list.
    Static,
    /// Membership computed from criteria at evaluation time.
    Dynamic,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Segment {
    pub id: SegmentId,
    pub organization_id: OrganizationId,
    pub name: String,
    #[serde(rename = "type")]
    pub segment_type: SegmentType,
    /// Only meaningful for dynamic segments.
    #[serde(default)]
    pub criteria: SegmentCriteria,
    /// Only meaningful for static segments.
    #[serde(default)]
    pub members: Vec<ContactId>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewSegment {
    pub name: String,
    #[serde(rename = "type")]
    pub segment_type: SegmentType,
    #[serde(default)]
    pub criteria: SegmentCriteria,
    #[serde(default)]
    pub members: Vec<ContactId>,
}

impl NewSegment {
    pub fn dynamic(name: impl Into<String>, criteria: SegmentCriteria) -> Self {
        Self {
            name: name.into(),
            segment_type: SegmentType::Dynamic,
            criteria,
            members: Vec::new(),
        }
    }

    pub fn static_list(name: impl Into<String>, members: Vec<ContactId>) -> Self {
        Self {
            name: name.into(),
            segment_type: SegmentType::Static,
            criteria: SegmentCriteria::default(),
            members,
        }
    }
}

/// Wholesale replacement of name, criteria and/or members. Absent fields
/// are left alone; there is no per-condition patching.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SegmentUpdate {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub criteria: Option<SegmentCriteria>,
    #[serde(default)]
    pub members: Option<Vec<ContactId>>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Evaluation {
    Count,
    Members(Page),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SegmentEvaluation {
    Count(u64),
    Members(MemberPage),
}

pub struct SegmentStore {
    repository: Arc<dyn SegmentRepository>,
    validator: Arc<ConditionValidator>,
    compiler: Arc<PredicateCompiler>,
    evaluator: Arc<MembershipEvaluator>,
}

impl SegmentStore {
    pub fn new(
        repository: Arc<dyn SegmentRepository>,
        validator: Arc<ConditionValidator>,
        compiler: Arc<PredicateCompiler>,
        evaluator: Arc<MembershipEvaluator>,
    ) -> Self {
        Self {
            repository,
            validator,
            compiler,
            evaluator,
        }
    }

    pub fn create(&self, organization_id: OrganizationId, new: NewSegment) -> SegmentResult<Segment> {
        let name = validate_name(&new.name)?;
        if new.segment_type == SegmentType::Dynamic {
            self.validator.validate(&new.criteria.conditions)?;
        }

        let now = Utc::now();
        let segment = Segment {
            id: Uuid::new_v4(),
            organization_id,
            name,
            segment_type: new.segment_type,
            criteria: new.criteria,
            members: new.members,
            created_at: now,
            updated_at: now,
        };
        self.repository.insert(segment.clone())?;

        info!(
            organization_id = %organization_id,
            segment_id = %segment.id,
            segment_type = ?segment.segment_type,
            "Segment created"
        );
        Ok(segment)
    }

    pub fn get(&self, organization_id: OrganizationId, id: SegmentId) -> SegmentResult<Segment> {
        self.repository
            .get(organization_id, id)?
            .ok_or(SegmentError::NotFound { segment_id: id })
    }

    pub fn list(&self, organization_id: OrganizationId) -> SegmentResult<Vec<Segment>> {
        Ok(self.repository.list(organization_id)?)
    }

    pub fn update(
        &self,
        organization_id: OrganizationId,
        id: SegmentId,
        update: SegmentUpdate,
    ) -> SegmentResult<Segment> {
        let mut segment = self.get(organization_id, id)?;

        if let Some(name) = update.name {
            segment.name = validate_name(&name)?;
        }
        if let Some(criteria) = update.criteria {
            if segment.segment_type == SegmentType::Dynamic {
                self.validator.validate(&criteria.conditions)?;
            }
            segment.criteria = criteria;
        }
        if let Some(members) = update.members {
            segment.members = members;
        }
        segment.updated_at = Utc::now();

        if !self.repository.replace(segment.clone())? {
            return Err(SegmentError::NotFound { segment_id: id });
        }
        info!(organization_id = %organization_id, segment_id = %id, "Segment updated");
        Ok(segment)
    }

    /// Removes the segment record only. Contacts are untouched.
    pub fn delete(&self, organization_id: OrganizationId, id: SegmentId) -> SegmentResult<()> {
        if !self.repository.remove(organization_id, id)? {
            return Err(SegmentError::NotFound { segment_id: id });
        }
        info!(organization_id = %organization_id, segment_id = %id, "Segment deleted");
        Ok(())
    }

    pub fn evaluate(
        &self,
        organization_id: OrganizationId,
        id: SegmentId,
        evaluation: Evaluation,
    ) -> SegmentResult<SegmentEvaluation> {
        let segment = self.get(organization_id, id)?;
        let predicate = self.predicate_for(&segment)?;
        match evaluation {
            Evaluation::Count => Ok(SegmentEvaluation::Count(self.evaluator.count(&predicate)?)),
            Evaluation::Members(page) => Ok(SegmentEvaluation::Members(
                self.evaluator.materialize(&predicate, page)?,
            )),
        }
    }

    pub fn count(&self, organization_id: OrganizationId, id: SegmentId) -> SegmentResult<u64> {
        let segment = self.get(organization_id, id)?;
        let predicate = self.predicate_for(&segment)?;
        Ok(self.evaluator.count(&predicate)?)
    }

    pub fn members(
        &self,
        organization_id: OrganizationId,
        id: SegmentId,
        page: Page,
    ) -> SegmentResult<MemberPage> {
        let segment = self.get(organization_id, id)?;
        let predicate = self.predicate_for(&segment)?;
        self.evaluator.materialize(&predicate, page)
    }

    /// Rebuild the predicate for a stored segment. Criteria that no longer
    /// validate are an evaluation failure, not an empty match.
    pub fn predicate_for(&self, segment: &Segment) -> SegmentResult<Predicate> {
        match segment.segment_type {
            SegmentType::Static => Ok(self
                .compiler
                .compile_members(&segment.members, segment.organization_id)),
            SegmentType::Dynamic => {
                let group = self
                    .validator
                    .revalidate(&segment.criteria.conditions)
                    .map_err(|e| {
                        tracing::error!(
                            segment_id = %segment.id,
                            error = %e,
                            "Stored criteria failed re-validation"
                        );
                        metrics::counter!("segments.evaluation_errors").increment(1);
                        EvaluationError::StaleCriteria(e)
                    })?;
                Ok(self.compiler.compile(&group, segment.organization_id)?)
            }
        }
    }
}

fn validate_name(name: &str) -> Result<String, ValidationError> {
    let trimmed = name.trim();
    if trimmed.is_empty() {
        return Err(ValidationError::new(ValidationErrorKind::InvalidName(
            "name must not be empty".into(),
        )));
    }
    if trimmed.chars().count() > MAX_NAME_LEN {
        return Err(ValidationError::new(ValidationErrorKind::InvalidName(format!(
            "name exceeds {MAX_NAME_LEN} characters"
        ))));
    }
    Ok(trimmed.to_string())
}
