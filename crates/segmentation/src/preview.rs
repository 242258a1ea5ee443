//! Preview service — ephemeral evaluation of criteria that are still
//! being authored. Nothing is persisted.

use audience_core::{OrganizationId, Page, SegmentResult};
use std::sync::Arc;
use tracing::debug;

use crate::compiler::{Predicate, PredicateCompiler};
use crate::criteria::RawCondition;
use crate::evaluator::{MemberPage, MembershipEvaluator};
use crate::validator::ConditionValidator;

pub struct PreviewService {
    validator: Arc<ConditionValidator>,
    compiler: Arc<PredicateCompiler>,
    evaluator: Arc<MembershipEvaluator>,
}

impl PreviewService {
    pub fn new(
        validator: Arc<ConditionValidator>,
        compiler: Arc<PredicateCompiler>,
        evaluator: Arc<MembershipEvaluator>,
    ) -> Self {
        Self {
            validator,
            compiler,
            evaluator,
        }
    }

    pub fn validate_and_compile(
        &self,
        conditions: &[RawCondition],
        organization_id: OrganizationId,
    ) -> SegmentResult<Predicate> {
        let group = self.validator.validate(conditions)?;
        Ok(self.compiler.compile(&group, organization_id)?)
    }

    /// Number of contacts the criteria would match right now.
    pub fn preview(
        &self,
        conditions: &[RawCondition],
        organization_id: OrganizationId,
    ) -> SegmentResult<u64> {
        let predicate = self.validate_and_compile(conditions, organization_id)?;
        let count = self.evaluator.count(&predicate)?;
        metrics::counter!("segments.preview").increment(1);
        debug!(organization_id = %organization_id, conditions = conditions.len(), count, "Preview evaluated");
        Ok(count)
    }

    /// Sample of the contacts the criteria would match.
    pub fn preview_members(
        &self,
        conditions: &[RawCondition],
        organization_id: OrganizationId,
        page: Page,
    ) -> SegmentResult<MemberPage> {
        let predicate = self.validate_and_compile(conditions, organization_id)?;
        self.evaluator.materialize(&predicate, page)
    }
}
