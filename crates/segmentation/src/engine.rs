//! Wires registry, validator, compiler and evaluator together and exposes
//! the operations collaborators use.

use audience_core::config::SegmentsConfig;
use audience_core::{OrganizationId, Page, SegmentId, SegmentResult};
use std::sync::Arc;

use crate::compiler::{Predicate, PredicateCompiler};
use crate::contacts::ContactStore;
use crate::criteria::RawCondition;
use crate::evaluator::MembershipEvaluator;
use crate::preview::PreviewService;
use crate::registry::FieldRegistry;
use crate::repository::SegmentRepository;
use crate::store::{Evaluation, SegmentEvaluation, SegmentStore};
use crate::validator::ConditionValidator;

pub struct SegmentationEngine {
    registry: Arc<FieldRegistry>,
    preview: PreviewService,
    segments: SegmentStore,
    default_page_size: usize,
}

impl SegmentationEngine {
    pub fn new(
        config: &SegmentsConfig,
        registry: Arc<FieldRegistry>,
        contacts: Arc<dyn ContactStore>,
        repository: Arc<dyn SegmentRepository>,
    ) -> Self {
        let validator = Arc::new(ConditionValidator::new(registry.clone(), config.max_conditions));
        let compiler = Arc::new(PredicateCompiler::new(registry.clone()));
        let evaluator = Arc::new(MembershipEvaluator::new(contacts, config.max_page_size));

        Self {
            registry,
            preview: PreviewService::new(validator.clone(), compiler.clone(), evaluator.clone()),
            segments: SegmentStore::new(repository, validator, compiler, evaluator),
            default_page_size: config.default_page_size.min(config.max_page_size),
        }
    }

    pub fn registry(&self) -> &FieldRegistry {
        &self.registry
    }

    pub fn preview(&self) -> &PreviewService {
        &self.preview
    }

    pub fn segments(&self) -> &SegmentStore {
        &self.segments
    }

    /// Page starting at `offset` with the configured default size.
    pub fn default_page(&self, offset: usize) -> Page {
        Page::new(offset, self.default_page_size)
    }

    pub fn validate_and_compile(
        &self,
        conditions: &[RawCondition],
        organization_id: OrganizationId,
    ) -> SegmentResult<Predicate> {
        self.preview.validate_and_compile(conditions, organization_id)
    }

    pub fn preview_count(
        &self,
        conditions: &[RawCondition],
        organization_id: OrganizationId,
    ) -> SegmentResult<u64> {
        self.preview.preview(conditions, organization_id)
    }

    pub fn evaluate_segment(
        &self,
        segment_id: SegmentId,
        organization_id: OrganizationId,
        evaluation: Evaluation,
    ) -> SegmentResult<SegmentEvaluation> {
        self.segments.evaluate(organization_id, segment_id, evaluation)
    }
}
