//! Membership evaluator — runs a predicate as a count or as a page of
//! member ids. Both go through the same store query.

use audience_core::{ContactId, EvaluationError, Page, SegmentResult, ValidationError, ValidationErrorKind};
use serde::Serialize;
use std::sync::Arc;
use std::time::Instant;
use tracing::error;

use crate::compiler::Predicate;
use crate::contacts::{ContactStore, QueryResult, QueryWindow};

/// One page of materialized membership.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MemberPage {
    pub ids: Vec<ContactId>,
    /// Size of the full membership, not of this page.
    pub total: u64,
    pub offset: usize,
    pub next_offset: Option<usize>,
}

pub struct MembershipEvaluator {
    store: Arc<dyn ContactStore>,
    max_page_size: usize,
}

impl MembershipEvaluator {
    pub fn new(store: Arc<dyn ContactStore>, max_page_size: usize) -> Self {
        Self {
            store,
            max_page_size,
        }
    }

    pub fn max_page_size(&self) -> usize {
        self.max_page_size
    }

    pub fn count(&self, predicate: &Predicate) -> Result<u64, EvaluationError> {
        self.run(predicate, QueryWindow::CountOnly, "count")
            .map(|r| r.total)
    }

    /// Materialize one page. Empty pages and pages larger than the
    /// configured cap are rejected; there is no way to fetch an unbounded
    /// membership.
    pub fn materialize(&self, predicate: &Predicate, page: Page) -> SegmentResult<MemberPage> {
        if page.limit == 0 {
            return Err(ValidationError::new(ValidationErrorKind::EmptyPage).into());
        }
        if page.limit > self.max_page_size {
            return Err(ValidationError::new(ValidationErrorKind::PageTooLarge {
                requested: page.limit,
                max: self.max_page_size,
            })
            .into());
        }

        let result = self.run(predicate, QueryWindow::Page(page), "materialize")?;
        let end = page.offset.saturating_add(result.ids.len());
        let next_offset = (!result.ids.is_empty() && (end as u64) < result.total).then_some(end);

        Ok(MemberPage {
            ids: result.ids,
            total: result.total,
            offset: page.offset,
            next_offset,
        })
    }

    fn run(
        &self,
        predicate: &Predicate,
        window: QueryWindow,
        mode: &'static str,
    ) -> Result<QueryResult, EvaluationError> {
        let start = Instant::now();
        metrics::counter!("segments.evaluations", "mode" => mode).increment(1);

        let result = self.store.query(predicate, window).map_err(|e| {
            error!(
                organization_id = %predicate.organization_id(),
                mode,
                error = %e,
                "Contact store query failed"
            );
            metrics::counter!("segments.evaluation_errors").increment(1);
            EvaluationError::from(e)
        });

        metrics::histogram!("segments.evaluation_latency_us")
            .record(start.elapsed().as_micros() as f64);
        result
    }
}
