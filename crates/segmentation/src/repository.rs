//! Segment persistence, keyed by organization and segment id.

use audience_core::{OrganizationId, SegmentId};
use dashmap::DashMap;

use crate::contacts::StoreError;
use crate::store::Segment;

pub trait SegmentRepository: Send + Sync {
    fn insert(&self, segment: Segment) -> Result<(), StoreError>;

    /// `None` when the id is unknown or belongs to another organization.
    fn get(&self, organization_id: OrganizationId, id: SegmentId) -> Result<Option<Segment>, StoreError>;

    fn list(&self, organization_id: OrganizationId) -> Result<Vec<Segment>, StoreError>;

    /// Overwrite an existing record. Returns `false` if there was none.
    fn replace(&self, segment: Segment) -> Result<bool, StoreError>;

    fn remove(&self, organization_id: OrganizationId, id: SegmentId) -> Result<bool, StoreError>;
}

/// Segment records backed by DashMap.
#[derive(Default)]
pub struct InMemorySegmentRepository {
    segments: DashMap<SegmentId, Segment>,
}

impl InMemorySegmentRepository {
    pub fn new() -> Self {
        Self::default()
    }
}

impl SegmentRepository for InMemorySegmentRepository {
    fn insert(&self, segment: Segment) -> Result<(), StoreError> {
        self.segments.insert(segment.id, segment);
        Ok(())
    }

    fn get(&self, organization_id: OrganizationId, id: SegmentId) -> Result<Option<Segment>, StoreError> {
        Ok(self
            .segments
            .get(&id)
            .filter(|s| s.organization_id == organization_id)
            .map(|s| s.value().clone()))
    }

    fn list(&self, organization_id: OrganizationId) -> Result<Vec<Segment>, StoreError> {
        let mut segments: Vec<_> = self
            .segments
            .iter()
            .filter(|s| s.organization_id == organization_id)
            .map(|s| s.value().clone())
            .collect();
        segments.sort_by_key(|s| (s.created_at, s.id));
        Ok(segments)
    }

    fn replace(&self, segment: Segment) -> Result<bool, StoreError> {
        match self.segments.get_mut(&segment.id) {
            Some(mut entry) if entry.organization_id == segment.organization_id => {
                *entry = segment;
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    fn remove(&self, organization_id: OrganizationId, id: SegmentId) -> Result<bool, StoreError> {
        Ok(self
            .segments
            .remove_if(&id, |_, s| s.organization_id == organization_id)
            .is_some())
    }
}
