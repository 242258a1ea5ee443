//! Contact store: executes a compiled predicate against the contacts of
//! the predicate's organization.

use audience_core::{Contact, ContactId, EvaluationError, OrganizationId, Page, SegmentError};
use parking_lot::RwLock;
use std::collections::{BTreeMap, HashMap};
use thiserror::Error;

use crate::compiler::Predicate;

#[derive(Error, Debug)]
#[error("contact store failure: {0}")]
pub struct StoreError(pub String);

impl From<StoreError> for EvaluationError {
    fn from(e: StoreError) -> Self {
        EvaluationError::Storage(e.0)
    }
}

impl From<StoreError> for SegmentError {
    fn from(e: StoreError) -> Self {
        SegmentError::Evaluation(e.into())
    }
}

/// What a single query should return besides the total.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QueryWindow {
    CountOnly,
    Page(Page),
}

/// Result of one query. `total` and `ids` come from the same read.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct QueryResult {
    pub total: u64,
    pub ids: Vec<ContactId>,
}

/// Implementations must evaluate `total` and `ids` against one consistent
/// snapshot, returning ids ordered by contact id.
pub trait ContactStore: Send + Sync {
    fn query(&self, predicate: &Predicate, window: QueryWindow) -> Result<QueryResult, StoreError>;
}

/// In-process contact store, partitioned by organization.
#[derive(Default)]
pub struct InMemoryContactStore {
    contacts: RwLock<HashMap<OrganizationId, BTreeMap<ContactId, Contact>>>,
}

impl InMemoryContactStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&self, contact: Contact) {
        self.contacts
            .write()
            .entry(contact.organization_id)
            .or_default()
            .insert(contact.id, contact);
    }

    pub fn extend(&self, contacts: impl IntoIterator<Item = Contact>) {
        let mut guard = self.contacts.write();
        for contact in contacts {
            guard
                .entry(contact.organization_id)
                .or_default()
                .insert(contact.id, contact);
        }
    }

    pub fn remove(&self, organization_id: OrganizationId, id: ContactId) -> Option<Contact> {
        self.contacts.write().get_mut(&organization_id)?.remove(&id)
    }

    pub fn len(&self) -> usize {
        self.contacts.read().values().map(BTreeMap::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl ContactStore for InMemoryContactStore {
    fn query(&self, predicate: &Predicate, window: QueryWindow) -> Result<QueryResult, StoreError> {
        let guard = self.contacts.read();
        let Some(partition) = guard.get(&predicate.organization_id()) else {
            return Ok(QueryResult::default());
        };

        let matching = partition.values().filter(|c| predicate.matches(c));
        match window {
            QueryWindow::CountOnly => Ok(QueryResult {
                total: matching.count() as u64,
                ids: Vec::new(),
            }),
            QueryWindow::Page(page) => {
                let mut total = 0u64;
                let mut ids = Vec::with_capacity(page.limit.min(partition.len()));
                for (idx, contact) in matching.enumerate() {
                    if idx >= page.offset && ids.len() < page.limit {
                        ids.push(contact.id);
                    }
                    total += 1;
                }
                Ok(QueryResult { total, ids })
            }
        }
    }
}
