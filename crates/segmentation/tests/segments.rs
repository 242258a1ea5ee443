//! End-to-end segmentation behaviour over the in-memory stores.

use audience_core::config::SegmentsConfig;
use audience_core::{
    Contact, EvaluationError, OrganizationId, Page, SegmentError, ValidationError,
    ValidationErrorKind,
};
use audience_segmentation::{
    CriteriaBuilder, Evaluation, FieldRegistry, InMemoryContactStore, InMemorySegmentRepository,
    NewSegment, RawCondition, SegmentCriteria, SegmentEvaluation, SegmentRepository, Segment,
    SegmentationEngine,
};
use chrono::{TimeZone, Utc};
use std::sync::Arc;

struct World {
    org: OrganizationId,
    contacts: Arc<InMemoryContactStore>,
    repository: Arc<InMemorySegmentRepository>,
    engine: SegmentationEngine,
}

impl World {
    fn with_registry(&self, registry: FieldRegistry) -> SegmentationEngine {
        SegmentationEngine::new(
            &SegmentsConfig::default(),
            Arc::new(registry),
            self.contacts.clone(),
            self.repository.clone(),
        )
    }
}

/// The two contacts from the reference scenarios.
fn world() -> World {
    let org = OrganizationId::random();
    let contacts = Arc::new(InMemoryContactStore::new());

    let mut a = Contact::new(org, Utc.with_ymd_and_hms(2024, 1, 5, 0, 0, 0).unwrap());
    a.email = Some("a@x.com".into());
    a.company_name = Some("Acme".into());

    let mut b = Contact::new(org, Utc.with_ymd_and_hms(2024, 2, 1, 0, 0, 0).unwrap());
    b.email = Some("b@y.com".into());

    contacts.extend([a, b]);

    let repository = Arc::new(InMemorySegmentRepository::new());
    let engine = SegmentationEngine::new(
        &SegmentsConfig::default(),
        Arc::new(FieldRegistry::contacts()),
        contacts.clone(),
        repository.clone(),
    );
    World {
        org,
        contacts,
        repository,
        engine,
    }
}

fn members_of(engine: &SegmentationEngine, conditions: &[RawCondition], org: OrganizationId) -> Vec<uuid::Uuid> {
    engine
        .preview()
        .preview_members(conditions, org, Page::first(1000))
        .unwrap()
        .ids
}

#[test]
fn test_not_equals_excludes_nulls() {
    let w = world();
    let criteria = CriteriaBuilder::new().not_equals("companyName", "Acme").build();
    assert_eq!(w.engine.preview_count(&criteria.conditions, w.org).unwrap(), 0);
}

#[test]
fn test_contains_matches_substring() {
    let w = world();
    let criteria = CriteriaBuilder::new().contains("email", "x.com").build();
    let ids = members_of(&w.engine, &criteria.conditions, w.org);
    assert_eq!(ids.len(), 1);

    let criteria = CriteriaBuilder::new().equals("email", "a@x.com").build();
    assert_eq!(members_of(&w.engine, &criteria.conditions, w.org), ids);
}

#[test]
fn test_date_range_matches_both() {
    let w = world();
    let criteria = CriteriaBuilder::new()
        .after("createdAt", "2024-01-01")
        .before("createdAt", "2024-03-01")
        .build();
    assert_eq!(w.engine.preview_count(&criteria.conditions, w.org).unwrap(), 2);
}

#[test]
fn test_on_matches_late_evening_but_not_next_midnight() {
    let w = world();
    let mut late = Contact::new(w.org, Utc.with_ymd_and_hms(2024, 1, 5, 23, 59, 0).unwrap());
    late.source = Some("late".into());
    let mut next = Contact::new(w.org, Utc.with_ymd_and_hms(2024, 1, 6, 0, 0, 0).unwrap());
    next.source = Some("next".into());
    let (late_id, next_id) = (late.id, next.id);
    w.contacts.extend([late, next]);

    let criteria = CriteriaBuilder::new().on("createdAt", "2024-01-05").build();
    let ids = members_of(&w.engine, &criteria.conditions, w.org);
    assert!(ids.contains(&late_id));
    assert!(!ids.contains(&next_id));
    // Contact "a" was created at midnight on the same day.
    assert_eq!(ids.len(), 2);
}

#[test]
fn test_illegal_operator_rejected() {
    let w = world();
    let conditions = vec![RawCondition::new("bad", "email", "greaterThan", "x")];
    let err = w.engine.preview_count(&conditions, w.org).unwrap_err();
    match err {
        SegmentError::Validation(ValidationError { condition_id, .. }) => {
            assert_eq!(condition_id.as_deref(), Some("bad"))
        }
        other => panic!("expected validation error, got {other:?}"),
    }
}

#[test]
fn test_empty_and_unknown_field_rejected() {
    let w = world();
    assert!(matches!(
        w.engine.preview_count(&[], w.org),
        Err(SegmentError::Validation(ValidationError {
            kind: ValidationErrorKind::EmptyConditions,
            ..
        }))
    ));

    let conditions = vec![
        RawCondition::new("ok", "email", "contains", "x"),
        RawCondition::new("c-42", "shoeSize", "equals", "9"),
    ];
    let err = w.engine.preview_count(&conditions, w.org).unwrap_err();
    assert!(matches!(
        err,
        SegmentError::Validation(ValidationError { condition_id: Some(ref id), kind: ValidationErrorKind::UnknownField(_) }) if id == "c-42"
    ));
}

#[test]
fn test_removed_field_fails_evaluation() {
    let w = world();
    let criteria = CriteriaBuilder::new().equals("jobTitle", "CTO").build();
    let segment = w
        .engine
        .segments()
        .create(w.org, NewSegment::dynamic("CTOs", criteria))
        .unwrap();

    let trimmed = w.with_registry(FieldRegistry::contacts().without_field("jobTitle"));
    for evaluation in [Evaluation::Count, Evaluation::Members(Page::first(10))] {
        let err = trimmed
            .evaluate_segment(segment.id, w.org, evaluation)
            .unwrap_err();
        assert!(
            matches!(err, SegmentError::Evaluation(EvaluationError::StaleCriteria(_))),
            "{err:?}"
        );
    }
}

#[test]
fn test_count_agrees_with_materialize() {
    let w = world();
    w.contacts.extend((0..250).map(|i| {
        let mut c = Contact::new(w.org, Utc.with_ymd_and_hms(2024, 1, 1 + (i % 28), 9, 0, 0).unwrap());
        c.email = Some(format!("user{i}@{}.com", if i % 3 == 0 { "x" } else { "z" }));
        c
    }));

    let cases = [
        CriteriaBuilder::new().contains("email", "x.com").build(),
        CriteriaBuilder::new().before("createdAt", "2024-01-15").build(),
        CriteriaBuilder::new().not_equals("companyName", "Acme").build(),
        CriteriaBuilder::new().ends_with("email", ".com").after("createdAt", "2024-01-20").build(),
    ];
    for criteria in cases {
        let count = w.engine.preview_count(&criteria.conditions, w.org).unwrap();

        let mut total = 0u64;
        let mut offset = Some(0);
        while let Some(o) = offset {
            let page = w
                .engine
                .preview()
                .preview_members(&criteria.conditions, w.org, Page::new(o, 40))
                .unwrap();
            assert_eq!(page.total, count);
            total += page.ids.len() as u64;
            offset = page.next_offset;
        }
        assert_eq!(total, count);
    }
}

#[test]
fn test_preview_is_idempotent() {
    let w = world();
    let criteria = CriteriaBuilder::new().contains("email", "@").build();
    let first = w.engine.preview_count(&criteria.conditions, w.org).unwrap();
    let second = w.engine.preview_count(&criteria.conditions, w.org).unwrap();
    assert_eq!(first, 2);
    assert_eq!(first, second);
    assert!(w.repository.list(w.org).unwrap().is_empty());
}

#[test]
fn test_foreign_segment_is_not_found() {
    let w = world();
    let other_org = OrganizationId::random();
    let segment = w
        .engine
        .segments()
        .create(w.org, NewSegment::dynamic("Everyone", CriteriaBuilder::new().contains("email", "@").build()))
        .unwrap();

    assert!(matches!(
        w.engine.evaluate_segment(segment.id, other_org, Evaluation::Count),
        Err(SegmentError::NotFound { .. })
    ));
    assert!(matches!(
        w.engine.segments().get(other_org, segment.id),
        Err(SegmentError::NotFound { .. })
    ));
    assert!(w.engine.segments().list(other_org).unwrap().is_empty());
    assert_eq!(
        w.engine.evaluate_segment(segment.id, w.org, Evaluation::Count).unwrap(),
        SegmentEvaluation::Count(2)
    );
}

#[test]
fn test_other_organizations_contacts_never_counted() {
    let w = world();
    let mut foreign = Contact::new(OrganizationId::random(), Utc::now());
    foreign.email = Some("c@x.com".into());
    w.contacts.insert(foreign);

    let criteria = CriteriaBuilder::new().contains("email", "x.com").build();
    assert_eq!(w.engine.preview_count(&criteria.conditions, w.org).unwrap(), 1);
}

#[test]
fn test_persisted_round_trip_matches_in_memory() {
    let w = world();
    let criteria = CriteriaBuilder::new()
        .ends_with("email", ".com")
        .on("createdAt", "2024-02-01")
        .build();
    let expected = w
        .engine
        .preview()
        .preview_members(&criteria.conditions, w.org, Page::first(100))
        .unwrap();

    let created = w
        .engine
        .segments()
        .create(w.org, NewSegment::dynamic("February", criteria.clone()))
        .unwrap();

    // Through the persisted JSON shape and back.
    let stored = serde_json::to_string(&created).unwrap();
    let reloaded: Segment = serde_json::from_str(&stored).unwrap();
    assert_eq!(reloaded.criteria, criteria);
    w.repository.replace(reloaded).unwrap();

    let evaluated = w
        .engine
        .evaluate_segment(created.id, w.org, Evaluation::Members(Page::first(100)))
        .unwrap();
    assert_eq!(evaluated, SegmentEvaluation::Members(expected));
}

#[test]
fn test_criteria_json_from_client() {
    let w = world();
    let criteria: SegmentCriteria = serde_json::from_str(
        r#"{"conditions": [
            {"id": "1", "field": "email", "operator": "startsWith", "value": "B@", "logicalOperator": null},
            {"id": "2", "field": "createdAt", "operator": "after", "value": "2024-01-31", "logicalOperator": "OR"}
        ]}"#,
    )
    .unwrap();
    assert_eq!(w.engine.preview_count(&criteria.conditions, w.org).unwrap(), 1);
}
