//! HTTP boundary tests driving the router in-process.

use audience_api::rest::{CountResponse, ErrorResponse};
use audience_api::{router, AppState, TenantResolver};
use audience_core::config::SegmentsConfig;
use audience_core::{Contact, OrganizationId};
use audience_segmentation::{
    CriteriaBuilder, FieldRegistry, InMemoryContactStore, InMemorySegmentRepository, NewSegment,
    SegmentationEngine,
};
use axum::body::Body;
use axum::http::{Method, Request, StatusCode};
use axum::Router;
use chrono::{TimeZone, Utc};
use serde_json::{json, Value};
use std::sync::Arc;
use std::time::Instant;
use tower::ServiceExt;

const KEY_A: &str = "key-a";
const KEY_B: &str = "key-b";

fn app() -> Router {
    let org_a = OrganizationId::random();
    let org_b = OrganizationId::random();

    let contacts = Arc::new(InMemoryContactStore::new());
    let mut a = Contact::new(org_a, Utc.with_ymd_and_hms(2024, 1, 5, 0, 0, 0).unwrap());
    a.email = Some("a@x.com".into());
    a.company_name = Some("Acme".into());
    let mut b = Contact::new(org_a, Utc.with_ymd_and_hms(2024, 2, 1, 0, 0, 0).unwrap());
    b.email = Some("b@y.com".into());
    contacts.extend([a, b]);

    let engine = SegmentationEngine::new(
        &SegmentsConfig::default(),
        Arc::new(FieldRegistry::contacts()),
        contacts,
        Arc::new(InMemorySegmentRepository::new()),
    );

    router(AppState {
        engine: Arc::new(engine),
        tenants: Arc::new(
            TenantResolver::default()
                .with_key(KEY_A, org_a)
                .with_key(KEY_B, org_b),
        ),
        node_id: "test".into(),
        start_time: Instant::now(),
    })
}

async fn call(app: &Router, method: Method, uri: &str, key: Option<&str>, body: Option<Value>) -> (StatusCode, Value) {
    let mut builder = Request::builder().method(method).uri(uri);
    if let Some(key) = key {
        builder = builder.header("x-api-key", key);
    }
    let request = match body {
        Some(json) => builder
            .header("content-type", "application/json")
            .body(Body::from(json.to_string()))
            .unwrap(),
        None => builder.body(Body::empty()).unwrap(),
    };

    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let value = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap()
    };
    (status, value)
}

#[tokio::test]
async fn test_preview_counts() {
    let app = app();
    let body = json!({"conditions": [
        {"id": "c1", "field": "email", "operator": "contains", "value": "x.com", "logicalOperator": null}
    ]});
    let (status, value) = call(&app, Method::POST, "/v1/segments/preview", Some(KEY_A), Some(body)).await;
    assert_eq!(status, StatusCode::OK);
    let count: CountResponse = serde_json::from_value(value).unwrap();
    assert_eq!(count.count, 1);
}

#[tokio::test]
async fn test_invalid_criteria_is_bad_request() {
    let app = app();
    let body = json!({"conditions": [
        {"id": "c9", "field": "email", "operator": "greaterThan", "value": "x"}
    ]});
    let (status, value) = call(&app, Method::POST, "/v1/segments/preview", Some(KEY_A), Some(body)).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    let err: ErrorResponse = serde_json::from_value(value).unwrap();
    assert_eq!(err.condition_id.as_deref(), Some("c9"));

    let (status, _) = call(&app, Method::POST, "/v1/segments/validate", Some(KEY_A), Some(json!({"conditions": []}))).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_unknown_key_is_unauthorized() {
    let app = app();
    let (status, _) = call(&app, Method::GET, "/v1/segments", None, None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    let (status, _) = call(&app, Method::GET, "/v1/segments", Some("nope"), None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_segment_lifecycle() {
    let app = app();
    let body = json!({
        "name": "Not Acme",
        "type": "dynamic",
        "criteria": {"conditions": [
            {"id": "c1", "field": "companyName", "operator": "notEquals", "value": "Acme"}
        ]}
    });
    let (status, created) = call(&app, Method::POST, "/v1/segments", Some(KEY_A), Some(body)).await;
    assert_eq!(status, StatusCode::CREATED);
    let id = created["id"].as_str().unwrap().to_string();

    let (status, count) = call(&app, Method::GET, &format!("/v1/segments/{id}/count"), Some(KEY_A), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(count["count"], 0);

    let update = json!({"criteria": {"conditions": [
        {"id": "c1", "field": "createdAt", "operator": "after", "value": "2024-01-01"}
    ]}});
    let (status, updated) = call(&app, Method::PUT, &format!("/v1/segments/{id}"), Some(KEY_A), Some(update)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(updated["name"], "Not Acme");

    let (status, page) = call(&app, Method::GET, &format!("/v1/segments/{id}/members?limit=1"), Some(KEY_A), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(page["total"], 2);
    assert_eq!(page["ids"].as_array().unwrap().len(), 1);
    assert_eq!(page["nextOffset"], 1);

    let (status, _) = call(&app, Method::GET, &format!("/v1/segments/{id}/members?limit=5000"), Some(KEY_A), None).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, err) = call(&app, Method::GET, &format!("/v1/segments/{id}/members?limit=0"), Some(KEY_A), None).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(err["message"], "page limit must be at least 1");

    let (status, _) = call(&app, Method::DELETE, &format!("/v1/segments/{id}"), Some(KEY_A), None).await;
    assert_eq!(status, StatusCode::NO_CONTENT);
    let (status, _) = call(&app, Method::GET, &format!("/v1/segments/{id}"), Some(KEY_A), None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_other_tenant_sees_not_found() {
    let app = app();
    let body = json!({
        "name": "Everyone",
        "type": "dynamic",
        "criteria": {"conditions": [
            {"id": "c1", "field": "email", "operator": "contains", "value": "@"}
        ]}
    });
    let (_, created) = call(&app, Method::POST, "/v1/segments", Some(KEY_A), Some(body)).await;
    let id = created["id"].as_str().unwrap().to_string();

    for uri in [format!("/v1/segments/{id}"), format!("/v1/segments/{id}/count")] {
        let (status, value) = call(&app, Method::GET, &uri, Some(KEY_B), None).await;
        assert_eq!(status, StatusCode::NOT_FOUND, "{uri}");
        assert_eq!(value["error"], "segment_not_found");
    }
    let (status, list) = call(&app, Method::GET, "/v1/segments", Some(KEY_B), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(list, json!([]));
}

#[tokio::test]
async fn test_fields_listing() {
    let app = app();
    let (status, fields) = call(&app, Method::GET, "/v1/segments/fields", Some(KEY_A), None).await;
    assert_eq!(status, StatusCode::OK);
    let created_at = fields
        .as_array()
        .unwrap()
        .iter()
        .find(|f| f["name"] == "createdAt")
        .unwrap();
    assert_eq!(created_at["valueType"], "date");
    assert_eq!(created_at["allowedOperators"], json!(["on", "before", "after"]));
}

#[tokio::test]
async fn test_stale_segment_is_internal_error() {
    let org = OrganizationId::random();
    let contacts = Arc::new(InMemoryContactStore::new());
    let repository = Arc::new(InMemorySegmentRepository::new());

    let authoring = SegmentationEngine::new(
        &SegmentsConfig::default(),
        Arc::new(FieldRegistry::contacts()),
        contacts.clone(),
        repository.clone(),
    );
    let segment = authoring
        .segments()
        .create(org, NewSegment::dynamic("CTOs", CriteriaBuilder::new().equals("jobTitle", "CTO").build()))
        .unwrap();

    // Same stored segments, served by a registry that has since dropped the field.
    let serving = SegmentationEngine::new(
        &SegmentsConfig::default(),
        Arc::new(FieldRegistry::contacts().without_field("jobTitle")),
        contacts,
        repository,
    );
    let app = router(AppState {
        engine: Arc::new(serving),
        tenants: Arc::new(TenantResolver::default().with_key(KEY_A, org)),
        node_id: "test".into(),
        start_time: Instant::now(),
    });

    for uri in [
        format!("/v1/segments/{}/count", segment.id),
        format!("/v1/segments/{}/members", segment.id),
    ] {
        let (status, value) = call(&app, Method::GET, &uri, Some(KEY_A), None).await;
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR, "{uri}");
        let err: ErrorResponse = serde_json::from_value(value).unwrap();
        assert_eq!(err.error, "evaluation_failed");
        assert_eq!(err.message, "Segment could not be evaluated");
        assert!(!err.message.contains("jobTitle"));
        assert!(err.condition_id.is_none());
    }

    // The record itself is still readable.
    let (status, _) = call(&app, Method::GET, &format!("/v1/segments/{}", segment.id), Some(KEY_A), None).await;
    assert_eq!(status, StatusCode::OK);
}
