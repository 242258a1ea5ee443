//! REST API handlers for segment authoring, persistence and evaluation.

use audience_core::{Page, SegmentError, SegmentId};
use audience_segmentation::registry::FieldDescription;
use audience_segmentation::{
    MemberPage, NewSegment, RawCondition, Segment, SegmentUpdate, SegmentationEngine,
};
use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Instant;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::error;

use crate::tenant::{Tenant, TenantResolver};

/// Shared application state for REST handlers.
#[derive(Clone)]
pub struct AppState {
    pub engine: Arc<SegmentationEngine>,
    pub tenants: Arc<TenantResolver>,
    pub node_id: String,
    pub start_time: Instant,
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/v1/segments", get(list_segments).post(create_segment))
        .route("/v1/segments/preview", post(preview))
        .route("/v1/segments/validate", post(validate))
        .route("/v1/segments/fields", get(fields))
        .route(
            "/v1/segments/:id",
            get(get_segment).put(update_segment).delete(delete_segment),
        )
        .route("/v1/segments/:id/count", get(count_segment))
        .route("/v1/segments/:id/members", get(segment_members))
        // Operational endpoints
        .route("/health", get(health_check))
        .route("/live", get(liveness))
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Maps the segmentation error taxonomy onto HTTP statuses.
pub struct ApiError(pub SegmentError);

impl From<SegmentError> for ApiError {
    fn from(e: SegmentError) -> Self {
        Self(e)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> axum::response::Response {
        let (status, body) = match &self.0 {
            SegmentError::Validation(e) => {
                metrics::counter!("api.validation_errors").increment(1);
                (
                    StatusCode::BAD_REQUEST,
                    ErrorResponse {
                        error: "invalid_criteria".to_string(),
                        message: e.kind.to_string(),
                        condition_id: e.condition_id.clone(),
                    },
                )
            }
            SegmentError::NotFound { .. } => (
                StatusCode::NOT_FOUND,
                ErrorResponse {
                    error: "segment_not_found".to_string(),
                    message: self.0.to_string(),
                    condition_id: None,
                },
            ),
            SegmentError::Evaluation(e) => {
                error!(error = %e, "Segment evaluation failed");
                metrics::counter!("api.errors").increment(1);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    ErrorResponse {
                        error: "evaluation_failed".to_string(),
                        message: "Segment could not be evaluated".to_string(),
                        condition_id: None,
                    },
                )
            }
        };
        (status, Json(body)).into_response()
    }
}

type ApiResult<T> = Result<T, ApiError>;

#[derive(Debug, Deserialize)]
pub struct ConditionsRequest {
    #[serde(default)]
    pub conditions: Vec<RawCondition>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct CountResponse {
    pub count: u64,
}

#[derive(Debug, Deserialize)]
pub struct PageParams {
    #[serde(default)]
    pub offset: usize,
    pub limit: Option<usize>,
}

/// POST /v1/segments/preview — Count matches for unsaved criteria.
pub async fn preview(
    State(state): State<AppState>,
    Tenant(org): Tenant,
    Json(request): Json<ConditionsRequest>,
) -> ApiResult<Json<CountResponse>> {
    let count = state.engine.preview_count(&request.conditions, org)?;
    Ok(Json(CountResponse { count }))
}

/// POST /v1/segments/validate — Check criteria without evaluating them.
pub async fn validate(
    State(state): State<AppState>,
    Tenant(org): Tenant,
    Json(request): Json<ConditionsRequest>,
) -> ApiResult<StatusCode> {
    state.engine.validate_and_compile(&request.conditions, org)?;
    Ok(StatusCode::NO_CONTENT)
}

/// GET /v1/segments/fields — Filterable fields and their operators.
pub async fn fields(State(state): State<AppState>, _tenant: Tenant) -> Json<Vec<FieldDescription>> {
    Json(state.engine.registry().describe())
}

/// GET /v1/segments — Segments of the caller's organization.
pub async fn list_segments(
    State(state): State<AppState>,
    Tenant(org): Tenant,
) -> ApiResult<Json<Vec<Segment>>> {
    Ok(Json(state.engine.segments().list(org)?))
}

/// POST /v1/segments — Create a segment.
pub async fn create_segment(
    State(state): State<AppState>,
    Tenant(org): Tenant,
    Json(request): Json<NewSegment>,
) -> ApiResult<(StatusCode, Json<Segment>)> {
    let segment = state.engine.segments().create(org, request)?;
    Ok((StatusCode::CREATED, Json(segment)))
}

/// GET /v1/segments/:id
pub async fn get_segment(
    State(state): State<AppState>,
    Tenant(org): Tenant,
    Path(id): Path<SegmentId>,
) -> ApiResult<Json<Segment>> {
    Ok(Json(state.engine.segments().get(org, id)?))
}

/// PUT /v1/segments/:id — Replace name, criteria and/or members.
pub async fn update_segment(
    State(state): State<AppState>,
    Tenant(org): Tenant,
    Path(id): Path<SegmentId>,
    Json(update): Json<SegmentUpdate>,
) -> ApiResult<Json<Segment>> {
    Ok(Json(state.engine.segments().update(org, id, update)?))
}

/// DELETE /v1/segments/:id
pub async fn delete_segment(
    State(state): State<AppState>,
    Tenant(org): Tenant,
    Path(id): Path<SegmentId>,
) -> ApiResult<StatusCode> {
    state.engine.segments().delete(org, id)?;
    Ok(StatusCode::NO_CONTENT)
}

/// GET /v1/segments/:id/count
pub async fn count_segment(
    State(state): State<AppState>,
    Tenant(org): Tenant,
    Path(id): Path<SegmentId>,
) -> ApiResult<Json<CountResponse>> {
    let count = state.engine.segments().count(org, id)?;
    Ok(Json(CountResponse { count }))
}

/// GET /v1/segments/:id/members?offset=&limit=
pub async fn segment_members(
    State(state): State<AppState>,
    Tenant(org): Tenant,
    Path(id): Path<SegmentId>,
    Query(params): Query<PageParams>,
) -> ApiResult<Json<MemberPage>> {
    let page = match params.limit {
        Some(limit) => Page::new(params.offset, limit),
        None => state.engine.default_page(params.offset),
    };
    Ok(Json(state.engine.segments().members(org, id, page)?))
}

/// GET /health — Health check endpoint.
pub async fn health_check(State(state): State<AppState>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy".to_string(),
        node_id: state.node_id.clone(),
        uptime_secs: state.start_time.elapsed().as_secs(),
    })
}

/// GET /live — Liveness check for Kubernetes.
pub async fn liveness() -> StatusCode {
    StatusCode::OK
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: String,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub condition_id: Option<String>,
}

#[derive(Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub node_id: String,
    pub uptime_secs: u64,
}
