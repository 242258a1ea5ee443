//! Tenant resolution — maps the caller's API key to the organization every
//! segmentation call is scoped to. Organization ids are never read from
//! request bodies or paths.

use audience_core::config::TenantsConfig;
use audience_core::OrganizationId;
use axum::async_trait;
use axum::extract::FromRequestParts;
use axum::http::request::Parts;
use axum::http::StatusCode;
use axum::Json;
use std::collections::HashMap;

use crate::rest::{AppState, ErrorResponse};

pub const API_KEY_HEADER: &str = "x-api-key";

#[derive(Debug, Clone, Default)]
pub struct TenantResolver {
    keys: HashMap<String, OrganizationId>,
}

impl TenantResolver {
    pub fn from_config(config: &TenantsConfig) -> Self {
        Self {
            keys: config
                .api_keys
                .iter()
                .map(|(key, org)| (key.clone(), OrganizationId::new(*org)))
                .collect(),
        }
    }

    pub fn with_key(mut self, key: impl Into<String>, organization_id: OrganizationId) -> Self {
        self.keys.insert(key.into(), organization_id);
        self
    }

    pub fn resolve(&self, api_key: &str) -> Option<OrganizationId> {
        self.keys.get(api_key).copied()
    }
}

/// Extractor yielding the resolved organization of the caller.
#[derive(Debug, Clone, Copy)]
pub struct Tenant(pub OrganizationId);

#[async_trait]
impl FromRequestParts<AppState> for Tenant {
    type Rejection = (StatusCode, Json<ErrorResponse>);

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        parts
            .headers
            .get(API_KEY_HEADER)
            .and_then(|v| v.to_str().ok())
            .and_then(|key| state.tenants.resolve(key))
            .map(Tenant)
            .ok_or_else(|| {
                metrics::counter!("api.unauthorized").increment(1);
                (
                    StatusCode::UNAUTHORIZED,
                    Json(ErrorResponse {
                        error: "unauthorized".to_string(),
                        message: "missing or unknown API key".to_string(),
                        condition_id: None,
                    }),
                )
            })
    }
}
