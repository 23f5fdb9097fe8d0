//! Cross-organization admin handlers
//!
//! Mounted under `/api/v1/admin` behind `require_superadmin`; no tenant
//! resolution runs here and every request is audit-logged by the guard.

use crate::error::HttpAppError;
use crate::state::AppState;
use axum::{
    extract::{Query, State},
    response::{IntoResponse, Json},
};
use serde::Deserialize;
use std::sync::Arc;
use tempo_core::models::Organization;
use utoipa::IntoParams;

#[derive(Debug, Deserialize, IntoParams)]
pub struct ListOrganizationsQuery {
    #[serde(default = "default_limit")]
    pub limit: i64,
    #[serde(default)]
    pub offset: i64,
}

fn default_limit() -> i64 {
    50
}

/// List every organization on the platform, all statuses included
#[utoipa::path(
    get,
    path = "/api/v1/admin/organizations",
    tag = "admin",
    params(ListOrganizationsQuery),
    responses(
        (status = 200, description = "All organizations", body = [Organization]),
        (status = 403, description = "Platform superadmin required", body = crate::error::ErrorResponse)
    )
)]
#[tracing::instrument(skip(state))]
pub async fn list_organizations(
    State(state): State<Arc<AppState>>,
    Query(query): Query<ListOrganizationsQuery>,
) -> Result<impl IntoResponse, HttpAppError> {
    let limit = query.limit.clamp(1, 100);
    let offset = query.offset.max(0);

    let organizations = state
        .organizations
        .list_all(limit, offset)
        .await
        .map_err(HttpAppError::from)?;

    Ok(Json(organizations))
}
