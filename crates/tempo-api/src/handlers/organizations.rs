//! Organization lifecycle handlers
//!
//! Create, fetch, configure, rename, and soft-delete organizations. Routes
//! carrying `{org}` run behind tenancy resolution; the admin-only ones are
//! additionally guarded at the router level.

use crate::auth::models::AuthUser;
use crate::error::{HttpAppError, ValidatedJson};
use crate::middleware::audit;
use crate::state::AppState;
use crate::tenancy::CurrentTenant;
use axum::{
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Json},
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tempo_core::models::{Membership, Organization};
use tempo_core::AppError;
use tempo_db::OrganizationSettingsPatch;
use utoipa::ToSchema;
use validator::Validate;

#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct CreateOrganizationRequest {
    /// Display name; the slug is derived from it
    #[schema(example = "Acme Corp")]
    #[validate(length(min = 1, max = 120))]
    pub name: String,
}

/// Returned once on creation: the organization plus the founding admin
/// membership.
#[derive(Debug, Serialize, ToSchema)]
pub struct CreateOrganizationResponse {
    pub organization: Organization,
    pub membership: Membership,
}

#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct UpdateSettingsRequest {
    #[validate(length(min = 1, max = 120))]
    pub name: Option<String>,
    #[validate(length(min = 1, max = 40))]
    pub plan: Option<String>,
    #[validate(length(min = 1, max = 64))]
    pub timezone: Option<String>,
    #[validate(length(min = 3, max = 3))]
    pub currency: Option<String>,
    #[validate(length(min = 1, max = 32))]
    pub date_format: Option<String>,
    #[validate(range(min = 1))]
    pub max_members: Option<i32>,
    #[validate(range(min = 1))]
    pub max_projects: Option<i32>,
}

#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct RenameSlugRequest {
    /// Desired slug text; normalized and deduplicated like at creation
    #[schema(example = "acme-europe")]
    #[validate(length(min = 1, max = 80))]
    pub slug: String,
}

/// Create an organization with the caller as founding admin
#[utoipa::path(
    post,
    path = "/api/v1/organizations",
    tag = "organizations",
    request_body = CreateOrganizationRequest,
    responses(
        (status = 201, description = "Organization created", body = CreateOrganizationResponse),
        (status = 409, description = "Slug already taken", body = crate::error::ErrorResponse),
        (status = 400, description = "Validation error", body = crate::error::ErrorResponse)
    )
)]
#[tracing::instrument(skip(state, auth_user, request))]
pub async fn create_organization(
    State(state): State<Arc<AppState>>,
    auth_user: AuthUser,
    ValidatedJson(request): ValidatedJson<CreateOrganizationRequest>,
) -> Result<impl IntoResponse, HttpAppError> {
    let name = request.name.trim();
    if name.is_empty() {
        return Err(HttpAppError::from(AppError::Validation(
            "name is required".to_string(),
        )));
    }

    let (organization, membership) = state
        .organizations
        .create_organization(name, auth_user.user_id())
        .await
        .map_err(HttpAppError::from)?;

    audit::log_organization_created(organization.id, auth_user.user_id(), &organization.slug);

    Ok((
        StatusCode::CREATED,
        Json(CreateOrganizationResponse {
            organization,
            membership,
        }),
    ))
}

/// List the organizations the caller belongs to
#[utoipa::path(
    get,
    path = "/api/v1/organizations",
    tag = "organizations",
    responses(
        (status = 200, description = "Organizations with an active membership", body = [Organization])
    )
)]
#[tracing::instrument(skip(state, auth_user))]
pub async fn list_my_organizations(
    State(state): State<Arc<AppState>>,
    auth_user: AuthUser,
) -> Result<impl IntoResponse, HttpAppError> {
    let organizations = state
        .organizations
        .list_for_user(auth_user.user_id())
        .await
        .map_err(HttpAppError::from)?;

    Ok(Json(organizations))
}

/// Fetch the resolved organization
#[utoipa::path(
    get,
    path = "/api/v1/organizations/{org}",
    tag = "organizations",
    params(("org" = String, Path, description = "Organization UUID or slug")),
    responses(
        (status = 200, description = "Organization", body = Organization),
        (status = 403, description = "Not a member", body = crate::error::ErrorResponse),
        (status = 404, description = "Unknown organization", body = crate::error::ErrorResponse)
    )
)]
#[tracing::instrument(skip(tenant))]
pub async fn get_organization(
    CurrentTenant(tenant): CurrentTenant,
) -> Result<impl IntoResponse, HttpAppError> {
    // Resolution already loaded and validated the organization.
    Ok(Json(tenant.organization))
}

/// Update organization settings
#[utoipa::path(
    patch,
    path = "/api/v1/organizations/{org}/settings",
    tag = "organizations",
    params(("org" = String, Path, description = "Organization UUID or slug")),
    request_body = UpdateSettingsRequest,
    responses(
        (status = 200, description = "Updated organization", body = Organization),
        (status = 403, description = "Admin role required", body = crate::error::ErrorResponse)
    )
)]
#[tracing::instrument(skip(state, tenant, request))]
pub async fn update_settings(
    State(state): State<Arc<AppState>>,
    CurrentTenant(tenant): CurrentTenant,
    ValidatedJson(request): ValidatedJson<UpdateSettingsRequest>,
) -> Result<impl IntoResponse, HttpAppError> {
    let patch = OrganizationSettingsPatch {
        name: request.name,
        plan: request.plan,
        timezone: request.timezone,
        currency: request.currency,
        date_format: request.date_format,
        max_members: request.max_members,
        max_projects: request.max_projects,
    };

    let organization = state
        .organizations
        .update_settings(tenant.organization_id, &patch)
        .await
        .map_err(HttpAppError::from)?;

    Ok(Json(organization))
}

/// Rename the organization slug
#[utoipa::path(
    post,
    path = "/api/v1/organizations/{org}/rename-slug",
    tag = "organizations",
    params(("org" = String, Path, description = "Organization UUID or slug")),
    request_body = RenameSlugRequest,
    responses(
        (status = 200, description = "Organization with its new slug", body = Organization),
        (status = 403, description = "Admin role required", body = crate::error::ErrorResponse)
    )
)]
#[tracing::instrument(skip(state, tenant, request))]
pub async fn rename_slug(
    State(state): State<Arc<AppState>>,
    CurrentTenant(tenant): CurrentTenant,
    ValidatedJson(request): ValidatedJson<RenameSlugRequest>,
) -> Result<impl IntoResponse, HttpAppError> {
    let organization = state
        .organizations
        .rename_slug(tenant.organization_id, request.slug.trim())
        .await
        .map_err(HttpAppError::from)?;

    Ok(Json(organization))
}

/// Soft-delete the organization
#[utoipa::path(
    delete,
    path = "/api/v1/organizations/{org}",
    tag = "organizations",
    params(("org" = String, Path, description = "Organization UUID or slug")),
    responses(
        (status = 204, description = "Organization soft-deleted"),
        (status = 403, description = "Admin role required", body = crate::error::ErrorResponse)
    )
)]
#[tracing::instrument(skip(state, tenant))]
pub async fn delete_organization(
    State(state): State<Arc<AppState>>,
    CurrentTenant(tenant): CurrentTenant,
) -> Result<impl IntoResponse, HttpAppError> {
    state
        .organizations
        .soft_delete(tenant.organization_id)
        .await
        .map_err(HttpAppError::from)?;

    audit::log_organization_deleted(tenant.organization_id, tenant.user_id);

    Ok(StatusCode::NO_CONTENT)
}
