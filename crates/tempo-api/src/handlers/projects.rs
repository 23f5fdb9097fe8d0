//! Project handlers
//!
//! All statements here run on the request's row-security session connection.
//! Listing and creation go through the scoped builder; the by-id fetch is a
//! deliberate primary-key lookup followed by `ensure_access`, the pattern
//! business code uses whenever it loads a row outside the scoped path.

use crate::error::{HttpAppError, ValidatedJson};
use crate::guards::check_permission;
use crate::middleware::audit;
use crate::tenancy::{CurrentTenant, SessionHandle};
use axum::{
    extract::Path,
    http::StatusCode,
    response::{IntoResponse, Json},
};
use serde::Deserialize;
use sqlx::Postgres;
use tempo_core::models::{Capability, Project};
use tempo_core::{ensure_access, AppError, TenantOwned};
use tempo_db::ScopedQuery;
use utoipa::ToSchema;
use uuid::Uuid;
use validator::Validate;

#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct CreateProjectRequest {
    #[schema(example = "Website relaunch")]
    #[validate(length(min = 1, max = 200))]
    pub name: String,
}

/// List the organization's projects
#[utoipa::path(
    get,
    path = "/api/v1/projects",
    tag = "projects",
    responses(
        (status = 200, description = "Projects of the resolved organization", body = [Project]),
        (status = 403, description = "No resolved organization", body = crate::error::ErrorResponse)
    )
)]
#[tracing::instrument(skip(tenant, session))]
pub async fn list_projects(
    CurrentTenant(tenant): CurrentTenant,
    session: SessionHandle,
) -> Result<impl IntoResponse, HttpAppError> {
    let mut guard = session.lock().await;
    let session = guard.as_mut().ok_or_else(closed_session)?;

    let projects = ScopedQuery::select::<Project>(Some(&tenant))
        .order_by("created_at DESC")
        .fetch_all(session.executor())
        .await
        .map_err(HttpAppError::from)?;

    Ok(Json(projects))
}

/// Create a project
#[utoipa::path(
    post,
    path = "/api/v1/projects",
    tag = "projects",
    request_body = CreateProjectRequest,
    responses(
        (status = 201, description = "Project created", body = Project),
        (status = 403, description = "Missing the manage-projects capability", body = crate::error::ErrorResponse)
    )
)]
#[tracing::instrument(skip(tenant, session, request))]
pub async fn create_project(
    CurrentTenant(tenant): CurrentTenant,
    session: SessionHandle,
    ValidatedJson(request): ValidatedJson<CreateProjectRequest>,
) -> Result<impl IntoResponse, HttpAppError> {
    check_permission(&tenant, Capability::ManageProjects).map_err(HttpAppError::from)?;

    let mut guard = session.lock().await;
    let session = guard.as_mut().ok_or_else(closed_session)?;

    let project = ScopedQuery::insert::<Project>(Some(&tenant))
        .map_err(HttpAppError::from)?
        .value("name", request.name.trim().to_string())
        .map_err(HttpAppError::from)?
        .value("archived", false)
        .map_err(HttpAppError::from)?
        .fetch_one(session.executor())
        .await
        .map_err(HttpAppError::from)?;

    Ok((StatusCode::CREATED, Json(project)))
}

/// Fetch a project by ID
#[utoipa::path(
    get,
    path = "/api/v1/projects/{id}",
    tag = "projects",
    params(("id" = Uuid, Path, description = "Project ID")),
    responses(
        (status = 200, description = "Project", body = Project),
        (status = 404, description = "Project not found", body = crate::error::ErrorResponse)
    )
)]
#[tracing::instrument(skip(tenant, session))]
pub async fn get_project(
    CurrentTenant(tenant): CurrentTenant,
    session: SessionHandle,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, HttpAppError> {
    let mut guard = session.lock().await;
    let session = guard.as_mut().ok_or_else(closed_session)?;

    // Primary-key lookup, not scoped. The row-security policy filters
    // foreign rows at the database; ensure_access re-checks the loaded row
    // in the application.
    let project = sqlx::query_as::<Postgres, Project>(&format!(
        "SELECT {} FROM {} WHERE id = $1",
        Project::SELECT_COLUMNS,
        Project::TABLE
    ))
    .bind(id)
    .fetch_optional(session.executor())
    .await
    .map_err(|e| HttpAppError::from(AppError::from(e)))?
    .ok_or_else(|| HttpAppError::from(AppError::NotFound("Project not found".to_string())))?;

    if let Err(e) = ensure_access(&tenant, &project) {
        audit::log_cross_tenant_access(
            Some(tenant.organization_id),
            Some(tenant.user_id),
            e.to_string(),
        );
        return Err(HttpAppError::from(e));
    }

    Ok(Json(project))
}

fn closed_session() -> HttpAppError {
    HttpAppError(AppError::Internal(
        "row-security session already closed".to_string(),
    ))
}
