//! Client (customer) handlers
//!
//! Same shape as the project handlers: scoped statements on the request's
//! row-security session connection.

use crate::error::{HttpAppError, ValidatedJson};
use crate::guards::check_permission;
use crate::tenancy::{CurrentTenant, SessionHandle};
use axum::{
    http::StatusCode,
    response::{IntoResponse, Json},
};
use serde::Deserialize;
use tempo_core::models::{Capability, Client};
use tempo_core::AppError;
use tempo_db::ScopedQuery;
use utoipa::ToSchema;
use validator::Validate;

#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct CreateClientRequest {
    #[schema(example = "Globex Inc")]
    #[validate(length(min = 1, max = 200))]
    pub name: String,
    #[validate(length(max = 2000))]
    pub notes: Option<String>,
}

/// List the organization's clients
#[utoipa::path(
    get,
    path = "/api/v1/clients",
    tag = "clients",
    responses(
        (status = 200, description = "Clients of the resolved organization", body = [Client]),
        (status = 403, description = "No resolved organization", body = crate::error::ErrorResponse)
    )
)]
#[tracing::instrument(skip(tenant, session))]
pub async fn list_clients(
    CurrentTenant(tenant): CurrentTenant,
    session: SessionHandle,
) -> Result<impl IntoResponse, HttpAppError> {
    let mut guard = session.lock().await;
    let session = guard.as_mut().ok_or_else(closed_session)?;

    let clients = ScopedQuery::select::<Client>(Some(&tenant))
        .order_by("name")
        .fetch_all(session.executor())
        .await
        .map_err(HttpAppError::from)?;

    Ok(Json(clients))
}

/// Create a client
#[utoipa::path(
    post,
    path = "/api/v1/clients",
    tag = "clients",
    request_body = CreateClientRequest,
    responses(
        (status = 201, description = "Client created", body = Client),
        (status = 403, description = "Missing the edit-data capability", body = crate::error::ErrorResponse)
    )
)]
#[tracing::instrument(skip(tenant, session, request))]
pub async fn create_client(
    CurrentTenant(tenant): CurrentTenant,
    session: SessionHandle,
    ValidatedJson(request): ValidatedJson<CreateClientRequest>,
) -> Result<impl IntoResponse, HttpAppError> {
    check_permission(&tenant, Capability::EditData).map_err(HttpAppError::from)?;

    let mut guard = session.lock().await;
    let session = guard.as_mut().ok_or_else(closed_session)?;

    let client = ScopedQuery::insert::<Client>(Some(&tenant))
        .map_err(HttpAppError::from)?
        .value("name", request.name.trim().to_string())
        .map_err(HttpAppError::from)?
        .value("notes", request.notes.clone())
        .map_err(HttpAppError::from)?
        .fetch_one(session.executor())
        .await
        .map_err(HttpAppError::from)?;

    Ok((StatusCode::CREATED, Json(client)))
}

fn closed_session() -> HttpAppError {
    HttpAppError(AppError::Internal(
        "row-security session already closed".to_string(),
    ))
}
