//! Organization resolution and the per-request row-security session.
//!
//! `resolve_tenant` runs after authentication on every organization-facing
//! route. It resolves which organization the request operates on, validates
//! the caller's membership, and inserts a read-only `TenantContext` into
//! request extensions. `tenant_session` additionally brackets the handler in
//! a pinned database connection carrying the row-security session variables;
//! it is layered only onto routes that touch policy-covered tables.

use crate::auth::models::AuthUser;
use crate::constants::{ORGANIZATION_HEADER, ORGANIZATION_QUERY_PARAM};
use crate::error::HttpAppError;
use crate::state::AppState;
use axum::{
    extract::{FromRequestParts, Request, State},
    http::{request::Parts, HeaderMap},
    middleware::Next,
    response::{IntoResponse, Response},
};
use axum::extract::RawPathParams;
use std::sync::Arc;
use tempo_core::models::{Membership, Organization, OrganizationStatus};
use tempo_core::{AppError, TenantContext};
use tempo_db::TenantSession;
use tokio::sync::{Mutex, MutexGuard};

/// Extractor wrapper for the resolved tenant context.
///
/// Handlers take `CurrentTenant` as an argument; if the tenancy middleware
/// did not run (or did not resolve), extraction rejects with `Forbidden`
/// rather than letting the handler proceed without a tenant.
#[derive(Debug, Clone)]
pub struct CurrentTenant(pub TenantContext);

impl<S> FromRequestParts<S> for CurrentTenant
where
    S: Send + Sync,
{
    type Rejection = HttpAppError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .extensions
            .get::<TenantContext>()
            .cloned()
            .map(CurrentTenant)
            .ok_or_else(|| {
                HttpAppError(AppError::Forbidden(
                    "tenant context was not resolved for this request".to_string(),
                ))
            })
    }
}

/// Shared handle to the request's row-security session.
///
/// The middleware keeps a clone so it can close the session after the
/// handler finishes; the handler borrows the pinned connection through
/// `lock()`.
#[derive(Clone)]
pub struct SessionHandle(Arc<Mutex<Option<TenantSession>>>);

impl SessionHandle {
    fn new(session: TenantSession) -> Self {
        Self(Arc::new(Mutex::new(Some(session))))
    }

    pub async fn lock(&self) -> MutexGuard<'_, Option<TenantSession>> {
        self.0.lock().await
    }

    async fn take(&self) -> Option<TenantSession> {
        self.0.lock().await.take()
    }
}

impl<S> FromRequestParts<S> for SessionHandle
where
    S: Send + Sync,
{
    type Rejection = HttpAppError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts.extensions.get::<SessionHandle>().cloned().ok_or_else(|| {
            HttpAppError(AppError::Internal(
                "row-security session was not established for this route".to_string(),
            ))
        })
    }
}

/// Resolve the organization for this request and validate membership.
pub async fn resolve_tenant(
    State(state): State<Arc<AppState>>,
    params: RawPathParams,
    mut request: Request,
    next: Next,
) -> Response {
    let auth_user = match request.extensions().get::<AuthUser>() {
        Some(user) => user.clone(),
        None => {
            return HttpAppError(AppError::Unauthorized(
                "Missing authentication context".to_string(),
            ))
            .into_response()
        }
    };

    let path_org = params
        .iter()
        .find(|(name, _)| *name == "org")
        .map(|(_, value)| value.to_string());
    let explicit = explicit_identifier(
        path_org.as_deref(),
        request.headers(),
        request.uri().query(),
    );

    let (organization, membership) =
        match resolve_organization(&state, &auth_user, explicit).await {
            Ok(resolved) => resolved,
            Err(e) => return HttpAppError(e).into_response(),
        };

    // Activity tracking happens off the request path.
    let memberships = state.memberships.clone();
    let membership_id = membership.id;
    tokio::spawn(async move {
        let _ = memberships.touch_last_active(membership_id).await;
    });

    let context = TenantContext {
        organization_id: organization.id,
        membership_id: membership.id,
        role: membership.role,
        user_id: auth_user.user_id(),
        is_superadmin: auth_user.is_superadmin(),
        organization,
    };

    request.extensions_mut().insert(context);
    next.run(request).await
}

/// Bracket the rest of the request in a row-security session for the
/// resolved organization. Must be layered inside `resolve_tenant`.
///
/// The superadmin flag is never applied here: organization-facing routes run
/// with plain membership credentials even for platform superadmins. The
/// bypass surface under `/api/v1/admin` does not use this middleware at all.
pub async fn tenant_session(
    State(state): State<Arc<AppState>>,
    mut request: Request,
    next: Next,
) -> Response {
    let context = match request.extensions().get::<TenantContext>() {
        Some(ctx) => ctx.clone(),
        None => {
            return HttpAppError(AppError::Forbidden(
                "tenant context was not resolved for this request".to_string(),
            ))
            .into_response()
        }
    };

    let session =
        match TenantSession::begin(&state.pool, Some(context.organization_id), false).await {
            Ok(session) => session,
            Err(e) => return HttpAppError(e).into_response(),
        };

    let handle = SessionHandle::new(session);
    request.extensions_mut().insert(handle.clone());

    let response = next.run(request).await;

    // Close unconditionally, success or error. A failure to reset is logged
    // and absorbed; the pool's release hook resets the variables again.
    if let Some(session) = handle.take().await {
        if let Err(e) = session.finish().await {
            tracing::error!(error = %e, "Failed to close row-security session");
        }
    }

    response
}

async fn resolve_organization(
    state: &AppState,
    auth_user: &AuthUser,
    explicit: Option<String>,
) -> Result<(Organization, Membership), AppError> {
    let organization = match explicit {
        Some(ident) => state
            .organizations
            .find_by_identifier(&ident)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Organization '{}' not found", ident)))?,
        None => {
            let memberships = state.memberships.list_for_user(auth_user.user_id()).await?;
            let membership = sole_membership(&memberships)?;
            state
                .organizations
                .find_by_id(membership.organization_id)
                .await?
                .ok_or_else(|| {
                    AppError::Forbidden(format!(
                        "user {} has no active membership in a live organization",
                        auth_user.user_id()
                    ))
                })?
        }
    };

    if organization.status == OrganizationStatus::Suspended {
        return Err(AppError::Forbidden(format!(
            "organization {} is suspended",
            organization.id
        )));
    }

    // Membership is required even for platform superadmins; the bypass
    // surface is mounted separately.
    let membership = state
        .memberships
        .find_active(organization.id, auth_user.user_id())
        .await?
        .ok_or_else(|| {
            AppError::Forbidden(format!(
                "user {} has no active membership in organization {}",
                auth_user.user_id(),
                organization.id
            ))
        })?;

    Ok((organization, membership))
}

/// Pick the explicit organization identifier, if any. Path segment first
/// (it names the resource itself), then header, then query parameter.
fn explicit_identifier(
    path_org: Option<&str>,
    headers: &HeaderMap,
    query: Option<&str>,
) -> Option<String> {
    if let Some(org) = path_org {
        if !org.is_empty() {
            return Some(org.to_string());
        }
    }

    if let Some(value) = headers.get(ORGANIZATION_HEADER).and_then(|h| h.to_str().ok()) {
        let trimmed = value.trim();
        if !trimmed.is_empty() {
            return Some(trimmed.to_string());
        }
    }

    query.and_then(|q| query_param(q, ORGANIZATION_QUERY_PARAM))
}

/// Minimal query-string lookup. Organization identifiers are UUIDs or slugs,
/// neither of which requires percent-decoding.
fn query_param(query: &str, key: &str) -> Option<String> {
    query.split('&').find_map(|pair| {
        let (k, v) = pair.split_once('=')?;
        if k == key && !v.is_empty() {
            Some(v.to_string())
        } else {
            None
        }
    })
}

/// Fallback when no identifier was given: exactly one active membership
/// resolves to its organization. None is a denial, several are ambiguous.
fn sole_membership(memberships: &[Membership]) -> Result<&Membership, AppError> {
    match memberships {
        [] => Err(AppError::Forbidden(
            "caller has no active memberships".to_string(),
        )),
        [one] => Ok(one),
        _ => Err(AppError::AmbiguousOrganization),
    }
}
