//! Membership lifecycle handlers
//!
//! Listing, inviting, accepting, revoking, and role changes. The invariant
//! work (last-admin protection, token single-use) lives in the repository;
//! handlers translate HTTP in and out and emit audit events.

use crate::auth::models::AuthUser;
use crate::error::{HttpAppError, ValidatedJson};
use crate::middleware::audit;
use crate::state::AppState;
use crate::tenancy::CurrentTenant;
use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Json},
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tempo_core::models::{Membership, MembershipRole};
use utoipa::ToSchema;
use uuid::Uuid;
use validator::Validate;

#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct InviteMemberRequest {
    #[schema(example = "ada@example.com")]
    #[validate(email)]
    pub email: String,
    /// Role the invitee will hold once they accept
    pub role: MembershipRole,
}

/// Returned once at invitation time; the token is not retrievable later.
#[derive(Debug, Serialize, ToSchema)]
pub struct InvitationResponse {
    pub membership: Membership,
    /// Single-use invitation token - share it with the invitee securely
    pub token: String,
}

#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct AcceptInvitationRequest {
    #[validate(length(min = 32, max = 128))]
    pub token: String,
}

#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct ChangeRoleRequest {
    pub role: MembershipRole,
}

/// List the organization's members
#[utoipa::path(
    get,
    path = "/api/v1/organizations/{org}/members",
    tag = "members",
    params(("org" = String, Path, description = "Organization UUID or slug")),
    responses(
        (status = 200, description = "Active and invited members"),
        (status = 403, description = "Not a member", body = crate::error::ErrorResponse)
    )
)]
#[tracing::instrument(skip(state, tenant))]
pub async fn list_members(
    State(state): State<Arc<AppState>>,
    CurrentTenant(tenant): CurrentTenant,
) -> Result<impl IntoResponse, HttpAppError> {
    let members = state
        .memberships
        .list_members(tenant.organization_id)
        .await
        .map_err(HttpAppError::from)?;

    Ok(Json(members))
}

/// Invite a member by email
#[utoipa::path(
    post,
    path = "/api/v1/organizations/{org}/members/invitations",
    tag = "members",
    params(("org" = String, Path, description = "Organization UUID or slug")),
    request_body = InviteMemberRequest,
    responses(
        (status = 201, description = "Invitation issued", body = InvitationResponse),
        (status = 403, description = "Admin role required", body = crate::error::ErrorResponse),
        (status = 409, description = "Already a member or already invited", body = crate::error::ErrorResponse)
    )
)]
#[tracing::instrument(skip(state, tenant, request))]
pub async fn invite_member(
    State(state): State<Arc<AppState>>,
    CurrentTenant(tenant): CurrentTenant,
    ValidatedJson(request): ValidatedJson<InviteMemberRequest>,
) -> Result<impl IntoResponse, HttpAppError> {
    let invitation = state
        .memberships
        .invite_member(
            tenant.organization_id,
            tenant.user_id,
            request.email.trim(),
            request.role,
            state.config.invitation_expiry_days,
        )
        .await
        .map_err(HttpAppError::from)?;

    audit::log_member_invited(
        tenant.organization_id,
        tenant.user_id,
        invitation.membership.id,
        &invitation.membership.role.to_string(),
    );

    Ok((
        StatusCode::CREATED,
        Json(InvitationResponse {
            token: invitation.token,
            membership: invitation.membership,
        }),
    ))
}

/// Accept an invitation by token
///
/// Organization-independent: the token alone identifies the invitation, so
/// this route sits outside tenancy resolution.
#[utoipa::path(
    post,
    path = "/api/v1/members/invitations/accept",
    tag = "members",
    request_body = AcceptInvitationRequest,
    responses(
        (status = 200, description = "Membership activated", body = Membership),
        (status = 400, description = "Invalid or expired token", body = crate::error::ErrorResponse),
        (status = 409, description = "Already an active member", body = crate::error::ErrorResponse)
    )
)]
#[tracing::instrument(skip(state, auth_user, request))]
pub async fn accept_invitation(
    State(state): State<Arc<AppState>>,
    auth_user: AuthUser,
    ValidatedJson(request): ValidatedJson<AcceptInvitationRequest>,
) -> Result<impl IntoResponse, HttpAppError> {
    let membership = state
        .memberships
        .accept_invitation(request.token.trim(), auth_user.user_id())
        .await
        .map_err(HttpAppError::from)?;

    audit::log_invitation_accepted(
        membership.organization_id,
        auth_user.user_id(),
        membership.id,
    );

    Ok(Json(membership))
}

/// Revoke a membership
#[utoipa::path(
    delete,
    path = "/api/v1/organizations/{org}/members/{membership}",
    tag = "members",
    params(
        ("org" = String, Path, description = "Organization UUID or slug"),
        ("membership" = Uuid, Path, description = "Membership ID")
    ),
    responses(
        (status = 200, description = "Membership revoked", body = Membership),
        (status = 403, description = "Admin role required", body = crate::error::ErrorResponse),
        (status = 409, description = "Would leave the organization without an active admin", body = crate::error::ErrorResponse)
    )
)]
#[tracing::instrument(skip(state, tenant))]
pub async fn revoke_membership(
    State(state): State<Arc<AppState>>,
    CurrentTenant(tenant): CurrentTenant,
    Path((_org, membership_id)): Path<(String, Uuid)>,
) -> Result<impl IntoResponse, HttpAppError> {
    let membership = state
        .memberships
        .revoke_membership(tenant.organization_id, tenant.user_id, membership_id)
        .await
        .map_err(HttpAppError::from)?;

    audit::log_membership_revoked(tenant.organization_id, tenant.user_id, membership.id);

    Ok(Json(membership))
}

/// Change a member's role
#[utoipa::path(
    put,
    path = "/api/v1/organizations/{org}/members/{membership}/role",
    tag = "members",
    params(
        ("org" = String, Path, description = "Organization UUID or slug"),
        ("membership" = Uuid, Path, description = "Membership ID")
    ),
    request_body = ChangeRoleRequest,
    responses(
        (status = 200, description = "Membership with its new role", body = Membership),
        (status = 403, description = "Admin role required", body = crate::error::ErrorResponse),
        (status = 409, description = "Would demote the last active admin", body = crate::error::ErrorResponse)
    )
)]
#[tracing::instrument(skip(state, tenant, request))]
pub async fn change_role(
    State(state): State<Arc<AppState>>,
    CurrentTenant(tenant): CurrentTenant,
    Path((_org, membership_id)): Path<(String, Uuid)>,
    ValidatedJson(request): ValidatedJson<ChangeRoleRequest>,
) -> Result<impl IntoResponse, HttpAppError> {
    let membership = state
        .memberships
        .change_role(
            tenant.organization_id,
            tenant.user_id,
            membership_id,
            request.role,
        )
        .await
        .map_err(HttpAppError::from)?;

    audit::log_membership_role_changed(
        tenant.organization_id,
        tenant.user_id,
        membership.id,
        &membership.role.to_string(),
    );

    Ok(Json(membership))
}
