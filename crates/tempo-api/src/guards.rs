//! Permission guards
//!
//! Composable checks over the authenticated user and the resolved tenant
//! context. Each guard answers one question and fails closed with an
//! explicit outcome; none of them silently grants on ambiguity.

use crate::auth::models::AuthUser;
use crate::error::HttpAppError;
use crate::middleware::audit;
use axum::{
    extract::Request,
    middleware::Next,
    response::{IntoResponse, Response},
};
use tempo_core::models::{role_capabilities, Capability, MembershipStatus};
use tempo_core::{AppError, TenantContext};

/// Require an organization admin in the resolved context. A platform
/// superadmin passes without the role; that pass is audit-logged as a
/// bypass.
pub async fn require_admin(request: Request, next: Next) -> Response {
    let context = match request.extensions().get::<TenantContext>() {
        Some(ctx) => ctx.clone(),
        None => {
            return HttpAppError(AppError::Forbidden(
                "tenant context was not resolved for this request".to_string(),
            ))
            .into_response()
        }
    };

    if !context.is_admin() {
        if !context.is_superadmin {
            audit::log_permission_denied(
                Some(context.organization_id),
                context.user_id,
                Some(request.uri().path().to_string()),
                "organization admin role required".to_string(),
            );
            return HttpAppError(AppError::Forbidden(format!(
                "user {} is not an admin of organization {}",
                context.user_id, context.organization_id
            )))
            .into_response();
        }
        audit::log_superadmin_bypass(context.user_id, Some(request.uri().path().to_string()));
    }

    next.run(request).await
}

/// Gate for the cross-organization admin surface. No organization is
/// resolved; every request through here is audit-logged at WARN.
pub async fn require_superadmin(request: Request, next: Next) -> Response {
    let auth_user = match request.extensions().get::<AuthUser>() {
        Some(user) => user.clone(),
        None => {
            return HttpAppError(AppError::Unauthorized(
                "Missing authentication context".to_string(),
            ))
            .into_response()
        }
    };

    if !auth_user.is_superadmin() {
        audit::log_permission_denied(
            None,
            auth_user.user_id(),
            Some(request.uri().path().to_string()),
            "platform superadmin required".to_string(),
        );
        return HttpAppError(AppError::Forbidden(format!(
            "user {} is not a platform superadmin",
            auth_user.user_id()
        )))
        .into_response();
    }

    audit::log_superadmin_bypass(auth_user.user_id(), Some(request.uri().path().to_string()));

    next.run(request).await
}

/// Single entry point for capability checks so call sites never re-derive
/// the role to capability mapping. The superadmin flag is deliberately not
/// consulted here: data-plane operations require a real membership
/// capability.
pub fn check_permission(context: &TenantContext, capability: Capability) -> Result<(), AppError> {
    // Contexts are only ever built from an active membership.
    let granted = role_capabilities(context.role, MembershipStatus::Active);
    if granted.contains(&capability) {
        Ok(())
    } else {
        Err(AppError::Forbidden(format!(
            "user {} lacks the {:?} capability in organization {}",
            context.user_id, capability, context.organization_id
        )))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use tempo_core::models::{MembershipRole, Organization, OrganizationStatus};
    use uuid::Uuid;

    fn context(role: MembershipRole) -> TenantContext {
        let org_id = Uuid::new_v4();
        TenantContext {
            organization_id: org_id,
            organization: Organization {
                id: org_id,
                name: "Acme".to_string(),
                slug: "acme".to_string(),
                status: OrganizationStatus::Active,
                plan: "free".to_string(),
                max_members: None,
                max_projects: None,
                timezone: "UTC".to_string(),
                currency: "USD".to_string(),
                date_format: "YYYY-MM-DD".to_string(),
                created_at: Utc::now(),
                updated_at: Utc::now(),
                deleted_at: None,
            },
            membership_id: Uuid::new_v4(),
            role,
            user_id: Uuid::new_v4(),
            is_superadmin: false,
        }
    }

    #[test]
    fn test_admin_holds_every_capability() {
        let ctx = context(MembershipRole::Admin);
        assert!(check_permission(&ctx, Capability::EditData).is_ok());
        assert!(check_permission(&ctx, Capability::ManageMembers).is_ok());
        assert!(check_permission(&ctx, Capability::ManageProjects).is_ok());
    }

    #[test]
    fn test_member_cannot_manage() {
        let ctx = context(MembershipRole::Member);
        assert!(check_permission(&ctx, Capability::EditData).is_ok());
        assert!(matches!(
            check_permission(&ctx, Capability::ManageMembers),
            Err(AppError::Forbidden(_))
        ));
        assert!(matches!(
            check_permission(&ctx, Capability::ManageProjects),
            Err(AppError::Forbidden(_))
        ));
    }

    #[test]
    fn test_superadmin_flag_does_not_grant_capabilities() {
        let mut ctx = context(MembershipRole::Member);
        ctx.is_superadmin = true;
        assert!(check_permission(&ctx, Capability::ManageMembers).is_err());
    }
}
