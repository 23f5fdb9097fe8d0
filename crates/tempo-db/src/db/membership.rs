use chrono::{DateTime, Duration, Utc};
use serde::Serialize;
use sqlx::{FromRow, PgPool, Postgres};
use tempo_core::models::{Membership, MembershipRole, MembershipStatus};
use tempo_core::AppError;
use uuid::Uuid;

use super::organization::is_unique_violation;
use super::transaction::with_transaction;

/// Membership row joined with the member's user record, for listing.
/// Invited members that never signed up have no user columns yet.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct MemberRecord {
    pub id: Uuid,
    pub organization_id: Uuid,
    pub user_id: Option<Uuid>,
    pub invited_email: Option<String>,
    pub role: MembershipRole,
    pub status: MembershipStatus,
    pub accepted_at: Option<DateTime<Utc>>,
    pub last_active_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub user_email: Option<String>,
    pub user_display_name: Option<String>,
}

/// Outcome of inviting a member. The plaintext token appears here exactly
/// once; only its SHA-256 digest is stored.
#[derive(Debug)]
pub struct IssuedInvitation {
    pub membership: Membership,
    pub token: String,
}

/// Generate an opaque invitation token: 32 random bytes, hex-encoded.
pub fn generate_invitation_token() -> String {
    use rand::Rng;

    let mut rng = rand::rng();
    let random_bytes: Vec<u8> = (0..32).map(|_| rng.random()).collect();
    hex::encode(random_bytes)
}

/// Storage digest for an invitation token.
pub fn hash_invitation_token(token: &str) -> String {
    use sha2::{Digest, Sha256};

    hex::encode(Sha256::digest(token.as_bytes()))
}

#[derive(Clone)]
pub struct MembershipRepository {
    pool: PgPool,
}

impl MembershipRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// The caller's active membership in one organization, if any. This is
    /// the authorization lookup the tenancy middleware runs per request.
    pub async fn find_active(
        &self,
        organization_id: Uuid,
        user_id: Uuid,
    ) -> Result<Option<Membership>, AppError> {
        let membership = sqlx::query_as::<Postgres, Membership>(
            r#"
            SELECT * FROM memberships
            WHERE organization_id = $1 AND user_id = $2 AND status = 'active'
            "#,
        )
        .bind(organization_id)
        .bind(user_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| {
            tracing::error!(error = %e, "Failed to fetch active membership");
            AppError::from(e)
        })?;

        Ok(membership)
    }

    /// All active memberships a user holds, across organizations. Used by
    /// the sole-membership resolution fallback and the organization switcher.
    pub async fn list_for_user(&self, user_id: Uuid) -> Result<Vec<Membership>, AppError> {
        let memberships = sqlx::query_as::<Postgres, Membership>(
            r#"
            SELECT * FROM memberships
            WHERE user_id = $1 AND status = 'active'
            ORDER BY created_at
            "#,
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| {
            tracing::error!(error = %e, user_id = %user_id, "Failed to list memberships for user");
            AppError::from(e)
        })?;

        Ok(memberships)
    }

    /// Invited and active members of an organization, with user columns
    /// joined. Revoked rows stay out of the listing; they are audit trail.
    pub async fn list_members(&self, organization_id: Uuid) -> Result<Vec<MemberRecord>, AppError> {
        let members = sqlx::query_as::<Postgres, MemberRecord>(
            r#"
            SELECT m.id, m.organization_id, m.user_id, m.invited_email, m.role, m.status,
                   m.accepted_at, m.last_active_at, m.created_at,
                   u.email AS user_email, u.display_name AS user_display_name
            FROM memberships m
            LEFT JOIN users u ON u.id = m.user_id
            WHERE m.organization_id = $1 AND m.status != 'revoked'
            ORDER BY m.created_at
            "#,
        )
        .bind(organization_id)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| {
            tracing::error!(error = %e, "Failed to list organization members");
            AppError::from(e)
        })?;

        Ok(members)
    }

    /// Record activity on a membership. Best-effort from the caller's point
    /// of view; resolution does not fail when this does.
    pub async fn touch_last_active(&self, membership_id: Uuid) -> Result<(), AppError> {
        sqlx::query(
            r#"
            UPDATE memberships SET last_active_at = NOW() WHERE id = $1
            "#,
        )
        .bind(membership_id)
        .execute(&self.pool)
        .await
        .map_err(|e| {
            tracing::error!(error = %e, "Failed to touch membership activity");
            AppError::from(e)
        })?;

        Ok(())
    }

    /// Invite an email address into an organization.
    ///
    /// The HTTP layer already admin-guards this; the inviter's active admin
    /// membership is re-checked here anyway. Fails with `Conflict` when the
    /// address already has an active membership or a pending invitation.
    /// If a user account exists for the address the row is pre-bound to it.
    #[tracing::instrument(
        skip(self, invitee_email),
        fields(db.table = "memberships", db.operation = "insert")
    )]
    pub async fn invite_member(
        &self,
        organization_id: Uuid,
        inviter_user_id: Uuid,
        invitee_email: &str,
        role: MembershipRole,
        expiry_days: i64,
    ) -> Result<IssuedInvitation, AppError> {
        let inviter = self.find_active(organization_id, inviter_user_id).await?;
        match inviter {
            Some(m) if m.role == MembershipRole::Admin => {}
            _ => {
                return Err(AppError::Forbidden(
                    "Only active organization admins can invite members".to_string(),
                ))
            }
        }

        let existing: Option<MembershipStatus> = sqlx::query_scalar(
            r#"
            SELECT m.status FROM memberships m
            LEFT JOIN users u ON u.id = m.user_id
            WHERE m.organization_id = $1
              AND (
                    (m.status IN ('active', 'invited') AND lower(m.invited_email) = lower($2))
                 OR (m.status = 'active' AND lower(u.email) = lower($2))
              )
            LIMIT 1
            "#,
        )
        .bind(organization_id)
        .bind(invitee_email)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| {
            tracing::error!(error = %e, "Failed to check for existing membership");
            AppError::from(e)
        })?;
        match existing {
            Some(MembershipStatus::Invited) => {
                return Err(AppError::Conflict(
                    "An invitation is already pending for this email".to_string(),
                ))
            }
            Some(_) => {
                return Err(AppError::Conflict(
                    "User is already an active member of this organization".to_string(),
                ))
            }
            None => {}
        }

        // Pre-bind the membership when the address already has an account.
        let existing_user_id: Option<Uuid> =
            sqlx::query_scalar("SELECT id FROM users WHERE lower(email) = lower($1)")
                .bind(invitee_email)
                .fetch_optional(&self.pool)
                .await
                .map_err(|e| {
                    tracing::error!(error = %e, "Failed to look up invitee user");
                    AppError::from(e)
                })?;

        let token = generate_invitation_token();
        let token_hash = hash_invitation_token(&token);
        let expires_at = Utc::now() + Duration::days(expiry_days);

        let membership = sqlx::query_as::<Postgres, Membership>(
            r#"
            INSERT INTO memberships (
                organization_id, user_id, invited_email, role, status,
                invited_by, invitation_token_hash, invitation_expires_at
            )
            VALUES ($1, $2, $3, $4, 'invited', $5, $6, $7)
            RETURNING *
            "#,
        )
        .bind(organization_id)
        .bind(existing_user_id)
        .bind(invitee_email)
        .bind(role)
        .bind(inviter_user_id)
        .bind(&token_hash)
        .bind(expires_at)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| {
            if is_unique_violation(&e) {
                // Raced a concurrent invitation for the same address.
                return AppError::Conflict(
                    "An invitation is already pending for this email".to_string(),
                );
            }
            tracing::error!(error = %e, "Failed to create invitation");
            AppError::from(e)
        })?;

        tracing::info!(
            membership_id = %membership.id,
            organization_id = %organization_id,
            inviter_user_id = %inviter_user_id,
            role = %role,
            "Member invited"
        );

        Ok(IssuedInvitation { membership, token })
    }

    /// Accept an invitation by its plaintext token, binding it to the
    /// accepting user.
    ///
    /// Unknown, consumed, and expired tokens all fail the same way; the
    /// token hash is nulled on success so a token can be used exactly once.
    #[tracing::instrument(
        skip(self, token),
        fields(db.table = "memberships", db.operation = "update")
    )]
    pub async fn accept_invitation(
        &self,
        token: &str,
        user_id: Uuid,
    ) -> Result<Membership, AppError> {
        let token_hash = hash_invitation_token(token);

        let invitation = sqlx::query_as::<Postgres, Membership>(
            r#"
            SELECT * FROM memberships WHERE invitation_token_hash = $1
            "#,
        )
        .bind(&token_hash)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| {
            tracing::error!(error = %e, "Failed to look up invitation");
            AppError::from(e)
        })?;

        let invitation = match invitation {
            Some(m) if m.status == MembershipStatus::Invited => m,
            _ => return Err(AppError::InvalidOrExpiredToken),
        };

        let expired = match invitation.invitation_expires_at {
            Some(expires_at) => expires_at < Utc::now(),
            None => true,
        };
        if expired {
            tracing::info!(
                membership_id = %invitation.id,
                organization_id = %invitation.organization_id,
                "Expired invitation token presented"
            );
            return Err(AppError::InvalidOrExpiredToken);
        }

        let already_active = self
            .find_active(invitation.organization_id, user_id)
            .await?;
        if already_active.is_some() {
            return Err(AppError::Conflict(
                "User is already an active member of this organization".to_string(),
            ));
        }

        let membership = sqlx::query_as::<Postgres, Membership>(
            r#"
            UPDATE memberships
            SET status = 'active', user_id = $2, accepted_at = NOW(),
                invitation_token_hash = NULL, updated_at = NOW()
            WHERE id = $1 AND status = 'invited'
            RETURNING *
            "#,
        )
        .bind(invitation.id)
        .bind(user_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| {
            if is_unique_violation(&e) {
                return AppError::Conflict(
                    "User is already an active member of this organization".to_string(),
                );
            }
            tracing::error!(error = %e, "Failed to accept invitation");
            AppError::from(e)
        })?
        // The row was consumed between lookup and update.
        .ok_or(AppError::InvalidOrExpiredToken)?;

        tracing::info!(
            membership_id = %membership.id,
            organization_id = %membership.organization_id,
            user_id = %user_id,
            "Invitation accepted"
        );

        Ok(membership)
    }

    /// Revoke a membership (active member or pending invitation).
    ///
    /// Locks the organization's active admin rows before the write so that
    /// concurrent revocations cannot both pass the last-admin check. Fails
    /// with `InvariantViolation` when the target is the last active admin.
    #[tracing::instrument(skip(self), fields(db.table = "memberships", db.operation = "update"))]
    pub async fn revoke_membership(
        &self,
        organization_id: Uuid,
        acting_user_id: Uuid,
        membership_id: Uuid,
    ) -> Result<Membership, AppError> {
        let membership = with_transaction(&self.pool, |tx| {
            Box::pin(async move {
                let admins = lock_active_admins(tx, organization_id).await?;
                if !admins.iter().any(|(_, uid)| *uid == Some(acting_user_id)) {
                    return Err(AppError::Forbidden(
                        "Only active organization admins can revoke memberships".to_string(),
                    ));
                }

                let target = sqlx::query_as::<Postgres, Membership>(
                    r#"
                    SELECT * FROM memberships
                    WHERE id = $1 AND organization_id = $2
                    FOR UPDATE
                    "#,
                )
                .bind(membership_id)
                .bind(organization_id)
                .fetch_optional(&mut **tx)
                .await
                .map_err(|e| {
                    tracing::error!(error = %e, "Failed to fetch membership for revocation");
                    AppError::from(e)
                })?
                .ok_or_else(|| AppError::NotFound("Membership not found".to_string()))?;

                if !target.status.can_transition_to(MembershipStatus::Revoked) {
                    return Err(AppError::Conflict(
                        "Membership is already revoked".to_string(),
                    ));
                }

                if target.status == MembershipStatus::Active
                    && target.role == MembershipRole::Admin
                    && admins.len() <= 1
                {
                    return Err(AppError::InvariantViolation(
                        "Cannot revoke the last active admin of an organization".to_string(),
                    ));
                }

                let membership = sqlx::query_as::<Postgres, Membership>(
                    r#"
                    UPDATE memberships
                    SET status = 'revoked', revoked_at = NOW(),
                        invitation_token_hash = NULL, updated_at = NOW()
                    WHERE id = $1
                    RETURNING *
                    "#,
                )
                .bind(target.id)
                .fetch_one(&mut **tx)
                .await
                .map_err(|e| {
                    tracing::error!(error = %e, "Failed to revoke membership");
                    AppError::from(e)
                })?;

                Ok(membership)
            })
        })
        .await?;

        tracing::info!(
            membership_id = %membership.id,
            organization_id = %organization_id,
            acting_user_id = %acting_user_id,
            "Membership revoked"
        );

        Ok(membership)
    }

    /// Promote or demote an active membership.
    ///
    /// Same locking discipline as revocation; demoting the last active
    /// admin fails with `InvariantViolation` and leaves the table unchanged.
    #[tracing::instrument(skip(self), fields(db.table = "memberships", db.operation = "update"))]
    pub async fn change_role(
        &self,
        organization_id: Uuid,
        acting_user_id: Uuid,
        membership_id: Uuid,
        new_role: MembershipRole,
    ) -> Result<Membership, AppError> {
        let membership = with_transaction(&self.pool, |tx| {
            Box::pin(async move {
                let admins = lock_active_admins(tx, organization_id).await?;
                if !admins.iter().any(|(_, uid)| *uid == Some(acting_user_id)) {
                    return Err(AppError::Forbidden(
                        "Only active organization admins can change member roles".to_string(),
                    ));
                }

                let target = sqlx::query_as::<Postgres, Membership>(
                    r#"
                    SELECT * FROM memberships
                    WHERE id = $1 AND organization_id = $2
                    FOR UPDATE
                    "#,
                )
                .bind(membership_id)
                .bind(organization_id)
                .fetch_optional(&mut **tx)
                .await
                .map_err(|e| {
                    tracing::error!(error = %e, "Failed to fetch membership for role change");
                    AppError::from(e)
                })?
                .ok_or_else(|| AppError::NotFound("Membership not found".to_string()))?;

                if target.status != MembershipStatus::Active {
                    return Err(AppError::Conflict(
                        "Only active memberships can have their role changed".to_string(),
                    ));
                }

                if target.role == MembershipRole::Admin
                    && new_role == MembershipRole::Member
                    && admins.len() <= 1
                {
                    return Err(AppError::InvariantViolation(
                        "Cannot demote the last active admin of an organization".to_string(),
                    ));
                }

                let membership = sqlx::query_as::<Postgres, Membership>(
                    r#"
                    UPDATE memberships
                    SET role = $2, updated_at = NOW()
                    WHERE id = $1
                    RETURNING *
                    "#,
                )
                .bind(target.id)
                .bind(new_role)
                .fetch_one(&mut **tx)
                .await
                .map_err(|e| {
                    tracing::error!(error = %e, "Failed to change membership role");
                    AppError::from(e)
                })?;

                Ok(membership)
            })
        })
        .await?;

        tracing::info!(
            membership_id = %membership.id,
            organization_id = %organization_id,
            acting_user_id = %acting_user_id,
            new_role = %new_role,
            "Membership role changed"
        );

        Ok(membership)
    }
}

/// Lock the organization's active admin rows, in id order so concurrent
/// membership writes queue on the same row set instead of deadlocking.
/// Returns (membership_id, user_id) pairs.
async fn lock_active_admins(
    tx: &mut sqlx::Transaction<'_, Postgres>,
    organization_id: Uuid,
) -> Result<Vec<(Uuid, Option<Uuid>)>, AppError> {
    sqlx::query_as::<Postgres, (Uuid, Option<Uuid>)>(
        r#"
        SELECT id, user_id FROM memberships
        WHERE organization_id = $1 AND status = 'active' AND role = 'admin'
        ORDER BY id
        FOR UPDATE
        "#,
    )
    .bind(organization_id)
    .fetch_all(&mut **tx)
    .await
    .map_err(|e| {
        tracing::error!(error = %e, "Failed to lock active admin rows");
        AppError::from(e)
    })
}
