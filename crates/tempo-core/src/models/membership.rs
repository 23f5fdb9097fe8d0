use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

/// Membership role within one organization. A user may hold different roles
/// in different organizations.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, ToSchema)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(
    feature = "sqlx",
    sqlx(type_name = "membership_role", rename_all = "lowercase")
)]
#[serde(rename_all = "lowercase")]
pub enum MembershipRole {
    Member,
    Admin,
}

impl std::fmt::Display for MembershipRole {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            MembershipRole::Member => write!(f, "member"),
            MembershipRole::Admin => write!(f, "admin"),
        }
    }
}

/// Membership status
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, ToSchema)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(
    feature = "sqlx",
    sqlx(type_name = "membership_status", rename_all = "lowercase")
)]
#[serde(rename_all = "lowercase")]
pub enum MembershipStatus {
    Invited,
    Active,
    Revoked,
}

impl MembershipStatus {
    /// Valid transitions: invited -> active, invited -> revoked,
    /// active -> revoked. Revoked is terminal; nothing moves back to invited.
    pub fn can_transition_to(self, to: MembershipStatus) -> bool {
        matches!(
            (self, to),
            (MembershipStatus::Invited, MembershipStatus::Active)
                | (MembershipStatus::Invited, MembershipStatus::Revoked)
                | (MembershipStatus::Active, MembershipStatus::Revoked)
        )
    }
}

/// Membership entity: the authorization edge between a user and an
/// organization. Revoked rows are retained for audit, never deleted.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
pub struct Membership {
    pub id: Uuid,
    pub organization_id: Uuid,
    /// Null while the membership is an invitation addressed to an email.
    pub user_id: Option<Uuid>,
    pub invited_email: Option<String>,
    pub role: MembershipRole,
    pub status: MembershipStatus,
    pub invited_by: Option<Uuid>,
    #[serde(skip_serializing)]
    pub invitation_token_hash: Option<String>,
    pub invitation_expires_at: Option<DateTime<Utc>>,
    pub accepted_at: Option<DateTime<Utc>>,
    pub revoked_at: Option<DateTime<Utc>>,
    pub last_active_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Fine-grained capability flags derived from (role, status).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum Capability {
    EditData,
    ManageMembers,
    ManageProjects,
}

/// The single role -> capability mapping. Guards and handlers must consult
/// this instead of re-deriving capabilities from the role.
///
/// Only active memberships grant anything; admins hold every capability,
/// members can edit their own tracked data but cannot manage the
/// organization's members or project catalog.
pub fn role_capabilities(
    role: MembershipRole,
    status: MembershipStatus,
) -> &'static [Capability] {
    if status != MembershipStatus::Active {
        return &[];
    }
    match role {
        MembershipRole::Admin => &[
            Capability::EditData,
            Capability::ManageMembers,
            Capability::ManageProjects,
        ],
        MembershipRole::Member => &[Capability::EditData],
    }
}
