//! Security audit logging
//!
//! Structured audit logging for security-relevant events: authentication
//! attempts, membership lifecycle changes, permission denials, superadmin
//! bypasses, and detected cross-tenant access.
//!
//! Entries are emitted under the `audit` tracing target so operators can
//! route them separately from application logs.

use serde::Serialize;
use uuid::Uuid;

/// Audit event types for categorization
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum AuditEventType {
    /// Authentication success
    AuthenticationSuccess,
    /// Authentication failure
    AuthenticationFailure,
    /// Operation denied by role or membership checks
    PermissionDenied,
    /// A statement touched rows outside the caller's organization
    CrossTenantAccessDetected,
    /// Superadmin accessed the cross-organization surface
    SuperadminBypass,
    /// Organization created
    OrganizationCreated,
    /// Organization soft-deleted
    OrganizationDeleted,
    /// Member invited to an organization
    MemberInvited,
    /// Invitation accepted
    InvitationAccepted,
    /// Membership revoked
    MembershipRevoked,
    /// Membership role changed
    MembershipRoleChanged,
}

/// Structured audit log entry
#[derive(Debug, Serialize)]
pub struct AuditLogEntry {
    /// Timestamp of the event
    pub timestamp: chrono::DateTime<chrono::Utc>,
    /// Type of audit event
    pub event_type: AuditEventType,
    /// Organization ID (if applicable)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub organization_id: Option<Uuid>,
    /// Acting user ID (if applicable)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user_id: Option<Uuid>,
    /// Membership ID (if applicable)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub membership_id: Option<Uuid>,
    /// Client IP address
    #[serde(skip_serializing_if = "Option::is_none")]
    pub client_ip: Option<String>,
    /// Request path
    #[serde(skip_serializing_if = "Option::is_none")]
    pub request_path: Option<String>,
    /// Event details (JSON object)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<serde_json::Value>,
    /// Success or failure
    pub success: bool,
    /// Error message (if failure)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_message: Option<String>,
}

impl AuditLogEntry {
    /// Create a new audit log entry
    pub fn new(event_type: AuditEventType) -> Self {
        Self {
            timestamp: chrono::Utc::now(),
            event_type,
            organization_id: None,
            user_id: None,
            membership_id: None,
            client_ip: None,
            request_path: None,
            details: None,
            success: true,
            error_message: None,
        }
    }

    /// Set organization ID
    pub fn with_organization_id(mut self, organization_id: Uuid) -> Self {
        self.organization_id = Some(organization_id);
        self
    }

    /// Set acting user ID
    pub fn with_user_id(mut self, user_id: Uuid) -> Self {
        self.user_id = Some(user_id);
        self
    }

    /// Set membership ID
    pub fn with_membership_id(mut self, membership_id: Uuid) -> Self {
        self.membership_id = Some(membership_id);
        self
    }

    /// Set details
    pub fn with_details(mut self, details: serde_json::Value) -> Self {
        self.details = Some(details);
        self
    }

    /// Mark as failure
    pub fn with_failure(mut self, error_message: String) -> Self {
        self.success = false;
        self.error_message = Some(error_message);
        self
    }

    /// Log the audit entry
    ///
    /// Uses structured logging with the `audit` target for easy filtering.
    /// A detected cross-tenant access is always ERROR and a superadmin
    /// bypass is always WARN, even when the operation itself succeeded.
    pub fn log(&self) {
        // Log as JSON for structured logging (useful for log aggregation systems)
        let json = serde_json::to_string(self).unwrap_or_else(|_| "{}".to_string());

        match self.event_type {
            AuditEventType::CrossTenantAccessDetected => {
                tracing::event!(
                    target: "audit",
                    tracing::Level::ERROR,
                    audit_entry = %json,
                    event_type = ?self.event_type,
                    organization_id = ?self.organization_id,
                    user_id = ?self.user_id,
                    error = ?self.error_message,
                    "Security audit log - cross-tenant access"
                );
            }
            AuditEventType::SuperadminBypass => {
                tracing::event!(
                    target: "audit",
                    tracing::Level::WARN,
                    audit_entry = %json,
                    event_type = ?self.event_type,
                    user_id = ?self.user_id,
                    "Security audit log - superadmin bypass"
                );
            }
            _ if !self.success => {
                tracing::event!(
                    target: "audit",
                    tracing::Level::WARN,
                    audit_entry = %json,
                    event_type = ?self.event_type,
                    organization_id = ?self.organization_id,
                    user_id = ?self.user_id,
                    success = self.success,
                    error = ?self.error_message,
                    "Security audit log - failure"
                );
            }
            _ => {
                tracing::event!(
                    target: "audit",
                    tracing::Level::INFO,
                    audit_entry = %json,
                    event_type = ?self.event_type,
                    organization_id = ?self.organization_id,
                    user_id = ?self.user_id,
                    success = self.success,
                    "Security audit log"
                );
            }
        }
    }
}

// Helper functions for common audit events
/// Log authentication attempt
pub fn log_authentication_attempt(
    user_id: Option<Uuid>,
    client_ip: Option<String>,
    success: bool,
    error_message: Option<String>,
) {
    let event_type = if success {
        AuditEventType::AuthenticationSuccess
    } else {
        AuditEventType::AuthenticationFailure
    };

    let mut entry = AuditLogEntry::new(event_type)
        .with_user_id_opt(user_id)
        .with_client_ip_opt(client_ip);

    if !success {
        entry = entry
            .with_failure(error_message.unwrap_or_else(|| "Authentication failed".to_string()));
    }

    entry.log();
}

/// Log a denied operation
pub fn log_permission_denied(
    organization_id: Option<Uuid>,
    user_id: Uuid,
    request_path: Option<String>,
    reason: String,
) {
    AuditLogEntry::new(AuditEventType::PermissionDenied)
        .with_organization_id_opt(organization_id)
        .with_user_id(user_id)
        .with_request_path_opt(request_path)
        .with_failure(reason)
        .log();
}

/// Log a detected cross-tenant access
pub fn log_cross_tenant_access(
    organization_id: Option<Uuid>,
    user_id: Option<Uuid>,
    detail: String,
) {
    AuditLogEntry::new(AuditEventType::CrossTenantAccessDetected)
        .with_organization_id_opt(organization_id)
        .with_user_id_opt(user_id)
        .with_failure(detail)
        .log();
}

/// Log superadmin use of the cross-organization surface
pub fn log_superadmin_bypass(user_id: Uuid, request_path: Option<String>) {
    AuditLogEntry::new(AuditEventType::SuperadminBypass)
        .with_user_id(user_id)
        .with_request_path_opt(request_path)
        .log();
}

/// Log organization creation
pub fn log_organization_created(organization_id: Uuid, user_id: Uuid, slug: &str) {
    AuditLogEntry::new(AuditEventType::OrganizationCreated)
        .with_organization_id(organization_id)
        .with_user_id(user_id)
        .with_details(serde_json::json!({ "slug": slug }))
        .log();
}

/// Log organization soft-deletion
pub fn log_organization_deleted(organization_id: Uuid, user_id: Uuid) {
    AuditLogEntry::new(AuditEventType::OrganizationDeleted)
        .with_organization_id(organization_id)
        .with_user_id(user_id)
        .log();
}

/// Log a member invitation
pub fn log_member_invited(
    organization_id: Uuid,
    user_id: Uuid,
    membership_id: Uuid,
    role: &str,
) {
    AuditLogEntry::new(AuditEventType::MemberInvited)
        .with_organization_id(organization_id)
        .with_user_id(user_id)
        .with_membership_id(membership_id)
        .with_details(serde_json::json!({ "role": role }))
        .log();
}

/// Log an accepted invitation
pub fn log_invitation_accepted(organization_id: Uuid, user_id: Uuid, membership_id: Uuid) {
    AuditLogEntry::new(AuditEventType::InvitationAccepted)
        .with_organization_id(organization_id)
        .with_user_id(user_id)
        .with_membership_id(membership_id)
        .log();
}

/// Log a membership revocation
pub fn log_membership_revoked(organization_id: Uuid, user_id: Uuid, membership_id: Uuid) {
    AuditLogEntry::new(AuditEventType::MembershipRevoked)
        .with_organization_id(organization_id)
        .with_user_id(user_id)
        .with_membership_id(membership_id)
        .log();
}

/// Log a membership role change
pub fn log_membership_role_changed(
    organization_id: Uuid,
    user_id: Uuid,
    membership_id: Uuid,
    new_role: &str,
) {
    AuditLogEntry::new(AuditEventType::MembershipRoleChanged)
        .with_organization_id(organization_id)
        .with_user_id(user_id)
        .with_membership_id(membership_id)
        .with_details(serde_json::json!({ "new_role": new_role }))
        .log();
}

// Helper trait extensions for optional setters
trait AuditLogEntryOpt {
    fn with_organization_id_opt(self, organization_id: Option<Uuid>) -> Self;
    fn with_user_id_opt(self, user_id: Option<Uuid>) -> Self;
    fn with_client_ip_opt(self, client_ip: Option<String>) -> Self;
    fn with_request_path_opt(self, request_path: Option<String>) -> Self;
}

impl AuditLogEntryOpt for AuditLogEntry {
    fn with_organization_id_opt(mut self, organization_id: Option<Uuid>) -> Self {
        if let Some(id) = organization_id {
            self.organization_id = Some(id);
        }
        self
    }

    fn with_user_id_opt(mut self, user_id: Option<Uuid>) -> Self {
        if let Some(id) = user_id {
            self.user_id = Some(id);
        }
        self
    }

    fn with_client_ip_opt(mut self, client_ip: Option<String>) -> Self {
        if let Some(ip) = client_ip {
            self.client_ip = Some(ip);
        }
        self
    }

    fn with_request_path_opt(mut self, request_path: Option<String>) -> Self {
        if let Some(path) = request_path {
            self.request_path = Some(path);
        }
        self
    }
}
