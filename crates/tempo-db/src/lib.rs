//! Tempo Database Layer
//!
//! This crate provides the control-plane repositories (organizations,
//! memberships, access tokens), the tenant-scoped query builder, and the
//! row-security session bridge.

// Module declarations
pub mod db;

// Re-exports: Control-plane repositories
pub use db::access_token::AccessToken;
pub use db::membership::{IssuedInvitation, MemberRecord};
pub use db::organization::OrganizationSettingsPatch;
pub use db::{AccessTokenRepository, MembershipRepository, OrganizationRepository};

// Re-exports: Tenancy enforcement
pub use db::rls::{verify_row_security, RowSecurityReport, TenantSession, SESSION_RESET_SQL};
pub use db::scoped::{ScopedInsert, ScopedQuery, ScopedSelect};

// Re-exports: Transaction utilities
pub use db::transaction::with_transaction;
