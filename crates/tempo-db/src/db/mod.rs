//! Database repositories and tenancy enforcement
//!
//! Control-plane repositories run directly against the pool: they are what
//! tenancy resolution itself reads, so no organization context exists yet
//! when they execute. Tenant-owned data goes through `scoped` and runs on a
//! `rls::TenantSession` connection.

pub mod access_token;
pub mod membership;
pub mod organization;
pub mod rls;
pub mod scoped;
pub mod transaction;

pub use access_token::AccessTokenRepository;
pub use membership::MembershipRepository;
pub use organization::OrganizationRepository;
