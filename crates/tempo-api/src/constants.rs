//! API constants
//!
//! All routes are versioned under a single prefix; bump it here when the
//! surface changes incompatibly.

/// API base path prefix (version-independent)
pub const API_BASE: &str = "/api";

/// Versioned API prefix used by routes and the OpenAPI document.
pub const API_PREFIX: &str = "/api/v1";

/// Header carrying an explicit organization identifier (UUID or slug).
pub const ORGANIZATION_HEADER: &str = "x-organization-id";

/// Query parameter carrying an explicit organization identifier.
pub const ORGANIZATION_QUERY_PARAM: &str = "organization";
