//! OpenAPI documentation.
//! All endpoints are versioned under /api/v1/.

use utoipa::OpenApi;

use crate::error;
use crate::handlers;
use tempo_core::models;

/// Returns the OpenAPI spec served at /api/openapi.json.
pub fn get_openapi_spec() -> utoipa::openapi::OpenApi {
    ApiDoc::openapi()
}

#[derive(OpenApi)]
#[openapi(
    info(
        title = "Tempo API",
        version = "0.1.0",
        description = "Multi-organization time tracking API. Every authenticated request resolves to exactly one organization, and all tenant data access is scoped to it. All endpoints are versioned under /api/v1/.",
        contact(
            name = "API Support",
            url = "https://github.com/yourusername/tempo"
        )
    ),
    paths(
        // Organizations
        handlers::organizations::create_organization,
        handlers::organizations::list_my_organizations,
        handlers::organizations::get_organization,
        handlers::organizations::update_settings,
        handlers::organizations::rename_slug,
        handlers::organizations::delete_organization,
        // Members
        handlers::members::list_members,
        handlers::members::invite_member,
        handlers::members::accept_invitation,
        handlers::members::revoke_membership,
        handlers::members::change_role,
        // Projects
        handlers::projects::list_projects,
        handlers::projects::create_project,
        handlers::projects::get_project,
        // Clients
        handlers::clients::list_clients,
        handlers::clients::create_client,
        // Admin
        handlers::admin::list_organizations,
    ),
    components(
        schemas(
            // Core models
            models::Organization,
            models::OrganizationStatus,
            models::Membership,
            models::MembershipRole,
            models::MembershipStatus,
            models::Capability,
            models::User,
            models::Project,
            models::Client,
            // Organization models
            handlers::organizations::CreateOrganizationRequest,
            handlers::organizations::CreateOrganizationResponse,
            handlers::organizations::UpdateSettingsRequest,
            handlers::organizations::RenameSlugRequest,
            // Member models
            handlers::members::InviteMemberRequest,
            handlers::members::InvitationResponse,
            handlers::members::AcceptInvitationRequest,
            handlers::members::ChangeRoleRequest,
            // Project and client models
            handlers::projects::CreateProjectRequest,
            handlers::clients::CreateClientRequest,
            // Error
            error::ErrorResponse,
        )
    ),
    tags(
        (name = "organizations", description = "Organization lifecycle and settings operations"),
        (name = "members", description = "Membership invitations, roles, and revocation"),
        (name = "projects", description = "Organization-scoped project operations"),
        (name = "clients", description = "Organization-scoped client operations"),
        (name = "admin", description = "Platform administration (superadmin only)")
    )
)]
pub struct ApiDoc;
