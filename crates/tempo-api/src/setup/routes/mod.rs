//! Route configuration and setup.
//!
//! Routes are grouped by how much tenancy machinery they need:
//!
//! - account routes: authentication only (creating an organization, listing
//!   the caller's organizations, accepting an invitation)
//! - organization routes: authentication + tenant resolution
//! - organization admin routes: the above + the admin guard
//! - tenant data routes: the above + a database session pinned to the
//!   resolved organization so row security applies
//! - platform admin routes: authentication + the superadmin guard, no
//!   tenant context at all

mod health;

use crate::constants::{API_BASE, API_PREFIX};
use crate::guards;
use crate::handlers;
use crate::state::AppState;
use crate::tenancy;
use axum::{
    extract::DefaultBodyLimit,
    http::{HeaderValue, Method},
    routing::{delete, get, patch, post, put},
    Json, Router,
};
use std::sync::Arc;
use std::time::Duration;
use tempo_core::AppConfig;
use tower::limit::ConcurrencyLimitLayer;
use tower_http::cors::{Any, CorsLayer};
use tower_http::limit::RequestBodyLimitLayer;
use tower_http::timeout::TimeoutLayer;
use tower_http::trace::TraceLayer;

const MAX_BODY_BYTES: usize = 1024 * 1024;

/// Setup all application routes
pub fn setup_routes(config: &AppConfig, state: Arc<AppState>) -> Result<Router<()>, anyhow::Error> {
    let cors = setup_cors(config)?;

    let public_routes = public_routes(state.clone());
    let protected_routes =
        protected_routes(state.clone()).layer(axum::middleware::from_fn_with_state(
            state.clone(),
            crate::auth::middleware::auth_middleware,
        ));

    let app_state_routes = public_routes.merge(protected_routes);

    let http_concurrency_limit = std::env::var("HTTP_CONCURRENCY_LIMIT")
        .ok()
        .and_then(|s| s.parse::<usize>().ok())
        .unwrap_or(10_000)
        .max(1);
    tracing::info!(
        http_concurrency_limit = http_concurrency_limit,
        "HTTP concurrency limit layer enabled"
    );

    let request_timeout_secs = std::env::var("REQUEST_TIMEOUT_SECS")
        .ok()
        .and_then(|s| s.parse().ok())
        .unwrap_or(30)
        .max(1);
    tracing::info!(request_timeout_secs, "Request timeout layer enabled");

    let app = app_state_routes
        .merge(utoipa_rapidoc::RapiDoc::new(format!("{}/openapi.json", API_BASE)).path("/docs"))
        .layer(ConcurrencyLimitLayer::new(http_concurrency_limit))
        .layer(RequestBodyLimitLayer::new(MAX_BODY_BYTES))
        .layer(DefaultBodyLimit::disable())
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .layer(TimeoutLayer::new(Duration::from_secs(request_timeout_secs)))
        .with_state(state);

    Ok(app)
}

fn setup_cors(config: &AppConfig) -> Result<CorsLayer, anyhow::Error> {
    let cors = if config.cors_origins.contains(&"*".to_string()) {
        tracing::warn!("CORS configured to allow all origins - not recommended for production");
        CorsLayer::new()
            .allow_origin(Any)
            .allow_methods([
                Method::GET,
                Method::POST,
                Method::PUT,
                Method::DELETE,
                Method::OPTIONS,
            ])
            .allow_headers(Any)
    } else {
        let origins: Result<Vec<HeaderValue>, _> =
            config.cors_origins.iter().map(|o| o.parse()).collect();
        CorsLayer::new()
            .allow_origin(origins.unwrap_or_default())
            .allow_methods([
                Method::GET,
                Method::POST,
                Method::PUT,
                Method::DELETE,
                Method::OPTIONS,
            ])
            .allow_headers(Any)
    };
    Ok(cors)
}

fn public_routes(state: Arc<AppState>) -> Router<Arc<AppState>> {
    Router::new()
        .route(
            "/health",
            get({
                let state = state.clone();
                move || {
                    let state = state.clone();
                    async { health::health_check(state).await }
                }
            }),
        )
        .route(
            "/health/live",
            get({
                let state = state.clone();
                move || async { health::liveness_check(state).await }
            }),
        )
        .route(
            "/health/ready",
            get({
                let state = state.clone();
                move || async { health::readiness_check(state).await }
            }),
        )
        .with_state(state)
        .route(
            &format!("{}/openapi.json", API_BASE),
            get(|| async { Json(crate::api_doc::get_openapi_spec()) }),
        )
}

fn protected_routes(state: Arc<AppState>) -> Router<Arc<AppState>> {
    Router::new()
        .merge(account_routes(state.clone()))
        .merge(organization_routes(state.clone()))
        .merge(organization_admin_routes(state.clone()))
        .merge(tenant_data_routes(state.clone()))
        .merge(platform_admin_routes(state.clone()))
        .with_state(state)
}

/// Routes that only need an authenticated user. Creating an organization and
/// accepting an invitation must work for users who belong to nothing yet.
fn account_routes(state: Arc<AppState>) -> Router<Arc<AppState>> {
    Router::new()
        .route(
            &format!("{}/organizations", API_PREFIX),
            post(handlers::organizations::create_organization)
                .get(handlers::organizations::list_my_organizations),
        )
        .route(
            &format!("{}/members/invitations/accept", API_PREFIX),
            post(handlers::members::accept_invitation),
        )
        .with_state(state)
}

/// Member-visible organization routes: tenant resolution, no admin guard.
fn organization_routes(state: Arc<AppState>) -> Router<Arc<AppState>> {
    Router::new()
        .route(
            &format!("{}/organizations/{{org}}", API_PREFIX),
            get(handlers::organizations::get_organization),
        )
        .route(
            &format!("{}/organizations/{{org}}/members", API_PREFIX),
            get(handlers::members::list_members),
        )
        .layer(axum::middleware::from_fn_with_state(
            state.clone(),
            tenancy::resolve_tenant,
        ))
        .with_state(state)
}

fn organization_admin_routes(state: Arc<AppState>) -> Router<Arc<AppState>> {
    Router::new()
        .route(
            &format!("{}/organizations/{{org}}", API_PREFIX),
            delete(handlers::organizations::delete_organization),
        )
        .route(
            &format!("{}/organizations/{{org}}/settings", API_PREFIX),
            patch(handlers::organizations::update_settings),
        )
        .route(
            &format!("{}/organizations/{{org}}/rename-slug", API_PREFIX),
            post(handlers::organizations::rename_slug),
        )
        .route(
            &format!("{}/organizations/{{org}}/members/invitations", API_PREFIX),
            post(handlers::members::invite_member),
        )
        .route(
            &format!("{}/organizations/{{org}}/members/{{membership}}", API_PREFIX),
            delete(handlers::members::revoke_membership),
        )
        .route(
            &format!(
                "{}/organizations/{{org}}/members/{{membership}}/role",
                API_PREFIX
            ),
            put(handlers::members::change_role),
        )
        .layer(axum::middleware::from_fn(guards::require_admin))
        .layer(axum::middleware::from_fn_with_state(
            state.clone(),
            tenancy::resolve_tenant,
        ))
        .with_state(state)
}

/// Tenant-owned data. Every request here runs on a connection whose session
/// variables are pinned to the resolved organization, so the database's row
/// security policies apply in addition to application scoping.
fn tenant_data_routes(state: Arc<AppState>) -> Router<Arc<AppState>> {
    Router::new()
        .route(
            &format!("{}/projects", API_PREFIX),
            post(handlers::projects::create_project).get(handlers::projects::list_projects),
        )
        .route(
            &format!("{}/projects/{{id}}", API_PREFIX),
            get(handlers::projects::get_project),
        )
        .route(
            &format!("{}/clients", API_PREFIX),
            post(handlers::clients::create_client).get(handlers::clients::list_clients),
        )
        .layer(axum::middleware::from_fn_with_state(
            state.clone(),
            tenancy::tenant_session,
        ))
        .layer(axum::middleware::from_fn_with_state(
            state.clone(),
            tenancy::resolve_tenant,
        ))
        .with_state(state)
}

fn platform_admin_routes(state: Arc<AppState>) -> Router<Arc<AppState>> {
    Router::new()
        .route(
            &format!("{}/admin/organizations", API_PREFIX),
            get(handlers::admin::list_organizations),
        )
        .layer(axum::middleware::from_fn(guards::require_superadmin))
        .with_state(state)
}
