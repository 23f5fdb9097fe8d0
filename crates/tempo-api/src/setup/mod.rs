//! Application setup and initialization
//!
//! This module contains all application initialization logic extracted from main.rs
//! for better organization and testability.

pub mod database;
pub mod routes;
pub mod server;

use crate::state::AppState;
use anyhow::Result;
use std::sync::Arc;
use tempo_core::AppConfig;

/// Initialize the entire application
pub async fn initialize_app(config: AppConfig) -> Result<(Arc<AppState>, axum::Router)> {
    // Initialize telemetry first
    crate::telemetry::init_telemetry(config.is_production());

    tracing::info!("Configuration loaded and validated successfully");

    // Setup database
    let pool = database::setup_database(&config).await?;

    // Smoke-check the row security catalog so a misdeployed database is
    // visible in the startup log, not just in cross-tenant test failures.
    match tempo_db::verify_row_security(&pool).await {
        Ok(report) if report.is_healthy() => {
            tracing::info!(policies = ?report.policies, "Row security verified");
        }
        Ok(report) => {
            tracing::error!(
                enabled = report.enabled,
                functions_present = report.functions_present,
                policy_count = report.policies.len(),
                "Row security policies missing or disabled; isolation is running on application scoping alone"
            );
        }
        Err(e) => {
            tracing::error!(error = %e, "Row security verification errored at startup");
        }
    }

    let state = Arc::new(AppState::new(config.clone(), pool));

    // Setup routes
    let router = routes::setup_routes(&config, state.clone())?;

    Ok((state, router))
}
