//! Database row-security bridge
//!
//! Mirrors the resolved tenancy context into Postgres session variables so
//! the row-security policies installed by the migrations enforce isolation
//! independently of application-level query scoping. Policies read
//! `current_organization_id()` and `is_super_admin()`, which in turn read
//! the two `app.*` settings applied here.
//!
//! The pooling hazard: settings live on a specific connection, and pooled
//! connections are reused across requests. `TenantSession` therefore owns
//! its connection for the whole unit of work and resets the settings in
//! `finish()`. The pool's `after_release` hook runs `SESSION_RESET_SQL` a
//! second time so even a cancelled or panicked request cannot leak context
//! to the next acquirer.

use serde::Serialize;
use sqlx::pool::PoolConnection;
use sqlx::{PgConnection, PgPool, Postgres};
use tempo_core::AppError;
use uuid::Uuid;

/// Tables covered by row-security policies. Control-plane tables are
/// deliberately absent: tenancy resolution must read them before any
/// context exists.
pub const TENANT_OWNED_TABLES: &[&str] = &["projects", "clients"];

/// Resets both session variables to their deny-by-default values.
pub const SESSION_RESET_SQL: &str = "SELECT set_config('app.current_organization_id', '', false), \
     set_config('app.is_super_admin', 'false', false)";

/// One unit of work bracketed by apply/reset of the tenancy session
/// variables, pinned to a single pooled connection.
pub struct TenantSession {
    conn: Option<PoolConnection<Postgres>>,
    organization_id: Option<Uuid>,
}

impl TenantSession {
    /// Acquire a connection and apply the resolved context to it. An
    /// `organization_id` of `None` leaves the organization setting empty,
    /// which the policies treat as "matches nothing".
    pub async fn begin(
        pool: &PgPool,
        organization_id: Option<Uuid>,
        is_superadmin: bool,
    ) -> Result<Self, AppError> {
        let mut conn = pool.acquire().await.map_err(|e| {
            tracing::error!(error = %e, "Failed to acquire connection for tenant session");
            AppError::from(e)
        })?;

        let org_setting = organization_id.map(|id| id.to_string()).unwrap_or_default();
        sqlx::query(
            "SELECT set_config('app.current_organization_id', $1, false), \
             set_config('app.is_super_admin', $2, false)",
        )
        .bind(&org_setting)
        .bind(if is_superadmin { "true" } else { "false" })
        .execute(&mut *conn)
        .await
        .map_err(|e| {
            tracing::error!(error = %e, "Failed to apply tenancy session variables");
            AppError::from(e)
        })?;

        Ok(Self {
            conn: Some(conn),
            organization_id,
        })
    }

    /// The pinned connection. Every statement of this unit of work must run
    /// on it, or the row-security policies will see an unset context.
    pub fn executor(&mut self) -> &mut PgConnection {
        self.conn
            .as_mut()
            .expect("TenantSession was already finished")
    }

    /// Reset the session variables and release the connection back to the
    /// pool. Called unconditionally by the tenancy middleware, on success
    /// and on error.
    pub async fn finish(mut self) -> Result<(), AppError> {
        if let Some(mut conn) = self.conn.take() {
            sqlx::query(SESSION_RESET_SQL)
                .execute(&mut *conn)
                .await
                .map_err(|e| {
                    tracing::error!(error = %e, "Failed to reset tenancy session variables");
                    AppError::from(e)
                })?;
        }
        Ok(())
    }

    pub fn organization_id(&self) -> Option<Uuid> {
        self.organization_id
    }
}

impl Drop for TenantSession {
    fn drop(&mut self) {
        // The pool's after_release hook still resets the variables before
        // the connection is handed out again.
        if self.conn.is_some() {
            tracing::warn!(
                organization_id = ?self.organization_id,
                "TenantSession dropped without finish(); relying on pool release hook"
            );
        }
    }
}

/// Operational report over the database's own policy catalog, used by the
/// readiness endpoint and logged once at startup.
#[derive(Debug, Clone, Serialize)]
pub struct RowSecurityReport {
    /// Row security is enabled AND forced on every tenant-owned table.
    pub enabled: bool,
    pub policies: Vec<String>,
    /// Both helper functions the policies consult exist.
    pub functions_present: bool,
}

impl RowSecurityReport {
    pub fn is_healthy(&self) -> bool {
        self.enabled && self.functions_present && !self.policies.is_empty()
    }
}

/// Confirm the expected tenant-isolation policies and helper functions are
/// installed. Deployment smoke-check, not a request-path operation.
pub async fn verify_row_security(pool: &PgPool) -> Result<RowSecurityReport, AppError> {
    let table_list = TENANT_OWNED_TABLES
        .iter()
        .map(|t| format!("'{}'", t))
        .collect::<Vec<_>>()
        .join(", ");

    let policies: Vec<String> = sqlx::query_scalar(&format!(
        "SELECT policyname FROM pg_policies \
         WHERE schemaname = 'public' AND tablename IN ({}) \
         ORDER BY policyname",
        table_list
    ))
    .fetch_all(pool)
    .await
    .map_err(|e| {
        tracing::error!(error = %e, "Failed to read pg_policies");
        AppError::from(e)
    })?;

    let secured_tables: i64 = sqlx::query_scalar(&format!(
        "SELECT count(*) FROM pg_class c \
         JOIN pg_namespace n ON n.oid = c.relnamespace \
         WHERE n.nspname = 'public' AND c.relname IN ({}) \
         AND c.relrowsecurity AND c.relforcerowsecurity",
        table_list
    ))
    .fetch_one(pool)
    .await
    .map_err(|e| {
        tracing::error!(error = %e, "Failed to read pg_class row security flags");
        AppError::from(e)
    })?;

    let functions_present: i64 = sqlx::query_scalar(
        "SELECT count(*) FROM pg_proc p \
         JOIN pg_namespace n ON n.oid = p.pronamespace \
         WHERE n.nspname = 'public' \
         AND p.proname IN ('current_organization_id', 'is_super_admin')",
    )
    .fetch_one(pool)
    .await
    .map_err(|e| {
        tracing::error!(error = %e, "Failed to read pg_proc helper functions");
        AppError::from(e)
    })?;

    Ok(RowSecurityReport {
        enabled: secured_tables == TENANT_OWNED_TABLES.len() as i64,
        policies,
        functions_present: functions_present == 2,
    })
}
