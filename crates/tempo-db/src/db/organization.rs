use serde::Deserialize;
use sqlx::{PgPool, Postgres};
use tempo_core::models::{resolve_slug_collision, slugify, Membership, Organization};
use tempo_core::AppError;
use uuid::Uuid;

use super::transaction::with_transaction;

const ORGANIZATION_COLUMNS: &str = "id, name, slug, status, plan, max_members, max_projects, \
     timezone, currency, date_format, created_at, updated_at, deleted_at";

pub(crate) fn is_unique_violation(e: &sqlx::Error) -> bool {
    matches!(e, sqlx::Error::Database(db_err) if db_err.code().as_deref() == Some("23505"))
}

/// Settings fields an admin may change. Absent fields are left untouched;
/// the slug is only changed through the explicit rename flow.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct OrganizationSettingsPatch {
    pub name: Option<String>,
    pub plan: Option<String>,
    pub timezone: Option<String>,
    pub currency: Option<String>,
    pub date_format: Option<String>,
    pub max_members: Option<i32>,
    pub max_projects: Option<i32>,
}

#[derive(Clone)]
pub struct OrganizationRepository {
    pool: PgPool,
}

impl OrganizationRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Create an organization with a slug derived from the name, probing
    /// taken slugs and appending `-1`, `-2`, ... until free. The creator is
    /// written as the founding active admin in the same transaction, so an
    /// organization never exists without at least one active admin.
    #[tracing::instrument(skip(self), fields(db.table = "organizations", db.operation = "insert"))]
    pub async fn create_organization(
        &self,
        name: &str,
        owner_user_id: Uuid,
    ) -> Result<(Organization, Membership), AppError> {
        let base = slugify(name);
        let taken: Vec<String> = sqlx::query_scalar(
            r#"
            SELECT slug FROM organizations
            WHERE slug = $1 OR slug LIKE $1 || '-%'
            "#,
        )
        .bind(&base)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| {
            tracing::error!(error = %e, "Failed to probe organization slugs");
            AppError::from(e)
        })?;
        let slug = resolve_slug_collision(&base, &taken);

        let name = name.to_string();
        let insert_slug = slug.clone();
        let (organization, membership) = with_transaction(&self.pool, |tx| {
            Box::pin(async move {
                let organization = sqlx::query_as::<Postgres, Organization>(&format!(
                    r#"
                    INSERT INTO organizations (name, slug)
                    VALUES ($1, $2)
                    RETURNING {}
                    "#,
                    ORGANIZATION_COLUMNS
                ))
                .bind(&name)
                .bind(&insert_slug)
                .fetch_one(&mut **tx)
                .await
                .map_err(|e| {
                    if is_unique_violation(&e) {
                        // Lost a race against a concurrent creation probing
                        // the same base slug.
                        return AppError::Conflict(format!(
                            "Organization slug '{}' is taken",
                            insert_slug
                        ));
                    }
                    tracing::error!(error = %e, "Failed to create organization");
                    AppError::from(e)
                })?;

                let membership = sqlx::query_as::<Postgres, Membership>(
                    r#"
                    INSERT INTO memberships (organization_id, user_id, role, status, accepted_at)
                    VALUES ($1, $2, 'admin', 'active', NOW())
                    RETURNING *
                    "#,
                )
                .bind(organization.id)
                .bind(owner_user_id)
                .fetch_one(&mut **tx)
                .await
                .map_err(|e| {
                    tracing::error!(error = %e, "Failed to create founding membership");
                    AppError::from(e)
                })?;

                Ok((organization, membership))
            })
        })
        .await?;

        tracing::info!(
            organization_id = %organization.id,
            slug = %organization.slug,
            owner_user_id = %owner_user_id,
            "Organization created"
        );
        Ok((organization, membership))
    }

    /// Fetch by id. Soft-deleted organizations are treated as nonexistent.
    pub async fn find_by_id(&self, id: Uuid) -> Result<Option<Organization>, AppError> {
        let organization = sqlx::query_as::<Postgres, Organization>(&format!(
            r#"
            SELECT {} FROM organizations
            WHERE id = $1 AND status != 'deleted'
            "#,
            ORGANIZATION_COLUMNS
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| {
            tracing::error!(error = %e, "Failed to fetch organization by id");
            AppError::from(e)
        })?;

        Ok(organization)
    }

    /// Fetch by slug. Soft-deleted organizations are treated as nonexistent.
    pub async fn find_by_slug(&self, slug: &str) -> Result<Option<Organization>, AppError> {
        let organization = sqlx::query_as::<Postgres, Organization>(&format!(
            r#"
            SELECT {} FROM organizations
            WHERE slug = $1 AND status != 'deleted'
            "#,
            ORGANIZATION_COLUMNS
        ))
        .bind(slug)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| {
            tracing::error!(error = %e, "Failed to fetch organization by slug");
            AppError::from(e)
        })?;

        Ok(organization)
    }

    /// Resolve a route/header identifier that may be a UUID or a slug.
    pub async fn find_by_identifier(
        &self,
        identifier: &str,
    ) -> Result<Option<Organization>, AppError> {
        match Uuid::parse_str(identifier) {
            Ok(id) => self.find_by_id(id).await,
            Err(_) => self.find_by_slug(identifier).await,
        }
    }

    /// Organizations where the user holds an active membership.
    pub async fn list_for_user(&self, user_id: Uuid) -> Result<Vec<Organization>, AppError> {
        let organizations = sqlx::query_as::<Postgres, Organization>(
            r#"
            SELECT o.id, o.name, o.slug, o.status, o.plan, o.max_members, o.max_projects,
                   o.timezone, o.currency, o.date_format, o.created_at, o.updated_at, o.deleted_at
            FROM organizations o
            JOIN memberships m ON m.organization_id = o.id
            WHERE m.user_id = $1 AND m.status = 'active' AND o.status != 'deleted'
            ORDER BY o.created_at
            "#,
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| {
            tracing::error!(error = %e, user_id = %user_id, "Failed to list organizations for user");
            AppError::from(e)
        })?;

        Ok(organizations)
    }

    /// All organizations, any status. Superadmin surface only.
    pub async fn list_all(&self, limit: i64, offset: i64) -> Result<Vec<Organization>, AppError> {
        let organizations = sqlx::query_as::<Postgres, Organization>(&format!(
            r#"
            SELECT {} FROM organizations
            ORDER BY created_at DESC
            LIMIT $1 OFFSET $2
            "#,
            ORGANIZATION_COLUMNS
        ))
        .bind(limit)
        .bind(offset)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| {
            tracing::error!(error = %e, "Failed to list organizations");
            AppError::from(e)
        })?;

        Ok(organizations)
    }

    #[tracing::instrument(skip(self, patch), fields(db.table = "organizations", db.operation = "update"))]
    pub async fn update_settings(
        &self,
        id: Uuid,
        patch: &OrganizationSettingsPatch,
    ) -> Result<Organization, AppError> {
        let organization = sqlx::query_as::<Postgres, Organization>(&format!(
            r#"
            UPDATE organizations
            SET name = COALESCE($2, name),
                plan = COALESCE($3, plan),
                timezone = COALESCE($4, timezone),
                currency = COALESCE($5, currency),
                date_format = COALESCE($6, date_format),
                max_members = COALESCE($7, max_members),
                max_projects = COALESCE($8, max_projects),
                updated_at = NOW()
            WHERE id = $1 AND status != 'deleted'
            RETURNING {}
            "#,
            ORGANIZATION_COLUMNS
        ))
        .bind(id)
        .bind(&patch.name)
        .bind(&patch.plan)
        .bind(&patch.timezone)
        .bind(&patch.currency)
        .bind(&patch.date_format)
        .bind(patch.max_members)
        .bind(patch.max_projects)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| {
            if let sqlx::Error::RowNotFound = e {
                AppError::NotFound("Organization not found".to_string())
            } else {
                tracing::error!(error = %e, "Failed to update organization settings");
                AppError::from(e)
            }
        })?;

        tracing::info!(organization_id = %id, "Organization settings updated");
        Ok(organization)
    }

    /// Explicit rename flow, the only path that changes a slug. The new slug
    /// is derived and probed the same way as at creation, ignoring the
    /// organization's own current slug.
    #[tracing::instrument(skip(self), fields(db.table = "organizations", db.operation = "update"))]
    pub async fn rename_slug(&self, id: Uuid, new_name: &str) -> Result<Organization, AppError> {
        let base = slugify(new_name);
        let taken: Vec<String> = sqlx::query_scalar(
            r#"
            SELECT slug FROM organizations
            WHERE (slug = $1 OR slug LIKE $1 || '-%') AND id != $2
            "#,
        )
        .bind(&base)
        .bind(id)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| {
            tracing::error!(error = %e, "Failed to probe organization slugs");
            AppError::from(e)
        })?;
        let slug = resolve_slug_collision(&base, &taken);

        let organization = sqlx::query_as::<Postgres, Organization>(&format!(
            r#"
            UPDATE organizations
            SET slug = $2, updated_at = NOW()
            WHERE id = $1 AND status != 'deleted'
            RETURNING {}
            "#,
            ORGANIZATION_COLUMNS
        ))
        .bind(id)
        .bind(&slug)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| {
            if let sqlx::Error::RowNotFound = e {
                AppError::NotFound("Organization not found".to_string())
            } else if is_unique_violation(&e) {
                AppError::Conflict(format!("Organization slug '{}' is taken", slug))
            } else {
                tracing::error!(error = %e, "Failed to rename organization slug");
                AppError::from(e)
            }
        })?;

        tracing::info!(organization_id = %id, slug = %slug, "Organization slug renamed");
        Ok(organization)
    }

    /// Soft delete: the row is kept while owned data exists, but every
    /// tenant-scoped lookup excludes it from now on.
    #[tracing::instrument(skip(self), fields(db.table = "organizations", db.operation = "update"))]
    pub async fn soft_delete(&self, id: Uuid) -> Result<(), AppError> {
        let result = sqlx::query(
            r#"
            UPDATE organizations
            SET status = 'deleted', deleted_at = NOW(), updated_at = NOW()
            WHERE id = $1 AND status != 'deleted'
            "#,
        )
        .bind(id)
        .execute(&self.pool)
        .await
        .map_err(|e| {
            tracing::error!(error = %e, "Failed to soft-delete organization");
            AppError::from(e)
        })?;

        if result.rows_affected() == 0 {
            return Err(AppError::NotFound("Organization not found".to_string()));
        }

        tracing::info!(organization_id = %id, "Organization soft-deleted");
        Ok(())
    }
}
