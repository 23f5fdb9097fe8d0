//! Tenant-scoped query building
//!
//! Every read of a tenant-owned table goes through `ScopedQuery::select`, which
//! pre-filters on the resolved organization, and every insert goes through
//! `ScopedQuery::insert`, which stamps `organization_id` from the context.
//! With no resolved context, selects match nothing and inserts are rejected
//! before touching the database.
//!
//! SQL is assembled with explicit `$n` placeholders and the arguments are
//! encoded in the same order, so the shape of the final statement is
//! inspectable in unit tests via `sql()`.

use sqlx::postgres::{PgArguments, PgRow};
use sqlx::{Arguments, Encode, Executor, Postgres, Type};
use std::marker::PhantomData;
use tempo_core::{AppError, TenantContext, TenantOwned};

/// Entry points for building organization-filtered statements.
pub struct ScopedQuery;

impl ScopedQuery {
    /// Start a SELECT over a tenant-owned table, pre-filtered to the resolved
    /// organization. Passing `None` produces a statement that matches nothing.
    pub fn select<T>(ctx: Option<&TenantContext>) -> ScopedSelect<T>
    where
        T: TenantOwned,
    {
        let mut sql = format!("SELECT {} FROM {}", T::SELECT_COLUMNS, T::TABLE);
        let mut arguments = PgArguments::default();
        let mut next_param = 1;

        match ctx {
            Some(ctx) => {
                sql.push_str(&format!(" WHERE organization_id = ${}", next_param));
                // Encoding a Uuid cannot fail.
                let _ = arguments.add(ctx.organization_id);
                next_param += 1;
            }
            None => {
                sql.push_str(" WHERE FALSE");
            }
        }

        ScopedSelect {
            sql,
            arguments,
            next_param,
            marker: PhantomData,
        }
    }

    /// Start an INSERT into a tenant-owned table. The `organization_id`
    /// column always comes from the resolved context, never from caller
    /// input; with no context the insert is rejected outright.
    pub fn insert<T>(ctx: Option<&TenantContext>) -> Result<ScopedInsert<T>, AppError>
    where
        T: TenantOwned,
    {
        let Some(ctx) = ctx else {
            return Err(AppError::Forbidden(format!(
                "insert into {} attempted with no resolved organization",
                T::TABLE
            )));
        };

        let mut arguments = PgArguments::default();
        let _ = arguments.add(ctx.organization_id);

        Ok(ScopedInsert {
            columns: vec!["organization_id"],
            arguments,
            next_param: 2,
            marker: PhantomData,
        })
    }
}

/// A SELECT under construction. Filter methods append in call order, so add
/// predicates before `order_by`/`limit`/`offset`.
pub struct ScopedSelect<T> {
    sql: String,
    arguments: PgArguments,
    next_param: usize,
    marker: PhantomData<T>,
}

impl<T> ScopedSelect<T>
where
    T: TenantOwned + for<'r> sqlx::FromRow<'r, PgRow> + Send + Unpin,
{
    /// Append `AND column = $n`. The column name must be a trusted literal.
    pub fn filter_eq<V>(mut self, column: &str, value: V) -> Result<Self, AppError>
    where
        V: for<'q> Encode<'q, Postgres> + Type<Postgres> + Send + 'static,
    {
        self.sql
            .push_str(&format!(" AND {} = ${}", column, self.next_param));
        self.arguments
            .add(value)
            .map_err(|e| AppError::Internal(format!("Failed to encode query argument: {}", e)))?;
        self.next_param += 1;
        Ok(self)
    }

    pub fn order_by(mut self, clause: &str) -> Self {
        self.sql.push_str(&format!(" ORDER BY {}", clause));
        self
    }

    pub fn limit(mut self, limit: i64) -> Result<Self, AppError> {
        self.sql.push_str(&format!(" LIMIT ${}", self.next_param));
        self.arguments
            .add(limit)
            .map_err(|e| AppError::Internal(format!("Failed to encode query argument: {}", e)))?;
        self.next_param += 1;
        Ok(self)
    }

    pub fn offset(mut self, offset: i64) -> Result<Self, AppError> {
        self.sql.push_str(&format!(" OFFSET ${}", self.next_param));
        self.arguments
            .add(offset)
            .map_err(|e| AppError::Internal(format!("Failed to encode query argument: {}", e)))?;
        self.next_param += 1;
        Ok(self)
    }

    /// The statement text as built so far.
    pub fn sql(&self) -> &str {
        &self.sql
    }

    pub async fn fetch_all<'e, E>(self, executor: E) -> Result<Vec<T>, AppError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        let ScopedSelect { sql, arguments, .. } = self;
        sqlx::query_as_with::<Postgres, T, _>(&sql, arguments)
            .fetch_all(executor)
            .await
            .map_err(|e| {
                tracing::error!(error = %e, table = T::TABLE, "Scoped select failed");
                AppError::from(e)
            })
    }

    pub async fn fetch_optional<'e, E>(self, executor: E) -> Result<Option<T>, AppError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        let ScopedSelect { sql, arguments, .. } = self;
        sqlx::query_as_with::<Postgres, T, _>(&sql, arguments)
            .fetch_optional(executor)
            .await
            .map_err(|e| {
                tracing::error!(error = %e, table = T::TABLE, "Scoped select failed");
                AppError::from(e)
            })
    }
}

/// An INSERT under construction, already stamped with the context's
/// organization id as its first column.
#[derive(Debug)]
pub struct ScopedInsert<T> {
    columns: Vec<&'static str>,
    arguments: PgArguments,
    next_param: usize,
    marker: PhantomData<T>,
}

impl<T> ScopedInsert<T>
where
    T: TenantOwned + for<'r> sqlx::FromRow<'r, PgRow> + Send + Unpin,
{
    pub fn value<V>(mut self, column: &'static str, value: V) -> Result<Self, AppError>
    where
        V: for<'q> Encode<'q, Postgres> + Type<Postgres> + Send + 'static,
    {
        self.columns.push(column);
        self.arguments
            .add(value)
            .map_err(|e| AppError::Internal(format!("Failed to encode query argument: {}", e)))?;
        self.next_param += 1;
        Ok(self)
    }

    /// The statement text that `fetch_one` will execute.
    pub fn sql(&self) -> String {
        let placeholders: Vec<String> = (1..self.next_param).map(|n| format!("${}", n)).collect();
        format!(
            "INSERT INTO {} ({}) VALUES ({}) RETURNING {}",
            T::TABLE,
            self.columns.join(", "),
            placeholders.join(", "),
            T::SELECT_COLUMNS
        )
    }

    pub async fn fetch_one<'e, E>(self, executor: E) -> Result<T, AppError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        let sql = self.sql();
        sqlx::query_as_with::<Postgres, T, _>(&sql, self.arguments)
            .fetch_one(executor)
            .await
            .map_err(|e| {
                tracing::error!(error = %e, table = T::TABLE, "Scoped insert failed");
                AppError::from(e)
            })
    }
}
