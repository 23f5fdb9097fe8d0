//! Database transaction utilities
//!
//! Multi-step membership writes (role transitions, revocations, founding-admin
//! creation) must hold their row locks and commit or roll back as one unit.

use sqlx::{PgPool, Postgres, Transaction};
use std::pin::Pin;
use tempo_core::AppError;

/// Execute a closure within a database transaction
///
/// Begins a transaction, executes the provided closure with it, and commits
/// if successful or rolls back on error.
///
/// # Arguments
/// * `pool` - Database connection pool
/// * `f` - Closure that receives a transaction and returns a boxed future
///
/// # Returns
/// The result of the closure, or a database error if transaction management
/// fails. A rollback failure is logged alongside the original error; the
/// original error is the one returned.
pub async fn with_transaction<T, F>(pool: &PgPool, f: F) -> Result<T, AppError>
where
    F: for<'a> FnOnce(
        &'a mut Transaction<'_, Postgres>,
    ) -> Pin<
        Box<dyn std::future::Future<Output = Result<T, AppError>> + Send + 'a>,
    >,
{
    let mut tx = pool.begin().await.map_err(|e| {
        tracing::error!(error = %e, "Failed to begin transaction");
        AppError::from(e)
    })?;

    match f(&mut tx).await {
        Ok(result) => {
            tx.commit().await.map_err(|e| {
                tracing::error!(error = %e, "Failed to commit transaction");
                AppError::from(e)
            })?;
            Ok(result)
        }
        Err(e) => {
            if let Err(rollback_err) = tx.rollback().await {
                tracing::error!(
                    error = %rollback_err,
                    original_error = %e,
                    "Failed to rollback transaction"
                );
            }
            Err(e)
        }
    }
}
