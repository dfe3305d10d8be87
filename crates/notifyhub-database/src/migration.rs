//! Schema migrations for the notification tables.

use sqlx::PgPool;
use sqlx::migrate::Migrator;
use tracing::info;

use notifyhub_core::error::{AppError, ErrorKind};

static MIGRATOR: Migrator = sqlx::migrate!("../../migrations");

/// Newest migration version bundled with this build.
pub fn latest_version() -> Option<i64> {
    MIGRATOR.iter().map(|m| m.version).max()
}

/// Apply pending migrations and log the schema version reached.
pub async fn run_migrations(pool: &PgPool) -> Result<(), AppError> {
    MIGRATOR.run(pool).await.map_err(|e| {
        AppError::with_source(ErrorKind::Database, format!("Failed to run migrations: {e}"), e)
    })?;
    info!(
        bundled = MIGRATOR.iter().count(),
        schema_version = ?latest_version(),
        "Notification schema up to date"
    );
    Ok(())
}
