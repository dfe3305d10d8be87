//! PostgreSQL pool for the notification store and user directory.

use std::str::FromStr;
use std::time::Duration;

use sqlx::postgres::{PgConnectOptions, PgPool, PgPoolOptions};
use tracing::info;

use notifyhub_core::config::DatabaseConfig;
use notifyhub_core::error::{AppError, ErrorKind};

/// `application_name` reported to PostgreSQL so engine sessions are
/// identifiable in `pg_stat_activity`.
const APPLICATION_NAME: &str = "notifyhub";

/// Tables the engine reads and writes.
const REQUIRED_TABLES: [&str; 2] = ["notifications", "users"];

/// Shared sqlx pool.
#[derive(Debug, Clone)]
pub struct DatabasePool {
    pool: PgPool,
}

impl DatabasePool {
    /// Connect using the configured pool limits.
    pub async fn connect(config: &DatabaseConfig) -> Result<Self, AppError> {
        info!(
            url = %mask_password(&config.url),
            max_connections = config.max_connections,
            min_connections = config.min_connections,
            "Connecting notification store to PostgreSQL"
        );

        let options = PgConnectOptions::from_str(&config.url)
            .map_err(|e| AppError::with_source(ErrorKind::Configuration, "Invalid database.url", e))?
            .application_name(APPLICATION_NAME);

        let pool = PgPoolOptions::new()
            .max_connections(config.max_connections)
            .min_connections(config.min_connections)
            .acquire_timeout(Duration::from_secs(config.connect_timeout_seconds))
            .idle_timeout(Duration::from_secs(config.idle_timeout_seconds))
            .connect_with(options)
            .await
            .map_err(|e| {
                AppError::with_source(ErrorKind::Database, format!("Failed to connect to database: {e}"), e)
            })?;

        Ok(Self { pool })
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    pub async fn close(&self) {
        self.pool.close().await;
        info!("Database pool closed");
    }
}

/// Whether every table the engine needs is present. A reachable database
/// that has not been migrated reports unhealthy.
pub(crate) async fn schema_ready(pool: &PgPool) -> Result<bool, AppError> {
    let names: Vec<String> = REQUIRED_TABLES.iter().map(|t| (*t).to_string()).collect();
    let present: i64 = sqlx::query_scalar(
        "SELECT COUNT(*) FROM information_schema.tables \
         WHERE table_schema = current_schema() AND table_name::text = ANY($1)",
    )
    .bind(&names)
    .fetch_one(pool)
    .await
    .map_err(|e| AppError::with_source(ErrorKind::Database, "Store health check failed", e))?;
    Ok(present as usize == REQUIRED_TABLES.len())
}

/// Hide the password of a database URL for logging.
fn mask_password(url: &str) -> String {
    let scheme_end = url.find("://").map_or(0, |p| p + 3);
    match url.rfind('@') {
        Some(at) if at > scheme_end => match url[scheme_end..at].find(':') {
            Some(colon) => format!("{}:****{}", &url[..scheme_end + colon], &url[at..]),
            None => url.to_string(),
        },
        _ => url.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mask_password() {
        assert_eq!(
            mask_password("postgres://notifyhub:secret@db:5432/notifyhub"),
            "postgres://notifyhub:****@db:5432/notifyhub"
        );
        assert_eq!(mask_password("postgres://db:5432/notifyhub"), "postgres://db:5432/notifyhub");
        assert_eq!(
            mask_password("postgres://svc@db/notifyhub"),
            "postgres://svc@db/notifyhub"
        );
        assert_eq!(
            mask_password("postgres://svc:p@ss@db/notifyhub"),
            "postgres://svc:****@db/notifyhub"
        );
    }
}
