//! NotifyHub server: notification routing and delivery engine.
//!
//! Main entry point that wires all crates together and starts the server.

use std::sync::Arc;

use tracing;
use tracing_subscriber::{EnvFilter, fmt};

use notifyhub_core::config::{AppConfig, StoreBackend};
use notifyhub_core::error::AppError;
use notifyhub_database::{
    DatabasePool, InMemoryNotificationStore, NotificationStore, PgNotificationStore, PgUserDirectory,
    StaticUserDirectory, UserDirectory,
};
use notifyhub_entity::UserRole;
use notifyhub_realtime::NotificationEngine;
use notifyhub_worker::tasks::{EngineHealthTask, LimiterPruneTask, NotificationCleanupTask};
use notifyhub_worker::{CronScheduler, TaskExecutor};

#[tokio::main]
async fn main() {
    let env = std::env::var("NOTIFYHUB_ENV").unwrap_or_else(|_| "development".to_string());
    let config = match AppConfig::load(&env) {
        Ok(c) => c,
        Err(e) => {
            eprintln!("Failed to load configuration: {}", e);
            std::process::exit(1);
        }
    };

    init_logging(&config);
    tracing::info!(env = %env, "Configuration loaded");

    if let Err(e) = run(config).await {
        tracing::error!("Server error: {}", e);
        std::process::exit(1);
    }
}

/// Initialize tracing/logging. `RUST_LOG` overrides the configured level.
fn init_logging(config: &AppConfig) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.logging.level));

    match config.logging.format.as_str() {
        "json" => {
            fmt()
                .json()
                .with_env_filter(filter)
                .with_target(true)
                .with_thread_ids(true)
                .init();
        }
        _ => {
            fmt()
                .pretty()
                .with_env_filter(filter)
                .with_target(true)
                .init();
        }
    }
}

/// Storage seams plus the pool to close on shutdown.
struct Backends {
    store: Arc<dyn NotificationStore>,
    directory: Arc<dyn UserDirectory>,
    pool: Option<DatabasePool>,
}

async fn open_backends(config: &AppConfig) -> Result<Backends, AppError> {
    match config.database.backend {
        StoreBackend::Postgres => {
            let pool = DatabasePool::connect(&config.database).await?;
            if config.database.run_migrations {
                notifyhub_database::migration::run_migrations(pool.pool()).await?;
            }
            Ok(Backends {
                store: Arc::new(PgNotificationStore::new(pool.pool().clone())),
                directory: Arc::new(PgUserDirectory::new(pool.pool().clone())),
                pool: Some(pool),
            })
        }
        StoreBackend::Memory => {
            let directory = StaticUserDirectory::new();
            for (user_id, role) in &config.database.static_users {
                let role: UserRole = role.parse()?;
                directory.insert(user_id.as_str(), role);
            }
            tracing::warn!(
                users = config.database.static_users.len(),
                "Using in-memory notification store; messages are lost on restart"
            );
            Ok(Backends {
                store: Arc::new(InMemoryNotificationStore::new()),
                directory: Arc::new(directory),
                pool: None,
            })
        }
    }
}

/// Main server run function
async fn run(config: AppConfig) -> Result<(), AppError> {
    tracing::info!("Starting NotifyHub v{}", env!("CARGO_PKG_VERSION"));

    // ── Step 1: Storage ──────────────────────────────────────────
    let backends = open_backends(&config).await?;

    // ── Step 2: Engine ───────────────────────────────────────────
    let engine = Arc::new(NotificationEngine::with_session_registry(
        config.clone(),
        backends.store,
        backends.directory,
    )?);
    engine.start();
    tracing::info!(level = %config.performance.level, "Notification engine started");

    // ── Step 3: Scheduled maintenance ────────────────────────────
    let scheduler = if config.worker.enabled {
        let mut executor = TaskExecutor::new();
        executor.register(Arc::new(NotificationCleanupTask::new(Arc::clone(engine.manager()))));
        executor.register(Arc::new(LimiterPruneTask::new(Arc::clone(&engine))));
        executor.register(Arc::new(EngineHealthTask::new(Arc::clone(&engine))));

        let scheduler = CronScheduler::new(Arc::new(executor)).await?;
        scheduler.register_default_tasks(&config.worker).await?;
        scheduler.start().await?;
        Some(scheduler)
    } else {
        tracing::info!("Scheduled maintenance disabled");
        None
    };

    // ── Step 4: HTTP server ──────────────────────────────────────
    let app = notifyhub_api::build_router(notifyhub_api::AppState::new(Arc::clone(&engine)));
    let addr = config.server.bind_address();
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .map_err(|e| AppError::internal(format!("Failed to bind {}: {}", addr, e)))?;
    tracing::info!(address = %addr, "HTTP server listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(async {
            shutdown_signal().await;
            tracing::info!("Shutdown signal received, starting graceful shutdown...");
        })
        .await
        .map_err(|e| AppError::internal(format!("Server error: {}", e)))?;

    // ── Step 5: Teardown ─────────────────────────────────────────
    if let Some(scheduler) = scheduler {
        if let Err(e) = scheduler.shutdown().await {
            tracing::warn!("Scheduler shutdown failed: {}", e);
        }
    }
    engine.shutdown().await;
    if let Some(pool) = backends.pool {
        pool.close().await;
    }

    tracing::info!("NotifyHub shut down cleanly");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!("Failed to listen for Ctrl+C: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                tracing::error!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}
