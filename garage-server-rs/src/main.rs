use garage_server::config::AppConfig;
use garage_server::db::connection::{close_pool, create_pool};
use garage_server::db::migrate::migrate;
use garage_server::db::seed::{register_garage_collections, seed_services};
use garage_server::routes;
use garage_server::services::scheduler::BackupScheduler;
use garage_server::state::AppState;
use garage_server::store::SqliteStore;
use std::sync::Arc;
use tokio::signal;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = AppConfig::from_env();

    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| config.log_level.as_str().into()),
        )
        .init();

    tracing::info!("Starting garage server on port {}", config.port);

    std::fs::create_dir_all(&config.data_dir)?;
    std::fs::create_dir_all(&config.backups_dir)?;
    std::fs::create_dir_all(&config.upload_dir)?;

    // Initialize database
    let pool = create_pool(&config.db_path)?;
    migrate(&pool)?;
    let store = SqliteStore::new(pool.clone());
    register_garage_collections(&store)?;
    if config.seed_services {
        match seed_services(&store) {
            Ok(0) => {}
            Ok(n) => tracing::info!(count = n, "Seeded service catalogue"),
            Err(e) => tracing::warn!("Failed to seed services: {}", e),
        }
    }

    let state = Arc::new(AppState::new(Arc::new(store), config.clone()));

    let scheduler = match config.backup_schedule.as_deref() {
        Some(cron) => match start_scheduler(state.clone(), cron).await {
            Ok(s) => Some(s),
            Err(e) => {
                tracing::warn!("Failed to start backup scheduler: {}", e);
                None
            }
        },
        None => None,
    };

    let app = routes::create_router(state.clone());

    let addr = format!("0.0.0.0:{}", config.port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    tracing::info!("Listening on {}", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    tracing::info!("Shutting down...");

    if let Some(s) = scheduler {
        if let Err(e) = s.shutdown().await {
            tracing::warn!("Scheduler shutdown error: {}", e);
        }
    }

    close_pool(&pool);
    tracing::info!("Server stopped");

    Ok(())
}

async fn start_scheduler(state: Arc<AppState>, cron: &str) -> anyhow::Result<BackupScheduler> {
    let scheduler = BackupScheduler::new(state).await?;
    scheduler.schedule(cron).await?;
    scheduler.start().await?;
    Ok(scheduler)
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            tracing::error!("Failed to listen for ctrl+c: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            }
            Err(e) => {
                tracing::error!("Failed to listen for SIGTERM: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => tracing::info!("Received SIGINT"),
        _ = terminate => tracing::info!("Received SIGTERM"),
    }
}
