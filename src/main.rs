// src/main.rs

use std::sync::Arc;
use std::time::Duration;

use sqlx::sqlite::SqlitePoolOptions;
use tracing::{error, info, Level};
use tracing_subscriber::FmtSubscriber;

use engram::api::build_router;
use engram::config::CONFIG;
use engram::memory::scheduler::{
    spawn_abstraction_scheduler, spawn_cleanup_scheduler, spawn_clustering_scheduler,
};
use engram::state::create_app_state;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    let level = CONFIG.log_level.parse::<Level>().unwrap_or(Level::INFO);
    let subscriber = FmtSubscriber::builder().with_max_level(level).finish();
    tracing::subscriber::set_global_default(subscriber)?;

    info!("Starting engram memory engine");
    info!(
        dim = CONFIG.embedding_dim,
        eps = CONFIG.cluster_eps,
        capacity = CONFIG.max_total_fragments,
        "Engine configuration loaded"
    );

    // Create database pool
    let pool = SqlitePoolOptions::new()
        .max_connections(CONFIG.sqlite_max_connections)
        .connect(&CONFIG.database_url)
        .await?;

    let app_state = Arc::new(create_app_state(&CONFIG, pool).await?);

    // Background jobs: clustering, abstraction, cleanup
    let _clustering = spawn_clustering_scheduler(
        app_state.memory_service.clone(),
        Duration::from_secs(CONFIG.cluster_interval_secs),
    );
    let _abstraction = spawn_abstraction_scheduler(
        app_state.memory_service.clone(),
        Duration::from_secs(CONFIG.abstraction_interval_secs),
    );
    let _cleanup = spawn_cleanup_scheduler(
        app_state.memory_service.clone(),
        Duration::from_secs(CONFIG.cleanup_interval_secs),
    );
    info!(
        clustering_secs = CONFIG.cluster_interval_secs,
        abstraction_secs = CONFIG.abstraction_interval_secs,
        cleanup_secs = CONFIG.cleanup_interval_secs,
        "Background schedulers started"
    );

    let app = build_router(app_state.clone());

    let bind_address = CONFIG.bind_address();
    let listener = tokio::net::TcpListener::bind(&bind_address).await?;
    info!("HTTP server listening on http://{}", bind_address);

    let result = axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal(app_state.clone()))
        .await;

    if let Err(e) = result {
        error!("Server error: {}", e);
    }

    Ok(())
}

/// Waits for ctrl-c, then cancels in-flight batch jobs before shutdown.
async fn shutdown_signal(app_state: Arc<engram::state::AppState>) {
    if tokio::signal::ctrl_c().await.is_err() {
        error!("Failed to listen for shutdown signal");
        return;
    }
    info!("Shutdown requested, cancelling background jobs");
    app_state.cancel.cancel();
}
