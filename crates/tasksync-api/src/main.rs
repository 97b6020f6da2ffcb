//! tasksync-api server binary.

use std::net::SocketAddr;
use std::sync::Arc;

use tracing::{info, warn};

use tasksync_api::telemetry::{init_tracing, LogSettings};
use tasksync_api::{cors_layer, router, AppState, ServerConfig};
use tasksync_core::{BoardLookup, EventBus, InMemoryBoardLookup};
use tasksync_db::{create_pool_with_config, log_pool_metrics, PoolConfig, SqliteColumnRepository};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load environment variables
    dotenvy::dotenv().ok();

    let log_settings = LogSettings::from_env();
    let _log_guard = init_tracing(&log_settings);
    info!(
        json = log_settings.json,
        destination = %log_settings.destination(),
        "Logging initialized"
    );

    let config = ServerConfig::from_env()?;
    info!(
        host = %config.host,
        port = config.port,
        event_log_capacity = config.event_log_capacity,
        heartbeat_secs = config.heartbeat_interval.as_secs(),
        "Configuration loaded"
    );

    // Board lookups need the task database. Without it the server still
    // streams and polls; only the board filter loses task events.
    let pool_config = PoolConfig::new()
        .max_connections(config.db_max_connections)
        .read_only(true);
    let boards: Arc<dyn BoardLookup> =
        match create_pool_with_config(&config.database_url, pool_config).await {
            Ok(pool) => {
                log_pool_metrics(&pool);
                Arc::new(SqliteColumnRepository::new(pool))
            }
            Err(e) => {
                warn!(
                    subsystem = "db",
                    error = %e,
                    database_url = %config.database_url,
                    "Database unavailable, board filter will exclude task events"
                );
                Arc::new(InMemoryBoardLookup::new())
            }
        };

    let event_bus = EventBus::new(config.event_log_capacity);
    let state = AppState::new(event_bus, boards).with_heartbeat(config.heartbeat_interval);

    let app = router(state).layer(cors_layer(config.allowed_origins.clone()));

    // Start server
    let addr: SocketAddr = config.bind_address().parse()?;
    info!("Starting server on {}", addr);
    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
