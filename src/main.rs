use std::sync::Arc;

use anyhow::Result;
use encore_api::{
    config::{Config, StorageKind},
    db::{create_pool, MemoryStore, PgStore, Store},
    routes::{create_router, AppState},
};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("encore_api=info,tower_http=info")),
        )
        .init();

    let config = Config::from_env()?;
    tracing::info!(
        version = env!("CARGO_PKG_VERSION"),
        storage = ?config.storage,
        static_dir = %config.static_dir.display(),
        "Starting encore-api"
    );

    let store: Arc<dyn Store> = match config.storage {
        StorageKind::Postgres => {
            let pool = create_pool(&config.database_url, config.db_max_connections).await?;
            tracing::info!("Connected to PostgreSQL, migrations applied");
            Arc::new(PgStore::new(pool))
        }
        StorageKind::Memory => {
            tracing::warn!("Using in-memory storage, data is lost on shutdown");
            Arc::new(MemoryStore::new())
        }
    };

    let app = create_router(AppState::new(store, &config));

    let listener = tokio::net::TcpListener::bind(config.bind_addr()).await?;
    tracing::info!(addr = %listener.local_addr()?, "Server listening");
    axum::serve(listener, app).await?;

    Ok(())
}
