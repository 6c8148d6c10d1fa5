use std::sync::Arc;

use axum::Router;
use configs::{AppConfig, ServerConfig, StoreBackend, StoreConfig};
use dotenvy::dotenv;
use tokio::net::TcpListener;
use tracing::info;

use common::utils::logging::init_logging_with_format;
use service::{
    items::ItemHandler,
    storage::{JsonFileStore, KvStore, MemoryStore},
};

use crate::errors::StartupError;
use crate::routes::{self, AppState};

/// Create the process-wide store client once; it is injected into the handler.
pub async fn build_store(cfg: &StoreConfig) -> Result<Arc<dyn KvStore>, StartupError> {
    cfg.validate()
        .map_err(|e| StartupError::InvalidConfig(e.to_string()))?;
    let store: Arc<dyn KvStore> = match cfg.backend {
        StoreBackend::Memory => Arc::new(MemoryStore::new(cfg.table_name.clone())),
        StoreBackend::File => {
            common::env::ensure_data_dir(&cfg.data_dir).await?;
            JsonFileStore::open(&cfg.data_dir, &cfg.table_name).await?
        }
    };
    info!(
        backend = ?cfg.backend,
        table = %cfg.table_name,
        primary_key = %cfg.primary_key,
        "item store ready"
    );
    Ok(store)
}

/// Build the router for an already constructed store.
pub fn build_app(store: Arc<dyn KvStore>, primary_key: &str) -> Router {
    let handler = ItemHandler::new(store, primary_key);
    routes::build_router(AppState::new(handler))
}

async fn bind(cfg: &ServerConfig) -> anyhow::Result<TcpListener> {
    let listener = TcpListener::bind((cfg.host.as_str(), cfg.port)).await?;
    Ok(listener)
}

/// Public entry: load config, build the app and run the HTTP server
pub async fn run() -> anyhow::Result<()> {
    dotenv().ok();
    let cfg = AppConfig::load_and_validate()?;
    run_with_config(cfg).await
}

/// Run the server with a config that has already been loaded and validated.
pub async fn run_with_config(cfg: AppConfig) -> anyhow::Result<()> {
    init_logging_with_format(&cfg.logging.format);

    let store = build_store(&cfg.store).await?;
    let app = build_app(store, &cfg.store.primary_key);

    let listener = bind(&cfg.server).await?;
    let addr = listener.local_addr()?;
    info!(%addr, table = %cfg.store.table_name, "starting items server");
    axum::serve(listener, app).await?;
    Ok(())
}
