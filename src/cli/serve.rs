use super::config::{default_config_path, WagateConfig};
use super::logging;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{info, warn};
use wagate::api::{create_router, AppState};
use wagate::storage::{MemStorage, SessionStorage};
use wagate::whatsapp::{BridgeTransportFactory, ConnectionLifecycle, FileCredentialStore};

/// Run the gateway service
///
/// Loads the config (creating a commented default on first run), starts the
/// connection lifecycle against the configured bridge and serves the REST
/// API until Ctrl-C. The session is not opened until `POST /api/connect`.
///
/// ## Configuration Loading
///
/// 1. `--config` flag if provided
/// 2. Default config at `~/.local/share/wagate/config.toml`
///
/// `--bind` overrides `[server] bind`.
pub async fn execute(
    config_path: Option<String>,
    bind: Option<String>,
) -> Result<(), Box<dyn std::error::Error>> {
    println!("🚀 Starting wagate...");
    println!();

    let config_path = config_path
        .map(PathBuf::from)
        .unwrap_or_else(default_config_path);
    println!("Config: {}", config_path.display());

    let config = WagateConfig::load_or_create(&config_path)?;
    println!("Credentials: {}", config.whatsapp.credentials_path.display());
    println!("Bridge: {}", config.whatsapp.bridge_url);
    println!();

    logging::init(&config.logging)?;

    let storage: Arc<dyn SessionStorage> = Arc::new(MemStorage::new());
    let lifecycle = ConnectionLifecycle::spawn(
        config.lifecycle_config(),
        Arc::new(BridgeTransportFactory::new(config.bridge_config())),
        Arc::new(FileCredentialStore::new(&config.whatsapp.credentials_path)),
        Arc::clone(&storage),
    );
    let app = create_router(AppState::new(lifecycle.clone(), storage));

    let bind = bind.unwrap_or_else(|| config.server.bind.clone());
    let listener = tokio::net::TcpListener::bind(&bind)
        .await
        .map_err(|e| format!("Failed to bind '{}': {}", bind, e))?;
    info!("API listening on http://{}", listener.local_addr()?);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("shutting down, closing WhatsApp session");
    lifecycle.disconnect().await?;

    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!(error = %e, "failed to listen for Ctrl-C");
        std::future::pending::<()>().await;
    }
}
