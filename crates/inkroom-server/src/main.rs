use clap::Parser;
use inkroom_server::config::Config;
use inkroom_server::store::{DurableStore, MemoryStore, SqliteStore};
use inkroom_server::{AppState, app};
use std::sync::Arc;
use tracing::{info, warn};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    dotenvy::dotenv().ok();

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "inkroom_server=info,tower_http=info".into()),
        )
        .init();

    let config = Config::parse();
    config.validate()?;
    let sessions = config.session_provider()?;

    let store: Arc<dyn DurableStore> = match &config.database_url {
        Some(url) => {
            info!(url = %url, "using sqlite element store");
            Arc::new(SqliteStore::connect(url).await?)
        }
        None => {
            warn!("DATABASE_URL not set, elements are kept in memory");
            Arc::new(MemoryStore::new())
        }
    };

    let state = Arc::new(AppState::new(store, sessions, config.hydrate_limit));

    let listener = tokio::net::TcpListener::bind(config.bind).await?;
    info!(addr = %config.bind, "Inkroom relay server listening");
    info!("WebSocket endpoint: ws://{}/ws?token=<credential>", config.bind);

    axum::serve(listener, app(state)).await?;
    Ok(())
}
