use std::sync::Arc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use onetoten::{
    abuse::AbuseConfig,
    config::ServerConfig,
    history::SqliteHistory,
    state::{spawn_idle_sweeper, AppState},
};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Load .env file if present (before any env var reads)
    if let Err(e) = dotenvy::dotenv() {
        // Not an error if .env doesn't exist, only log if it's a different issue
        if !matches!(e, dotenvy::Error::Io(_)) {
            eprintln!("Warning: Failed to load .env file: {}", e);
        }
    }

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "onetoten=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    tracing::info!("Starting onetoten...");

    let config = ServerConfig::from_env();
    let abuse = AbuseConfig::from_env();

    let history = SqliteHistory::open(&config.db_path).await?;

    let state = AppState::new(Arc::new(history), config.rooms.clone())
        .with_abuse(abuse)
        .with_history_limit(config.history_limit);

    // Periodically drop rooms past the idle ceiling
    spawn_idle_sweeper(state.clone());

    let app = onetoten::app(Arc::new(state), &config.static_dir);

    let addr = config.socket_addr();
    tracing::info!("Listening on http://{}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;
    Ok(())
}
