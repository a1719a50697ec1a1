//! Turpial POS server binary.

use std::sync::Arc;

use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use turpial_db::{Database, DbConfig};
use turpial_server::config::Config;
use turpial_server::state::AppState;
use turpial_server::{rates, routes};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // --- Configuration & logging ---
    let config = Arc::new(Config::from_env()?);
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();
    info!("Configuration loaded. Starting server...");

    // --- Database (runs migrations on connect) ---
    let db = Database::new(DbConfig::new(&config.database_path)).await?;

    let state = AppState::new(db, config.clone());

    // --- Background rate sync (fire-and-forget) ---
    tokio::spawn(rates::run(state.clone()));

    // --- Router & serve ---
    let app = routes::router(state);

    info!("Listening on {}", config.bind_address);
    let listener = tokio::net::TcpListener::bind(&config.bind_address).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
