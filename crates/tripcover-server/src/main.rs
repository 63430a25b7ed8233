//! # tripcover-server
//!
//! HTTP front end for the trip coverage desk.
//!
//! This binary provides:
//! - **REST API** (axum) for trips, travelers, ledger payments, coverage
//!   allocation, receipts and incident claims
//! - **SQLite persistence** through `tripcover-store`, opened once at startup
//! - **Admin gating**: `ADMIN` and `SYSTEM` actors must present the bearer
//!   token from `ADMIN_TOKEN`

mod api;
mod config;
mod error;

use tracing::info;
use tracing_subscriber::EnvFilter;

use tripcover_store::Database;

use crate::api::{AppState, Desk};
use crate::config::ServerConfig;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // -----------------------------------------------------------------------
    // 1. Initialize tracing (respects RUST_LOG env var)
    // -----------------------------------------------------------------------
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("info,tripcover_server=debug")),
        )
        .init();

    info!("Starting tripcover server v{}", env!("CARGO_PKG_VERSION"));

    // -----------------------------------------------------------------------
    // 2. Load configuration
    // -----------------------------------------------------------------------
    let config = ServerConfig::from_env();
    info!(
        addr = %config.http_addr,
        database = ?config.database_path,
        admin_enabled = config.admin_token.is_some(),
        "Loaded configuration"
    );

    // -----------------------------------------------------------------------
    // 3. Open the store and seed rates
    // -----------------------------------------------------------------------
    let desk = open_desk(&config)?;
    let http_addr = config.http_addr;
    let app_state = AppState::new(desk, config);

    // -----------------------------------------------------------------------
    // 4. Run the HTTP API server (blocks until shutdown)
    // -----------------------------------------------------------------------
    tokio::select! {
        result = api::serve(app_state, http_addr) => {
            if let Err(e) = result {
                tracing::error!(error = %e, "HTTP server failed");
                return Err(e);
            }
        }
        _ = tokio::signal::ctrl_c() => {
            info!("Received Ctrl+C, shutting down");
        }
    }

    Ok(())
}

/// Open the configured database and make sure every region has a rate.
fn open_desk(config: &ServerConfig) -> anyhow::Result<Desk> {
    let db = match &config.database_path {
        Some(path) => Database::open_at(path)?,
        None => Database::new()?,
    };
    let mut desk = Desk::new(db);
    desk.seed_default_rates(&config.seed_rates())?;
    Ok(desk)
}
