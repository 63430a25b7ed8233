//! Server configuration loaded from environment variables.
//!
//! All settings have defaults so the server can start with zero
//! configuration for local development.

use std::net::SocketAddr;
use std::path::PathBuf;

use tripcover_shared::constants::{
    DEFAULT_DOMESTIC_RATE_CENTS, DEFAULT_HTTP_PORT, DEFAULT_INTERNATIONAL_RATE_CENTS,
};
use tripcover_shared::Region;

/// Server configuration.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Socket address for the HTTP (axum) API server.
    /// Env: `HTTP_ADDR`
    /// Default: `0.0.0.0:8080`
    pub http_addr: SocketAddr,

    /// SQLite database file.
    /// Env: `DATABASE_PATH`
    /// Default: the platform data directory.
    pub database_path: Option<PathBuf>,

    /// Bearer token required for `ADMIN` actors.
    /// Env: `ADMIN_TOKEN`
    /// Default: empty (admin actions disabled).
    pub admin_token: Option<String>,

    /// Rate seeded for domestic trips when none is stored.
    /// Env: `DOMESTIC_RATE_CENTS`
    pub domestic_rate_cents: i64,

    /// Rate seeded for international trips when none is stored.
    /// Env: `INTERNATIONAL_RATE_CENTS`
    pub international_rate_cents: i64,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            http_addr: ([0, 0, 0, 0], DEFAULT_HTTP_PORT).into(),
            database_path: None,
            admin_token: None,
            domestic_rate_cents: DEFAULT_DOMESTIC_RATE_CENTS,
            international_rate_cents: DEFAULT_INTERNATIONAL_RATE_CENTS,
        }
    }
}

impl ServerConfig {
    /// Load configuration from environment variables, falling back to defaults.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let mut config = Self::default();

        if let Some(addr) = lookup("HTTP_ADDR") {
            if let Ok(parsed) = addr.parse::<SocketAddr>() {
                config.http_addr = parsed;
            } else {
                tracing::warn!(value = %addr, "Invalid HTTP_ADDR, using default");
            }
        }

        if let Some(path) = lookup("DATABASE_PATH") {
            if !path.trim().is_empty() {
                config.database_path = Some(PathBuf::from(path));
            }
        }

        if let Some(token) = lookup("ADMIN_TOKEN") {
            if !token.is_empty() {
                config.admin_token = Some(token);
            }
        }

        if let Some(rate) = parse_rate(lookup("DOMESTIC_RATE_CENTS"), "DOMESTIC_RATE_CENTS") {
            config.domestic_rate_cents = rate;
        }
        if let Some(rate) = parse_rate(
            lookup("INTERNATIONAL_RATE_CENTS"),
            "INTERNATIONAL_RATE_CENTS",
        ) {
            config.international_rate_cents = rate;
        }

        config
    }

    /// Rates to seed for regions without a stored rate.
    pub fn seed_rates(&self) -> [(Region, i64); 2] {
        [
            (Region::Domestic, self.domestic_rate_cents),
            (Region::International, self.international_rate_cents),
        ]
    }
}

fn parse_rate(value: Option<String>, name: &str) -> Option<i64> {
    let value = value?;
    match value.trim().parse::<i64>() {
        Ok(cents) if cents > 0 => Some(cents),
        _ => {
            tracing::warn!(value = %value, name, "Invalid rate, using default");
            None
        }
    }
}
