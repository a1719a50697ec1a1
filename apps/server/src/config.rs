//! Server configuration.
//!
//! All configuration is loaded from environment variables at startup. A
//! `.env` file is honored for local development.

use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;

/// A custom error type for configuration loading failures.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Invalid value for the environment variable {0}: {1}")]
    InvalidValue(String, String),
}

/// Holds all configuration loaded from the environment at startup.
#[derive(Clone, Debug)]
pub struct Config {
    pub bind_address: SocketAddr,
    pub database_path: PathBuf,
    /// GET endpoint returning `{ "promedio": <Bs per USD> }`.
    pub rate_api_url: String,
    /// Cadence of the background rate poll.
    pub rate_sync_interval: Duration,
    /// Stored rates younger than this are not refreshed.
    pub rate_staleness: Duration,
    /// Shop name printed on receipts.
    pub store_name: String,
}

impl Config {
    /// Loads configuration from environment variables.
    ///
    /// Looks for a `.env` file in the current directory for development;
    /// skipped in tests to keep them hermetic.
    pub fn from_env() -> Result<Self, ConfigError> {
        if !cfg!(test) {
            dotenvy::dotenv().ok();
        }

        let bind_address_str =
            std::env::var("BIND_ADDRESS").unwrap_or_else(|_| "0.0.0.0:3000".to_string());
        let bind_address = bind_address_str
            .parse::<SocketAddr>()
            .map_err(|e| ConfigError::InvalidValue("BIND_ADDRESS".to_string(), e.to_string()))?;

        let database_path = std::env::var("DATABASE_PATH")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from("./turpial.db"));

        let rate_api_url = std::env::var("RATE_API_URL")
            .unwrap_or_else(|_| "https://ve.dolarapi.com/v1/dolares/oficial".to_string());

        let rate_sync_interval = duration_var("RATE_SYNC_INTERVAL_SECS", 3600)?;
        let rate_staleness = duration_var("RATE_STALENESS_SECS", 4 * 3600)?;

        let store_name =
            std::env::var("STORE_NAME").unwrap_or_else(|_| "Turpial Móvil C.A.".to_string());

        Ok(Self {
            bind_address,
            database_path,
            rate_api_url,
            rate_sync_interval,
            rate_staleness,
            store_name,
        })
    }
}

fn duration_var(name: &str, default_secs: u64) -> Result<Duration, ConfigError> {
    match std::env::var(name) {
        Err(_) => Ok(Duration::from_secs(default_secs)),
        Ok(raw) => raw
            .parse::<u64>()
            .map(Duration::from_secs)
            .map_err(|e| ConfigError::InvalidValue(name.to_string(), e.to_string())),
    }
}
