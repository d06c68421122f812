//! services/api/src/config.rs
//!
//! Defines the application's configuration structure and loading logic.
//!
//! All configuration is loaded from environment variables at startup. The `.env`
//! file is used for local development.

use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;
use tracing::Level;

/// Where the remote analysis service is deployed unless told otherwise.
pub const DEFAULT_ANALYZER_URL: &str = "https://docs-backend-271230242037.asia-south1.run.app";

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
    pub analyzer_url: String,
    pub database_url: String,
    pub settings_path: PathBuf,
    pub health_poll_interval: Duration,
    pub health_timeout: Duration,
    pub cors_origin: String,
    pub log_level: Level,
}

impl Config {
    /// Loads configuration from environment variables.
    ///
    /// It will look for a `.env` file in the current directory for development,
    /// but this is skipped in test environments to ensure tests are hermetic.
    pub fn from_env() -> Result<Self, ConfigError> {
        // Only load from .env in non-test mode to avoid contamination.
        if !cfg!(test) {
            dotenvy::dotenv().ok();
        }
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Builds the configuration from any key/value source.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        // --- Local Server ---
        let bind_address_str =
            lookup("BIND_ADDRESS").unwrap_or_else(|| "127.0.0.1:3000".to_string());
        let bind_address = bind_address_str.parse::<SocketAddr>().map_err(|e| {
            ConfigError::InvalidValue("BIND_ADDRESS".to_string(), e.to_string())
        })?;

        let cors_origin =
            lookup("CORS_ORIGIN").unwrap_or_else(|| "http://localhost:5173".to_string());

        let log_level_str = lookup("RUST_LOG").unwrap_or_else(|| "INFO".to_string());
        let log_level = log_level_str.parse::<Level>().map_err(|_| {
            ConfigError::InvalidValue(
                "RUST_LOG".to_string(),
                format!("'{}' is not a valid log level", log_level_str),
            )
        })?;

        // --- Remote Analysis Service ---
        let analyzer_url = lookup("ANALYZER_API_URL")
            .map(|url| url.trim_end_matches('/').to_string())
            .unwrap_or_else(|| DEFAULT_ANALYZER_URL.to_string());
        if !analyzer_url.starts_with("http://") && !analyzer_url.starts_with("https://") {
            return Err(ConfigError::InvalidValue(
                "ANALYZER_API_URL".to_string(),
                format!("'{}' is not an http(s) URL", analyzer_url),
            ));
        }

        let health_poll_interval =
            Duration::from_millis(parse_u64(&lookup, "HEALTH_POLL_INTERVAL_MS", 10_000)?);
        let health_timeout = Duration::from_secs(parse_u64(&lookup, "HEALTH_TIMEOUT_SECS", 15)?);

        // --- Local Persistence ---
        let database_url =
            lookup("DATABASE_URL").unwrap_or_else(|| "sqlite://analysis_history.db".to_string());
        let settings_path = lookup("SETTINGS_PATH")
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from("./settings.json"));

        Ok(Self {
            bind_address,
            analyzer_url,
            database_url,
            settings_path,
            health_poll_interval,
            health_timeout,
            cors_origin,
            log_level,
        })
    }
}

fn parse_u64<F>(lookup: &F, key: &str, default: u64) -> Result<u64, ConfigError>
where
    F: Fn(&str) -> Option<String>,
{
    match lookup(key) {
        None => Ok(default),
        Some(raw) => match raw.trim().parse::<u64>() {
            Ok(0) => Err(ConfigError::InvalidValue(
                key.to_string(),
                "must be greater than zero".to_string(),
            )),
            Ok(value) => Ok(value),
            Err(e) => Err(ConfigError::InvalidValue(key.to_string(), e.to_string())),
        },
    }
}
