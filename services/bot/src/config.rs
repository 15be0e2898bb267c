//! services/bot/src/config.rs
//!
//! Defines the application's configuration structure and loading logic.
//!
//! All configuration is loaded from environment variables at startup. The `.env`
//! file is used for local development.

use std::net::SocketAddr;
use std::time::Duration;
use tracing::Level;

pub const DEFAULT_REGISTRATION_URL: &str = "https://backoffice.comgestfx.com/api/quick-register";

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
    /// Absent means the volatile session store is used.
    pub database_url: Option<String>,
    pub db_max_connections: u32,
    pub log_level: Level,
    pub registration_url: String,
    pub registration_timeout: Duration,
    /// Where outbound replies are pushed; absent means replies are only logged.
    pub channel_gateway_url: Option<String>,
    pub admin_token: Option<String>,
    pub correspondent_suffix: String,
}

impl Config {
    /// Loads configuration from environment variables.
    ///
    /// It will look for a `.env` file in the current directory for development,
    /// but this is skipped in test environments to ensure tests are hermetic.
    pub fn from_env() -> Result<Self, ConfigError> {
        if !cfg!(test) {
            dotenvy::dotenv().ok();
        }
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Builds the configuration from any key lookup.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        // --- Server and Database Settings ---
        let bind_address_str = lookup("BIND_ADDRESS").unwrap_or_else(|| "0.0.0.0:3001".to_string());
        let bind_address = bind_address_str.parse::<SocketAddr>().map_err(|e| {
            ConfigError::InvalidValue("BIND_ADDRESS".to_string(), e.to_string())
        })?;

        let database_url = lookup("DATABASE_URL").filter(|url| !url.trim().is_empty());
        let db_max_connections = parse_or("DB_MAX_CONNECTIONS", lookup("DB_MAX_CONNECTIONS"), 5u32)?;

        let log_level_str = lookup("RUST_LOG").unwrap_or_else(|| "INFO".to_string());
        let log_level = log_level_str.parse::<Level>().map_err(|_| {
            ConfigError::InvalidValue(
                "RUST_LOG".to_string(),
                format!("'{}' is not a valid log level", log_level_str),
            )
        })?;

        // --- Registration API ---
        let registration_url =
            lookup("REGISTRATION_API_URL").unwrap_or_else(|| DEFAULT_REGISTRATION_URL.to_string());
        let timeout_secs = parse_or("REGISTRATION_TIMEOUT_SECS", lookup("REGISTRATION_TIMEOUT_SECS"), 15u64)?;
        if timeout_secs == 0 {
            return Err(ConfigError::InvalidValue(
                "REGISTRATION_TIMEOUT_SECS".to_string(),
                "must be greater than zero".to_string(),
            ));
        }

        // --- Channel and Admin Settings ---
        let channel_gateway_url = lookup("CHANNEL_GATEWAY_URL").filter(|url| !url.trim().is_empty());
        let admin_token = lookup("ADMIN_TOKEN").filter(|token| !token.is_empty());
        let correspondent_suffix = lookup("CORRESPONDENT_SUFFIX").unwrap_or_else(|| "@c.us".to_string());

        Ok(Self {
            bind_address,
            database_url,
            db_max_connections,
            log_level,
            registration_url,
            registration_timeout: Duration::from_secs(timeout_secs),
            channel_gateway_url,
            admin_token,
            correspondent_suffix,
        })
    }
}

fn parse_or<T: std::str::FromStr>(key: &str, value: Option<String>, default: T) -> Result<T, ConfigError>
where
    T::Err: std::fmt::Display,
{
    match value {
        Some(raw) => raw
            .trim()
            .parse::<T>()
            .map_err(|e| ConfigError::InvalidValue(key.to_string(), e.to_string())),
        None => Ok(default),
    }
}
