//! Client process configuration
//!
//! Loads configuration from environment variables (and an optional `.env`
//! file). The protocol engine itself takes a validated options struct; this
//! is only the outer wiring for binaries.

use std::env;

/// Configuration for a gateway client process
#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// Authentication token presented in IDENTIFY
    pub token: String,
    /// Gateway WebSocket URL (e.g. `wss://gateway.example.com`)
    pub gateway_url: String,
    /// Shard assignment for this process
    pub shard_id: u16,
    /// Total shard count
    pub shard_count: u16,
}

fn default_shard_id() -> u16 {
    0
}

fn default_shard_count() -> u16 {
    1
}

impl ClientConfig {
    /// Load configuration from environment variables
    ///
    /// # Errors
    /// Returns an error if required environment variables are missing
    /// or cannot be parsed.
    pub fn from_env() -> Result<Self, ConfigError> {
        // Load .env file if present (ignore errors if not found)
        let _ = dotenvy::dotenv();

        Ok(Self {
            token: env::var("PULSE_TOKEN").map_err(|_| ConfigError::MissingVar("PULSE_TOKEN"))?,
            gateway_url: env::var("PULSE_GATEWAY_URL")
                .map_err(|_| ConfigError::MissingVar("PULSE_GATEWAY_URL"))?,
            shard_id: parse_or("PULSE_SHARD_ID", default_shard_id)?,
            shard_count: parse_or("PULSE_SHARD_COUNT", default_shard_count)?,
        })
    }
}

fn parse_or(name: &'static str, default: fn() -> u16) -> Result<u16, ConfigError> {
    match env::var(name) {
        Err(_) => Ok(default()),
        Ok(raw) => raw
            .parse()
            .map_err(|_| ConfigError::InvalidValue(name, raw)),
    }
}

/// Configuration errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Missing required environment variable: {0}")]
    MissingVar(&'static str),

    #[error("Invalid value for {0}: {1}")]
    InvalidValue(&'static str, String),
}
