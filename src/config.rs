//! Application configuration management.
//!
//! This module handles loading configuration from environment variables.
//! It uses the `envy` crate to automatically deserialize environment variables into a type-safe struct.

use serde::Deserialize;
use std::time::Duration;

/// Application configuration loaded from environment variables.
///
/// # Environment Variables
///
/// - `DATABASE_URL` (optional): PostgreSQL connection string. When unset the
///   service runs on the in-memory store (nothing survives a restart)
/// - `SERVER_PORT` (optional): HTTP server port, defaults to 3000
/// - `JWT_SECRET` (required): HMAC secret used to sign bearer tokens
/// - `TOKEN_TTL_SECS` (optional): token lifetime, defaults to 24 hours
/// - `TRANSFER_LOCK_TIMEOUT_MS` (optional): per-attempt transfer deadline, defaults to 2000
/// - `TRANSFER_MAX_RETRIES` (optional): retries after a conflict, defaults to 3
/// - `DATABASE_MAX_CONNECTIONS` (optional): pool size, defaults to 5
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub database_url: Option<String>,

    #[serde(default = "default_port")]
    pub server_port: u16,

    pub jwt_secret: String,

    #[serde(default = "default_token_ttl")]
    pub token_ttl_secs: i64,

    #[serde(default = "default_lock_timeout")]
    pub transfer_lock_timeout_ms: u64,

    #[serde(default = "default_max_retries")]
    pub transfer_max_retries: u32,

    #[serde(default = "default_max_connections")]
    pub database_max_connections: u32,
}

/// Default port if SERVER_PORT environment variable is not set.
fn default_port() -> u16 {
    3000
}

fn default_token_ttl() -> i64 {
    24 * 60 * 60
}

fn default_lock_timeout() -> u64 {
    2000
}

fn default_max_retries() -> u32 {
    3
}

fn default_max_connections() -> u32 {
    5
}

impl Config {
    /// Load configuration from environment variables.
    ///
    /// This method first attempts to load a `.env` file (which is optional),
    /// then reads environment variables and deserializes them into a Config struct.
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - Required environment variables are missing (e.g., JWT_SECRET)
    /// - Environment variable values cannot be parsed into expected types
    pub fn from_env() -> Result<Self, envy::Error> {
        // Try to load .env file if it exists (does nothing if not found)
        dotenvy::dotenv().ok();

        envy::from_env::<Config>()
    }

    pub fn lock_timeout(&self) -> Duration {
        Duration::from_millis(self.transfer_lock_timeout_ms)
    }
}
