//! Connection-pool configuration, loaded from the environment.
//!
//! Separate from `correlator-config::Config` (the API/CLI's server-wide
//! settings) because pool sizing is a concern private to this crate; the CLI
//! wires `correlator_config::Config::database_url` into `DbConfig::url` at
//! startup rather than reading `DATABASE_URL` itself here a second time.

use std::env;

use dotenvy::dotenv;
use once_cell::sync::Lazy;
use thiserror::Error;

static DOTENV_LOADED: Lazy<()> = Lazy::new(|| {
    let _ = dotenv();
});

/// Loads `.env` once, if present. Safe to call more than once; idempotent.
pub fn init_dotenv() {
    Lazy::force(&DOTENV_LOADED);
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("DATABASE_URL is not set")]
    MissingDatabaseUrl,
    #[error("{0} must be a positive integer, got '{1}'")]
    InvalidInteger(&'static str, String),
}

#[derive(Debug, Clone)]
pub struct DbConfig {
    pub url: String,
    pub min_connections: u32,
    pub max_connections: u32,
}

impl DbConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        init_dotenv();
        let url = env::var("DATABASE_URL").map_err(|_| ConfigError::MissingDatabaseUrl)?;
        let min_connections = parse_env_u32("DATABASE_MIN_CONNECTIONS", 2)?;
        let max_connections = parse_env_u32("DATABASE_MAX_CONNECTIONS", 16)?;
        Ok(Self { url, min_connections, max_connections })
    }
}

fn parse_env_u32(key: &'static str, default: u32) -> Result<u32, ConfigError> {
    match env::var(key) {
        Err(_) => Ok(default),
        Ok(raw) => raw.parse().map_err(|_| ConfigError::InvalidInteger(key, raw)),
    }
}
