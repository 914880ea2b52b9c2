//! Enumerated, environment-driven server configuration (spec §6
//! "Configuration"). Shared by `correlator-api`'s axum server and
//! `correlator-cli`'s `serve` subcommand.
//!
//! Loading follows `correlator-store::config::DbConfig`'s pattern: a lazy,
//! idempotent `.env` load, then `env::var` reads with explicit defaults,
//! returning a `ConfigError` rather than panicking on a bad value.

use std::env;
use std::time::Duration;

use dotenvy::dotenv;
use once_cell::sync::Lazy;
use thiserror::Error;

static DOTENV_LOADED: Lazy<()> = Lazy::new(|| {
    let _ = dotenv();
});

pub fn init_dotenv() {
    Lazy::force(&DOTENV_LOADED);
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("{0} must be a positive integer, got '{1}'")]
    InvalidInteger(&'static str, String),
    #[error("{0} must be a positive duration in seconds, got '{1}'")]
    InvalidDuration(&'static str, String),
    #[error("SERVER_PORT must be in 1..65535, got {0}")]
    PortOutOfRange(u32),
    #[error("SERVER_HOST must not be empty")]
    EmptyHost,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LogLevel {
    Debug,
    Info,
    Warn,
    Error,
}

impl LogLevel {
    fn parse(raw: &str) -> Option<Self> {
        match raw.to_lowercase().as_str() {
            "debug" => Some(LogLevel::Debug),
            "info" => Some(LogLevel::Info),
            "warn" => Some(LogLevel::Warn),
            "error" => Some(LogLevel::Error),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            LogLevel::Debug => "debug",
            LogLevel::Info => "info",
            LogLevel::Warn => "warn",
            LogLevel::Error => "error",
        }
    }
}

#[derive(Debug, Clone)]
pub struct Config {
    pub server_port: u16,
    pub server_host: String,
    pub read_timeout: Duration,
    pub write_timeout: Duration,
    pub shutdown_timeout: Duration,
    pub log_level: LogLevel,
    pub max_request_size: usize,
    pub cors_allowed_origins: Vec<String>,
    pub database_url: String,
    pub database_min_connections: u32,
    pub database_max_connections: u32,
}

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        init_dotenv();

        let server_port = parse_env_u32("SERVER_PORT", 8080)?;
        if server_port == 0 || server_port > 65535 {
            return Err(ConfigError::PortOutOfRange(server_port));
        }

        let server_host = env::var("SERVER_HOST").unwrap_or_else(|_| "0.0.0.0".to_string());
        if server_host.trim().is_empty() {
            return Err(ConfigError::EmptyHost);
        }

        let read_timeout = parse_env_duration("SERVER_READ_TIMEOUT", Duration::from_secs(30))?;
        let write_timeout = parse_env_duration("SERVER_WRITE_TIMEOUT", Duration::from_secs(30))?;
        let shutdown_timeout = parse_env_duration("SERVER_SHUTDOWN_TIMEOUT", Duration::from_secs(10))?;

        let log_level = env::var("LOG_LEVEL").ok().and_then(|v| LogLevel::parse(&v)).unwrap_or(LogLevel::Info);

        let max_request_size = parse_env_usize("MAX_REQUEST_SIZE", 1024 * 1024)?;

        let cors_allowed_origins = env::var("CORS_ALLOWED_ORIGINS")
            .ok()
            .map(|raw| raw.split(',').map(|s| s.trim().to_string()).filter(|s| !s.is_empty()).collect())
            .unwrap_or_default();

        let database_url = env::var("DATABASE_URL").unwrap_or_default();
        let database_min_connections = parse_env_u32("DATABASE_MIN_CONNECTIONS", 2)?;
        let database_max_connections = parse_env_u32("DATABASE_MAX_CONNECTIONS", 16)?;

        Ok(Self {
            server_port: server_port as u16,
            server_host,
            read_timeout,
            write_timeout,
            shutdown_timeout,
            log_level,
            max_request_size,
            cors_allowed_origins,
            database_url,
            database_min_connections,
            database_max_connections,
        })
    }
}

fn parse_env_u32(key: &'static str, default: u32) -> Result<u32, ConfigError> {
    match env::var(key) {
        Err(_) => Ok(default),
        Ok(raw) => raw.parse().map_err(|_| ConfigError::InvalidInteger(key, raw)),
    }
}

fn parse_env_usize(key: &'static str, default: usize) -> Result<usize, ConfigError> {
    match env::var(key) {
        Err(_) => Ok(default),
        Ok(raw) => raw.parse().map_err(|_| ConfigError::InvalidInteger(key, raw)),
    }
}

fn parse_env_duration(key: &'static str, default: Duration) -> Result<Duration, ConfigError> {
    match env::var(key) {
        Err(_) => Ok(default),
        Ok(raw) => {
            let seconds: u64 = raw.parse().map_err(|_| ConfigError::InvalidDuration(key, raw.clone()))?;
            if seconds == 0 {
                return Err(ConfigError::InvalidDuration(key, raw));
            }
            Ok(Duration::from_secs(seconds))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    static ENV_LOCK: Mutex<()> = Mutex::new(());

    fn with_clean_env<F: FnOnce()>(f: F) {
        let _guard = ENV_LOCK.lock().unwrap();
        for key in [
            "SERVER_PORT",
            "SERVER_HOST",
            "SERVER_READ_TIMEOUT",
            "SERVER_WRITE_TIMEOUT",
            "SERVER_SHUTDOWN_TIMEOUT",
            "LOG_LEVEL",
            "MAX_REQUEST_SIZE",
            "CORS_ALLOWED_ORIGINS",
            "DATABASE_URL",
        ] {
            env::remove_var(key);
        }
        f();
    }

    #[test]
    fn defaults_are_applied() {
        with_clean_env(|| {
            let cfg = Config::from_env().unwrap();
            assert_eq!(cfg.server_port, 8080);
            assert_eq!(cfg.server_host, "0.0.0.0");
            assert_eq!(cfg.max_request_size, 1024 * 1024);
            assert_eq!(cfg.log_level, LogLevel::Info);
            assert!(cfg.cors_allowed_origins.is_empty());
        });
    }

    #[test]
    fn rejects_out_of_range_port() {
        with_clean_env(|| {
            env::set_var("SERVER_PORT", "70000");
            let err = Config::from_env().unwrap_err();
            assert_eq!(err, ConfigError::PortOutOfRange(70000));
            env::remove_var("SERVER_PORT");
        });
    }

    #[test]
    fn rejects_zero_timeout() {
        with_clean_env(|| {
            env::set_var("SERVER_READ_TIMEOUT", "0");
            let err = Config::from_env().unwrap_err();
            assert!(matches!(err, ConfigError::InvalidDuration("SERVER_READ_TIMEOUT", _)));
            env::remove_var("SERVER_READ_TIMEOUT");
        });
    }

    #[test]
    fn rejects_empty_host() {
        with_clean_env(|| {
            env::set_var("SERVER_HOST", "   ");
            let err = Config::from_env().unwrap_err();
            assert_eq!(err, ConfigError::EmptyHost);
            env::remove_var("SERVER_HOST");
        });
    }

    #[test]
    fn parses_cors_origin_list() {
        with_clean_env(|| {
            env::set_var("CORS_ALLOWED_ORIGINS", "https://a.example, https://b.example");
            let cfg = Config::from_env().unwrap();
            assert_eq!(cfg.cors_allowed_origins, vec!["https://a.example", "https://b.example"]);
            env::remove_var("CORS_ALLOWED_ORIGINS");
        });
    }
}
