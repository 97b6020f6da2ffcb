//! Server configuration loaded from the environment.
//!
//! | Variable | Default |
//! |----------|---------|
//! | `HOST` | `0.0.0.0` |
//! | `PORT` | `3000` |
//! | `DATABASE_URL` | `sqlite://tasks.db` |
//! | `EVENT_LOG_CAPACITY` | `1000` |
//! | `SSE_HEARTBEAT_SECS` | `30` |
//! | `ALLOWED_ORIGINS` | `http://localhost:3000,http://localhost:5173` |
//! | `DB_MAX_CONNECTIONS` | `5` |
//!
//! Unparseable numbers fall back to the default with a warning. A zero event
//! log capacity or heartbeat interval is a configuration error.

use std::str::FromStr;
use std::time::Duration;

use axum::http::HeaderValue;
use tracing::warn;

use tasksync_core::defaults;
use tasksync_core::{Error, Result};

#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    pub database_url: String,
    pub event_log_capacity: usize,
    pub heartbeat_interval: Duration,
    pub allowed_origins: Vec<HeaderValue>,
    pub db_max_connections: u32,
}

impl ServerConfig {
    /// Load from process environment variables.
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Load using `lookup` to resolve variable names.
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let host = lookup("HOST").unwrap_or_else(|| defaults::SERVER_HOST.to_string());
        let port = parse_or_default(&lookup, "PORT", defaults::SERVER_PORT);
        let database_url =
            lookup("DATABASE_URL").unwrap_or_else(|| defaults::DATABASE_URL.to_string());

        let event_log_capacity =
            parse_or_default(&lookup, "EVENT_LOG_CAPACITY", defaults::EVENT_LOG_CAPACITY);
        if event_log_capacity == 0 {
            return Err(Error::Config(
                "EVENT_LOG_CAPACITY must be at least 1".to_string(),
            ));
        }

        let heartbeat_secs =
            parse_or_default(&lookup, "SSE_HEARTBEAT_SECS", defaults::SSE_HEARTBEAT_SECS);
        if heartbeat_secs == 0 {
            return Err(Error::Config(
                "SSE_HEARTBEAT_SECS must be at least 1".to_string(),
            ));
        }

        let allowed_origins = parse_allowed_origins(lookup("ALLOWED_ORIGINS").as_deref());
        let db_max_connections =
            parse_or_default(&lookup, "DB_MAX_CONNECTIONS", defaults::DB_MAX_CONNECTIONS);

        Ok(Self {
            host,
            port,
            database_url,
            event_log_capacity,
            heartbeat_interval: Duration::from_secs(heartbeat_secs),
            allowed_origins,
            db_max_connections,
        })
    }

    /// `host:port` for binding the listener.
    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

fn parse_or_default<F, T>(lookup: &F, key: &str, default: T) -> T
where
    F: Fn(&str) -> Option<String>,
    T: FromStr + Copy + std::fmt::Display,
{
    match lookup(key) {
        Some(raw) => match raw.trim().parse::<T>() {
            Ok(value) => value,
            Err(_) => {
                warn!(
                    subsystem = "config",
                    key,
                    value = %raw,
                    default = %default,
                    "Unparseable value, using default"
                );
                default
            }
        },
        None => default,
    }
}

/// Parse a comma-separated CORS origin list.
///
/// Invalid entries are dropped with a warning. An unset or blank list yields
/// the default development origins.
pub fn parse_allowed_origins(origins: Option<&str>) -> Vec<HeaderValue> {
    let origins_str = origins.unwrap_or_default();

    if origins_str.trim().is_empty() {
        return defaults::ALLOWED_ORIGINS
            .iter()
            .copied()
            .map(HeaderValue::from_static)
            .collect();
    }

    origins_str
        .split(',')
        .filter_map(|s| {
            let trimmed = s.trim();
            if trimmed.is_empty() {
                return None;
            }
            match trimmed.parse::<HeaderValue>() {
                Ok(v) => Some(v),
                Err(e) => {
                    warn!("Invalid CORS origin '{}': {}", trimmed, e);
                    None
                }
            }
        })
        .collect()
}
