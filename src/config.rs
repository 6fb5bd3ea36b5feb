//! Process configuration from environment variables.

use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;

use crate::handlers::DecodePolicy;
use crate::message_store::{StoreConfig, StoreError};

pub const DATABASE_URL: &str = "DATABASE_URL";
pub const HTTP_ADDR: &str = "HTTP_ADDR";
pub const RELAY_ADDR: &str = "RELAY_ADDR";
pub const STATIC_ROOT: &str = "STATIC_ROOT";
pub const RELAY_IDLE_TIMEOUT_SECS: &str = "RELAY_IDLE_TIMEOUT_SECS";
pub const RELAY_DECODE_POLICY: &str = "RELAY_DECODE_POLICY";
pub const MESSAGE_TABLE: &str = "MESSAGE_TABLE";
pub const DB_POOL_SIZE: &str = "DB_POOL_SIZE";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("{0} is not set")]
    Missing(&'static str),

    #[error("{name} has an invalid value '{value}': {reason}")]
    Invalid {
        name: &'static str,
        value: String,
        reason: String,
    },

    #[error("invalid DATABASE_URL: {0}")]
    Store(#[from] StoreError),
}

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub http_addr: SocketAddr,
    pub relay_addr: SocketAddr,
    pub static_root: PathBuf,
    pub idle_timeout: Duration,
    pub decode_policy: DecodePolicy,
    pub store: StoreConfig,
}

impl AppConfig {
    /// Read the configuration from the process environment, after loading a
    /// `.env` file if one is present.
    pub fn from_env() -> Result<Self, ConfigError> {
        if let Ok(path) = dotenvy::dotenv() {
            tracing::debug!(path = %path.display(), "Loaded .env");
        }
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build the configuration from any key lookup.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let url = lookup(DATABASE_URL)
            .filter(|v| !v.trim().is_empty())
            .ok_or(ConfigError::Missing(DATABASE_URL))?;

        let mut store = StoreConfig::from_connection_string(&url)?;
        if let Some(table) = lookup(MESSAGE_TABLE) {
            store = store.with_table(table.clone());
            store.validate().map_err(|e| invalid(MESSAGE_TABLE, table, e))?;
        }
        if let Some(size) = parse::<_, usize>(&lookup, DB_POOL_SIZE)? {
            store = store.with_max_pool_size(size);
            store
                .validate()
                .map_err(|e| invalid(DB_POOL_SIZE, size.to_string(), e))?;
        }

        let idle_secs: u64 = parse(&lookup, RELAY_IDLE_TIMEOUT_SECS)?.unwrap_or(300);
        if idle_secs == 0 {
            return Err(ConfigError::Invalid {
                name: RELAY_IDLE_TIMEOUT_SECS,
                value: "0".to_string(),
                reason: "must be at least one second".to_string(),
            });
        }

        Ok(Self {
            http_addr: parse(&lookup, HTTP_ADDR)?.unwrap_or_else(|| ([0, 0, 0, 0], 3000).into()),
            relay_addr: parse(&lookup, RELAY_ADDR)?.unwrap_or_else(|| ([0, 0, 0, 0], 5000).into()),
            static_root: lookup(STATIC_ROOT)
                .map(PathBuf::from)
                .unwrap_or_else(|| PathBuf::from("http")),
            idle_timeout: Duration::from_secs(idle_secs),
            decode_policy: parse(&lookup, RELAY_DECODE_POLICY)?.unwrap_or_default(),
            store,
        })
    }
}

fn invalid(name: &'static str, value: String, err: StoreError) -> ConfigError {
    let reason = match err {
        StoreError::ValidationError(reason) => reason,
        other => other.to_string(),
    };
    ConfigError::Invalid {
        name,
        value,
        reason,
    }
}

fn parse<F, T>(lookup: &F, name: &'static str) -> Result<Option<T>, ConfigError>
where
    F: Fn(&str) -> Option<String>,
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    match lookup(name) {
        None => Ok(None),
        Some(value) => value
            .trim()
            .parse::<T>()
            .map(Some)
            .map_err(|e| ConfigError::Invalid {
                name,
                reason: e.to_string(),
                value,
            }),
    }
}
