//! Process settings from the environment (and `.env` via dotenvy).

use crate::error::ConfigError;
use std::net::SocketAddr;
use std::path::PathBuf;

#[derive(Clone, Debug)]
pub struct Settings {
    /// `BIND_ADDR`, default 0.0.0.0:8000.
    pub bind_addr: SocketAddr,
    /// `DATABASE_URL`. Unset means the in-memory store.
    pub database_url: Option<String>,
    /// `DATABASE_MAX_CONNECTIONS`, default 5.
    pub max_connections: u32,
    /// `CONFIG_PATH`. Unset means the built-in model.
    pub config_path: Option<PathBuf>,
    /// `MAX_BODY_BYTES`, default 1 MiB.
    pub max_body_bytes: usize,
}

impl Default for Settings {
    fn default() -> Self {
        Settings {
            bind_addr: SocketAddr::from(([0, 0, 0, 0], 8000)),
            database_url: None,
            max_connections: 5,
            config_path: None,
            max_body_bytes: 1024 * 1024,
        }
    }
}

impl Settings {
    pub fn from_env() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok();
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build from any key lookup; empty values count as unset.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());
        let defaults = Settings::default();
        Ok(Settings {
            bind_addr: parse_or(get("BIND_ADDR"), "BIND_ADDR", defaults.bind_addr)?,
            database_url: get("DATABASE_URL"),
            max_connections: parse_or(get("DATABASE_MAX_CONNECTIONS"), "DATABASE_MAX_CONNECTIONS", defaults.max_connections)?,
            config_path: get("CONFIG_PATH").map(PathBuf::from),
            max_body_bytes: parse_or(get("MAX_BODY_BYTES"), "MAX_BODY_BYTES", defaults.max_body_bytes)?,
        })
    }
}

fn parse_or<T: std::str::FromStr>(raw: Option<String>, key: &str, default: T) -> Result<T, ConfigError>
where
    T::Err: std::fmt::Display,
{
    match raw {
        None => Ok(default),
        Some(s) => s
            .trim()
            .parse()
            .map_err(|e| ConfigError::Load(format!("{}='{}': {}", key, s, e))),
    }
}
