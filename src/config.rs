//! Environment-driven configuration.
//!
//! SYSTEM CONTEXT
//! ==============
//! Every tunable is read from the process environment (optionally seeded
//! from `.env` by `dotenvy` in `main`). Optional knobs fall back to
//! defaults; only `DATABASE_URL` is mandatory.

use std::path::PathBuf;

const DEFAULT_PORT: u16 = 3000;
const DEFAULT_STATIC_DIR: &str = "web";
const DEFAULT_MAX_BODY_BYTES: usize = 16 * 1024 * 1024;

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("{0} is required")]
    Missing(&'static str),
    #[error("{key} has an invalid value: {value:?}")]
    Invalid { key: &'static str, value: String },
}

/// Process-level settings needed before the router is built.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub database_url: String,
    pub port: u16,
    /// Directory holding the built frontend bundle (`index.html` + assets).
    pub static_dir: PathBuf,
    /// Upper bound on request bodies; drawing snapshots can be large.
    pub max_body_bytes: usize,
}

impl ServerConfig {
    /// Load from `DATABASE_URL`, `PORT`, `STATIC_DIR`, `MAX_BODY_BYTES`.
    ///
    /// # Errors
    ///
    /// Returns an error if `DATABASE_URL` is unset or `PORT` does not parse.
    pub fn from_env() -> Result<Self, ConfigError> {
        let database_url = std::env::var("DATABASE_URL").map_err(|_| ConfigError::Missing("DATABASE_URL"))?;

        let port = match std::env::var("PORT") {
            Ok(raw) => raw
                .trim()
                .parse::<u16>()
                .map_err(|_| ConfigError::Invalid { key: "PORT", value: raw })?,
            Err(_) => DEFAULT_PORT,
        };

        let static_dir = std::env::var("STATIC_DIR").map_or_else(|_| PathBuf::from(DEFAULT_STATIC_DIR), PathBuf::from);

        Ok(Self {
            database_url,
            port,
            static_dir,
            max_body_bytes: env_parse("MAX_BODY_BYTES", DEFAULT_MAX_BODY_BYTES),
        })
    }
}

/// Parse an env var, falling back to `default` when unset or malformed.
pub(crate) fn env_parse<T>(key: &str, default: T) -> T
where
    T: std::str::FromStr + Copy,
{
    std::env::var(key)
        .ok()
        .and_then(|v| v.trim().parse::<T>().ok())
        .unwrap_or(default)
}

pub(crate) fn env_bool(key: &str) -> Option<bool> {
    std::env::var(key)
        .ok()
        .and_then(|raw| match raw.trim().to_ascii_lowercase().as_str() {
            "1" | "true" | "yes" | "on" => Some(true),
            "0" | "false" | "no" | "off" => Some(false),
            _ => None,
        })
}

#[cfg(test)]
#[path = "config_test.rs"]
mod tests;
