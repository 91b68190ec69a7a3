//! Gateway configuration.
//!
//! Loaded from environment variables; every field has a default so a bare
//! `huddle-server` starts without any setup.

use std::collections::HashMap;
use std::env;
use std::time::Duration;

use thiserror::Error;

/// Default listen address.
pub const DEFAULT_BIND_ADDR: &str = "127.0.0.1:8080";

/// Default idle timeout in seconds. Clients that send nothing (not even a
/// heartbeat) for this long are disconnected.
pub const DEFAULT_IDLE_TIMEOUT_SECS: u64 = 30;

const BIND_ADDR_VAR: &str = "HUDDLE_BIND_ADDR";
const IDLE_TIMEOUT_VAR: &str = "HUDDLE_IDLE_TIMEOUT_SECS";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Invalid bind address configuration: {0}")]
    InvalidBindAddr(String),

    #[error("Invalid idle timeout configuration: {0}")]
    InvalidIdleTimeout(String),
}

/// Signaling gateway settings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServerConfig {
    /// Address the WebSocket listener binds to.
    pub bind_addr: String,

    /// How long a connection may stay silent before it is dropped.
    pub idle_timeout: Duration,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_addr: DEFAULT_BIND_ADDR.to_string(),
            idle_timeout: Duration::from_secs(DEFAULT_IDLE_TIMEOUT_SECS),
        }
    }
}

impl ServerConfig {
    /// Load configuration from environment variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_vars(&env::vars().collect())
    }

    /// Load configuration from a HashMap (for testing).
    pub fn from_vars(vars: &HashMap<String, String>) -> Result<Self, ConfigError> {
        let mut config = Self::default();

        if let Some(addr) = vars.get(BIND_ADDR_VAR) {
            let addr = addr.trim();
            if addr.is_empty() {
                return Err(ConfigError::InvalidBindAddr(format!(
                    "{BIND_ADDR_VAR} must not be empty"
                )));
            }
            config.bind_addr = addr.to_string();
        }

        if let Some(value_str) = vars.get(IDLE_TIMEOUT_VAR) {
            let secs: u64 = value_str.trim().parse().map_err(|e| {
                ConfigError::InvalidIdleTimeout(format!(
                    "{IDLE_TIMEOUT_VAR} must be a valid integer, got '{value_str}': {e}"
                ))
            })?;
            if secs == 0 {
                return Err(ConfigError::InvalidIdleTimeout(format!(
                    "{IDLE_TIMEOUT_VAR} must be greater than zero"
                )));
            }
            config.idle_timeout = Duration::from_secs(secs);
        }

        Ok(config)
    }
}
