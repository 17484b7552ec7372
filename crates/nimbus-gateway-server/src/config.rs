//! Process configuration, read once at startup from the environment and
//! handed to the core as already-validated values.

use nimbus_common::Url;
use thiserror::Error;

pub const DEFAULT_PORT: u16 = 8080;
pub const DEFAULT_ORCHESTRATOR_URL: &str = "http://localhost:5000";

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("invalid value for {key}: {reason}")]
    Invalid { key: &'static str, reason: String },

    #[error("{key} must be set when NIMBUS_STATE=redis")]
    MissingRedisAddr { key: &'static str },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StateBackend {
    Memory,
    Redis { addr: String },
}

#[derive(Debug, Clone)]
pub struct Config {
    pub port: u16,
    pub orchestrator_url: Url,
    pub state: StateBackend,
}

/// Load configuration from process environment variables.
pub fn load() -> Result<Config, ConfigError> {
    from_lookup(|key| std::env::var(key).ok())
}

fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Config, ConfigError> {
    let port = match lookup("NIMBUS_PORT") {
        Some(raw) => raw.parse::<u16>().map_err(|e| ConfigError::Invalid {
            key: "NIMBUS_PORT",
            reason: e.to_string(),
        })?,
        None => DEFAULT_PORT,
    };

    let orchestrator_raw =
        lookup("NIMBUS_ORCHESTRATOR_URL").unwrap_or_else(|| DEFAULT_ORCHESTRATOR_URL.to_string());
    let orchestrator_url = Url::parse(&orchestrator_raw).map_err(|e| ConfigError::Invalid {
        key: "NIMBUS_ORCHESTRATOR_URL",
        reason: e.to_string(),
    })?;

    let state = match lookup("NIMBUS_STATE").as_deref() {
        None | Some("memory") => StateBackend::Memory,
        Some("redis") => {
            let addr = lookup("NIMBUS_REDIS_ADDR")
                .ok_or(ConfigError::MissingRedisAddr {
                    key: "NIMBUS_REDIS_ADDR",
                })?;
            StateBackend::Redis { addr }
        }
        Some(other) => {
            return Err(ConfigError::Invalid {
                key: "NIMBUS_STATE",
                reason: format!("unknown backend '{other}', expected 'memory' or 'redis'"),
            })
        }
    };

    Ok(Config {
        port,
        orchestrator_url,
        state,
    })
}
