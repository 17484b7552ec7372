//! State capability: the key-value registry backing function lookup and
//! warm-instance bookkeeping.
//!
//! Two interchangeable backends exist: a process-local map and a Redis
//! adapter. Neither promises persistence across process restarts, and the
//! rest of the gateway never assumes it.

mod memory;
mod redis;

pub use memory::MemoryState;
pub use redis::{RedisConfig, RedisState};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use nimbus_common::Function;
use std::time::Duration;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum StateError {
    #[error("key not found: {0}")]
    KeyNotFound(String),

    #[error("state backend unavailable: {0}")]
    Backend(String),
}

pub type Result<T> = std::result::Result<T, StateError>;

/// Generic interface over the gateway state.
///
/// Must be safe for concurrent use by every in-flight request; both
/// backends are, which is why the methods take `&self`.
#[async_trait]
pub trait StateStore: Send + Sync {
    /// Retrieve the function registered under `key`, or `None` when the
    /// key does not exist.
    async fn get(&self, key: &str) -> Result<Option<Function>>;

    /// Register a function under its name.
    async fn set(&self, function: &Function) -> Result<()>;

    /// Register several functions in one call. Returns the per-item
    /// failures; an empty vector means everything landed.
    async fn set_multiple(&self, functions: &[Function]) -> Vec<(String, StateError)>;

    /// Tag `key` with a time-to-live. Used for warm-instance records;
    /// the value carried by the key is irrelevant, only its expiry is.
    async fn set_with_expiry(&self, key: &str, ttl: Duration) -> Result<()>;

    /// When `key` carries a TTL, the instant it expires. Advisory
    /// bookkeeping only; admission never consults this.
    async fn expires_at(&self, key: &str) -> Result<Option<DateTime<Utc>>>;
}
