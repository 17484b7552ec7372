//! Redis-backed state adapter.
//!
//! Functions live in a hash per name; warm records are plain keys carrying
//! a TTL. Keyspace events are enabled at init so instance expiries can be
//! observed by out-of-band consumers.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use nimbus_common::Function;
use redis::{aio::ConnectionManager, AsyncCommands, Client};
use serde::Deserialize;
use std::collections::HashMap;
use std::time::Duration;
use tracing::{debug, info, trace};

use super::{Result, StateError, StateStore};

#[derive(Debug, Clone, Deserialize)]
pub struct RedisConfig {
    /// Address of the Redis server, e.g. `redis://127.0.0.1:6379`.
    pub addr: String,
}

pub struct RedisState {
    conn: ConnectionManager,
}

impl RedisState {
    /// Connect to Redis and enable keyspace events, which downstream
    /// consumers rely on to observe warm-record expiration.
    pub async fn connect(cfg: &RedisConfig) -> Result<Self> {
        debug!(addr = %cfg.addr, "bootstrapping redis state adapter");
        let client = Client::open(cfg.addr.as_str()).map_err(backend)?;
        let mut conn = client.get_connection_manager().await.map_err(backend)?;

        let _: () = redis::cmd("CONFIG")
            .arg("SET")
            .arg("notify-keyspace-events")
            .arg("KEA")
            .query_async(&mut conn)
            .await
            .map_err(backend)?;

        info!("state engine 'redis' initialized");
        Ok(Self { conn })
    }
}

fn backend(e: redis::RedisError) -> StateError {
    StateError::Backend(e.to_string())
}

#[async_trait]
impl StateStore for RedisState {
    async fn get(&self, key: &str) -> Result<Option<Function>> {
        let mut conn = self.conn.clone();
        let fields: HashMap<String, String> = conn.hgetall(key).await.map_err(backend)?;
        trace!(%key, found = !fields.is_empty(), "state/redis: get");

        if fields.is_empty() {
            return Ok(None);
        }

        Ok(Some(Function {
            id: fields.get("id").cloned().unwrap_or_default(),
            name: key.to_string(),
            image: fields.get("image").cloned().unwrap_or_default(),
        }))
    }

    async fn set(&self, function: &Function) -> Result<()> {
        trace!(name = %function.name, "state/redis: set");
        let mut conn = self.conn.clone();
        conn.hset_multiple::<_, _, _, ()>(
            &function.name,
            &[("id", &function.id), ("image", &function.image)],
        )
        .await
        .map_err(backend)
    }

    async fn set_multiple(&self, functions: &[Function]) -> Vec<(String, StateError)> {
        let mut errors = Vec::new();
        for function in functions {
            if let Err(e) = self.set(function).await {
                errors.push((function.name.clone(), e));
            }
        }
        errors
    }

    async fn set_with_expiry(&self, key: &str, ttl: Duration) -> Result<()> {
        trace!(%key, ttl_secs = ttl.as_secs(), "state/redis: set with expiry");
        let mut conn = self.conn.clone();
        conn.set_ex::<_, _, ()>(key, 1u8, ttl.as_secs())
            .await
            .map_err(backend)
    }

    async fn expires_at(&self, key: &str) -> Result<Option<DateTime<Utc>>> {
        let mut conn = self.conn.clone();
        // TTL returns -2 for a missing key and -1 for a key without expiry.
        let ttl: i64 = conn.ttl(key).await.map_err(backend)?;
        if ttl < 0 {
            return Ok(None);
        }
        Ok(Some(Utc::now() + chrono::Duration::seconds(ttl)))
    }
}
