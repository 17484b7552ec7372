//! Process-local, non-persistent state backend.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use dashmap::DashMap;
use nimbus_common::Function;
use std::time::Duration;
use tracing::{info, trace};

use super::{Result, StateError, StateStore};

/// In-memory state adapter. Everything is lost on restart, which is fine:
/// the gateway re-syncs functions from the orchestrator at boot and warm
/// records are advisory.
#[derive(Debug, Default)]
pub struct MemoryState {
    functions: DashMap<String, Function>,
    expiries: DashMap<String, DateTime<Utc>>,
}

impl MemoryState {
    pub fn new() -> Self {
        info!("state engine 'memory' initialized");
        Self::default()
    }
}

#[async_trait]
impl StateStore for MemoryState {
    async fn get(&self, key: &str) -> Result<Option<Function>> {
        trace!(%key, "state/memory: get");
        Ok(self.functions.get(key).map(|entry| entry.value().clone()))
    }

    async fn set(&self, function: &Function) -> Result<()> {
        trace!(name = %function.name, "state/memory: set");
        self.functions
            .insert(function.name.clone(), function.clone());
        Ok(())
    }

    async fn set_multiple(&self, functions: &[Function]) -> Vec<(String, StateError)> {
        for function in functions {
            self.functions
                .insert(function.name.clone(), function.clone());
        }
        Vec::new()
    }

    async fn set_with_expiry(&self, key: &str, ttl: Duration) -> Result<()> {
        let ttl = chrono::Duration::from_std(ttl)
            .map_err(|e| StateError::Backend(format!("ttl out of range: {e}")))?;
        trace!(%key, "state/memory: set with expiry");
        self.expiries.insert(key.to_string(), Utc::now() + ttl);
        Ok(())
    }

    async fn expires_at(&self, key: &str) -> Result<Option<DateTime<Utc>>> {
        // Expired entries are reaped lazily, on read.
        if let Some(entry) = self.expiries.get(key) {
            let deadline = *entry.value();
            drop(entry);
            if deadline <= Utc::now() {
                self.expiries.remove(key);
                return Ok(None);
            }
            return Ok(Some(deadline));
        }
        Ok(None)
    }
}
