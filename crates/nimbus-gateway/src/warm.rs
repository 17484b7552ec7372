//! Warm keepalive tracking.
//!
//! Every successful invocation refreshes a TTL marker for the instance
//! that served it. The marker is advisory bookkeeping for out-of-band
//! reclaim and future scheduling optimizations; nothing on the invocation
//! path consults it, and admission is gated by the health probe alone.

use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

use crate::state::StateStore;

/// Each invocation keeps the instance warm for 15 minutes.
pub const WARM_TTL: Duration = Duration::from_secs(15 * 60);

pub struct WarmTracker {
    state: Arc<dyn StateStore>,
    ttl: Duration,
}

impl WarmTracker {
    pub fn new(state: Arc<dyn StateStore>) -> Self {
        Self {
            state,
            ttl: WARM_TTL,
        }
    }

    pub fn with_ttl(mut self, ttl: Duration) -> Self {
        self.ttl = ttl;
        self
    }

    /// Refresh the warm record for `instance_id`. Best-effort: failures
    /// are logged and swallowed, never failing the invocation that
    /// triggered the refresh.
    pub async fn mark_warm(&self, instance_id: &str) {
        match self.state.set_with_expiry(instance_id, self.ttl).await {
            Ok(()) => debug!(instance = %instance_id, "warm record refreshed"),
            Err(e) => {
                warn!(instance = %instance_id, error = %e, "could not refresh warm record")
            }
        }
    }
}
