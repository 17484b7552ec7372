//! Health-gated admission.
//!
//! Freshly provisioned compute units take a bounded, roughly constant time
//! to boot, so the gate retries its readiness probe on a fixed interval
//! rather than an exponential one. It runs on every admission, not only
//! after a cold start: a previously-warm instance may have been reclaimed
//! out-of-band.

use async_trait::async_trait;
use nimbus_common::{FnInstance, GatewayError, Url};
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, error, info};

#[derive(Error, Debug)]
#[error("probe failed: {0}")]
pub struct ProbeError(pub String);

/// One readiness probe against an instance. Pluggable so tests can script
/// failure sequences without a network.
#[async_trait]
pub trait Prober: Send + Sync {
    async fn probe(&self, url: &Url) -> Result<(), ProbeError>;
}

/// Probes over HTTP. Any completed exchange counts as ready; the status
/// code is not inspected.
pub struct HttpProber {
    client: reqwest::Client,
}

impl HttpProber {
    pub fn new() -> Self {
        Self {
            client: reqwest::Client::new(),
        }
    }
}

impl Default for HttpProber {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Prober for HttpProber {
    async fn probe(&self, url: &Url) -> Result<(), ProbeError> {
        self.client
            .get(url.clone())
            .send()
            .await
            .map(|_| ())
            .map_err(|e| ProbeError(e.to_string()))
    }
}

/// Explicit retry budget for admission. Every step of the loop is an await
/// point, so the whole gate is cancellable by dropping the future.
#[derive(Debug, Clone)]
pub struct ProbePolicy {
    pub max_attempts: u32,
    pub interval: Duration,
}

impl Default for ProbePolicy {
    fn default() -> Self {
        Self {
            max_attempts: 10,
            interval: Duration::from_secs(1),
        }
    }
}

pub struct HealthGate {
    prober: Arc<dyn Prober>,
    policy: ProbePolicy,
}

impl HealthGate {
    pub fn new(prober: Arc<dyn Prober>, policy: ProbePolicy) -> Self {
        Self { prober, policy }
    }

    /// Admit traffic to `instance` once a single probe succeeds, or reject
    /// it after the retry budget is exhausted. A rejected instance is never
    /// forwarded to.
    pub async fn admit(&self, instance: &FnInstance) -> nimbus_common::Result<()> {
        let url = instance.endpoint.join("_/health").map_err(|e| {
            GatewayError::AdmissionTimeout(format!("{}: bad health url: {e}", instance.id))
        })?;

        for attempt in 1..=self.policy.max_attempts {
            debug!(instance = %instance.id, attempt, "performing readiness probe");
            match self.prober.probe(&url).await {
                Ok(()) => {
                    info!(
                        function = %instance.function.name,
                        instance = %instance.id,
                        "instance is healthy and ready to receive requests"
                    );
                    return Ok(());
                }
                Err(e) => {
                    debug!(instance = %instance.id, attempt, error = %e, "probe failed");
                    if attempt < self.policy.max_attempts {
                        tokio::time::sleep(self.policy.interval).await;
                    }
                }
            }
        }

        error!(instance = %instance.id, "readiness probe budget exhausted");
        Err(GatewayError::AdmissionTimeout(instance.id.clone()))
    }
}
