//! Request dispatch: the orchestrating component wiring state lookup,
//! instance resolution, health-gated admission, forwarding, transcoding
//! and warm tracking into one request path.

use http::{header, HeaderMap, HeaderValue, Method, StatusCode};
use nimbus_common::{Function, GatewayError};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, error, info, warn};

use crate::health::{HealthGate, HttpProber, ProbePolicy, Prober};
use crate::orchestrator::Orchestrator;
use crate::resolver::InstanceResolver;
use crate::state::{StateError, StateStore};
use crate::transcode::transcode_envelope;
use crate::warm::WarmTracker;

/// What status the gateway answers invocations with.
///
/// The upstream runtime encodes function errors in the envelope payload,
/// so `Fixed` answers 200 whenever an envelope came back at all. The
/// alternative mirrors the instance's own HTTP status.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatusPolicy {
    Fixed,
    Passthrough,
}

pub struct InvokeRequest {
    pub method: Method,
    pub function: String,
    /// Path on the instance, `/` for a bare invocation.
    pub path: String,
    pub query: Option<String>,
    pub headers: HeaderMap,
    pub body: Vec<u8>,
}

impl InvokeRequest {
    pub fn new(method: Method, function: impl Into<String>) -> Self {
        Self {
            method,
            function: function.into(),
            path: "/".to_string(),
            query: None,
            headers: HeaderMap::new(),
            body: Vec::new(),
        }
    }

    pub fn with_body(mut self, body: Vec<u8>) -> Self {
        self.body = body;
        self
    }
}

#[derive(Debug)]
pub struct InvokeReply {
    pub status: StatusCode,
    pub headers: HeaderMap,
    pub body: Vec<u8>,
}

pub struct Dispatcher {
    state: Arc<dyn StateStore>,
    orchestrator: Arc<dyn Orchestrator>,
    resolver: InstanceResolver,
    gate: HealthGate,
    warm: Arc<WarmTracker>,
    client: reqwest::Client,
    status_policy: StatusPolicy,
}

fn state_failure(e: StateError) -> GatewayError {
    GatewayError::Upstream(format!("state lookup failed: {e}"))
}

impl Dispatcher {
    pub fn new(state: Arc<dyn StateStore>, orchestrator: Arc<dyn Orchestrator>) -> Self {
        Self {
            resolver: InstanceResolver::new(orchestrator.clone()),
            gate: HealthGate::new(Arc::new(HttpProber::new()), ProbePolicy::default()),
            warm: Arc::new(WarmTracker::new(state.clone())),
            client: reqwest::Client::new(),
            status_policy: StatusPolicy::Fixed,
            state,
            orchestrator,
        }
    }

    pub fn with_status_policy(mut self, policy: StatusPolicy) -> Self {
        self.status_policy = policy;
        self
    }

    pub fn with_probe_policy(mut self, policy: ProbePolicy) -> Self {
        self.gate = HealthGate::new(Arc::new(HttpProber::new()), policy);
        self
    }

    pub fn with_prober(mut self, prober: Arc<dyn Prober>, policy: ProbePolicy) -> Self {
        self.gate = HealthGate::new(prober, policy);
        self
    }

    pub fn with_settle_delay(mut self, settle_delay: Duration) -> Self {
        self.resolver = InstanceResolver::new(self.orchestrator.clone())
            .with_settle_delay(settle_delay);
        self
    }

    /// Full invocation path. Every error kind here is terminal for the
    /// request; only the resolver and the health gate retry internally,
    /// within their own bounded budgets.
    pub async fn invoke(&self, request: InvokeRequest) -> nimbus_common::Result<InvokeReply> {
        debug!(function = %request.function, "invoke function");

        let function = self
            .state
            .get(&request.function)
            .await
            .map_err(state_failure)?
            .ok_or_else(|| {
                warn!(function = %request.function, "function not found");
                GatewayError::NotFound(request.function.clone())
            })?;

        let instance = self.resolver.resolve(&function).await?;
        self.gate.admit(&instance).await?;

        let mut url = instance.endpoint.clone();
        url.set_path(&request.path);
        url.set_query(request.query.as_deref());

        let upstream = self
            .client
            .request(request.method, url)
            .headers(forwardable_headers(&request.headers))
            .body(request.body)
            .send()
            .await
            .map_err(|e| {
                error!(instance = %instance.id, error = %e, "could not reach instance");
                GatewayError::Upstream(e.to_string())
            })?;

        let upstream_status = upstream.status();
        let mut headers = upstream.headers().clone();
        let raw = upstream
            .bytes()
            .await
            .map_err(|e| GatewayError::Upstream(e.to_string()))?;

        let (body, content_length) = transcode_envelope(&raw)?;

        headers.remove(header::TRANSFER_ENCODING);
        headers.insert(header::CONTENT_LENGTH, HeaderValue::from(content_length));

        let status = match self.status_policy {
            StatusPolicy::Fixed => StatusCode::OK,
            StatusPolicy::Passthrough => upstream_status,
        };

        // Warm keepalive is fire-and-forget; the reply never waits on it.
        let warm = self.warm.clone();
        let instance_id = instance.id.clone();
        tokio::spawn(async move { warm.mark_warm(&instance_id).await });

        Ok(InvokeReply {
            status,
            headers,
            body,
        })
    }

    /// Register a function with the orchestrator and mirror the returned
    /// descriptor into state for subsequent lookups.
    pub async fn create_function(&self, name: &str, image: &str) -> nimbus_common::Result<Function> {
        debug!(function = %name, "create function");
        let function = self
            .orchestrator
            .create_function(name, image)
            .await
            .map_err(|e| {
                error!(function = %name, error = %e, "could not create function");
                GatewayError::SchedulingFailure(e.to_string())
            })?;

        self.state.set(&function).await.map_err(state_failure)?;
        info!(function = %function.name, id = %function.id, "function created");
        Ok(function)
    }

    /// Seed state with the functions the orchestrator already knows, so a
    /// restarted gateway can serve them without re-registration.
    /// Best-effort: a failure leaves the registry empty rather than
    /// blocking startup.
    pub async fn sync_existing_functions(&self) {
        match self.orchestrator.functions().await {
            Ok(functions) => {
                let count = functions.len();
                for (name, e) in self.state.set_multiple(&functions).await {
                    warn!(function = %name, error = %e, "could not mirror function into state");
                }
                info!(count, "synced existing functions from the orchestrator");
            }
            Err(e) => {
                error!(error = %e, "could not load existing functions, starting with an empty registry")
            }
        }
    }
}

/// Hop-by-hop and recomputed headers must not be forwarded upstream.
fn forwardable_headers(headers: &HeaderMap) -> HeaderMap {
    let mut out = headers.clone();
    out.remove(header::HOST);
    out.remove(header::CONTENT_LENGTH);
    out.remove(header::TRANSFER_ENCODING);
    out
}
