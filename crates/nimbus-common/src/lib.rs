//! Shared data model and error taxonomy for the nimbus gateway.

pub use serde::{Deserialize, Serialize};
use thiserror::Error;
pub use url::Url;

/// A named, versionless reference to a deployable unit of compute.
///
/// Functions are unique by `name` within the gateway state; lookup is
/// exact-match and case-sensitive. A function is never mutated after
/// registration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Function {
    pub id: String,
    pub name: String,
    /// Image reference handed to the orchestrator when provisioning
    /// instances of this function.
    pub image: String,
}

/// A live, addressable running copy of a [`Function`].
///
/// Owned by the orchestrator's lifecycle; the gateway only holds one for
/// the duration of a request and never persists instance identity across
/// restarts.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FnInstance {
    pub id: String,
    pub function: Function,
    pub endpoint: Url,
}

/// The structured response a compute instance returns: the caller payload
/// plus execution metadata from the runtime.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InvocationEnvelope {
    pub payload: serde_json::Value,
    pub process_metadata: ProcessMetadata,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ProcessMetadata {
    #[serde(default)]
    pub execution_time_ms: u64,
    /// May be empty when the runtime doesn't capture logs.
    #[serde(default)]
    pub logs: Vec<String>,
}

/// Terminal errors for a single invocation. None of these are retried
/// beyond the bounded attempts built into the resolver and the health
/// gate, and none crash the process.
#[derive(Error, Debug)]
pub enum GatewayError {
    #[error("function not found: {0}")]
    NotFound(String),

    #[error("scheduling failed: {0}")]
    SchedulingFailure(String),

    #[error("instance '{0}' could not be marked as ready")]
    AdmissionTimeout(String),

    #[error("upstream request failed: {0}")]
    Upstream(String),

    #[error("could not transcode function response: {0}")]
    Transcode(String),
}

pub type Result<T> = std::result::Result<T, GatewayError>;
