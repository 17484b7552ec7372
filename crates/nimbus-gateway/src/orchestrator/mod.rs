//! Orchestrator capability: the execution cluster that owns function
//! workloads and their instances. The gateway consumes this interface and
//! never makes placement decisions itself.

mod cluster;

pub use cluster::{ClusterConfig, ClusterOrchestrator};

use async_trait::async_trait;
use nimbus_common::{FnInstance, Function};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum OrchestratorError {
    #[error("not found: {0}")]
    NotFound(String),

    #[error("orchestrator unavailable: {0}")]
    Unavailable(String),

    #[error("orchestrator rejected the request with status {status}")]
    Conflict { status: u16 },
}

pub type Result<T> = std::result::Result<T, OrchestratorError>;

/// Operations the gateway requires from the execution cluster. Structured
/// as a trait so a different cluster backend can be slotted in at startup.
#[async_trait]
pub trait Orchestrator: Send + Sync {
    /// All function workloads currently registered in the cluster.
    async fn functions(&self) -> Result<Vec<Function>>;

    /// Register a function workload and return its descriptor.
    async fn create_function(&self, name: &str, image: &str) -> Result<Function>;

    /// The live instances backing `function`, possibly empty.
    async fn instances(&self, function: &Function) -> Result<Vec<FnInstance>>;

    /// Ask the cluster to schedule one more instance of `function_id`
    /// under the given unique name. Creation is acknowledged, not awaited:
    /// the instance becomes visible through [`Orchestrator::instances`]
    /// once placement has settled.
    async fn create_instance(&self, function_id: &str, instance_name: &str) -> Result<()>;

    /// Tear down a single instance.
    async fn delete_instance(&self, instance_id: &str) -> Result<()>;
}
