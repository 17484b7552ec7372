//! HTTP adapter for the execution cluster's workload API.

use async_trait::async_trait;
use nimbus_common::{FnInstance, Function, Url};
use reqwest::StatusCode;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use super::{Orchestrator, OrchestratorError, Result};

#[derive(Debug, Clone, Deserialize)]
pub struct ClusterConfig {
    /// Base address of the cluster controller, e.g. `http://localhost:5000`.
    pub cluster: Url,
}

pub struct ClusterOrchestrator {
    client: reqwest::Client,
    base: Url,
}

const WORKLOAD_KIND_FUNCTION: &str = "Function";

// --- Wire shapes of the workload API ---

#[derive(Debug, Serialize)]
struct Workload {
    #[serde(rename = "apiVersion")]
    api_version: &'static str,
    kind: &'static str,
    name: String,
    spec: WorkloadSpec,
}

#[derive(Debug, Serialize)]
struct WorkloadSpec {
    containers: Vec<serde_json::Value>,
    function: WorkloadFn,
}

#[derive(Debug, Serialize)]
struct WorkloadFn {
    execution: WorkloadExecution,
    exposure: WorkloadExposure,
}

#[derive(Debug, Serialize)]
struct WorkloadExecution {
    rootfs: String,
}

#[derive(Debug, Serialize)]
struct WorkloadExposure {
    #[serde(rename = "type")]
    kind: &'static str,
}

#[derive(Debug, Deserialize)]
struct RegisteredWorkload {
    id: String,
    name: String,
    value: WorkloadValue,
}

#[derive(Debug, Deserialize)]
struct WorkloadValue {
    kind: String,
    spec: InstanceSpec,
}

#[derive(Debug, Deserialize)]
struct CreateWorkloadResponse {
    id: String,
}

#[derive(Debug, Serialize)]
struct CreateInstanceRequest<'a> {
    workload_id: &'a str,
    name: &'a str,
}

#[derive(Debug, Serialize)]
struct DeleteInstanceRequest<'a> {
    id: &'a str,
}

#[derive(Debug, Deserialize)]
struct FetchInstancesResponse {
    instances: Vec<ClusterInstance>,
}

#[derive(Debug, Deserialize)]
struct ClusterInstance {
    id: String,
    spec: InstanceSpec,
}

#[derive(Debug, Deserialize)]
struct InstanceSpec {
    function: InstanceFn,
}

#[derive(Debug, Deserialize)]
struct InstanceFn {
    #[serde(default)]
    execution: InstanceExecution,
    #[serde(default)]
    exposure: InstanceExposure,
}

#[derive(Debug, Default, Deserialize)]
struct InstanceExecution {
    #[serde(default)]
    rootfs: String,
}

#[derive(Debug, Default, Deserialize)]
struct InstanceExposure {
    #[serde(default)]
    port: u16,
}

fn unavailable(e: reqwest::Error) -> OrchestratorError {
    OrchestratorError::Unavailable(e.to_string())
}

impl ClusterOrchestrator {
    pub fn new(cfg: &ClusterConfig) -> Self {
        info!(cluster = %cfg.cluster, "orchestrator engine 'cluster' initialized");
        Self {
            client: reqwest::Client::new(),
            base: cfg.cluster.clone(),
        }
    }

    fn url(&self, path: &str) -> Result<Url> {
        self.base
            .join(path)
            .map_err(|e| OrchestratorError::Unavailable(format!("invalid url '{path}': {e}")))
    }

    /// The cluster controller reports instance exposure as a port only;
    /// the runtime itself is reachable on the controller's host.
    fn instance_endpoint(&self, port: u16) -> Result<Url> {
        let host = self
            .base
            .host_str()
            .ok_or_else(|| OrchestratorError::Unavailable("cluster url has no host".into()))?;
        Url::parse(&format!("http://{host}:{port}"))
            .map_err(|e| OrchestratorError::Unavailable(format!("bad instance endpoint: {e}")))
    }
}

#[async_trait]
impl Orchestrator for ClusterOrchestrator {
    async fn functions(&self) -> Result<Vec<Function>> {
        debug!("fetching workloads from the cluster");
        let workloads: Vec<RegisteredWorkload> = self
            .client
            .get(self.url("api/v0/workloads.list")?)
            .send()
            .await
            .map_err(unavailable)?
            .json()
            .await
            .map_err(unavailable)?;

        Ok(workloads
            .into_iter()
            .filter(|w| w.value.kind == WORKLOAD_KIND_FUNCTION)
            .map(|w| Function {
                id: w.id,
                name: w.name,
                image: w.value.spec.function.execution.rootfs,
            })
            .collect())
    }

    async fn create_function(&self, name: &str, image: &str) -> Result<Function> {
        debug!(function = %name, "creating workload");
        let body = Workload {
            api_version: "v0",
            kind: WORKLOAD_KIND_FUNCTION,
            name: name.to_string(),
            spec: WorkloadSpec {
                containers: Vec::new(),
                function: WorkloadFn {
                    execution: WorkloadExecution {
                        rootfs: image.to_string(),
                    },
                    exposure: WorkloadExposure { kind: "NodePort" },
                },
            },
        };

        let res = self
            .client
            .post(self.url("api/v0/workloads.create")?)
            .json(&body)
            .send()
            .await
            .map_err(unavailable)?;

        if !res.status().is_success() {
            return Err(OrchestratorError::Conflict {
                status: res.status().as_u16(),
            });
        }

        let created: CreateWorkloadResponse = res.json().await.map_err(unavailable)?;
        Ok(Function {
            id: created.id,
            name: name.to_string(),
            image: image.to_string(),
        })
    }

    async fn instances(&self, function: &Function) -> Result<Vec<FnInstance>> {
        let res = self
            .client
            .get(self.url(&format!("api/v0/workloads.instances/{}", function.id))?)
            .send()
            .await
            .map_err(unavailable)?;

        match res.status() {
            StatusCode::NOT_FOUND => {
                return Err(OrchestratorError::NotFound(function.id.clone()))
            }
            StatusCode::NO_CONTENT => {
                warn!(function = %function.name, "no instances for workload");
                return Ok(Vec::new());
            }
            status if !status.is_success() => {
                return Err(OrchestratorError::Unavailable(format!(
                    "cluster returned status {status} listing instances"
                )))
            }
            _ => {}
        }

        let data: FetchInstancesResponse = res.json().await.map_err(unavailable)?;

        let mut instances = Vec::with_capacity(data.instances.len());
        for raw in data.instances {
            instances.push(FnInstance {
                id: raw.id,
                function: function.clone(),
                endpoint: self.instance_endpoint(raw.spec.function.exposure.port)?,
            });
        }
        Ok(instances)
    }

    async fn create_instance(&self, function_id: &str, instance_name: &str) -> Result<()> {
        debug!(workload = %function_id, instance = %instance_name, "creating instance");
        let res = self
            .client
            .post(self.url("api/v0/instances.create")?)
            .json(&CreateInstanceRequest {
                workload_id: function_id,
                name: instance_name,
            })
            .send()
            .await
            .map_err(unavailable)?;

        if res.status() != StatusCode::CREATED {
            return Err(OrchestratorError::Conflict {
                status: res.status().as_u16(),
            });
        }
        Ok(())
    }

    async fn delete_instance(&self, instance_id: &str) -> Result<()> {
        debug!(instance = %instance_id, "deleting instance");
        let res = self
            .client
            .post(self.url("api/v0/instances.delete")?)
            .json(&DeleteInstanceRequest { id: instance_id })
            .send()
            .await
            .map_err(unavailable)?;

        if res.status() == StatusCode::NOT_FOUND {
            return Err(OrchestratorError::NotFound(instance_id.to_string()));
        }
        if !res.status().is_success() {
            return Err(OrchestratorError::Conflict {
                status: res.status().as_u16(),
            });
        }
        Ok(())
    }
}
