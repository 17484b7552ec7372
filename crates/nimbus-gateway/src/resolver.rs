//! Instance resolution and cold start.

use dashmap::DashMap;
use nimbus_common::{FnInstance, Function, GatewayError};
use rand::Rng;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tracing::{debug, info};

use crate::orchestrator::{Orchestrator, OrchestratorError};

/// How long to wait after asking for a new instance before re-querying the
/// orchestrator, so placement and boot can take effect.
pub const DEFAULT_SETTLE_DELAY: Duration = Duration::from_millis(500);

/// Picks one instance out of a non-empty candidate list.
///
/// Selection is a named policy, not an implementation detail: the resolver
/// never weights instances itself, it delegates here.
pub trait SelectionPolicy: Send + Sync {
    fn select<'a>(&self, instances: &'a [FnInstance]) -> Option<&'a FnInstance>;
}

/// Uniform-random selection, with no health or load weighting. This is the
/// documented default policy.
pub struct UniformRandom;

impl SelectionPolicy for UniformRandom {
    fn select<'a>(&self, instances: &'a [FnInstance]) -> Option<&'a FnInstance> {
        if instances.is_empty() {
            return None;
        }
        let index = rand::rng().random_range(0..instances.len());
        instances.get(index)
    }
}

/// Turns a function descriptor into a routable instance, lazily
/// provisioning one when none exists.
///
/// Cold starts are single-flight per function id: concurrent first
/// invocations of the same function collapse into one instance creation,
/// with the other callers waiting for it to settle.
pub struct InstanceResolver {
    orchestrator: Arc<dyn Orchestrator>,
    policy: Arc<dyn SelectionPolicy>,
    settle_delay: Duration,
    cold_starts: DashMap<String, Arc<Mutex<()>>>,
}

fn scheduling(e: OrchestratorError) -> GatewayError {
    GatewayError::SchedulingFailure(e.to_string())
}

/// Generated names only need to avoid collisions across concurrent cold
/// starts; a random suffix on the function name is enough.
fn generate_instance_name(function_name: &str) -> String {
    let suffix: String = rand::rng()
        .sample_iter(rand::distr::Alphanumeric)
        .take(8)
        .map(|b| (b as char).to_ascii_lowercase())
        .collect();
    format!("{function_name}-{suffix}")
}

impl InstanceResolver {
    pub fn new(orchestrator: Arc<dyn Orchestrator>) -> Self {
        Self {
            orchestrator,
            policy: Arc::new(UniformRandom),
            settle_delay: DEFAULT_SETTLE_DELAY,
            cold_starts: DashMap::new(),
        }
    }

    pub fn with_policy(mut self, policy: Arc<dyn SelectionPolicy>) -> Self {
        self.policy = policy;
        self
    }

    pub fn with_settle_delay(mut self, settle_delay: Duration) -> Self {
        self.settle_delay = settle_delay;
        self
    }

    /// Resolve `function` to a routable instance. Cold start is attempted
    /// at most once per invocation; if the orchestrator still reports no
    /// instances after the settle delay, the invocation fails.
    pub async fn resolve(&self, function: &Function) -> nimbus_common::Result<FnInstance> {
        let instances = self
            .orchestrator
            .instances(function)
            .await
            .map_err(scheduling)?;
        debug!(function = %function.name, count = instances.len(), "fetched instances");

        if let Some(instance) = self.policy.select(&instances) {
            return Ok(instance.clone());
        }

        let gate = self
            .cold_starts
            .entry(function.id.clone())
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone();

        let _guard = match gate.try_lock() {
            Ok(guard) => guard,
            Err(_) => {
                // Another request is already cold-starting this function;
                // wait for it and re-check before creating a duplicate.
                let guard = gate.lock().await;
                let instances = self
                    .orchestrator
                    .instances(function)
                    .await
                    .map_err(scheduling)?;
                if let Some(instance) = self.policy.select(&instances) {
                    return Ok(instance.clone());
                }
                guard
            }
        };

        info!(function = %function.name, "no instance found, creating one");
        let instance_name = generate_instance_name(&function.name);
        self.orchestrator
            .create_instance(&function.id, &instance_name)
            .await
            .map_err(scheduling)?;

        tokio::time::sleep(self.settle_delay).await;

        let instances = self
            .orchestrator
            .instances(function)
            .await
            .map_err(scheduling)?;
        debug!(function = %function.name, count = instances.len(), "re-fetched instances after cold start");

        self.policy.select(&instances).cloned().ok_or_else(|| {
            GatewayError::SchedulingFailure(format!(
                "no instance of '{}' became available after cold start",
                function.name
            ))
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testutil::{InstanceScript, MockOrchestrator};
    use std::sync::atomic::Ordering;

    fn function() -> Function {
        Function {
            id: "wk-1".to_string(),
            name: "echo".to_string(),
            image: "img://demo".to_string(),
        }
    }

    fn resolver(orchestrator: &Arc<MockOrchestrator>) -> InstanceResolver {
        InstanceResolver::new(orchestrator.clone() as Arc<dyn Orchestrator>)
            .with_settle_delay(Duration::from_millis(5))
    }

    #[tokio::test]
    async fn warm_function_resolves_without_cold_start() {
        let orchestrator = Arc::new(MockOrchestrator::new(InstanceScript::Warm(2)));
        let resolved = resolver(&orchestrator).resolve(&function()).await.unwrap();

        assert!(resolved.id.starts_with("inst-"));
        assert_eq!(orchestrator.create_instance_calls.load(Ordering::SeqCst), 0);
        assert_eq!(orchestrator.instances_calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn cold_start_creates_exactly_one_instance_and_requeries_once() {
        let orchestrator = Arc::new(MockOrchestrator::new(InstanceScript::EmptyUntilCreated(1)));
        let resolved = resolver(&orchestrator).resolve(&function()).await.unwrap();

        assert_eq!(resolved.function.id, "wk-1");
        assert_eq!(orchestrator.create_instance_calls.load(Ordering::SeqCst), 1);
        // One initial query plus exactly one re-query after creation.
        assert_eq!(orchestrator.instances_calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn scheduling_failure_when_cold_start_yields_nothing() {
        let orchestrator = Arc::new(MockOrchestrator::new(InstanceScript::AlwaysEmpty));
        let err = resolver(&orchestrator)
            .resolve(&function())
            .await
            .unwrap_err();

        assert!(matches!(err, GatewayError::SchedulingFailure(_)));
        // Cold start is attempted at most once per invocation.
        assert_eq!(orchestrator.create_instance_calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn concurrent_cold_starts_collapse_into_one_creation() {
        let orchestrator = Arc::new(MockOrchestrator::new(InstanceScript::EmptyUntilCreated(1)));
        let resolver = Arc::new(resolver(&orchestrator));

        let a = {
            let resolver = resolver.clone();
            tokio::spawn(async move { resolver.resolve(&function()).await })
        };
        let b = {
            let resolver = resolver.clone();
            tokio::spawn(async move { resolver.resolve(&function()).await })
        };

        a.await.unwrap().unwrap();
        b.await.unwrap().unwrap();

        assert_eq!(orchestrator.create_instance_calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn generated_names_are_prefixed_and_distinct() {
        let a = generate_instance_name("echo");
        let b = generate_instance_name("echo");
        assert!(a.starts_with("echo-"));
        assert_ne!(a, b);
    }
}
