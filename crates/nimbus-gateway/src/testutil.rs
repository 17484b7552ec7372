//! In-process capability doubles shared by the engine tests.

use async_trait::async_trait;
use nimbus_common::{FnInstance, Function, Url};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Mutex;

use crate::orchestrator::{Orchestrator, Result};

/// Scripted shape of the instance list the mock cluster reports.
pub(crate) enum InstanceScript {
    /// Never any instances, even after creation.
    AlwaysEmpty,
    /// `n` instances from the start.
    Warm(usize),
    /// Empty until `create_instance` is called, then `n` instances.
    EmptyUntilCreated(usize),
}

pub(crate) struct MockOrchestrator {
    script: InstanceScript,
    endpoint: Url,
    created: AtomicBool,
    pub functions_calls: AtomicUsize,
    pub instances_calls: AtomicUsize,
    pub create_function_calls: AtomicUsize,
    pub create_instance_calls: AtomicUsize,
    pub created_names: Mutex<Vec<String>>,
    pub seed_functions: Mutex<Vec<Function>>,
}

impl MockOrchestrator {
    pub fn new(script: InstanceScript) -> Self {
        Self {
            script,
            endpoint: Url::parse("http://127.0.0.1:9").expect("static url"),
            created: AtomicBool::new(false),
            functions_calls: AtomicUsize::new(0),
            instances_calls: AtomicUsize::new(0),
            create_function_calls: AtomicUsize::new(0),
            create_instance_calls: AtomicUsize::new(0),
            created_names: Mutex::new(Vec::new()),
            seed_functions: Mutex::new(Vec::new()),
        }
    }

    /// Endpoint handed out for every fabricated instance.
    pub fn with_endpoint(mut self, endpoint: Url) -> Self {
        self.endpoint = endpoint;
        self
    }

    pub fn with_seed_functions(self, functions: Vec<Function>) -> Self {
        *self.seed_functions.lock().expect("seed lock") = functions;
        self
    }

    pub fn total_calls(&self) -> usize {
        self.functions_calls.load(Ordering::SeqCst)
            + self.instances_calls.load(Ordering::SeqCst)
            + self.create_function_calls.load(Ordering::SeqCst)
            + self.create_instance_calls.load(Ordering::SeqCst)
    }

    fn visible_instances(&self) -> usize {
        match self.script {
            InstanceScript::AlwaysEmpty => 0,
            InstanceScript::Warm(n) => n,
            InstanceScript::EmptyUntilCreated(n) => {
                if self.created.load(Ordering::SeqCst) {
                    n
                } else {
                    0
                }
            }
        }
    }
}

#[async_trait]
impl Orchestrator for MockOrchestrator {
    async fn functions(&self) -> Result<Vec<Function>> {
        self.functions_calls.fetch_add(1, Ordering::SeqCst);
        Ok(self.seed_functions.lock().expect("seed lock").clone())
    }

    async fn create_function(&self, name: &str, image: &str) -> Result<Function> {
        self.create_function_calls.fetch_add(1, Ordering::SeqCst);
        Ok(Function {
            id: format!("wk-{name}"),
            name: name.to_string(),
            image: image.to_string(),
        })
    }

    async fn instances(&self, function: &Function) -> Result<Vec<FnInstance>> {
        self.instances_calls.fetch_add(1, Ordering::SeqCst);
        Ok((0..self.visible_instances())
            .map(|i| FnInstance {
                id: format!("inst-{i}"),
                function: function.clone(),
                endpoint: self.endpoint.clone(),
            })
            .collect())
    }

    async fn create_instance(&self, _function_id: &str, instance_name: &str) -> Result<()> {
        self.create_instance_calls.fetch_add(1, Ordering::SeqCst);
        self.created_names
            .lock()
            .expect("names lock")
            .push(instance_name.to_string());
        self.created.store(true, Ordering::SeqCst);
        Ok(())
    }

    async fn delete_instance(&self, _instance_id: &str) -> Result<()> {
        Ok(())
    }
}
