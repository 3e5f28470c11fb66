//! Mock container runtime for testing.
//!
//! Simulates the runtime capability in memory: containers are HashMap
//! entries, failures are injectable per operation, pulls can be gated to
//! force deterministic interleavings, and log streams are scripted.

use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use async_trait::async_trait;
use futures_util::stream;
use tokio::sync::{Mutex, RwLock, Semaphore, mpsc};
use tracing::debug;

use crate::{ContainerRuntime, ContainerSummary, LogStream, RunSpec, RuntimeError, RuntimeResult};

#[derive(Debug, Clone)]
struct MockContainer {
    id: String,
    name: String,
    image: String,
    status: String,
}

/// One scripted log stream item.
#[derive(Debug, Clone)]
pub enum LogItem {
    Line(String),
    /// Terminal runtime failure mid-stream.
    Fail(String),
}

/// Handle to a pull gate installed via [`MockRuntime::gate_pulls`].
///
/// A gated pull first signals entry, then blocks until a permit is
/// released. Tests use this to hold one deploy at its pull step while
/// another runs to completion.
pub struct PullGate {
    permits: Arc<Semaphore>,
    entered: mpsc::UnboundedReceiver<()>,
}

impl PullGate {
    /// Wait until a pull has reached the gate.
    pub async fn entered(&mut self) {
        let _ = self.entered.recv().await;
    }

    /// Let one gated pull proceed.
    pub fn release(&self) {
        self.permits.add_permits(1);
    }
}

/// In-memory runtime that simulates container operations.
#[derive(Default)]
pub struct MockRuntime {
    containers: Arc<RwLock<HashMap<String, MockContainer>>>,
    next_id: AtomicU64,
    pull_error: Mutex<Option<String>>,
    run_error: Mutex<Option<String>>,
    stop_error: Mutex<Option<String>>,
    remove_error: Mutex<Option<String>>,
    pull_gate: Mutex<Option<(Arc<Semaphore>, mpsc::UnboundedSender<()>)>>,
    log_scripts: Mutex<HashMap<String, Vec<LogItem>>>,
}

impl MockRuntime {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of containers currently present (for assertions).
    pub async fn container_count(&self) -> usize {
        self.containers.read().await.len()
    }

    /// Whether a container with this name exists (for assertions).
    pub async fn has_container(&self, name: &str) -> bool {
        self.containers.read().await.contains_key(name)
    }

    /// Make every subsequent pull fail with this message.
    pub async fn fail_pulls(&self, cause: &str) {
        *self.pull_error.lock().await = Some(cause.to_string());
    }

    /// Make every subsequent run fail with this message.
    pub async fn fail_runs(&self, cause: &str) {
        *self.run_error.lock().await = Some(cause.to_string());
    }

    /// Make every subsequent stop fail with this message.
    pub async fn fail_stops(&self, cause: &str) {
        *self.stop_error.lock().await = Some(cause.to_string());
    }

    /// Make every subsequent remove fail with this message.
    pub async fn fail_removes(&self, cause: &str) {
        *self.remove_error.lock().await = Some(cause.to_string());
    }

    /// Gate subsequent pulls behind the returned [`PullGate`].
    pub async fn gate_pulls(&self) -> PullGate {
        let permits = Arc::new(Semaphore::new(0));
        let (tx, rx) = mpsc::unbounded_channel();
        *self.pull_gate.lock().await = Some((permits.clone(), tx));
        PullGate {
            permits,
            entered: rx,
        }
    }

    /// Remove the pull gate; later pulls proceed immediately. Pulls already
    /// waiting stay blocked until their gate is released.
    pub async fn clear_pull_gate(&self) {
        *self.pull_gate.lock().await = None;
    }

    /// Script the log stream for a container name.
    pub async fn script_logs(&self, name: &str, items: Vec<LogItem>) {
        self.log_scripts.lock().await.insert(name.to_string(), items);
    }

    /// Register a container directly, bypassing pull/run (for tests that
    /// need pre-existing runtime state).
    pub async fn seed_container(&self, name: &str, image: &str, status: &str) {
        let id = format!("mock-{}", self.next_id.fetch_add(1, Ordering::SeqCst) + 1);
        self.containers.write().await.insert(
            name.to_string(),
            MockContainer {
                id,
                name: name.to_string(),
                image: image.to_string(),
                status: status.to_string(),
            },
        );
    }
}

#[async_trait]
impl ContainerRuntime for MockRuntime {
    async fn version(&self) -> RuntimeResult<String> {
        Ok("mock-1.0".to_string())
    }

    async fn pull_image(&self, image: &str) -> RuntimeResult<()> {
        let gate = self.pull_gate.lock().await.clone();
        if let Some((permits, entered)) = gate {
            let _ = entered.send(());
            let permit = permits
                .acquire()
                .await
                .map_err(|e| RuntimeError::Api(e.to_string()))?;
            permit.forget();
        }
        if let Some(cause) = self.pull_error.lock().await.clone() {
            return Err(RuntimeError::Api(cause));
        }
        debug!(%image, "mock pull");
        Ok(())
    }

    async fn run_container(&self, spec: &RunSpec) -> RuntimeResult<String> {
        if let Some(cause) = self.run_error.lock().await.clone() {
            return Err(RuntimeError::Api(cause));
        }
        let id = format!("mock-{}", self.next_id.fetch_add(1, Ordering::SeqCst) + 1);
        self.containers.write().await.insert(
            spec.name.clone(),
            MockContainer {
                id: id.clone(),
                name: spec.name.clone(),
                image: spec.image.clone(),
                status: "running".to_string(),
            },
        );
        debug!(name = %spec.name, %id, "mock run");
        Ok(id)
    }

    async fn inspect(&self, name_or_id: &str) -> RuntimeResult<ContainerSummary> {
        let containers = self.containers.read().await;
        let found = containers
            .values()
            .find(|c| c.name == name_or_id || c.id == name_or_id)
            .ok_or_else(|| RuntimeError::NotFound(name_or_id.to_string()))?;
        Ok(ContainerSummary {
            id: found.id.clone(),
            name: found.name.clone(),
            status: found.status.clone(),
            image: found.image.clone(),
        })
    }

    async fn stop(&self, name_or_id: &str) -> RuntimeResult<()> {
        if let Some(cause) = self.stop_error.lock().await.clone() {
            return Err(RuntimeError::Api(cause));
        }
        let mut containers = self.containers.write().await;
        match containers.get_mut(name_or_id) {
            Some(container) => {
                container.status = "exited".to_string();
                Ok(())
            }
            None => Err(RuntimeError::NotFound(name_or_id.to_string())),
        }
    }

    async fn remove(&self, name_or_id: &str) -> RuntimeResult<()> {
        if let Some(cause) = self.remove_error.lock().await.clone() {
            return Err(RuntimeError::Api(cause));
        }
        let mut containers = self.containers.write().await;
        if containers.remove(name_or_id).is_none() {
            return Err(RuntimeError::NotFound(name_or_id.to_string()));
        }
        Ok(())
    }

    async fn list_managed(&self, name_prefix: &str) -> RuntimeResult<Vec<ContainerSummary>> {
        let containers = self.containers.read().await;
        let mut results: Vec<ContainerSummary> = containers
            .values()
            .filter(|c| c.name.starts_with(name_prefix))
            .map(|c| ContainerSummary {
                id: c.id.clone(),
                name: c.name.clone(),
                status: c.status.clone(),
                image: c.image.clone(),
            })
            .collect();
        results.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(results)
    }

    async fn stream_logs(&self, name_or_id: &str, _tail: u32) -> RuntimeResult<LogStream> {
        if !self.containers.read().await.contains_key(name_or_id) {
            return Err(RuntimeError::NotFound(name_or_id.to_string()));
        }
        let script = self
            .log_scripts
            .lock()
            .await
            .get(name_or_id)
            .cloned()
            .unwrap_or_default();
        let items: Vec<RuntimeResult<String>> = script
            .into_iter()
            .map(|item| match item {
                LogItem::Line(line) => Ok(line),
                LogItem::Fail(cause) => Err(RuntimeError::Api(cause)),
            })
            .collect();
        Ok(Box::pin(stream::iter(items)))
    }
}
