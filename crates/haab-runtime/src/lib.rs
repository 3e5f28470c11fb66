//! haab-runtime — the container runtime capability.
//!
//! The orchestrator talks to the container runtime only through the
//! [`ContainerRuntime`] trait: an opaque capability constructed once at
//! process start and injected into everything that needs it. The production
//! implementation is [`DockerRuntime`] over the Docker Engine API;
//! [`MockRuntime`] simulates the same surface in memory for tests.

mod docker;
mod mock;

use std::pin::Pin;

use async_trait::async_trait;
use futures_util::Stream;
use serde::{Deserialize, Serialize};
use thiserror::Error;

pub use docker::DockerRuntime;
pub use mock::{LogItem, MockRuntime, PullGate};

/// Errors surfaced by the runtime capability.
///
/// "Not found" is the only condition callers branch on (idempotent delete,
/// log-stream termination); everything else is an opaque cause.
#[derive(Debug, Error)]
pub enum RuntimeError {
    #[error("container not found: {0}")]
    NotFound(String),

    #[error("container runtime unavailable: {0}")]
    Unavailable(String),

    #[error("container runtime error: {0}")]
    Api(String),
}

impl RuntimeError {
    /// Whether this error means the container does not exist.
    pub fn is_not_found(&self) -> bool {
        matches!(self, RuntimeError::NotFound(_))
    }
}

/// Result type alias for runtime operations.
pub type RuntimeResult<T> = Result<T, RuntimeError>;

/// A live log tail: backlog lines first, then new lines as they are
/// produced. An `Err` item is terminal — the runtime failed mid-stream and
/// nothing follows it. Dropping the stream releases the underlying
/// log-follow resource.
pub type LogStream = Pin<Box<dyn Stream<Item = RuntimeResult<String>> + Send>>;

/// Everything needed to launch one detached container.
#[derive(Debug, Clone)]
pub struct RunSpec {
    /// Image reference, already pulled.
    pub image: String,
    /// Container name (`haab-<app>`).
    pub name: String,
    /// Host port the container's internal port is published to.
    pub host_port: u16,
    /// Fixed port inside the container.
    pub container_port: u16,
}

/// Observed state of one runtime container.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ContainerSummary {
    /// Runtime-assigned container id.
    pub id: String,
    /// Container name without the leading slash.
    pub name: String,
    /// Runtime state string (e.g. "running", "exited").
    pub status: String,
    /// Image reference the container was created from.
    pub image: String,
}

/// Capability interface to the container runtime.
///
/// The runtime is stateless from the caller's point of view: nothing is
/// cached between calls, every operation re-queries the daemon.
#[async_trait]
pub trait ContainerRuntime: Send + Sync {
    /// Runtime daemon version string.
    async fn version(&self) -> RuntimeResult<String>;

    /// Pull an image, waiting for the pull to complete.
    async fn pull_image(&self, image: &str) -> RuntimeResult<()>;

    /// Create and start a detached container. Returns the container id.
    async fn run_container(&self, spec: &RunSpec) -> RuntimeResult<String>;

    /// Look up a container by name or id.
    async fn inspect(&self, name_or_id: &str) -> RuntimeResult<ContainerSummary>;

    /// Stop a running container.
    async fn stop(&self, name_or_id: &str) -> RuntimeResult<()>;

    /// Remove a stopped container.
    async fn remove(&self, name_or_id: &str) -> RuntimeResult<()>;

    /// List all containers (including stopped) whose name carries the prefix.
    async fn list_managed(&self, name_prefix: &str) -> RuntimeResult<Vec<ContainerSummary>>;

    /// Follow a container's logs: `tail` backlog lines, then live output.
    async fn stream_logs(&self, name_or_id: &str, tail: u32) -> RuntimeResult<LogStream>;
}
