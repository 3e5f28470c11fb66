//! Docker implementation of the runtime capability, via bollard.
//!
//! One `Docker` handle is created at construction and shared; bollard
//! multiplexes requests over it, so the type is cheap to clone.

use std::collections::HashMap;

use async_trait::async_trait;
use bollard::Docker;
use bollard::models::{ContainerCreateBody, HostConfig, PortBinding};
use bollard::query_parameters::{
    CreateContainerOptionsBuilder, CreateImageOptionsBuilder, InspectContainerOptions,
    ListContainersOptionsBuilder, LogsOptionsBuilder, RemoveContainerOptions,
    StartContainerOptions, StopContainerOptionsBuilder,
};
use futures_util::StreamExt;
use tracing::{debug, info};

use crate::{ContainerRuntime, ContainerSummary, LogStream, RunSpec, RuntimeError, RuntimeResult};

/// Docker Engine runtime client.
#[derive(Clone)]
pub struct DockerRuntime {
    docker: Docker,
    /// Seconds to wait on stop before the daemon kills the container.
    stop_timeout_secs: u32,
}

impl DockerRuntime {
    /// Connect to the local Docker daemon (socket or named pipe).
    pub fn connect(stop_timeout_secs: u32) -> RuntimeResult<Self> {
        let docker = Docker::connect_with_local_defaults()
            .map_err(|e| RuntimeError::Unavailable(e.to_string()))?;
        Ok(Self {
            docker,
            stop_timeout_secs,
        })
    }
}

/// Translate a bollard error, tagging 404s as not-found for `name`.
fn map_err(name: &str, e: bollard::errors::Error) -> RuntimeError {
    match e {
        bollard::errors::Error::DockerResponseServerError {
            status_code: 404, ..
        } => RuntimeError::NotFound(name.to_string()),
        other => RuntimeError::Api(other.to_string()),
    }
}

#[async_trait]
impl ContainerRuntime for DockerRuntime {
    async fn version(&self) -> RuntimeResult<String> {
        let version = self
            .docker
            .version()
            .await
            .map_err(|e| RuntimeError::Unavailable(e.to_string()))?;
        Ok(version.version.unwrap_or_else(|| "unknown".to_string()))
    }

    async fn pull_image(&self, image: &str) -> RuntimeResult<()> {
        info!(%image, "pulling image");
        let options = CreateImageOptionsBuilder::default().from_image(image).build();
        let mut progress = self.docker.create_image(Some(options), None, None);
        while let Some(item) = progress.next().await {
            item.map_err(|e| RuntimeError::Api(e.to_string()))?;
        }
        debug!(%image, "image pulled");
        Ok(())
    }

    async fn run_container(&self, spec: &RunSpec) -> RuntimeResult<String> {
        let internal = format!("{}/tcp", spec.container_port);

        let mut port_bindings = HashMap::new();
        port_bindings.insert(
            internal.clone(),
            Some(vec![PortBinding {
                host_ip: Some("0.0.0.0".to_string()),
                host_port: Some(spec.host_port.to_string()),
            }]),
        );
        let mut exposed_ports = HashMap::new();
        exposed_ports.insert(internal, HashMap::new());

        let body = ContainerCreateBody {
            image: Some(spec.image.clone()),
            exposed_ports: Some(exposed_ports),
            host_config: Some(HostConfig {
                port_bindings: Some(port_bindings),
                ..Default::default()
            }),
            ..Default::default()
        };

        let options = CreateContainerOptionsBuilder::default()
            .name(&spec.name)
            .build();
        let created = self
            .docker
            .create_container(Some(options), body)
            .await
            .map_err(|e| RuntimeError::Api(e.to_string()))?;

        // Containers run detached: start returns as soon as the daemon
        // accepts, matching the deploy workflow's expectations.
        if let Err(e) = self
            .docker
            .start_container(&spec.name, None::<StartContainerOptions>)
            .await
        {
            // The created-but-unstarted container would linger; remove it so
            // a failed launch leaves nothing behind.
            let _ = self
                .docker
                .remove_container(&spec.name, None::<RemoveContainerOptions>)
                .await;
            return Err(RuntimeError::Api(e.to_string()));
        }

        info!(name = %spec.name, id = %created.id, host_port = spec.host_port, "container started");
        Ok(created.id)
    }

    async fn inspect(&self, name_or_id: &str) -> RuntimeResult<ContainerSummary> {
        let details = self
            .docker
            .inspect_container(name_or_id, None::<InspectContainerOptions>)
            .await
            .map_err(|e| map_err(name_or_id, e))?;

        Ok(ContainerSummary {
            id: details.id.unwrap_or_default(),
            name: details
                .name
                .map(|n| n.trim_start_matches('/').to_string())
                .unwrap_or_default(),
            status: details
                .state
                .and_then(|s| s.status)
                .map(|s| s.to_string())
                .unwrap_or_else(|| "unknown".to_string()),
            image: details.config.and_then(|c| c.image).unwrap_or_default(),
        })
    }

    async fn stop(&self, name_or_id: &str) -> RuntimeResult<()> {
        let options = StopContainerOptionsBuilder::default()
            .t(self.stop_timeout_secs as i32)
            .build();
        self.docker
            .stop_container(name_or_id, Some(options))
            .await
            .map_err(|e| map_err(name_or_id, e))?;
        debug!(container = %name_or_id, "container stopped");
        Ok(())
    }

    async fn remove(&self, name_or_id: &str) -> RuntimeResult<()> {
        self.docker
            .remove_container(name_or_id, None::<RemoveContainerOptions>)
            .await
            .map_err(|e| map_err(name_or_id, e))?;
        debug!(container = %name_or_id, "container removed");
        Ok(())
    }

    async fn list_managed(&self, name_prefix: &str) -> RuntimeResult<Vec<ContainerSummary>> {
        // The daemon's name filter is a substring match; the prefix check
        // below is what actually decides membership.
        let mut filters: HashMap<String, Vec<String>> = HashMap::new();
        filters.insert("name".to_string(), vec![name_prefix.to_string()]);
        let options = ListContainersOptionsBuilder::default()
            .all(true)
            .filters(&filters)
            .build();

        let containers = self
            .docker
            .list_containers(Some(options))
            .await
            .map_err(|e| RuntimeError::Api(e.to_string()))?;

        let mut results = Vec::new();
        for c in containers {
            let name = c
                .names
                .as_ref()
                .and_then(|names| names.first())
                .map(|n| n.trim_start_matches('/').to_string())
                .unwrap_or_default();
            if !name.starts_with(name_prefix) {
                continue;
            }
            results.push(ContainerSummary {
                id: c.id.unwrap_or_default(),
                name,
                status: c
                    .state
                    .map(|s| s.to_string())
                    .unwrap_or_else(|| "unknown".to_string()),
                image: c.image.unwrap_or_default(),
            });
        }
        Ok(results)
    }

    async fn stream_logs(&self, name_or_id: &str, tail: u32) -> RuntimeResult<LogStream> {
        // Surface a missing container before handing back a stream.
        self.inspect(name_or_id).await?;

        let options = LogsOptionsBuilder::default()
            .follow(true)
            .stdout(true)
            .stderr(true)
            .tail(&tail.to_string())
            .build();

        let name = name_or_id.to_string();
        let stream = self
            .docker
            .logs(name_or_id, Some(options))
            .map(move |item| match item {
                Ok(output) => {
                    let bytes = output.into_bytes();
                    let text = String::from_utf8_lossy(&bytes);
                    Ok(text.trim_end_matches(['\r', '\n']).to_string())
                }
                Err(e) => Err(map_err(&name, e)),
            });
        Ok(Box::pin(stream))
    }
}
