//! The deployment orchestrator.
//!
//! Sequences record-store and container-runtime calls for each workflow.
//! Step order matters everywhere: uniqueness checks precede runtime
//! mutation, and the record write comes last so a failure there can be
//! compensated by removing the just-launched container.

use std::sync::Arc;

use tracing::{debug, error, info, warn};

use haab_core::config::DockerConfig;
use haab_core::naming::{container_name, validate_app_name, CONTAINER_PREFIX};
use haab_runtime::{ContainerRuntime, ContainerSummary, LogStream, RunSpec, RuntimeResult};
use haab_state::{AppStatus, ApplicationRecord, NewApplication, RecordStore, StateError};

use crate::error::{DeleteError, DeployError, LogsError};

/// Successful delete, possibly carrying a warning about runtime state the
/// operation could not converge.
#[derive(Debug)]
pub struct DeleteOutcome {
    /// The record that was removed.
    pub record: ApplicationRecord,
    /// Set when the container could not be stopped/removed for a reason
    /// other than already being gone. The store row is deleted regardless.
    pub warning: Option<String>,
}

/// Deployment orchestrator over a record store and a runtime capability.
///
/// Constructed once at process start; cheap to clone, safe to invoke
/// concurrently. Uniqueness under concurrent deploys is arbitrated by the
/// store's insert transaction, not by any lock held here.
#[derive(Clone)]
pub struct Orchestrator {
    store: RecordStore,
    runtime: Arc<dyn ContainerRuntime>,
    /// Fixed port inside every deployed container.
    container_port: u16,
    /// Default backlog for log streams.
    log_tail: u32,
}

impl Orchestrator {
    pub fn new(store: RecordStore, runtime: Arc<dyn ContainerRuntime>, docker: &DockerConfig) -> Self {
        Self {
            store,
            runtime,
            container_port: docker.container_port,
            log_tail: docker.log_tail,
        }
    }

    /// Runtime daemon version, for the system check surface.
    pub async fn runtime_version(&self) -> RuntimeResult<String> {
        self.runtime.version().await
    }

    /// Deploy a named application from an image onto a host port.
    ///
    /// Fails fast on the first violated precondition (port, then name)
    /// before touching the runtime. The record insert re-checks both
    /// atomically, so a racing deploy that slips past the early reads is
    /// rejected there and its container is cleaned up.
    pub async fn deploy(
        &self,
        name: &str,
        image: &str,
        port: u16,
    ) -> Result<ApplicationRecord, DeployError> {
        validate_app_name(name).map_err(|reason| DeployError::InvalidName { reason })?;

        // Read-only validation, cheap and abortable: nothing has been
        // created yet if either check fails.
        if let Some(existing) = self.store.find_by_port(port).map_err(DeployError::Store)? {
            return Err(DeployError::PortConflict {
                port,
                existing_name: existing.name,
            });
        }
        if self
            .store
            .find_by_name(name)
            .map_err(DeployError::Store)?
            .is_some()
        {
            return Err(DeployError::NameConflict {
                name: name.to_string(),
            });
        }

        self.runtime
            .pull_image(image)
            .await
            .map_err(|e| DeployError::ImagePullFailed {
                image: image.to_string(),
                cause: e.to_string(),
            })?;

        let container = container_name(name);
        self.runtime
            .run_container(&RunSpec {
                image: image.to_string(),
                name: container.clone(),
                host_port: port,
                container_port: self.container_port,
            })
            .await
            .map_err(|e| DeployError::RuntimeLaunchFailed {
                cause: e.to_string(),
            })?;

        // The container is live; the record write is the commit point.
        let new = NewApplication {
            name: name.to_string(),
            image: image.to_string(),
            port,
            status: AppStatus::Running,
        };
        match self.store.insert(&new) {
            Ok(record) => {
                info!(id = record.id, %name, %image, port, "application deployed");
                Ok(record)
            }
            Err(store_err) => {
                warn!(%name, %container, error = %store_err, "record write failed after launch, compensating");
                if let Err(cleanup_err) = self.cleanup_container(&container).await {
                    error!(
                        %container,
                        store_error = %store_err,
                        cleanup_error = %cleanup_err,
                        "compensating cleanup failed, container orphaned"
                    );
                    return Err(DeployError::OrphanedContainer {
                        container,
                        store_cause: store_err.to_string(),
                        cleanup_cause: cleanup_err.to_string(),
                    });
                }
                // A conflict here means we lost a race: translate it the
                // same way the early checks would have reported it.
                Err(match store_err {
                    StateError::PortTaken { port, holder } => DeployError::PortConflict {
                        port,
                        existing_name: holder,
                    },
                    StateError::NameTaken { name } => DeployError::NameConflict { name },
                    other => DeployError::StoreWriteFailed {
                        cause: other.to_string(),
                    },
                })
            }
        }
    }

    /// Tear an application down: stop and remove its container, then
    /// delete its record.
    ///
    /// A container that is already gone is the desired end state, not an
    /// error. Any other runtime failure is downgraded to a warning and the
    /// record is deleted anyway — a leftover container can be cleaned up
    /// independently, a dangling record cannot self-heal.
    pub async fn delete(&self, id: u64) -> Result<DeleteOutcome, DeleteError> {
        let record = self
            .store
            .find_by_id(id)?
            .ok_or(DeleteError::NotFound(id))?;

        let container = container_name(&record.name);
        let warning = match self.stop_and_remove(&container).await {
            Ok(()) => None,
            Err(e) if e.is_not_found() => {
                debug!(%container, "container already absent at delete");
                None
            }
            Err(e) => {
                warn!(%container, error = %e, "container teardown failed, deleting record anyway");
                Some(format!("container '{container}' could not be removed: {e}"))
            }
        };

        self.store.delete(id)?;
        info!(id, name = %record.name, warned = warning.is_some(), "application deleted");
        Ok(DeleteOutcome { record, warning })
    }

    /// All application records, as the store intends them. No runtime calls.
    pub fn list(&self) -> Result<Vec<ApplicationRecord>, StateError> {
        self.store.list_all()
    }

    /// Ground truth from the runtime: every container (running or not)
    /// carrying the managed-name prefix. Never touches the store.
    pub async fn list_runtime_managed(&self) -> RuntimeResult<Vec<ContainerSummary>> {
        self.runtime.list_managed(CONTAINER_PREFIX).await
    }

    /// Open a live log stream for an application.
    ///
    /// Replays up to `tail` backlog lines (the configured default when
    /// `None`), then follows. Dropping the stream cancels the follow; a
    /// runtime failure mid-stream arrives as the terminal `Err` item.
    pub async fn stream_logs(&self, id: u64, tail: Option<u32>) -> Result<LogStream, LogsError> {
        let record = self.store.find_by_id(id)?.ok_or(LogsError::NotFound(id))?;
        let container = container_name(&record.name);
        let stream = self
            .runtime
            .stream_logs(&container, tail.unwrap_or(self.log_tail))
            .await?;
        debug!(id, %container, "log stream opened");
        Ok(stream)
    }

    /// Compensating action: best-effort stop+remove where "already gone"
    /// counts as success.
    async fn cleanup_container(&self, container: &str) -> RuntimeResult<()> {
        match self.stop_and_remove(container).await {
            Err(e) if e.is_not_found() => Ok(()),
            other => other,
        }
    }

    /// Stop then remove. Propagates not-found from stop (caller decides if
    /// that is benign); tolerates not-found from remove, since the stop may
    /// race with auto-remove.
    async fn stop_and_remove(&self, container: &str) -> RuntimeResult<()> {
        self.runtime.stop(container).await?;
        match self.runtime.remove(container).await {
            Err(e) if e.is_not_found() => Ok(()),
            other => other,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures_util::StreamExt;
    use haab_runtime::{LogItem, MockRuntime};

    fn fixture() -> (Orchestrator, Arc<MockRuntime>) {
        let store = RecordStore::open_in_memory().unwrap();
        let runtime = Arc::new(MockRuntime::new());
        let orchestrator = Orchestrator::new(store, runtime.clone(), &DockerConfig::default());
        (orchestrator, runtime)
    }

    // ── Deploy ─────────────────────────────────────────────────────

    #[tokio::test]
    async fn deploy_creates_record_and_container() {
        let (orchestrator, runtime) = fixture();

        let record = orchestrator.deploy("blog", "nginx:alpine", 8081).await.unwrap();

        assert_eq!(record.name, "blog");
        assert_eq!(record.port, 8081);
        assert_eq!(record.status, AppStatus::Running);
        assert!(record.id > 0);
        assert!(runtime.has_container("haab-blog").await);
        assert_eq!(runtime.container_count().await, 1);
        assert_eq!(orchestrator.list().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn deploy_port_conflict_names_the_holder() {
        let (orchestrator, runtime) = fixture();
        orchestrator.deploy("a", "nginx:alpine", 8080).await.unwrap();

        let err = orchestrator.deploy("b", "nginx:alpine", 8080).await.unwrap_err();
        match err {
            DeployError::PortConflict { port, existing_name } => {
                assert_eq!(port, 8080);
                assert_eq!(existing_name, "a");
            }
            other => panic!("expected PortConflict, got {other:?}"),
        }
        // Nothing new was created.
        assert_eq!(orchestrator.list().unwrap().len(), 1);
        assert_eq!(runtime.container_count().await, 1);
    }

    #[tokio::test]
    async fn deploy_name_conflict() {
        let (orchestrator, runtime) = fixture();
        orchestrator.deploy("blog", "nginx:alpine", 8080).await.unwrap();

        let err = orchestrator.deploy("blog", "nginx:alpine", 9090).await.unwrap_err();
        assert!(matches!(err, DeployError::NameConflict { name } if name == "blog"));
        assert_eq!(orchestrator.list().unwrap().len(), 1);
        assert_eq!(runtime.container_count().await, 1);
    }

    #[tokio::test]
    async fn deploy_rejects_invalid_name() {
        let (orchestrator, runtime) = fixture();
        let err = orchestrator.deploy("My Blog", "nginx:alpine", 8080).await.unwrap_err();
        assert!(matches!(err, DeployError::InvalidName { .. }));
        assert_eq!(runtime.container_count().await, 0);
    }

    #[tokio::test]
    async fn deploy_pull_failure_leaves_no_state() {
        let (orchestrator, runtime) = fixture();
        runtime.fail_pulls("registry unreachable").await;

        let err = orchestrator.deploy("blog", "nginx:alpine", 8080).await.unwrap_err();
        assert!(matches!(err, DeployError::ImagePullFailed { .. }));
        assert!(orchestrator.list().unwrap().is_empty());
        assert_eq!(runtime.container_count().await, 0);
    }

    #[tokio::test]
    async fn deploy_launch_failure_inserts_no_record() {
        let (orchestrator, runtime) = fixture();
        runtime.fail_runs("port bind failed").await;

        let err = orchestrator.deploy("blog", "nginx:alpine", 8080).await.unwrap_err();
        assert!(matches!(err, DeployError::RuntimeLaunchFailed { .. }));
        assert!(orchestrator.list().unwrap().is_empty());
        assert_eq!(runtime.container_count().await, 0);
    }

    // ── Racing deploys ─────────────────────────────────────────────

    // Holds deploy A at its pull step (after the uniqueness reads), lets
    // deploy B for the same port complete, then releases A. A's insert is
    // rejected by the store and its container must be compensated away.
    #[tokio::test]
    async fn racing_deploys_one_winner_no_orphan() {
        let (orchestrator, runtime) = fixture();
        let mut gate = runtime.gate_pulls().await;

        let loser = {
            let orchestrator = orchestrator.clone();
            tokio::spawn(async move { orchestrator.deploy("a", "nginx:alpine", 8080).await })
        };
        gate.entered().await;

        // B deploys the same port to completion while A is held.
        runtime.clear_pull_gate().await;
        orchestrator.deploy("b", "nginx:alpine", 8080).await.unwrap();

        gate.release();
        let err = loser.await.unwrap().unwrap_err();
        match err {
            DeployError::PortConflict { port, existing_name } => {
                assert_eq!(port, 8080);
                assert_eq!(existing_name, "b");
            }
            other => panic!("expected PortConflict, got {other:?}"),
        }

        // Exactly one record and one container, and no trace of the loser.
        let records = orchestrator.list().unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].name, "b");
        assert_eq!(runtime.container_count().await, 1);
        assert!(!runtime.has_container("haab-a").await);
    }

    #[tokio::test]
    async fn race_loser_with_failed_cleanup_reports_orphan() {
        let (orchestrator, runtime) = fixture();
        let mut gate = runtime.gate_pulls().await;

        let loser = {
            let orchestrator = orchestrator.clone();
            tokio::spawn(async move { orchestrator.deploy("a", "nginx:alpine", 8080).await })
        };
        gate.entered().await;

        runtime.clear_pull_gate().await;
        orchestrator.deploy("b", "nginx:alpine", 8080).await.unwrap();

        // Compensation will fail: the orphan must be reported, not dropped.
        runtime.fail_stops("daemon hiccup").await;
        gate.release();

        let err = loser.await.unwrap().unwrap_err();
        match err {
            DeployError::OrphanedContainer {
                container,
                store_cause,
                cleanup_cause,
            } => {
                assert_eq!(container, "haab-a");
                assert!(store_cause.contains("8080"));
                assert!(cleanup_cause.contains("daemon hiccup"));
            }
            other => panic!("expected OrphanedContainer, got {other:?}"),
        }
        // The orphan really is still there for an operator to find.
        assert!(runtime.has_container("haab-a").await);
    }

    // ── Delete ─────────────────────────────────────────────────────

    #[tokio::test]
    async fn delete_removes_container_and_record() {
        let (orchestrator, runtime) = fixture();
        let record = orchestrator.deploy("blog", "nginx:alpine", 8081).await.unwrap();

        let outcome = orchestrator.delete(record.id).await.unwrap();
        assert_eq!(outcome.record.name, "blog");
        assert!(outcome.warning.is_none());
        assert!(orchestrator.list().unwrap().is_empty());
        assert_eq!(runtime.container_count().await, 0);
    }

    #[tokio::test]
    async fn delete_is_idempotent_when_container_already_gone() {
        let (orchestrator, runtime) = fixture();
        let record = orchestrator.deploy("blog", "nginx:alpine", 8081).await.unwrap();

        // Simulate a manual `docker rm -f` behind our back.
        runtime.stop("haab-blog").await.unwrap();
        runtime.remove("haab-blog").await.unwrap();

        let outcome = orchestrator.delete(record.id).await.unwrap();
        assert!(outcome.warning.is_none());
        assert!(orchestrator.list().unwrap().is_empty());
    }

    #[tokio::test]
    async fn delete_downgrades_runtime_error_to_warning() {
        let (orchestrator, runtime) = fixture();
        let record = orchestrator.deploy("blog", "nginx:alpine", 8081).await.unwrap();
        runtime.fail_stops("daemon busy").await;

        let outcome = orchestrator.delete(record.id).await.unwrap();
        let warning = outcome.warning.expect("expected a warning");
        assert!(warning.contains("haab-blog"));
        assert!(warning.contains("daemon busy"));
        // The record is gone even though the container is not.
        assert!(orchestrator.list().unwrap().is_empty());
        assert!(runtime.has_container("haab-blog").await);
    }

    #[tokio::test]
    async fn delete_unknown_id_is_not_found() {
        let (orchestrator, runtime) = fixture();
        orchestrator.deploy("blog", "nginx:alpine", 8081).await.unwrap();

        let err = orchestrator.delete(999).await.unwrap_err();
        assert!(matches!(err, DeleteError::NotFound(999)));
        // Nothing changed.
        assert_eq!(orchestrator.list().unwrap().len(), 1);
        assert_eq!(runtime.container_count().await, 1);
    }

    // ── Listing ────────────────────────────────────────────────────

    #[tokio::test]
    async fn list_and_runtime_list_have_independent_sources() {
        let (orchestrator, runtime) = fixture();
        orchestrator.deploy("blog", "nginx:alpine", 8081).await.unwrap();
        // A managed container with no record, e.g. started out-of-band.
        runtime.seed_container("haab-manual", "redis:7", "running").await;
        // An unmanaged container that must never show up.
        runtime.seed_container("postgres", "postgres:16", "running").await;

        let records = orchestrator.list().unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].name, "blog");

        let managed = orchestrator.list_runtime_managed().await.unwrap();
        let names: Vec<_> = managed.iter().map(|c| c.name.as_str()).collect();
        assert_eq!(names, vec!["haab-blog", "haab-manual"]);

        // Neither call mutated the other's backing state.
        assert_eq!(orchestrator.list().unwrap().len(), 1);
        assert_eq!(runtime.container_count().await, 3);
    }

    #[tokio::test]
    async fn runtime_list_empty_is_not_an_error() {
        let (orchestrator, _runtime) = fixture();
        assert!(orchestrator.list_runtime_managed().await.unwrap().is_empty());
    }

    // ── Log streaming ──────────────────────────────────────────────

    #[tokio::test]
    async fn stream_logs_replays_then_terminates_on_error() {
        let (orchestrator, runtime) = fixture();
        let record = orchestrator.deploy("blog", "nginx:alpine", 8081).await.unwrap();
        runtime
            .script_logs(
                "haab-blog",
                vec![
                    LogItem::Line("GET / 200".to_string()),
                    LogItem::Fail("container removed".to_string()),
                ],
            )
            .await;

        let mut stream = orchestrator.stream_logs(record.id, None).await.unwrap();
        assert_eq!(stream.next().await.unwrap().unwrap(), "GET / 200");
        let terminal = stream.next().await.unwrap().unwrap_err();
        assert!(terminal.to_string().contains("container removed"));
        assert!(stream.next().await.is_none());
    }

    #[tokio::test]
    async fn stream_logs_unknown_id_is_not_found() {
        let (orchestrator, _runtime) = fixture();
        let err = orchestrator.stream_logs(42, None).await.err().unwrap();
        assert!(matches!(err, LogsError::NotFound(42)));
    }

    #[tokio::test]
    async fn stream_logs_for_removed_container_is_runtime_error() {
        let (orchestrator, runtime) = fixture();
        let record = orchestrator.deploy("blog", "nginx:alpine", 8081).await.unwrap();
        runtime.stop("haab-blog").await.unwrap();
        runtime.remove("haab-blog").await.unwrap();

        let err = orchestrator.stream_logs(record.id, None).await.err().unwrap();
        assert!(matches!(err, LogsError::Runtime(e) if e.is_not_found()));
    }

    #[tokio::test]
    async fn runtime_version_passthrough() {
        let (orchestrator, _runtime) = fixture();
        assert_eq!(orchestrator.runtime_version().await.unwrap(), "mock-1.0");
    }
}
