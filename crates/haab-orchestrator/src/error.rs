//! Orchestrator error taxonomy.
//!
//! Validation failures (conflicts, not-found) are expected conditions the
//! caller branches on; runtime and store I/O failures carry their cause.
//! [`DeployError::OrphanedContainer`] is the one fatal variant: both the
//! store write and the compensating cleanup failed, and an operator has to
//! intervene.

use haab_runtime::RuntimeError;
use haab_state::StateError;
use thiserror::Error;

/// Failures of the deploy workflow.
#[derive(Debug, Error)]
pub enum DeployError {
    #[error("port {port} is already in use by application '{existing_name}'")]
    PortConflict { port: u16, existing_name: String },

    #[error("application name '{name}' is already in use")]
    NameConflict { name: String },

    #[error("invalid application name: {reason}")]
    InvalidName { reason: String },

    #[error("failed to pull image '{image}': {cause}")]
    ImagePullFailed { image: String, cause: String },

    #[error("failed to launch container: {cause}")]
    RuntimeLaunchFailed { cause: String },

    /// The record write failed after the container was launched; the
    /// compensating stop/remove succeeded, so no orphan remains.
    #[error("store write failed after launch (container cleaned up): {cause}")]
    StoreWriteFailed { cause: String },

    /// Fatal: the record write failed AND the compensating cleanup failed.
    /// The named container is orphaned and needs manual removal.
    #[error(
        "store write failed ({store_cause}) and cleanup of container \
         '{container}' failed ({cleanup_cause}); manual cleanup required"
    )]
    OrphanedContainer {
        container: String,
        store_cause: String,
        cleanup_cause: String,
    },

    /// Store I/O failure during the read-only validation steps.
    #[error(transparent)]
    Store(StateError),
}

/// Failures of the delete workflow. Runtime errors other than not-found do
/// not appear here — they are downgraded to a warning on the success
/// outcome, because the store row is deleted regardless.
#[derive(Debug, Error)]
pub enum DeleteError {
    #[error("no application with id {0}")]
    NotFound(u64),

    #[error(transparent)]
    Store(#[from] StateError),
}

/// Failures establishing a log stream. Mid-stream failures arrive as the
/// stream's terminal item instead.
#[derive(Debug, Error)]
pub enum LogsError {
    #[error("no application with id {0}")]
    NotFound(u64),

    #[error(transparent)]
    Runtime(#[from] RuntimeError),

    #[error(transparent)]
    Store(#[from] StateError),
}
