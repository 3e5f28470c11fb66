//! haab-orchestrator — the deployment workflows.
//!
//! Reconciles durable application records against live container-runtime
//! state: invariant-checked deploy, idempotent delete, store-backed and
//! runtime-backed listing, and live log streaming. The orchestrator holds
//! no state of its own — the record store is the source of truth for
//! uniqueness, the runtime is re-queried on every operation.

mod error;
mod orchestrator;

pub use error::{DeleteError, DeployError, LogsError};
pub use orchestrator::{DeleteOutcome, Orchestrator};
