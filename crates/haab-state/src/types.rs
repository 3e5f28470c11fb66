//! Domain types for the application record store.

use serde::{Deserialize, Serialize};

/// Last-known runtime state of an application.
///
/// This reflects what the orchestrator observed at its last mutation, not a
/// continuously polled truth.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AppStatus {
    Running,
    Stopped,
    Error,
}

impl std::fmt::Display for AppStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            AppStatus::Running => "running",
            AppStatus::Stopped => "stopped",
            AppStatus::Error => "error",
        };
        f.write_str(s)
    }
}

/// A durable application record — one row per deployed application.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ApplicationRecord {
    /// Surrogate key, assigned by the store on insert.
    pub id: u64,
    /// Unique, human-chosen name; the runtime container is `haab-<name>`.
    pub name: String,
    /// Image reference used at deploy time.
    pub image: String,
    /// Host port the container is bound to; unique across records.
    pub port: u16,
    pub status: AppStatus,
    /// Unix timestamp (seconds) set by the store at insert.
    pub created_at: u64,
}

/// Fields supplied by the caller for a new record; id and timestamp are
/// assigned by the store.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewApplication {
    pub name: String,
    pub image: String,
    pub port: u16,
    pub status: AppStatus,
}
