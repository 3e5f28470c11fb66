//! Error types for the application record store.

use thiserror::Error;

/// Result type alias for store operations.
pub type StateResult<T> = Result<T, StateError>;

/// Errors that can occur during store operations.
#[derive(Debug, Error)]
pub enum StateError {
    #[error("failed to open database: {0}")]
    Open(String),

    #[error("transaction error: {0}")]
    Transaction(String),

    #[error("table error: {0}")]
    Table(String),

    #[error("read error: {0}")]
    Read(String),

    #[error("write error: {0}")]
    Write(String),

    #[error("serialization error: {0}")]
    Serialize(String),

    #[error("deserialization error: {0}")]
    Deserialize(String),

    /// Another record already holds this name. Enforced inside the insert
    /// transaction, so this is the authoritative answer even under races.
    #[error("application name '{name}' is already in use")]
    NameTaken { name: String },

    /// Another record already holds this port. `holder` is the name of the
    /// application occupying it.
    #[error("port {port} is already in use by application '{holder}'")]
    PortTaken { port: u16, holder: String },
}
