//! haab-state — redb-backed persistence for application records.
//!
//! One row per deployed application, JSON-serialized into redb's `&[u8]`
//! value column. The store is the single arbiter of the name and port
//! uniqueness invariants: both are re-checked inside the insert write
//! transaction, so of two racing inserts exactly one commits and the
//! other gets a typed conflict back. Supports on-disk and in-memory
//! backends (the latter for testing).

mod error;
mod store;
mod tables;
mod types;

pub use error::{StateError, StateResult};
pub use store::RecordStore;
pub use types::{AppStatus, ApplicationRecord, NewApplication};
