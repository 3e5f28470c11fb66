//! redb table definitions for the application record store.
//!
//! Records are keyed by their surrogate id so iteration yields insertion
//! order. The meta table holds the id counter under a fixed key.

use redb::TableDefinition;

/// Application records keyed by surrogate id (JSON-serialized values).
pub const APPLICATIONS: TableDefinition<u64, &[u8]> = TableDefinition::new("applications");

/// Store metadata. Currently only the id counter under [`NEXT_ID_KEY`].
pub const META: TableDefinition<&str, u64> = TableDefinition::new("meta");

/// Meta key holding the next id to assign.
pub const NEXT_ID_KEY: &str = "next_application_id";
