//! RecordStore — redb-backed persistence for application records.

use std::path::Path;
use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};

use redb::{Database, ReadableDatabase, ReadableTable};
use tracing::debug;

use crate::error::{StateError, StateResult};
use crate::tables::{APPLICATIONS, META, NEXT_ID_KEY};
use crate::types::{ApplicationRecord, NewApplication};

/// Convert any `Display` error into a `StateError` variant via a closure factory.
macro_rules! map_err {
    ($variant:ident) => {
        |e| StateError::$variant(e.to_string())
    };
}

/// Thread-safe application record store backed by redb.
///
/// redb serializes write transactions, so [`RecordStore::insert`] is the
/// uniqueness arbiter for both name and port: the checks and the write
/// happen atomically and concurrent inserts cannot both pass them.
#[derive(Clone)]
pub struct RecordStore {
    db: Arc<Database>,
}

impl RecordStore {
    /// Open (or create) a persistent store at the given path.
    pub fn open(path: &Path) -> StateResult<Self> {
        let db = Database::create(path).map_err(map_err!(Open))?;
        let store = Self { db: Arc::new(db) };
        store.ensure_tables()?;
        debug!(?path, "record store opened");
        Ok(store)
    }

    /// Create an ephemeral in-memory store (for testing).
    pub fn open_in_memory() -> StateResult<Self> {
        let backend = redb::backends::InMemoryBackend::new();
        let db = Database::builder()
            .create_with_backend(backend)
            .map_err(map_err!(Open))?;
        let store = Self { db: Arc::new(db) };
        store.ensure_tables()?;
        debug!("in-memory record store opened");
        Ok(store)
    }

    /// Create all tables if they don't exist yet.
    fn ensure_tables(&self) -> StateResult<()> {
        let txn = self.db.begin_write().map_err(map_err!(Transaction))?;
        // Opening a table in a write transaction creates it if absent.
        txn.open_table(APPLICATIONS).map_err(map_err!(Table))?;
        txn.open_table(META).map_err(map_err!(Table))?;
        txn.commit().map_err(map_err!(Transaction))?;
        Ok(())
    }

    /// Insert a new application record, assigning its id and timestamp.
    ///
    /// Name and port uniqueness are re-checked inside the write transaction;
    /// a violation returns [`StateError::NameTaken`] or
    /// [`StateError::PortTaken`] and writes nothing.
    pub fn insert(&self, new: &NewApplication) -> StateResult<ApplicationRecord> {
        let txn = self.db.begin_write().map_err(map_err!(Transaction))?;
        let record;
        {
            let mut apps = txn.open_table(APPLICATIONS).map_err(map_err!(Table))?;

            // Uniqueness checks under the write lock.
            for entry in apps.iter().map_err(map_err!(Read))? {
                let (_, value) = entry.map_err(map_err!(Read))?;
                let existing: ApplicationRecord =
                    serde_json::from_slice(value.value()).map_err(map_err!(Deserialize))?;
                if existing.port == new.port {
                    return Err(StateError::PortTaken {
                        port: new.port,
                        holder: existing.name,
                    });
                }
                if existing.name == new.name {
                    return Err(StateError::NameTaken {
                        name: existing.name,
                    });
                }
            }

            let mut meta = txn.open_table(META).map_err(map_err!(Table))?;
            let id = meta
                .get(NEXT_ID_KEY)
                .map_err(map_err!(Read))?
                .map(|g| g.value())
                .unwrap_or(1);
            meta.insert(NEXT_ID_KEY, id + 1).map_err(map_err!(Write))?;

            record = ApplicationRecord {
                id,
                name: new.name.clone(),
                image: new.image.clone(),
                port: new.port,
                status: new.status,
                created_at: unix_now(),
            };
            let value = serde_json::to_vec(&record).map_err(map_err!(Serialize))?;
            apps.insert(id, value.as_slice()).map_err(map_err!(Write))?;
        }
        txn.commit().map_err(map_err!(Transaction))?;
        debug!(id = record.id, name = %record.name, port = record.port, "application record inserted");
        Ok(record)
    }

    /// Get a record by its id.
    pub fn find_by_id(&self, id: u64) -> StateResult<Option<ApplicationRecord>> {
        let txn = self.db.begin_read().map_err(map_err!(Transaction))?;
        let table = txn.open_table(APPLICATIONS).map_err(map_err!(Table))?;
        match table.get(id).map_err(map_err!(Read))? {
            Some(guard) => {
                let record: ApplicationRecord =
                    serde_json::from_slice(guard.value()).map_err(map_err!(Deserialize))?;
                Ok(Some(record))
            }
            None => Ok(None),
        }
    }

    /// Get a record by its unique name.
    pub fn find_by_name(&self, name: &str) -> StateResult<Option<ApplicationRecord>> {
        self.find_first(|r| r.name == name)
    }

    /// Get a record by its unique host port.
    pub fn find_by_port(&self, port: u16) -> StateResult<Option<ApplicationRecord>> {
        self.find_first(|r| r.port == port)
    }

    fn find_first(
        &self,
        pred: impl Fn(&ApplicationRecord) -> bool,
    ) -> StateResult<Option<ApplicationRecord>> {
        let txn = self.db.begin_read().map_err(map_err!(Transaction))?;
        let table = txn.open_table(APPLICATIONS).map_err(map_err!(Table))?;
        for entry in table.iter().map_err(map_err!(Read))? {
            let (_, value) = entry.map_err(map_err!(Read))?;
            let record: ApplicationRecord =
                serde_json::from_slice(value.value()).map_err(map_err!(Deserialize))?;
            if pred(&record) {
                return Ok(Some(record));
            }
        }
        Ok(None)
    }

    /// List all records, ordered by id.
    pub fn list_all(&self) -> StateResult<Vec<ApplicationRecord>> {
        let txn = self.db.begin_read().map_err(map_err!(Transaction))?;
        let table = txn.open_table(APPLICATIONS).map_err(map_err!(Table))?;
        let mut results = Vec::new();
        // redb iterates u64 keys in ascending order.
        for entry in table.iter().map_err(map_err!(Read))? {
            let (_, value) = entry.map_err(map_err!(Read))?;
            let record: ApplicationRecord =
                serde_json::from_slice(value.value()).map_err(map_err!(Deserialize))?;
            results.push(record);
        }
        Ok(results)
    }

    /// Delete a record by id. Returns true if it existed.
    pub fn delete(&self, id: u64) -> StateResult<bool> {
        let txn = self.db.begin_write().map_err(map_err!(Transaction))?;
        let existed;
        {
            let mut table = txn.open_table(APPLICATIONS).map_err(map_err!(Table))?;
            existed = table.remove(id).map_err(map_err!(Write))?.is_some();
        }
        txn.commit().map_err(map_err!(Transaction))?;
        debug!(id, existed, "application record deleted");
        Ok(existed)
    }
}

fn unix_now() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or(0)
}
