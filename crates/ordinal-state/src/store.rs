//! StateStore: redb-backed persistence for workload sets.
//!
//! All values are JSON-serialized into redb's `&[u8]` value columns. Every
//! write bumps `metadata.resource_version`; spec updates carrying a stale
//! version are rejected with [`StateError::Conflict`]. The store supports
//! both on-disk and in-memory backends (the latter for testing).

use std::path::Path;
use std::sync::Arc;

use redb::{Database, ReadableDatabase, ReadableTable};
use tracing::debug;

use crate::error::{StateError, StateResult};
use crate::tables::*;
use crate::types::*;

/// Convert any `Display` error into a `StateError` variant via a closure factory.
macro_rules! map_err {
    ($variant:ident) => {
        |e| StateError::$variant(e.to_string())
    };
}

/// Thread-safe state store backed by redb.
#[derive(Clone)]
pub struct StateStore {
    db: Arc<Database>,
}

impl StateStore {
    /// Open (or create) a persistent state store at the given path.
    pub fn open(path: &Path) -> StateResult<Self> {
        let db = Database::create(path).map_err(map_err!(Open))?;
        let store = Self { db: Arc::new(db) };
        store.ensure_tables()?;
        debug!(?path, "state store opened");
        Ok(store)
    }

    /// Create an ephemeral in-memory state store (for testing).
    pub fn open_in_memory() -> StateResult<Self> {
        let backend = redb::backends::InMemoryBackend::new();
        let db = Database::builder()
            .create_with_backend(backend)
            .map_err(map_err!(Open))?;
        let store = Self { db: Arc::new(db) };
        store.ensure_tables()?;
        debug!("in-memory state store opened");
        Ok(store)
    }

    fn ensure_tables(&self) -> StateResult<()> {
        let txn = self.db.begin_write().map_err(map_err!(Transaction))?;
        // Opening a table in a write transaction creates it if absent.
        txn.open_table(WORKLOADS).map_err(map_err!(Table))?;
        txn.commit().map_err(map_err!(Transaction))?;
        Ok(())
    }

    /// Create or replace a workload set, ignoring its resource version.
    ///
    /// Status is taken from `workload` as given. Returns the stored copy.
    pub fn put_workload(&self, workload: &WorkloadSet) -> StateResult<WorkloadSet> {
        workload.spec.validate().map_err(StateError::invalid)?;
        let key = workload.table_key();
        let txn = self.db.begin_write().map_err(map_err!(Transaction))?;
        let stored = {
            let mut table = txn.open_table(WORKLOADS).map_err(map_err!(Table))?;
            let existing = read_entry(&table, &key)?;

            let mut next = workload.clone();
            match existing {
                Some(prev) => {
                    next.metadata.resource_version = prev.metadata.resource_version + 1;
                    next.metadata.generation = if prev.spec == next.spec {
                        prev.metadata.generation
                    } else {
                        prev.metadata.generation + 1
                    };
                }
                None => {
                    next.metadata.resource_version = 1;
                    next.metadata.generation = 1;
                }
            }
            write_entry(&mut table, &key, &next)?;
            next
        };
        txn.commit().map_err(map_err!(Transaction))?;
        debug!(%key, resource_version = stored.metadata.resource_version, "workload stored");
        Ok(stored)
    }

    /// Get a workload set by identity.
    pub fn get_workload(&self, id: &WorkloadId) -> StateResult<Option<WorkloadSet>> {
        let txn = self.db.begin_read().map_err(map_err!(Transaction))?;
        let table = txn.open_table(WORKLOADS).map_err(map_err!(Table))?;
        read_entry(&table, &id.table_key())
    }

    /// Replace the spec of a stored workload set.
    ///
    /// Fails with `NotFound` if it does not exist, `Conflict` if
    /// `workload.metadata.resource_version` is stale, and an `Invalid`
    /// status if the spec does not validate. The stored status is kept.
    pub fn update_workload(&self, workload: &WorkloadSet) -> StateResult<WorkloadSet> {
        workload.spec.validate().map_err(StateError::invalid)?;
        let key = workload.table_key();
        let txn = self.db.begin_write().map_err(map_err!(Transaction))?;
        let stored = {
            let mut table = txn.open_table(WORKLOADS).map_err(map_err!(Table))?;
            let Some(current) = read_entry(&table, &key)? else {
                return Err(StateError::NotFound(key));
            };
            if current.metadata.resource_version != workload.metadata.resource_version {
                return Err(StateError::Conflict {
                    key,
                    expected: workload.metadata.resource_version,
                    actual: current.metadata.resource_version,
                });
            }

            let mut next = current.clone();
            next.spec = workload.spec.clone();
            if next.spec != current.spec {
                next.metadata.generation += 1;
            }
            next.metadata.resource_version += 1;
            write_entry(&mut table, &key, &next)?;
            next
        };
        txn.commit().map_err(map_err!(Transaction))?;
        debug!(
            %key,
            resource_version = stored.metadata.resource_version,
            partition = ?stored.partition(),
            "workload updated"
        );
        Ok(stored)
    }

    /// Mutate the status of a stored workload set.
    ///
    /// Status writes do not check the resource version but do bump it, so a
    /// concurrent spec update holding the old version will conflict.
    pub fn update_status<F>(&self, id: &WorkloadId, f: F) -> StateResult<WorkloadSet>
    where
        F: FnOnce(&mut WorkloadStatus),
    {
        let key = id.table_key();
        let txn = self.db.begin_write().map_err(map_err!(Transaction))?;
        let stored = {
            let mut table = txn.open_table(WORKLOADS).map_err(map_err!(Table))?;
            let Some(mut next) = read_entry(&table, &key)? else {
                return Err(StateError::NotFound(key));
            };
            f(&mut next.status);
            next.metadata.resource_version += 1;
            write_entry(&mut table, &key, &next)?;
            next
        };
        txn.commit().map_err(map_err!(Transaction))?;
        Ok(stored)
    }

    /// List all workload sets.
    pub fn list_workloads(&self) -> StateResult<Vec<WorkloadSet>> {
        let txn = self.db.begin_read().map_err(map_err!(Transaction))?;
        let table = txn.open_table(WORKLOADS).map_err(map_err!(Table))?;
        let mut results = Vec::new();
        for entry in table.iter().map_err(map_err!(Read))? {
            let (_, value) = entry.map_err(map_err!(Read))?;
            let workload: WorkloadSet =
                serde_json::from_slice(value.value()).map_err(map_err!(Deserialize))?;
            results.push(workload);
        }
        Ok(results)
    }

    /// Delete a workload set. Returns true if it existed.
    pub fn delete_workload(&self, id: &WorkloadId) -> StateResult<bool> {
        let key = id.table_key();
        let txn = self.db.begin_write().map_err(map_err!(Transaction))?;
        let existed;
        {
            let mut table = txn.open_table(WORKLOADS).map_err(map_err!(Table))?;
            existed = table.remove(key.as_str()).map_err(map_err!(Write))?.is_some();
        }
        txn.commit().map_err(map_err!(Transaction))?;
        debug!(%key, existed, "workload deleted");
        Ok(existed)
    }
}

fn read_entry<T>(table: &T, key: &str) -> StateResult<Option<WorkloadSet>>
where
    T: ReadableTable<&'static str, &'static [u8]>,
{
    match table.get(key).map_err(map_err!(Read))? {
        Some(guard) => {
            let workload: WorkloadSet =
                serde_json::from_slice(guard.value()).map_err(map_err!(Deserialize))?;
            Ok(Some(workload))
        }
        None => Ok(None),
    }
}

fn write_entry(
    table: &mut redb::Table<'_, &'static str, &'static [u8]>,
    key: &str,
    workload: &WorkloadSet,
) -> StateResult<()> {
    let value = serde_json::to_vec(workload).map_err(map_err!(Serialize))?;
    table
        .insert(key, value.as_slice())
        .map_err(map_err!(Write))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_id() -> WorkloadId {
        WorkloadId::new("db", "cockroach")
    }

    fn test_workload(replicas: u32) -> WorkloadSet {
        WorkloadSet::new(&test_id(), replicas, InstanceTemplate::new("cockroach:v23.1"))
    }

    #[test]
    fn put_and_get() {
        let store = StateStore::open_in_memory().unwrap();
        let stored = store.put_workload(&test_workload(3)).unwrap();

        assert_eq!(stored.metadata.resource_version, 1);
        assert_eq!(stored.metadata.generation, 1);
        assert_eq!(store.get_workload(&test_id()).unwrap(), Some(stored));
    }

    #[test]
    fn get_nonexistent_returns_none() {
        let store = StateStore::open_in_memory().unwrap();
        assert_eq!(store.get_workload(&test_id()).unwrap(), None);
    }

    #[test]
    fn update_bumps_version_and_generation() {
        let store = StateStore::open_in_memory().unwrap();
        let mut w = store.put_workload(&test_workload(3)).unwrap();

        w.set_partition(2);
        let updated = store.update_workload(&w).unwrap();
        assert_eq!(updated.metadata.resource_version, 2);
        assert_eq!(updated.metadata.generation, 2);
        assert_eq!(updated.partition(), Some(2));
    }

    #[test]
    fn update_without_spec_change_keeps_generation() {
        let store = StateStore::open_in_memory().unwrap();
        let w = store.put_workload(&test_workload(3)).unwrap();

        let updated = store.update_workload(&w).unwrap();
        assert_eq!(updated.metadata.resource_version, 2);
        assert_eq!(updated.metadata.generation, 1);
    }

    #[test]
    fn stale_update_conflicts() {
        let store = StateStore::open_in_memory().unwrap();
        let stale = store.put_workload(&test_workload(3)).unwrap();

        let mut fresh = stale.clone();
        fresh.set_partition(1);
        store.update_workload(&fresh).unwrap();

        let mut late = stale;
        late.set_partition(2);
        let err = store.update_workload(&late).unwrap_err();
        assert!(err.is_conflict());
        match err {
            StateError::Conflict {
                expected, actual, ..
            } => {
                assert_eq!(expected, 1);
                assert_eq!(actual, 2);
            }
            other => panic!("expected conflict, got {other:?}"),
        }
    }

    #[test]
    fn status_write_invalidates_held_copy() {
        let store = StateStore::open_in_memory().unwrap();
        let held = store.put_workload(&test_workload(1)).unwrap();

        store
            .update_status(&test_id(), |status| status.observed_generation = 1)
            .unwrap();

        assert!(store.update_workload(&held).unwrap_err().is_conflict());
    }

    #[test]
    fn update_preserves_stored_status() {
        let store = StateStore::open_in_memory().unwrap();
        store.put_workload(&test_workload(1)).unwrap();
        let with_status = store
            .update_status(&test_id(), |status| {
                status.replicas.push(ReplicaStatus {
                    ordinal: 0,
                    revision: "abc".into(),
                    ready: true,
                    address: None,
                })
            })
            .unwrap();

        let mut edit = with_status.clone();
        edit.status = WorkloadStatus::default();
        edit.set_partition(0);
        let updated = store.update_workload(&edit).unwrap();
        assert_eq!(updated.status, with_status.status);
    }

    #[test]
    fn update_missing_is_not_found() {
        let store = StateStore::open_in_memory().unwrap();
        let err = store.update_workload(&test_workload(1)).unwrap_err();
        assert!(err.is_not_found());
    }

    #[test]
    fn invalid_spec_is_status_error() {
        let store = StateStore::open_in_memory().unwrap();
        let mut w = store.put_workload(&test_workload(2)).unwrap();
        w.set_partition(5);

        match store.update_workload(&w).unwrap_err() {
            StateError::Status { code, reason, message } => {
                assert_eq!(code, 422);
                assert_eq!(reason, "Invalid");
                assert!(message.contains("partition 5"));
            }
            other => panic!("expected status error, got {other:?}"),
        }
    }

    #[test]
    fn partition_on_empty_workload_is_rejected() {
        let store = StateStore::open_in_memory().unwrap();
        let mut w = test_workload(0);
        w.set_partition(0);

        match store.put_workload(&w).unwrap_err() {
            StateError::Status { code, reason, .. } => {
                assert_eq!(code, 422);
                assert_eq!(reason, "Invalid");
            }
            other => panic!("expected status error, got {other:?}"),
        }
        assert!(store.get_workload(&test_id()).unwrap().is_none());

        let stored = store.put_workload(&test_workload(0)).unwrap();
        let mut w = stored.clone();
        w.set_partition(0);
        assert!(matches!(
            store.update_workload(&w).unwrap_err(),
            StateError::Status { code: 422, .. }
        ));
    }

    #[test]
    fn list_and_delete() {
        let store = StateStore::open_in_memory().unwrap();
        store.put_workload(&test_workload(1)).unwrap();
        store
            .put_workload(&WorkloadSet::new(
                &WorkloadId::new("db", "other"),
                1,
                InstanceTemplate::new("x"),
            ))
            .unwrap();
        assert_eq!(store.list_workloads().unwrap().len(), 2);

        assert!(store.delete_workload(&test_id()).unwrap());
        assert!(!store.delete_workload(&test_id()).unwrap());
        assert_eq!(store.list_workloads().unwrap().len(), 1);
    }

    #[test]
    fn persistence_survives_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("state.redb");

        {
            let store = StateStore::open(&path).unwrap();
            store.put_workload(&test_workload(3)).unwrap();
        }

        let store = StateStore::open(&path).unwrap();
        let w = store.get_workload(&test_id()).unwrap().unwrap();
        assert_eq!(w.spec.replicas, 3);
    }
}
