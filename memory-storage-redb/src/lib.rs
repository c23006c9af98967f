//! redb-backed durable storage for the tri-store agent memory engine.
//!
//! One redb database file per project root, with five named tables:
//! `facts`, `audit`, `episodes`, `documents`, `chunks`. Each table's value
//! is a postcard-encoded `Vec<T>` for a whole project, read-modify-written
//! under a single key (the project id) per transaction; redb itself is a
//! single-file embedded KV engine rather than a SQL engine, so this is the
//! substitution for the spec's `facts.db`/`episodes.db`/`semantic/` layout
//! (documented in the workspace's DESIGN.md as implementation-defined).
//!
//! Every public method offloads its blocking redb transaction to
//! [`tokio::task::spawn_blocking`], matching the teacher's pattern of never
//! blocking the async runtime on file I/O.

mod episodic;
mod semantic;
mod symbolic;

use std::path::{Path, PathBuf};
use std::sync::Arc;

use redb::{Database, ReadableTable, TableDefinition};
use serde::de::DeserializeOwned;
use serde::Serialize;
use tracing::debug;

use memory_core::error::{Error, Result};

const FACTS_TABLE: TableDefinition<&str, &[u8]> = TableDefinition::new("facts");
const AUDIT_TABLE: TableDefinition<&str, &[u8]> = TableDefinition::new("audit");
const EPISODES_TABLE: TableDefinition<&str, &[u8]> = TableDefinition::new("episodes");
const DOCUMENTS_TABLE: TableDefinition<&str, &[u8]> = TableDefinition::new("documents");
const CHUNKS_TABLE: TableDefinition<&str, &[u8]> = TableDefinition::new("chunks");

/// A durable storage backend rooted at one project's redb file, implementing
/// [`memory_core::symbolic::SymbolicStorageBackend`],
/// [`memory_core::episodic::EpisodicStorageBackend`], and
/// [`memory_core::semantic::SemanticStorageBackend`] over five project-keyed
/// tables in a single embedded database.
pub struct RedbBackend {
    db: Arc<Database>,
    path: PathBuf,
}

impl RedbBackend {
    /// Open (creating if absent) the redb file at `path`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::StoreUnavailable`] if the file cannot be created or opened.
    pub fn open(path: impl AsRef<Path>) -> Result<Arc<Self>> {
        let path = path.as_ref().to_path_buf();
        let db = Database::create(&path)
            .map_err(|e| Error::StoreUnavailable(format!("cannot open redb file {path:?}: {e}")))?;
        debug!(path = ?path, "opened redb project database");
        Ok(Arc::new(Self {
            db: Arc::new(db),
            path,
        }))
    }

    /// The on-disk path of this backend's redb file.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Run a blocking redb transaction on the tokio blocking thread pool.
    pub(crate) async fn blocking<T, F>(&self, f: F) -> Result<T>
    where
        T: Send + 'static,
        F: FnOnce(Arc<Database>) -> Result<T> + Send + 'static,
    {
        let db = Arc::clone(&self.db);
        tokio::task::spawn_blocking(move || f(db))
            .await
            .map_err(|e| Error::StoreUnavailable(format!("storage task panicked: {e}")))?
    }

    /// Read the postcard-encoded `Vec<T>` stored for `project_id` in `table`,
    /// defaulting to an empty vector if the table or row does not yet exist.
    pub(crate) fn read_list<T: DeserializeOwned>(
        db: &Database,
        table: TableDefinition<&str, &[u8]>,
        project_id: &str,
    ) -> Result<Vec<T>> {
        let read_txn = db
            .begin_read()
            .map_err(|e| Error::StoreUnavailable(format!("begin_read failed: {e}")))?;
        let table = match read_txn.open_table(table) {
            Ok(table) => table,
            Err(redb::TableError::TableDoesNotExist(_)) => return Ok(Vec::new()),
            Err(e) => return Err(Error::StoreUnavailable(format!("open_table failed: {e}"))),
        };
        match table
            .get(project_id)
            .map_err(|e| Error::StoreUnavailable(format!("table get failed: {e}")))?
        {
            Some(guard) => postcard::from_bytes(guard.value())
                .map_err(|e| Error::Serialization(e.to_string())),
            None => Ok(Vec::new()),
        }
    }

    /// Overwrite the postcard-encoded `Vec<T>` stored for `project_id` in `table`.
    pub(crate) fn write_list<T: Serialize>(
        db: &Database,
        table: TableDefinition<&str, &[u8]>,
        project_id: &str,
        items: &[T],
    ) -> Result<()> {
        let write_txn = db
            .begin_write()
            .map_err(|e| Error::StoreUnavailable(format!("begin_write failed: {e}")))?;
        {
            let mut table = write_txn
                .open_table(table)
                .map_err(|e| Error::StoreUnavailable(format!("open_table failed: {e}")))?;
            let bytes = postcard::to_allocvec(items).map_err(|e| Error::Serialization(e.to_string()))?;
            table
                .insert(project_id, bytes.as_slice())
                .map_err(|e| Error::StoreUnavailable(format!("table insert failed: {e}")))?;
        }
        write_txn
            .commit()
            .map_err(|e| Error::StoreUnavailable(format!("commit failed: {e}")))?;
        Ok(())
    }

    /// Overwrite the postcard-encoded `Vec<T>`s stored under `project_id` in
    /// two tables within a single write transaction, so both writes become
    /// durable together or not at all.
    pub(crate) fn write_two_lists<T1: Serialize, T2: Serialize>(
        db: &Database,
        table_a: TableDefinition<&str, &[u8]>,
        project_id: &str,
        items_a: &[T1],
        table_b: TableDefinition<&str, &[u8]>,
        items_b: &[T2],
    ) -> Result<()> {
        let write_txn = db
            .begin_write()
            .map_err(|e| Error::StoreUnavailable(format!("begin_write failed: {e}")))?;
        {
            let mut table = write_txn
                .open_table(table_a)
                .map_err(|e| Error::StoreUnavailable(format!("open_table failed: {e}")))?;
            let bytes = postcard::to_allocvec(items_a).map_err(|e| Error::Serialization(e.to_string()))?;
            table
                .insert(project_id, bytes.as_slice())
                .map_err(|e| Error::StoreUnavailable(format!("table insert failed: {e}")))?;
        }
        {
            let mut table = write_txn
                .open_table(table_b)
                .map_err(|e| Error::StoreUnavailable(format!("open_table failed: {e}")))?;
            let bytes = postcard::to_allocvec(items_b).map_err(|e| Error::Serialization(e.to_string()))?;
            table
                .insert(project_id, bytes.as_slice())
                .map_err(|e| Error::StoreUnavailable(format!("table insert failed: {e}")))?;
        }
        write_txn
            .commit()
            .map_err(|e| Error::StoreUnavailable(format!("commit failed: {e}")))?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn opens_and_round_trips_an_empty_project_list() {
        let dir = tempfile::tempdir().unwrap();
        let backend = RedbBackend::open(dir.path().join("memory.redb")).unwrap();
        let facts: Vec<memory_core::symbolic::Fact> = backend
            .blocking(|db| RedbBackend::read_list(&db, FACTS_TABLE, "alpha-aaaaaaaa"))
            .await
            .unwrap();
        assert!(facts.is_empty());
    }
}
