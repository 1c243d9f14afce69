//! SQLite-backed record store for saved reports
//!
//! The store owns a single connection behind a mutex. Reads outside a
//! transaction take the lock for the duration of the query. Writes happen
//! only through a [`StoreTransaction`], which holds the lock until it is
//! committed or rolled back, so a cache rebuild that starts while a write is
//! in flight sees the committed result.

mod queries;
mod schema;
mod types;

pub use types::ReportRecord;

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard};

use rusqlite::Connection;
use tracing::{debug, warn};

use crate::core::error::{ReportError, Result};
use crate::core::identity::ContainerId;
use crate::core::security::RoleAssignment;

/// Current schema version
const SCHEMA_VERSION: i32 = 2;

/// Transactional CRUD over the report table
pub struct RecordStore {
    conn: Mutex<Connection>,
    path: Option<PathBuf>,
}

impl RecordStore {
    /// Open or create a store at `path`
    pub fn open(path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
        }

        let conn = Connection::open(path)?;
        // Enable WAL mode for better concurrent access
        conn.execute_batch("PRAGMA journal_mode=WAL; PRAGMA busy_timeout=5000;")?;
        Self::init(conn, Some(path.to_path_buf()))
    }

    /// Open a private in-memory store
    pub fn open_in_memory() -> Result<Self> {
        Self::init(Connection::open_in_memory()?, None)
    }

    fn init(conn: Connection, path: Option<PathBuf>) -> Result<Self> {
        schema::init_schema(&conn)?;
        match schema::schema_version(&conn)? {
            Some(SCHEMA_VERSION) => {}
            other => {
                return Err(ReportError::Config(format!(
                    "report store schema version {:?} is not supported (expected {})",
                    other, SCHEMA_VERSION
                )))
            }
        }
        Ok(Self {
            conn: Mutex::new(conn),
            path,
        })
    }

    /// Database file path (None for in-memory)
    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    fn lock(&self) -> Result<MutexGuard<'_, Connection>> {
        self.conn
            .lock()
            .map_err(|e| ReportError::StoreUnavailable(e.to_string()))
    }

    /// Start a write transaction
    ///
    /// Blocks until no other transaction or read holds the connection.
    pub fn begin(&self) -> Result<StoreTransaction<'_>> {
        let conn = self.lock()?;
        conn.execute_batch("BEGIN IMMEDIATE")?;
        Ok(StoreTransaction {
            conn,
            finished: false,
        })
    }

    /// Every record of one container, in row id order
    pub fn select_all_for_container(&self, container: &ContainerId) -> Result<Vec<ReportRecord>> {
        let conn = self.lock()?;
        let records = queries::select_all_for_container(&conn, container)?;
        debug!(%container, count = records.len(), "scanned report partition");
        Ok(records)
    }

    pub fn exists(&self, row_id: i64) -> Result<bool> {
        let conn = self.lock()?;
        queries::exists(&conn, row_id)
    }

    /// Total number of stored reports
    pub fn count(&self) -> Result<usize> {
        let conn = self.lock()?;
        queries::count(&conn)
    }

    /// Role assignments stored for a report row, in assignment order
    pub fn report_policy(&self, row_id: i64) -> Result<Vec<RoleAssignment>> {
        let conn = self.lock()?;
        queries::select_policy(&conn, row_id)
    }
}

/// An open write transaction on the record store
///
/// Dropping a transaction without committing rolls it back.
pub struct StoreTransaction<'a> {
    conn: MutexGuard<'a, Connection>,
    finished: bool,
}

impl StoreTransaction<'_> {
    pub fn exists(&self, row_id: i64) -> Result<bool> {
        queries::exists(&self.conn, row_id)
    }

    /// Update the row named by `record.row_id` if it exists, insert otherwise
    ///
    /// An id that is not in the table is never a silent no-op: the record is
    /// inserted under a newly assigned row id.
    pub fn insert_or_update(&self, mut record: ReportRecord) -> Result<ReportRecord> {
        if let Some(row_id) = record.row_id {
            if let Some(existing) = queries::select_by_row_id(&self.conn, row_id)? {
                record.entity_id = existing.entity_id;
                queries::update(&self.conn, row_id, &record)?;
                return Ok(record);
            }
        }
        let row_id = queries::insert(&self.conn, &record)?;
        record.row_id = Some(row_id);
        Ok(record)
    }

    /// Delete at most one row; returns whether a row was deleted
    pub fn delete_by_container_and_row_id(
        &self,
        container: &ContainerId,
        row_id: i64,
    ) -> Result<bool> {
        queries::delete(&self.conn, container, row_id)
    }

    /// Previous state of a row, used to detect moves and sharing changes
    pub fn select_by_row_id(&self, row_id: i64) -> Result<Option<ReportRecord>> {
        queries::select_by_row_id(&self.conn, row_id)
    }

    /// Committed rows of one container under `key`
    pub fn select_by_container_and_key(
        &self,
        container: &ContainerId,
        key: &str,
    ) -> Result<Vec<ReportRecord>> {
        queries::select_by_container_and_key(&self.conn, container, key)
    }

    /// Replace the role assignments of a report row
    pub fn replace_policy(&self, row_id: i64, assignments: &[RoleAssignment]) -> Result<()> {
        queries::replace_policy(&self.conn, row_id, assignments)
    }

    /// Remove the role assignments of a report row; returns how many were removed
    pub fn delete_policy(&self, row_id: i64) -> Result<usize> {
        queries::delete_policy(&self.conn, row_id)
    }

    pub fn commit(mut self) -> Result<()> {
        self.conn.execute_batch("COMMIT")?;
        self.finished = true;
        Ok(())
    }

    pub fn rollback(mut self) -> Result<()> {
        self.finished = true;
        self.conn.execute_batch("ROLLBACK")?;
        Ok(())
    }
}

impl Drop for StoreTransaction<'_> {
    fn drop(&mut self) {
        if !self.finished {
            if let Err(e) = self.conn.execute_batch("ROLLBACK") {
                warn!(error = %e, "rollback of abandoned transaction failed");
            }
        }
    }
}
