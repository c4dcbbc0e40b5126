//! SQLite storage engine
//!
//! Single database file on local disk, WAL mode. Separate reader and writer
//! connections behind mutexes give interior mutability: every method takes
//! `&self`, so repositories share one `Arc<Database>` across threads.
//!
//! Three transaction scopes are offered:
//! - [`Database::read`] - autocommit, single SELECT
//! - [`Database::read_tx`] - deferred transaction, consistent multi-SELECT snapshot
//! - [`Database::write_tx`] - `BEGIN IMMEDIATE`; the writer lock is taken
//!   up-front, which avoids mid-transaction lock failures under WAL

use std::path::Path;
use std::sync::Mutex;

use rusqlite::{Connection, Transaction, TransactionBehavior};
use tracing::warn;

// ============================================================================
// ERROR TYPES
// ============================================================================

/// Storage error type
#[non_exhaustive]
#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    /// The busy timeout was exhausted waiting for a lock
    #[error("database busy")]
    Busy,
    /// Any other database error
    #[error("database error: {0}")]
    Database(rusqlite::Error),
    /// IO error
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    /// Initialization error
    #[error("storage init error: {0}")]
    Init(String),
}

impl From<rusqlite::Error> for StorageError {
    fn from(err: rusqlite::Error) -> Self {
        if let rusqlite::Error::SqliteFailure(e, _) = &err {
            if matches!(
                e.code,
                rusqlite::ErrorCode::DatabaseBusy | rusqlite::ErrorCode::DatabaseLocked
            ) {
                return StorageError::Busy;
            }
        }
        StorageError::Database(err)
    }
}

/// Storage result type
pub type Result<T> = std::result::Result<T, StorageError>;

// ============================================================================
// DATABASE
// ============================================================================

/// Shared handle to the vocabulary database
pub struct Database {
    writer: Mutex<Connection>,
    reader: Mutex<Connection>,
}

impl Database {
    /// Apply per-connection PRAGMAs. The busy timeout is what turns lock
    /// contention into waiting instead of immediate `SQLITE_BUSY`.
    fn configure_connection(conn: &Connection) -> Result<()> {
        conn.execute_batch(
            "PRAGMA foreign_keys = ON;
             PRAGMA journal_mode = WAL;
             PRAGMA synchronous = NORMAL;
             PRAGMA busy_timeout = 10000;",
        )?;
        Ok(())
    }

    /// Open (creating if needed) the database at `path` and run migrations.
    pub fn open(path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }

        let writer = Connection::open(path)?;
        Self::configure_connection(&writer)?;
        super::migrations::apply_migrations(&writer).map_err(StorageError::from)?;

        let reader = Connection::open(path)?;
        Self::configure_connection(&reader)?;

        Ok(Self {
            writer: Mutex::new(writer),
            reader: Mutex::new(reader),
        })
    }

    /// Autocommit read on the reader connection.
    pub fn read<T>(&self, f: impl FnOnce(&Connection) -> Result<T>) -> Result<T> {
        let conn = self
            .reader
            .lock()
            .map_err(|_| StorageError::Init("reader lock poisoned".into()))?;
        f(&conn)
    }

    /// Deferred read transaction: a consistent snapshot across multiple SELECTs.
    pub fn read_tx<T>(&self, f: impl FnOnce(&Transaction) -> Result<T>) -> Result<T> {
        let mut conn = self
            .reader
            .lock()
            .map_err(|_| StorageError::Init("reader lock poisoned".into()))?;
        let tx = conn.transaction()?;
        let out = f(&tx)?;
        tx.commit()?;
        Ok(out)
    }

    /// Immediate write transaction, retried once on a busy timeout.
    pub fn write_tx<T>(&self, mut f: impl FnMut(&Transaction) -> Result<T>) -> Result<T> {
        match self.try_write_tx(&mut f) {
            Err(StorageError::Busy) => {
                warn!("write transaction hit the busy timeout, retrying once");
                self.try_write_tx(&mut f)
            }
            other => other,
        }
    }

    fn try_write_tx<T>(&self, f: &mut impl FnMut(&Transaction) -> Result<T>) -> Result<T> {
        let mut conn = self
            .writer
            .lock()
            .map_err(|_| StorageError::Init("writer lock poisoned".into()))?;
        let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
        let out = f(&tx)?;
        tx.commit()?;
        Ok(out)
    }
}
