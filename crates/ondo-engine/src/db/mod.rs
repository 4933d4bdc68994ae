//! SQLite persistence for rounds, the item catalog and the score ledger.
//!
//! All writes run inside `BEGIN IMMEDIATE` transactions so that concurrent
//! writers (other threads through another [`Database`], or other processes on
//! the same file) are serialised by SQLite's write lock.

pub(crate) mod items;
pub(crate) mod rounds;
pub(crate) mod schema;
pub(crate) mod scores;

use std::path::Path;
use std::time::Duration;

use parking_lot::Mutex;
use rusqlite::{Connection, Transaction, TransactionBehavior};

use crate::Result;

/// Default time a writer waits on a locked database before failing.
pub const DEFAULT_BUSY_TIMEOUT: Duration = Duration::from_secs(5);

/// A single SQLite connection shared behind a mutex.
pub struct Database {
    conn: Mutex<Connection>,
}

impl Database {
    /// Open or create the database file, initialise the schema and seed the
    /// default item catalog.
    pub fn open(path: &Path, busy_timeout: Duration) -> Result<Self> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }

        let conn = Connection::open(path)?;
        conn.busy_timeout(busy_timeout)?;

        // WAL keeps readers unblocked while the sweep holds the write lock
        conn.execute_batch(
            "PRAGMA journal_mode=WAL; PRAGMA synchronous=NORMAL; PRAGMA foreign_keys=ON;",
        )?;

        tracing::info!("Opened evaluation database at {}", path.display());
        Self::init(conn)
    }

    /// Open an in-memory database (for testing).
    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        conn.execute_batch("PRAGMA foreign_keys=ON;")?;
        Self::init(conn)
    }

    fn init(conn: Connection) -> Result<Self> {
        schema::init_schema(&conn)?;
        let seeded = items::seed_items(&conn, ondo_core::catalog::DEFAULT_ITEMS)?;
        if seeded > 0 {
            tracing::info!("Seeded {} evaluation items", seeded);
        }

        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    /// Run a read-only closure against the connection.
    pub(crate) fn read<T>(&self, f: impl FnOnce(&Connection) -> Result<T>) -> Result<T> {
        let conn = self.conn.lock();
        f(&conn)
    }

    /// Run a closure in an immediate write transaction.
    ///
    /// The transaction commits when the closure returns `Ok` and rolls back
    /// otherwise.
    pub(crate) fn write<T>(&self, f: impl FnOnce(&Transaction<'_>) -> Result<T>) -> Result<T> {
        let mut conn = self.conn.lock();
        let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
        let value = f(&tx)?;
        tx.commit()?;
        Ok(value)
    }
}
