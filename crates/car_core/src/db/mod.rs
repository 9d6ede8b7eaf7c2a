//! SQLite storage bootstrap, shared connection and transaction entry points.
//!
//! # Responsibility
//! - Open and configure SQLite connections for the car service.
//! - Apply schema migrations in deterministic order.
//! - Own the shared connection used by ambient and transactional sessions.
//!
//! # Invariants
//! - Migration version is tracked via `PRAGMA user_version`.
//! - Core code must not read/write application data before migrations succeed.
//! - Access to the shared connection is serialized by one mutex.

use log::info;
use rusqlite::Connection;
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::path::Path;
use std::time::Duration;
use std::sync::{Arc, Mutex, MutexGuard};
use std::thread::{self, ThreadId};

pub mod migrations;
mod open;
pub mod tx;

pub use open::{open_db, open_db_in_memory, open_db_with_busy_timeout};
pub use tx::{Session, TxError};

pub type DbResult<T> = Result<T, DbError>;

#[derive(Debug)]
pub enum DbError {
    Sqlite(rusqlite::Error),
    UnsupportedSchemaVersion {
        db_version: u32,
        latest_supported: u32,
    },
    /// A previous holder of the shared connection panicked.
    LockPoisoned,
    /// The calling thread already holds the connection for a unit of work.
    HeldByTransaction,
}

impl Display for DbError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Sqlite(err) => write!(f, "{err}"),
            Self::UnsupportedSchemaVersion {
                db_version,
                latest_supported,
            } => write!(
                f,
                "database schema version {db_version} is newer than supported {latest_supported}"
            ),
            Self::LockPoisoned => write!(f, "database connection lock is poisoned"),
            Self::HeldByTransaction => write!(
                f,
                "connection is held by a running transaction on this thread; use its session"
            ),
        }
    }
}

impl Error for DbError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Sqlite(err) => Some(err),
            Self::UnsupportedSchemaVersion { .. } | Self::LockPoisoned | Self::HeldByTransaction => {
                None
            }
        }
    }
}

impl From<rusqlite::Error> for DbError {
    fn from(value: rusqlite::Error) -> Self {
        Self::Sqlite(value)
    }
}

/// Thread-safe handle to the migrated car database.
///
/// Cloning is cheap; clones share the same connection.
#[derive(Debug, Clone)]
pub struct Database {
    conn: Arc<Mutex<Connection>>,
    /// Thread running a unit of work on `conn`, if any.
    tx_owner: Arc<Mutex<Option<ThreadId>>>,
}

impl Database {
    /// Wraps an already migrated connection.
    pub fn new(conn: Connection) -> Self {
        Self {
            conn: Arc::new(Mutex::new(conn)),
            tx_owner: Arc::new(Mutex::new(None)),
        }
    }

    /// Opens a database file and applies pending migrations.
    pub fn open(path: impl AsRef<Path>) -> DbResult<Self> {
        open_db(path).map(Self::new)
    }

    /// Opens a database file, waiting up to `busy_timeout` on a locked file
    /// during migrations and every later statement.
    pub fn open_with_busy_timeout(
        path: impl AsRef<Path>,
        busy_timeout: Duration,
    ) -> DbResult<Self> {
        open_db_with_busy_timeout(path, busy_timeout).map(Self::new)
    }

    /// Opens a private in-memory database with migrations applied.
    pub fn open_in_memory() -> DbResult<Self> {
        open_db_in_memory().map(Self::new)
    }

    /// Returns a session running store calls on the shared connection.
    pub fn session<'a>(&'a self, ctx: &'a crate::CallContext) -> Session<'a> {
        Session::ambient(self, ctx)
    }

    /// Releases the connection when this is the last handle.
    ///
    /// Other live clones keep the connection open; it closes when the last
    /// one is dropped.
    pub fn close(self) -> DbResult<()> {
        info!("event=service_shutdown module=db status=start");
        let Self { conn, .. } = self;
        match Arc::try_unwrap(conn) {
            Ok(mutex) => {
                let conn = mutex.into_inner().map_err(|_| DbError::LockPoisoned)?;
                conn.close().map_err(|(_, err)| DbError::Sqlite(err))?;
                info!("event=service_shutdown module=db status=ok closed=true");
            }
            Err(_) => {
                info!("event=service_shutdown module=db status=ok closed=false shared=true");
            }
        }
        Ok(())
    }

    /// Locks the shared connection.
    ///
    /// Fails with `HeldByTransaction` instead of blocking when this thread
    /// is inside a unit of work on the same database.
    pub(crate) fn lock(&self) -> DbResult<MutexGuard<'_, Connection>> {
        if self.held_by_current_thread()? {
            return Err(DbError::HeldByTransaction);
        }
        self.conn.lock().map_err(|_| DbError::LockPoisoned)
    }

    pub(crate) fn held_by_current_thread(&self) -> DbResult<bool> {
        let owner = self.tx_owner.lock().map_err(|_| DbError::LockPoisoned)?;
        Ok(*owner == Some(thread::current().id()))
    }

    /// Marks this thread as the transaction owner until the guard drops.
    pub(crate) fn claim_for_transaction(&self) -> DbResult<TxOwnerGuard<'_>> {
        let mut owner = self.tx_owner.lock().map_err(|_| DbError::LockPoisoned)?;
        *owner = Some(thread::current().id());
        Ok(TxOwnerGuard {
            owner: &self.tx_owner,
        })
    }
}

pub(crate) struct TxOwnerGuard<'a> {
    owner: &'a Mutex<Option<ThreadId>>,
}

impl Drop for TxOwnerGuard<'_> {
    fn drop(&mut self) {
        match self.owner.lock() {
            Ok(mut owner) => *owner = None,
            Err(poisoned) => *poisoned.into_inner() = None,
        }
    }
}
