//! Sessions and the transaction coordinator.
//!
//! # Responsibility
//! - Name the connection (shared or transactional) a store call runs on.
//! - Run a unit of work atomically: commit on success, roll back otherwise.
//!
//! # Invariants
//! - A transaction-bound session never outlives its unit of work.
//! - Starting a transaction while this thread runs one on the same database
//!   fails fast, whichever context is passed.
//! - Ambient store calls from inside a unit of work fail instead of blocking.
//! - Rollback failures are logged and never replace the unit's own error.
//! - The call context is checked before every store call.

use super::{Database, DbError};
use crate::context::{CallContext, ContextError};
use crate::repo::car_store::{SqliteCarStore, StoreResult};
use log::{debug, warn};
use rusqlite::{Connection, Transaction, TransactionBehavior};
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::time::Instant;

/// Failure of the transaction machinery itself.
#[derive(Debug)]
pub enum TxError {
    /// The store could not begin a transaction.
    Open(DbError),
    /// Commit failed; the unit of work's writes are discarded.
    Commit(DbError),
    /// A transaction was requested while another one is running on this call chain.
    Nested,
    /// The context was cancelled or expired; writes were rolled back.
    Interrupted(ContextError),
}

impl Display for TxError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Open(err) => write!(f, "failed to open transaction: {err}"),
            Self::Commit(err) => write!(f, "failed to commit transaction: {err}"),
            Self::Nested => write!(f, "nested transactions are not supported"),
            Self::Interrupted(err) => write!(f, "transaction aborted: {err}"),
        }
    }
}

impl Error for TxError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Open(err) | Self::Commit(err) => Some(err),
            Self::Interrupted(err) => Some(err),
            Self::Nested => None,
        }
    }
}

enum Target<'a> {
    Shared(&'a Database),
    Transaction(&'a Connection),
}

/// Capability passed to repository calls.
///
/// Outside a unit of work it locks the shared connection per store call;
/// inside one it runs every store call on the open transaction.
pub struct Session<'a> {
    ctx: &'a CallContext,
    target: Target<'a>,
}

impl<'a> Session<'a> {
    pub fn ambient(db: &'a Database, ctx: &'a CallContext) -> Self {
        Self {
            ctx,
            target: Target::Shared(db),
        }
    }

    pub fn context(&self) -> &'a CallContext {
        self.ctx
    }

    pub fn is_transactional(&self) -> bool {
        matches!(self.target, Target::Transaction(_))
    }

    /// Runs one store operation after checking the call context.
    pub fn with_store<T>(
        &self,
        op: impl FnOnce(&SqliteCarStore<'_>) -> StoreResult<T>,
    ) -> StoreResult<T> {
        self.ctx.check()?;
        match self.target {
            Target::Shared(db) => {
                let conn = db.lock()?;
                op(&SqliteCarStore::new(&conn))
            }
            Target::Transaction(conn) => op(&SqliteCarStore::new(conn)),
        }
    }
}

impl Database {
    /// Runs `unit` inside one immediate transaction.
    ///
    /// # Contract
    /// - `unit` receives a transaction-bound session carrying `ctx`.
    /// - `Err` from `unit` rolls back and is returned unchanged.
    /// - `Ok` commits; a cancelled/expired context rolls back instead.
    /// - A commit failure is returned as `TxError::Commit`.
    ///
    /// The shared connection stays locked until the unit of work finishes.
    pub fn run_in_transaction<T, E, F>(&self, ctx: &CallContext, unit: F) -> Result<T, E>
    where
        F: FnOnce(&Session<'_>) -> Result<T, E>,
        E: From<TxError>,
    {
        if ctx.in_transaction() || self.held_by_current_thread().map_err(TxError::Open)? {
            return Err(TxError::Nested.into());
        }
        ctx.check().map_err(TxError::Interrupted)?;

        let started_at = Instant::now();
        let mut conn = self.lock().map_err(TxError::Open)?;
        let _owner = self.claim_for_transaction().map_err(TxError::Open)?;
        let tx = conn
            .transaction_with_behavior(TransactionBehavior::Immediate)
            .map_err(|err| TxError::Open(err.into()))?;

        let tx_ctx = ctx.for_transaction();
        let outcome = {
            let session = Session {
                ctx: &tx_ctx,
                target: Target::Transaction(&tx),
            };
            unit(&session)
        };

        match outcome {
            Ok(value) => {
                if let Err(interrupt) = ctx.check() {
                    rollback(tx, "interrupted");
                    return Err(TxError::Interrupted(interrupt).into());
                }
                tx.commit().map_err(|err| TxError::Commit(err.into()))?;
                debug!(
                    "event=tx_commit module=db status=ok duration_ms={}",
                    started_at.elapsed().as_millis()
                );
                Ok(value)
            }
            Err(err) => {
                rollback(tx, "unit_failed");
                Err(err)
            }
        }
    }
}

fn rollback(tx: Transaction<'_>, reason: &str) {
    match tx.rollback() {
        Ok(()) => debug!("event=tx_rollback module=db status=ok reason={reason}"),
        Err(err) => warn!(
            "event=tx_rollback module=db status=error reason={reason} error_code=rollback_failed error={err}"
        ),
    }
}

#[cfg(test)]
mod tests {
    use super::TxError;
    use crate::context::CallContext;
    use crate::db::Database;
    use crate::model::car::CarChanges;
    use crate::repo::car_store::{CarStore, StoreError};

    #[derive(Debug)]
    enum TestError {
        Tx(TxError),
        Store(StoreError),
        Business,
    }

    impl From<TxError> for TestError {
        fn from(value: TxError) -> Self {
            Self::Tx(value)
        }
    }

    impl From<StoreError> for TestError {
        fn from(value: StoreError) -> Self {
            Self::Store(value)
        }
    }

    fn count_rows(db: &Database) -> u64 {
        let ctx = CallContext::background();
        db.session(&ctx)
            .with_store(|store| store.count(&Default::default()))
            .unwrap()
    }

    #[test]
    fn successful_unit_commits() {
        let db = Database::open_in_memory().unwrap();
        let ctx = CallContext::background();

        let id = db
            .run_in_transaction(&ctx, |session| -> Result<i64, TestError> {
                assert!(session.is_transactional());
                Ok(session.with_store(|store| store.create(&CarChanges::new().model("Golf")))?)
            })
            .unwrap();

        assert!(id > 0);
        assert_eq!(count_rows(&db), 1);
    }

    #[test]
    fn failing_unit_rolls_back_and_returns_its_error() {
        let db = Database::open_in_memory().unwrap();
        let ctx = CallContext::background();

        let err = db
            .run_in_transaction(&ctx, |session| -> Result<(), TestError> {
                session.with_store(|store| store.create(&CarChanges::new().model("Golf")))?;
                Err(TestError::Business)
            })
            .unwrap_err();

        assert!(matches!(err, TestError::Business));
        assert_eq!(count_rows(&db), 0);
    }

    #[test]
    fn nested_transaction_fails_fast() {
        let db = Database::open_in_memory().unwrap();
        let ctx = CallContext::background();

        let err = db
            .run_in_transaction(&ctx, |session| -> Result<(), TestError> {
                db.run_in_transaction(session.context(), |_| -> Result<(), TestError> { Ok(()) })
            })
            .unwrap_err();

        assert!(matches!(err, TestError::Tx(TxError::Nested)));
    }

    #[test]
    fn cancellation_during_unit_rolls_back() {
        let db = Database::open_in_memory().unwrap();
        let ctx = CallContext::background();

        let err = db
            .run_in_transaction(&ctx, |session| -> Result<(), TestError> {
                session.with_store(|store| store.create(&CarChanges::new().model("Golf")))?;
                session.context().cancel();
                Ok(())
            })
            .unwrap_err();

        assert!(matches!(err, TestError::Tx(TxError::Interrupted(_))));
        assert_eq!(count_rows(&db), 0);
    }

    #[test]
    fn cancelled_context_never_opens_transaction() {
        let db = Database::open_in_memory().unwrap();
        let ctx = CallContext::background();
        ctx.cancel();

        let mut ran = false;
        let err = db
            .run_in_transaction(&ctx, |_| -> Result<(), TestError> {
                ran = true;
                Ok(())
            })
            .unwrap_err();

        assert!(!ran);
        assert!(matches!(err, TestError::Tx(TxError::Interrupted(_))));
    }
}
