//! Versioned schema for the `cars` table.
//!
//! The schema version lives in `PRAGMA user_version`; every step bumps it
//! inside the same transaction as its DDL.

use crate::db::{DbError, DbResult};
use log::info;
use rusqlite::Connection;

struct Step {
    version: u32,
    name: &'static str,
    sql: &'static str,
}

const STEPS: &[Step] = &[
    Step {
        version: 1,
        name: "create_cars",
        sql: include_str!("0001_init.sql"),
    },
    Step {
        version: 2,
        name: "cars_lookup_indexes",
        sql: include_str!("0002_cars_registered_at_index.sql"),
    },
];

/// Newest schema version this build can open.
pub fn latest_version() -> u32 {
    STEPS.iter().map(|step| step.version).max().unwrap_or(0)
}

/// Brings the schema up to `latest_version()`.
///
/// Fails with `UnsupportedSchemaVersion` for a database written by a newer
/// build; it is left untouched.
pub fn apply_migrations(conn: &mut Connection) -> DbResult<()> {
    let from = schema_version(conn)?;
    let latest = latest_version();
    if from > latest {
        return Err(DbError::UnsupportedSchemaVersion {
            db_version: from,
            latest_supported: latest,
        });
    }

    let pending = STEPS.iter().filter(|step| step.version > from);
    for step in pending {
        let tx = conn.transaction()?;
        tx.execute_batch(step.sql)?;
        tx.pragma_update(None, "user_version", step.version)?;
        tx.commit()?;
        info!(
            "event=db_migrate module=db status=ok version={} name={}",
            step.version, step.name
        );
    }
    Ok(())
}

fn schema_version(conn: &Connection) -> DbResult<u32> {
    Ok(conn.pragma_query_value(None, "user_version", |row| row.get(0))?)
}
