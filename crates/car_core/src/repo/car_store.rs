//! Car store contract and SQLite implementation.
//!
//! # Responsibility
//! - Provide row-level CRUD, filtered listing and counting over `cars`.
//! - Keep SQL details inside the persistence boundary.
//!
//! # Invariants
//! - Writes only touch columns supplied in `CarChanges`.
//! - List and count evaluate the same `CarFilter`.
//! - List order is `registered_at DESC NULLS LAST, id ASC`.

use crate::context::ContextError;
use crate::db::DbError;
use crate::model::car::{Car, CarChanges, CarFilter, CarId};
use log::debug;
use rusqlite::types::Value;
use rusqlite::{params_from_iter, Connection, ErrorCode, Row};
use std::error::Error;
use std::fmt::{Display, Formatter};

const CAR_SELECT_SQL: &str = "SELECT
    id,
    user_id,
    model,
    registered_at
FROM cars";

pub type StoreResult<T> = Result<T, StoreError>;

/// Raw store failure, before translation into domain errors.
#[derive(Debug)]
pub enum StoreError {
    NotFound(CarId),
    /// Row rejected by a schema constraint.
    Constraint(String),
    InvalidPage {
        page: u32,
        page_size: u32,
    },
    Interrupted(ContextError),
    Db(DbError),
}

impl Display for StoreError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::NotFound(id) => write!(f, "car row not found: {id}"),
            Self::Constraint(message) => write!(f, "constraint violation: {message}"),
            Self::InvalidPage { page, page_size } => write!(
                f,
                "invalid page request: page={page} page_size={page_size}; both must be positive"
            ),
            Self::Interrupted(err) => write!(f, "{err}"),
            Self::Db(err) => write!(f, "{err}"),
        }
    }
}

impl Error for StoreError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Interrupted(err) => Some(err),
            Self::Db(err) => Some(err),
            Self::NotFound(_) | Self::Constraint(_) | Self::InvalidPage { .. } => None,
        }
    }
}

impl From<DbError> for StoreError {
    fn from(value: DbError) -> Self {
        Self::Db(value)
    }
}

impl From<ContextError> for StoreError {
    fn from(value: ContextError) -> Self {
        Self::Interrupted(value)
    }
}

impl From<rusqlite::Error> for StoreError {
    fn from(value: rusqlite::Error) -> Self {
        match &value {
            rusqlite::Error::SqliteFailure(err, message)
                if err.code == ErrorCode::ConstraintViolation =>
            {
                Self::Constraint(message.clone().unwrap_or_else(|| err.to_string()))
            }
            _ => Self::Db(DbError::Sqlite(value)),
        }
    }
}

/// Computes the row offset of a 1-based page.
pub fn page_offset(page: u32, page_size: u32) -> StoreResult<u64> {
    if page == 0 || page_size == 0 {
        return Err(StoreError::InvalidPage { page, page_size });
    }
    Ok(u64::from(page - 1) * u64::from(page_size))
}

/// Persistence contract for cars.
pub trait CarStore {
    fn get(&self, id: CarId) -> StoreResult<Car>;
    /// Inserts a row with the supplied fields and returns its new id.
    fn create(&self, changes: &CarChanges) -> StoreResult<CarId>;
    /// Applies only the supplied fields to an existing row.
    fn update(&self, id: CarId, changes: &CarChanges) -> StoreResult<()>;
    fn delete(&self, id: CarId) -> StoreResult<()>;
    fn list(&self, filter: &CarFilter, offset: u64, limit: u32) -> StoreResult<Vec<Car>>;
    fn count(&self, filter: &CarFilter) -> StoreResult<u64>;
}

/// SQLite-backed car store over a plain connection or an open transaction.
pub struct SqliteCarStore<'conn> {
    conn: &'conn Connection,
}

impl<'conn> SqliteCarStore<'conn> {
    pub fn new(conn: &'conn Connection) -> Self {
        Self { conn }
    }
}

impl CarStore for SqliteCarStore<'_> {
    fn get(&self, id: CarId) -> StoreResult<Car> {
        let mut stmt = self
            .conn
            .prepare(&format!("{CAR_SELECT_SQL} WHERE id = ?1;"))?;
        let mut rows = stmt.query([id])?;
        match rows.next()? {
            Some(row) => Ok(parse_car_row(row)?),
            None => Err(StoreError::NotFound(id)),
        }
    }

    fn create(&self, changes: &CarChanges) -> StoreResult<CarId> {
        let (columns, bind_values) = supplied_columns(changes);

        if columns.is_empty() {
            self.conn.execute("INSERT INTO cars DEFAULT VALUES;", [])?;
        } else {
            let placeholders = vec!["?"; columns.len()].join(", ");
            let sql = format!(
                "INSERT INTO cars ({}) VALUES ({placeholders});",
                columns.join(", ")
            );
            self.conn.execute(&sql, params_from_iter(bind_values))?;
        }

        let id = self.conn.last_insert_rowid();
        debug!("event=store_write module=store op=create status=ok car_id={id}");
        Ok(id)
    }

    fn update(&self, id: CarId, changes: &CarChanges) -> StoreResult<()> {
        let (columns, mut bind_values) = supplied_columns(changes);

        if columns.is_empty() {
            if !car_exists(self.conn, id)? {
                return Err(StoreError::NotFound(id));
            }
            return Ok(());
        }

        let assignments = columns
            .iter()
            .map(|column| format!("{column} = ?"))
            .collect::<Vec<_>>()
            .join(", ");
        bind_values.push(Value::Integer(id));
        let changed = self.conn.execute(
            &format!("UPDATE cars SET {assignments} WHERE id = ?;"),
            params_from_iter(bind_values),
        )?;

        if changed == 0 {
            return Err(StoreError::NotFound(id));
        }

        debug!(
            "event=store_write module=store op=update status=ok car_id={id} fields={}",
            columns.join(",")
        );
        Ok(())
    }

    fn delete(&self, id: CarId) -> StoreResult<()> {
        let changed = self.conn.execute("DELETE FROM cars WHERE id = ?1;", [id])?;
        if changed == 0 {
            return Err(StoreError::NotFound(id));
        }
        debug!("event=store_write module=store op=delete status=ok car_id={id}");
        Ok(())
    }

    fn list(&self, filter: &CarFilter, offset: u64, limit: u32) -> StoreResult<Vec<Car>> {
        if limit == 0 {
            return Err(StoreError::InvalidPage {
                page: 0,
                page_size: limit,
            });
        }

        let (where_sql, mut bind_values) = filter_clause(filter);
        let mut sql = format!("{CAR_SELECT_SQL}{where_sql}");
        sql.push_str(" ORDER BY registered_at DESC NULLS LAST, id ASC LIMIT ? OFFSET ?;");
        bind_values.push(Value::Integer(i64::from(limit)));
        bind_values.push(Value::Integer(
            i64::try_from(offset).unwrap_or(i64::MAX),
        ));

        let mut stmt = self.conn.prepare(&sql)?;
        let mut rows = stmt.query(params_from_iter(bind_values))?;
        let mut cars = Vec::new();
        while let Some(row) = rows.next()? {
            cars.push(parse_car_row(row)?);
        }

        Ok(cars)
    }

    fn count(&self, filter: &CarFilter) -> StoreResult<u64> {
        let (where_sql, bind_values) = filter_clause(filter);
        let count: i64 = self.conn.query_row(
            &format!("SELECT COUNT(*) FROM cars{where_sql};"),
            params_from_iter(bind_values),
            |row| row.get(0),
        )?;
        Ok(u64::try_from(count).unwrap_or(0))
    }
}

fn supplied_columns(changes: &CarChanges) -> (Vec<&'static str>, Vec<Value>) {
    let mut columns = Vec::new();
    let mut bind_values = Vec::new();

    if let Some(value) = changes.user_id.as_write() {
        columns.push("user_id");
        bind_values.push(value.map_or(Value::Null, |id| Value::Integer(*id)));
    }
    if let Some(value) = changes.model.as_write() {
        columns.push("model");
        bind_values.push(value.map_or(Value::Null, |model| Value::Text(model.clone())));
    }
    if let Some(value) = changes.registered_at.as_write() {
        columns.push("registered_at");
        bind_values.push(value.map_or(Value::Null, |epoch_ms| Value::Integer(*epoch_ms)));
    }

    (columns, bind_values)
}

fn filter_clause(filter: &CarFilter) -> (String, Vec<Value>) {
    let mut sql = String::new();
    let mut bind_values = Vec::new();

    // instr() is a byte-wise match, unlike LIKE which folds ASCII case.
    if let Some(model) = filter.model_contains.as_ref() {
        sql.push_str(" WHERE instr(model, ?) > 0");
        bind_values.push(Value::Text(model.clone()));
    }

    (sql, bind_values)
}

fn car_exists(conn: &Connection, id: CarId) -> StoreResult<bool> {
    let exists: i64 = conn.query_row(
        "SELECT EXISTS(SELECT 1 FROM cars WHERE id = ?1);",
        [id],
        |row| row.get(0),
    )?;
    Ok(exists == 1)
}

fn parse_car_row(row: &Row<'_>) -> rusqlite::Result<Car> {
    Ok(Car {
        id: row.get("id")?,
        user_id: row.get("user_id")?,
        model: row.get("model")?,
        registered_at: row.get("registered_at")?,
    })
}
