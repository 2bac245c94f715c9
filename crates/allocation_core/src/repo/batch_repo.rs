//! Batch repository contract and SQLite implementation.
//!
//! # Responsibility
//! - Map the `Batch` aggregate onto `batches`, `order_lines` and
//!   `allocations` rows and back.
//! - Keep SQL details inside the persistence boundary.
//!
//! # Invariants
//! - `add` is insert-if-absent at every level: one batch row per reference,
//!   one order line row per `(orderid, sku, qty)`, one allocation row per
//!   (batch, order line) pair.
//! - `get`/`list` rebuild allocations by replaying `Batch::allocate` over
//!   persisted order lines, never by writing the set directly.
//! - The repository never commits; callers own the transaction boundary.

use crate::db::migrations::latest_version;
use crate::db::{table_exists, table_has_column, DbError, ALLOCATION_SCHEMA};
use crate::model::batch::{Batch, ModelValidationError, OrderLine};
use chrono::NaiveDate;
use log::debug;
use rusqlite::{params, Connection, OptionalExtension, Row};
use std::error::Error;
use std::fmt::{Display, Formatter};

const BATCH_SELECT_SQL: &str = "SELECT
    id,
    reference,
    sku,
    purchased_quantity,
    eta
FROM batches";

pub type RepoResult<T> = Result<T, RepoError>;

/// Repository error for batch persistence and rehydration.
#[derive(Debug)]
pub enum RepoError {
    Validation(ModelValidationError),
    Db(DbError),
    /// No batch row carries the requested reference.
    NotFound(String),
    InvalidData(String),
    UninitializedConnection {
        expected_version: u32,
        actual_version: u32,
    },
    MissingRequiredTable(&'static str),
    MissingRequiredColumn {
        table: &'static str,
        column: &'static str,
    },
}

impl Display for RepoError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Validation(err) => write!(f, "{err}"),
            Self::Db(err) => write!(f, "{err}"),
            Self::NotFound(reference) => write!(f, "batch not found: {reference}"),
            Self::InvalidData(message) => write!(f, "invalid persisted batch data: {message}"),
            Self::UninitializedConnection {
                expected_version,
                actual_version,
            } => write!(
                f,
                "connection schema version {actual_version} does not match expected {expected_version}"
            ),
            Self::MissingRequiredTable(table) => write!(f, "missing required table `{table}`"),
            Self::MissingRequiredColumn { table, column } => {
                write!(f, "missing required column `{table}.{column}`")
            }
        }
    }
}

impl Error for RepoError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Validation(err) => Some(err),
            Self::Db(err) => Some(err),
            _ => None,
        }
    }
}

impl From<ModelValidationError> for RepoError {
    fn from(value: ModelValidationError) -> Self {
        Self::Validation(value)
    }
}

impl From<DbError> for RepoError {
    fn from(value: DbError) -> Self {
        Self::Db(value)
    }
}

impl From<rusqlite::Error> for RepoError {
    fn from(value: rusqlite::Error) -> Self {
        Self::Db(DbError::Sqlite(value))
    }
}

/// Repository interface for the batch aggregate.
pub trait BatchRepository {
    /// Persists the batch and every order line currently allocated to it.
    ///
    /// Safe to call repeatedly with the same batch, including after more
    /// lines were allocated in memory between calls.
    fn add(&self, batch: &Batch) -> RepoResult<()>;
    /// Loads one batch with its allocations, or `RepoError::NotFound`.
    fn get(&self, reference: &str) -> RepoResult<Batch>;
    /// Loads every batch in insertion order.
    fn list(&self) -> RepoResult<Vec<Batch>>;
}

/// SQLite-backed batch repository.
///
/// Accepts a plain `Connection` or a `Transaction` (via deref); statements
/// run inside whatever transaction the caller has open.
pub struct SqliteBatchRepository<'conn> {
    conn: &'conn Connection,
}

impl<'conn> SqliteBatchRepository<'conn> {
    /// Constructs a repository from a migrated connection.
    ///
    /// # Errors
    /// - `UninitializedConnection` when the schema version is not the latest.
    /// - `MissingRequiredTable`/`MissingRequiredColumn` when the allocation
    ///   tables are not in the expected shape.
    pub fn try_new(conn: &'conn Connection) -> RepoResult<Self> {
        ensure_connection_ready(conn)?;
        Ok(Self { conn })
    }
}

impl BatchRepository for SqliteBatchRepository<'_> {
    fn add(&self, batch: &Batch) -> RepoResult<()> {
        batch.validate()?;

        let batch_id = match find_batch_id(self.conn, &batch.reference)? {
            Some(id) => id,
            None => insert_batch(self.conn, batch)?,
        };

        let mut inserted = 0_usize;
        for line in batch.allocations() {
            let orderline_id = match find_order_line_id(self.conn, line)? {
                Some(id) => id,
                None => insert_order_line(self.conn, line)?,
            };
            if !allocation_exists(self.conn, batch_id, orderline_id)? {
                self.conn.execute(
                    "INSERT INTO allocations (orderline_id, batch_id) VALUES (?1, ?2);",
                    params![orderline_id, batch_id],
                )?;
                inserted += 1;
            }
        }

        debug!(
            "event=batch_add module=repo status=ok batch_id={} lines={} new_allocations={}",
            batch_id,
            batch.allocations().len(),
            inserted
        );
        Ok(())
    }

    fn get(&self, reference: &str) -> RepoResult<Batch> {
        let mut stmt = self
            .conn
            .prepare(&format!("{BATCH_SELECT_SQL} WHERE reference = ?1;"))?;
        let mut rows = stmt.query([reference])?;
        let Some(row) = rows.next()? else {
            debug!("event=batch_get module=repo status=not_found");
            return Err(RepoError::NotFound(reference.to_string()));
        };

        let (batch_id, mut batch) = parse_batch_row(row)?;
        replay_allocations(self.conn, batch_id, &mut batch)?;
        batch.validate()?;
        Ok(batch)
    }

    fn list(&self) -> RepoResult<Vec<Batch>> {
        let mut stmt = self
            .conn
            .prepare(&format!("{BATCH_SELECT_SQL} ORDER BY id ASC;"))?;
        let mut rows = stmt.query([])?;
        let mut headers = Vec::new();
        while let Some(row) = rows.next()? {
            headers.push(parse_batch_row(row)?);
        }

        let mut batches = Vec::with_capacity(headers.len());
        for (batch_id, mut batch) in headers {
            replay_allocations(self.conn, batch_id, &mut batch)?;
            batch.validate()?;
            batches.push(batch);
        }
        Ok(batches)
    }
}

fn find_batch_id(conn: &Connection, reference: &str) -> RepoResult<Option<i64>> {
    let id = conn
        .query_row(
            "SELECT id FROM batches WHERE reference = ?1;",
            [reference],
            |row| row.get(0),
        )
        .optional()?;
    Ok(id)
}

fn insert_batch(conn: &Connection, batch: &Batch) -> RepoResult<i64> {
    conn.execute(
        "INSERT INTO batches (reference, sku, purchased_quantity, eta)
         VALUES (?1, ?2, ?3, ?4);",
        params![
            batch.reference.as_str(),
            batch.sku.as_str(),
            batch.purchased_quantity,
            batch.eta,
        ],
    )?;
    Ok(conn.last_insert_rowid())
}

fn find_order_line_id(conn: &Connection, line: &OrderLine) -> RepoResult<Option<i64>> {
    let id = conn
        .query_row(
            "SELECT id
             FROM order_lines
             WHERE orderid = ?1
               AND sku = ?2
               AND qty = ?3
             ORDER BY id ASC
             LIMIT 1;",
            params![line.orderid.as_str(), line.sku.as_str(), line.qty],
            |row| row.get(0),
        )
        .optional()?;
    Ok(id)
}

fn insert_order_line(conn: &Connection, line: &OrderLine) -> RepoResult<i64> {
    conn.execute(
        "INSERT INTO order_lines (orderid, sku, qty) VALUES (?1, ?2, ?3);",
        params![line.orderid.as_str(), line.sku.as_str(), line.qty],
    )?;
    Ok(conn.last_insert_rowid())
}

fn allocation_exists(conn: &Connection, batch_id: i64, orderline_id: i64) -> RepoResult<bool> {
    let exists: i64 = conn.query_row(
        "SELECT EXISTS(
            SELECT 1
            FROM allocations
            WHERE batch_id = ?1 AND orderline_id = ?2
        );",
        params![batch_id, orderline_id],
        |row| row.get(0),
    )?;
    Ok(exists == 1)
}

fn replay_allocations(conn: &Connection, batch_id: i64, batch: &mut Batch) -> RepoResult<()> {
    let mut stmt = conn.prepare(
        "SELECT
            order_lines.orderid,
            order_lines.sku,
            order_lines.qty
         FROM allocations
         INNER JOIN batches ON allocations.batch_id = batches.id
         INNER JOIN order_lines ON allocations.orderline_id = order_lines.id
         WHERE batches.id = ?1
         ORDER BY allocations.id ASC;",
    )?;

    let mut rows = stmt.query([batch_id])?;
    while let Some(row) = rows.next()? {
        let qty = parse_quantity(row.get("qty")?, "order_lines.qty")?;
        if qty == 0 {
            return Err(RepoError::InvalidData(
                "invalid quantity `0` in order_lines.qty".to_string(),
            ));
        }
        batch.allocate(OrderLine::new(
            row.get::<_, String>("orderid")?,
            row.get::<_, String>("sku")?,
            qty,
        ));
    }
    Ok(())
}

fn parse_batch_row(row: &Row<'_>) -> RepoResult<(i64, Batch)> {
    let purchased_quantity = parse_quantity(
        row.get("purchased_quantity")?,
        "batches.purchased_quantity",
    )?;

    let eta = match row.get::<_, Option<String>>("eta")? {
        Some(text) => Some(NaiveDate::parse_from_str(&text, "%Y-%m-%d").map_err(|_| {
            RepoError::InvalidData(format!("invalid eta `{text}` in batches.eta"))
        })?),
        None => None,
    };

    let batch = Batch::new(
        row.get::<_, String>("reference")?,
        row.get::<_, String>("sku")?,
        purchased_quantity,
        eta,
    );
    Ok((row.get("id")?, batch))
}

fn parse_quantity(value: i64, column: &'static str) -> RepoResult<u32> {
    u32::try_from(value)
        .map_err(|_| RepoError::InvalidData(format!("invalid quantity `{value}` in {column}")))
}

fn ensure_connection_ready(conn: &Connection) -> RepoResult<()> {
    let expected_version = latest_version();
    let actual_version: u32 = conn.query_row("PRAGMA user_version;", [], |row| row.get(0))?;
    if actual_version != expected_version {
        return Err(RepoError::UninitializedConnection {
            expected_version,
            actual_version,
        });
    }

    for &(table, columns) in ALLOCATION_SCHEMA {
        if !table_exists(conn, table)? {
            return Err(RepoError::MissingRequiredTable(table));
        }
        for &column in columns {
            if !table_has_column(conn, table, column)? {
                return Err(RepoError::MissingRequiredColumn { table, column });
            }
        }
    }

    Ok(())
}
