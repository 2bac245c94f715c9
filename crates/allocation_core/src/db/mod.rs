//! SQLite storage bootstrap and allocation schema description.
//!
//! # Responsibility
//! - Open and configure SQLite connections for the allocation store.
//! - Apply schema migrations in deterministic order.
//! - Describe the `batches`/`order_lines`/`allocations` shape that
//!   repositories check before use.
//!
//! # Invariants
//! - Migration version is tracked via `PRAGMA user_version`.
//! - `ALLOCATION_SCHEMA` lists every column repositories read or write; a
//!   migration that renames one of them must update it.
//! - An order line row is identified by `(orderid, sku, qty)`, matching
//!   `OrderLine` equality.

use rusqlite::Connection;
use std::error::Error;
use std::fmt::{Display, Formatter};

pub mod migrations;
mod open;

pub use open::{open_db, open_db_in_memory};

/// Tables and columns the batch repositories depend on.
pub const ALLOCATION_SCHEMA: &[(&str, &[&str])] = &[
    (
        "batches",
        &["id", "reference", "sku", "purchased_quantity", "eta"],
    ),
    ("order_lines", &["id", "orderid", "sku", "qty"]),
    ("allocations", &["id", "orderline_id", "batch_id"]),
];

pub type DbResult<T> = Result<T, DbError>;

/// Storage bootstrap failure.
#[derive(Debug)]
pub enum DbError {
    Sqlite(rusqlite::Error),
    /// The file was migrated by a newer build than this one.
    UnsupportedSchemaVersion {
        db_version: u32,
        latest_supported: u32,
    },
}

impl Display for DbError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Sqlite(err) => write!(f, "allocation store error: {err}"),
            Self::UnsupportedSchemaVersion {
                db_version,
                latest_supported,
            } => write!(
                f,
                "allocation schema version {db_version} is newer than supported {latest_supported}"
            ),
        }
    }
}

impl Error for DbError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Sqlite(err) => Some(err),
            Self::UnsupportedSchemaVersion { .. } => None,
        }
    }
}

impl From<rusqlite::Error> for DbError {
    fn from(value: rusqlite::Error) -> Self {
        Self::Sqlite(value)
    }
}

/// Returns whether `table` exists in the connected database.
pub fn table_exists(conn: &Connection, table: &str) -> DbResult<bool> {
    let exists: i64 = conn.query_row(
        "SELECT EXISTS(
            SELECT 1
            FROM sqlite_master
            WHERE type = 'table' AND name = ?1
        );",
        [table],
        |row| row.get(0),
    )?;
    Ok(exists == 1)
}

/// Returns whether `table` has a column named `column`.
pub fn table_has_column(conn: &Connection, table: &str, column: &str) -> DbResult<bool> {
    let mut stmt = conn.prepare(&format!("PRAGMA table_info({table});"))?;
    let mut rows = stmt.query([])?;
    while let Some(row) = rows.next()? {
        let current: String = row.get(1)?;
        if current == column {
            return Ok(true);
        }
    }
    Ok(false)
}
